//! Directed-edge set with opposite-edge cancellation.
//!
//! Every fragment geometry is flattened into directed edges between
//! canonical coordinate keys. The distinct edges are collected first; an
//! edge `a → b` survives only if `b → a` was never contributed. This is the
//! dissolve rule that makes the shared boundary between two adjacent tile
//! fragments disappear.
//!
//! Repeated copies of an edge collapse into one, so the same fragment
//! arriving twice (a wrapped tile fetched under two grid keys) contributes
//! its ring once. The surviving set is a pure function of the distinct input
//! edges, never of the order they arrive in.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use geo::{Coord, Geometry, LineString, Polygon};
use tracing::debug;

/// Canonical string key for a coordinate.
///
/// Keys compare exactly; there is no tolerance. Negative zero is folded
/// into zero so that `-0.0` and `0.0` name the same vertex.
pub fn coord_key(coord: &Coord<f64>) -> String {
    format!("{},{}", coord.x + 0.0, coord.y + 0.0)
}

/// Successor map: start key → set of end keys.
pub(crate) type EdgeMap = BTreeMap<String, BTreeSet<String>>;

/// Directed edges and isolated points contributed by one merge group.
#[derive(Debug, Clone, Default)]
pub struct EdgeMultiset {
    coords: HashMap<String, Coord<f64>>,
    edges: EdgeMap,
    points: BTreeSet<String>,
    dropped_interiors: usize,
}

impl EdgeMultiset {
    /// Create an empty multiset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a multiset from a sequence of geometries.
    pub fn from_geometries<'a, I>(geometries: I) -> Self
    where
        I: IntoIterator<Item = &'a Geometry<f64>>,
    {
        let mut multiset = Self::new();
        for geometry in geometries {
            multiset.add_geometry(geometry);
        }
        multiset
    }

    /// Flatten a geometry into the multiset.
    ///
    /// Polygon interior rings are not supported: they are dropped and
    /// counted in [`dropped_interiors`](Self::dropped_interiors).
    pub fn add_geometry(&mut self, geometry: &Geometry<f64>) {
        match geometry {
            Geometry::Point(p) => self.add_point(p.0),
            Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| self.add_point(p.0)),
            Geometry::Line(line) => self.add_path(&[line.start, line.end]),
            Geometry::LineString(ls) => self.add_path(&ls.0),
            Geometry::MultiLineString(mls) => mls.0.iter().for_each(|ls| self.add_path(&ls.0)),
            Geometry::Polygon(polygon) => self.add_polygon(polygon),
            Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| self.add_polygon(p)),
            Geometry::Rect(rect) => self.add_polygon(&rect.to_polygon()),
            Geometry::Triangle(triangle) => self.add_polygon(&triangle.to_polygon()),
            Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| self.add_geometry(g)),
        }
    }

    /// Add an isolated point.
    pub fn add_point(&mut self, coord: Coord<f64>) {
        let key = self.intern(coord);
        self.points.insert(key);
    }

    /// Add one directed edge. Adding an edge already present is a no-op.
    pub fn add_edge(&mut self, start: Coord<f64>, end: Coord<f64>) {
        let from = self.intern(start);
        let to = self.intern(end);
        if from == to {
            return;
        }
        self.edges.entry(from).or_default().insert(to);
    }

    fn add_path(&mut self, coords: &[Coord<f64>]) {
        let mut path: Vec<Coord<f64>> = coords.to_vec();
        path.dedup_by(|a, b| coord_key(a) == coord_key(b));

        match path.len() {
            0 => {}
            1 => self.add_point(path[0]),
            _ => {
                for pair in path.windows(2) {
                    self.add_edge(pair[0], pair[1]);
                }
            }
        }
    }

    fn add_polygon(&mut self, polygon: &Polygon<f64>) {
        if !polygon.interiors().is_empty() {
            debug!(
                interiors = polygon.interiors().len(),
                "Dropping polygon interior rings before union"
            );
            self.dropped_interiors += polygon.interiors().len();
        }
        let exterior: &LineString<f64> = polygon.exterior();
        self.add_path(&exterior.0);
    }

    fn intern(&mut self, coord: Coord<f64>) -> String {
        let key = coord_key(&coord);
        self.coords.entry(key.clone()).or_insert(coord);
        key
    }

    fn contributed(&self, from: &str, to: &str) -> bool {
        self.edges
            .get(from)
            .is_some_and(|successors| successors.contains(to))
    }

    fn survives(&self, from: &str, to: &str) -> bool {
        self.contributed(from, to) && !self.contributed(to, from)
    }

    fn surviving(&self) -> impl Iterator<Item = (&String, &String)> + '_ {
        self.edges
            .iter()
            .flat_map(|(from, successors)| successors.iter().map(move |to| (from, to)))
            .filter(|(from, to)| !self.contributed(to, from))
    }

    /// Whether `start → end` survives cancellation.
    pub fn contains_edge(&self, start: &Coord<f64>, end: &Coord<f64>) -> bool {
        self.survives(&coord_key(start), &coord_key(end))
    }

    /// Whether an isolated point is present.
    pub fn contains_point(&self, coord: &Coord<f64>) -> bool {
        self.points.contains(&coord_key(coord))
    }

    /// Number of distinct directed edges that survive cancellation.
    pub fn edge_count(&self) -> usize {
        self.surviving().count()
    }

    /// Number of distinct isolated points.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Number of opposite edge pairs that cancel each other.
    pub fn cancelled_pairs(&self) -> usize {
        let contributed: usize = self.edges.values().map(BTreeSet::len).sum();
        (contributed - self.edge_count()) / 2
    }

    /// Number of polygon interior rings that were dropped.
    pub fn dropped_interiors(&self) -> usize {
        self.dropped_interiors
    }

    /// Whether no edges and no points survive.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.surviving().next().is_none()
    }

    /// Coordinates, surviving edges and isolated points.
    pub(crate) fn into_parts(self) -> (HashMap<String, Coord<f64>>, EdgeMap, BTreeSet<String>) {
        let mut edges = EdgeMap::new();
        for (from, to) in self.surviving() {
            edges.entry(from.clone()).or_default().insert(to.clone());
        }
        (self.coords, edges, self.points)
    }
}
