//! Geometry reconstruction from a surviving edge multiset.
//!
//! Isolated points become Points. Edges are consumed by walking successor
//! chains: a walk that runs out of successors yields a LineString, a walk
//! that comes back to its start yields a Polygon ring. Walks start from
//! chain heads (more outgoing than incoming edges) before anything else, and
//! every choice is taken in ascending key order, so the output is a pure
//! function of the edge multiset.

use std::collections::{BTreeSet, HashMap};

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use super::edges::{EdgeMap, EdgeMultiset};

/// Pieces recovered from an edge multiset, before collapsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pieces {
    /// Isolated points, in key order.
    pub points: Vec<Point<f64>>,
    /// Open chains, in walk order.
    pub lines: Vec<LineString<f64>>,
    /// Closed rings, in walk order.
    pub polygons: Vec<Polygon<f64>>,
}

impl Pieces {
    /// Collapse the pieces into the simplest geometry that holds them.
    ///
    /// One item of one kind stays bare, several of one kind become the
    /// matching Multi* geometry, and mixed kinds become a collection of the
    /// per-kind results (points, then lines, then polygons). Nothing at all
    /// yields an empty collection.
    pub fn collapse(self) -> Geometry<f64> {
        let mut parts = Vec::with_capacity(3);

        let Self {
            mut points,
            mut lines,
            mut polygons,
        } = self;

        match points.len() {
            0 => {}
            1 => parts.extend(points.pop().map(Geometry::Point)),
            _ => parts.push(Geometry::MultiPoint(MultiPoint(points))),
        }
        match lines.len() {
            0 => {}
            1 => parts.extend(lines.pop().map(Geometry::LineString)),
            _ => parts.push(Geometry::MultiLineString(MultiLineString(lines))),
        }
        match polygons.len() {
            0 => {}
            1 => parts.extend(polygons.pop().map(Geometry::Polygon)),
            _ => parts.push(Geometry::MultiPolygon(MultiPolygon(polygons))),
        }

        match parts.len() {
            1 => parts.remove(0),
            _ => Geometry::GeometryCollection(GeometryCollection(parts)),
        }
    }
}

/// Walk every surviving edge and collect the resulting pieces.
pub fn reconstruct(multiset: EdgeMultiset) -> Pieces {
    let (coords, mut edges, points) = multiset.into_parts();
    let lookup = |key: &str| -> Coord<f64> { coords[key] };

    let mut pieces = Pieces {
        points: points.iter().map(|key| Point(lookup(key))).collect(),
        ..Default::default()
    };

    let mut push_walk = |path: Vec<String>, closed: bool| {
        let ring: Vec<Coord<f64>> = path.iter().map(|key| lookup(key)).collect();
        if closed {
            pieces.polygons.push(Polygon::new(LineString(ring), Vec::new()));
        } else {
            pieces.lines.push(LineString(ring));
        }
    };

    for head in chain_heads(&edges) {
        while edges.contains_key(&head) {
            let (path, closed) = walk(&mut edges, &head);
            push_walk(path, closed);
        }
    }

    while let Some(start) = edges.keys().next().cloned() {
        let (path, closed) = walk(&mut edges, &start);
        push_walk(path, closed);
    }

    pieces
}

/// Keys with more outgoing than incoming edges, in ascending order.
fn chain_heads(edges: &EdgeMap) -> BTreeSet<String> {
    let mut balance: HashMap<&str, i64> = HashMap::new();
    for (from, successors) in edges {
        for to in successors {
            *balance.entry(from.as_str()).or_insert(0) += 1;
            *balance.entry(to.as_str()).or_insert(0) -= 1;
        }
    }
    balance
        .into_iter()
        .filter(|(_, balance)| *balance > 0)
        .map(|(key, _)| key.to_string())
        .collect()
}

/// Follow successors from `start`, consuming each edge taken.
///
/// Returns the visited keys and whether the walk closed back on `start`.
fn walk(edges: &mut EdgeMap, start: &str) -> (Vec<String>, bool) {
    let mut path = vec![start.to_string()];
    let mut current = start.to_string();

    while let Some(next) = take_successor(edges, &current) {
        path.push(next.clone());
        if next == start {
            return (path, true);
        }
        current = next;
    }

    (path, false)
}

/// Remove and return the smallest remaining successor of `key`.
fn take_successor(edges: &mut EdgeMap, key: &str) -> Option<String> {
    let successors = edges.get_mut(key)?;
    let next = successors.pop_first()?;
    if successors.is_empty() {
        edges.remove(key);
    }

    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, line_string, point, polygon};

    fn pieces_of(geometries: &[Geometry<f64>]) -> Pieces {
        reconstruct(EdgeMultiset::from_geometries(geometries))
    }

    #[test]
    fn test_open_chain_starts_at_head() {
        // Edges supplied out of order: b→c before a→b
        let pieces = pieces_of(&[
            Geometry::LineString(line_string![(x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]),
            Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)]),
        ]);

        assert_eq!(
            pieces.lines,
            vec![line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]]
        );
        assert!(pieces.polygons.is_empty());
    }

    #[test]
    fn test_closed_walk_becomes_ring() {
        let pieces = pieces_of(&[Geometry::LineString(line_string![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 0.0)
        ])]);

        assert!(pieces.lines.is_empty());
        assert_eq!(pieces.polygons.len(), 1);
        let ring = pieces.polygons[0].exterior();
        assert_eq!(ring.0.len(), 4);
        assert_eq!(ring.0.first(), ring.0.last());
    }

    #[test]
    fn test_every_edge_consumed_once() {
        let input = [
            Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]),
            Geometry::LineString(line_string![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 7.0, y: 6.0)]),
        ];
        let multiset = EdgeMultiset::from_geometries(&input);
        let total = multiset.edge_count();

        let pieces = reconstruct(multiset);
        let walked: usize = pieces.lines.iter().map(|l| l.0.len() - 1).sum::<usize>()
            + pieces
                .polygons
                .iter()
                .map(|p| p.exterior().0.len() - 1)
                .sum::<usize>();
        assert_eq!(walked, total);
    }

    #[test]
    fn test_collapse_single_kinds() {
        let single = Pieces {
            points: vec![point!(x: 1.0, y: 1.0)],
            ..Default::default()
        };
        assert_eq!(single.collapse(), Geometry::Point(point!(x: 1.0, y: 1.0)));

        let double = Pieces {
            lines: vec![
                line_string![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0)],
                line_string![(x: 2.0, y: 0.0), (x: 3.0, y: 0.0)],
            ],
            ..Default::default()
        };
        assert!(matches!(double.collapse(), Geometry::MultiLineString(m) if m.0.len() == 2));
    }

    #[test]
    fn test_collapse_mixed_kinds() {
        let mixed = Pieces {
            points: vec![point!(x: 9.0, y: 9.0)],
            polygons: vec![polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]],
            ..Default::default()
        };

        let Geometry::GeometryCollection(collection) = mixed.collapse() else {
            panic!("expected collection");
        };
        assert_eq!(collection.0.len(), 2);
        assert!(matches!(collection.0[0], Geometry::Point(_)));
        assert!(matches!(collection.0[1], Geometry::Polygon(_)));
    }

    #[test]
    fn test_collapse_nothing() {
        assert_eq!(
            Pieces::default().collapse(),
            Geometry::GeometryCollection(GeometryCollection(Vec::new()))
        );
    }

    #[test]
    fn test_reconstruct_uses_input_coordinates_only() {
        let input = [Geometry::LineString(line_string![
            (x: 0.25, y: 0.5),
            (x: 0.75, y: 0.5)
        ])];
        let pieces = pieces_of(&input);

        for c in pieces.lines[0].0.iter() {
            assert!([coord! { x: 0.25, y: 0.5 }, coord! { x: 0.75, y: 0.5 }].contains(c));
        }
    }
}
