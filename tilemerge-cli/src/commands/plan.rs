//! Plan command - print the tiles a view would request, nearest first.
//!
//! One JSON object per line: the scheduled tile, the tile actually
//! requested from the server after wrapping and TMS flipping, and its URL
//! when a template is configured.

use std::io::{self, Write};

use clap::Args;
use serde_json::{json, Value};
use tilemerge::config::ConfigFile;
use tilemerge::coord::TileCoord;
use tilemerge::provider::UrlTemplate;
use tilemerge::scheduler::TileGridScheduler;
use tracing::info;

use super::common::ViewArgs;
use crate::error::CliError;

/// Arguments for the plan command.
#[derive(Debug, Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub view: ViewArgs,
}

/// Run the plan command.
pub fn run(args: PlanArgs, config: &ConfigFile) -> Result<(), CliError> {
    let policy = config.grid.policy(config.source.tms);

    // Without any URL the plan is still useful; only the url field is dropped
    let template = match args.view.url.as_deref().or(config.source.url.as_deref()) {
        Some(url) => Some(config.to_layer_config(Some(url))?.template()?),
        None => None,
    };

    let scheduler = TileGridScheduler::new(policy);
    let planned = scheduler.plan(&args.view.bounds, args.view.zoom)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for coord in &planned {
        let request = policy.request_position(*coord)?;
        writeln!(out, "{}", plan_line(coord, &request, template.as_ref())).map_err(|error| {
            CliError::FileWrite {
                path: "<stdout>".to_string(),
                error,
            }
        })?;
    }

    info!(
        zoom = args.view.zoom,
        bounds = %args.view.bounds,
        tiles = planned.len(),
        "Planned tiles"
    );
    Ok(())
}

fn plan_line(tile: &TileCoord, request: &TileCoord, template: Option<&UrlTemplate>) -> Value {
    let mut line = json!({ "tile": tile, "request": request });
    if let Some(template) = template {
        line["url"] = json!(template.render(request.zoom, request.x, request.y));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_line_with_url() {
        let template = UrlTemplate::new("http://{s}.t/{z}/{x}/{y}", "ab").unwrap();
        let line = plan_line(
            &TileCoord::new(2, -1, 0),
            &TileCoord::new(2, 3, 0),
            Some(&template),
        );

        assert_eq!(line["tile"]["x"], json!(-1));
        assert_eq!(line["request"]["x"], json!(3));
        assert_eq!(line["url"], json!("http://b.t/2/3/0"));
    }

    #[test]
    fn test_plan_line_without_url() {
        let coord = TileCoord::new(0, 0, 0);
        let line = plan_line(&coord, &coord, None);
        assert!(line.get("url").is_none());
    }
}
