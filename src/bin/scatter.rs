use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use benchtable::catalog::Catalog;
use benchtable::config::ViewConfig;
use benchtable::location::MemoryHistory;
use benchtable::plot::scatter::{AxisSelection, RegressionMode, ScatterRequest};
use benchtable::plot::ScaleKind;
use benchtable::view::TableView;

const USAGE: &str =
    "usage: scatter <fixture.json> <tool:col> <tool:col> [--log] [--regression] [--correct-only] [--location <href>]";

#[tokio::main]
async fn main() -> Result<()> {
    let mut positional: Vec<String> = Vec::new();
    let mut flags: Vec<String> = Vec::new();
    let mut location = "/".to_string();
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--location" {
            location = args.next().unwrap_or(location);
        } else if arg.starts_with("--") {
            flags.push(arg);
        } else {
            positional.push(arg);
        }
    }
    let flag = |name: &str| flags.iter().any(|f| f == name);
    if positional.len() < 3 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }
    let (Some(x), Some(y)) = (AxisSelection::parse(&positional[1]), AxisSelection::parse(&positional[2])) else {
        eprintln!("axes must be <toolIdx>:<colIdx>");
        std::process::exit(2);
    };

    let catalog = match Catalog::load(PathBuf::from(&positional[0]).as_path()) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("fixture load failed: {:#}", err);
            std::process::exit(1);
        }
    };
    let mut view = TableView::new(Arc::new(catalog), MemoryHistory::new(&location), ViewConfig::from_env());

    let mut req = ScatterRequest::new(x, y);
    if flag("--log") {
        req.scale = ScaleKind::Logarithmic;
    }
    if flag("--regression") {
        req.regression = RegressionMode::Linear;
    }
    req.correct_only = flag("--correct-only");

    let plot = view.scatter(&req);
    if plot.has_invalid_log {
        eprintln!("some points have non-positive values and are not shown on a log scale");
    }
    println!("{}", serde_json::to_string_pretty(&plot)?);
    Ok(())
}
