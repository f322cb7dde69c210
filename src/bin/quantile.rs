use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use benchtable::catalog::Catalog;
use benchtable::config::ViewConfig;
use benchtable::location::MemoryHistory;
use benchtable::plot::quantile::{PlotMode, QuantileRequest, Selection};
use benchtable::plot::AxisValue;
use benchtable::view::TableView;

const USAGE: &str =
    "usage: quantile <fixture.json> <column-title> [--correct-only] [--score-based] [--direct] [--location <href>]";

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
    let (Some(path), Some(title)) = (positional.first(), positional.get(1)) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    let catalog = match Catalog::load(PathBuf::from(path).as_path()) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("fixture load failed: {:#}", err);
            std::process::exit(1);
        }
    };
    let mut view = TableView::new(Arc::new(catalog), MemoryHistory::new(&location), ViewConfig::from_env());

    let mut req = QuantileRequest::new(Selection::Value { title: title.to_string() });
    req.correct_only = flag("--correct-only");
    req.plot_mode = if flag("--score-based") {
        PlotMode::ScoreBased
    } else if flag("--direct") {
        PlotMode::Direct
    } else {
        PlotMode::Quantile
    };

    let plot = view.quantile(&req);
    if plot.series.is_empty() {
        eprintln!("no visible column titled {:?}", title);
        std::process::exit(3);
    }
    if plot.score_unavailable {
        eprintln!("scores missing for some tasks, falling back to plain quantile data");
    }
    for series in &plot.series {
        println!("# {}", series.label);
        for p in &series.points {
            let value = match &p.y {
                AxisValue::Number(n) => n.to_string(),
                AxisValue::Label(s) => s.clone(),
            };
            println!("{}\t{}\t{}", p.x, p.info.task_id, value);
        }
    }
    Ok(())
}
