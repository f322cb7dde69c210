use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use benchtable::catalog::Catalog;
use benchtable::config::ViewConfig;
use benchtable::location::MemoryHistory;
use benchtable::logging::{log, obj, v_num, v_str, Domain, Level};
use benchtable::stats::StatsState;
use benchtable::view::TableView;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: benchtable <fixture.json> [location]");
        std::process::exit(2);
    };
    let location = args.next().unwrap_or_else(|| "/".to_string());

    let catalog = match Catalog::load(PathBuf::from(&path).as_path()) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("fixture load failed: {:#}", err);
            std::process::exit(1);
        }
    };
    let fingerprint = catalog.fingerprint().to_string();
    let mut view = TableView::new(Arc::new(catalog), MemoryHistory::new(&location), ViewConfig::from_env());

    let stats = match view.stats_ready().await {
        StatsState::Ready(stats) => serde_json::to_value(stats.as_ref())?,
        _ => serde_json::Value::Null,
    };
    let filters = view.active_filters();
    let dropped = view.decode_report().dropped.clone();
    let tasks: Vec<String> = view.filtered_rows().iter().map(|r| r.display_id()).collect();

    log(
        Level::Info,
        Domain::System,
        "table_rendered",
        obj(&[
            ("location", v_str(&location)),
            ("rows", v_num(tasks.len() as f64)),
            ("dropped", v_num(dropped.len() as f64)),
        ]),
    );

    let payload = json!({
        "fingerprint": fingerprint,
        "filters": filters,
        "dropped": dropped,
        "rows": tasks.len(),
        "tasks": tasks,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
