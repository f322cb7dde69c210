//! Emit a random fixture on stdout for exercising the other binaries.

use std::env;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::{json, Value};

const STATUSES: [(&str, &[&str]); 4] = [
    ("correct", &["true", "false(unreach-call)"]),
    ("wrong", &["true", "false(valid-memsafety)"]),
    ("error", &["TIMEOUT", "OUT OF MEMORY", "EXCEPTION"]),
    ("unknown", &["unknown"]),
];

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn result(rng: &mut StdRng) -> Value {
    let roll: f64 = rng.gen();
    if roll < 0.05 {
        return json!({"category": "aborted", "values": [null, null, null, "node1"]});
    }
    let (category, statuses) = STATUSES[rng.gen_range(0..STATUSES.len())];
    let status = statuses[rng.gen_range(0..statuses.len())];
    let cpu: f64 = (rng.gen_range(-2.0..3.0f64)).exp();
    let mem = rng.gen_range(10..2000);
    let score = match category {
        "correct" => rng.gen_range(1..=2),
        "wrong" => -16 * rng.gen_range(1..=2),
        _ => 0,
    };
    json!({
        "category": category,
        "score": score,
        "values": [status, format!("{:.3}s", cpu), format!("{} MB", mem), format!("node{}", rng.gen_range(1..4))],
    })
}

fn main() {
    let seed: u64 = env_or("SEED", 42);
    let tools: usize = env_or("TOOLS", 2);
    let tasks: usize = env_or("TASKS", 50);
    let mut rng = StdRng::seed_from_u64(seed);

    let columns = json!([
        {"title": "status", "kind": "status"},
        {"title": "cputime", "kind": "numeric", "unit": "s"},
        {"title": "memory", "kind": "numeric", "unit": "MB"},
        {"title": "host", "kind": "text"},
    ]);
    let tool_defs: Vec<Value> = (0..tools)
        .map(|i| json!({"name": format!("tool{}", i), "columns": columns}))
        .collect();

    let rows: Vec<Value> = (0..tasks)
        .map(|i| {
            // Some tasks are missing from later run sets.
            let present = if rng.gen::<f64>() < 0.1 { tools.saturating_sub(1).max(1) } else { tools };
            let results: Vec<Value> = (0..present).map(|_| result(&mut rng)).collect();
            json!({"id": [format!("task{:03}.c", i), "unreach-call"], "results": results})
        })
        .collect();

    let fixture = json!({"tools": tool_defs, "rows": rows});
    match serde_json::to_string_pretty(&fixture) {
        Ok(text) => println!("{}", text),
        Err(err) => {
            eprintln!("failed to render fixture: {}", err);
            std::process::exit(1);
        }
    }
}
