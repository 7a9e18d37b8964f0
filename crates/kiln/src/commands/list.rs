//! List declared tasks.

use std::path::Path;

use anyhow::Result;

use crate::config::load_config;
use crate::tasks;

/// Run the list command.
pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let graph = tasks::declare(&config)?;

    for line in describe(&graph) {
        println!("{}", line);
    }

    Ok(())
}

/// One line per task: its name and prerequisites.
fn describe(graph: &kiln_tasks::TaskGraph) -> Vec<String> {
    graph
        .names()
        .map(|name| match graph.dependencies(name) {
            Some(deps) if !deps.is_empty() => format!("{} <- {}", name, deps.join(", ")),
            _ => name.to_string(),
        })
        .collect()
}
