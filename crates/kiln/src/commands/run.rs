//! Run tasks by name.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::config::load_config;
use crate::tasks;

/// Run the run command.
///
/// Tasks run one after another in the order given. An empty list runs the
/// default task.
pub async fn run(config_path: &Path, names: Vec<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let graph = Arc::new(tasks::declare(&config)?);
    graph.validate()?;

    let names = if names.is_empty() {
        vec![tasks::DEFAULT_TASK.to_string()]
    } else {
        names
    };

    for report in graph.run_all(&names).await? {
        tracing::debug!(
            "Ran {} tasks in {}ms",
            report.completed.len(),
            report.duration_ms
        );
    }

    Ok(())
}
