//! Dependency-ordered task execution.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use petgraph::graph::NodeIndex;
use petgraph::Direction;
use tokio::task::JoinSet;

use crate::graph::{TaskError, TaskGraph};

/// Result of running a task and its prerequisites.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Task names in the order they completed
    pub completed: Vec<String>,

    /// Total run time in milliseconds
    pub duration_ms: u64,
}

impl TaskGraph {
    /// Run a task after all of its prerequisites.
    ///
    /// Each task in the dependency closure runs once. Tasks whose
    /// prerequisites are complete run concurrently. The first failure
    /// aborts the remaining chain.
    pub async fn run(self: &Arc<Self>, name: &str) -> Result<RunReport, TaskError> {
        let start = Instant::now();
        let plan = self.plan(name)?;

        let mut completed: HashSet<NodeIndex> = HashSet::new();
        let mut started: HashSet<NodeIndex> = HashSet::new();
        let mut order = Vec::with_capacity(plan.node_count());
        let mut running = JoinSet::new();
        let mut names_by_id = HashMap::new();

        loop {
            for node in plan.node_indices() {
                if started.contains(&node) {
                    continue;
                }
                let ready = plan
                    .neighbors_directed(node, Direction::Incoming)
                    .all(|dep| completed.contains(&dep));
                if !ready {
                    continue;
                }

                started.insert(node);
                let task = &plan[node];
                let action = Arc::clone(&task.action);
                let graph = Arc::clone(self);
                let task_name = task.name.clone();

                tracing::info!("Starting '{}'...", task_name);
                let handle = running.spawn(async move {
                    let task_start = Instant::now();
                    let result = action(graph).await;
                    (node, task_name, task_start.elapsed(), result)
                });
                names_by_id.insert(handle.id(), plan[node].name.clone());
            }

            let Some(joined) = running.join_next_with_id().await else {
                break;
            };

            let (node, task_name, elapsed, result) = match joined {
                Ok((_, done)) => done,
                Err(e) => {
                    running.abort_all();
                    let name = names_by_id.remove(&e.id()).unwrap_or_default();
                    return Err(TaskError::Panicked(name));
                }
            };

            if let Err(e) = result {
                tracing::error!("'{}' errored after {:?}: {}", task_name, elapsed, e);
                running.abort_all();
                return Err(TaskError::Failed {
                    task: task_name,
                    message: e.to_string(),
                });
            }

            tracing::info!("Finished '{}' after {:?}", task_name, elapsed);
            completed.insert(node);
            order.push(task_name);
        }

        Ok(RunReport {
            completed: order,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Run several tasks one after another, as given on the command line.
    pub async fn run_all(self: &Arc<Self>, names: &[String]) -> Result<Vec<RunReport>, TaskError> {
        let mut reports = Vec::with_capacity(names.len());
        for name in names {
            reports.push(self.run(name).await?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::graph::ActionError;

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(graph: &mut TaskGraph, log: &Log, name: &'static str, deps: &[&str]) {
        let log = Arc::clone(log);
        graph
            .declare(name, deps, move |_| {
                let log = Arc::clone(&log);
                async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    log.lock().unwrap().push(name.to_string());
                    Ok(())
                }
            })
            .unwrap();
    }

    #[tokio::test]
    async fn deploy_runs_after_all_prerequisites() {
        let log: Log = Arc::default();
        let mut graph = TaskGraph::new();

        for name in ["minify:html", "minify:img", "minify:css", "vendor", "minify:js"] {
            record(&mut graph, &log, name, &[]);
        }
        record(
            &mut graph,
            &log,
            "surge",
            &["minify:html", "minify:img", "minify:css", "vendor", "minify:js"],
        );
        record(&mut graph, &log, "deploy", &["surge"]);

        let graph = Arc::new(graph);
        let report = graph.run("deploy").await.unwrap();

        let log = log.lock().unwrap().clone();
        assert_eq!(log.len(), 7);
        assert_eq!(log[5], "surge");
        assert_eq!(log[6], "deploy");
        assert_eq!(report.completed, log);
    }

    #[tokio::test]
    async fn shared_prerequisite_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut graph = TaskGraph::new();

        let counter = Arc::clone(&count);
        graph
            .declare("vendor", &[], move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .unwrap();
        graph.alias("serve", &["vendor"]).unwrap();
        graph.alias("surge", &["vendor"]).unwrap();
        graph.alias("all", &["serve", "surge"]).unwrap();

        let graph = Arc::new(graph);
        let report = graph.run("all").await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(report.completed.len(), 4);
        assert_eq!(report.completed.last().map(String::as_str), Some("all"));
    }

    #[tokio::test]
    async fn failure_aborts_dependents() {
        let log: Log = Arc::default();
        let mut graph = TaskGraph::new();

        graph
            .declare("vendor", &[], |_| async {
                Err::<(), ActionError>("missing node_modules/jquery/dist/jquery.min.js".into())
            })
            .unwrap();
        record(&mut graph, &log, "surge", &["vendor"]);

        let graph = Arc::new(graph);
        let err = graph.run("surge").await.unwrap_err();

        match err {
            TaskError::Failed { task, message } => {
                assert_eq!(task, "vendor");
                assert!(message.contains("jquery"));
            }
            other => panic!("expected task failure, got {:?}", other),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn actions_can_run_other_tasks() {
        let log: Log = Arc::default();
        let mut graph = TaskGraph::new();

        record(&mut graph, &log, "compile:scss", &[]);
        graph
            .declare("rebuild", &[], |graph| async move {
                graph.run("compile:scss").await?;
                Ok::<_, ActionError>(())
            })
            .unwrap();

        let graph = Arc::new(graph);
        graph.run("rebuild").await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["compile:scss".to_string()]);
    }

    #[tokio::test]
    async fn unknown_task_is_an_error() {
        let graph = Arc::new(TaskGraph::new());

        let err = graph.run("serve").await.unwrap_err();
        assert!(matches!(err, TaskError::UnknownTask(name) if name == "serve"));
    }

    #[test]
    fn runs_tasks_in_sequence() {
        let log: Log = Arc::default();
        let mut graph = TaskGraph::new();
        record(&mut graph, &log, "clean", &[]);
        record(&mut graph, &log, "vendor", &[]);
        let graph = Arc::new(graph);

        let names = vec!["clean".to_string(), "vendor".to_string()];
        let reports = tokio_test::block_on(graph.run_all(&names)).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(*log.lock().unwrap(), names);
    }
}
