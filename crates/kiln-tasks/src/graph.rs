//! Task declarations and dependency validation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};

/// Error type returned by task actions.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Future produced by a task action.
pub type ActionFuture = BoxFuture<'static, Result<(), ActionError>>;

/// A task body. It receives the graph so long-running tasks can trigger
/// other tasks by name.
pub type Action = Arc<dyn Fn(Arc<TaskGraph>) -> ActionFuture + Send + Sync>;

/// A named unit of build work.
#[derive(Clone)]
pub struct Task {
    /// Unique task name
    pub name: String,

    /// Names of tasks that must complete first
    pub dependencies: Vec<String>,

    pub(crate) action: Action,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Errors raised while declaring or running tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task '{0}' is not declared")]
    UnknownTask(String),

    #[error("Task '{0}' is declared twice")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on undeclared task '{dependency}'")]
    MissingDependency { task: String, dependency: String },

    #[error("Dependency cycle involving task '{0}'")]
    Cycle(String),

    #[error("Task '{task}' failed: {message}")]
    Failed { task: String, message: String },

    #[error("Task '{0}' panicked")]
    Panicked(String),
}

/// The set of declared tasks.
#[derive(Default)]
pub struct TaskGraph {
    tasks: HashMap<String, Task>,
    /// Declaration order, for listing
    order: Vec<String>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a task with its prerequisites and action.
    ///
    /// Dependencies are checked lazily by [`TaskGraph::validate`] and when
    /// the task is run, so tasks may be declared in any order.
    pub fn declare<F, Fut>(
        &mut self,
        name: &str,
        dependencies: &[&str],
        action: F,
    ) -> Result<(), TaskError>
    where
        F: Fn(Arc<TaskGraph>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        if self.tasks.contains_key(name) {
            return Err(TaskError::DuplicateTask(name.to_string()));
        }

        let action: Action = Arc::new(move |graph| Box::pin(action(graph)));

        self.tasks.insert(
            name.to_string(),
            Task {
                name: name.to_string(),
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
                action,
            },
        );
        self.order.push(name.to_string());

        Ok(())
    }

    /// Declare a task that only groups its prerequisites.
    pub fn alias(&mut self, name: &str, dependencies: &[&str]) -> Result<(), TaskError> {
        self.declare(name, dependencies, |_| async { Ok(()) })
    }

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    /// Declared prerequisites of a task.
    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.tasks.get(name).map(|t| t.dependencies.as_slice())
    }

    /// Task names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Number of declared tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task has been declared.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Check that every dependency is declared and the graph is acyclic.
    pub fn validate(&self) -> Result<(), TaskError> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let nodes: HashMap<&str, NodeIndex> = self
            .order
            .iter()
            .map(|name| (name.as_str(), graph.add_node(name.as_str())))
            .collect();

        for name in &self.order {
            let task = &self.tasks[name];
            for dep in &task.dependencies {
                let Some(&dep_node) = nodes.get(dep.as_str()) else {
                    return Err(TaskError::MissingDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                };
                graph.add_edge(dep_node, nodes[name.as_str()], ());
            }
        }

        algo::toposort(&graph, None)
            .map(|_| ())
            .map_err(|cycle| TaskError::Cycle(graph[cycle.node_id()].to_string()))
    }

    /// Build the dependency subgraph reachable from `root`.
    ///
    /// Edges point from a prerequisite to its dependent.
    pub(crate) fn plan(&self, root: &str) -> Result<DiGraph<Task, ()>, TaskError> {
        if !self.tasks.contains_key(root) {
            return Err(TaskError::UnknownTask(root.to_string()));
        }

        let mut graph: DiGraph<Task, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        let mut stack = vec![root];

        while let Some(name) = stack.pop() {
            if nodes.contains_key(name) {
                continue;
            }
            let task = &self.tasks[name];
            nodes.insert(name, graph.add_node(task.clone()));

            for dep in &task.dependencies {
                if !self.tasks.contains_key(dep.as_str()) {
                    return Err(TaskError::MissingDependency {
                        task: name.to_string(),
                        dependency: dep.clone(),
                    });
                }
                stack.push(dep.as_str());
            }
        }

        for (name, &node) in &nodes {
            for dep in &self.tasks[*name].dependencies {
                graph.add_edge(nodes[dep.as_str()], node, ());
            }
        }

        if let Err(cycle) = algo::toposort(&graph, None) {
            return Err(TaskError::Cycle(graph[cycle.node_id()].name.clone()));
        }

        Ok(graph)
    }
}
