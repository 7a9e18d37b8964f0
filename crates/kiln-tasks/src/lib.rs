//! Task graph for kiln builds.
//!
//! A [`TaskGraph`] maps task names to their declared prerequisites and an
//! async action. Running a task first runs everything it depends on, each
//! at most once, with independent tasks scheduled concurrently.

pub mod graph;
pub mod runner;

pub use graph::{Action, ActionError, ActionFuture, Task, TaskError, TaskGraph};
pub use runner::RunReport;
