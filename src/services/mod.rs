//! Reconciliation services built on the domain ports.

pub mod cache;
pub mod differ;
pub mod orchestrator;
pub mod task;
pub mod worker;

pub use cache::{ModelCache, ResponseCache};
pub use differ::StateDiffer;
pub use orchestrator::TaskOrchestrator;
pub use task::Task;
pub use worker::Worker;
