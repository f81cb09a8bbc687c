//! Job engine: dispatch queues, retry policy, execution units, and the manager.

pub mod builder;
pub mod clock;
pub mod config;
pub mod constraint;
pub mod job;
pub mod manager;
pub mod prelude;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod store;
pub mod unit;

pub use builder::JobBuilder;
pub use config::ManagerConfig;
pub use job::{CancelReason, Job, JobContext, JobError, RetryConstraint};
pub use manager::{Manager, ManagerBuilder};
pub use registry::{JobCreator, JobKind, JobRegistry};

// vim: ts=4
