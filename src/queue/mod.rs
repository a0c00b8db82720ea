//! Task queue feeding the job scheduler
//!
//! This module contains the unit of scheduled work and the shared queue
//! workers pull it from:
//! - `Task`: a URL plus caller metadata, able to re-enter its origin queue
//! - `TaskQueue`: FIFO collection of pending tasks guarded by a mutex

mod task;
mod task_queue;

pub use task::Task;
pub use task_queue::TaskQueue;
