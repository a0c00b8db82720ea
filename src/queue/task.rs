use crate::queue::TaskQueue;
use crate::GatherError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// A unit of scheduled crawl work
///
/// The URL is fixed at creation; callers may attach metadata that travels
/// with the task through the queue and into the request context. Once a task
/// has been added to a [`TaskQueue`] it remembers that queue so a failure
/// hook can hand it back with [`Task::requeue`].
#[derive(Debug, Clone)]
pub struct Task {
    url: String,

    /// Caller-attached data (e.g. values scraped from a listing page)
    pub metadata: HashMap<String, Value>,

    created_at: DateTime<Utc>,

    requeue_count: u32,

    owner: Weak<TaskQueue>,
}

impl Task {
    /// Creates a task for the given URL with no metadata
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            requeue_count: 0,
            owner: Weak::new(),
        }
    }

    /// Attaches a metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The URL to fetch
    pub fn url(&self) -> &str {
        &self.url
    }

    /// When the task was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// How many times this task has been handed back to its queue
    pub fn requeue_count(&self) -> u32 {
        self.requeue_count
    }

    /// Returns the queue this task was last added to, if it still exists
    pub fn owner(&self) -> Option<Arc<TaskQueue>> {
        self.owner.upgrade()
    }

    pub(crate) fn set_owner(&mut self, queue: &Arc<TaskQueue>) {
        self.owner = Arc::downgrade(queue);
    }

    /// Re-enqueues this task at the back of its origin queue
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The task is pending again
    /// * `Err(GatherError::QueueDropped)` - The task was never queued or its queue is gone
    pub fn requeue(mut self) -> Result<(), GatherError> {
        let queue = self.owner().ok_or(GatherError::QueueDropped)?;
        self.requeue_count += 1;
        tracing::debug!(url = %self.url, requeues = self.requeue_count, "Task re-enqueued");
        queue.add(self);
        Ok(())
    }
}
