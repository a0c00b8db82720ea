use crate::queue::Task;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// FIFO queue of pending tasks shared by all workers
///
/// The queue only knows about pending work. Tasks that have been popped and
/// are still being processed are invisible here, so the scheduler tracks
/// in-flight work separately before deciding the run is over.
#[derive(Debug, Default)]
pub struct TaskQueue {
    items: Mutex<VecDeque<Task>>,
}

impl TaskQueue {
    /// Creates an empty queue
    ///
    /// The queue is returned in an `Arc` because every task added to it keeps
    /// a weak back-reference for re-enqueueing.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Appends a task to the back of the queue
    pub fn add(self: &Arc<Self>, mut task: Task) {
        task.set_owner(self);
        self.lock().push_back(task);
    }

    /// Removes and returns the task at the front of the queue
    ///
    /// Returns None when nothing is pending.
    pub fn pop(&self) -> Option<Task> {
        self.lock().pop_front()
    }

    /// Returns the number of pending tasks
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns whether no task is pending
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns every pending task in FIFO order
    pub fn drain(&self) -> Vec<Task> {
        self.lock().drain(..).collect()
    }

    /// Returns the URLs of pending tasks without removing them
    pub fn snapshot_urls(&self) -> Vec<String> {
        self.lock().iter().map(|t| t.url().to_string()).collect()
    }

    // Critical sections are single VecDeque operations, so a poisoned guard is still consistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Task>> {
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}
