//! Named one-shot tasks on a single logical clock.
//!
//! At most one instance of each `Task` is pending. Starting a pending task
//! cancels it and schedules it again, which is what debouncing needs.

use std::collections::HashMap;
use std::time::Duration;

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Scan visible items and submit a generation batch.
    GenerateVisible,
    /// Smooth the next queued thumbnail.
    SmoothNext,
    /// Advance the busy animation by one frame.
    BusyFrame,
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Duration,
    /// Insertion order, used to break ties between equal deadlines.
    seq: u64,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now: Duration,
    pending: HashMap<Task, Deadline>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Schedule `task` to run `delay` from now, replacing any pending instance.
    pub fn start(&mut self, task: Task, delay: Duration) {
        let deadline = Deadline {
            at: self.now + delay,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        trace!(?task, ?delay, "Scheduled task");
        self.pending.insert(task, deadline);
    }

    /// Cancel a pending task. Returns true if it was pending.
    pub fn stop(&mut self, task: Task) -> bool {
        self.pending.remove(&task).is_some()
    }

    pub fn is_active(&self, task: Task) -> bool {
        self.pending.contains_key(&task)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.values().map(|d| d.at).min()
    }

    /// Pop the earliest task due at or before `limit`, moving the clock to its deadline.
    pub fn pop_due(&mut self, limit: Duration) -> Option<Task> {
        let (task, deadline) = self
            .pending
            .iter()
            .filter(|(_, d)| d.at <= limit)
            .min_by_key(|(_, d)| (d.at, d.seq))
            .map(|(task, d)| (*task, *d))?;
        self.pending.remove(&task);
        self.now = self.now.max(deadline.at);
        Some(task)
    }

    /// Move the clock forward. The clock never runs backwards.
    pub fn advance_to(&mut self, time: Duration) {
        self.now = self.now.max(time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_restart_replaces_pending_instance() {
        let mut scheduler = Scheduler::new();
        scheduler.start(Task::GenerateVisible, 500 * MS);
        scheduler.advance_to(300 * MS);
        scheduler.start(Task::GenerateVisible, 500 * MS);

        assert_eq!(scheduler.pop_due(600 * MS), None);
        assert_eq!(scheduler.pop_due(800 * MS), Some(Task::GenerateVisible));
        assert_eq!(scheduler.now(), 800 * MS);
        assert!(!scheduler.has_pending());
    }

    #[test]
    fn test_due_tasks_pop_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        scheduler.start(Task::SmoothNext, 200 * MS);
        scheduler.start(Task::BusyFrame, 100 * MS);
        scheduler.start(Task::GenerateVisible, 200 * MS);

        assert_eq!(scheduler.pop_due(Duration::MAX), Some(Task::BusyFrame));
        assert_eq!(scheduler.pop_due(Duration::MAX), Some(Task::SmoothNext));
        assert_eq!(scheduler.pop_due(Duration::MAX), Some(Task::GenerateVisible));
        assert_eq!(scheduler.pop_due(Duration::MAX), None);
    }

    #[test]
    fn test_stop_cancels() {
        let mut scheduler = Scheduler::new();
        scheduler.start(Task::SmoothNext, Duration::ZERO);
        assert!(scheduler.is_active(Task::SmoothNext));
        assert!(scheduler.stop(Task::SmoothNext));
        assert!(!scheduler.stop(Task::SmoothNext));
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_clock_never_runs_backwards() {
        let mut scheduler = Scheduler::new();
        scheduler.advance_to(50 * MS);
        scheduler.advance_to(10 * MS);
        assert_eq!(scheduler.now(), 50 * MS);
    }
}
