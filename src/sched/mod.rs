//! Delayed task scheduling. Reminders and waitlist offer expirations are
//! scheduled as in-process timers that push a payload onto a dispatch channel
//! when they fire.

/// Tokio-timer backed queue implementation.
pub mod queue;

pub use queue::DelayQueue;

use time::OffsetDateTime;
use uuid::Uuid;

/// Opaque identifier for a scheduled task, persisted alongside bookings so
/// a cancellation can revoke its reminders.
pub type TaskHandle = String;

/// Work item delivered to the dispatcher when its timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskPayload {
    /// Upcoming-class reminder for one confirmed booking.
    BookingReminder {
        class_id: Uuid,
        user_id: String,
        /// Minutes before class start this reminder was scheduled for.
        interval_minutes: u32,
    },
    /// Post-class validation reminder for an aggregator-pass attendee.
    AggregatorReminder { class_id: Uuid, user_id: String },
    /// A waitlist seat offer reached the end of its claim window.
    WaitlistExpiry { class_id: Uuid, entry_id: Uuid },
}

/// Scheduling facade the services depend on.
pub trait TaskQueue: Send + Sync {
    /// Schedule `payload` to fire at `fire_at`. An instant in the past
    /// fires immediately.
    fn schedule(&self, payload: TaskPayload, fire_at: OffsetDateTime) -> TaskHandle;
    /// Best-effort revocation. Unknown handles (already fired, or from a
    /// previous process) are ignored.
    fn cancel(&self, handle: &TaskHandle);
}

#[cfg(test)]
pub mod testing {
    //! Recording queue for service tests. Nothing ever fires; tests inspect
    //! what was scheduled and drive payloads by hand.

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use time::OffsetDateTime;

    use super::{TaskHandle, TaskPayload, TaskQueue};

    /// One recorded call to [`TaskQueue::schedule`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ScheduledTask {
        pub handle: TaskHandle,
        pub payload: TaskPayload,
        pub fire_at: OffsetDateTime,
    }

    #[derive(Default)]
    pub struct RecordingQueue {
        scheduled: Mutex<Vec<ScheduledTask>>,
        cancelled: Mutex<Vec<TaskHandle>>,
        counter: AtomicU64,
    }

    impl RecordingQueue {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn scheduled(&self) -> Vec<ScheduledTask> {
            self.scheduled.lock().unwrap().clone()
        }

        pub fn cancelled(&self) -> Vec<TaskHandle> {
            self.cancelled.lock().unwrap().clone()
        }
    }

    impl TaskQueue for RecordingQueue {
        fn schedule(&self, payload: TaskPayload, fire_at: OffsetDateTime) -> TaskHandle {
            let handle = format!("task-{}", self.counter.fetch_add(1, Ordering::Relaxed));
            self.scheduled.lock().unwrap().push(ScheduledTask {
                handle: handle.clone(),
                payload,
                fire_at,
            });
            handle
        }

        fn cancel(&self, handle: &TaskHandle) {
            self.cancelled.lock().unwrap().push(handle.clone());
        }
    }
}
