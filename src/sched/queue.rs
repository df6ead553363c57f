use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::AbortHandle;
use tracing::trace;
use uuid::Uuid;

use super::{TaskHandle, TaskPayload, TaskQueue};
use crate::clock::Clock;

/// In-process task queue backed by Tokio timers.
///
/// Each scheduled task is one sleeping Tokio task; firing pushes the payload
/// onto the dispatch channel and forgets the handle. Handles do not survive
/// a restart, so cancelling a handle from a previous process is a no-op,
/// which is the tolerated failure mode: an orphaned reminder re-checks state
/// before sending anything.
pub struct DelayQueue {
    clock: Arc<dyn Clock>,
    tasks: Arc<DashMap<TaskHandle, AbortHandle>>,
    sender: UnboundedSender<TaskPayload>,
}

impl DelayQueue {
    /// Build the queue and the receiving end of its dispatch channel.
    pub fn new(clock: Arc<dyn Clock>) -> (Arc<Self>, UnboundedReceiver<TaskPayload>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            clock,
            tasks: Arc::new(DashMap::new()),
            sender,
        });
        (queue, receiver)
    }
}

impl TaskQueue for DelayQueue {
    fn schedule(&self, payload: TaskPayload, fire_at: time::OffsetDateTime) -> TaskHandle {
        let handle = Uuid::new_v4().to_string();
        let delay = std::time::Duration::try_from(fire_at - self.clock.now())
            .unwrap_or(std::time::Duration::ZERO);

        let tasks = Arc::clone(&self.tasks);
        let sender = self.sender.clone();
        let key = handle.clone();
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tasks.remove(&key);
            // The receiver only drops during shutdown.
            let _ = sender.send(payload);
        });

        trace!(%handle, ?delay, "scheduled task");
        self.tasks.insert(handle.clone(), join.abort_handle());
        handle
    }

    fn cancel(&self, handle: &TaskHandle) {
        if let Some((_, abort)) = self.tasks.remove(handle) {
            abort.abort();
            trace!(%handle, "cancelled task");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use time::macros::datetime;

    use super::*;
    use crate::clock::SystemClock;

    fn payload() -> TaskPayload {
        TaskPayload::WaitlistExpiry {
            class_id: Uuid::new_v4(),
            entry_id: Uuid::new_v4(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_delay() {
        let (queue, mut receiver) = DelayQueue::new(Arc::new(SystemClock));
        let expected = payload();
        queue.schedule(
            expected.clone(),
            SystemClock.now() + time::Duration::minutes(5),
        );

        tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(receiver.recv().await, Some(expected));
        assert!(queue.tasks.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn past_instants_fire_immediately() {
        let (queue, mut receiver) = DelayQueue::new(Arc::new(SystemClock));
        let expected = payload();
        queue.schedule(expected.clone(), datetime!(2000-01-01 00:00 UTC));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(receiver.recv().await, Some(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_tasks_never_fire() {
        let (queue, mut receiver) = DelayQueue::new(Arc::new(SystemClock));
        let handle = queue.schedule(payload(), SystemClock.now() + time::Duration::minutes(5));
        queue.cancel(&handle);

        tokio::time::advance(Duration::from_secs(10 * 60)).await;
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancelling_an_unknown_handle_is_a_no_op() {
        let (queue, _receiver) = DelayQueue::new(Arc::new(SystemClock));
        queue.cancel(&"stale-handle".to_owned());
    }
}
