//! Keeps the booking store connected. While the backend is unreachable the
//! shared state is flagged degraded, which turns booking traffic away with
//! 503s until the connection recovers.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{booking_store::BookingStore, storage::StorageError},
    state::SharedState,
};

const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const RECONNECT_ATTEMPTS: u32 = 3;

/// Exponential backoff between connection attempts, capped so a long outage
/// still gets probed every few seconds.
struct Backoff {
    delay: Duration,
}

impl Backoff {
    const FLOOR: Duration = Duration::from_secs(1);
    const CEILING: Duration = Duration::from_secs(10);

    fn new() -> Self {
        Self { delay: Self::FLOOR }
    }

    fn reset(&mut self) {
        self.delay = Self::FLOOR;
    }

    async fn wait(&mut self) {
        sleep(self.delay).await;
        self.delay = (self.delay * 2).min(Self::CEILING);
    }
}

/// Drive the store connection until the process exits. `connect` builds a
/// fresh client; it is called again whenever the current one is written off.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn BookingStore>, StorageError>> + Send,
{
    let mut backoff = Backoff::new();

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "booking store connection failed");
                backoff.wait().await;
                continue;
            }
        };

        state.install_booking_store(store.clone()).await;
        info!("booking store connected");
        backoff.reset();

        watch_health(&state, store.as_ref()).await;

        warn!("booking store written off; rebuilding the client");
        backoff.wait().await;
    }
}

/// Poll the store until it stops answering and cannot be reconnected.
///
/// A failed ping flips degraded mode on immediately so bookings stop
/// mutating state we cannot persist; a successful reconnect flips it back.
async fn watch_health(state: &SharedState, store: &dyn BookingStore) {
    loop {
        if store.health_check().await.is_ok() {
            if state.is_degraded().await {
                info!("booking store answering again; leaving degraded mode");
                state.update_degraded(false).await;
            }
            sleep(HEALTH_POLL_INTERVAL).await;
            continue;
        }

        warn!("booking store ping failed; entering degraded mode");
        state.update_degraded(true).await;

        let mut retry = Backoff::new();
        for attempt in 1..=RECONNECT_ATTEMPTS {
            match store.try_reconnect().await {
                Ok(()) => {
                    info!(attempt, "booking store reconnected");
                    state.update_degraded(false).await;
                    break;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "booking store reconnect failed");
                    if attempt == RECONNECT_ATTEMPTS {
                        return;
                    }
                    retry.wait().await;
                }
            }
        }

        sleep(HEALTH_POLL_INTERVAL).await;
    }
}
