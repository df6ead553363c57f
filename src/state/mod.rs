use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::{RwLock, watch};

use crate::{
    clock::Clock, config::AppConfig, dao::booking_store::BookingStore, error::ServiceError,
    notify::Notifier, sched::TaskQueue,
};

pub type SharedState = Arc<AppState>;

/// Central application state storing the storage handle and the shared
/// service dependencies.
pub struct AppState {
    booking_store: RwLock<Option<Arc<dyn BookingStore>>>,
    degraded: watch::Sender<bool>,
    notifier: Arc<dyn Notifier>,
    tasks: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        tasks: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            booking_store: RwLock::new(None),
            degraded: degraded_tx,
            notifier,
            tasks,
            clock,
            config,
        })
    }

    /// Obtain a handle to the current booking store, if one is installed.
    pub async fn booking_store(&self) -> Option<Arc<dyn BookingStore>> {
        let guard = self.booking_store.read().await;
        guard.as_ref().cloned()
    }

    /// Booking store handle, or [`ServiceError::Degraded`] when none is
    /// installed.
    pub async fn require_store(&self) -> Result<Arc<dyn BookingStore>, ServiceError> {
        self.booking_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new booking store implementation and leave degraded mode.
    pub async fn install_booking_store(&self, store: Arc<dyn BookingStore>) {
        {
            let mut guard = self.booking_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current booking store and enter degraded mode.
    pub async fn clear_booking_store(&self) {
        {
            let mut guard = self.booking_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.booking_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Push delivery handle.
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Delayed task scheduling handle.
    pub fn tasks(&self) -> Arc<dyn TaskQueue> {
        Arc::clone(&self.tasks)
    }

    /// Current instant from the application clock.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Booking policy configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub(crate) async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }

        let _ = self.degraded.send(value);
    }
}
