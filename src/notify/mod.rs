//! Push notification delivery. Services compose a [`PushMessage`] and hand
//! it to a [`Notifier`]; delivery results come back per token so callers can
//! prune registrations the push service rejected.

/// Firebase Cloud Messaging HTTP client.
pub mod fcm;

pub use fcm::FcmNotifier;

use std::collections::HashMap;

use futures::future::BoxFuture;
use tracing::info;

/// Rendered notification plus its machine-readable data payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    /// Key/value payload the mobile app uses to route taps.
    pub data: HashMap<String, String>,
}

/// Outcome of delivering one message to one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// The push service accepted the message.
    Delivered,
    /// The token is dead and must be removed from the user's profile.
    InvalidToken { code: String },
    /// Transient failure; the token stays registered.
    Failed { code: String },
}

/// Per-token delivery report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDelivery {
    pub token: String,
    pub status: DeliveryStatus,
}

impl TokenDelivery {
    /// Whether the token should be purged from user profiles.
    pub fn is_invalid(&self) -> bool {
        matches!(self.status, DeliveryStatus::InvalidToken { .. })
    }
}

/// Push delivery facade the services depend on.
pub trait Notifier: Send + Sync {
    /// Deliver `message` to every token, reporting per-token status.
    /// Delivery problems are reported in the result, never as an error.
    fn send(
        &self,
        tokens: Vec<String>,
        message: PushMessage,
    ) -> BoxFuture<'static, Vec<TokenDelivery>>;
}

/// Fallback notifier used when no push credentials are configured. Logs the
/// message and reports every token as delivered.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(
        &self,
        tokens: Vec<String>,
        message: PushMessage,
    ) -> BoxFuture<'static, Vec<TokenDelivery>> {
        Box::pin(async move {
            info!(
                title = %message.title,
                body = %message.body,
                tokens = tokens.len(),
                "push delivery disabled, logging instead"
            );
            tokens
                .into_iter()
                .map(|token| TokenDelivery {
                    token,
                    status: DeliveryStatus::Delivered,
                })
                .collect()
        })
    }
}
