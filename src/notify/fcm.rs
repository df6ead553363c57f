use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{DeliveryStatus, Notifier, PushMessage, TokenDelivery};

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";

/// The FCM batch API caps one request at this many registration tokens.
const MAX_TOKENS_PER_REQUEST: usize = 500;

/// Error codes FCM uses for registrations that will never work again.
const DEAD_TOKEN_CODES: [&str; 2] = ["NotRegistered", "InvalidRegistration"];

/// Notifier backed by the Firebase Cloud Messaging HTTP API.
#[derive(Clone)]
pub struct FcmNotifier {
    inner: Arc<FcmInner>,
}

struct FcmInner {
    client: reqwest::Client,
    server_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct FcmRequest<'a> {
    registration_ids: &'a [String],
    notification: FcmNotification<'a>,
    data: &'a HashMap<String, String>,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct FcmResponse {
    results: Vec<FcmResult>,
}

#[derive(Deserialize)]
struct FcmResult {
    error: Option<String>,
}

impl FcmNotifier {
    pub fn new(server_key: String) -> Self {
        Self::with_endpoint(server_key, FCM_ENDPOINT.to_owned())
    }

    /// Point the notifier at a custom endpoint (local stubs in tests).
    pub fn with_endpoint(server_key: String, endpoint: String) -> Self {
        Self {
            inner: Arc::new(FcmInner {
                client: reqwest::Client::new(),
                server_key,
                endpoint,
            }),
        }
    }

    async fn send_chunk(&self, tokens: &[String], message: &PushMessage) -> Vec<TokenDelivery> {
        let request = FcmRequest {
            registration_ids: tokens,
            notification: FcmNotification {
                title: &message.title,
                body: &message.body,
            },
            data: &message.data,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("key={}", self.inner.server_key),
            )
            .json(&request)
            .send()
            .await;

        let parsed: Result<FcmResponse, String> = match response {
            Ok(response) if response.status().is_success() => {
                response.json().await.map_err(|err| err.to_string())
            }
            Ok(response) => Err(format!("http status {}", response.status())),
            Err(err) => Err(err.to_string()),
        };

        match parsed {
            Ok(body) => tokens
                .iter()
                .zip(body.results)
                .map(|(token, result)| {
                    let status = match result.error {
                        None => DeliveryStatus::Delivered,
                        Some(code) if DEAD_TOKEN_CODES.contains(&code.as_str()) => {
                            DeliveryStatus::InvalidToken { code }
                        }
                        Some(code) => DeliveryStatus::Failed { code },
                    };
                    TokenDelivery {
                        token: token.clone(),
                        status,
                    }
                })
                .collect(),
            Err(code) => {
                warn!(%code, tokens = tokens.len(), "FCM request failed");
                tokens
                    .iter()
                    .map(|token| TokenDelivery {
                        token: token.clone(),
                        status: DeliveryStatus::Failed { code: code.clone() },
                    })
                    .collect()
            }
        }
    }
}

impl Notifier for FcmNotifier {
    fn send(
        &self,
        tokens: Vec<String>,
        message: PushMessage,
    ) -> BoxFuture<'static, Vec<TokenDelivery>> {
        let notifier = self.clone();
        Box::pin(async move {
            let mut deliveries = Vec::with_capacity(tokens.len());
            for chunk in tokens.chunks(MAX_TOKENS_PER_REQUEST) {
                deliveries.extend(notifier.send_chunk(chunk, &message).await);
            }
            deliveries
        })
    }
}
