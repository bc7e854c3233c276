//! Drop notifications. The tracker hands a [`PushMessage`] and the owner's
//! tokens to [`Notifier::notify`]; the transport decides how it reaches a device.

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::policy::PriceDrop;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NotifyError {
    #[error("push request failed: {0}")]
    Request(String),

    #[error("push endpoint rejected token with HTTP {0}")]
    Rejected(u16),

    #[error("failed to build push client: {0}")]
    ClientBuild(String),
}

/// Title, body and key/value metadata for one notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn price_drop(drop: &PriceDrop) -> Self {
        let label = drop.site.label();
        let subject = drop.favorite_name.as_deref().unwrap_or("Your favorite");

        let mut data = BTreeMap::new();
        data.insert("url".to_string(), drop.url.clone());
        data.insert("site".to_string(), label.to_string());
        data.insert("favoriteId".to_string(), drop.favorite_id.clone());
        data.insert("price".to_string(), format!("{:.2}", drop.price));
        data.insert("previousPrice".to_string(), format!("{:.2}", drop.previous_price));

        Self {
            title: format!("Price drop on {label}"),
            body: format!(
                "{subject} is now {:.2} TL (was {:.2} TL, -{:.0}%)",
                drop.price,
                drop.previous_price,
                drop.percent()
            ),
            data,
        }
    }
}

/// Delivers one message to one recipient token.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub token: String,
    pub result: Result<(), NotifyError>,
}

/// Fans a message out to every recipient. One failed token never stops the others.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn PushTransport>,
}

impl Notifier {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    pub async fn notify(&self, tokens: &[String], message: &PushMessage) -> Vec<DeliveryOutcome> {
        let sends = tokens.iter().map(|token| async move {
            let result = self.transport.send(token, message).await;
            if let Err(e) = &result {
                tracing::warn!(token = %redact(token), error = %e, "Push delivery failed");
            }
            DeliveryOutcome {
                token: token.clone(),
                result,
            }
        });
        join_all(sends).await
    }
}

fn redact(token: &str) -> String {
    let shown: String = token.chars().take(6).collect();
    format!("{shown}…")
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a BTreeMap<String, String>,
}

/// JSON POST per token to a push gateway.
pub struct HttpPushTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpPushTransport {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(Config::PUSH_TIMEOUT_SECS))
            .build()
            .map_err(|e| NotifyError::ClientBuild(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), NotifyError> {
        let payload = PushRequest {
            to: token,
            title: &message.title,
            body: &message.body,
            data: &message.data,
        };
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl PushTransport for LogTransport {
    async fn send(&self, token: &str, message: &PushMessage) -> Result<(), NotifyError> {
        tracing::info!(
            token = %redact(token),
            title = %message.title,
            body = %message.body,
            url = message.data.get("url").map(String::as_str).unwrap_or_default(),
            "Notification"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteKey;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PushTransport for RecordingTransport {
        async fn send(&self, token: &str, _message: &PushMessage) -> Result<(), NotifyError> {
            self.sent.lock().push(token.to_string());
            if token.starts_with("bad") {
                return Err(NotifyError::Rejected(410));
            }
            Ok(())
        }
    }

    fn drop_event() -> PriceDrop {
        PriceDrop {
            favorite_id: "fav-1".to_string(),
            favorite_name: Some("Kulaklık".to_string()),
            site: SiteKey::Hepsiburada,
            previous_price: 1000.0,
            price: 850.0,
            url: "https://www.hepsiburada.com/kulaklik-p-1".to_string(),
        }
    }

    #[test]
    fn test_price_drop_message() {
        let message = PushMessage::price_drop(&drop_event());
        assert_eq!(message.title, "Price drop on Hepsiburada");
        assert_eq!(message.body, "Kulaklık is now 850.00 TL (was 1000.00 TL, -15%)");
        assert_eq!(message.data["url"], "https://www.hepsiburada.com/kulaklik-p-1");
        assert_eq!(message.data["site"], "Hepsiburada");
        assert_eq!(message.data["price"], "850.00");
        assert_eq!(message.data["favoriteId"], "fav-1");
    }

    #[tokio::test]
    async fn test_one_failed_recipient_does_not_stop_others() {
        let transport = Arc::new(RecordingTransport::default());
        let notifier = Notifier::new(transport.clone());
        let tokens = vec!["good-1".to_string(), "bad-2".to_string(), "good-3".to_string()];

        let outcomes = notifier.notify(&tokens, &PushMessage::price_drop(&drop_event())).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert_eq!(outcomes[1].result, Err(NotifyError::Rejected(410)));
        assert!(outcomes[2].result.is_ok());
        assert_eq!(transport.sent.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_no_tokens_no_sends() {
        let notifier = Notifier::new(Arc::new(LogTransport));
        let outcomes = notifier.notify(&[], &PushMessage::price_drop(&drop_event())).await;
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_redact() {
        assert_eq!(redact("ExponentPushToken[abc]"), "Expone…");
    }
}
