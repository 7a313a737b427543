//! Webhook delivery of newly emitted signals

use std::time::Duration;

use reqwest::Client;
use shared::{NotifierConfig, Signal};
use tracing::{debug, warn};

use crate::Result;

/// POSTs each signal as JSON; failures are logged, never returned
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// `None` when no webhook URL is configured
    pub fn from_config(config: &NotifierConfig) -> Result<Option<Self>> {
        config
            .webhook_url
            .as_ref()
            .map(|url| Self::new(url.clone(), Duration::from_secs(config.timeout_secs)))
            .transpose()
    }

    /// Returns whether the endpoint accepted the signal
    pub async fn notify(&self, signal: &Signal) -> bool {
        match self.client.post(&self.url).json(signal).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Delivered {} {} to webhook", signal.symbol, signal.signal_type);
                true
            }
            Ok(response) => {
                warn!("Webhook rejected {} signal: {}", signal.symbol, response.status());
                false
            }
            Err(e) => {
                warn!("Webhook delivery failed for {}: {}", signal.symbol, e);
                false
            }
        }
    }

    /// Deliver in order; returns how many were accepted
    pub async fn notify_all(&self, signals: &[Signal]) -> usize {
        let mut delivered = 0;
        for signal in signals {
            if self.notify(signal).await {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::Utc;
    use shared::{SignalType, Timeframe};

    fn signal(symbol: &str) -> Signal {
        Signal {
            symbol: symbol.to_string(),
            signal_type: SignalType::Buy,
            entry_price: 1.1,
            stop_loss: 1.098,
            take_profit: 1.104,
            confidence: 0.8,
            timestamp: Utc::now(),
            timeframe: Timeframe::H1,
            risk_reward_ratio: 2.0,
        }
    }

    /// Webhook accepting signals on `/hook` and refusing everything on `/reject`
    async fn serve(received: Arc<AtomicUsize>) -> String {
        let app = Router::new()
            .route(
                "/hook",
                post(|State(received): State<Arc<AtomicUsize>>, Json(signal): Json<Signal>| async move {
                    if signal.symbol.is_empty() {
                        return StatusCode::BAD_REQUEST;
                    }
                    received.fetch_add(1, Ordering::SeqCst);
                    StatusCode::OK
                }),
            )
            .route("/reject", post(|| async { StatusCode::SERVICE_UNAVAILABLE }))
            .with_state(received);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_disabled_without_url() {
        assert!(WebhookNotifier::from_config(&NotifierConfig::default()).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_swallowed() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hook", Duration::from_millis(500)).unwrap();
        assert_eq!(notifier.notify_all(&[signal("EURUSD")]).await, 0);
    }

    #[tokio::test]
    async fn test_delivers_to_accepting_webhook() {
        let received = Arc::new(AtomicUsize::new(0));
        let base = serve(received.clone()).await;

        let config = NotifierConfig {
            webhook_url: Some(format!("{}/hook", base)),
            timeout_secs: 5,
        };
        let notifier = WebhookNotifier::from_config(&config).unwrap().unwrap();
        let delivered = notifier.notify_all(&[signal("EURUSD"), signal("GBPUSD")]).await;
        assert_eq!(delivered, 2);
        assert_eq!(received.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_delivery_is_not_counted() {
        let received = Arc::new(AtomicUsize::new(0));
        let base = serve(received.clone()).await;

        let notifier = WebhookNotifier::new(format!("{}/reject", base), Duration::from_secs(5)).unwrap();
        assert!(!notifier.notify(&signal("EURUSD")).await);
        assert_eq!(received.load(Ordering::SeqCst), 0);
    }
}
