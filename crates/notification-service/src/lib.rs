mod smtp;
mod templates;

pub use smtp::SmtpNotifier;
pub use templates::EmailTemplate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A notification ready to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Alert kind key, e.g. "MA50" or "MA200_Crossover_Up".
    pub kind: String,
    pub symbol: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub subject: String,
    /// Pre-rendered HTML fragment describing the alert.
    pub body_html: String,
}

impl Alert {
    pub fn new(
        kind: impl Into<String>,
        symbol: impl Into<String>,
        subject: impl Into<String>,
        body_html: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            symbol: symbol.into(),
            timestamp: chrono::Utc::now(),
            subject: subject.into(),
            body_html: body_html.into(),
        }
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
}

#[derive(Debug, Clone, Default)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let smtp_to = std::env::var("ALERT_EMAIL_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let smtp_tls = match std::env::var("SMTP_TLS").unwrap_or_default().as_str() {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            smtp_host: std::env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(587),
            smtp_username: std::env::var("SMTP_USERNAME")
                .ok()
                .filter(|s| !s.is_empty()),
            smtp_password: std::env::var("SMTP_PASSWORD")
                .ok()
                .filter(|s| !s.is_empty()),
            smtp_from: std::env::var("SMTP_FROM_ADDRESS")
                .ok()
                .filter(|s| !s.is_empty()),
            smtp_to,
            smtp_tls,
        }
    }
}

/// Dispatches alerts to all configured channels.
pub struct NotificationService {
    channels: std::sync::Arc<Vec<Box<dyn NotificationChannel>>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();

        if config.smtp_host.is_some() && config.smtp_from.is_some() && !config.smtp_to.is_empty() {
            match SmtpNotifier::new(config) {
                Ok(notifier) => {
                    tracing::info!(
                        "Email alerts enabled (SMTP -> {} recipients)",
                        config.smtp_to.len()
                    );
                    channels.push(Box::new(notifier));
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP notifier: {}", e);
                }
            }
        }

        if channels.is_empty() {
            tracing::info!("Email alerts disabled (set SMTP_HOST, SMTP_FROM_ADDRESS, ALERT_EMAIL_TO)");
        }

        Self {
            channels: std::sync::Arc::new(channels),
        }
    }

    fn from_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            channels: std::sync::Arc::new(channels),
        }
    }

    /// Whether at least one channel is configured.
    pub fn is_enabled(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Send an alert to all configured channels (fire-and-forget via tokio::spawn).
    pub fn send_alert(&self, alert: Alert) {
        let channels = self.channels.clone();
        tokio::spawn(async move {
            for channel in channels.iter() {
                match channel.send(&alert).await {
                    Ok(()) => tracing::debug!("Sent alert via {}", channel.name()),
                    Err(e) => {
                        tracing::warn!("Failed to send alert via {}: {}", channel.name(), e)
                    }
                }
            }
        });
    }

    /// Send an alert to all channels, awaiting completion.
    pub async fn send_alert_async(&self, alert: &Alert) {
        for channel in self.channels.iter() {
            match channel.send(alert).await {
                Ok(()) => tracing::debug!("Sent alert via {}", channel.name()),
                Err(e) => {
                    tracing::warn!("Failed to send alert via {}: {}", channel.name(), e)
                }
            }
        }
    }
}
