//! The outbound SMS provider seam.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Errors from an SMS provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider rejected the message, e.g. an unroutable number.
    #[error("provider rejected message: {0}")]
    Rejected(String),

    /// Transport-level failure talking to the provider.
    #[error("provider transport error: {0}")]
    Transport(String),
}

/// An outbound SMS gateway.
///
/// Implementations must be safe to call concurrently. The runner bounds
/// every call with a timeout, so a provider does not need its own deadline
/// handling to keep a batch moving.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsProvider: Send + Sync {
    /// Sends one message and returns the provider's message ID.
    async fn send(&self, phone: &str, body: &str) -> Result<String, ProviderError>;
}

/// Provider that logs messages instead of sending them.
///
/// Used in development and by the demo seeder; every "send" succeeds with a
/// generated message ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSmsProvider;

#[async_trait]
impl SmsProvider for ConsoleSmsProvider {
    async fn send(&self, phone: &str, body: &str) -> Result<String, ProviderError> {
        let message_id = Uuid::new_v4().to_string();
        info!(phone, body, message_id, "console provider send");
        Ok(message_id)
    }
}
