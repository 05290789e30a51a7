//! Outbound notification boundary.
//!
//! Workers call [`Notifier::notify`] synchronously inside a cycle. A failed
//! delivery is logged by the caller and the entry is still marked seen:
//! at-least-once delivery is out of scope and no-duplicate-spam wins over
//! guaranteed delivery.

mod telegram;

pub use telegram::TelegramNotifier;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use thiserror::Error;

/// One matched entry ready for delivery.
#[derive(Debug, Clone)]
pub struct Notification {
    pub title: String,
    pub link: Option<String>,
    pub group: String,
    pub published: DateTime<Utc>,
    /// Keywords that fired for this entry, in keyword order. Empty when the
    /// group has no keyword filter.
    pub matched_keywords: Vec<String>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rejected message for chat {chat}: {description}")]
    Api { chat: String, description: String },

    /// Some chats were delivered, some were not. Per-chat errors have
    /// already been logged by the transport.
    #[error("delivery failed for {failed} of {total} chats")]
    Partial { failed: usize, total: usize },

    #[error("no delivery targets configured")]
    NoTargets,
}

/// Delivery transport, bound once at composition time.
///
/// Object-safe so the manager can hold `Arc<dyn Notifier>`; implementations
/// return a boxed future instead of using an async trait.
pub trait Notifier: Send + Sync {
    fn notify(&self, note: Notification) -> BoxFuture<'_, Result<(), NotifyError>>;
}
