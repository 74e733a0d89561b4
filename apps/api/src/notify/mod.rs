//! Delivery channels for composed digests.

use async_trait::async_trait;

use crate::models::user::Subscriber;

pub mod email;
pub mod kakao;

/// A channel that delivers one composed digest to one subscriber.
///
/// Implementations swallow and log their own failures: `false` means the
/// digest did not reach the user this cycle, nothing more.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_research_digest(&self, user: &Subscriber, content: &str) -> bool;
}
