use async_trait::async_trait;

use crate::Result;

/// Outbound notification transport (Telegram in production).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Send a PNG image with a caption.
    async fn send_photo(&self, png: Vec<u8>, caption: &str) -> Result<()>;
}
