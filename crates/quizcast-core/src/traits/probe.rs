//! Image metadata probe.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait ImageProbe: Send + Sync {
    /// Width and height in pixels, reading no more of the image than needed.
    async fn fetch_dimensions(&self, url: &str) -> Result<(u32, u32)>;
}
