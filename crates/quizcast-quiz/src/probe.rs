//! Image dimension probe.
//!
//! Downloads only until the image header can be decoded, bounded by a byte cap.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use quizcast_core::error::{QuizError, Result};
use quizcast_core::traits::ImageProbe;

pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

pub struct HttpImageProbe {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageProbe {
    pub fn new(request_timeout: Duration, max_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| QuizError::Image(format!("probe client: {e}")))?;
        Ok(Self { client, max_bytes })
    }
}

fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn fetch_dimensions(&self, url: &str) -> Result<(u32, u32)> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| QuizError::Image(format!("GET {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(QuizError::Image(format!("GET {url} returned {}", resp.status())));
        }

        let mut buf: Vec<u8> = Vec::new();
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| QuizError::Image(format!("reading {url}: {e}")))?
        {
            buf.extend_from_slice(&chunk);
            if let Some(dims) = dimensions(&buf) {
                return Ok(dims);
            }
            if buf.len() >= self.max_bytes {
                break;
            }
        }
        dimensions(&buf)
            .ok_or_else(|| QuizError::Image(format!("cannot read dimensions of {url} ({} bytes)", buf.len())))
    }
}

/// "W:H" for the image at `url`, or 1:1 when it cannot be determined.
pub async fn aspect_ratio(probe: &dyn ImageProbe, url: &str) -> String {
    if url.is_empty() {
        return DEFAULT_ASPECT_RATIO.into();
    }
    match probe.fetch_dimensions(url).await {
        Ok((w, h)) if w > 0 && h > 0 => format!("{w}:{h}"),
        Ok(_) => DEFAULT_ASPECT_RATIO.into(),
        Err(e) => {
            tracing::warn!("🖼️ Aspect ratio probe failed for {url}: {e}");
            DEFAULT_ASPECT_RATIO.into()
        }
    }
}
