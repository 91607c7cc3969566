//! Screenshot capture and the pull-based video source

use crate::driver::BrowserDriver;
use crate::error::{Error, Result};
use crate::frame::{Frame, TARGET_FPS};
use crate::pacer::FramePacer;
use image::DynamicImage;
use std::sync::Arc;
use tracing::trace;

/// Captures one rendered frame of the browser surface and converts it to the
/// canonical packed RGB24 layout.
pub struct FrameCapturer {
    driver: Arc<dyn BrowserDriver>,
}

impl FrameCapturer {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    /// Capture and decode a single surface snapshot, without pacing or
    /// timestamping. Fails with [`Error::FrameCapture`] on an empty payload
    /// or an undecodable image.
    pub async fn capture(&self) -> Result<(u32, u32, Vec<u8>)> {
        let png = self.driver.capture_surface().await?;
        if png.is_empty() {
            return Err(Error::FrameCapture(
                "capture returned an empty payload".to_string(),
            ));
        }
        let img = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .map_err(|e| Error::FrameCapture(format!("screenshot decode failed: {}", e)))?;
        Ok(normalize_rgb24(img))
    }
}

/// Repack a decoded screenshot into tight RGB24.
///
/// Protocol screenshots decode as RGBA; every pixel is rewritten into the
/// canonical channel order, never relabeled in place.
fn normalize_rgb24(img: DynamicImage) -> (u32, u32, Vec<u8>) {
    let (width, height) = (img.width(), img.height());
    let data = match img {
        DynamicImage::ImageRgb8(buf) => buf.into_raw(),
        other => other.to_rgb8().into_raw(),
    };
    (width, height, data)
}

/// Pull-based frame producer.
///
/// The transport calls [`next_frame`](VideoSource::next_frame) repeatedly
/// until the owning session closes. Each call waits out the 1/30 s pacing
/// interval, captures the surface, and stamps the next presentation
/// timestamp. Timestamps start at 0 and increase by exactly 1 per delivered
/// frame; a failed call does not consume a timestamp.
pub struct VideoSource {
    capturer: FrameCapturer,
    pacer: FramePacer,
    next_pts: u64,
}

impl VideoSource {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self {
            capturer: FrameCapturer::new(driver),
            pacer: FramePacer::for_fps(TARGET_FPS),
            next_pts: 0,
        }
    }

    /// Produce the next frame. The first failure should be treated as
    /// terminal for this source; it is not retried here.
    pub async fn next_frame(&mut self) -> Result<Frame> {
        self.pacer.tick().await;
        let (width, height, data) = self.capturer.capture().await?;
        let frame = Frame::new(width, height, data, self.next_pts)?;
        self.next_pts += 1;
        trace!("captured frame pts={} {}x{}", frame.pts(), width, height);
        Ok(frame)
    }

    /// Number of frames delivered so far
    pub fn frames_produced(&self) -> u64 {
        self.next_pts
    }
}
