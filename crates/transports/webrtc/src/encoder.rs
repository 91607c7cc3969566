//! H.264 encoding on a dedicated worker thread.
//!
//! The OpenH264 encoder is stateful and compute heavy, so it never runs
//! on the async scheduler. One OS thread owns the encoder for the
//! lifetime of a session; frames go in over a channel and Annex B
//! payloads come back per request.

use std::sync::mpsc;
use std::thread;

use bytes::Bytes;
use openh264::encoder::Encoder;
use openh264::formats::YUVBuffer;
use tokio::sync::oneshot;
use tracing::debug;

use pagecast_core::{Error, Frame, Result};

struct EncodeRequest {
    frame: Frame,
    reply: oneshot::Sender<Result<Bytes>>,
}

/// Handle to the encoding worker thread.
///
/// Dropping the handle closes the request channel, which ends the
/// worker loop and releases the encoder.
pub struct VideoEncoder {
    requests: mpsc::Sender<EncodeRequest>,
}

impl VideoEncoder {
    /// Start a worker thread with a fresh encoder instance.
    ///
    /// Resolves once the worker has initialized the encoder, so a
    /// missing or broken codec surfaces here instead of on the first
    /// frame.
    pub async fn spawn() -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        thread::Builder::new()
            .name("h264-encoder".to_string())
            .spawn(move || encode_worker(request_rx, ready_tx))
            .map_err(|e| Error::Encoding(format!("failed to spawn encoder thread: {}", e)))?;

        ready_rx
            .await
            .map_err(|_| Error::Encoding("encoder worker exited during startup".to_string()))??;

        Ok(Self {
            requests: request_tx,
        })
    }

    /// Encode one frame to an Annex B H.264 payload.
    pub async fn encode(&self, frame: Frame) -> Result<Bytes> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(EncodeRequest {
                frame,
                reply: reply_tx,
            })
            .map_err(|_| Error::Encoding("encoder worker is gone".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Encoding("encoder worker dropped the request".to_string()))?
    }
}

fn encode_worker(requests: mpsc::Receiver<EncodeRequest>, ready: oneshot::Sender<Result<()>>) {
    let mut encoder = match Encoder::new() {
        Ok(encoder) => {
            let _ = ready.send(Ok(()));
            encoder
        }
        Err(e) => {
            let _ = ready.send(Err(Error::Encoding(format!(
                "failed to initialize H.264 encoder: {}",
                e
            ))));
            return;
        }
    };

    while let Ok(request) = requests.recv() {
        let result = encode_frame(&mut encoder, &request.frame);
        if request.reply.send(result).is_err() {
            debug!("encode result discarded, caller went away");
        }
    }
    debug!("encoder worker stopped");
}

fn encode_frame(encoder: &mut Encoder, frame: &Frame) -> Result<Bytes> {
    let yuv = rgb_to_i420(frame)?;
    let buffer = YUVBuffer::from_vec(yuv, frame.width() as usize, frame.height() as usize);
    let bitstream = encoder
        .encode(&buffer)
        .map_err(|e| Error::Encoding(format!("H.264 encode failed: {}", e)))?;
    Ok(Bytes::from(bitstream.to_vec()))
}

/// Convert packed RGB24 to planar I420 using BT.601 coefficients.
///
/// Chroma is subsampled by averaging each 2x2 pixel block, so both
/// dimensions must be even.
fn rgb_to_i420(frame: &Frame) -> Result<Vec<u8>> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    if width % 2 != 0 || height % 2 != 0 {
        return Err(Error::Encoding(format!(
            "frame dimensions must be even for 4:2:0 output, got {}x{}",
            frame.width(),
            frame.height()
        )));
    }

    let rgb = frame.data();
    let chroma_len = (width / 2) * (height / 2);
    let mut yuv = vec![0u8; width * height + 2 * chroma_len];
    let (y_plane, chroma) = yuv.split_at_mut(width * height);
    let (u_plane, v_plane) = chroma.split_at_mut(chroma_len);

    for row in 0..height {
        for col in 0..width {
            let i = (row * width + col) * 3;
            let (r, g, b) = (rgb[i] as i32, rgb[i + 1] as i32, rgb[i + 2] as i32);
            y_plane[row * width + col] = clamp_u8(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16);
        }
    }

    for row in (0..height).step_by(2) {
        for col in (0..width).step_by(2) {
            let mut sum_r = 0i32;
            let mut sum_g = 0i32;
            let mut sum_b = 0i32;
            for dy in 0..2 {
                for dx in 0..2 {
                    let i = ((row + dy) * width + (col + dx)) * 3;
                    sum_r += rgb[i] as i32;
                    sum_g += rgb[i + 1] as i32;
                    sum_b += rgb[i + 2] as i32;
                }
            }
            let (r, g, b) = (sum_r / 4, sum_g / 4, sum_b / 4);
            let ci = (row / 2) * (width / 2) + (col / 2);
            u_plane[ci] = clamp_u8(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128);
            v_plane[ci] = clamp_u8(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128);
        }
    }

    Ok(yuv)
}

fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..(width * height) {
            data.extend_from_slice(&rgb);
        }
        Frame::new(width, height, data, 0).unwrap()
    }

    #[test]
    fn test_i420_plane_sizes() {
        let frame = solid_frame(8, 6, [10, 20, 30]);
        let yuv = rgb_to_i420(&frame).unwrap();
        assert_eq!(yuv.len(), 8 * 6 + 2 * (4 * 3));
    }

    #[test]
    fn test_i420_black_and_white_levels() {
        let black = rgb_to_i420(&solid_frame(4, 4, [0, 0, 0])).unwrap();
        // Studio swing: black sits at luma 16 with neutral chroma.
        assert_eq!(black[0], 16);
        assert_eq!(black[16], 128);
        assert_eq!(black[20], 128);

        let white = rgb_to_i420(&solid_frame(4, 4, [255, 255, 255])).unwrap();
        assert_eq!(white[0], 235);
        assert_eq!(white[16], 128);
        assert_eq!(white[20], 128);
    }

    #[test]
    fn test_i420_red_has_high_v() {
        let red = rgb_to_i420(&solid_frame(4, 4, [255, 0, 0])).unwrap();
        let y = red[0];
        let u = red[16];
        let v = red[20];
        assert!((70..=90).contains(&y), "unexpected luma {}", y);
        assert!(u < 110, "red chroma U should be low, got {}", u);
        assert!(v > 220, "red chroma V should be high, got {}", v);
    }

    #[test]
    fn test_odd_dimensions_rejected() {
        let data = vec![0u8; 5 * 4 * 3];
        let frame = Frame::new(5, 4, data, 0).unwrap();
        assert!(matches!(rgb_to_i420(&frame), Err(Error::Encoding(_))));
    }

    #[tokio::test]
    async fn test_encoder_round_trip() {
        let encoder = VideoEncoder::spawn().await.unwrap();
        let payload = encoder.encode(solid_frame(64, 48, [0, 128, 255])).await;
        let payload = payload.unwrap();
        assert!(!payload.is_empty());
        // The first frame is an IDR and must start with an Annex B start code.
        assert!(payload.starts_with(&[0, 0, 0, 1]) || payload.starts_with(&[0, 0, 1]));
    }

    #[tokio::test]
    async fn test_encoder_survives_consecutive_frames() {
        let encoder = VideoEncoder::spawn().await.unwrap();
        for pts in 0..3 {
            let mut data = Vec::with_capacity(64 * 48 * 3);
            for i in 0..(64 * 48) {
                let shade = ((i + pts as usize * 17) % 256) as u8;
                data.extend_from_slice(&[shade, shade / 2, 255 - shade]);
            }
            let frame = Frame::new(64, 48, data, pts).unwrap();
            assert!(encoder.encode(frame).await.is_ok());
        }
    }
}
