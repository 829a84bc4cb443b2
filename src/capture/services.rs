use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use tracing::{debug, instrument};

use super::camera::{CameraSource, Facing, StreamGuard};
use super::payload::ImagePayload;
use super::CaptureError;

pub const JPEG_MIME: &str = "image/jpeg";

/// Opens the camera, takes one frame, encodes it and releases the device.
/// The stream is stopped on every exit path, including a failed grab or encode.
#[instrument(skip(source))]
pub fn acquire_from_camera(
    source: &dyn CameraSource,
    facing: Facing,
    quality: u8,
) -> Result<ImagePayload, CaptureError> {
    let mut stream = StreamGuard::new(source.open(facing)?);
    let frame = stream.grab_frame()?;
    drop(stream);

    let jpeg = encode_jpeg(&frame, quality)?;
    let payload = ImagePayload::from_bytes(&jpeg, JPEG_MIME);
    debug!(
        capture_id = %payload.id,
        width = frame.width(),
        height = frame.height(),
        bytes = jpeg.len(),
        "camera frame captured"
    );
    Ok(payload)
}

/// Runs [`acquire_from_camera`] off the async executor.
pub async fn acquire_from_camera_blocking(
    source: Arc<dyn CameraSource>,
    facing: Facing,
    quality: u8,
) -> Result<ImagePayload, CaptureError> {
    tokio::task::spawn_blocking(move || acquire_from_camera(source.as_ref(), facing, quality))
        .await
        .map_err(|e| CaptureError::CameraUnavailable(format!("capture task failed: {e}")))?
}

/// Wraps an uploaded file. The declared type wins when it is an image type,
/// otherwise the bytes are sniffed.
pub fn acquire_from_file(bytes: &[u8], content_type: Option<&str>) -> ImagePayload {
    let mime = content_type
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| ct.starts_with("image/"))
        .or_else(|| sniff_mime(bytes).map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".into());
    let payload = ImagePayload::from_bytes(bytes, mime);
    debug!(capture_id = %payload.id, mime = %payload.mime_type, bytes = bytes.len(), "file captured");
    payload
}

pub fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let mut out = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(frame.clone())
        .write_with_encoder(encoder)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    let mime = format.to_mime_type();
    mime.starts_with("image/").then_some(mime)
}
