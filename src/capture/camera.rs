use std::io::BufReader;
use std::process::{Child, ChildStdout, Command, Stdio};

use image::codecs::pnm::PnmDecoder;
use image::{DynamicImage, RgbImage};
use tracing::{debug, warn};

use super::CaptureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Rear camera, pointed away from the user.
    Environment,
    User,
}

impl Facing {
    pub fn as_str(self) -> &'static str {
        match self {
            Facing::Environment => "environment",
            Facing::User => "user",
        }
    }
}

/// Something that can hand out an exclusive live video stream.
pub trait CameraSource: Send + Sync {
    fn open(&self, facing: Facing) -> Result<Box<dyn VideoStream>, CaptureError>;
}

pub trait VideoStream: Send {
    fn grab_frame(&mut self) -> Result<RgbImage, CaptureError>;
    /// Releases the device. Must be safe to call more than once.
    fn stop(&mut self);
}

/// Stops the wrapped stream when dropped, whatever path the caller leaves by.
pub struct StreamGuard {
    inner: Box<dyn VideoStream>,
}

impl StreamGuard {
    pub fn new(inner: Box<dyn VideoStream>) -> Self {
        Self { inner }
    }

    pub fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
        self.inner.grab_frame()
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

/// Used when no capture device is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCamera;

impl CameraSource for NoCamera {
    fn open(&self, _facing: Facing) -> Result<Box<dyn VideoStream>, CaptureError> {
        Err(CaptureError::CameraUnavailable(
            "no camera device configured".into(),
        ))
    }
}

/// Runs an external capture program that writes binary PPM frames to stdout,
/// e.g. `ffmpeg -f v4l2 -i /dev/video0 -f image2pipe -vcodec ppm -`.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_command_line(parts: &[String]) -> Option<Self> {
        let (program, args) = parts.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

impl CameraSource for CommandCamera {
    fn open(&self, facing: Facing) -> Result<Box<dyn VideoStream>, CaptureError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("CAMERA_FACING", facing.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                CaptureError::CameraUnavailable(format!("cannot start {}: {e}", self.program))
            })?;
        let stdout = match child.stdout.take() {
            Some(out) => out,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CaptureError::CameraUnavailable(
                    "capture program has no stdout".into(),
                ));
            }
        };
        debug!(program = %self.program, pid = child.id(), facing = facing.as_str(), "camera stream opened");
        Ok(Box::new(ProcessStream {
            child: Some(child),
            frames: Some(BufReader::new(stdout)),
        }))
    }
}

struct ProcessStream {
    child: Option<Child>,
    frames: Option<BufReader<ChildStdout>>,
}

impl VideoStream for ProcessStream {
    fn grab_frame(&mut self) -> Result<RgbImage, CaptureError> {
        let reader = self
            .frames
            .as_mut()
            .ok_or_else(|| CaptureError::CameraUnavailable("stream already stopped".into()))?;
        let decoder = PnmDecoder::new(reader)
            .map_err(|e| CaptureError::CameraUnavailable(format!("no frame from camera: {e}")))?;
        let frame = DynamicImage::from_decoder(decoder)
            .map_err(|e| CaptureError::CameraUnavailable(format!("unreadable frame: {e}")))?;
        Ok(frame.to_rgb8())
    }

    fn stop(&mut self) {
        self.frames = None;
        if let Some(mut child) = self.child.take() {
            // An already exited child makes kill() fail; only the reap matters.
            let _ = child.kill();
            match child.wait() {
                Ok(status) => debug!(%status, "camera stream released"),
                Err(e) => warn!(error = %e, "failed to reap camera process"),
            }
        }
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        self.stop();
    }
}
