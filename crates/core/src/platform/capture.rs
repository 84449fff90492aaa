use crate::error::CaptureError;
use crate::logger;
use crate::types::Frame;

use super::FrameSource;

/// Frames whose brightest channel is below this are treated as unusable.
pub const BLANK_THRESHOLD: u8 = 10;

/// One way of grabbing the window's pixels.
pub trait CaptureStrategy: Send {
    fn name(&self) -> &str;
    fn grab(&mut self) -> Result<Frame, CaptureError>;
}

/// Ranked capture strategies behind a single [`FrameSource`]. The first strategy
/// that yields a non-blank frame wins; callers never learn which one it was.
pub struct FallbackCapture {
    strategies: Vec<Box<dyn CaptureStrategy>>,
    blank_threshold: u8,
    last_winner: Option<usize>,
}

impl FallbackCapture {
    pub fn new(strategies: Vec<Box<dyn CaptureStrategy>>) -> Self {
        Self { strategies, blank_threshold: BLANK_THRESHOLD, last_winner: None }
    }

    pub fn with_blank_threshold(mut self, threshold: u8) -> Self {
        self.blank_threshold = threshold;
        self
    }

    fn attempt(&mut self, i: usize) -> Result<Frame, CaptureError> {
        let frame = self.strategies[i].grab()?;
        let max = frame.max_brightness();
        if max < self.blank_threshold {
            return Err(CaptureError::Blank { max_brightness: max });
        }
        Ok(frame)
    }
}

impl FrameSource for FallbackCapture {
    fn capture(&mut self) -> Result<Frame, CaptureError> {
        let mut failures = Vec::new();
        for i in 0..self.strategies.len() {
            match self.attempt(i) {
                Ok(frame) => {
                    if self.last_winner != Some(i) {
                        logger::info(&format!("capture via {}", self.strategies[i].name()));
                        self.last_winner = Some(i);
                    }
                    return Ok(frame);
                }
                // No strategy can help once the window is gone.
                Err(CaptureError::WindowInvalid) => return Err(CaptureError::WindowInvalid),
                Err(e) => failures.push(format!("{}: {}", self.strategies[i].name(), e)),
            }
        }
        Err(CaptureError::AllStrategiesFailed(failures))
    }
}
