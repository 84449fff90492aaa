use thiserror::Error;

/// A pixel buffer that cannot be processed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
}

/// Failure to obtain a usable frame from the target window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("target window is no longer valid")]
    WindowInvalid,

    #[error("target window is minimized")]
    Minimized,

    #[error("captured frame is blank (max brightness {max_brightness})")]
    Blank { max_brightness: u8 },

    #[error("capture backend failed: {0}")]
    Backend(String),

    #[error("all capture strategies failed: {}", .0.join("; "))]
    AllStrategiesFailed(Vec<String>),
}

/// Failure to deliver synthetic input. Always fatal to the current run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("target window is no longer valid")]
    WindowInvalid,

    #[error("input delivery failed: {0}")]
    Delivery(String),

    #[error("unknown key name: {0:?}")]
    UnknownKey(String),
}

/// A tuned parameter set that cannot drive a hunt.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("hue range {index}: {reason}")]
    HueRange { index: usize, reason: String },

    #[error("detection mode bounds: {0}")]
    ModeBounds(String),

    #[error("detection region must have a positive width and height")]
    EmptyRegion,

    #[error("ability key list is empty")]
    NoAbilities,

    #[error("{name} must be positive")]
    NonPositive { name: &'static str },

    #[error("jitter must lie in [0, 1), got {0}")]
    Jitter(f64),
}

/// Conditions that end an engine run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input delivery failed, stopping run: {0}")]
    Input(#[from] InputError),
}
