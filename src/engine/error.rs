use thiserror::Error;

/// Error kinds produced by the synthesis core.
///
/// Validation errors are never recovered from; they are reported to the
/// caller and the parameter state is left unchanged. `Cancelled` is
/// internal to the animator and never escapes past a `stop` call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HapticError {
  #[error("invalid parameter: {0}")]
  InvalidParam(String),
  #[error("16-direction mode is not enabled")]
  ModeDisabled,
  #[error("no suitable audio output device: {0}")]
  AudioUnavailable(String),
  #[error("operation requires streaming to be active")]
  NotReady,
  #[error("animation cancelled")]
  Cancelled,
}

pub type HapticResult<T> = Result<T, HapticError>;
