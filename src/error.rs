/// Error type for this crate.
///
/// Only construction can fail. Once a [`Throttle`](crate::Throttle) exists, every
/// admission call returns a plain decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThrottleError {
    /// The window length is outside the supported range.
    #[error("invalid window length: {0}")]
    InvalidWindowLength(String),
}
