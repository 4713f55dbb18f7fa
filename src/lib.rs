#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod throttle;
pub use throttle::*;

mod strategy;

mod window;

mod clock;
pub use clock::*;

mod error;
pub use error::*;

mod common;
pub use common::{ConcurrencyStrategy, ThrottleSnapshot, WindowLengthMs};

#[cfg(test)]
mod tests;
