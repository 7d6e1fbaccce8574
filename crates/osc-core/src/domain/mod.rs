//! Domain module: pure numeric helpers with no I/O.

pub mod range;

pub use range::{linexp, linlin, Curve, RangeError, RangeMap};
