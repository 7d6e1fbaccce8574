//! Linear and exponential range mapping for sensor values.
//!
//! Sensor inputs arrive in one interval (an analog pin reads `0.0..=1.0`, a
//! canvas coordinate runs `0..=width`) and have to be re-expressed in another
//! (an LED amplitude, a frequency in Hz).  [`linlin`] rescales linearly;
//! [`linexp`] rescales so that equal input steps multiply the output by equal
//! ratios, which is what pitch and loudness controls want.
//!
//! Clamping is a boundary guard only: with `clamp` set, inputs at or beyond
//! either input bound return that output bound *exactly*; inputs strictly
//! inside the bounds always go through the formula.

use std::ops::RangeInclusive;

use thiserror::Error;

/// Errors raised by the range mapper.
#[derive(Debug, Clone, Copy, Error, PartialEq)]
pub enum RangeError {
    /// An exponential output range with a zero bound or bounds of opposite sign.
    #[error("invalid exponential output range [{out_min}, {out_max}]: bounds must be nonzero and share a sign")]
    InvalidRange { out_min: f64, out_max: f64 },
}

/// Linearly rescales `value` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// Requires `in_min != in_max` when `clamp` is false or the value lies between
/// the bounds; otherwise the result is not finite.
///
/// # Examples
///
/// ```rust
/// use osc_core::domain::range::linlin;
///
/// assert_eq!(linlin(5.0, 0.0, 10.0, 0.0, 1.0, true), 0.5);
/// assert_eq!(linlin(2.0, 0.0, 1.0, 0.0, 10.0, false), 20.0);
/// ```
pub fn linlin(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64, clamp: bool) -> f64 {
    if clamp {
        if value <= in_min {
            return out_min;
        }
        if value >= in_max {
            return out_max;
        }
    }
    out_min + ((value - in_min) / (in_max - in_min)) * (out_max - out_min)
}

/// Exponentially rescales `value` from `[in_min, in_max]` to `[out_min, out_max]`.
///
/// # Errors
///
/// Returns [`RangeError::InvalidRange`] when either output bound is zero (or
/// NaN) or the bounds differ in sign.  The check runs before clamping, so a
/// bad range fails even for inputs sitting on a boundary.
///
/// # Examples
///
/// ```rust
/// use osc_core::domain::range::linexp;
///
/// let hz = linexp(0.5, 0.0, 1.0, 1.0, 100.0, true).unwrap();
/// assert!((hz - 10.0).abs() < 1e-9);
/// assert!(linexp(0.5, 0.0, 1.0, 0.0, 100.0, true).is_err());
/// ```
pub fn linexp(
    value: f64,
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
    clamp: bool,
) -> Result<f64, RangeError> {
    check_exponential_range(out_min, out_max)?;
    Ok(linexp_unchecked(value, in_min, in_max, out_min, out_max, clamp))
}

fn check_exponential_range(out_min: f64, out_max: f64) -> Result<(), RangeError> {
    // NaN fails both comparisons
    let same_sign_nonzero = (out_min > 0.0 && out_max > 0.0) || (out_min < 0.0 && out_max < 0.0);
    if same_sign_nonzero {
        Ok(())
    } else {
        Err(RangeError::InvalidRange { out_min, out_max })
    }
}

fn linexp_unchecked(
    value: f64,
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
    clamp: bool,
) -> f64 {
    if clamp {
        if value <= in_min {
            return out_min;
        }
        if value >= in_max {
            return out_max;
        }
    }
    out_min * (out_max / out_min).powf((value - in_min) / (in_max - in_min))
}

// ── Reusable mapping ──────────────────────────────────────────────────────────

/// Shape of a [`RangeMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Linear,
    Exponential,
}

/// A validated mapping from one interval to another, for applying the same
/// rescale to a stream of sensor readings.
///
/// # Example
///
/// ```rust
/// use osc_core::domain::range::RangeMap;
///
/// // Pressure sensor 0..1 → LED blink frequency 1..30 Hz
/// let freq = RangeMap::exponential(0.0..=1.0, 1.0..=30.0).unwrap();
/// assert_eq!(freq.map(0.0), 1.0);
/// assert_eq!(freq.map(1.0), 30.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RangeMap {
    in_min: f64,
    in_max: f64,
    out_min: f64,
    out_max: f64,
    curve: Curve,
    clamp: bool,
}

impl RangeMap {
    /// A clamped linear mapping.
    pub fn linear(input: RangeInclusive<f64>, output: RangeInclusive<f64>) -> Self {
        Self {
            in_min: *input.start(),
            in_max: *input.end(),
            out_min: *output.start(),
            out_max: *output.end(),
            curve: Curve::Linear,
            clamp: true,
        }
    }

    /// A clamped exponential mapping.
    ///
    /// # Errors
    ///
    /// Returns [`RangeError::InvalidRange`] for an output range containing zero.
    pub fn exponential(
        input: RangeInclusive<f64>,
        output: RangeInclusive<f64>,
    ) -> Result<Self, RangeError> {
        check_exponential_range(*output.start(), *output.end())?;
        Ok(Self {
            curve: Curve::Exponential,
            ..Self::linear(input, output)
        })
    }

    /// Enables or disables boundary clamping (enabled by default).
    pub fn with_clamp(mut self, clamp: bool) -> Self {
        self.clamp = clamp;
        self
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    /// Applies the mapping to one value.
    pub fn map(&self, value: f64) -> f64 {
        match self.curve {
            Curve::Linear => linlin(
                value,
                self.in_min,
                self.in_max,
                self.out_min,
                self.out_max,
                self.clamp,
            ),
            Curve::Exponential => linexp_unchecked(
                value,
                self.in_min,
                self.in_max,
                self.out_min,
                self.out_max,
                self.clamp,
            ),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
