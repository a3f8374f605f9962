//! Stateless numeric primitives used by the renderer
//!
//! Channel clamping, endpoint brightness normalization and the three basis
//! curves (fast exponential, slow exponential, linear ramp) that the
//! amplifier blends between.

use rgb::RGB8;
use serde::{Deserialize, Serialize};

/// One pixel of a rendered frame: the RGB triple plus the synthesized white channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgbw {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Rgbw {
    /// Every channel dark
    pub const OFF: Self = Self::new(0, 0, 0, 0);

    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    #[must_use]
    pub const fn from_rgb(rgb: RGB8, w: u8) -> Self {
        Self::new(rgb.r, rgb.g, rgb.b, w)
    }

    /// The color part without the white channel
    #[must_use]
    pub const fn rgb(self) -> RGB8 {
        RGB8 {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// Clamp a real channel value into `[0, 255]`, truncating toward zero.
///
/// Values below zero (and NaN) map to 0, values above 255 map to 255.
#[must_use]
pub fn clamp255(x: f64) -> u8 {
    if x.is_nan() || x <= 0.0 {
        return 0;
    }
    if x >= 255.0 {
        return 255;
    }
    // x is in (0.0, 255.0) here, so the cast only drops the fraction
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let truncated = x as u8;
    truncated
}

/// Brightest channel of a color
#[inline]
#[must_use]
pub fn max_channel(color: RGB8) -> u8 {
    color.r.max(color.g).max(color.b)
}

/// Channel ceiling for a percentage: `floor(255 * percent / 100)`.
///
/// Percentages above 100 are treated as 100.
#[must_use]
pub fn percent_limit(percent: u8) -> u8 {
    let scaled = u16::from(percent.min(100)) * 255 / 100;
    u8::try_from(scaled).unwrap_or(u8::MAX)
}

/// Achromatic mean of a color, `(r + g + b) / 3` in integer arithmetic.
///
/// Both render passes use this exact function, so the discovery pass and
/// the final pass agree on every pixel's value.
#[inline]
#[must_use]
pub fn achromatic(color: RGB8) -> u8 {
    let sum = u16::from(color.r) + u16::from(color.g) + u16::from(color.b);
    // sum <= 765, so sum / 3 <= 255
    u8::try_from(sum / 3).unwrap_or(u8::MAX)
}

/// An exact `limit / peak` ratio applied to 8-bit channels.
///
/// Scaling multiplies before dividing, so a channel equal to `peak` maps
/// exactly onto `limit` and nothing brighter than `peak` is ever fed in by
/// the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelScale {
    limit: u8,
    peak: u8,
}

impl ChannelScale {
    /// Leaves every channel unchanged
    pub const IDENTITY: Self = Self { limit: 1, peak: 1 };
    /// Maps every channel to 0
    pub const ZERO: Self = Self { limit: 0, peak: 1 };

    /// A scale that maps `peak` onto `limit`. A zero `peak` yields [`Self::ZERO`].
    #[must_use]
    pub const fn new(limit: u8, peak: u8) -> Self {
        if peak == 0 {
            Self::ZERO
        } else {
            Self { limit, peak }
        }
    }

    /// The scale as a real factor, `limit / peak`
    #[must_use]
    pub fn factor(self) -> f64 {
        f64::from(self.limit) / f64::from(self.peak)
    }

    /// Scale one channel, truncating the result
    #[must_use]
    pub fn apply(self, channel: u8) -> u8 {
        clamp255(f64::from(channel) * f64::from(self.limit) / f64::from(self.peak))
    }

    /// Scale every channel of a color
    #[must_use]
    pub fn apply_rgb(self, color: RGB8) -> RGB8 {
        RGB8 {
            r: self.apply(color.r),
            g: self.apply(color.g),
            b: self.apply(color.b),
        }
    }
}

/// Brightness normalization for one endpoint color.
///
/// With `limit = floor(255 * brightness / 100)`, a color whose brightest
/// channel exceeds `limit` is scaled by `limit / max(r, g, b)`; any other
/// color is left alone. A black color always takes the identity branch.
#[must_use]
pub fn brightness_scale(color: RGB8, brightness: u8) -> ChannelScale {
    let limit = percent_limit(brightness);
    let peak = max_channel(color);
    if peak > limit {
        ChannelScale::new(limit, peak)
    } else {
        ChannelScale::IDENTITY
    }
}

/// Endpoint color after [`brightness_scale`]; its brightest channel never exceeds the limit.
#[must_use]
pub fn normalize_endpoint(color: RGB8, brightness: u8) -> RGB8 {
    brightness_scale(color, brightness).apply_rgb(color)
}

/// Fast rising exponential, `1 - exp(-(i - 1) / tau)`
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn fast_curve(i: usize, tau: f64) -> f64 {
    1.0 - (-((i - 1) as f64) / tau).exp()
}

/// Slow rising exponential, `exp(i / tau) / exp(n / tau)`.
///
/// Evaluated as `exp((i - n) / tau)` so a small tau cannot overflow both
/// exponentials into `inf / inf`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn slow_curve(i: usize, n: usize, tau: f64) -> f64 {
    ((i as f64 - n as f64) / tau).exp()
}

/// Linear ramp, `(i - 1) / (n - 1)`
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn linear_ramp(i: usize, n: usize) -> f64 {
    (i - 1) as f64 / (n - 1) as f64
}

/// Blend of a basis curve and the linear ramp for interior pixel `i` of `n` (1-based).
///
/// A non-negative amplifier blends in the fast exponential, a negative one
/// the slow exponential; the magnitude (percent) is the exponential's weight.
/// At `amplifier == 0` the result is exactly the linear ramp.
///
/// Endpoints (`i == 1`, `i == n`) are copied by the renderer and must not be
/// passed here.
#[must_use]
pub fn curve_value(i: usize, n: usize, tau: f64, amplifier: i8) -> f64 {
    debug_assert!(i > 1 && i < n, "curve_value: index {i} is not interior to 1..={n}");
    let magnitude = amplifier.unsigned_abs().min(100);
    let curve_weight = f64::from(magnitude) / 100.0;
    let linear_weight = f64::from(100 - magnitude) / 100.0;
    let shaped = if amplifier >= 0 {
        fast_curve(i, tau)
    } else {
        slow_curve(i, n, tau)
    };
    shaped * curve_weight + linear_ramp(i, n) * linear_weight
}
