//! Validated render parameters
//!
//! [`RenderParams`] can only be built through validation, so the renderer
//! never observes an out-of-range value. Updates go through [`FieldValue`],
//! one whole field at a time.

use std::fmt;

use derive_more::{Display, Error};
use rgb::RGB8;

use crate::payload;

/// Upper bound of every percentage field (brightness, white target, amplifier magnitude)
pub const PERCENT_MAX: u8 = 100;

/// Rejection of an out-of-range configuration value
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum ParamsError {
    #[display("pixel count {count} is too small, at least 2 pixels are required")]
    PixelCount { count: usize },
    #[display("{field} {value} is outside {min}..={max}")]
    OutOfRange {
        field: Field,
        value: i32,
        min: i32,
        max: i32,
    },
    #[display("tau {tau} must be finite and greater than zero")]
    Tau { tau: f32 },
    #[display("boundary {hour}:{minute:02} is not a valid time of day")]
    Boundary { hour: u8, minute: u8 },
}

/// One updatable field of [`RenderParams`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Field {
    #[display("status")]
    Status,
    #[display("brightness")]
    Brightness,
    #[display("amplifier")]
    Amplifier,
    #[display("tau")]
    Tau,
    #[display("color_bottom")]
    ColorBottom,
    #[display("color_top")]
    ColorTop,
    #[display("white_target")]
    WhiteTarget,
}

impl Field {
    pub const ALL: [Self; 7] = [
        Self::Status,
        Self::Brightness,
        Self::Amplifier,
        Self::Tau,
        Self::ColorBottom,
        Self::ColorTop,
        Self::WhiteTarget,
    ];
}

/// A new value for exactly one [`Field`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Status(bool),
    Brightness(u8),
    Amplifier(i8),
    Tau(f32),
    ColorBottom(RGB8),
    ColorTop(RGB8),
    WhiteTarget(u8),
}

impl FieldValue {
    #[must_use]
    pub const fn field(&self) -> Field {
        match self {
            Self::Status(_) => Field::Status,
            Self::Brightness(_) => Field::Brightness,
            Self::Amplifier(_) => Field::Amplifier,
            Self::Tau(_) => Field::Tau,
            Self::ColorBottom(_) => Field::ColorBottom,
            Self::ColorTop(_) => Field::ColorTop,
            Self::WhiteTarget(_) => Field::WhiteTarget,
        }
    }

    /// Check the value against its field's range.
    pub fn validate(&self) -> Result<(), ParamsError> {
        match *self {
            Self::Brightness(v) | Self::WhiteTarget(v) => check_range(
                self.field(),
                i32::from(v),
                0,
                i32::from(PERCENT_MAX),
            ),
            Self::Amplifier(v) => check_range(
                self.field(),
                i32::from(v),
                -i32::from(PERCENT_MAX),
                i32::from(PERCENT_MAX),
            ),
            Self::Tau(tau) => {
                if tau.is_finite() && tau > 0.0 {
                    Ok(())
                } else {
                    Err(ParamsError::Tau { tau })
                }
            }
            Self::Status(_) | Self::ColorBottom(_) | Self::ColorTop(_) => Ok(()),
        }
    }
}

impl fmt::Display for FieldValue {
    /// Formats the value the way it is published
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Status(on) => write!(f, "{}", u8::from(on)),
            Self::Brightness(v) | Self::WhiteTarget(v) => write!(f, "{v}"),
            Self::Amplifier(v) => write!(f, "{v}"),
            Self::Tau(tau) => write!(f, "{tau:.3}"),
            Self::ColorBottom(color) | Self::ColorTop(color) => {
                f.write_str(&payload::format_color(color))
            }
        }
    }
}

fn check_range(field: Field, value: i32, min: i32, max: i32) -> Result<(), ParamsError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ParamsError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Unvalidated render parameters, as read from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRenderParams {
    pub pixel_count: usize,
    pub status: bool,
    pub brightness: u8,
    pub amplifier: i8,
    pub tau: f32,
    pub color_bottom: RGB8,
    pub color_top: RGB8,
    pub white_target: u8,
}

/// Everything the renderer needs for one frame.
///
/// Construction validates every field; afterwards the value can only change
/// through [`RenderParams::with`], which validates the replacement field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    pixel_count: usize,
    status: bool,
    brightness: u8,
    amplifier: i8,
    tau: f32,
    color_bottom: RGB8,
    color_top: RGB8,
    white_target: u8,
}

impl TryFrom<RawRenderParams> for RenderParams {
    type Error = ParamsError;

    fn try_from(raw: RawRenderParams) -> Result<Self, Self::Error> {
        if raw.pixel_count < 2 {
            return Err(ParamsError::PixelCount {
                count: raw.pixel_count,
            });
        }
        let params = Self {
            pixel_count: raw.pixel_count,
            status: raw.status,
            brightness: raw.brightness,
            amplifier: raw.amplifier,
            tau: raw.tau,
            color_bottom: raw.color_bottom,
            color_top: raw.color_top,
            white_target: raw.white_target,
        };
        for field in Field::ALL {
            params.get(field).validate()?;
        }
        Ok(params)
    }
}

impl From<RenderParams> for RawRenderParams {
    fn from(params: RenderParams) -> Self {
        Self {
            pixel_count: params.pixel_count,
            status: params.status,
            brightness: params.brightness,
            amplifier: params.amplifier,
            tau: params.tau,
            color_bottom: params.color_bottom,
            color_top: params.color_top,
            white_target: params.white_target,
        }
    }
}

impl RenderParams {
    pub fn new(raw: RawRenderParams) -> Result<Self, ParamsError> {
        Self::try_from(raw)
    }

    #[must_use]
    pub const fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    #[must_use]
    pub const fn status(&self) -> bool {
        self.status
    }

    #[must_use]
    pub const fn brightness(&self) -> u8 {
        self.brightness
    }

    #[must_use]
    pub const fn amplifier(&self) -> i8 {
        self.amplifier
    }

    #[must_use]
    pub const fn tau(&self) -> f32 {
        self.tau
    }

    #[must_use]
    pub const fn color_bottom(&self) -> RGB8 {
        self.color_bottom
    }

    #[must_use]
    pub const fn color_top(&self) -> RGB8 {
        self.color_top
    }

    #[must_use]
    pub const fn white_target(&self) -> u8 {
        self.white_target
    }

    /// Current value of one field
    #[must_use]
    pub const fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Status => FieldValue::Status(self.status),
            Field::Brightness => FieldValue::Brightness(self.brightness),
            Field::Amplifier => FieldValue::Amplifier(self.amplifier),
            Field::Tau => FieldValue::Tau(self.tau),
            Field::ColorBottom => FieldValue::ColorBottom(self.color_bottom),
            Field::ColorTop => FieldValue::ColorTop(self.color_top),
            Field::WhiteTarget => FieldValue::WhiteTarget(self.white_target),
        }
    }

    /// Copy with one field replaced, validating only that field.
    pub fn with(mut self, value: FieldValue) -> Result<Self, ParamsError> {
        value.validate()?;
        match value {
            FieldValue::Status(v) => self.status = v,
            FieldValue::Brightness(v) => self.brightness = v,
            FieldValue::Amplifier(v) => self.amplifier = v,
            FieldValue::Tau(v) => self.tau = v,
            FieldValue::ColorBottom(v) => self.color_bottom = v,
            FieldValue::ColorTop(v) => self.color_top = v,
            FieldValue::WhiteTarget(v) => self.white_target = v,
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawRenderParams {
        RawRenderParams {
            pixel_count: 41,
            status: true,
            brightness: 70,
            amplifier: 0,
            tau: 5.125,
            color_bottom: RGB8::new(194, 255, 0),
            color_top: RGB8::new(0, 193, 255),
            white_target: 50,
        }
    }

    #[test]
    fn test_valid_params_round_trip_raw() {
        let params = RenderParams::new(raw()).unwrap();
        assert_eq!(RawRenderParams::from(params), raw());
    }

    #[test]
    fn test_rejects_short_strip() {
        for count in [0, 1] {
            let err = RenderParams::new(RawRenderParams {
                pixel_count: count,
                ..raw()
            })
            .unwrap_err();
            assert_eq!(err, ParamsError::PixelCount { count });
        }
        assert!(RenderParams::new(RawRenderParams {
            pixel_count: 2,
            ..raw()
        })
        .is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_fields() {
        let cases = [
            RawRenderParams {
                brightness: 101,
                ..raw()
            },
            RawRenderParams {
                white_target: 255,
                ..raw()
            },
            RawRenderParams {
                amplifier: 101,
                ..raw()
            },
            RawRenderParams {
                amplifier: -101,
                ..raw()
            },
            RawRenderParams { tau: 0.0, ..raw() },
            RawRenderParams { tau: -1.0, ..raw() },
            RawRenderParams {
                tau: f32::NAN,
                ..raw()
            },
            RawRenderParams {
                tau: f32::INFINITY,
                ..raw()
            },
        ];
        for case in cases {
            assert!(RenderParams::new(case).is_err(), "{case:?}");
        }
    }

    #[test]
    fn test_error_messages() {
        let err = RenderParams::new(RawRenderParams {
            brightness: 150,
            ..raw()
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "brightness 150 is outside 0..=100");

        let err = RenderParams::new(RawRenderParams { tau: 0.0, ..raw() }).unwrap_err();
        assert_eq!(err.to_string(), "tau 0 must be finite and greater than zero");
    }

    #[test]
    fn test_with_replaces_single_field() {
        let params = RenderParams::new(raw()).unwrap();
        let updated = params.with(FieldValue::Amplifier(-40)).unwrap();
        assert_eq!(updated.amplifier(), -40);
        assert_eq!(updated.brightness(), params.brightness());
        assert_eq!(updated.get(Field::Amplifier), FieldValue::Amplifier(-40));

        assert!(params.with(FieldValue::Brightness(101)).is_err());
        assert!(params.with(FieldValue::Tau(0.0)).is_err());
    }

    #[test]
    fn test_get_covers_every_field() {
        let params = RenderParams::new(raw()).unwrap();
        for field in Field::ALL {
            assert_eq!(params.get(field).field(), field);
        }
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Status(true).to_string(), "1");
        assert_eq!(FieldValue::Amplifier(-35).to_string(), "-35");
        assert_eq!(FieldValue::Tau(5.125).to_string(), "5.125");
        assert_eq!(
            FieldValue::ColorTop(RGB8::new(5, 55, 255)).to_string(),
            "[  5, 55,255]"
        );
    }
}
