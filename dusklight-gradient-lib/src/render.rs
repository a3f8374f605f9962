//! Gradient rendering
//!
//! Produces one [`Frame`] from a [`RenderParams`]. Rendering is two passes
//! over the strip: the first finds the brightest achromatic value, the
//! second recomputes every pixel and scales its white channel so that
//! brightest value lands on the configured white target.

use rgb::RGB8;

use crate::color::{
    achromatic, clamp255, curve_value, normalize_endpoint, percent_limit, ChannelScale, Rgbw,
};
use crate::params::RenderParams;

/// Per-pixel output, bottom end first.
///
/// `pixels()[0]` is pixel index 1 (bottom), the last entry is pixel index
/// `pixel_count` (top). The order maps directly onto physical position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pixels: Vec<Rgbw>,
}

impl Frame {
    /// `len` dark pixels
    #[must_use]
    pub fn off(len: usize) -> Self {
        Self {
            pixels: vec![Rgbw::OFF; len],
        }
    }

    #[must_use]
    pub fn pixels(&self) -> &[Rgbw] {
        &self.pixels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rgbw> {
        self.pixels.iter()
    }

    /// Whether every channel of every pixel is zero
    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.pixels.iter().all(|p| *p == Rgbw::OFF)
    }
}

impl FromIterator<Rgbw> for Frame {
    fn from_iter<I: IntoIterator<Item = Rgbw>>(iter: I) -> Self {
        Self {
            pixels: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Frame {
    type Item = Rgbw;
    type IntoIter = std::vec::IntoIter<Rgbw>;

    fn into_iter(self) -> Self::IntoIter {
        self.pixels.into_iter()
    }
}

impl<'a> IntoIterator for &'a Frame {
    type Item = &'a Rgbw;
    type IntoIter = std::slice::Iter<'a, Rgbw>;

    fn into_iter(self) -> Self::IntoIter {
        self.pixels.iter()
    }
}

/// The RGB part of a gradient, with endpoints already brightness-normalized.
///
/// Both endpoints are normalized independently, each against its own
/// brightest channel.
#[derive(Debug, Clone, Copy)]
pub struct Gradient {
    pixel_count: usize,
    tau: f64,
    amplifier: i8,
    bottom: RGB8,
    top: RGB8,
}

impl Gradient {
    #[must_use]
    pub fn new(params: &RenderParams) -> Self {
        Self {
            pixel_count: params.pixel_count(),
            tau: f64::from(params.tau()),
            amplifier: params.amplifier(),
            bottom: normalize_endpoint(params.color_bottom(), params.brightness()),
            top: normalize_endpoint(params.color_top(), params.brightness()),
        }
    }

    /// Normalized bottom color (pixel 1)
    #[must_use]
    pub const fn bottom(&self) -> RGB8 {
        self.bottom
    }

    /// Normalized top color (pixel `pixel_count`)
    #[must_use]
    pub const fn top(&self) -> RGB8 {
        self.top
    }

    /// RGB of pixel `index`, 1-based from the bottom.
    ///
    /// Interior pixels follow `bottom - (bottom - top) * curve` per channel.
    #[must_use]
    pub fn pixel(&self, index: usize) -> RGB8 {
        debug_assert!((1..=self.pixel_count).contains(&index));
        if index <= 1 {
            return self.bottom;
        }
        if index >= self.pixel_count {
            return self.top;
        }
        let curve = curve_value(index, self.pixel_count, self.tau, self.amplifier);
        let channel = |bottom: u8, top: u8| {
            let delta = f64::from(i16::from(bottom) - i16::from(top));
            clamp255(f64::from(bottom) - delta * curve)
        };
        RGB8 {
            r: channel(self.bottom.r, self.top.r),
            g: channel(self.bottom.g, self.top.g),
            b: channel(self.bottom.b, self.top.b),
        }
    }

    /// Pixels in strip order, bottom first
    pub fn pixels(&self) -> impl Iterator<Item = RGB8> + '_ {
        (1..=self.pixel_count).map(|i| self.pixel(i))
    }
}

/// Scale applied to each pixel's achromatic value to get its white channel.
///
/// Maps `peak` (the brightest achromatic value in the frame) onto
/// `floor(255 * white_target / 100)`. A completely black frame gets a zero
/// factor.
#[must_use]
pub fn white_balance(peak: u8, white_target: u8) -> ChannelScale {
    ChannelScale::new(percent_limit(white_target), peak)
}

/// Render a full frame.
#[must_use]
pub fn render(params: &RenderParams) -> Frame {
    if !params.status() {
        return Frame::off(params.pixel_count());
    }

    let gradient = Gradient::new(params);

    // Discovery pass: brightest achromatic value along the strip
    let peak = gradient.pixels().map(achromatic).max().unwrap_or(0);
    let balance = white_balance(peak, params.white_target());

    // Final pass
    gradient
        .pixels()
        .map(|rgb| Rgbw::from_rgb(rgb, balance.apply(achromatic(rgb))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::max_channel;
    use crate::params::RawRenderParams;

    fn params(raw: RawRenderParams) -> RenderParams {
        RenderParams::new(raw).unwrap()
    }

    fn base() -> RawRenderParams {
        RawRenderParams {
            pixel_count: 5,
            status: true,
            brightness: 100,
            amplifier: 0,
            tau: 1.0,
            color_bottom: RGB8::new(0, 0, 0),
            color_top: RGB8::new(255, 255, 255),
            white_target: 100,
        }
    }

    fn day() -> RawRenderParams {
        RawRenderParams {
            pixel_count: 41,
            status: true,
            brightness: 70,
            amplifier: 0,
            tau: 5.125,
            color_bottom: RGB8::new(194, 255, 0),
            color_top: RGB8::new(0, 193, 255),
            white_target: 40,
        }
    }

    #[test]
    fn test_off_frame_is_dark() {
        for pixel_count in [2, 5, 41, 300] {
            let frame = render(&params(RawRenderParams {
                pixel_count,
                status: false,
                ..day()
            }));
            assert_eq!(frame.len(), pixel_count);
            assert!(frame.is_dark());
        }
    }

    #[test]
    fn test_black_to_white_end_to_end() {
        let p = params(base());
        let gradient = Gradient::new(&p);
        let w: Vec<u8> = gradient.pixels().map(achromatic).collect();
        assert_eq!(w.len(), 5);
        assert_eq!(w[0], 0);
        assert_eq!(w[4], 255);
        assert!(w.windows(2).all(|pair| pair[0] <= pair[1]), "{w:?}");

        let frame = render(&p);
        let white_max = frame.iter().map(|px| px.w).max().unwrap();
        assert_eq!(white_max, 255);
        assert_eq!(frame.pixels()[0], Rgbw::OFF);
        assert_eq!(frame.pixels()[4], Rgbw::new(255, 255, 255, 255));
        // Linear ramp: 0, 63.75, 127.5, 191.25, 255 truncated
        assert_eq!(frame.pixels()[2].rgb(), RGB8::new(127, 127, 127));
    }

    #[test]
    fn test_endpoints_are_normalized_copies() {
        let p = params(day());
        let frame = render(&p);
        let bottom = normalize_endpoint(p.color_bottom(), p.brightness());
        let top = normalize_endpoint(p.color_top(), p.brightness());
        assert_eq!(frame.pixels()[0].rgb(), bottom);
        assert_eq!(frame.pixels()[40].rgb(), top);
        // Independent normalization: both endpoints hit the 70% limit
        assert_eq!(max_channel(bottom), 178);
        assert_eq!(max_channel(top), 178);
    }

    #[test]
    fn test_every_pixel_within_brightness_limit() {
        for brightness in [0u8, 1, 30, 70, 100] {
            for amplifier in [-100i8, -30, 0, 30, 100] {
                let frame = render(&params(RawRenderParams {
                    brightness,
                    amplifier,
                    ..day()
                }));
                let limit = percent_limit(brightness);
                for px in &frame {
                    assert!(max_channel(px.rgb()) <= limit, "{px:?} b={brightness}");
                }
            }
        }
    }

    #[test]
    fn test_white_balance_hits_target() {
        for white_target in [1u8, 25, 40, 77, 100] {
            let p = params(RawRenderParams {
                white_target,
                ..day()
            });
            let frame = render(&p);
            let peak = Gradient::new(&p).pixels().map(achromatic).max().unwrap();
            assert!(peak > 0);
            let white_max = frame.iter().map(|px| px.w).max().unwrap();
            assert_eq!(white_max, percent_limit(white_target));
            let factor = white_balance(peak, white_target).factor();
            let expected = 255.0 * f64::from(white_target) / 100.0;
            assert!((f64::from(peak) * factor - expected).abs() < 1.0);
        }
    }

    #[test]
    fn test_black_strip_has_zero_white_factor() {
        let p = params(RawRenderParams {
            color_bottom: RGB8::new(0, 0, 0),
            color_top: RGB8::new(0, 0, 0),
            white_target: 100,
            ..day()
        });
        assert_eq!(white_balance(0, 100), ChannelScale::ZERO);
        let frame = render(&p);
        assert_eq!(frame.len(), 41);
        assert!(frame.is_dark());
    }

    #[test]
    fn test_zero_brightness_is_dark() {
        let frame = render(&params(RawRenderParams {
            brightness: 0,
            ..day()
        }));
        assert!(frame.is_dark());
    }

    #[test]
    fn test_white_target_zero_leaves_rgb() {
        let frame = render(&params(RawRenderParams {
            white_target: 0,
            ..day()
        }));
        assert!(frame.iter().all(|px| px.w == 0));
        assert!(!frame.is_dark());
    }

    #[test]
    fn test_passes_agree() {
        // The final RGB equals the gradient evaluated on its own
        let p = params(RawRenderParams {
            amplifier: -60,
            ..day()
        });
        let gradient = Gradient::new(&p);
        let frame = render(&p);
        for (px, rgb) in frame.iter().zip(gradient.pixels()) {
            assert_eq!(px.rgb(), rgb);
        }
    }

    #[test]
    fn test_two_pixel_strip_is_endpoints_only() {
        let p = params(RawRenderParams {
            pixel_count: 2,
            ..base()
        });
        let frame = render(&p);
        assert_eq!(
            frame.pixels(),
            &[Rgbw::OFF, Rgbw::new(255, 255, 255, 255)]
        );
    }

    #[test]
    fn test_amplifier_sign_changes_shape() {
        let linear = render(&params(base()));
        let fast = render(&params(RawRenderParams {
            amplifier: 100,
            ..base()
        }));
        let slow = render(&params(RawRenderParams {
            amplifier: -100,
            ..base()
        }));
        // Bottom is black, top white: the fast curve brightens early, the slow one late
        assert!(fast.pixels()[1].r > linear.pixels()[1].r);
        assert!(slow.pixels()[1].r < linear.pixels()[1].r);
    }
}
