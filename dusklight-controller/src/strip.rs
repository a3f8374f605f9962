use dusklight_gradient_lib::{Frame, Rgbw};
use log::{debug, info};
use smart_leds::{SmartLedsWrite, White, RGBW};
use std::convert::Infallible;

/// Convert a rendered pixel into the driver's RGBW color
pub const fn to_rgbw(pixel: Rgbw) -> RGBW<u8> {
    rgb::RGBA {
        r: pixel.r,
        g: pixel.g,
        b: pixel.b,
        a: White(pixel.w),
    }
}

/// Convert a driver color back into a rendered pixel
pub const fn from_rgbw(color: RGBW<u8>) -> Rgbw {
    Rgbw::new(color.r, color.g, color.b, color.a.0)
}

/// Write a frame to any RGBW driver
pub fn write_frame<W>(strip: &mut W, frame: &Frame) -> Result<(), W::Error>
where
    W: SmartLedsWrite<Color = RGBW<u8>>,
{
    strip.write(frame.iter().map(|&pixel| to_rgbw(pixel)))
}

/// Strip stand-in that logs each frame and keeps the last one
#[derive(Debug, Default)]
pub struct LogStrip {
    last: Vec<Rgbw>,
    frames: usize,
}

impl LogStrip {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pixels of the most recent frame, bottom first
    #[cfg(test)]
    pub fn last(&self) -> &[Rgbw] {
        &self.last
    }

    /// Number of frames written so far
    #[cfg(test)]
    pub const fn frames(&self) -> usize {
        self.frames
    }
}

impl SmartLedsWrite for LogStrip {
    type Error = Infallible;
    type Color = RGBW<u8>;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        self.last = iterator
            .into_iter()
            .map(|color| from_rgbw(color.into()))
            .collect();
        self.frames += 1;

        match (self.last.first(), self.last.last()) {
            (Some(bottom), Some(top)) => info!(
                "Strip: frame {} with {} pixels, bottom ({},{},{},{}) top ({},{},{},{})",
                self.frames,
                self.last.len(),
                bottom.r,
                bottom.g,
                bottom.b,
                bottom.w,
                top.r,
                top.g,
                top.b,
                top.w
            ),
            _ => info!("Strip: empty frame {}", self.frames),
        }
        for (i, px) in self.last.iter().enumerate() {
            debug!("Strip: {:>3}: {:>3} {:>3} {:>3} {:>3}", i + 1, px.r, px.g, px.b, px.w);
        }
        Ok(())
    }
}
