// Color Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// RGB color, one byte per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build a color from unchecked integer channels
    ///
    /// # Errors
    /// Returns `DomainError::OutOfRange` if any channel is outside 0..=255
    pub fn from_channels(r: i32, g: i32, b: i32) -> Result<Self> {
        DomainError::check_range("red channel", r.into(), 0, 256)?;
        DomainError::check_range("green channel", g.into(), 0, 256)?;
        DomainError::check_range("blue channel", b.into(), 0, 256)?;
        Ok(Self::new(r as u8, g as u8, b as u8))
    }

    /// Bytes in the order the WS2812 chain expects them
    pub fn to_grb(self) -> [u8; 3] {
        [self.g, self.r, self.b]
    }

    pub fn from_grb(grb: [u8; 3]) -> Self {
        Self::new(grb[1], grb[0], grb[2])
    }

    /// Integer HSL conversion, all components 0..=255.
    ///
    /// Hue wraps at 256. Matches the fixed-point routine the device tools
    /// have always used, so animations look the same on every host.
    pub fn from_hsl8(hue: u8, sat: u8, lum: u8) -> Self {
        let (hue, sat, lum) = (i32::from(hue), i32::from(sat), i32::from(lum));

        let v = if lum < 128 {
            (lum * (256 + sat)) >> 8
        } else {
            (((lum + sat) << 8) - lum * sat) >> 8
        };
        if v <= 0 {
            return Color::BLACK;
        }

        let m = lum + lum - v;
        let hue = hue * 6;
        let sextant = hue >> 8;
        let fract = hue - (sextant << 8);
        let vsf = (v * fract * (v - m) / v) >> 8;
        let mid1 = m + vsf;
        let mid2 = v - vsf;

        let (r, g, b) = match sextant {
            0 => (v, mid1, m),
            1 => (mid2, v, m),
            2 => (m, v, mid1),
            3 => (m, mid2, v),
            4 => (mid1, m, v),
            _ => (v, m, mid2),
        };
        Self::new(channel8(r), channel8(g), channel8(b))
    }

    /// Floating point HLS conversion (hue, lightness, saturation in 0.0..1.0).
    ///
    /// Hue wraps, so callers can add offsets without normalizing.
    pub fn from_hls(hue: f64, lightness: f64, saturation: f64) -> Self {
        let (r, g, b) = if saturation == 0.0 {
            (lightness, lightness, lightness)
        } else {
            let m2 = if lightness <= 0.5 {
                lightness * (1.0 + saturation)
            } else {
                lightness + saturation - lightness * saturation
            };
            let m1 = 2.0 * lightness - m2;
            (
                hls_component(m1, m2, hue + 1.0 / 3.0),
                hls_component(m1, m2, hue),
                hls_component(m1, m2, hue - 1.0 / 3.0),
            )
        };
        Self::new(unit_to_u8(r), unit_to_u8(g), unit_to_u8(b))
    }
}

fn hls_component(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

fn channel8(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

fn unit_to_u8(v: f64) -> u8 {
    (v * 255.0).clamp(0.0, 255.0) as u8
}
