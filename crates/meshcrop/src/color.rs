//! Colour string normalisation.
//!
//! Accepted forms, tried in order: `#rgb`, `#rrggbb`, `0xrrggbb`,
//! `rgb(r, g, b)`, then a small table of names. Anything else yields the
//! caller's default.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 8-bit sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

/// Default crop-box outline colour.
pub const DEFAULT_CROP_BOX_COLOR: Color = Color::rgb(0xff, 0x88, 0x00);

const NAMED: [(&str, Color); 12] = [
    ("black", Color::rgb(0, 0, 0)),
    ("white", Color::rgb(255, 255, 255)),
    ("red", Color::rgb(255, 0, 0)),
    ("green", Color::rgb(0, 128, 0)),
    ("lime", Color::rgb(0, 255, 0)),
    ("blue", Color::rgb(0, 0, 255)),
    ("yellow", Color::rgb(255, 255, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("gray", Color::rgb(128, 128, 128)),
    ("grey", Color::rgb(128, 128, 128)),
];

impl Color {
    /// Colour from components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `0xRRGGBB`.
    pub fn to_u32(&self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    /// Components scaled to `0.0..=1.0`.
    pub fn to_f32(&self) -> [f32; 3] {
        [self.r, self.g, self.b].map(|c| f32::from(c) / 255.0)
    }
}

impl Default for Color {
    fn default() -> Self {
        DEFAULT_CROP_BOX_COLOR
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Parse `input`, falling back to `fallback` when no form matches.
pub fn parse_color(input: &str, fallback: Color) -> Color {
    try_parse_color(input).unwrap_or_else(|| {
        tracing::debug!(input, %fallback, "unrecognised colour, using fallback");
        fallback
    })
}

/// Parse `input`, or `None` when no form matches.
pub fn try_parse_color(input: &str) -> Option<Color> {
    let input = input.trim();
    parse_hex(input)
        .or_else(|| parse_rgb_function(input))
        .or_else(|| parse_named(input))
}

fn parse_hex(input: &str) -> Option<Color> {
    let digits = input
        .strip_prefix('#')
        .or_else(|| input.strip_prefix("0x"))
        .or_else(|| input.strip_prefix("0X"))?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        3 => {
            let value = u16::from_str_radix(digits, 16).ok()?;
            let nibble = |shift: u16| ((value >> shift) & 0xf) as u8 * 17;
            Some(Color::rgb(nibble(8), nibble(4), nibble(0)))
        }
        6 => {
            let value = u32::from_str_radix(digits, 16).ok()?;
            Some(Color::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8))
        }
        _ => None,
    }
}

fn parse_rgb_function(input: &str) -> Option<Color> {
    let lower = input.to_ascii_lowercase();
    let args = lower.strip_prefix("rgb(")?.strip_suffix(')')?;
    let channels: Vec<u8> = args
        .split(',')
        .map(|part| part.trim().parse::<u8>().ok())
        .collect::<Option<_>>()?;
    match channels.as_slice() {
        [r, g, b] => Some(Color::rgb(*r, *g, *b)),
        _ => None,
    }
}

fn parse_named(input: &str) -> Option<Color> {
    NAMED
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(input))
        .map(|(_, color)| *color)
}
