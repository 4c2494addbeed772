use std::fmt;
use std::str::FromStr;

use colors_transform::{Color, Rgb};
use thiserror::Error;

use crate::constants::PALETTE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorError {
    #[error("`{0}` is not a hex color")]
    InvalidHex(String),
}

/// A color as stored in the pixel table, always rendered as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor([u8; 3]);

impl HexColor {
    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        HexColor([red, green, blue])
    }

    /// Parses `#RGB` or `#RRGGBB` (any case) and normalizes it.
    pub fn parse(input: &str) -> Result<Self, ColorError> {
        let trimmed = input.trim();
        let digits = match trimmed.strip_prefix('#') {
            Some(digits) if matches!(digits.len(), 3 | 6) => digits,
            _ => return Err(ColorError::InvalidHex(input.to_string())),
        };
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorError::InvalidHex(input.to_string()));
        }

        let parsed =
            Rgb::from_hex_str(trimmed).map_err(|_| ColorError::InvalidHex(input.to_string()))?;

        Ok(HexColor([
            parsed.get_red().round() as u8,
            parsed.get_green().round() as u8,
            parsed.get_blue().round() as u8,
        ]))
    }

    pub fn rgb(&self) -> [u8; 3] {
        self.0
    }

    pub fn rgba(&self) -> [u8; 4] {
        [self.0[0], self.0[1], self.0[2], 0xff]
    }

    /// Approximate human name for palette colors, `Custom` for anything else.
    pub fn name(&self) -> &'static str {
        PALETTE
            .iter()
            .find(|(color, _)| color == self)
            .map(|(_, name)| *name)
            .unwrap_or("Custom")
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for HexColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HexColor::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HexColor::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.to_string()
    }
}
