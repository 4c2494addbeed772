use std::time::Duration;

use crate::HexColor;

/// Edge length of the square canvas, in cells.
pub const GRID_SIZE: u16 = 200;

pub const DEFAULT_COLOR: HexColor = HexColor::from_rgb(0xFF, 0xFF, 0xFF);
pub const DEFAULT_SELECTED_COLOR: HexColor = HexColor::from_rgb(0x11, 0x11, 0x11);

/// Stored as `placed_by` when a placement carries no display name.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

pub const COOLDOWN_SECONDS: u32 = 5;
pub const CACHE_TTL: Duration = Duration::from_secs(5);

// Remote updates are applied onto the grid at most this often
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_PENDING_UPDATES: usize = 4096;

pub const PALETTE: [(HexColor, &str); 16] = [
    (HexColor::from_rgb(0xFF, 0x41, 0x36), "Red"),
    (HexColor::from_rgb(0xFF, 0x85, 0x1B), "Orange"),
    (HexColor::from_rgb(0xFF, 0xDC, 0x00), "Yellow"),
    (HexColor::from_rgb(0x7F, 0xDB, 0x6A), "Lime"),
    (HexColor::from_rgb(0x2E, 0xCC, 0x40), "Green"),
    (HexColor::from_rgb(0x39, 0xCC, 0xCC), "Teal"),
    (HexColor::from_rgb(0x00, 0x74, 0xD9), "Blue"),
    (HexColor::from_rgb(0x00, 0x1F, 0x3F), "Navy"),
    (HexColor::from_rgb(0xB1, 0x0D, 0xC9), "Purple"),
    (HexColor::from_rgb(0xF0, 0x12, 0xBE), "Magenta"),
    (HexColor::from_rgb(0xFF, 0x80, 0xCC), "Pink"),
    (HexColor::from_rgb(0x85, 0x14, 0x4B), "Maroon"),
    (HexColor::from_rgb(0xA5, 0x2A, 0x2A), "Brown"),
    (HexColor::from_rgb(0x11, 0x11, 0x11), "Black"),
    (HexColor::from_rgb(0xAA, 0xAA, 0xAA), "Gray"),
    (HexColor::from_rgb(0xFF, 0xFF, 0xFF), "White"),
];
