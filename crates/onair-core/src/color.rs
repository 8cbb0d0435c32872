//! The reference color scheme shared by every RGB status device.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Lowercase hex without a leading `#`, e.g. `ff0000`.
    pub fn hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Friendly name for the colors we send, falling back to `RGB(r, g, b)`.
    pub fn name(&self) -> String {
        match *self {
            Rgb::GREEN => "Green".to_string(),
            Rgb::RED => "Red".to_string(),
            Rgb::YELLOW => "Yellow".to_string(),
            Rgb::OFF => "Off".to_string(),
            Rgb { r, g, b } => format!("RGB({}, {}, {})", r, g, b),
        }
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Self::new(r, g, b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}
