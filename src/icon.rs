//! Tray icons, drawn at startup rather than loaded from disk: a gray
//! microphone with a status dot in the corner.

use image::{Rgba, RgbaImage};
use onair_core::Rgb;

const SIZE: u32 = 32;
const MIC_COLOR: Rgba<u8> = Rgba([110, 110, 110, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
const DOT_CENTER: (f32, f32) = (24.5, 24.5);
const DOT_RADIUS: f32 = 6.5;

/// Icon with a dot in `status` color, or the bare microphone for `None`.
pub fn icon(status: Option<Rgb>) -> anyhow::Result<tray_icon::Icon> {
    let image = draw(status);
    let (width, height) = image.dimensions();
    Ok(tray_icon::Icon::from_rgba(image.into_raw(), width, height)?)
}

fn draw(status: Option<Rgb>) -> RgbaImage {
    RgbaImage::from_fn(SIZE, SIZE, |x, y| {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        if let Some(Rgb { r, g, b }) = status {
            let (cx, cy) = DOT_CENTER;
            if (px - cx).powi(2) + (py - cy).powi(2) <= DOT_RADIUS.powi(2) {
                return Rgba([r, g, b, 255]);
            }
        }
        if is_microphone(px, py) {
            MIC_COLOR
        } else {
            CLEAR
        }
    })
}

fn is_microphone(x: f32, y: f32) -> bool {
    // Capsule: a 10px wide bar with round ends, from y=3 to y=19.
    let capsule = {
        let (cx, half_width) = (14.0, 5.0);
        let clamped_y = y.clamp(8.0, 14.0);
        (x - cx).powi(2) + (y - clamped_y).powi(2) <= half_width * half_width
    };
    let stem = (13.0..=15.0).contains(&x) && (20.0..=25.0).contains(&y);
    let base = (9.0..=19.0).contains(&x) && (25.0..=27.0).contains(&y);
    capsule || stem || base
}
