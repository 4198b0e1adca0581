use std::path::Path;

use anyhow::Context as _;

use crate::foundation::error::{ScopeError, ScopeResult};

/// A composited plot image as RGBA8 pixels.
///
/// Frames are **premultiplied alpha**; the `premultiplied` flag makes this explicit at API
/// boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major, top row first.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Pixel at `(x, y)`, `None` when out of range.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Straight-alpha copy suitable for image encoders.
    pub fn to_rgba_image(&self) -> ScopeResult<image::RgbaImage> {
        let mut straight = self.data.clone();
        if self.premultiplied {
            unpremultiply_in_place(&mut straight);
        }
        image::RgbaImage::from_raw(self.width, self.height, straight)
            .ok_or_else(|| ScopeError::validation("frame buffer does not match width*height*4"))
    }

    /// Write the frame as a PNG file.
    pub fn save_png(&self, path: &Path) -> ScopeResult<()> {
        let img = self.to_rgba_image()?;
        img.save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
