//! Image loading utilities for texture data
//!
//! Decodes PNG/JPEG files into tightly packed RGBA8 pixels ready for staging.

use super::{Asset, AssetError};
use std::path::Path;

/// Decoded texture pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Bits per pixel of `pixels` (always 32 for RGBA8)
    pub bits_per_pixel: u32,
    /// Raw RGBA pixel data, row-major, top row first
    pub pixels: Vec<u8>,
}

impl Texture {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::FileNotFound(path.to_path_buf()));
        }

        log::debug!("Loading image from: {}", path.display());

        let rgba = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("Failed to load image {}: {e}", path.display())))?
            .to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Loaded image {}x{} from {}", width, height, path.display());

        Ok(Self {
            width,
            height,
            bits_per_pixel: 32,
            pixels: rgba.into_raw(),
        })
    }

    /// Create a solid color image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        Self {
            width,
            height,
            bits_per_pixel: 32,
            pixels: color.repeat(pixel_count),
        }
    }

    /// Size of the pixel data in bytes
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.bits_per_pixel / 8)
    }
}

impl Asset for Texture {
    const KIND: &'static str = "texture";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_color_image() {
        let img = Texture::solid_color(4, 2, [255, 0, 0, 255]);
        assert_eq!(img.size_bytes(), 4 * 2 * 4);
        assert_eq!(img.pixels.len() as u64, img.size_bytes());
        assert_eq!(&img.pixels[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn missing_file_is_not_found() {
        let result = Texture::from_file("definitely/missing/texture.png");
        assert!(matches!(result, Err(AssetError::FileNotFound(_))));
    }
}
