//! Raw texture pixel data

use std::path::Path;

use super::AssetError;

/// Decoded pixels ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Channels per pixel (1 to 4)
    pub channels: u8,
    /// Tightly packed pixel bytes, row-major
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Wrap raw pixel bytes, checking the size matches the dimensions
    pub fn new(width: u32, height: u32, channels: u8, pixels: Vec<u8>) -> Result<Self, AssetError> {
        let texture = Self {
            width,
            height,
            channels,
            pixels,
        };
        texture.validate()?;
        Ok(texture)
    }

    /// Check dimensions, channel count and that the pixel buffer covers
    /// exactly `width * height * channels` bytes
    pub fn validate(&self) -> Result<(), AssetError> {
        let (width, height, channels) = (self.width, self.height, self.channels);
        if width == 0 || height == 0 {
            return Err(AssetError::InvalidData("texture has zero area".to_string()));
        }
        if !(1..=4).contains(&channels) {
            return Err(AssetError::InvalidData(format!("unsupported channel count {channels}")));
        }
        let expected = u64::from(width) * u64::from(height) * u64::from(channels);
        if self.pixels.len() as u64 != expected {
            return Err(AssetError::InvalidData(format!(
                "expected {expected} bytes for {width}x{height}x{channels}, got {}",
                self.pixels.len()
            )));
        }
        Ok(())
    }

    /// Decode an image file into RGBA8
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        log::debug!("Loading image from: {}", path.display());

        let img = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("{}: {e}", path.display())))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Loaded image {width}x{height} from {}", path.display());
        Self::new(width, height, 4, rgba.into_raw())
    }

    /// Decode an encoded image held in memory into RGBA8
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| AssetError::LoadFailed(format!("in-memory image: {e}")))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(width, height, 4, rgba.into_raw())
    }

    /// Single-color RGBA image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = width as usize * height as usize;
        Self {
            width,
            height,
            channels: 4,
            pixels: color.repeat(pixel_count),
        }
    }

    /// Two-color RGBA checkerboard with square cells
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let pixels = (0..size)
            .flat_map(|y| (0..size).map(move |x| (x / cell + y / cell) % 2 == 0))
            .flat_map(|even| if even { a } else { b })
            .collect();
        Self {
            width: size,
            height: size,
            channels: 4,
            pixels,
        }
    }

    /// Pixels expanded to four channels.
    ///
    /// Grey values are replicated into RGB; missing alpha becomes opaque.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let channels = usize::from(self.channels.max(1));
        if channels == 4 {
            return self.pixels.clone();
        }

        self.pixels
            .chunks_exact(channels)
            .flat_map(|px| match *px {
                [l] => [l, l, l, 255],
                [l, a] => [l, l, l, a],
                [r, g, b] => [r, g, b, 255],
                _ => [0, 0, 0, 255],
            })
            .collect()
    }

    /// Size in bytes once expanded to RGBA8
    pub const fn rgba_size(&self) -> u64 {
        self.width as u64 * self.height as u64 * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_byte_count() {
        assert!(TextureData::new(2, 2, 4, vec![0; 16]).is_ok());
        assert!(TextureData::new(2, 2, 4, vec![0; 15]).is_err());
        assert!(TextureData::new(0, 2, 4, Vec::new()).is_err());
        assert!(TextureData::new(1, 1, 5, vec![0; 5]).is_err());
    }

    #[test]
    fn test_validate_catches_hand_built_textures() {
        let short = TextureData {
            width: 4,
            height: 4,
            channels: 4,
            pixels: vec![0; 4],
        };
        assert!(matches!(short.validate(), Err(AssetError::InvalidData(_))));

        let bad_channels = TextureData {
            width: 1,
            height: 1,
            channels: 0,
            pixels: Vec::new(),
        };
        assert!(bad_channels.validate().is_err());

        let good = TextureData::solid_color(4, 4, [1, 2, 3, 4]);
        assert!(good.validate().is_ok());
        assert_eq!(good.to_rgba8().len() as u64, good.rgba_size());
    }

    #[test]
    fn test_rgb_expands_with_opaque_alpha() {
        let texture = TextureData::new(2, 1, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(texture.to_rgba8(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
        assert_eq!(texture.rgba_size(), 8);
    }

    #[test]
    fn test_grey_alpha_expands() {
        let texture = TextureData::new(1, 1, 2, vec![9, 128]).unwrap();
        assert_eq!(texture.to_rgba8(), vec![9, 9, 9, 128]);
    }

    #[test]
    fn test_checkerboard_cells() {
        let white = [255; 4];
        let black = [0, 0, 0, 255];
        let texture = TextureData::checkerboard(4, 2, white, black);
        assert_eq!(texture.pixels.len(), 64);
        assert_eq!(&texture.pixels[0..4], &white);
        assert_eq!(&texture.pixels[8..12], &black);
        // second row of cells starts with black
        assert_eq!(&texture.pixels[32..36], &black);
    }

    #[test]
    fn test_solid_color() {
        let texture = TextureData::solid_color(3, 2, [1, 2, 3, 4]);
        assert_eq!(texture.pixels.len(), 24);
        assert_eq!(&texture.pixels[20..24], &[1, 2, 3, 4]);
    }
}
