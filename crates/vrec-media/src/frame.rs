//! Decoded raster frames.

use image::{GrayImage, RgbImage};

use crate::error::{MediaError, MediaResult};

/// Bytes per pixel of decoded frames (packed RGB).
pub const CHANNELS: usize = 3;

/// One sampled frame: packed RGB rows plus its ordinal in the sampled
/// sequence. Owned by whichever worker classifies it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    /// Wrap a packed RGB buffer, checking its size against the dimensions.
    pub fn from_rgb(index: u64, width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = frame_len(width, height);
        if data.len() != expected {
            return Err(MediaError::invalid_frame(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            index,
            width,
            height,
            data,
        })
    }

    /// Solid-colour frame; handy for tests and placeholders.
    pub fn filled(index: u64, width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(frame_len(width, height))
            .collect();
        Self {
            index,
            width,
            height,
            data,
        }
    }

    pub fn to_rgb_image(&self) -> MediaResult<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| MediaError::invalid_frame("buffer does not match dimensions"))
    }

    /// Single channel plane (0 = red, 1 = green, 2 = blue).
    pub fn channel(&self, channel: usize) -> MediaResult<GrayImage> {
        if channel >= CHANNELS {
            return Err(MediaError::invalid_frame(format!("no channel {}", channel)));
        }
        let plane: Vec<u8> = self
            .data
            .chunks_exact(CHANNELS)
            .map(|px| px[channel])
            .collect();
        GrayImage::from_raw(self.width, self.height, plane)
            .ok_or_else(|| MediaError::invalid_frame("buffer does not match dimensions"))
    }

    /// Luma plane.
    pub fn luma(&self) -> MediaResult<GrayImage> {
        Ok(image::imageops::grayscale(&self.to_rgb_image()?))
    }
}

/// Size in bytes of one packed RGB frame.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_checks_length() {
        assert!(Frame::from_rgb(0, 2, 2, vec![0; 12]).is_ok());
        assert!(Frame::from_rgb(0, 2, 2, vec![0; 11]).is_err());
    }

    #[test]
    fn test_channel_extraction() {
        let frame = Frame::filled(0, 3, 2, [10, 20, 30]);
        let red = frame.channel(0).unwrap();
        let blue = frame.channel(2).unwrap();
        assert_eq!(red.dimensions(), (3, 2));
        assert!(red.pixels().all(|p| p.0[0] == 10));
        assert!(blue.pixels().all(|p| p.0[0] == 30));
        assert!(frame.channel(3).is_err());
    }

    #[test]
    fn test_luma_of_white_is_white() {
        let luma = Frame::filled(0, 4, 4, [255, 255, 255]).luma().unwrap();
        assert!(luma.pixels().all(|p| p.0[0] == 255));
    }
}
