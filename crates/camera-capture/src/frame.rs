//! Video frame types and processing

use image::{GrayImage, RgbImage};

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Build a frame from a grayscale image (intensity copied to all channels)
    pub fn from_gray(gray: &GrayImage, sequence: u32) -> Self {
        let mut data = Vec::with_capacity((gray.width() * gray.height() * 3) as usize);
        for pixel in gray.pixels() {
            data.extend_from_slice(&[pixel[0], pixel[0], pixel[0]]);
        }
        Self::new(data, gray.width(), gray.height(), 0, sequence)
    }

    /// Build a frame from a decoded RGB image
    pub fn from_rgb(rgb: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Decode an encoded image (JPEG, PNG, ...) into a frame
    pub fn decode(bytes: &[u8], timestamp_ns: u64, sequence: u32) -> Result<Self, CameraError> {
        let img = image::load_from_memory(bytes).map_err(|e| CameraError::Decode(e.to_string()))?;
        Ok(Self::from_rgb(img.to_rgb8(), timestamp_ns, sequence))
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Convert to a grayscale intensity image
    pub fn to_gray_image(&self) -> Result<GrayImage, CameraError> {
        let expected = (self.width * self.height * 3) as usize;
        if self.data.len() != expected {
            return Err(CameraError::Decode(format!(
                "frame {} has {} bytes, expected {}",
                self.sequence,
                self.data.len(),
                expected
            )));
        }

        let mut gray = Vec::with_capacity((self.width * self.height) as usize);
        for pixel in self.data.chunks(3) {
            // Luminance formula: 0.299*R + 0.587*G + 0.114*B
            let y = (pixel[0] as f32 * 0.299
                   + pixel[1] as f32 * 0.587
                   + pixel[2] as f32 * 0.114) as u8;
            gray.push(y);
        }

        GrayImage::from_raw(self.width, self.height, gray)
            .ok_or_else(|| CameraError::Decode("grayscale buffer size mismatch".into()))
    }
}
