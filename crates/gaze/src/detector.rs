//! Eye region detection

use image::imageops;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::pupil::Point2D;

/// Axis-aligned eye rectangle in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl EyeRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Center in the region's own coordinate frame
    pub fn local_center(&self) -> Point2D {
        Point2D::new(self.width as f32 / 2.0, self.height as f32 / 2.0)
    }

    /// Intersect with a `frame_width` x `frame_height` frame
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<EyeRegion> {
        if self.x >= frame_width || self.y >= frame_height {
            return None;
        }
        let width = self.width.min(frame_width - self.x);
        let height = self.height.min(frame_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(EyeRegion::new(self.x, self.y, width, height))
    }

    /// Copy the region out of `frame`, clipped to the frame bounds
    pub fn crop(&self, frame: &GrayImage) -> Option<(EyeRegion, GrayImage)> {
        let clipped = self.clamp_to(frame.width(), frame.height())?;
        let eye = imageops::crop_imm(frame, clipped.x, clipped.y, clipped.width, clipped.height).to_image();
        Some((clipped, eye))
    }
}

/// Finds eye regions in a grayscale frame.
///
/// Constructed once per session; implementations should keep any model
/// state loaded across calls.
pub trait RegionDetector: Send + Sync {
    /// Eye regions in detection order (possibly empty)
    fn detect(&self, frame: &GrayImage) -> Vec<EyeRegion>;
}

/// Heuristic detector placing eye boxes at fixed proportions of the frame.
///
/// Assumes a roughly centered, camera-facing user; frames without enough
/// contrast (covered lens, lights off) yield no regions.
pub struct ProportionalEyeDetector {
    config: DetectorConfig,
}

impl ProportionalEyeDetector {
    /// Eye keypoints as fractions of the frame, left eye first
    const EYE_KEYPOINTS: [(f32, f32); 2] = [(0.35, 0.3), (0.65, 0.3)];

    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn contrast(frame: &GrayImage) -> f32 {
        let n = (frame.width() * frame.height()) as f32;
        if n == 0.0 {
            return 0.0;
        }
        let mean = frame.pixels().map(|p| p[0] as f32).sum::<f32>() / n;
        let variance = frame
            .pixels()
            .map(|p| {
                let d = p[0] as f32 - mean;
                d * d
            })
            .sum::<f32>()
            / n;
        variance.sqrt()
    }
}

impl RegionDetector for ProportionalEyeDetector {
    fn detect(&self, frame: &GrayImage) -> Vec<EyeRegion> {
        let contrast = Self::contrast(frame);
        if contrast < self.config.min_frame_contrast {
            debug!("Frame contrast {:.1} below {:.1}, no face", contrast, self.config.min_frame_contrast);
            return Vec::new();
        }

        let fw = frame.width() as f32;
        let fh = frame.height() as f32;
        let w = (fw * self.config.eye_width_fraction).round().max(1.0);
        let h = (fh * self.config.eye_height_fraction).round().max(1.0);

        Self::EYE_KEYPOINTS
            .iter()
            .filter_map(|(kx, ky)| {
                let x = (fw * kx - w / 2.0).max(0.0) as u32;
                let y = (fh * ky - h / 2.0).max(0.0) as u32;
                EyeRegion::new(x, y, w as u32, h as u32).clamp_to(frame.width(), frame.height())
            })
            .collect()
    }
}

/// Detector returning a fixed list of regions
#[derive(Debug, Clone, Default)]
pub struct FixedRegionDetector {
    regions: Vec<EyeRegion>,
}

impl FixedRegionDetector {
    pub fn new(regions: Vec<EyeRegion>) -> Self {
        Self { regions }
    }
}

impl RegionDetector for FixedRegionDetector {
    fn detect(&self, _frame: &GrayImage) -> Vec<EyeRegion> {
        self.regions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_clamp_inside_frame() {
        let region = EyeRegion::new(10, 10, 20, 20);
        assert_eq!(region.clamp_to(100, 100), Some(region));
    }

    #[test]
    fn test_clamp_partially_outside() {
        let region = EyeRegion::new(90, 95, 20, 20);
        assert_eq!(region.clamp_to(100, 100), Some(EyeRegion::new(90, 95, 10, 5)));
    }

    #[test]
    fn test_clamp_fully_outside() {
        assert_eq!(EyeRegion::new(100, 0, 5, 5).clamp_to(100, 100), None);
    }

    #[test]
    fn test_crop_copies_pixels() {
        let frame = GrayImage::from_fn(10, 10, |x, y| Luma([(y * 10 + x) as u8]));
        let (region, eye) = EyeRegion::new(2, 3, 4, 2).crop(&frame).unwrap();
        assert_eq!(region.width, 4);
        assert_eq!(eye.dimensions(), (4, 2));
        assert_eq!(eye.get_pixel(0, 0)[0], 32);
        assert_eq!(eye.get_pixel(3, 1)[0], 45);
    }

    #[test]
    fn test_local_center() {
        assert_eq!(EyeRegion::new(5, 5, 100, 60).local_center(), Point2D::new(50.0, 30.0));
    }

    #[test]
    fn test_proportional_detector_left_eye_first() {
        let frame = GrayImage::from_fn(200, 100, |x, _| Luma([if x % 2 == 0 { 40 } else { 220 }]));
        let detector = ProportionalEyeDetector::new(&DetectorConfig::default());
        let regions = detector.detect(&frame);

        assert_eq!(regions.len(), 2);
        assert!(regions[0].x < regions[1].x);
        assert_eq!(regions[0].width, 32);
        assert_eq!(regions[0].height, 12);
    }

    #[test]
    fn test_proportional_detector_flat_frame() {
        let frame = GrayImage::from_pixel(200, 100, Luma([5]));
        let detector = ProportionalEyeDetector::new(&DetectorConfig::default());
        assert!(detector.detect(&frame).is_empty());
    }
}
