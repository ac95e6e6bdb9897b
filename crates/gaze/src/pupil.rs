//! Pupil localization
//!
//! The pupil is the darkest blob inside an eye crop. Each raw centroid goes
//! into a bounded sample window and the window mean is what callers see.

use std::collections::HashMap;

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::region_labelling::{connected_components, Connectivity};
use sample_window::{Sample, SampleWindow};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::LocalizerConfig;

/// Pixel coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Component-wise difference `self - origin`
    pub fn offset_from(self, origin: Point2D) -> Point2D {
        Point2D::new(self.x - origin.x, self.y - origin.y)
    }
}

impl Sample for Point2D {
    fn zero() -> Self {
        Point2D::default()
    }

    fn add(self, other: Self) -> Self {
        Point2D::new(self.x + other.x, self.y + other.y)
    }

    fn scale(self, factor: f64) -> Self {
        Point2D::new((self.x as f64 * factor) as f32, (self.y as f64 * factor) as f32)
    }
}

/// Pupil position in eye-region local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PupilSample {
    pub position: Point2D,
    /// Sequence number of the frame the sample came from
    pub sequence: u32,
}

/// Dark-blob pupil localizer with a smoothing window
pub struct PupilLocalizer {
    config: LocalizerConfig,
    window: SampleWindow<Point2D>,
}

impl PupilLocalizer {
    pub fn new(config: &LocalizerConfig) -> Self {
        Self {
            window: SampleWindow::new(config.window_capacity),
            config: config.clone(),
        }
    }

    /// Locate the pupil in an eye crop and return the smoothed position.
    ///
    /// Returns `None` without touching the window when no usable dark blob
    /// is found.
    pub fn locate(&mut self, eye: &GrayImage, sequence: u32) -> Option<PupilSample> {
        let raw = find_pupil_centroid(eye, &self.config)?;
        let smoothed = self.window.push_and_mean(raw);
        trace!(
            "pupil raw=({:.1},{:.1}) smoothed=({:.1},{:.1}) window={}",
            raw.x, raw.y, smoothed.x, smoothed.y, self.window.len()
        );
        Some(PupilSample {
            position: smoothed,
            sequence,
        })
    }

    /// Drop smoothing history (new session or calibration anchor)
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Samples currently held in the smoothing window
    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}

/// Unsmoothed centroid of the largest dark blob in `eye`
pub fn find_pupil_centroid(eye: &GrayImage, config: &LocalizerConfig) -> Option<Point2D> {
    let (width, height) = eye.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let blurred = if config.blur_sigma > 0.0 {
        gaussian_blur_f32(eye, config.blur_sigma)
    } else {
        eye.clone()
    };

    let mut min = u8::MAX;
    let mut max = u8::MIN;
    let mut sum = 0u64;
    for pixel in blurred.pixels() {
        min = min.min(pixel[0]);
        max = max.max(pixel[0]);
        sum += pixel[0] as u64;
    }
    if max.saturating_sub(min) < config.min_contrast {
        return None;
    }

    let mean = sum as f32 / (width * height) as f32;
    let cutoff = min as f32 + config.dark_fraction * (mean - min as f32);

    let mask = GrayImage::from_fn(width, height, |x, y| {
        if blurred.get_pixel(x, y)[0] as f32 <= cutoff {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut areas: HashMap<u32, u32> = HashMap::new();
    for label in labels.pixels() {
        if label[0] != 0 {
            *areas.entry(label[0]).or_default() += 1;
        }
    }

    // Largest area wins; ties go to the first labelled blob
    let (pupil_label, area) = areas
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))?;
    if area < config.min_blob_area {
        return None;
    }

    let mut mass = 0.0f64;
    let mut sx = 0.0f64;
    let mut sy = 0.0f64;
    for (x, y, label) in labels.enumerate_pixels() {
        if label[0] != pupil_label {
            continue;
        }
        let weight = (u8::MAX - blurred.get_pixel(x, y)[0]) as f64;
        mass += weight;
        sx += weight * x as f64;
        sy += weight * y as f64;
    }

    if mass <= 0.0 {
        return None;
    }
    Some(Point2D::new((sx / mass) as f32, (sy / mass) as f32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eye_with_pupil(cx: f32, cy: f32, radius: f32) -> GrayImage {
        GrayImage::from_fn(100, 100, |x, y| {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= radius * radius {
                Luma([20])
            } else {
                Luma([200])
            }
        })
    }

    fn assert_near(p: Point2D, x: f32, y: f32) {
        assert!((p.x - x).abs() < 0.75, "x {} not near {}", p.x, x);
        assert!((p.y - y).abs() < 0.75, "y {} not near {}", p.y, y);
    }

    #[test]
    fn test_centroid_of_single_pupil() {
        let eye = eye_with_pupil(30.0, 40.0, 8.0);
        let p = find_pupil_centroid(&eye, &LocalizerConfig::default()).unwrap();
        assert_near(p, 30.0, 40.0);
    }

    #[test]
    fn test_largest_blob_wins() {
        let mut eye = eye_with_pupil(70.0, 50.0, 10.0);
        // Small dark speck (eyelash shadow)
        for y in 10..13 {
            for x in 10..13 {
                eye.put_pixel(x, y, Luma([10]));
            }
        }
        let config = LocalizerConfig {
            blur_sigma: 0.0,
            ..Default::default()
        };
        let p = find_pupil_centroid(&eye, &config).unwrap();
        assert_near(p, 70.0, 50.0);
    }

    #[test]
    fn test_uniform_crop_has_no_pupil() {
        let eye = GrayImage::from_pixel(40, 30, Luma([128]));
        assert!(find_pupil_centroid(&eye, &LocalizerConfig::default()).is_none());
    }

    #[test]
    fn test_empty_crop_has_no_pupil() {
        let eye = GrayImage::new(0, 0);
        assert!(find_pupil_centroid(&eye, &LocalizerConfig::default()).is_none());
    }

    #[test]
    fn test_blob_below_min_area_rejected() {
        let mut eye = GrayImage::from_pixel(20, 20, Luma([200]));
        eye.put_pixel(5, 5, Luma([0]));
        let config = LocalizerConfig {
            blur_sigma: 0.0,
            min_blob_area: 4,
            ..Default::default()
        };
        assert!(find_pupil_centroid(&eye, &config).is_none());
    }

    #[test]
    fn test_locate_returns_window_mean() {
        let config = LocalizerConfig::default();
        let mut localizer = PupilLocalizer::new(&config);
        let positions = [20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0];

        let mut raws = Vec::new();
        let mut last = None;
        for (i, x) in positions.iter().enumerate() {
            let eye = eye_with_pupil(*x, 50.0, 6.0);
            raws.push(find_pupil_centroid(&eye, &config).unwrap());
            last = localizer.locate(&eye, i as u32);
        }

        let tail = &raws[raws.len() - 5..];
        let expected_x = tail.iter().map(|p| p.x).sum::<f32>() / 5.0;
        let sample = last.unwrap();
        assert_eq!(sample.sequence, 6);
        assert!((sample.position.x - expected_x).abs() < 1e-3);
        assert_eq!(localizer.window_len(), 5);
    }

    #[test]
    fn test_miss_leaves_window_untouched() {
        let config = LocalizerConfig::default();
        let mut localizer = PupilLocalizer::new(&config);
        localizer.locate(&eye_with_pupil(50.0, 50.0, 6.0), 0).unwrap();

        let blank = GrayImage::from_pixel(100, 100, Luma([200]));
        assert!(localizer.locate(&blank, 1).is_none());
        assert_eq!(localizer.window_len(), 1);

        localizer.reset();
        assert_eq!(localizer.window_len(), 0);
    }
}
