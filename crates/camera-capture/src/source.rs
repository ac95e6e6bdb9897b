//! Frame sources
//!
//! A [`FrameSource`] is owned exclusively by whichever operation is reading
//! the camera. `next_frame` returning `Ok(None)` means the stream has ended.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{CameraConfig, CameraError, VideoFrame};

/// Supplies successive camera frames on demand
pub trait FrameSource: Send {
    /// Open the device. Must be called before `next_frame`.
    fn open(&mut self) -> Result<(), CameraError>;

    /// Read the next frame, `None` once the stream is exhausted
    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError>;

    /// Release the device
    fn close(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<(), CameraError> {
        (**self).open()
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Replays frames held in memory
pub struct ReplaySource {
    frames: Vec<VideoFrame>,
    position: usize,
    looped: bool,
    opened: bool,
}

impl ReplaySource {
    /// Replay `frames` once, then report end of stream
    pub fn new(frames: Vec<VideoFrame>) -> Self {
        Self {
            frames,
            position: 0,
            looped: false,
            opened: false,
        }
    }

    /// Replay `frames` forever
    pub fn looped(frames: Vec<VideoFrame>) -> Self {
        Self {
            looped: true,
            ..Self::new(frames)
        }
    }

    /// Number of frames handed out since the last `open`
    pub fn position(&self) -> usize {
        self.position
    }
}

impl FrameSource for ReplaySource {
    fn open(&mut self) -> Result<(), CameraError> {
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if !self.opened {
            return Err(CameraError::NotInitialized);
        }
        if self.frames.is_empty() {
            return Ok(None);
        }

        let idx = if self.looped {
            self.position % self.frames.len()
        } else if self.position < self.frames.len() {
            self.position
        } else {
            return Ok(None);
        };

        let mut frame = self.frames[idx].clone();
        frame.sequence = self.position as u32;
        self.position += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

/// Replays a directory of captured image files in file-name order
pub struct ImageSequenceSource {
    config: CameraConfig,
    files: Vec<PathBuf>,
    position: usize,
    sequence: u32,
    opened: bool,
}

impl ImageSequenceSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            position: 0,
            sequence: 0,
            opened: false,
        }
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg" | "bmp" | "pgm"))
            .unwrap_or(false)
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<(), CameraError> {
        let entries = std::fs::read_dir(&self.config.device)
            .map_err(|e| CameraError::Open(format!("{}: {}", self.config.device, e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| Self::is_image(path))
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::Open(format!(
                "{}: no image frames found",
                self.config.device
            )));
        }

        info!("Opened image sequence {} ({} frames)", self.config.device, files.len());
        self.files = files;
        self.position = 0;
        self.sequence = 0;
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>, CameraError> {
        if !self.opened {
            return Err(CameraError::NotInitialized);
        }

        if self.position >= self.files.len() {
            if !self.config.looped {
                debug!("Image sequence exhausted after {} frames", self.sequence);
                return Ok(None);
            }
            self.position = 0;
        }

        let path = &self.files[self.position];
        self.position += 1;

        let bytes = std::fs::read(path).map_err(|e| {
            warn!("Failed to read frame {}: {}", path.display(), e);
            CameraError::Stream(e.to_string())
        })?;

        let frame = VideoFrame::decode(&bytes, 0, self.sequence)?;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.files.clear();
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(n: usize) -> Vec<VideoFrame> {
        (0..n).map(|_| VideoFrame::new(vec![0; 12], 2, 2, 0, 0)).collect()
    }

    #[test]
    fn test_replay_requires_open() {
        let mut source = ReplaySource::new(blank(1));
        assert!(matches!(source.next_frame(), Err(CameraError::NotInitialized)));
    }

    #[test]
    fn test_replay_ends() {
        let mut source = ReplaySource::new(blank(2));
        source.open().unwrap();

        assert_eq!(source.next_frame().unwrap().unwrap().sequence, 0);
        assert_eq!(source.next_frame().unwrap().unwrap().sequence, 1);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_replay_looped_keeps_counting() {
        let mut source = ReplaySource::looped(blank(2));
        source.open().unwrap();

        for expected in 0..5 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.sequence, expected);
        }
        assert_eq!(source.position(), 5);
    }

    #[test]
    fn test_missing_directory_fails_open() {
        let mut source = ImageSequenceSource::new(CameraConfig::once("/nonexistent/gaze-frames"));
        assert!(matches!(source.open(), Err(CameraError::Open(_))));
    }

    #[test]
    fn test_image_sequence_reads_in_name_order() {
        let dir = std::env::temp_dir().join(format!("gaze-frames-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, shade) in [("b.png", 200u8), ("a.png", 10u8)] {
            let img = image::GrayImage::from_pixel(3, 3, image::Luma([shade]));
            img.save(dir.join(name)).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut source = ImageSequenceSource::new(CameraConfig::once(dir.to_string_lossy()));
        source.open().unwrap();

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.get_pixel(0, 0), Some([10, 10, 10]));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.sequence, 1);
        assert!(source.next_frame().unwrap().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
