use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Reads a single image, or every image in a directory, as RGB frames.
///
/// Directory entries are taken in file-name order and filtered by
/// [`IMAGE_EXTENSIONS`]. A single image reports `fps = 0`; a directory
/// reports the frame rate given at construction. Images are decoded lazily,
/// one per frame.
pub struct ImageSequenceReader {
    fps: f64,
    paths: Vec<PathBuf>,
    opened: bool,
}

impl ImageSequenceReader {
    pub fn new(fps: f64) -> Self {
        Self {
            fps,
            paths: Vec::new(),
            opened: false,
        }
    }
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image_path(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn load_frame(path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
    let image = image::open(path)
        .map_err(|e| format!("Failed to read {}: {e}", path.display()))?
        .to_rgb8();
    Ok(Frame::from_rgb_image(image, index))
}

impl VideoReader for ImageSequenceReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        let (paths, fps) = if path.is_dir() {
            (list_images(path)?, self.fps)
        } else {
            (vec![path.to_path_buf()], 0.0)
        };
        let first = paths
            .first()
            .ok_or_else(|| format!("No images found in {}", path.display()))?;
        let (width, height) = image::image_dimensions(first)
            .map_err(|e| format!("Failed to read {}: {e}", first.display()))?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames: paths.len(),
            source_path: Some(path.to_path_buf()),
        };
        self.paths = paths;
        self.opened = true;
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        if !self.opened {
            return Box::new(std::iter::once(Err(
                "ImageSequenceReader: not opened".into()
            )));
        }
        let paths = std::mem::take(&mut self.paths);
        Box::new(
            paths
                .into_iter()
                .enumerate()
                .map(|(index, path)| load_frame(&path, index)),
        )
    }

    fn close(&mut self) {
        self.paths.clear();
        self.opened = false;
    }
}
