//! 图片序列帧源
//! Replays a directory of still images in name order, looping forever

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::RgbImage;
use tracing::{debug, info};

use super::FrameSource;
use crate::Error;

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
}

impl ImageSequenceSource {
    /// 扫描目录中的图片文件 (按文件名排序)
    pub fn open(dir: impl AsRef<Path>) -> crate::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && is_image(p))
            .collect();
        files.sort();
        info!("📂 图片序列: {} ({} 帧)", dir.display(), files.len());
        Ok(Self {
            dir,
            files,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn next_path(&mut self) -> Option<&Path> {
        if self.files.is_empty() {
            return None;
        }
        let idx = self.cursor % self.files.len();
        self.cursor = self.cursor.wrapping_add(1);
        Some(self.files[idx].as_path())
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageSequenceSource {
    fn probe(&mut self) -> anyhow::Result<(u32, u32)> {
        let first = self.files.first().ok_or_else(|| {
            Error::Capture(format!("no image files in {}", self.dir.display()))
        })?;
        let (w, h) = image::image_dimensions(first)
            .with_context(|| format!("failed to probe {}", first.display()))?;
        Ok((w, h))
    }

    fn read(&mut self) -> anyhow::Result<RgbImage> {
        let dir = self.dir.display().to_string();
        let path = self
            .next_path()
            .ok_or_else(|| Error::Capture(format!("no image files in {}", dir)))?
            .to_path_buf();
        let frame = image::open(&path)
            .map_err(Error::from)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        debug!("📷 读取帧 {}", path.display());
        Ok(frame)
    }
}
