// THEORY:
// Debug artifacts (depth and mask renderings) are a side effect the engine only
// performs when asked. The engine never decides where they go: the caller
// injects a `DebugSink`, and the sink returns the reference name that ends up
// in the report. A `DirectorySink` writes PNGs into a directory the caller
// chose; a `MemorySink` keeps the encoded bytes for callers that store
// artifacts elsewhere (and for tests).

use crate::error::{PipelineError, Result};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder};
use std::fs;
use std::path::{Path, PathBuf};

/// Destination for debug images.
pub trait DebugSink: Send {
    /// Stores `image` under `name` and returns the name to report.
    fn write_image(&mut self, name: &str, image: &GrayImage) -> Result<String>;
}

fn encode_png(name: &str, image: &GrayImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::L8)
        .map_err(|source| PipelineError::DebugSink {
            name: name.to_string(),
            source,
        })?;
    Ok(bytes)
}

/// Writes artifacts as PNG files into one directory, created on first write.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DebugSink for DirectorySink {
    fn write_image(&mut self, name: &str, image: &GrayImage) -> Result<String> {
        fs::create_dir_all(&self.dir).map_err(|source| PipelineError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(name);
        let bytes = encode_png(name, image)?;
        fs::write(&path, bytes).map_err(|source| PipelineError::Io { path, source })?;
        Ok(name.to_string())
    }
}

/// Keeps encoded PNG artifacts in memory, in write order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    artifacts: Vec<(String, Vec<u8>)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn artifacts(&self) -> &[(String, Vec<u8>)] {
        &self.artifacts
    }

    pub fn names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl DebugSink for MemorySink {
    fn write_image(&mut self, name: &str, image: &GrayImage) -> Result<String> {
        let bytes = encode_png(name, image)?;
        self.artifacts.push((name.to_string(), bytes));
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn memory_sink_keeps_decodable_png() {
        let mut sink = MemorySink::new();
        let img = GrayImage::from_pixel(5, 4, Luma([200]));
        let name = sink.write_image("a_depth.png", &img).unwrap();
        assert_eq!(name, "a_depth.png");
        let (_, bytes) = &sink.artifacts()[0];
        let decoded = image::load_from_memory(bytes).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (5, 4));
        assert_eq!(decoded.get_pixel(4, 3)[0], 200);
    }

    #[test]
    fn directory_sink_creates_directory_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("debug");
        let mut sink = DirectorySink::new(&dir);
        let img = GrayImage::from_pixel(3, 3, Luma([0]));
        sink.write_image("b_mask.png", &img).unwrap();
        assert!(dir.join("b_mask.png").is_file());
    }
}
