// THEORY:
// The `photo` module is the engine's intake. A caller hands over photos as
// paths or as in-memory buffers, each optionally paired with a hand-drawn
// debris mask. `PhotoBatch` is the gate in front of the pipeline: a batch
// cannot exist without at least one photo, so the pipeline never sees an
// empty job. Decoding happens once per photo; every stage after that reads
// the same `DecodedPhoto`.

use crate::error::{PipelineError, Result};
use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};

/// Where an image's bytes come from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl ImageSource {
    fn decode(&self, photo: &str) -> Result<DynamicImage> {
        let decoded = match self {
            ImageSource::Path(path) => image::open(path),
            ImageSource::Bytes(bytes) => image::load_from_memory(bytes),
        };
        decoded.map_err(|source| PipelineError::ImageDecode {
            photo: photo.to_string(),
            source,
        })
    }
}

/// A single uploaded photo and its optional mask.
#[derive(Debug, Clone)]
pub struct Photo {
    /// Opaque identity chosen by the caller.
    pub id: String,
    /// Human-readable name used in reports and debug artifact names.
    pub name: String,
    pub source: ImageSource,
    pub mask: Option<ImageSource>,
}

impl Photo {
    pub fn from_path(id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            id: id.into(),
            name,
            source: ImageSource::Path(path.to_path_buf()),
            mask: None,
        }
    }

    pub fn from_bytes(id: impl Into<String>, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source: ImageSource::Bytes(bytes),
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: ImageSource) -> Self {
        self.mask = Some(mask);
        self
    }

    /// File stem of `name`, used to name debug artifacts.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Decodes the photo and, if present, its mask.
    pub fn decode(&self) -> Result<DecodedPhoto> {
        let image = self.source.decode(&self.name)?;
        let mask = match &self.mask {
            Some(mask) => Some(mask.decode(&self.name)?.to_rgb8()),
            None => None,
        };
        Ok(DecodedPhoto {
            width: image.width(),
            height: image.height(),
            rgb: image.to_rgb8(),
            mask,
        })
    }
}

/// Pixel data for a photo, decoded once and shared by every stage.
#[derive(Debug, Clone)]
pub struct DecodedPhoto {
    /// Intrinsic width in pixels.
    pub width: u32,
    /// Intrinsic height in pixels.
    pub height: u32,
    pub rgb: RgbImage,
    pub mask: Option<RgbImage>,
}

impl DecodedPhoto {
    pub fn from_rgb(rgb: RgbImage) -> Self {
        Self {
            width: rgb.width(),
            height: rgb.height(),
            rgb,
            mask: None,
        }
    }
}

/// A non-empty, ordered list of photos forming one job.
#[derive(Debug, Clone)]
pub struct PhotoBatch {
    photos: Vec<Photo>,
}

impl PhotoBatch {
    pub fn new(photos: Vec<Photo>) -> Result<Self> {
        if photos.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        Ok(Self { photos })
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([40, 80, 120]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(PhotoBatch::new(Vec::new()), Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn decode_reads_intrinsic_dimensions() {
        let photo = Photo::from_bytes("a", "a.png", png_bytes(12, 5));
        let decoded = photo.decode().unwrap();
        assert_eq!((decoded.width, decoded.height), (12, 5));
        assert!(decoded.mask.is_none());
    }

    #[test]
    fn corrupt_bytes_surface_as_decode_error() {
        let photo = Photo::from_bytes("a", "broken.jpg", vec![0, 1, 2, 3]);
        match photo.decode() {
            Err(PipelineError::ImageDecode { photo, .. }) => assert_eq!(photo, "broken.jpg"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn corrupt_mask_fails_the_photo() {
        let photo = Photo::from_bytes("a", "a.png", png_bytes(4, 4))
            .with_mask(ImageSource::Bytes(vec![9, 9, 9]));
        assert!(matches!(photo.decode(), Err(PipelineError::ImageDecode { .. })));
    }

    #[test]
    fn stem_strips_extension_and_directories() {
        let photo = Photo::from_path("p1", "/jobs/42/garage_left.jpeg");
        assert_eq!(photo.name, "garage_left.jpeg");
        assert_eq!(photo.stem(), "garage_left");
    }
}
