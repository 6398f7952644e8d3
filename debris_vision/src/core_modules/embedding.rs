// THEORY:
// An `Embedding` is the cheapest possible visual fingerprint of a photo: shrink
// it to a tiny square, read every channel value, and scale the resulting vector
// to unit length. Two photos of the same pile, shot a few steps apart, share
// most of their coarse color layout and end up pointing in nearly the same
// direction. The scene grouper only ever compares these vectors by angle.

use crate::core_modules::RESIZE_FILTER;
use crate::core_modules::pixel::pixel::Pixel;
use image::RgbImage;
use image::imageops;

/// A unit-length color fingerprint of one photo.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    vector: Vec<f32>,
}

impl Embedding {
    /// Downscales `image` to `size` x `size`, flattens RGB values in [0, 1] and
    /// L2-normalizes. An all-black image keeps its zero vector.
    pub fn from_image(image: &RgbImage, size: u32) -> Self {
        if image.width() == 0 || image.height() == 0 {
            return Self::from_vector(vec![0.0; (size * size * 3) as usize]);
        }
        let small = imageops::resize(image, size, size, RESIZE_FILTER);
        let mut vector = Vec::with_capacity((size * size * 3) as usize);
        for rgb in small.pixels() {
            vector.extend_from_slice(&Pixel::from(rgb).normalized());
        }
        Self::from_vector(vector)
    }

    /// Normalizes an arbitrary vector; a zero norm is treated as 1.
    pub fn from_vector(mut vector: Vec<f32>) -> Self {
        let norm = l2_norm(&vector);
        let norm = if norm == 0.0 { 1.0 } else { norm };
        for v in vector.iter_mut() {
            *v = (*v as f64 / norm) as f32;
        }
        Self { vector }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.vector
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

pub(crate) fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

/// `dot(a, b) / (|a| * |b|)`, with a zero norm on either side treated as 1.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
    let norm_a = match l2_norm(a) {
        n if n == 0.0 => 1.0,
        n => n,
    };
    let norm_b = match l2_norm(b) {
        n if n == 0.0 => 1.0,
        n => n,
    };
    dot / (norm_a * norm_b)
}
