// THEORY:
// The `depth_map` module fakes depth. It has no stereo, no model and no camera
// geometry, only two assumptions: brighter surfaces tend to face the camera, and
// in a photo of a pile on the floor the lower rows are closer and denser than
// the upper rows. The map is luminance in [0, 1] multiplied by a vertical ramp
// that runs from 1.0 on the top row to 0.2 on the bottom row. The values are
// relative, not metric; volume estimation scales them by the reference height.

use crate::core_modules::RESIZE_FILTER;
use crate::core_modules::grid::grid::Grid;
use crate::core_modules::pixel::pixel::to_luma;
use image::{GrayImage, Luma, RgbImage, imageops};

pub const GRADIENT_TOP: f64 = 1.0;
pub const GRADIENT_BOTTOM: f64 = 0.2;

/// Relative depth in [0, 1] at the analysis resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    grid: Grid<f32>,
}

impl DepthMap {
    pub fn grid(&self) -> &Grid<f32> {
        &self.grid
    }

    /// An 8-bit rendering for debug output.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.grid.width() as u32, self.grid.height() as u32, |x, y| {
            let v = self.grid.get(x as usize, y as usize) * 255.0;
            Luma([v.clamp(0.0, 255.0) as u8])
        })
    }
}

/// Row weight of the vertical prior: linear from `GRADIENT_TOP` to `GRADIENT_BOTTOM`.
pub fn row_gradient(row: usize, rows: usize) -> f64 {
    if rows <= 1 {
        return GRADIENT_TOP;
    }
    GRADIENT_TOP + (GRADIENT_BOTTOM - GRADIENT_TOP) * row as f64 / (rows - 1) as f64
}

/// Builds the depth map of `image` at `resolution` x `resolution`.
pub fn estimate_depth(image: &RgbImage, resolution: u32) -> DepthMap {
    if image.width() == 0 || image.height() == 0 {
        let side = resolution as usize;
        return DepthMap { grid: Grid::filled(side, side, 0.0) };
    }
    let gray = imageops::resize(&to_luma(image), resolution, resolution, RESIZE_FILTER);
    let rows = gray.height() as usize;
    let grid = Grid::from_fn(gray.width() as usize, rows, |x, y| {
        let luminance = gray.get_pixel(x as u32, y as u32)[0] as f64 / 255.0;
        (luminance * row_gradient(y, rows)) as f32
    });
    DepthMap { grid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn gradient_runs_from_one_to_point_two() {
        assert!((row_gradient(0, 128) - 1.0).abs() < 1e-12);
        assert!((row_gradient(127, 128) - 0.2).abs() < 1e-12);
        assert!(row_gradient(64, 128) < row_gradient(63, 128));
    }

    #[test]
    fn white_image_depth_equals_gradient() {
        let img = RgbImage::from_pixel(300, 200, Rgb([255, 255, 255]));
        let depth = estimate_depth(&img, 128);
        let g = depth.grid();
        assert_eq!((g.width(), g.height()), (128, 128));
        assert!((g.get(5, 0) - 1.0).abs() < 0.01);
        assert!((g.get(100, 127) - 0.2).abs() < 0.01);
    }

    #[test]
    fn values_stay_in_unit_interval() {
        let img = RgbImage::from_fn(90, 60, |x, y| Rgb([(x * 3) as u8, (y * 4) as u8, 17]));
        let depth = estimate_depth(&img, 32);
        assert!(depth.grid().cells().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn black_image_has_zero_depth() {
        let img = RgbImage::new(16, 16);
        let depth = estimate_depth(&img, 16);
        assert_eq!(depth.grid().mean(), 0.0);
    }

    #[test]
    fn debug_image_matches_resolution() {
        let img = RgbImage::from_pixel(10, 10, Rgb([128, 128, 128]));
        let rendered = estimate_depth(&img, 24).to_image();
        assert_eq!(rendered.dimensions(), (24, 24));
        assert!(rendered.get_pixel(0, 0)[0] > rendered.get_pixel(0, 23)[0]);
    }
}
