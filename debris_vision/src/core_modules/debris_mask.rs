// THEORY:
// The `debris_mask` module answers "which pixels are junk?" at the analysis
// resolution. The best answer is a mask painted by a person: any pixel whose
// red channel is above the cutoff counts as debris. Without one, the engine
// assumes floors and walls are bright and calls every pixel whose channel mean
// is below the luminance cutoff "not floor", i.e. debris. Both rules produce the
// same kind of boolean grid, so everything downstream is blind to where the
// mask came from.
//
// A mask can also be split into coarse spatial regions (four quadrants plus an
// overlapping center window). Each region keeps its own sub-mask and coverage
// so volume can be estimated per area and summed back up.

use crate::core_modules::RESIZE_FILTER;
use crate::core_modules::grid::grid::Grid;
use crate::core_modules::pixel::pixel::Pixel;
use image::{GrayImage, Luma, RgbImage, imageops};
use serde::Serialize;

/// Where a debris mask came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskSource {
    /// Thresholded red channel of a caller-supplied mask image.
    UserMask,
    /// Luminance threshold on the photo itself.
    Luminance,
}

/// Boolean debris classification at the analysis resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct DebrisMask {
    grid: Grid<bool>,
    pub source: MaskSource,
}

impl DebrisMask {
    pub fn from_grid(grid: Grid<bool>, source: MaskSource) -> Self {
        Self { grid, source }
    }

    pub fn grid(&self) -> &Grid<bool> {
        &self.grid
    }

    pub fn coverage(&self) -> f64 {
        self.grid.coverage()
    }

    /// White for debris, black elsewhere.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.grid.width() as u32, self.grid.height() as u32, |x, y| {
            Luma([if self.grid.get(x as usize, y as usize) { 255 } else { 0 }])
        })
    }
}

/// Thresholds used to build a mask.
#[derive(Debug, Clone, Copy)]
pub struct SegmentationParams {
    pub resolution: u32,
    pub mask_red_threshold: u8,
    pub luminance_cutoff: f64,
}

/// Builds the debris mask for `photo`, preferring `user_mask` when present.
pub fn segment_debris(photo: &RgbImage, user_mask: Option<&RgbImage>, params: &SegmentationParams) -> DebrisMask {
    let side = params.resolution;
    let empty = |image: &RgbImage| image.width() == 0 || image.height() == 0;
    if empty(photo) || user_mask.is_some_and(empty) {
        let grid = Grid::filled(side as usize, side as usize, false);
        let source = if user_mask.is_some() { MaskSource::UserMask } else { MaskSource::Luminance };
        return DebrisMask::from_grid(grid, source);
    }
    match user_mask {
        Some(mask) => {
            let small = imageops::resize(mask, side, side, RESIZE_FILTER);
            let grid = Grid::from_fn(side as usize, side as usize, |x, y| {
                small.get_pixel(x as u32, y as u32)[0] > params.mask_red_threshold
            });
            DebrisMask::from_grid(grid, MaskSource::UserMask)
        }
        None => {
            let small = imageops::resize(photo, side, side, RESIZE_FILTER);
            let grid = Grid::from_fn(side as usize, side as usize, |x, y| {
                Pixel::from(small.get_pixel(x as u32, y as u32)).channel_mean() < params.luminance_cutoff
            });
            DebrisMask::from_grid(grid, MaskSource::Luminance)
        }
    }
}

/// A named spatial slice of a debris mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub region_id: String,
    pub label: String,
    /// Same shape as the parent mask, false outside the region window.
    pub mask: Grid<bool>,
    /// Debris fraction of the whole frame that falls inside this region.
    pub coverage: f64,
}

impl Region {
    fn new(label: &str, mask: Grid<bool>) -> Self {
        let coverage = mask.coverage();
        Self {
            region_id: format!("region_{label}"),
            label: label.to_string(),
            mask,
            coverage,
        }
    }
}

/// Splits `mask` into quadrants plus a center window, keeping at most
/// `max_regions` by descending coverage. Falls back to one full-frame region
/// when every kept region is empty; otherwise empty regions are dropped.
pub fn split_regions(mask: &DebrisMask, max_regions: usize) -> Vec<Region> {
    let grid = mask.grid();
    let (h, w) = (grid.height(), grid.width());

    let windows = [
        ("northwest", 0..h / 2, 0..w / 2),
        ("northeast", 0..h / 2, w / 2..w),
        ("southwest", h / 2..h, 0..w / 2),
        ("southeast", h / 2..h, w / 2..w),
        ("center", h / 4..h * 3 / 4, w / 4..w * 3 / 4),
    ];

    let mut regions: Vec<Region> = windows
        .into_iter()
        .map(|(label, rows, cols)| Region::new(label, grid.window(rows, cols)))
        .collect();

    // Stable sort keeps the window order among equal coverages.
    regions.sort_by(|a, b| b.coverage.total_cmp(&a.coverage));
    let keep = max_regions.min(regions.len()).max(1);
    regions.truncate(keep);

    if regions.iter().all(|r| r.coverage == 0.0) {
        return vec![Region::new("full", grid.clone())];
    }
    // Empty regions would each add the volume floor to the photo sum.
    regions.retain(|r| r.coverage > 0.0);
    regions
}

/// How much floor remains visible, as a reported assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FloorVisibility {
    Limited,
    Partial,
    Visible,
}

impl FloorVisibility {
    pub fn from_coverage(coverage: f64) -> Self {
        if coverage > 0.6 {
            FloorVisibility::Limited
        } else if coverage > 0.35 {
            FloorVisibility::Partial
        } else {
            FloorVisibility::Visible
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FloorVisibility::Limited => "limited",
            FloorVisibility::Partial => "partial",
            FloorVisibility::Visible => "visible",
        }
    }
}

pub fn estimate_floor_visibility(mask: &DebrisMask) -> FloorVisibility {
    FloorVisibility::from_coverage(mask.coverage())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const PARAMS: SegmentationParams = SegmentationParams {
        resolution: 16,
        mask_red_threshold: 100,
        luminance_cutoff: 220.0,
    };

    fn mask_from(grid: Grid<bool>) -> DebrisMask {
        DebrisMask::from_grid(grid, MaskSource::UserMask)
    }

    #[test]
    fn luminance_fallback_marks_dark_pixels() {
        // Left half dark debris, right half bright floor.
        let photo = RgbImage::from_fn(64, 64, |x, _| {
            if x < 32 { Rgb([40, 30, 20]) } else { Rgb([250, 250, 250]) }
        });
        let mask = segment_debris(&photo, None, &PARAMS);
        assert_eq!(mask.source, MaskSource::Luminance);
        assert!(mask.grid().get(0, 0));
        assert!(!mask.grid().get(15, 15));
        assert!((mask.coverage() - 0.5).abs() < 0.1);
    }

    #[test]
    fn user_mask_uses_red_channel() {
        let photo = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        // Green and blue are ignored: only the top rows are red.
        let user = RgbImage::from_fn(64, 64, |_, y| {
            if y < 16 { Rgb([255, 0, 0]) } else { Rgb([0, 255, 255]) }
        });
        let mask = segment_debris(&photo, Some(&user), &PARAMS);
        assert_eq!(mask.source, MaskSource::UserMask);
        assert!(mask.grid().get(8, 0));
        assert!(!mask.grid().get(8, 15));
        assert!(mask.coverage() < 0.5);
    }

    #[test]
    fn regions_sorted_by_coverage_and_capped() {
        let grid = Grid::from_fn(8, 8, |x, y| x < 4 && y >= 4);
        let regions = split_regions(&mask_from(grid), 2);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].label, "southwest");
        assert!((regions[0].coverage - 0.25).abs() < 1e-12);
        assert_eq!(regions[1].label, "center");
        assert!(regions[0].coverage >= regions[1].coverage);
    }

    #[test]
    fn center_region_overlaps_quadrants() {
        let grid = Grid::filled(8, 8, true);
        let regions = split_regions(&mask_from(grid), 5);
        assert_eq!(regions.len(), 5);
        let total: f64 = regions.iter().map(|r| r.coverage).sum();
        assert!((total - 1.25).abs() < 1e-12);
        assert!(regions.iter().all(|r| r.region_id.starts_with("region_")));
    }

    #[test]
    fn empty_mask_falls_back_to_full_frame() {
        let grid = Grid::filled(8, 8, false);
        let regions = split_regions(&mask_from(grid), 5);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].region_id, "region_full");
        assert_eq!(regions[0].coverage, 0.0);
    }

    #[test]
    fn empty_regions_are_dropped_after_fallback_check() {
        let mut grid = Grid::filled(128, 128, false);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            grid.set(x, y, true);
        }
        let regions = split_regions(&mask_from(grid), 5);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].label, "northwest");
        assert!(regions[0].coverage > 0.0);
    }

    #[test]
    fn zero_max_regions_still_keeps_one() {
        let grid = Grid::filled(4, 4, true);
        assert_eq!(split_regions(&mask_from(grid), 0).len(), 1);
    }

    #[test]
    fn floor_visibility_buckets() {
        assert_eq!(FloorVisibility::from_coverage(0.61), FloorVisibility::Limited);
        assert_eq!(FloorVisibility::from_coverage(0.6), FloorVisibility::Partial);
        assert_eq!(FloorVisibility::from_coverage(0.36), FloorVisibility::Partial);
        assert_eq!(FloorVisibility::from_coverage(0.35), FloorVisibility::Visible);
        assert_eq!(FloorVisibility::from_coverage(0.0).as_str(), "visible");
    }
}
