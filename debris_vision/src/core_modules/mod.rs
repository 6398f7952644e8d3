// Stage modules of the estimation engine, leaf-first.

use image::imageops::FilterType;

pub mod pixel;
pub mod grid;
pub mod embedding;
pub mod scene_grouping;
pub mod scale_reference;
pub mod depth_map;
pub mod debris_mask;
pub mod volume;
pub mod fusion;

/// Filter used for every downscale (embeddings, depth maps, masks).
pub(crate) const RESIZE_FILTER: FilterType = FilterType::Triangle;
