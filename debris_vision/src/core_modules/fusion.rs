// THEORY:
// The `fusion` module folds many volume ranges into one, level by level:
// regions into a photo, photos into a scene, scenes into a job. Which fold
// applies is never guessed. The caller names a `FusionStrategy` for each level,
// because the right answer depends on what the inputs physically are:
//
// - Several photos of the *same* pile must not add up to more pile, so photos
//   in a scene are fused with `MaxDedupe`.
// - Distinct regions of a frame and distinct scenes of a job are different
//   material, so they are fused with `SumAggregate`.
//
// A scene seen from more than one angle carries extra, unreconciled
// uncertainty. `fuse_scene` widens the band for that case, and it is the only
// place the widening happens; job-level fusion never re-applies it.

use crate::core_modules::volume::VolumeRange;
use serde::Serialize;

pub const MULTI_VIEW_LOW_FACTOR: f64 = 0.75;
pub const MULTI_VIEW_HIGH_FACTOR: f64 = 1.25;
pub const MULTI_VIEW_CONFIDENCE_FACTOR: f64 = 0.85;

/// How a list of ranges collapses into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Field-wise maximum. For repeated views of one pile.
    MaxDedupe,
    /// Summed volumes, mean confidence. For physically separate areas.
    SumAggregate,
}

impl FusionStrategy {
    /// Fuses `ranges`; an empty list gives the zero range.
    pub fn fuse(&self, ranges: &[VolumeRange]) -> VolumeRange {
        if ranges.is_empty() {
            return VolumeRange::zero();
        }
        let fused = match self {
            FusionStrategy::MaxDedupe => ranges.iter().skip(1).fold(ranges[0], |acc, r| VolumeRange {
                low: acc.low.max(r.low),
                likely: acc.likely.max(r.likely),
                high: acc.high.max(r.high),
                confidence: acc.confidence.max(r.confidence),
            }),
            FusionStrategy::SumAggregate => {
                let sum = ranges.iter().fold(VolumeRange::zero(), |acc, r| VolumeRange {
                    low: acc.low + r.low,
                    likely: acc.likely + r.likely,
                    high: acc.high + r.high,
                    confidence: acc.confidence + r.confidence,
                });
                VolumeRange {
                    confidence: sum.confidence / ranges.len() as f64,
                    ..sum
                }
            }
        };
        fused.rounded_fields()
    }
}

/// Widens a range to reflect un-reconciled multi-view estimates.
pub fn widen_multi_view(range: &VolumeRange) -> VolumeRange {
    VolumeRange {
        low: range.low * MULTI_VIEW_LOW_FACTOR,
        likely: range.likely,
        high: range.high * MULTI_VIEW_HIGH_FACTOR,
        confidence: range.confidence * MULTI_VIEW_CONFIDENCE_FACTOR,
    }
    .rounded_fields()
}

/// Regions of one photo into the photo estimate.
pub fn fuse_regions(region_estimates: &[VolumeRange]) -> VolumeRange {
    FusionStrategy::SumAggregate.fuse(region_estimates)
}

/// Photos of one scene into the scene estimate, widened once when the scene
/// has more than one photo.
pub fn fuse_scene(photo_estimates: &[VolumeRange]) -> VolumeRange {
    let fused = FusionStrategy::MaxDedupe.fuse(photo_estimates);
    if photo_estimates.len() > 1 {
        widen_multi_view(&fused)
    } else {
        fused
    }
}

/// Scenes of one job into the job estimate.
pub fn fuse_job(scene_estimates: &[VolumeRange]) -> VolumeRange {
    FusionStrategy::SumAggregate.fuse(scene_estimates)
}
