// THEORY:
// The `pipeline` module is the top-level API of the estimation engine. It wires
// the stage modules into one sequential pass over a job:
//
//   decode -> group into scenes -> per photo {scale, depth, mask, volume}
//          -> fuse photos into scenes -> fuse scenes into the job
//
// A `VolumePipeline` holds nothing but its configuration. Every piece of state
// a job needs (decoded pixels, the scene accumulator, per-photo estimates) is
// created inside `estimate` and dropped when it returns, so one pipeline can
// serve any number of jobs, from any number of threads.
//
// Photos are processed strictly in input order. That is what makes scene ids
// and aggregation order reproducible. A photo that fails to decode is reported
// on its own and left out; the rest of the job still gets an estimate.

use crate::config::EstimatorConfig;
use crate::core_modules::debris_mask::{
    DebrisMask, FloorVisibility, MaskSource, SegmentationParams, estimate_floor_visibility, segment_debris,
    split_regions,
};
use crate::core_modules::depth_map::{DepthMap, estimate_depth};
use crate::core_modules::embedding::Embedding;
use crate::core_modules::fusion::{fuse_job, fuse_regions, fuse_scene};
use crate::core_modules::scale_reference::{ScaleReference, ScaleReport, detect_scale};
use crate::core_modules::scene_grouping::SceneAccumulator;
use crate::core_modules::volume::{VolumeBreakdown, VolumeInputs, estimate_volume, round2, volume_breakdown};
use crate::debug_sink::DebugSink;
use crate::error::Result;
use crate::photo::{DecodedPhoto, Photo, PhotoBatch};
use serde::Serialize;
use tracing::{debug, info, warn};

// Re-export the data structures that appear in reports.
pub use crate::core_modules::fusion::FusionStrategy;
pub use crate::core_modules::volume::{Material, VolumeRange};

/// One `{type, value}` pair describing an assumption behind an estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assumption {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Assumption {
    fn new(kind: &str, value: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            value: value.into(),
        }
    }
}

/// Volume of one spatial region of one photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionReport {
    pub photo_name: String,
    pub region_id: String,
    pub label: String,
    pub coverage: f64,
    pub estimate: VolumeRange,
}

/// Everything the engine derived from a single photo.
#[derive(Debug, Clone)]
pub struct PhotoAnalysis {
    pub scale: ScaleReport,
    pub depth: DepthMap,
    pub mask: DebrisMask,
    pub floor_visibility: FloorVisibility,
    /// Intermediate quantities over the whole mask, regions or not.
    pub breakdown: VolumeBreakdown,
    /// Whole-photo estimate; the sum of `regions` when regions are enabled.
    pub estimate: VolumeRange,
    pub regions: Option<Vec<RegionReport>>,
}

/// The fused result for one scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneReport {
    pub scene_id: String,
    pub photo_names: Vec<String>,
    pub scale_reference: ScaleReport,
    pub estimate: VolumeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<RegionReport>>,
    pub assumptions: Vec<Assumption>,
    pub notes: Vec<String>,
    pub debug_artifacts: Vec<String>,
}

/// A photo that was left out of the estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoError {
    pub photo: String,
    pub message: String,
}

/// The primary output of the pipeline for one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobEstimate {
    pub job: VolumeRange,
    pub scenes: Vec<SceneReport>,
    pub errors: Vec<PhotoError>,
}

/// The main, top-level struct for the estimation engine.
#[derive(Debug, Clone, Default)]
pub struct VolumePipeline {
    config: EstimatorConfig,
}

impl VolumePipeline {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    fn segmentation_params(&self) -> SegmentationParams {
        SegmentationParams {
            resolution: self.config.analysis_resolution,
            mask_red_threshold: self.config.mask_red_threshold,
            luminance_cutoff: self.config.luminance_cutoff,
        }
    }

    /// Runs scale, depth, segmentation and volume estimation for one decoded photo.
    pub fn analyze_photo(&self, photo: &Photo, decoded: &DecodedPhoto) -> PhotoAnalysis {
        let scale = detect_scale(decoded.width, decoded.height);
        let depth = estimate_depth(&decoded.rgb, self.config.analysis_resolution);
        let mask = segment_debris(&decoded.rgb, decoded.mask.as_ref(), &self.segmentation_params());
        let compaction_factor = self.config.compaction_factor();

        let inputs = VolumeInputs {
            frame_width: decoded.width,
            frame_height: decoded.height,
            depth: depth.grid(),
            mask: mask.grid(),
            scale: &scale.chosen,
            compaction_factor,
        };
        let breakdown = volume_breakdown(&inputs);

        let (estimate, regions) = if self.config.split_regions {
            let regions: Vec<RegionReport> = split_regions(&mask, self.config.max_regions)
                .into_iter()
                .map(|region| RegionReport {
                    photo_name: photo.name.clone(),
                    estimate: estimate_volume(&VolumeInputs {
                        mask: &region.mask,
                        ..inputs
                    }),
                    region_id: region.region_id,
                    label: region.label,
                    coverage: round2(region.coverage),
                })
                .collect();
            let estimates: Vec<VolumeRange> = regions.iter().map(|r| r.estimate).collect();
            (fuse_regions(&estimates), Some(regions))
        } else {
            (estimate_volume(&inputs), None)
        };

        debug!(
            photo = %photo.name,
            scale = %scale.chosen.label,
            coverage = mask.coverage(),
            likely = estimate.likely,
            "photo analyzed"
        );

        PhotoAnalysis {
            floor_visibility: estimate_floor_visibility(&mask),
            scale,
            depth,
            mask,
            breakdown,
            estimate,
            regions,
        }
    }

    /// Estimates the volume of every scene in `batch` and of the job as a whole.
    ///
    /// Debug artifacts are written to `debug_sink` only when `config.debug` is set.
    pub fn estimate(&self, batch: &PhotoBatch, mut debug_sink: Option<&mut dyn DebugSink>) -> Result<JobEstimate> {
        info!(photos = batch.len(), "estimating job");

        // Stage 1: Decode, isolating failures per photo.
        let mut errors = Vec::new();
        let mut decoded: Vec<(&Photo, DecodedPhoto)> = Vec::with_capacity(batch.len());
        for photo in batch.photos() {
            match photo.decode() {
                Ok(d) => decoded.push((photo, d)),
                Err(e) if self.config.allow_partial => {
                    warn!(photo = %photo.name, error = %e, "skipping undecodable photo");
                    errors.push(PhotoError {
                        photo: photo.name.clone(),
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        // Stage 2: Scene grouping, in input order, with a job-local accumulator.
        let mut accumulator = SceneAccumulator::new(self.config.similarity_threshold);
        for (index, (_, d)) in decoded.iter().enumerate() {
            let embedding = Embedding::from_image(&d.rgb, self.config.embedding_size);
            accumulator.assign(index, &embedding);
        }
        let groups = accumulator.into_groups();

        // Stage 3 & 4: Per-photo analysis, then scene-level fusion.
        let mut scenes = Vec::with_capacity(groups.len());
        for group in groups {
            let members: Vec<&(&Photo, DecodedPhoto)> = group.members.iter().map(|&i| &decoded[i]).collect();
            let analyses: Vec<PhotoAnalysis> = members
                .iter()
                .map(|(photo, d)| self.analyze_photo(photo, d))
                .collect();

            let mut notes = Vec::new();
            let mut debug_artifacts = Vec::new();
            if self.config.debug {
                if let Some(sink) = debug_sink.as_deref_mut() {
                    for ((photo, _), analysis) in members.iter().zip(&analyses) {
                        write_artifacts(sink, photo, analysis, &mut debug_artifacts, &mut notes);
                    }
                }
            }

            let scene = self.build_scene_report(group.scene_id, &members, &analyses, notes, debug_artifacts);
            info!(
                scene = %scene.scene_id,
                photos = scene.photo_names.len(),
                likely = scene.estimate.likely,
                "scene estimated"
            );
            scenes.push(scene);
        }

        // Stage 5: Job-level aggregation across physically distinct scenes.
        let scene_estimates: Vec<VolumeRange> = scenes.iter().map(|s| s.estimate).collect();
        let job = fuse_job(&scene_estimates);
        info!(scenes = scenes.len(), failed = errors.len(), likely = job.likely, "job estimated");

        Ok(JobEstimate { job, scenes, errors })
    }

    fn build_scene_report(
        &self,
        scene_id: String,
        members: &[&(&Photo, DecodedPhoto)],
        analyses: &[PhotoAnalysis],
        mut notes: Vec<String>,
        debug_artifacts: Vec<String>,
    ) -> SceneReport {
        let photo_estimates: Vec<VolumeRange> = analyses.iter().map(|a| a.estimate).collect();
        let estimate = fuse_scene(&photo_estimates);

        let scale_reference = scene_scale(analyses);

        let mut scale_notes: Vec<String> = Vec::new();
        for analysis in analyses {
            if !scale_notes.contains(&analysis.scale.chosen.note) {
                scale_notes.push(analysis.scale.chosen.note.clone());
            }
        }
        scale_notes.append(&mut notes);

        let regions = if self.config.split_regions {
            Some(
                analyses
                    .iter()
                    .filter_map(|a| a.regions.clone())
                    .flatten()
                    .collect(),
            )
        } else {
            None
        };

        SceneReport {
            scene_id,
            photo_names: members.iter().map(|(photo, _)| photo.name.clone()).collect(),
            scale_reference,
            estimate,
            regions,
            assumptions: self.scene_assumptions(analyses),
            notes: scale_notes,
            debug_artifacts,
        }
    }

    fn scene_assumptions(&self, analyses: &[PhotoAnalysis]) -> Vec<Assumption> {
        let mean_coverage = if analyses.is_empty() {
            0.0
        } else {
            analyses.iter().map(|a| a.mask.coverage()).sum::<f64>() / analyses.len() as f64
        };

        let mask_source = if analyses.iter().all(|a| a.mask.source == MaskSource::UserMask) {
            "user_mask"
        } else if analyses.iter().all(|a| a.mask.source == MaskSource::Luminance) {
            "luminance"
        } else {
            "mixed"
        };

        let mut assumptions = vec![
            Assumption::new("material", self.config.material.label()),
            Assumption::new("compaction_factor", format!("{:.2}", self.config.compaction_factor())),
            Assumption::new("floor_visibility", FloorVisibility::from_coverage(mean_coverage).as_str()),
            Assumption::new("mask_source", mask_source),
        ];

        // Whole-mask footprint and height of the largest view.
        let widest = analyses.iter().map(|a| a.breakdown).reduce(|best, b| {
            if b.volume_cuft > best.volume_cuft { b } else { best }
        });
        if let Some(b) = widest {
            assumptions.push(Assumption::new("area_sqft", format!("{:.2}", b.area_sqft)));
            assumptions.push(Assumption::new("pile_height_ft", format!("{:.2}", b.pile_height_ft)));
        }
        if analyses.len() > 1 {
            assumptions.push(Assumption::new("multi_view", "max-dedupe with widened range"));
        }
        assumptions
    }
}

/// The scene's reported reference: the most confident photo's choice, first on ties.
fn scene_scale(analyses: &[PhotoAnalysis]) -> ScaleReport {
    let mut best: Option<&ScaleReport> = None;
    for analysis in analyses {
        let better = match best {
            Some(current) => analysis.scale.chosen.confidence > current.chosen.confidence,
            None => true,
        };
        if better {
            best = Some(&analysis.scale);
        }
    }
    match best {
        Some(report) => report.clone(),
        None => ScaleReport {
            chosen: ScaleReference {
                label: "unknown".to_string(),
                height_in: 0.0,
                confidence: 0.0,
                note: "No photos in scene".to_string(),
            },
            candidates: Vec::new(),
        },
    }
}

fn write_artifacts(
    sink: &mut dyn DebugSink,
    photo: &Photo,
    analysis: &PhotoAnalysis,
    artifacts: &mut Vec<String>,
    notes: &mut Vec<String>,
) {
    let stem = photo.stem();
    let outputs = [
        (format!("{stem}_depth.png"), analysis.depth.to_image()),
        (format!("{stem}_mask.png"), analysis.mask.to_image()),
    ];
    for (name, image) in outputs {
        match sink.write_image(&name, &image) {
            Ok(reference) => artifacts.push(reference),
            Err(e) => {
                warn!(artifact = %name, error = %e, "debug artifact not written");
                notes.push(format!("Debug artifact {name} could not be written"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_sink::MemorySink;
    use crate::error::PipelineError;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(image: &RgbImage) -> Vec<u8> {
        let mut bytes = Cursor::new(Vec::new());
        image.write_to(&mut bytes, ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    /// Bright floor with a dark pile in the lower half.
    fn pile(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |_, y| {
            if y > height / 2 { Rgb([60, 50, 40]) } else { Rgb([240, 240, 235]) }
        })
    }

    /// Saturated blue frame, far from `pile` in embedding space.
    fn blue(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([10, 20, 200]))
    }

    fn photo(name: &str, image: &RgbImage) -> Photo {
        Photo::from_bytes(name, name, png(image))
    }

    #[test]
    fn single_photo_job_matches_scene() {
        let batch = PhotoBatch::new(vec![photo("a.png", &pile(400, 300))]).unwrap();
        let result = VolumePipeline::default().estimate(&batch, None).unwrap();
        assert_eq!(result.scenes.len(), 1);
        assert_eq!(result.scenes[0].scene_id, "scene-1");
        assert_eq!(result.scenes[0].photo_names, vec!["a.png"]);
        assert_eq!(result.job, result.scenes[0].estimate);
        assert!(result.job.is_ordered());
        assert!(result.job.likely > 0.01);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn duplicate_views_are_deduped_and_widened_once() {
        let img = pile(400, 300);
        let single = VolumePipeline::default()
            .estimate(&PhotoBatch::new(vec![photo("a.png", &img)]).unwrap(), None)
            .unwrap();
        let double = VolumePipeline::default()
            .estimate(&PhotoBatch::new(vec![photo("a.png", &img), photo("b.png", &img)]).unwrap(), None)
            .unwrap();

        assert_eq!(double.scenes.len(), 1);
        let one = single.job;
        let two = double.job;
        assert_eq!(two.likely, one.likely);
        assert_eq!(two.low, round2(one.low * 0.75));
        assert_eq!(two.high, round2(one.high * 1.25));
        assert_eq!(two.confidence, round2(one.confidence * 0.85));
    }

    #[test]
    fn distinct_scenes_are_summed() {
        let batch = PhotoBatch::new(vec![photo("pile.png", &pile(400, 300)), photo("blue.png", &blue(400, 300))]).unwrap();
        let result = VolumePipeline::default().estimate(&batch, None).unwrap();
        assert_eq!(result.scenes.len(), 2);
        assert_eq!(result.scenes[1].scene_id, "scene-2");
        let summed = result.scenes[0].estimate.likely + result.scenes[1].estimate.likely;
        assert!((result.job.likely - summed).abs() < 0.011);
    }

    #[test]
    fn undecodable_photo_is_reported_not_fatal() {
        let batch = PhotoBatch::new(vec![
            Photo::from_bytes("bad", "bad.jpg", vec![1, 2, 3]),
            photo("good.png", &pile(200, 200)),
        ])
        .unwrap();
        let result = VolumePipeline::default().estimate(&batch, None).unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].photo, "bad.jpg");
        assert_eq!(result.scenes.len(), 1);
        assert_eq!(result.scenes[0].photo_names, vec!["good.png"]);
    }

    #[test]
    fn strict_mode_propagates_decode_error() {
        let batch = PhotoBatch::new(vec![Photo::from_bytes("bad", "bad.jpg", vec![1, 2, 3])]).unwrap();
        let pipeline = VolumePipeline::new(EstimatorConfig {
            allow_partial: false,
            ..Default::default()
        });
        assert!(matches!(pipeline.estimate(&batch, None), Err(PipelineError::ImageDecode { .. })));
    }

    #[test]
    fn all_photos_failing_gives_zero_job() {
        let batch = PhotoBatch::new(vec![Photo::from_bytes("bad", "bad.jpg", vec![0])]).unwrap();
        let result = VolumePipeline::default().estimate(&batch, None).unwrap();
        assert!(result.scenes.is_empty());
        assert_eq!(result.job, VolumeRange::zero());
    }

    #[test]
    fn debug_artifacts_written_only_when_enabled() {
        let batch = PhotoBatch::new(vec![photo("garage.png", &pile(120, 90))]).unwrap();

        let mut sink = MemorySink::new();
        let quiet = VolumePipeline::default()
            .estimate(&batch, Some(&mut sink as &mut dyn DebugSink))
            .unwrap();
        assert!(sink.artifacts().is_empty());
        assert!(quiet.scenes[0].debug_artifacts.is_empty());

        let pipeline = VolumePipeline::new(EstimatorConfig {
            debug: true,
            ..Default::default()
        });
        let loud = pipeline.estimate(&batch, Some(&mut sink as &mut dyn DebugSink)).unwrap();
        assert_eq!(sink.names(), vec!["garage_depth.png", "garage_mask.png"]);
        assert_eq!(loud.scenes[0].debug_artifacts, vec!["garage_depth.png", "garage_mask.png"]);
    }

    #[test]
    fn region_split_reports_regions_and_sums_them() {
        let batch = PhotoBatch::new(vec![photo("a.png", &pile(300, 300))]).unwrap();
        let pipeline = VolumePipeline::new(EstimatorConfig {
            split_regions: true,
            ..Default::default()
        });
        let result = pipeline.estimate(&batch, None).unwrap();
        let regions = result.scenes[0].regions.as_ref().unwrap();
        assert!(!regions.is_empty() && regions.len() <= 5);
        assert!(regions.iter().all(|r| r.photo_name == "a.png"));
        let summed: f64 = regions.iter().map(|r| r.estimate.likely).sum();
        assert!((result.scenes[0].estimate.likely - round2(summed)).abs() < 1e-9);
    }

    #[test]
    fn user_mask_overrides_luminance() {
        let img = pile(200, 200);
        let empty_mask = png(&RgbImage::from_pixel(200, 200, Rgb([0, 0, 0])));
        let with_mask = Photo::from_bytes("a", "a.png", png(&img)).with_mask(crate::photo::ImageSource::Bytes(empty_mask));
        let batch = PhotoBatch::new(vec![with_mask]).unwrap();
        let result = VolumePipeline::default().estimate(&batch, None).unwrap();
        let scene = &result.scenes[0];
        assert_eq!(scene.estimate.likely, 0.01);
        assert_eq!(scene.estimate.low, 0.01);
        assert!(scene.assumptions.contains(&Assumption::new("mask_source", "user_mask")));
        assert!(scene.assumptions.contains(&Assumption::new("floor_visibility", "visible")));
    }

    #[test]
    fn speck_in_region_mode_is_not_inflated_by_empty_regions() {
        let img = pile(256, 256);
        let speck = RgbImage::from_fn(256, 256, |x, y| if x < 4 && y < 4 { Rgb([255, 0, 0]) } else { Rgb([0, 0, 0]) });
        let photo = Photo::from_bytes("s", "s.png", png(&img)).with_mask(crate::photo::ImageSource::Bytes(png(&speck)));
        let decoded = photo.decode().unwrap();

        let whole = VolumePipeline::default().analyze_photo(&photo, &decoded);
        let split = VolumePipeline::new(EstimatorConfig {
            split_regions: true,
            ..Default::default()
        })
        .analyze_photo(&photo, &decoded);

        let regions = split.regions.as_ref().unwrap();
        assert!(regions.iter().all(|r| r.coverage > 0.0 || regions.len() == 1));
        assert_eq!(whole.estimate.likely, 0.01);
        assert_eq!(split.estimate, whole.estimate);
    }

    #[test]
    fn breakdown_is_reported_as_assumptions() {
        let batch = PhotoBatch::new(vec![photo("a.png", &pile(400, 300))]).unwrap();
        let result = VolumePipeline::default().estimate(&batch, None).unwrap();
        let value = |kind: &str| -> f64 {
            result.scenes[0]
                .assumptions
                .iter()
                .find(|a| a.kind == kind)
                .unwrap()
                .value
                .parse()
                .unwrap()
        };
        assert!(value("area_sqft") > 0.0);
        assert!(value("pile_height_ft") >= 0.1);
    }

    #[test]
    fn zero_sized_frame_degrades_to_floors() {
        let photo = Photo::from_bytes("z", "z.png", Vec::new());
        let decoded = DecodedPhoto::from_rgb(RgbImage::new(0, 0));
        let analysis = VolumePipeline::default().analyze_photo(&photo, &decoded);
        assert_eq!(analysis.mask.coverage(), 0.0);
        assert_eq!(analysis.estimate.low, 0.01);
        assert_eq!(analysis.estimate.likely, 0.01);
        assert!(analysis.estimate.is_ordered());
    }

    #[test]
    fn report_serializes_with_type_keys() {
        let batch = PhotoBatch::new(vec![photo("a.png", &pile(100, 220))]).unwrap();
        let result = VolumePipeline::default().estimate(&batch, None).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scenes"][0]["assumptions"][0]["type"], "material");
        assert_eq!(json["scenes"][0]["scale_reference"]["chosen"]["label"], "interior door");
        assert!(json["scenes"][0].get("regions").is_none());
        assert_eq!(json["errors"], serde_json::json!([]));
    }
}
