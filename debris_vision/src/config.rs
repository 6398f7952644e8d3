// THEORY:
// `EstimatorConfig` gathers every tunable of the estimation pipeline in one plain
// struct. The defaults are the canonical constant set: the engine is a chain of
// fixed heuristics, and two runs with the same config over the same photos must
// produce the same numbers. Callers override fields with struct update syntax;
// nothing here reads the environment or the filesystem.

use crate::core_modules::volume::Material;

/// Side of the square image used for scene embeddings.
pub const EMBEDDING_SIZE: u32 = 32;
/// Minimum cosine similarity for a photo to join an existing scene.
pub const SCENE_SIMILARITY_THRESHOLD: f64 = 0.9;
/// Side of the square grid shared by depth maps and debris masks.
pub const ANALYSIS_RESOLUTION: u32 = 128;
/// A mask pixel counts as debris when its red channel is above this value.
pub const MASK_RED_THRESHOLD: u8 = 100;
/// Without a mask, a pixel counts as debris when its RGB mean is below this value.
pub const LUMINANCE_CUTOFF: f64 = 220.0;
/// Upper bound on the number of regions a mask is split into.
pub const MAX_REGIONS: usize = 5;

/// Configuration for the `VolumePipeline`.
#[derive(Debug, Clone)]
pub struct EstimatorConfig {
    pub embedding_size: u32,
    pub similarity_threshold: f64,
    pub analysis_resolution: u32,
    pub mask_red_threshold: u8,
    pub luminance_cutoff: f64,
    /// Estimate each photo as the sum of its spatial regions instead of the whole mask.
    pub split_regions: bool,
    pub max_regions: usize,
    pub material: Material,
    /// Replaces the material's compaction factor when positive and finite.
    pub compaction_override: Option<f64>,
    /// Emit depth and mask artifacts through the job's debug sink.
    pub debug: bool,
    /// Report undecodable photos per photo instead of failing the whole job.
    pub allow_partial: bool,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            embedding_size: EMBEDDING_SIZE,
            similarity_threshold: SCENE_SIMILARITY_THRESHOLD,
            analysis_resolution: ANALYSIS_RESOLUTION,
            mask_red_threshold: MASK_RED_THRESHOLD,
            luminance_cutoff: LUMINANCE_CUTOFF,
            split_regions: false,
            max_regions: MAX_REGIONS,
            material: Material::default(),
            compaction_override: None,
            debug: false,
            allow_partial: true,
        }
    }
}

impl EstimatorConfig {
    /// The compaction factor that volume estimation should apply.
    pub fn compaction_factor(&self) -> f64 {
        match self.compaction_override {
            Some(factor) if factor.is_finite() && factor > 0.0 => factor,
            _ => self.material.compaction_factor(),
        }
    }
}
