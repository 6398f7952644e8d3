// THEORY:
// The `volume` module turns a mask, a depth map and a scale reference into a
// cubic-yard range. The arithmetic is deliberately simple and fully
// reproducible:
//
// 1.  **Scale**: the reference object is assumed to span a fixed fraction of
//     the frame height, which gives inches per pixel.
// 2.  **Footprint**: mask coverage times the frame area, converted to square feet.
// 3.  **Height**: mean relative depth under the mask, scaled by the reference
//     height, with a floor so a flat or empty pile never collapses to zero.
// 4.  **Packing**: the material's compaction factor (or an explicit override)
//     accounts for air between loose items.
// 5.  **Band**: a symmetric uncertainty band whose width depends only on how
//     much the scale reference is trusted.
//
// Degenerate input (zero-size frames, empty masks, mismatched grids) never
// raises. It lands on the documented floors instead, so a job always gets a
// number back.

use crate::core_modules::grid::grid::Grid;
use crate::core_modules::scale_reference::ScaleReference;
use serde::{Deserialize, Serialize};

/// Fraction of the frame height a reference object is assumed to span when
/// its label has no entry in `REFERENCE_FRACTIONS`.
pub const DEFAULT_REFERENCE_FRACTION: f64 = 0.3;

pub const REFERENCE_FRACTIONS: [(&str, f64); 5] = [
    ("interior door", 0.65),
    ("kitchen counter", 0.40),
    ("sofa", 0.35),
    ("32 gallon trash can", 0.25),
    ("moving box", 0.20),
];

/// Mean depth assumed when the mask selects nothing.
pub const EMPTY_MASK_DEPTH: f64 = 0.1;
/// Lowest pile height, in feet.
pub const MIN_PILE_HEIGHT_FT: f64 = 0.1;
/// Lowest `low` and `likely` values, in cubic yards.
pub const MIN_VOLUME_CY: f64 = 0.01;
/// Scale confidence below which the wide uncertainty band is used.
pub const LOW_CONFIDENCE_CUTOFF: f64 = 0.3;
pub const WIDE_UNCERTAINTY: f64 = 0.35;
pub const NARROW_UNCERTAINTY: f64 = 0.2;

const CUBIC_FEET_PER_CUBIC_YARD: f64 = 27.0;
const SQUARE_INCHES_PER_SQUARE_FOOT: f64 = 144.0;

pub fn reference_fraction(label: &str) -> f64 {
    REFERENCE_FRACTIONS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|&(_, fraction)| fraction)
        .unwrap_or(DEFAULT_REFERENCE_FRACTION)
}

/// What the pile is made of, which decides how tightly it packs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    #[default]
    LooseHouseholdMixed,
    BaggedTrash,
    ConstructionDebris,
    YardWaste,
}

impl Material {
    pub const ALL: [Material; 4] = [
        Material::LooseHouseholdMixed,
        Material::BaggedTrash,
        Material::ConstructionDebris,
        Material::YardWaste,
    ];

    pub fn compaction_factor(&self) -> f64 {
        match self {
            Material::LooseHouseholdMixed => 0.85,
            Material::BaggedTrash => 0.7,
            Material::ConstructionDebris => 0.95,
            Material::YardWaste => 0.65,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Material::LooseHouseholdMixed => "loose household mixed",
            Material::BaggedTrash => "bagged trash",
            Material::ConstructionDebris => "construction debris",
            Material::YardWaste => "yard waste",
        }
    }

    /// Accepts the human label ("bagged trash") or its snake_case form.
    pub fn from_label(label: &str) -> Option<Material> {
        let normalized = label.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        Material::ALL.into_iter().find(|m| m.label() == normalized)
    }
}

/// A cubic-yard estimate with its band and confidence.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeRange {
    pub low: f64,
    pub likely: f64,
    pub high: f64,
    pub confidence: f64,
}

impl VolumeRange {
    pub fn new(low: f64, likely: f64, high: f64, confidence: f64) -> Self {
        Self {
            low,
            likely,
            high,
            confidence,
        }
    }

    /// Zero volume with zero confidence.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Rounds every field to two decimals and restores `low <= likely <= high`
    /// and `0 <= confidence <= 1` afterwards.
    pub fn rounded(&self) -> Self {
        let low = round2(sanitize(self.low));
        let likely = round2(sanitize(self.likely)).max(low);
        let high = round2(sanitize(self.high)).max(likely);
        let confidence = round2(sanitize(self.confidence).min(1.0));
        Self {
            low,
            likely,
            high,
            confidence,
        }
    }

    /// Rounds every field to two decimals without reordering. Ordered inputs
    /// stay ordered under max, sum and scaling, so fusion only needs this.
    pub fn rounded_fields(&self) -> Self {
        Self {
            low: round2(sanitize(self.low)),
            likely: round2(sanitize(self.likely)),
            high: round2(sanitize(self.high)),
            confidence: round2(sanitize(self.confidence).min(1.0)),
        }
    }

    pub fn is_ordered(&self) -> bool {
        0.0 <= self.low && self.low <= self.likely && self.likely <= self.high && (0.0..=1.0).contains(&self.confidence)
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

/// Everything volume estimation needs to know about one photo or region.
#[derive(Debug, Clone, Copy)]
pub struct VolumeInputs<'a> {
    pub frame_width: u32,
    pub frame_height: u32,
    pub depth: &'a Grid<f32>,
    pub mask: &'a Grid<bool>,
    pub scale: &'a ScaleReference,
    pub compaction_factor: f64,
}

/// Intermediate quantities, kept for assumptions and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeBreakdown {
    pub inches_per_pixel: f64,
    pub area_sqft: f64,
    pub pile_height_ft: f64,
    pub volume_cuft: f64,
    pub volume_cy: f64,
    pub uncertainty: f64,
}

pub fn volume_breakdown(inputs: &VolumeInputs) -> VolumeBreakdown {
    let width = inputs.frame_width as f64;
    let height = inputs.frame_height as f64;
    let reference_height = inputs.scale.height_in;

    let reference_px = (height * reference_fraction(&inputs.scale.label)).max(1.0);
    let inches_per_pixel = reference_height / reference_px;

    let coverage = inputs.mask.coverage();
    let area_sqft = coverage * width * height * inches_per_pixel * inches_per_pixel / SQUARE_INCHES_PER_SQUARE_FOOT;

    let mean_depth = inputs.depth.masked_mean(inputs.mask).unwrap_or(EMPTY_MASK_DEPTH);
    let pile_height_ft = (mean_depth * reference_height / 12.0).max(MIN_PILE_HEIGHT_FT);

    let volume_cuft = area_sqft * pile_height_ft * inputs.compaction_factor;
    let volume_cy = volume_cuft / CUBIC_FEET_PER_CUBIC_YARD;

    let uncertainty = if inputs.scale.confidence < LOW_CONFIDENCE_CUTOFF {
        WIDE_UNCERTAINTY
    } else {
        NARROW_UNCERTAINTY
    };

    VolumeBreakdown {
        inches_per_pixel,
        area_sqft,
        pile_height_ft,
        volume_cuft,
        volume_cy,
        uncertainty,
    }
}

/// Confidence of a single estimate: scale confidence plus 0.2, clamped to [0.1, 0.95].
pub fn estimate_confidence(scale_confidence: f64) -> f64 {
    (scale_confidence + 0.2).clamp(0.1, 0.95)
}

/// Converts mask, depth and scale into a rounded cubic-yard range.
pub fn estimate_volume(inputs: &VolumeInputs) -> VolumeRange {
    let b = volume_breakdown(inputs);
    let volume_cy = if b.volume_cy.is_finite() { b.volume_cy.max(0.0) } else { 0.0 };

    VolumeRange {
        low: (volume_cy * (1.0 - b.uncertainty)).max(MIN_VOLUME_CY),
        likely: volume_cy.max(MIN_VOLUME_CY),
        high: volume_cy * (1.0 + b.uncertainty),
        confidence: estimate_confidence(inputs.scale.confidence),
    }
    .rounded()
}
