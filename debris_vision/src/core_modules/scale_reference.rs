// THEORY:
// Without calibration the engine needs *something* of known size to turn pixels
// into inches. The `scale_reference` module picks that something from framing
// alone: tall portrait shots are usually taken in doorways, wide landscape shots
// usually include furniture, and anything else falls back to a low-confidence
// moving box. There is no content understanding here at all; the choice is a
// pure function of width and height, and the confidence values say as much.
//
// A fixed list of alternative candidates is reported next to the choice so a
// reviewer can see what else the photo might have been measured against. Only
// the chosen reference feeds volume estimation.

use serde::Serialize;

/// Portrait frames taller than this multiple of their width suggest a doorway.
pub const PORTRAIT_RATIO: f64 = 1.2;
/// Landscape frames wider than this multiple of their height suggest furniture.
pub const LANDSCAPE_RATIO: f64 = 1.3;

/// Everyday objects of known height, in inches.
pub const REFERENCE_CATALOG: [(&str, f64); 15] = [
    ("interior door", 80.0),
    ("door handle", 36.0),
    ("kitchen counter", 36.0),
    ("standard outlet", 18.0),
    ("mattress", 10.0),
    ("sofa", 36.0),
    ("dresser", 48.0),
    ("refrigerator", 66.0),
    ("32 gallon trash can", 27.0),
    ("18 gallon tote", 16.0),
    ("moving box", 18.0),
    ("96 gallon trash bin", 45.0),
    ("pallet", 48.0),
    ("fence picket", 72.0),
    ("curb", 6.0),
];

/// Typical height in inches of a catalogued reference object.
pub fn catalog_height(label: &str) -> Option<f64> {
    REFERENCE_CATALOG
        .iter()
        .find(|(name, _)| *name == label)
        .map(|&(_, height)| height)
}

/// The real-world object a photo is measured against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleReference {
    pub label: String,
    pub height_in: f64,
    /// How much the heuristic trusts this choice, in [0, 1].
    pub confidence: f64,
    pub note: String,
}

impl ScaleReference {
    fn new(label: &str, height_in: f64, confidence: f64, note: &str) -> Self {
        Self {
            label: label.to_string(),
            height_in,
            confidence,
            note: note.to_string(),
        }
    }
}

/// The chosen reference plus the fixed alternatives, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleReport {
    pub chosen: ScaleReference,
    pub candidates: Vec<ScaleReference>,
}

/// Picks the scale reference for a `width` x `height` frame.
pub fn choose_reference(width: u32, height: u32) -> ScaleReference {
    let (w, h) = (width as f64, height as f64);

    if h > w * PORTRAIT_RATIO {
        return ScaleReference::new(
            "interior door",
            80.0,
            0.45,
            "Vertical framing suggests door-sized reference",
        );
    }

    if w > h * LANDSCAPE_RATIO {
        return ScaleReference::new("sofa", 36.0, 0.3, "Wide framing suggests furniture scale");
    }

    ScaleReference::new("moving box", 18.0, 0.2, "Fallback scale due to unclear reference")
}

/// The alternatives always listed next to the chosen reference.
pub fn candidate_references() -> Vec<ScaleReference> {
    vec![
        ScaleReference::new("interior door", 80.0, 0.45, "Common vertical reference"),
        ScaleReference::new("kitchen counter", 36.0, 0.35, "Common interior reference"),
        ScaleReference::new("moving box", 18.0, 0.2, "Common portable reference"),
    ]
}

pub fn detect_scale(width: u32, height: u32) -> ScaleReport {
    ScaleReport {
        chosen: choose_reference(width, height),
        candidates: candidate_references(),
    }
}
