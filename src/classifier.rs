use std::collections::HashMap;

use serde::Serialize;

use crate::error::ServiceError;

/// The model's output classes, in the exact positional order its output
/// vector was trained with. Index i of the score vector means label i
/// here; reordering this list silently mislabels every prediction.
pub const CLASS_LABELS: [&str; 10] = [
    "Tomato_Bacterial_spot",
    "Tomato_Early_blight",
    "Tomato_Late_blight",
    "Tomato_Leaf_Mold",
    "Tomato_Septoria_leaf_spot",
    "Tomato_Spider_mites_Two_spotted_spider_mite",
    "Tomato__Target_Spot",
    "Tomato__Tomato_YellowLeaf__Curl_Virus",
    "Tomato__Tomato_mosaic_virus",
    "Tomato_healthy",
];

/// Returned when a label has no advisory entry. The advisory table is
/// maintained separately from the label list, so a hole in it is not a
/// request failure.
pub const ADVISORY_FALLBACK: &str = "Prevention info not available.";

#[derive(Debug, Serialize)]
pub struct Prediction {
    pub prediction: String,
    pub confidence: f32,
    pub prevention_measures: Vec<String>,
}

/// Maps a raw score vector to a labeled prediction with advisory text.
/// Labels and advisories are injected at construction so tests can run
/// against alternate tables.
pub struct Classifier {
    labels: Vec<String>,
    advisories: HashMap<String, Vec<String>>,
}

impl Classifier {
    pub fn new(labels: Vec<String>, advisories: HashMap<String, Vec<String>>) -> Self {
        Classifier { labels, advisories }
    }

    /// The production tables for the tomato-disease model.
    pub fn tomato() -> Self {
        Classifier::new(
            CLASS_LABELS.iter().map(|s| s.to_string()).collect(),
            builtin_advisories(),
        )
    }

    /// Startup drift check: any label without advisory text gets a
    /// warning now instead of a silent fallback at request time.
    pub fn warn_missing_advisories(&self) {
        for label in &self.labels {
            if !self.advisories.contains_key(label) {
                tracing::warn!(%label, "no advisory entry; requests will see the fallback text");
            }
        }
    }

    /// Pure transform from scores to a result. The confidence is the
    /// winning score verbatim, not re-normalized. Ties go to the first
    /// index attaining the maximum. NaN scores never beat finite ones;
    /// a vector of only NaNs resolves to index 0.
    pub fn classify(&self, scores: &[f32]) -> Result<Prediction, ServiceError> {
        if scores.len() != self.labels.len() {
            return Err(ServiceError::LabelMismatch {
                expected: self.labels.len(),
                got: scores.len(),
            });
        }

        let mut best = 0;
        for (i, &score) in scores.iter().enumerate() {
            if score > scores[best] || (scores[best].is_nan() && !score.is_nan()) {
                best = i;
            }
        }

        let label = &self.labels[best];
        let prevention_measures = self
            .advisories
            .get(label)
            .cloned()
            .unwrap_or_else(|| vec![ADVISORY_FALLBACK.to_string()]);

        Ok(Prediction {
            prediction: label.clone(),
            confidence: scores[best],
            prevention_measures,
        })
    }
}

fn lines(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| s.to_string()).collect()
}

fn builtin_advisories() -> HashMap<String, Vec<String>> {
    let mut table = HashMap::new();
    table.insert(
        "Tomato_Bacterial_spot".to_string(),
        lines(&[
            "Prevent bacterial spot by using disease-free seeds.",
            "Implement crop rotation to reduce the disease's prevalence.",
            "Apply copper-based fungicides to control the disease.",
        ]),
    );
    table.insert(
        "Tomato_Early_blight".to_string(),
        lines(&[
            "Prevent early blight by practicing good garden hygiene.",
            "Ensure proper watering to avoid splashing soil onto the leaves.",
            "Apply fungicides as needed to control the disease.",
        ]),
    );
    table.insert(
        "Tomato_Late_blight".to_string(),
        lines(&[
            "Prevent late blight by providing good air circulation in your garden or greenhouse.",
            "Avoid overhead watering, as wet leaves can encourage the disease.",
            "Apply fungicides when necessary to manage the disease.",
        ]),
    );
    table.insert(
        "Tomato_Leaf_Mold".to_string(),
        lines(&[
            "Prevent leaf mold by ensuring good air circulation and spacing between plants.",
            "Avoid wetting the leaves when watering, and water the soil instead.",
            "Apply fungicides if the disease is present and worsening.",
        ]),
    );
    table.insert(
        "Tomato_Septoria_leaf_spot".to_string(),
        lines(&[
            "Prevent Septoria leaf spot by maintaining good garden hygiene.",
            "Avoid overhead watering to keep the leaves dry.",
            "Apply fungicides if the disease becomes a problem.",
        ]),
    );
    table.insert(
        "Tomato_Spider_mites_Two_spotted_spider_mite".to_string(),
        lines(&[
            "Inspect plants regularly for signs of infestation.",
            "Increase humidity to discourage mites.",
            "Use insecticidal soap or neem oil to control mites.",
        ]),
    );
    table.insert(
        "Tomato__Target_Spot".to_string(),
        lines(&[
            "Ensure good air circulation and avoid overcrowding of plants.",
            "Water at the base to keep leaves dry.",
            "Apply fungicides as needed.",
        ]),
    );
    table.insert(
        "Tomato__Tomato_YellowLeaf__Curl_Virus".to_string(),
        lines(&[
            "Use virus-free tomato plants.",
            "Control whiteflies with insecticides.",
            "Remove and destroy infected plants.",
        ]),
    );
    table.insert(
        "Tomato__Tomato_mosaic_virus".to_string(),
        lines(&[
            "Use virus-free seeds and disease-resistant varieties.",
            "Control aphids with insecticides.",
            "Remove and destroy infected plants.",
        ]),
    );
    table.insert(
        "Tomato_healthy".to_string(),
        lines(&[
            "Continue monitoring for pests and diseases.",
            "Practice proper watering and fertilization.",
        ]),
    );
    table
}
