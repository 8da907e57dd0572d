use serde::{Deserialize, Serialize};

/// One raw `(label, probability)` pair as returned by the classifier.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub probability: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// A display-ready result row.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub label: String,
    pub percentage: String,
    /// Width of the percentage bar, in percent of the row.
    pub bar_width: f32,
}
