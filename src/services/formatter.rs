use crate::models::classify_types::{Prediction, ResultItem};

const MAX_LABEL_WORDS: usize = 2;

/// Keeps at most the first two words of a label and capitalizes its first
/// character. `"golden retriever dog breed"` becomes `"Golden retriever"`.
pub fn format_label(raw: &str) -> String {
    let short = raw
        .split_whitespace()
        .take(MAX_LABEL_WORDS)
        .collect::<Vec<_>>()
        .join(" ");

    let mut chars = short.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Probability as a percentage with two decimals, e.g. `0.873` -> `"87.30 %"`.
///
/// Values outside `[0, 1]` are rendered as given.
pub fn format_percentage(probability: f32) -> String {
    format!("{:.2} %", f64::from(probability) * 100.0)
}

/// Display rows in the order the classifier returned them.
pub fn format_results(predictions: &[Prediction]) -> Vec<ResultItem> {
    predictions
        .iter()
        .map(|p| ResultItem {
            label: format_label(&p.label),
            percentage: format_percentage(p.probability),
            bar_width: p.probability * 100.0,
        })
        .collect()
}
