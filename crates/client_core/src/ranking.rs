use std::{cmp::Ordering, collections::HashSet};

use shared::domain::Prediction;

pub const MAX_RANKED_PREDICTIONS: usize = 5;

/// Orders `(label, probability)` pairs for display.
///
/// Sorting is stable, so equal probabilities keep the input order. A label
/// that appears more than once keeps only its highest entry. When `primary`
/// names a label present in the input, that entry is moved to the front
/// before truncating to [`MAX_RANKED_PREDICTIONS`].
pub fn rank<'a, I>(entries: I, primary: Option<&str>) -> Vec<Prediction>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut ranked: Vec<Prediction> = entries
        .into_iter()
        .map(|(label, probability)| Prediction::new(label, probability))
        .collect();
    ranked.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(Ordering::Equal)
    });

    let mut seen = HashSet::new();
    ranked.retain(|p| seen.insert(p.label.clone()));

    if let Some(primary) = primary {
        if let Some(pos) = ranked.iter().position(|p| p.label == primary) {
            let entry = ranked.remove(pos);
            ranked.insert(0, entry);
        }
    }

    ranked.truncate(MAX_RANKED_PREDICTIONS);
    ranked
}

#[cfg(test)]
#[path = "tests/ranking_tests.rs"]
mod tests;
