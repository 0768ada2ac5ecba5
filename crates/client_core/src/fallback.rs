use std::collections::HashSet;

use anyhow::{bail, Result};
use rand::{seq::SliceRandom, Rng};
use shared::domain::{ClassificationResult, Provenance};

use crate::ranking::rank;

pub const DEFAULT_CATALOG: [&str; 10] = [
    "Parang Rusak",
    "Kawung",
    "Mega Mendung",
    "Truntum",
    "Sido Mukti",
    "Sekar Jagad",
    "Ceplok",
    "Nitik",
    "Tambal",
    "Lereng",
];

const MIN_CATALOG_LABELS: usize = 4;
const PRIMARY_CONFIDENCE_MIN: f64 = 0.70;
const PRIMARY_CONFIDENCE_MAX: f64 = 0.95;
const MIN_ALTERNATIVES: usize = 2;
const MAX_ALTERNATIVES: usize = 3;

/// Synthesizes a plausible ranked result while the classification service is
/// out of reach. Every result it produces is tagged [`Provenance::Simulated`].
#[derive(Debug, Clone)]
pub struct FallbackSimulator {
    catalog: Vec<String>,
}

impl FallbackSimulator {
    pub fn new<I, S>(catalog: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let catalog: Vec<String> = catalog
            .into_iter()
            .map(Into::into)
            .map(|label: String| label.trim().to_string())
            .filter(|label| !label.is_empty() && seen.insert(label.clone()))
            .collect();
        if catalog.len() < MIN_CATALOG_LABELS {
            bail!(
                "fallback catalog needs at least {MIN_CATALOG_LABELS} distinct labels, got {}",
                catalog.len()
            );
        }
        Ok(Self { catalog })
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    pub fn simulate(&self) -> ClassificationResult {
        self.simulate_with(&mut rand::thread_rng())
    }

    pub fn simulate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> ClassificationResult {
        let primary_index = rng.gen_range(0..self.catalog.len());
        let primary = self.catalog[primary_index].as_str();
        let confidence = rng.gen_range(PRIMARY_CONFIDENCE_MIN..=PRIMARY_CONFIDENCE_MAX);

        let others: Vec<&str> = self
            .catalog
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != primary_index)
            .map(|(_, label)| label.as_str())
            .collect();
        let count = rng.gen_range(MIN_ALTERNATIVES..=MAX_ALTERNATIVES);
        let chosen: Vec<&str> = others.choose_multiple(rng, count).copied().collect();

        let mut entries = Vec::with_capacity(chosen.len() + 1);
        entries.push((primary, confidence));
        let mut remaining = 1.0 - confidence;
        for (i, label) in chosen.iter().copied().enumerate() {
            let share = if i + 1 == chosen.len() {
                remaining
            } else {
                remaining * rng.gen_range(0.3..0.7)
            };
            let share = share.max(0.0);
            entries.push((label, share));
            remaining -= share;
        }

        ClassificationResult::new(rank(entries, Some(primary)), Provenance::Simulated)
    }
}

impl Default for FallbackSimulator {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG.iter().map(|label| label.to_string()).collect(),
        }
    }
}

#[cfg(test)]
#[path = "tests/fallback_tests.rs"]
mod tests;
