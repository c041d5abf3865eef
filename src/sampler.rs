// Stratified sampling
//
// Produces a bounded, class-balanced subsample of a labeled collection.
// Pure function over its input: no shared state, no concurrency. Every
// shuffle is a uniform random permutation; output order is not stable
// across runs.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::sample::{SampleCollection, LABEL_KEY};

/// Stratified sampling parameters
///
/// `instances` supports at-least mode via its sign: a negative value means
/// "take every eligible sample for a class once it has at least |instances|",
/// while a positive value caps each class at exactly that many.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Maximum number of distinct labels to keep (None = unbounded).
    /// The insufficient-diversity warning only fires for a finite value;
    /// unbounded never warns.
    #[serde(default)]
    pub classes: Option<usize>,
    /// Per-class instance bound; negative selects at-least mode (None = unbounded)
    #[serde(default)]
    pub instances: Option<i64>,
    /// Final subsample fraction in (0, 1]
    #[serde(default = "default_fraction")]
    pub fraction: f32,
    /// Metadata key holding the class label
    #[serde(default = "default_label_field")]
    pub label_field: String,
}

fn default_fraction() -> f32 {
    1.0
}

fn default_label_field() -> String {
    LABEL_KEY.to_string()
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            classes: None,
            instances: None,
            fraction: default_fraction(),
            label_field: default_label_field(),
        }
    }
}

/// Produce a class-stratified subsample of `collection`
///
/// With fully unbounded parameters the input is returned unchanged. Labels
/// whose eligible count cannot satisfy an explicit per-class bound are
/// discarded before class selection; if fewer labels survive than requested
/// a warning is logged and all survivors are used.
pub fn sample(collection: SampleCollection, config: &SamplerConfig) -> SampleCollection {
    // Return early when no downsampling is required
    if config.classes.is_none() && config.instances.is_none() && config.fraction >= 1.0 {
        return collection;
    }

    let at_least = config.instances.map_or(false, |n| n < 0);
    let bound = config.instances.map(|n| n.unsigned_abs() as usize);

    // Unlabeled samples all share the empty label, so label-free
    // configurations (fraction only) still sample the whole collection
    let labels: Vec<String> = collection
        .iter()
        .map(|s| s.label(&config.label_field).unwrap_or_default().to_owned())
        .collect();

    // Eligible counts per label (excluded samples never count)
    let mut counts: HashMap<String, usize> = HashMap::new();
    for (sample, label) in collection.iter().zip(&labels) {
        if !sample.excluded() {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
    }

    // Labels that cannot satisfy an explicit bound are dropped entirely
    if let Some(bound) = bound {
        counts.retain(|_, count| *count >= bound);
    }

    let mut rng = rand::thread_rng();
    let mut surviving: Vec<String> = counts.into_keys().collect();
    if let Some(classes) = config.classes {
        if surviving.len() < classes {
            tracing::warn!(
                requested = classes,
                available = surviving.len(),
                "fewer labels available than requested classes"
            );
        }
        if surviving.len() > classes {
            surviving.shuffle(&mut rng);
            surviving.truncate(classes);
        }
    }

    let mut picked = SampleCollection::new();
    for label in &surviving {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(i, l)| *l == label && !collection[*i].excluded())
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(&mut rng);

        let take = match bound {
            Some(bound) if !at_least => indices.len().min(bound),
            _ => indices.len(),
        };
        for &i in indices.iter().take(take) {
            picked.push(collection[i].clone());
        }
    }

    if config.fraction < 1.0 {
        picked.shuffle(&mut rng);
        let keep = (picked.len() as f32 * config.fraction).floor() as usize;
        picked.truncate(keep);
    }

    picked
}
