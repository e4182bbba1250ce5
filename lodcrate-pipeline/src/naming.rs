//! Output base names for source files

use std::collections::HashMap;
use std::path::Path;

/// Occurrences of each base name seen so far in a run
pub type NameRegistry = HashMap<String, usize>;

/// Base name of a source file: the stem with a leading `prefix_` removed.
///
/// Only the first underscore splits, so `Set01_Old_Barrel.glb` gives `Old_Barrel`.
/// A stem without underscore is kept whole.
pub fn base_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('_') {
        Some((_, rest)) => rest.to_string(),
        None => stem,
    }
}

/// Hands out collision-free base names for the whole batch.
///
/// Counts only grow; the registry is never reset while the deduplicator lives.
#[derive(Debug, Clone, Default)]
pub struct NameDeduplicator {
    registry: NameRegistry,
}

impl NameDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deduplicated base name for `file_name`.
    ///
    /// The first occurrence of a base name is returned as is, the n-th
    /// (n >= 2) as `{base}_{n}`.
    pub fn dedup(&mut self, file_name: &str) -> String {
        let base = base_name(file_name);
        let count = self.registry.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base
        } else {
            format!("{}_{}", base, count)
        }
    }

    /// How many times `base` has been handed out
    pub fn occurrences(&self, base: &str) -> usize {
        self.registry.get(base).copied().unwrap_or(0)
    }

    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }
}
