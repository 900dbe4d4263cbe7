//! Analyzer sets.

use crate::{CircularImports, DependencyUsage, LayerBoundaries};
use archgraph_core::AnalyzerBox;

/// Returns every built-in analyzer with default settings.
///
/// Includes:
/// - `circular-imports` (AG001, AG002)
/// - `layer-boundaries` (AG101, AG102)
/// - `dependency-usage` (AG201, AG202)
///
/// Categories switched off in the configuration are skipped by the
/// scheduler, so there is no need to filter this list.
#[must_use]
pub fn all_analyzers() -> Vec<AnalyzerBox> {
    vec![
        Box::new(CircularImports::new()),
        Box::new(LayerBoundaries::new()),
        Box::new(DependencyUsage::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn analyzer_names_and_codes_are_unique() {
        let analyzers = all_analyzers();
        let names: HashSet<&str> = analyzers.iter().map(|a| a.name()).collect();
        assert_eq!(names.len(), analyzers.len());

        let codes: Vec<&str> = analyzers.iter().flat_map(|a| a.codes().iter().copied()).collect();
        let unique: HashSet<&str> = codes.iter().copied().collect();
        assert_eq!(unique.len(), codes.len());
        assert!(analyzers.iter().all(|a| !a.description().is_empty()));
    }
}
