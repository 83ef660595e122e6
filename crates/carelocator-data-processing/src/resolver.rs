//! Priority-ordered code resolution.
//!
//! Given an administrative code attached to a service, walk the loaded
//! boundary datasets in catalog order and return the first match. The
//! tie-break is deliberate: if a code appears in several editions, the
//! earliest dataset in the priority list wins, encoding "prefer the newest /
//! most specific source".

use tracing::debug;

use crate::{
    DataError, Result,
    boundary::{BoundaryDataset, BoundaryFeature, WalesPolicy},
};

/// Canonical form used for every code comparison: lowercase with all
/// whitespace removed.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.split_whitespace().collect::<String>().to_lowercase()
}

/// Outcome of resolving one administrative code.
#[derive(Debug)]
pub enum Resolution<'a> {
    /// Exact match in the earliest dataset containing the code.
    Feature(&'a BoundaryFeature),
    /// No exact match, but the code is a recognized Welsh postcode-area
    /// prefix or the whole-of-Wales placeholder: the caller should treat the
    /// service as covering the entire Welsh aggregate dataset.
    WalesFallback,
    NotFound,
}

impl Resolution<'_> {
    #[must_use]
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Resolves codes against an ordered stack of boundary datasets.
#[derive(Debug)]
pub struct CodeResolver {
    datasets: Vec<BoundaryDataset>,
    wales: WalesPolicy,
    wales_aggregate: usize,
}

impl CodeResolver {
    /// Build a resolver over datasets already loaded in priority order.
    ///
    /// Fails if the Wales policy names an aggregate dataset that is not in
    /// the stack; an empty aggregate is fine (the fallback then contributes
    /// no geometry, which load-time warnings will already have flagged).
    pub fn new(datasets: Vec<BoundaryDataset>, wales: WalesPolicy) -> Result<Self> {
        let wales_aggregate = datasets
            .iter()
            .position(|dataset| dataset.name() == wales.aggregate_dataset)
            .ok_or_else(|| DataError::WalesAggregateMissing(wales.aggregate_dataset.clone()))?;

        Ok(Self {
            datasets,
            wales,
            wales_aggregate,
        })
    }

    /// Resolve `code` to the first matching boundary feature in priority
    /// order, or signal the Welsh fallback for unresolved Welsh codes.
    pub fn resolve(&self, code: &str) -> Resolution<'_> {
        let normalized = normalize_code(code);

        for dataset in &self.datasets {
            if let Some(feature) = dataset.find_normalized(&normalized) {
                return Resolution::Feature(feature);
            }
        }

        if self.is_wales_code(&normalized) {
            debug!(code = %code, "No exact match, falling back to Wales aggregate");
            return Resolution::WalesFallback;
        }

        Resolution::NotFound
    }

    fn is_wales_code(&self, normalized: &str) -> bool {
        normalized == normalize_code(&self.wales.whole_of_wales_code)
            || self
                .wales
                .postcode_area_prefixes
                .iter()
                .any(|prefix| normalize_code(prefix) == normalized)
    }

    /// The dataset whose full feature set stands in for the whole of Wales.
    #[must_use]
    pub fn wales_aggregate(&self) -> &BoundaryDataset {
        &self.datasets[self.wales_aggregate]
    }

    #[must_use]
    pub fn datasets(&self) -> &[BoundaryDataset] {
        &self.datasets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data;

    fn wales_policy() -> WalesPolicy {
        WalesPolicy {
            postcode_area_prefixes: vec!["CF".to_string(), "LL".to_string()],
            whole_of_wales_code: "WALES".to_string(),
            aggregate_dataset: "Welsh Health Boards".to_string(),
        }
    }

    fn resolver() -> CodeResolver {
        let newer = test_data::dataset_from_squares(
            "ICBs 2023",
            &[("E54000048", 0.0, 0.0, 1.0), ("SHARED", 10.0, 10.0, 1.0)],
        );
        let older = test_data::dataset_from_squares(
            "CCGs April 2019",
            &[("E38000006", 2.0, 0.0, 1.0), ("SHARED", 20.0, 20.0, 1.0)],
        );
        let wales = test_data::dataset_from_squares(
            "Welsh Health Boards",
            &[("W11000028", 4.0, 0.0, 1.0), ("W11000029", 6.0, 0.0, 1.0)],
        );
        CodeResolver::new(vec![newer, older, wales], wales_policy()).unwrap()
    }

    #[test]
    fn resolves_from_any_dataset_in_the_stack() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve("E54000048"),
            Resolution::Feature(_)
        ));
        assert!(matches!(
            resolver.resolve("E38000006"),
            Resolution::Feature(_)
        ));
        assert!(matches!(resolver.resolve("E99999999"), Resolution::NotFound));
    }

    #[test]
    fn earliest_dataset_wins_when_code_appears_twice() {
        let resolver = resolver();
        match resolver.resolve("SHARED") {
            Resolution::Feature(feature) => {
                // The ICB square sits at (10, 10); the CCG duplicate at (20, 20).
                let polygons = feature.geometry.polygons();
                let exterior_start = polygons[0].exterior().0[0];
                assert_eq!(exterior_start.x, 10.0);
            }
            other => panic!("Expected a feature, got {other:?}"),
        }
    }

    #[test]
    fn resolution_is_case_and_whitespace_insensitive() {
        let resolver = resolver();
        for variant in ["E38000006", "e38000006", " e38 000 006 "] {
            assert!(
                matches!(resolver.resolve(variant), Resolution::Feature(_)),
                "Variant {variant:?} should resolve"
            );
        }
    }

    #[test]
    fn welsh_prefix_without_exact_match_falls_back_to_wales() {
        let resolver = resolver();
        assert!(matches!(resolver.resolve("CF"), Resolution::WalesFallback));
        assert!(matches!(
            resolver.resolve("wales"),
            Resolution::WalesFallback
        ));
        // Not a recognized Welsh prefix.
        assert!(matches!(resolver.resolve("ZZ"), Resolution::NotFound));
    }

    #[test]
    fn exact_welsh_match_beats_the_fallback() {
        let resolver = resolver();
        assert!(matches!(
            resolver.resolve("W11000029"),
            Resolution::Feature(_)
        ));
    }

    #[test]
    fn missing_wales_aggregate_is_a_configuration_error() {
        let datasets = vec![test_data::dataset_from_squares(
            "ICBs 2023",
            &[("E54000048", 0.0, 0.0, 1.0)],
        )];
        let err = CodeResolver::new(datasets, wales_policy()).unwrap_err();
        assert!(matches!(err, DataError::WalesAggregateMissing(_)));
    }

    #[test]
    fn normalize_code_strips_case_and_whitespace() {
        assert_eq!(normalize_code(" E38 000006 "), "e38000006");
        assert_eq!(normalize_code("WALES"), "wales");
    }
}
