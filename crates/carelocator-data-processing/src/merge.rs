//! Boundary merge & simplification engine.
//!
//! For every service category this produces one flattened polygon artifact:
//! each service's area codes are resolved against the priority stack,
//! multi-polygons are expanded into per-polygon entries tagged with the
//! owning service id, every polygon is simplified with a topology-preserving
//! tolerance, and polygons sharing a service id are dissolved into a single
//! coverage shape (self-overlap is permitted, so no topology cleaning is
//! needed beforehand).
//!
//! Data-quality problems (duplicate codes, unresolvable codes, services that
//! end up with no geometry at all) are accumulated into a [`MergeSummary`]
//! and reported at the end rather than failing the run. The one fatal
//! condition is an unexpected geometry shape in a source file, which aborts
//! the build before an incomplete index can be produced.

use std::collections::BTreeSet;
use std::path::PathBuf;

use geo::{Polygon, SimplifyVwPreserve, unary_union};
use itertools::Itertools;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    Result,
    artifact::{ServiceAreaArtifact, ServiceAreaPolygon},
    boundary::{BoundaryDataset, PriorityCatalog},
    registry::{Service, ServiceCategory, ServiceRegistry},
    resolver::{CodeResolver, Resolution, normalize_code},
};

/// Visvalingam-Whyatt area threshold in square degrees. Small enough to keep
/// coastline detail at postcode-lookup precision, large enough to shrink the
/// raw ONS collections considerably.
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 1e-6;

/// Configuration for one merge run.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    output_dir: PathBuf,
    simplify_tolerance: f64,
    categories: Vec<ServiceCategory>,
}

impl MergeConfig {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            simplify_tolerance: DEFAULT_SIMPLIFY_TOLERANCE,
            categories: ServiceCategory::ALL.to_vec(),
        }
    }

    #[must_use]
    pub fn simplify_tolerance(mut self, tolerance: f64) -> Self {
        self.simplify_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn categories(mut self, categories: impl Into<Vec<ServiceCategory>>) -> Self {
        self.categories = categories.into();
        self
    }
}

impl Default for MergeConfig {
    /// Writes artifacts to the default directory under
    /// [`DATA_DIR`](crate::DATA_DIR).
    fn default() -> Self {
        Self::new(crate::artifact_dir())
    }
}

/// A (service, code) pair flagged during the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeIssue {
    pub service_id: String,
    pub code: String,
}

/// Accumulated data-quality report for one merge run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct MergeSummary {
    /// (service, category) pairs that contributed geometry; a service
    /// offering two categories counts once per category.
    pub service_entries_merged: usize,
    pub polygons_written: usize,
    pub artifacts: Vec<String>,
    pub duplicate_codes: Vec<CodeIssue>,
    pub unresolved_codes: Vec<CodeIssue>,
    pub wales_fallbacks: Vec<CodeIssue>,
    pub services_without_geometry: Vec<String>,
}

impl MergeSummary {
    #[must_use]
    pub fn has_data_quality_issues(&self) -> bool {
        !(self.duplicate_codes.is_empty()
            && self.unresolved_codes.is_empty()
            && self.services_without_geometry.is_empty())
    }

    /// Human-readable run report.
    #[must_use]
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!(
                "Merged {} service entries into {} polygons across {} artifacts",
                self.service_entries_merged,
                self.polygons_written,
                self.artifacts.len()
            ),
            format!("  unresolved codes: {}", self.unresolved_codes.len()),
            format!("  duplicate codes collapsed: {}", self.duplicate_codes.len()),
            format!("  Wales fallbacks applied: {}", self.wales_fallbacks.len()),
            format!(
                "  services excluded (no geometry): {}",
                self.services_without_geometry.len()
            ),
        ];
        for issue in &self.unresolved_codes {
            lines.push(format!(
                "  could not find boundary for code '{}' (service '{}')",
                issue.code, issue.service_id
            ));
        }
        lines.join("\n")
    }

    fn push_issue(target: &mut Vec<CodeIssue>, service_id: &str, code: &str) {
        let issue = CodeIssue {
            service_id: service_id.to_string(),
            code: code.to_string(),
        };
        if !target.contains(&issue) {
            target.push(issue);
        }
    }
}

/// The build-time pipeline: boundary stack in, per-category artifacts out.
pub struct MergeEngine {
    resolver: CodeResolver,
}

impl MergeEngine {
    /// Load every dataset named in the catalog from `boundary_dir` and build
    /// the engine. Missing source files load as empty datasets; a malformed
    /// geometry shape in any present file fails the build here.
    #[instrument(name = "Load boundary stack", skip_all, level = "info")]
    pub fn load(boundary_dir: impl AsRef<std::path::Path>, catalog: PriorityCatalog) -> Result<Self> {
        let boundary_dir = boundary_dir.as_ref();
        let datasets = catalog
            .datasets
            .iter()
            .map(|spec| BoundaryDataset::load(boundary_dir, spec))
            .collect::<Result<Vec<_>>>()?;

        let loaded = datasets.iter().filter(|dataset| !dataset.is_empty()).count();
        info!(
            datasets = datasets.len(),
            non_empty = loaded,
            "Boundary stack loaded"
        );

        Ok(Self {
            resolver: CodeResolver::new(datasets, catalog.wales)?,
        })
    }

    /// Load the catalog's datasets from the default boundary directory under
    /// [`DATA_DIR`](crate::DATA_DIR).
    pub fn load_default(catalog: PriorityCatalog) -> Result<Self> {
        Self::load(crate::boundary_dir(), catalog)
    }

    /// Build an engine from an already-constructed resolver.
    #[must_use]
    pub fn from_resolver(resolver: CodeResolver) -> Self {
        Self { resolver }
    }

    #[must_use]
    pub fn resolver(&self) -> &CodeResolver {
        &self.resolver
    }

    /// Run the full merge: one artifact per configured category, written to
    /// the configured output directory.
    #[instrument(name = "Merge service boundaries", skip_all, level = "info")]
    pub fn run(&self, registry: &ServiceRegistry, config: &MergeConfig) -> Result<MergeSummary> {
        std::fs::create_dir_all(&config.output_dir)?;
        let mut summary = MergeSummary::default();

        for &category in &config.categories {
            let artifact = self.merge_category(registry, category, config, &mut summary)?;
            let file_name = category.artifact_file_name();
            artifact.write_to_file(config.output_dir.join(&file_name))?;
            summary.artifacts.push(file_name);
        }

        info!(
            polygons = summary.polygons_written,
            unresolved = summary.unresolved_codes.len(),
            "Merge complete"
        );
        Ok(summary)
    }

    /// Merge one category without persisting it.
    pub fn merge_category(
        &self,
        registry: &ServiceRegistry,
        category: ServiceCategory,
        config: &MergeConfig,
        summary: &mut MergeSummary,
    ) -> Result<ServiceAreaArtifact> {
        // Deterministic artifact ordering regardless of registry order.
        let services = registry
            .services_in_category(category)
            .into_iter()
            .sorted_by(|a, b| a.id.cmp(&b.id));

        let mut entries = Vec::new();
        for service in services {
            let polygons = self.collect_service_polygons(service, summary);
            if polygons.is_empty() {
                if !summary.services_without_geometry.contains(&service.id) {
                    warn!(
                        service = %service.id,
                        "Service has no resolvable area codes, excluding from artifact"
                    );
                    summary.services_without_geometry.push(service.id.clone());
                }
                continue;
            }

            let simplified: Vec<Polygon<f64>> = polygons
                .iter()
                .map(|polygon| polygon.simplify_vw_preserve(&config.simplify_tolerance))
                .collect();

            // Dissolve everything this service contributed; overlaps between
            // its own codes are expected and absorbed by the union.
            let dissolved = unary_union(&simplified);
            for polygon in dissolved {
                entries.push(ServiceAreaPolygon {
                    service_id: service.id.clone(),
                    polygon,
                });
            }
            summary.service_entries_merged += 1;
        }

        summary.polygons_written += entries.len();
        Ok(ServiceAreaArtifact::new(category, entries))
    }

    fn collect_service_polygons(
        &self,
        service: &Service,
        summary: &mut MergeSummary,
    ) -> Vec<Polygon<f64>> {
        let mut seen = BTreeSet::new();
        let mut polygons = Vec::new();

        for code in &service.area_codes {
            if !seen.insert(normalize_code(code)) {
                warn!(
                    service = %service.id,
                    code = %code,
                    "Duplicate area code on service, collapsing"
                );
                MergeSummary::push_issue(&mut summary.duplicate_codes, &service.id, code);
                continue;
            }

            match self.resolver.resolve(code) {
                Resolution::Feature(feature) => {
                    polygons.extend(feature.geometry.polygons());
                }
                Resolution::WalesFallback => {
                    MergeSummary::push_issue(&mut summary.wales_fallbacks, &service.id, code);
                    for feature in self.resolver.wales_aggregate().features() {
                        polygons.extend(feature.geometry.polygons());
                    }
                }
                Resolution::NotFound => {
                    warn!(
                        service = %service.id,
                        code = %code,
                        "Could not find boundary for code"
                    );
                    MergeSummary::push_issue(&mut summary.unresolved_codes, &service.id, code);
                }
            }
        }

        polygons
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data;
    use geo::{Contains, Point};

    fn engine() -> MergeEngine {
        MergeEngine::from_resolver(test_data::sample_resolver())
    }

    fn config(dir: &std::path::Path) -> MergeConfig {
        // Tiny fixtures are squares already; no simplification wanted.
        MergeConfig::new(dir).simplify_tolerance(0.0)
    }

    #[test]
    fn writes_one_artifact_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();

        let summary = engine().run(&registry, &config(dir.path())).unwrap();

        assert_eq!(summary.artifacts.len(), ServiceCategory::ALL.len());
        for category in ServiceCategory::ALL {
            assert!(dir.path().join(category.artifact_file_name()).exists());
        }
    }

    #[test]
    fn service_polygons_contain_their_source_interior_points() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();
        let mut summary = MergeSummary::default();

        let artifact = engine()
            .merge_category(
                &registry,
                ServiceCategory::Aac,
                &config(dir.path()),
                &mut summary,
            )
            .unwrap();

        // england-aac covers the ICB square at (0,0)..(1,1).
        let inside = Point::new(0.5, 0.5);
        assert!(artifact.entries().iter().any(|entry| {
            entry.service_id == "england-aac" && entry.polygon.contains(&inside)
        }));
    }

    #[test]
    fn multipolygon_sources_expand_to_entries_sharing_the_service_id() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();
        let mut summary = MergeSummary::default();

        let artifact = engine()
            .merge_category(
                &registry,
                ServiceCategory::Wcs,
                &config(dir.path()),
                &mut summary,
            )
            .unwrap();

        // islands-wcs resolves to a two-part multi-polygon; the parts are
        // disjoint so the dissolve keeps them as separate single polygons.
        let island_entries: Vec<_> = artifact
            .entries()
            .iter()
            .filter(|entry| entry.service_id == "islands-wcs")
            .collect();
        assert_eq!(island_entries.len(), 2);
    }

    #[test]
    fn unresolved_welsh_prefix_assigns_the_full_wales_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();
        let mut summary = MergeSummary::default();

        let artifact = engine()
            .merge_category(
                &registry,
                ServiceCategory::Wcs,
                &config(dir.path()),
                &mut summary,
            )
            .unwrap();

        // wales-wcs is authored with the bare "CF" postcode-area prefix; both
        // disjoint health-board squares must contain points for it.
        for point in [Point::new(4.5, 0.5), Point::new(6.5, 0.5)] {
            assert!(
                artifact.entries().iter().any(|entry| {
                    entry.service_id == "wales-wcs" && entry.polygon.contains(&point)
                }),
                "Expected wales-wcs coverage at {point:?}"
            );
        }
        assert_eq!(summary.wales_fallbacks.len(), 1);
    }

    #[test]
    fn unresolvable_code_is_reported_but_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();

        let summary = engine().run(&registry, &config(dir.path())).unwrap();

        assert!(
            summary
                .unresolved_codes
                .iter()
                .any(|issue| issue.service_id == "england-aac" && issue.code == "E00MISSING")
        );
        // The service still contributes geometry from its resolvable code.
        assert!(!summary.services_without_geometry.contains(&"england-aac".to_string()));
    }

    #[test]
    fn duplicate_codes_collapse_with_a_warning_entry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();

        let summary = engine().run(&registry, &config(dir.path())).unwrap();

        // england-ec lists the same code twice (in different case).
        assert!(
            summary
                .duplicate_codes
                .iter()
                .any(|issue| issue.service_id == "england-ec")
        );
    }

    #[test]
    fn service_with_no_resolvable_codes_is_silently_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();

        let summary = engine().run(&registry, &config(dir.path())).unwrap();

        assert!(
            summary
                .services_without_geometry
                .contains(&"orphan-ec".to_string())
        );
        let artifact = ServiceAreaArtifact::read_from_file(
            ServiceCategory::Ec,
            dir.path().join(ServiceCategory::Ec.artifact_file_name()),
        )
        .unwrap();
        assert!(
            artifact
                .entries()
                .iter()
                .all(|entry| entry.service_id != "orphan-ec")
        );
    }

    #[test]
    fn service_entries_count_once_per_category() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ServiceRegistry::new(vec![Service {
            id: "dual-category".to_string(),
            service_name: "Combined AAC and EC Service".to_string(),
            postcode: "M13 9PL".to_string(),
            area_codes: vec!["E54000048".to_string()],
            categories: vec![ServiceCategory::Aac, ServiceCategory::Ec],
            country: None,
            phone_number: None,
            website: None,
            address_lines: Vec::new(),
            email: None,
            caseload: None,
            provider: None,
            note: None,
            service_color: None,
            communication_matters: None,
        }]);

        let summary = engine().run(&registry, &config(dir.path())).unwrap();

        // One service in two categories contributes one entry per category.
        assert_eq!(summary.service_entries_merged, 2);
    }

    #[test]
    fn default_run_reads_and_writes_under_the_data_dir() {
        let boundary_dir = crate::boundary_dir();
        std::fs::create_dir_all(&boundary_dir).unwrap();
        test_data::write_boundary_file(
            &boundary_dir,
            "ICBs-2023.json",
            "ICB23CD",
            &[("E54000048", test_data::square(0.0, 0.0, 1.0))],
        );

        let engine = MergeEngine::load_default(PriorityCatalog::uk_default()).unwrap();
        let summary = engine
            .run(&test_data::sample_registry(), &MergeConfig::default())
            .unwrap();

        assert!(summary.service_entries_merged > 0);
        for category in ServiceCategory::ALL {
            assert!(
                crate::artifact_dir()
                    .join(category.artifact_file_name())
                    .exists()
            );
        }
    }

    #[test]
    fn merge_is_idempotent_over_unchanged_inputs() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let registry = test_data::sample_registry();

        engine().run(&registry, &config(dir_a.path())).unwrap();
        engine().run(&registry, &config(dir_b.path())).unwrap();

        for category in ServiceCategory::ALL {
            let a = std::fs::read(dir_a.path().join(category.artifact_file_name())).unwrap();
            let b = std::fs::read(dir_b.path().join(category.artifact_file_name())).unwrap();
            assert_eq!(a, b, "Artifact for {category} should be byte-identical");
        }
    }
}
