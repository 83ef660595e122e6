//! Runtime point-in-polygon lookup over the merged artifacts.

use std::{collections::BTreeSet, path::Path};

use geo::Contains;
use once_cell::sync::OnceCell;
use tracing::{info, instrument, warn};

use carelocator_data_processing::{ServiceAreaArtifact, ServiceCategory};

use crate::geocode::Coordinate;

pub use error::{IndexError, Result};

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Artifact error: {0}")]
        Data(#[from] carelocator_data_processing::DataError),
    }

    pub type Result<T> = std::result::Result<T, IndexError>;
}

static SHARED: OnceCell<ContainmentIndex> = OnceCell::new();

/// All merged coverage polygons, loaded once and queried by coordinate.
///
/// Containment uses strict interior membership, so a point exactly on a
/// boundary edge belongs to neither side.
#[derive(Debug, Clone)]
pub struct ContainmentIndex {
    artifacts: Vec<ServiceAreaArtifact>,
}

impl ContainmentIndex {
    /// Load every category artifact from `artifact_dir`. A missing artifact
    /// file is logged and skipped so a partial build still serves the
    /// categories it produced; a present but malformed file is an error.
    #[instrument(name = "index_load", skip_all, level = "info")]
    pub fn load(artifact_dir: impl AsRef<Path>) -> Result<Self> {
        let artifact_dir = artifact_dir.as_ref();
        let mut artifacts = Vec::with_capacity(ServiceCategory::ALL.len());

        for category in ServiceCategory::ALL {
            let path = artifact_dir.join(category.artifact_file_name());
            if !path.exists() {
                warn!(category = %category, path = ?path, "Artifact file missing, skipping category");
                continue;
            }
            artifacts.push(ServiceAreaArtifact::read_from_file(category, &path)?);
        }

        let index = Self { artifacts };
        info!(
            categories = index.artifacts.len(),
            polygons = index.polygon_count(),
            "Containment index loaded"
        );
        Ok(index)
    }

    /// The process-wide index, loaded on first use and reused after.
    pub fn shared(artifact_dir: impl AsRef<Path>) -> Result<&'static Self> {
        SHARED.get_or_try_init(|| Self::load(artifact_dir))
    }

    #[must_use]
    pub fn from_artifacts(artifacts: Vec<ServiceAreaArtifact>) -> Self {
        Self { artifacts }
    }

    /// Ids of every service whose coverage strictly contains `coordinate`,
    /// deduplicated across categories and multi-part coverage.
    #[must_use]
    pub fn services_containing(&self, coordinate: Coordinate) -> BTreeSet<String> {
        let point = coordinate.to_point();
        let mut ids = BTreeSet::new();
        for artifact in &self.artifacts {
            for entry in artifact.entries() {
                if entry.polygon.contains(&point) {
                    ids.insert(entry.service_id.clone());
                }
            }
        }
        ids
    }

    /// Like [`services_containing`](Self::services_containing) but limited to
    /// one category.
    #[must_use]
    pub fn services_containing_in(
        &self,
        category: ServiceCategory,
        coordinate: Coordinate,
    ) -> BTreeSet<String> {
        let point = coordinate.to_point();
        let mut ids = BTreeSet::new();
        for artifact in self
            .artifacts
            .iter()
            .filter(|artifact| artifact.category() == category)
        {
            for entry in artifact.entries() {
                if entry.polygon.contains(&point) {
                    ids.insert(entry.service_id.clone());
                }
            }
        }
        ids
    }

    #[must_use]
    pub fn polygon_count(&self) -> usize {
        self.artifacts
            .iter()
            .map(|artifact| artifact.entries().len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygon_count() == 0
    }
}
