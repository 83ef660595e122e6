//! Build-time boundary reconciliation pipeline for carelocator.
//!
//! This crate turns a registry of authored care services and a stack of
//! versioned UK administrative boundary datasets (ICB and CCG editions,
//! Scottish health boards, Welsh health boards, Welsh postcode-area outlines,
//! counties) into one flattened polygon artifact per service category. The
//! runtime crate loads those artifacts and answers point-in-polygon queries
//! against them.
//!
//! The pipeline is a single-pass synchronous batch job, expected to run once
//! per boundary data refresh:
//!
//! ```no_run
//! use carelocator_data_processing::{
//!     MergeConfig, MergeEngine, PriorityCatalog, ServiceRegistry,
//! };
//!
//! let registry = ServiceRegistry::from_file("data/services.json")?;
//! let catalog = PriorityCatalog::uk_default();
//! let engine = MergeEngine::load("data/boundaries", catalog)?;
//! let summary = engine.run(&registry, &MergeConfig::new("data/artifacts"))?;
//! println!("{}", summary.render());
//! # Ok::<(), carelocator_data_processing::DataError>(())
//! ```

use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::warn;

pub mod artifact;
pub mod boundary;
pub mod merge;
pub mod registry;
pub mod resolver;
pub mod test_data;

static TEST_DATA_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    tempfile::TempDir::new().expect("Failed to create global temporary test data directory")
});

pub const DATA_DIR_DEFAULT: &str = "./carelocator_data";

/// Centralized function to determine if we should use test data.
pub fn should_use_test_data() -> bool {
    cfg!(test) || cfg!(doctest)
}

/// Global data directory path that automatically determines the appropriate location.
///
/// Boundary GeoJSON sources live under `<DATA_DIR>/boundaries` and merged
/// artifacts under `<DATA_DIR>/artifacts`. Override with the `DATA_DIR`
/// environment variable.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if should_use_test_data() {
        let temp_dir = TEST_DATA_DIR.path().to_path_buf();
        warn!(temp_dir = ?temp_dir, "Using temporary data directory for tests");
        temp_dir
    } else {
        let dir = std::env::var("DATA_DIR").unwrap_or_else(|_| DATA_DIR_DEFAULT.to_string());
        PathBuf::from(dir)
    }
});

/// Default location of the boundary GeoJSON sources.
#[must_use]
pub fn boundary_dir() -> PathBuf {
    DATA_DIR.join("boundaries")
}

/// Default location of the merged per-category artifacts.
#[must_use]
pub fn artifact_dir() -> PathBuf {
    DATA_DIR.join("artifacts")
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("GeoJSON error: {0}")]
        GeoJson(#[from] geojson::Error),
        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
        #[cfg(feature = "download_data")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Malformed artifact '{path}': {detail}")]
        MalformedArtifact { path: String, detail: String },
        #[error(
            "Unexpected geometry type '{geometry_type}' for code '{code}' in dataset '{dataset}'"
        )]
        UnexpectedGeometry {
            dataset: String,
            code: String,
            geometry_type: String,
        },
        #[error("Unknown service category id: '{0}'")]
        UnknownCategory(String),
        #[error("Priority catalog names no dataset called '{0}' as the Wales aggregate")]
        WalesAggregateMissing(String),
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}

pub use error::{DataError, Result};

// Re-export main types
pub use artifact::{ServiceAreaArtifact, ServiceAreaPolygon};
pub use boundary::{
    BoundaryDataset, BoundaryFeature, BoundaryGeometry, DatasetSpec, PriorityCatalog, WalesPolicy,
};
pub use merge::{MergeConfig, MergeEngine, MergeSummary};
pub use registry::{Service, ServiceCategory, ServiceRegistry};
pub use resolver::{CodeResolver, Resolution, normalize_code};
