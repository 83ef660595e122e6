//! Boundary dataset adapters.
//!
//! Every boundary source, whatever its edition, country or property-key
//! naming, is exposed uniformly as a list of (area code, polygon or
//! multi-polygon) pairs. Which property holds the area code is static
//! configuration declared in the [`catalog`], never inferred from the data.
//!
//! A missing or unparsable source file is not fatal: the adapter logs the
//! condition and yields an empty dataset so priority resolution falls through
//! to later sources. A feature whose geometry is neither a polygon nor a
//! multi-polygon *is* fatal: it means the source is malformed beyond the
//! shapes this pipeline knows how to index.

pub mod catalog;
#[cfg(feature = "download_data")]
pub mod fetch;

pub use catalog::{DatasetSpec, PriorityCatalog, WalesPolicy};

use std::path::Path;

use geo::{MultiPolygon, Polygon};
use geojson::{FeatureCollection, GeoJson};
use tracing::{debug, info, warn};

use crate::{DataError, Result, resolver::normalize_code};

/// Geometry of a single boundary feature, WGS84 degrees.
#[derive(Debug, Clone)]
pub enum BoundaryGeometry {
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl BoundaryGeometry {
    /// Flatten into individual polygons, expanding multi-polygons.
    #[must_use]
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        match self {
            Self::Polygon(polygon) => vec![polygon.clone()],
            Self::MultiPolygon(multi) => multi.0.clone(),
        }
    }

    #[must_use]
    pub fn polygon_count(&self) -> usize {
        match self {
            Self::Polygon(_) => 1,
            Self::MultiPolygon(multi) => multi.0.len(),
        }
    }
}

/// One area within a boundary dataset: an administrative code and its outline.
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    /// Area code exactly as it appears in the source; matching is always
    /// case- and whitespace-insensitive.
    pub code: String,
    pub geometry: BoundaryGeometry,
}

/// A named boundary collection loaded from a GeoJSON feature collection.
///
/// Immutable once loaded; loaded once per build run.
#[derive(Debug, Clone)]
pub struct BoundaryDataset {
    name: String,
    features: Vec<BoundaryFeature>,
}

impl BoundaryDataset {
    /// Load a dataset from `<data_dir>/<spec.file>`.
    pub fn load(data_dir: impl AsRef<Path>, spec: &DatasetSpec) -> Result<Self> {
        let path = data_dir.as_ref().join(&spec.file);

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(
                    dataset = %spec.name,
                    path = ?path,
                    error = %err,
                    "Boundary source missing, treating as empty dataset"
                );
                return Ok(Self::empty(&spec.name));
            }
        };

        let geojson = match raw.parse::<GeoJson>() {
            Ok(geojson) => geojson,
            Err(err) => {
                warn!(
                    dataset = %spec.name,
                    path = ?path,
                    error = %err,
                    "Boundary source is not valid GeoJSON, treating as empty dataset"
                );
                return Ok(Self::empty(&spec.name));
            }
        };

        let collection = match FeatureCollection::try_from(geojson) {
            Ok(collection) => collection,
            Err(err) => {
                warn!(
                    dataset = %spec.name,
                    path = ?path,
                    error = %err,
                    "Boundary source is not a feature collection, treating as empty dataset"
                );
                return Ok(Self::empty(&spec.name));
            }
        };

        let mut features = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let Some(code) = feature
                .property(&spec.code_key)
                .and_then(|value| value.as_str())
                .map(ToOwned::to_owned)
            else {
                warn!(
                    dataset = %spec.name,
                    code_key = %spec.code_key,
                    "Feature has no area code under the configured key, skipping"
                );
                continue;
            };

            let Some(geometry) = feature.geometry else {
                warn!(dataset = %spec.name, code = %code, "Feature has no geometry, skipping");
                continue;
            };

            let geometry = convert_geometry(&spec.name, &code, geometry)?;
            features.push(BoundaryFeature { code, geometry });
        }

        info!(
            dataset = %spec.name,
            features = features.len(),
            "Loaded boundary dataset"
        );
        Ok(Self {
            name: spec.name.clone(),
            features,
        })
    }

    /// Build a dataset from already-materialized features. Used by tests and
    /// by callers that source boundaries from somewhere other than disk.
    #[must_use]
    pub fn from_features(name: impl Into<String>, features: Vec<BoundaryFeature>) -> Self {
        Self {
            name: name.into(),
            features,
        }
    }

    fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            features: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn features(&self) -> &[BoundaryFeature] {
        &self.features
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Case/whitespace-insensitive lookup of an already-normalized code.
    pub(crate) fn find_normalized(&self, normalized_code: &str) -> Option<&BoundaryFeature> {
        let found = self
            .features
            .iter()
            .find(|feature| normalize_code(&feature.code) == normalized_code);
        if found.is_some() {
            debug!(dataset = %self.name, code = %normalized_code, "Code resolved");
        }
        found
    }
}

fn convert_geometry(
    dataset: &str,
    code: &str,
    geometry: geojson::Geometry,
) -> Result<BoundaryGeometry> {
    match geometry.value {
        value @ geojson::Value::Polygon(_) => Ok(BoundaryGeometry::Polygon(value.try_into()?)),
        value @ geojson::Value::MultiPolygon(_) => {
            Ok(BoundaryGeometry::MultiPolygon(value.try_into()?))
        }
        other => Err(DataError::UnexpectedGeometry {
            dataset: dataset.to_string(),
            code: code.to_string(),
            geometry_type: geometry_type_name(&other).to_string(),
        }),
    }
}

fn geometry_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}
