//! Merged per-category polygon artifacts.
//!
//! Each artifact is a GeoJSON feature collection in which every feature
//! carries exactly one property, the owning `serviceId`, and a plain
//! polygon geometry. Multi-part coverage is represented as several features
//! sharing the same service id, never as a multi-polygon, so runtime
//! containment checks stay uniform.

use std::path::Path;

use geo::Polygon;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use tracing::info;

use crate::{DataError, Result, registry::ServiceCategory};

pub const SERVICE_ID_PROPERTY: &str = "serviceId";

/// One flattened coverage polygon tagged with its owning service.
#[derive(Debug, Clone)]
pub struct ServiceAreaPolygon {
    pub service_id: String,
    pub polygon: Polygon<f64>,
}

/// The merged coverage polygons for one service category.
#[derive(Debug, Clone)]
pub struct ServiceAreaArtifact {
    category: ServiceCategory,
    entries: Vec<ServiceAreaPolygon>,
}

impl ServiceAreaArtifact {
    #[must_use]
    pub fn new(category: ServiceCategory, entries: Vec<ServiceAreaPolygon>) -> Self {
        Self { category, entries }
    }

    #[must_use]
    pub fn category(&self) -> ServiceCategory {
        self.category
    }

    #[must_use]
    pub fn entries(&self) -> &[ServiceAreaPolygon] {
        &self.entries
    }

    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .entries
            .iter()
            .map(|entry| {
                let mut properties = JsonObject::new();
                properties.insert(
                    SERVICE_ID_PROPERTY.to_string(),
                    JsonValue::String(entry.service_id.clone()),
                );
                Feature {
                    bbox: None,
                    geometry: Some(geojson::Geometry::new(geojson::Value::from(&entry.polygon))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let collection = GeoJson::FeatureCollection(self.to_feature_collection());
        std::fs::write(path, serde_json::to_string_pretty(&collection)?)?;
        info!(
            category = %self.category,
            polygons = self.entries.len(),
            path = ?path,
            "Wrote service area artifact"
        );
        Ok(())
    }

    /// Read an artifact back, enforcing the single-polygon invariant.
    pub fn read_from_file(category: ServiceCategory, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let collection = FeatureCollection::try_from(raw.parse::<GeoJson>()?)?;

        let mut entries = Vec::with_capacity(collection.features.len());
        for feature in collection.features {
            let service_id = feature
                .property(SERVICE_ID_PROPERTY)
                .and_then(|value| value.as_str())
                .map(ToOwned::to_owned)
                .ok_or_else(|| DataError::MalformedArtifact {
                    path: path.display().to_string(),
                    detail: format!("feature is missing the '{SERVICE_ID_PROPERTY}' property"),
                })?;

            let geometry = feature
                .geometry
                .ok_or_else(|| DataError::MalformedArtifact {
                    path: path.display().to_string(),
                    detail: format!("feature '{service_id}' has no geometry"),
                })?;

            match geometry.value {
                value @ geojson::Value::Polygon(_) => entries.push(ServiceAreaPolygon {
                    service_id,
                    polygon: value.try_into()?,
                }),
                other => {
                    return Err(DataError::UnexpectedGeometry {
                        dataset: path.display().to_string(),
                        code: service_id,
                        geometry_type: format!("{other:?}"),
                    });
                }
            }
        }

        Ok(Self::new(category, entries))
    }
}
