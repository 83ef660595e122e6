//! Authored service records.
//!
//! Services are created and edited by an external authoring process; this
//! crate only ever reads them. The on-disk shape is the authored
//! `services.json` document: `{ "services": [ ... ] }` with camelCase keys.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{DataError, Result};

/// Fixed vocabulary of service categories.
///
/// Each category gets its own merged polygon artifact; the ids double as the
/// authored tag values and the artifact file-name stems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    /// Augmentative and alternative communication services.
    Aac,
    /// Environmental control services.
    Ec,
    /// Wheelchair services.
    Wcs,
}

impl ServiceCategory {
    pub const ALL: [Self; 3] = [Self::Aac, Self::Ec, Self::Wcs];

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Ec => "ec",
            Self::Wcs => "wcs",
        }
    }

    /// File name of the merged artifact for this category.
    #[must_use]
    pub fn artifact_file_name(self) -> String {
        format!("{}-services-geo.geojson", self.id())
    }

    pub fn from_id(id: &str) -> Result<Self> {
        match id.trim().to_lowercase().as_str() {
            "aac" => Ok(Self::Aac),
            "ec" => Ok(Self::Ec),
            "wcs" => Ok(Self::Wcs),
            other => Err(DataError::UnknownCategory(other.to_string())),
        }
    }
}

impl std::fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A single registered care service.
///
/// `area_codes` is ordered as authored and not guaranteed unique; duplicates
/// are a data-quality anomaly the merge engine reports, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: String,
    pub service_name: String,
    #[serde(default)]
    pub postcode: String,
    /// Administrative area codes the service covers (CCG, ICB, Health Board,
    /// Welsh postcode-area or county codes, matched case-insensitively).
    #[serde(rename = "ccgCodes", default)]
    pub area_codes: Vec<String>,
    #[serde(rename = "servicesOffered", default)]
    pub categories: Vec<ServiceCategory>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address_lines: Vec<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub caseload: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub service_color: Option<String>,
    #[serde(default)]
    pub communication_matters: Option<String>,
}

impl Service {
    #[must_use]
    pub fn offers(&self, category: ServiceCategory) -> bool {
        self.categories.contains(&category)
    }
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    services: Vec<Service>,
}

/// Read-only view over the authored service registry.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    /// Load the registry from an authored `services.json` document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let document: RegistryDocument = serde_json::from_str(&raw)?;
        info!(path = ?path, services = document.services.len(), "Loaded service registry");
        Ok(Self::new(document.services))
    }

    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.id == id)
    }

    /// Services offering the given category, in registry order.
    pub fn services_in_category(&self, category: ServiceCategory) -> Vec<&Service> {
        self.services
            .iter()
            .filter(|service| service.offers(category))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_json() -> &'static str {
        r#"{
            "services": [
                {
                    "id": "service-one",
                    "serviceName": "North West AAC Hub",
                    "postcode": "M13 9PL",
                    "ccgCodes": ["E38000006", "E38000187"],
                    "servicesOffered": ["aac", "ec"],
                    "country": "England",
                    "addressLines": ["1 Hospital Road", "Manchester"]
                },
                {
                    "id": "service-two",
                    "serviceName": "South Wales Wheelchair Service",
                    "postcode": "CF14 4XW",
                    "ccgCodes": ["W11000029"],
                    "servicesOffered": ["wcs"]
                }
            ]
        }"#
    }

    #[test]
    fn parses_authored_document() {
        let document: RegistryDocument = serde_json::from_str(registry_json()).unwrap();
        let registry = ServiceRegistry::new(document.services);

        assert_eq!(registry.len(), 2);
        let first = registry.service("service-one").unwrap();
        assert_eq!(first.service_name, "North West AAC Hub");
        assert_eq!(first.area_codes, vec!["E38000006", "E38000187"]);
        assert_eq!(
            first.categories,
            vec![ServiceCategory::Aac, ServiceCategory::Ec]
        );
        assert_eq!(first.country.as_deref(), Some("England"));
    }

    #[test]
    fn filters_by_category() {
        let document: RegistryDocument = serde_json::from_str(registry_json()).unwrap();
        let registry = ServiceRegistry::new(document.services);

        let wheelchair = registry.services_in_category(ServiceCategory::Wcs);
        assert_eq!(wheelchair.len(), 1);
        assert_eq!(wheelchair[0].id, "service-two");

        let aac = registry.services_in_category(ServiceCategory::Aac);
        assert_eq!(aac.len(), 1);
        assert_eq!(aac[0].id, "service-one");
    }

    #[test]
    fn category_ids_round_trip() {
        for category in ServiceCategory::ALL {
            assert_eq!(ServiceCategory::from_id(category.id()).unwrap(), category);
        }
        assert!(ServiceCategory::from_id("physio").is_err());
    }

    #[test]
    fn artifact_file_names_follow_category_ids() {
        assert_eq!(
            ServiceCategory::Aac.artifact_file_name(),
            "aac-services-geo.geojson"
        );
        assert_eq!(
            ServiceCategory::Wcs.artifact_file_name(),
            "wcs-services-geo.geojson"
        );
    }
}
