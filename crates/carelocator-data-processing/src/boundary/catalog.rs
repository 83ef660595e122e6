//! Declarative priority configuration for boundary sources.
//!
//! The dataset order encodes source preference: resolution always returns the
//! match from the earliest dataset containing a code. Newer and more specific
//! editions sit first, so an ICB 2023 outline beats a CCG 2015 one for the
//! same code. Changing the boundary stack means editing this catalog (or the
//! JSON file it can be loaded from), not the resolution logic.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Result;

/// One boundary source: where it lives and which property carries its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSpec {
    /// Human-readable dataset name, also used in logs and error messages.
    pub name: String,
    /// GeoJSON file name under the boundary data directory.
    pub file: String,
    /// Property key that holds the area code in each raw feature.
    pub code_key: String,
    /// Optional source URL for `download_data` refreshes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Country-specific fallback policy for Welsh coverage codes.
///
/// A service may be authored with a Welsh postcode-area prefix (or the
/// reserved whole-of-Wales placeholder) instead of a health-board code. When
/// no dataset resolves such a code, the service is treated as covering the
/// union of every feature in the aggregate dataset, a deliberate
/// over-approximation for country-wide Welsh services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalesPolicy {
    /// Postcode-area prefixes recognized as Welsh coverage codes.
    pub postcode_area_prefixes: Vec<String>,
    /// Reserved code meaning "covers the whole of Wales".
    pub whole_of_wales_code: String,
    /// Name of the dataset whose full feature set stands in for Wales.
    pub aggregate_dataset: String,
}

/// Ordered boundary-source configuration plus country fallback policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityCatalog {
    pub datasets: Vec<DatasetSpec>,
    pub wales: WalesPolicy,
}

impl PriorityCatalog {
    /// The production UK source stack.
    #[must_use]
    pub fn uk_default() -> Self {
        let dataset = |name: &str, file: &str, code_key: &str| DatasetSpec {
            name: name.to_string(),
            file: file.to_string(),
            code_key: code_key.to_string(),
            url: None,
        };

        let mut datasets = vec![
            dataset("ICBs 2023", "ICBs-2023.json", "ICB23CD"),
            dataset(
                "CCGs April 2021",
                "Clinical_Commissioning_Groups_(April_2021)_EN_BUC.json",
                "CCG21CD",
            ),
            dataset(
                "CCGs April 2020",
                "Clinical_Commissioning_Groups_(April_2020)_EN_BFC_V2.json",
                "ccg20cd",
            ),
            dataset(
                "CCGs April 2019",
                "Clinical_Commissioning_Groups_(April_2019).json",
                "ccg19cd",
            ),
            dataset(
                "CCGs April 2017",
                "Clinical_Commissioning_Groups_(April_2017)_Boundaries_(Version_4).json",
                "ccg17cd",
            ),
            dataset(
                "CCGs April 2016",
                "Clinical_Commissioning_Groups_(April_2016)_Boundaries.json",
                "ccg16cd",
            ),
            dataset(
                "CCGs July 2015",
                "Clinical_Commissioning_Groups_(July_2015)_Boundaries.json",
                "ccg15cd",
            ),
            dataset(
                "Scottish Health Boards",
                "health-boards-small.json",
                "HBCode",
            ),
            dataset("Welsh Health Boards", "welsh-health-boards.json", "lhb22cd"),
            dataset(
                "Welsh Postcode Areas",
                "welsh-postcode-areas.json",
                "postcode_area",
            ),
            dataset("Counties 2021", "counties-2021.json", "CTY21CD"),
        ];

        // The one source with a stable public query endpoint.
        datasets[5].url = Some(
            "https://ons-inspire.esriuk.com/arcgis/rest/services/Health_Boundaries/\
             Clinical_Commissioning_Groups_April_2016_Boundaries/MapServer/3/query\
             ?where=1%3D1&outFields=*&outSR=4326&f=geojson"
                .to_string(),
        );

        Self {
            datasets,
            wales: WalesPolicy {
                postcode_area_prefixes: ["CF", "LD", "LL", "NP", "SA", "SY"]
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                whole_of_wales_code: "WALES".to_string(),
                aggregate_dataset: "Welsh Health Boards".to_string(),
            },
        }
    }

    /// Load a catalog from a JSON file, for deployments that version their
    /// boundary stack outside the binary.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn dataset(&self, name: &str) -> Option<&DatasetSpec> {
        self.datasets.iter().find(|spec| spec.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uk_default_orders_icb_before_all_ccg_editions() {
        let catalog = PriorityCatalog::uk_default();
        assert_eq!(catalog.datasets[0].name, "ICBs 2023");
        let ccg_positions: Vec<_> = catalog
            .datasets
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.name.starts_with("CCGs"))
            .map(|(position, _)| position)
            .collect();
        assert!(ccg_positions.iter().all(|&position| position > 0));
        // Editions are newest-first.
        assert!(ccg_positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn uk_default_names_an_existing_wales_aggregate() {
        let catalog = PriorityCatalog::uk_default();
        assert!(catalog.dataset(&catalog.wales.aggregate_dataset).is_some());
    }

    #[test]
    fn catalog_round_trips_through_json() {
        let catalog = PriorityCatalog::uk_default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, serde_json::to_string_pretty(&catalog).unwrap()).unwrap();

        let reloaded = PriorityCatalog::from_file(&path).unwrap();
        assert_eq!(reloaded.datasets.len(), catalog.datasets.len());
        assert_eq!(
            reloaded.wales.whole_of_wales_code,
            catalog.wales.whole_of_wales_code
        );
        assert_eq!(reloaded.datasets[0].code_key, "ICB23CD");
    }
}
