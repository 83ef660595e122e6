//! Miniature boundary and registry fixtures.
//!
//! Everything here is built from unit squares on a synthetic plane so tests
//! can reason about containment exactly: the ICB squares sit along y=0..1
//! starting at the origin, the Welsh health boards at x=4 and x=6, and the
//! two-part island board out at x=10 and x=12.

use geo::{LineString, MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};

use crate::{
    boundary::{BoundaryDataset, BoundaryFeature, BoundaryGeometry, WalesPolicy},
    registry::{Service, ServiceCategory, ServiceRegistry},
    resolver::CodeResolver,
};

/// An axis-aligned square with its lower-left corner at `(x0, y0)`.
#[must_use]
pub fn square(x0: f64, y0: f64, size: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (x0, y0),
            (x0 + size, y0),
            (x0 + size, y0 + size),
            (x0, y0 + size),
            (x0, y0),
        ]),
        vec![],
    )
}

/// A dataset of single-polygon squares keyed `(code, x0, y0, size)`.
#[must_use]
pub fn dataset_from_squares(name: &str, squares: &[(&str, f64, f64, f64)]) -> BoundaryDataset {
    let features = squares
        .iter()
        .map(|&(code, x0, y0, size)| BoundaryFeature {
            code: code.to_string(),
            geometry: BoundaryGeometry::Polygon(square(x0, y0, size)),
        })
        .collect();
    BoundaryDataset::from_features(name, features)
}

/// Write a boundary GeoJSON file the way the ONS collections are shaped, so
/// `BoundaryDataset::load` is exercised end to end.
pub fn write_boundary_file(
    dir: &std::path::Path,
    file: &str,
    code_key: &str,
    features: &[(&str, Polygon<f64>)],
) {
    let features = features
        .iter()
        .map(|(code, polygon)| {
            let mut properties = JsonObject::new();
            properties.insert(
                code_key.to_string(),
                JsonValue::String((*code).to_string()),
            );
            Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(polygon))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    let collection = GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    });
    std::fs::write(
        dir.join(file),
        serde_json::to_string_pretty(&collection).expect("fixture serializes"),
    )
    .expect("fixture file writes");
}

/// The fixture Wales policy: CF/LL prefixes, `WALES` placeholder, aggregate
/// over the fixture health boards.
#[must_use]
pub fn wales_policy() -> WalesPolicy {
    WalesPolicy {
        postcode_area_prefixes: vec!["CF".to_string(), "LL".to_string()],
        whole_of_wales_code: "WALES".to_string(),
        aggregate_dataset: "Welsh Health Boards".to_string(),
    }
}

/// A resolver over four fixture datasets in priority order: ICBs, CCGs,
/// a two-part island health board, and the Welsh health boards.
#[must_use]
pub fn sample_resolver() -> CodeResolver {
    let icbs = dataset_from_squares(
        "ICBs 2023",
        &[("E54000048", 0.0, 0.0, 1.0), ("E54000050", 2.0, 0.0, 1.0)],
    );
    let ccgs = dataset_from_squares("CCGs April 2019", &[("E38000006", 2.0, 2.0, 1.0)]);
    let islands = BoundaryDataset::from_features(
        "Scottish Health Boards",
        vec![BoundaryFeature {
            code: "S08000026".to_string(),
            geometry: BoundaryGeometry::MultiPolygon(MultiPolygon(vec![
                square(10.0, 0.0, 1.0),
                square(12.0, 0.0, 1.0),
            ])),
        }],
    );
    let wales = dataset_from_squares(
        "Welsh Health Boards",
        &[("W11000028", 4.0, 0.0, 1.0), ("W11000029", 6.0, 0.0, 1.0)],
    );

    CodeResolver::new(vec![icbs, ccgs, islands, wales], wales_policy())
        .expect("fixture aggregate exists")
}

fn service(
    id: &str,
    name: &str,
    postcode: &str,
    codes: &[&str],
    categories: &[ServiceCategory],
) -> Service {
    Service {
        id: id.to_string(),
        service_name: name.to_string(),
        postcode: postcode.to_string(),
        area_codes: codes.iter().map(|code| (*code).to_string()).collect(),
        categories: categories.to_vec(),
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
    }
}

/// A registry exercising every merge path: a clean resolution, an unresolved
/// code, a case-variant duplicate, a multi-polygon board, the Welsh
/// postcode-area fallback, and a service with no resolvable codes at all.
#[must_use]
pub fn sample_registry() -> ServiceRegistry {
    ServiceRegistry::new(vec![
        service(
            "england-aac",
            "England AAC Hub",
            "M13 9PL",
            &["E54000048", "E00MISSING"],
            &[ServiceCategory::Aac],
        ),
        service(
            "england-ec",
            "England Environmental Controls",
            "OX3 9DU",
            &["E38000006", "e38000006"],
            &[ServiceCategory::Ec],
        ),
        service(
            "islands-wcs",
            "Island Wheelchair Service",
            "KW15 1BH",
            &["S08000026"],
            &[ServiceCategory::Wcs],
        ),
        service(
            "wales-wcs",
            "All Wales Posture and Mobility",
            "CF14 4XW",
            &["CF"],
            &[ServiceCategory::Wcs],
        ),
        service(
            "orphan-ec",
            "Orphaned Service",
            "ZZ1 1ZZ",
            &["E99000999"],
            &[ServiceCategory::Ec],
        ),
    ])
}
