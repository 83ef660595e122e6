//! Classifying and resolving user-supplied location text.
//!
//! Raw input is classified by shape alone (full postcode, outcode, or place
//! name) before any network call, so the right geocoding endpoint is hit
//! exactly once per query.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::geocode::{Coordinate, Geocoder, GeocodingError, PostcodeInfo};

static POSTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z]{1,2}[0-9][A-Z0-9]?\s*[0-9][A-Z]{2}$").expect("postcode regex compiles")
});

static OUTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[A-Z]{1,2}[0-9][A-Z0-9]?$").expect("outcode regex compiles")
});

/// What a piece of raw location text looks like.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationQuery {
    /// A full UK postcode, e.g. `SW1A 1AA`.
    Postcode(String),
    /// An outward code only, e.g. `SW1A`.
    Outcode(String),
    /// Anything else is treated as a place name.
    Place(String),
}

impl LocationQuery {
    /// Classify trimmed input by shape. Postcodes and outcodes are
    /// upper-cased; place names keep their original casing.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let trimmed = raw.trim();
        if POSTCODE_RE.is_match(trimmed) {
            Self::Postcode(trimmed.to_uppercase())
        } else if OUTCODE_RE.is_match(trimmed) {
            Self::Outcode(trimmed.to_uppercase())
        } else {
            Self::Place(trimmed.to_string())
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Postcode(text) | Self::Outcode(text) | Self::Place(text) => text,
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Postcode(_) => "postcode",
            Self::Outcode(_) => "outcode",
            Self::Place(_) => "place",
        }
    }
}

impl std::fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.text(), self.kind())
    }
}

/// A location query resolved to a coordinate, with a human-readable label
/// for reporting back to the caller.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub query: LocationQuery,
    pub label: String,
    pub coordinate: Coordinate,
    /// Only present for full postcode lookups.
    pub postcode_info: Option<PostcodeInfo>,
}

/// Classify `raw` and resolve it through the geocoder.
#[instrument(name = "resolve_location", skip(geocoder), level = "debug")]
pub async fn resolve(
    geocoder: &dyn Geocoder,
    raw: &str,
) -> Result<ResolvedLocation, GeocodingError> {
    let query = LocationQuery::classify(raw);
    match &query {
        LocationQuery::Postcode(postcode) => {
            let info = geocoder.postcode_lookup(postcode).await?;
            Ok(ResolvedLocation {
                label: info.postcode.clone(),
                coordinate: info.coordinate,
                postcode_info: Some(info),
                query,
            })
        }
        LocationQuery::Outcode(outcode) => {
            let info = geocoder.outcode_lookup(outcode).await?;
            Ok(ResolvedLocation {
                label: info.outcode,
                coordinate: info.coordinate,
                postcode_info: None,
                query,
            })
        }
        LocationQuery::Place(name) => {
            let info = geocoder.place_lookup(name).await?;
            let label = match &info.county {
                Some(county) => format!("{}, {county}", info.name),
                None => info.name,
            };
            Ok(ResolvedLocation {
                label,
                coordinate: info.coordinate,
                postcode_info: None,
                query,
            })
        }
    }
}
