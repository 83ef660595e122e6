//! External geocoding collaborator.
//!
//! Three operations are consumed from the geocoding service: resolve a full
//! postcode to a coordinate and its live administrative codes, resolve an
//! outcode to its centroid, and resolve a free-text place name. Each
//! operation distinguishes "not found" from transport failure, and every
//! error names the offending input; a failed lookup is never silently
//! replaced with a default coordinate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use error::GeocodingError;
use error::Result;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum GeocodingError {
        #[error("'{input}' could not be found; expected {expected}")]
        NotFound { input: String, expected: String },
        #[error("Geocoding request for '{input}' timed out")]
        Timeout { input: String },
        #[error("Geocoding request for '{input}' failed: {source}")]
        Http {
            input: String,
            #[source]
            source: reqwest::Error,
        },
        #[error("Geocoding service returned status {status} for '{input}': {message}")]
        Api {
            input: String,
            status: u16,
            message: String,
        },
        #[error("Geocoding response for '{input}' was missing coordinates")]
        MalformedResponse { input: String },
    }

    pub type Result<T> = std::result::Result<T, GeocodingError>;
}

/// WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Convert to a geo point (x = longitude, y = latitude).
    #[must_use]
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.longitude, self.latitude)
    }
}

/// Result of a full-postcode lookup, including the live administrative codes
/// the mismatch auditor compares against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostcodeInfo {
    /// Canonical postcode as the geocoder spells it.
    pub postcode: String,
    pub coordinate: Coordinate,
    pub country: Option<String>,
    pub admin_district: Option<String>,
    pub ccg: Option<String>,
    pub icb: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcodeInfo {
    pub outcode: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceInfo {
    pub name: String,
    pub county: Option<String>,
    pub coordinate: Coordinate,
}

/// The geocoding operations this core consumes.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn postcode_lookup(&self, postcode: &str) -> Result<PostcodeInfo>;
    async fn outcode_lookup(&self, outcode: &str) -> Result<OutcodeInfo>;
    async fn place_lookup(&self, name: &str) -> Result<PlaceInfo>;
}

const EXPECTED_POSTCODE: &str = "a full UK postcode such as SW1A 1AA";
const EXPECTED_OUTCODE: &str = "a UK outcode such as SW1A";
const EXPECTED_PLACE: &str = "a known UK place name";

/// postcodes.io client.
#[derive(Debug, Clone)]
pub struct PostcodesIoClient {
    client: reqwest::Client,
    base_url: String,
}

/// postcodes.io wraps every response in `{ status, error?, result? }`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: u16,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    result: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct PostcodeResult {
    postcode: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    country: Option<String>,
    admin_district: Option<String>,
    #[serde(default)]
    codes: Option<PostcodeCodes>,
}

#[derive(Debug, Deserialize)]
struct PostcodeCodes {
    ccg: Option<String>,
    icb: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OutcodeResult {
    outcode: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    name_1: String,
    county_unitary: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl PostcodesIoClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.postcodes.io";
    const TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(Self::DEFAULT_BASE_URL)
    }

    /// Point the client at a different host (primarily for tests against a
    /// mock server).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .expect("reqwest client builds with static configuration");
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get<T>(
        &self,
        url: reqwest::Url,
        input: &str,
        expected: &str,
    ) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        debug!(%url, input, "Geocoding request");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| wrap_transport(err, input))?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|err| wrap_transport(err, input))?;

        match envelope.status {
            200 => envelope
                .result
                .ok_or_else(|| GeocodingError::MalformedResponse {
                    input: input.to_string(),
                }),
            404 => Err(GeocodingError::NotFound {
                input: input.to_string(),
                expected: expected.to_string(),
            }),
            status => Err(GeocodingError::Api {
                input: input.to_string(),
                status,
                message: envelope
                    .error
                    .unwrap_or_else(|| "unknown geocoding failure".to_string()),
            }),
        }
    }

    fn url(&self, path: &str, input: &str) -> Result<reqwest::Url> {
        reqwest::Url::parse(&format!("{}{path}", self.base_url)).map_err(|_| {
            GeocodingError::MalformedResponse {
                input: input.to_string(),
            }
        })
    }
}

impl Default for PostcodesIoClient {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_transport(err: reqwest::Error, input: &str) -> GeocodingError {
    if err.is_timeout() {
        GeocodingError::Timeout {
            input: input.to_string(),
        }
    } else {
        GeocodingError::Http {
            input: input.to_string(),
            source: err,
        }
    }
}

fn coordinate(latitude: Option<f64>, longitude: Option<f64>, input: &str) -> Result<Coordinate> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(Coordinate::new(latitude, longitude)),
        _ => Err(GeocodingError::MalformedResponse {
            input: input.to_string(),
        }),
    }
}

#[async_trait]
impl Geocoder for PostcodesIoClient {
    async fn postcode_lookup(&self, postcode: &str) -> Result<PostcodeInfo> {
        // postcodes.io accepts postcodes without the internal space, which
        // keeps the path free of characters needing escapes.
        let compact: String = postcode.split_whitespace().collect();
        let url = self.url(&format!("/postcodes/{compact}"), postcode)?;
        let result: PostcodeResult = self.get(url, postcode, EXPECTED_POSTCODE).await?;

        let coordinate = coordinate(result.latitude, result.longitude, postcode)?;
        let codes = result.codes.unwrap_or(PostcodeCodes {
            ccg: None,
            icb: None,
        });
        Ok(PostcodeInfo {
            postcode: result.postcode,
            coordinate,
            country: result.country,
            admin_district: result.admin_district,
            ccg: codes.ccg,
            icb: codes.icb,
        })
    }

    async fn outcode_lookup(&self, outcode: &str) -> Result<OutcodeInfo> {
        let compact: String = outcode.split_whitespace().collect();
        let url = self.url(&format!("/outcodes/{compact}"), outcode)?;
        let result: OutcodeResult = self.get(url, outcode, EXPECTED_OUTCODE).await?;

        let coordinate = coordinate(result.latitude, result.longitude, outcode)?;
        Ok(OutcodeInfo {
            outcode: result.outcode,
            coordinate,
        })
    }

    async fn place_lookup(&self, name: &str) -> Result<PlaceInfo> {
        let mut url = self.url("/places", name)?;
        url.query_pairs_mut()
            .append_pair("q", name)
            .append_pair("limit", "1");
        let results: Vec<PlaceResult> = self.get(url, name, EXPECTED_PLACE).await?;

        let Some(first) = results.into_iter().next() else {
            return Err(GeocodingError::NotFound {
                input: name.to_string(),
                expected: EXPECTED_PLACE.to_string(),
            });
        };

        let coordinate = coordinate(first.latitude, first.longitude, name)?;
        Ok(PlaceInfo {
            name: first.name_1,
            county: first.county_unitary,
            coordinate,
        })
    }
}
