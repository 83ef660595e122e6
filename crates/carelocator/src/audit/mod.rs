//! Stored-code mismatch auditing.
//!
//! Each service carries the administrative codes it was registered under.
//! The auditor looks up the service's own postcode and compares the live
//! codes the geocoder reports against the stored set, recommending the
//! current code when they have drifted apart. Integrated care board (ICB)
//! codes are preferred over the clinical commissioning group (CCG) codes
//! they replaced. Scottish services are only flagged, never given an
//! automatic recommendation, because their health-board codes come from a
//! different scheme.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use carelocator_data_processing::{Service, ServiceRegistry, resolver::normalize_code};

use crate::geocode::Geocoder;

/// Pause between consecutive postcode lookups so a full-registry audit stays
/// under the geocoder's rate limit.
pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone)]
pub struct AuditConfig {
    throttle: Duration,
}

impl AuditConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            throttle: DEFAULT_THROTTLE,
        }
    }

    #[must_use]
    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Which code scheme a match was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeScheme {
    Icb,
    Ccg,
}

/// Outcome of auditing one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuditOutcome {
    /// A stored code matches a live code for the service's postcode.
    #[serde(rename_all = "camelCase")]
    Match {
        matched_code: String,
        scheme: CodeScheme,
    },
    /// No stored code matches; `recommended` is the live ICB when present,
    /// otherwise the live CCG.
    #[serde(rename_all = "camelCase")]
    Mismatch {
        live_ccg: Option<String>,
        live_icb: Option<String>,
        recommended: Option<String>,
    },
    /// Scottish service with no stored-code match. Flagged for manual
    /// review only.
    #[serde(rename_all = "camelCase")]
    ScotlandFlagged {
        live_ccg: Option<String>,
        live_icb: Option<String>,
    },
    /// The service could not be audited (lookup failure, missing postcode).
    Skipped { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAuditRecord {
    pub service_id: String,
    pub service_name: String,
    pub postcode: String,
    pub stored_codes: Vec<String>,
    pub country: Option<String>,
    pub outcome: AuditOutcome,
}

impl ServiceAuditRecord {
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self.outcome,
            AuditOutcome::Mismatch { .. } | AuditOutcome::ScotlandFlagged { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub total_services: usize,
    pub mismatches: usize,
    pub records: Vec<ServiceAuditRecord>,
}

impl AuditReport {
    pub fn write_json(&self, path: impl AsRef<std::path::Path>) -> std::io::Result<()> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)
    }
}

/// Audits every service's stored codes against live geocoder data.
pub struct CodeAuditor<'a> {
    geocoder: &'a dyn Geocoder,
    config: AuditConfig,
}

impl<'a> CodeAuditor<'a> {
    #[must_use]
    pub fn new(geocoder: &'a dyn Geocoder, config: AuditConfig) -> Self {
        Self { geocoder, config }
    }

    /// Audit one service. Never fails: lookup errors become a `Skipped`
    /// outcome so one bad postcode cannot abort a registry-wide run.
    #[instrument(name = "audit_service", skip_all, fields(service_id = %service.id), level = "debug")]
    pub async fn audit_service(&self, service: &Service) -> ServiceAuditRecord {
        let outcome = self.outcome_for(service).await;
        if matches!(outcome, AuditOutcome::Skipped { .. }) {
            warn!(service_id = %service.id, "Service skipped during audit");
        }
        ServiceAuditRecord {
            service_id: service.id.clone(),
            service_name: service.service_name.clone(),
            postcode: service.postcode.clone(),
            stored_codes: service.area_codes.clone(),
            country: service.country.clone(),
            outcome,
        }
    }

    async fn outcome_for(&self, service: &Service) -> AuditOutcome {
        if service.postcode.trim().is_empty() {
            return AuditOutcome::Skipped {
                reason: "service has no postcode".to_string(),
            };
        }

        let info = match self.geocoder.postcode_lookup(&service.postcode).await {
            Ok(info) => info,
            Err(err) => {
                return AuditOutcome::Skipped {
                    reason: err.to_string(),
                };
            }
        };

        let stored: Vec<String> = service
            .area_codes
            .iter()
            .map(|code| normalize_code(code))
            .collect();
        let live_icb = info.icb.clone();
        let live_ccg = info.ccg.clone();

        // ICB first: it is the scheme currently in use.
        if let Some(icb) = live_icb
            .as_ref()
            .filter(|icb| stored.contains(&normalize_code(icb)))
        {
            return AuditOutcome::Match {
                matched_code: icb.clone(),
                scheme: CodeScheme::Icb,
            };
        }
        if let Some(ccg) = live_ccg
            .as_ref()
            .filter(|ccg| stored.contains(&normalize_code(ccg)))
        {
            return AuditOutcome::Match {
                matched_code: ccg.clone(),
                scheme: CodeScheme::Ccg,
            };
        }

        let scotland = info.country.as_deref() == Some("Scotland");
        if scotland {
            return AuditOutcome::ScotlandFlagged { live_ccg, live_icb };
        }

        let recommended = live_icb.clone().or_else(|| live_ccg.clone());
        AuditOutcome::Mismatch {
            live_ccg,
            live_icb,
            recommended,
        }
    }

    /// Audit the whole registry, throttling between lookups.
    #[instrument(name = "audit_all", skip_all, level = "info")]
    pub async fn audit_all(&self, registry: &ServiceRegistry) -> AuditReport {
        let services = registry.services();
        let mut records = Vec::with_capacity(services.len());

        for (position, service) in services.iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(self.config.throttle).await;
            }
            records.push(self.audit_service(service).await);
        }

        let mismatches = records.iter().filter(|record| record.is_mismatch()).count();
        info!(
            total = records.len(),
            mismatches, "Code audit complete"
        );
        AuditReport {
            generated_at: Utc::now(),
            total_services: records.len(),
            mismatches,
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;

    use crate::geocode::{
        Coordinate, GeocodingError, OutcodeInfo, PlaceInfo, PostcodeInfo,
    };

    /// Canned postcode responses keyed by compact postcode.
    struct FakeGeocoder {
        responses: HashMap<String, PostcodeInfo>,
    }

    impl FakeGeocoder {
        fn new(responses: Vec<PostcodeInfo>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|info| (info.postcode.replace(' ', ""), info))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn postcode_lookup(
            &self,
            postcode: &str,
        ) -> Result<PostcodeInfo, GeocodingError> {
            self.responses
                .get(&postcode.replace(' ', ""))
                .cloned()
                .ok_or_else(|| GeocodingError::NotFound {
                    input: postcode.to_string(),
                    expected: "a full UK postcode".to_string(),
                })
        }

        async fn outcode_lookup(&self, outcode: &str) -> Result<OutcodeInfo, GeocodingError> {
            Err(GeocodingError::NotFound {
                input: outcode.to_string(),
                expected: "a UK outcode".to_string(),
            })
        }

        async fn place_lookup(&self, name: &str) -> Result<PlaceInfo, GeocodingError> {
            Err(GeocodingError::NotFound {
                input: name.to_string(),
                expected: "a known UK place name".to_string(),
            })
        }
    }

    fn postcode_info(
        postcode: &str,
        country: &str,
        ccg: Option<&str>,
        icb: Option<&str>,
    ) -> PostcodeInfo {
        PostcodeInfo {
            postcode: postcode.to_string(),
            coordinate: Coordinate::new(53.0, -2.0),
            country: Some(country.to_string()),
            admin_district: None,
            ccg: ccg.map(ToOwned::to_owned),
            icb: icb.map(ToOwned::to_owned),
        }
    }

    fn service(id: &str, postcode: &str, codes: &[&str]) -> Service {
        Service {
            id: id.to_string(),
            service_name: id.to_string(),
            postcode: postcode.to_string(),
            area_codes: codes.iter().map(|code| (*code).to_string()).collect(),
            categories: Vec::new(),
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

    #[tokio::test]
    async fn stored_icb_match_wins_over_scheme_drift() {
        let geocoder = FakeGeocoder::new(vec![postcode_info(
            "M13 9PL",
            "England",
            Some("E38000006"),
            Some("E54000048"),
        )]);
        let auditor = CodeAuditor::new(&geocoder, AuditConfig::new());

        let record = auditor
            .audit_service(&service("svc", "M13 9PL", &["e54000048"]))
            .await;

        match record.outcome {
            AuditOutcome::Match {
                matched_code,
                scheme,
            } => {
                assert_eq!(matched_code, "E54000048");
                assert_eq!(scheme, CodeScheme::Icb);
            }
            other => panic!("Expected a match, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatch_recommends_live_icb_over_ccg() {
        let geocoder = FakeGeocoder::new(vec![postcode_info(
            "OX3 9DU",
            "England",
            Some("E38000136"),
            Some("E54000025"),
        )]);
        let auditor = CodeAuditor::new(&geocoder, AuditConfig::new());

        let record = auditor
            .audit_service(&service("svc", "OX3 9DU", &["E38000999"]))
            .await;

        assert!(record.is_mismatch());
        match record.outcome {
            AuditOutcome::Mismatch { recommended, .. } => {
                assert_eq!(recommended.as_deref(), Some("E54000025"));
            }
            other => panic!("Expected a mismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn scottish_services_are_flagged_without_a_recommendation() {
        let geocoder = FakeGeocoder::new(vec![postcode_info(
            "KW15 1BH",
            "Scotland",
            Some("S03000026"),
            None,
        )]);
        let auditor = CodeAuditor::new(&geocoder, AuditConfig::new());

        let record = auditor
            .audit_service(&service("svc", "KW15 1BH", &["S08000026"]))
            .await;

        assert!(matches!(
            record.outcome,
            AuditOutcome::ScotlandFlagged { .. }
        ));
    }

    #[tokio::test]
    async fn lookup_failures_become_skipped_records() {
        let geocoder = FakeGeocoder::new(vec![]);
        let auditor = CodeAuditor::new(&geocoder, AuditConfig::new());

        let record = auditor
            .audit_service(&service("svc", "ZZ1 1ZZ", &["E54000048"]))
            .await;

        assert!(matches!(record.outcome, AuditOutcome::Skipped { .. }));
        assert!(!record.is_mismatch());
    }

    #[tokio::test]
    async fn report_counts_mismatches_across_the_registry() {
        let geocoder = FakeGeocoder::new(vec![
            postcode_info("M13 9PL", "England", None, Some("E54000048")),
            postcode_info("OX3 9DU", "England", None, Some("E54000025")),
        ]);
        let auditor = CodeAuditor::new(
            &geocoder,
            AuditConfig::new().with_throttle(Duration::from_millis(0)),
        );

        let registry = ServiceRegistry::new(vec![
            service("matching", "M13 9PL", &["E54000048"]),
            service("drifted", "OX3 9DU", &["E38000006"]),
        ]);
        let report = auditor.audit_all(&registry).await;

        assert_eq!(report.total_services, 2);
        assert_eq!(report.mismatches, 1);
    }
}
