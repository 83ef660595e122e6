//! Audit stored administrative codes against live data
//!
//! Looks up every registered service's own postcode on postcodes.io and
//! reports services whose stored codes no longer match the live ICB or CCG
//! for that postcode. Writes the full report to `audit-report.json`.

use carelocator::data_processing::DATA_DIR;
use carelocator::{AuditConfig, AuditOutcome, CodeAuditor, PostcodesIoClient, ServiceRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    carelocator::init_logging(tracing::Level::INFO)?;

    let registry = ServiceRegistry::from_file(DATA_DIR.join("services.json"))?;
    let client = PostcodesIoClient::new();
    let auditor = CodeAuditor::new(&client, AuditConfig::new());

    let report = auditor.audit_all(&registry).await;
    println!(
        "Audited {} services, {} need attention",
        report.total_services, report.mismatches
    );

    for record in &report.records {
        match &record.outcome {
            AuditOutcome::Mismatch { recommended, .. } => println!(
                "  {} ({}): stored {:?}, recommend {:?}",
                record.service_name, record.postcode, record.stored_codes, recommended
            ),
            AuditOutcome::ScotlandFlagged { .. } => println!(
                "  {} ({}): Scottish health-board codes, review manually",
                record.service_name, record.postcode
            ),
            AuditOutcome::Skipped { reason } => {
                println!("  {} skipped: {reason}", record.service_name);
            }
            AuditOutcome::Match { .. } => {}
        }
    }

    report.write_json("audit-report.json")?;
    println!("Full report written to audit-report.json");

    Ok(())
}
