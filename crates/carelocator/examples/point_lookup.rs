//! Find the services covering a location
//!
//! Resolves each command-line argument (postcode, outcode, or place name)
//! through postcodes.io and lists the services whose merged coverage
//! contains the resolved point. Expects artifacts built by the
//! `build_artifacts` example under `<DATA_DIR>/artifacts`.

use carelocator::ServiceLocator;
use carelocator::data_processing::{DATA_DIR, artifact_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    carelocator::init_logging(tracing::Level::INFO)?;

    let locator = ServiceLocator::builder()
        .registry_file(DATA_DIR.join("services.json"))?
        .artifact_dir(artifact_dir())?
        .build()?;

    let queries: Vec<String> = std::env::args().skip(1).collect();
    let queries = if queries.is_empty() {
        vec!["SW1A 1AA".to_string(), "Cardiff".to_string()]
    } else {
        queries
    };

    for query in queries {
        println!("Looking up '{query}'");
        match locator.services_for_input(&query).await {
            Ok(matched) => {
                println!(
                    "  Resolved to {} ({:.5}, {:.5})",
                    matched.location.label,
                    matched.location.coordinate.latitude,
                    matched.location.coordinate.longitude
                );
                if matched.services.is_empty() {
                    println!("  No services cover this point");
                }
                for service in &matched.services {
                    println!("  - {} [{}]", service.service_name, service.id);
                }
            }
            Err(err) => println!("  Lookup failed: {err}"),
        }
        println!();
    }

    Ok(())
}
