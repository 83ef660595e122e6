//! Build the per-category coverage artifacts
//!
//! This example runs the full build-time pipeline: load the boundary stack
//! named by the default UK catalog, resolve every service's area codes, and
//! write one merged GeoJSON artifact per service category. Reads boundary
//! GeoJSON from `<DATA_DIR>/boundaries` and the registry from
//! `<DATA_DIR>/services.json`; artifacts land in `<DATA_DIR>/artifacts`.

use carelocator::data_processing::{
    DATA_DIR, MergeConfig, MergeEngine, PriorityCatalog, ServiceRegistry,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    carelocator::init_logging(tracing::Level::INFO)?;

    let registry = ServiceRegistry::from_file(DATA_DIR.join("services.json"))?;
    println!("Loaded {} services", registry.services().len());

    let engine = MergeEngine::load_default(PriorityCatalog::uk_default())?;

    let summary = engine.run(&registry, &MergeConfig::default())?;
    println!("{}", summary.render());

    if summary.has_data_quality_issues() {
        println!("\nData quality issues found, review the warnings above.");
    }

    Ok(())
}
