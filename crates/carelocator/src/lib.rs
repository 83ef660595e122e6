//! Point-in-polygon lookup of UK care services.
//!
//! The companion `carelocator-data-processing` crate reconciles service
//! registrations against administrative boundary datasets and writes one
//! merged polygon artifact per service category. This crate is the runtime
//! half: it loads those artifacts into a [`ContainmentIndex`], classifies
//! and geocodes free-text location input, and answers "which services cover
//! this point". A [`CodeAuditor`] is included for checking stored
//! administrative codes against live geocoder data.
//!
//! ```no_run
//! use carelocator::{ServiceLocator, Coordinate};
//!
//! # async fn run() -> carelocator::Result<()> {
//! let locator = ServiceLocator::builder()
//!     .registry_file("services.json")?
//!     .artifact_dir("./carelocator_data")?
//!     .build()?;
//!
//! let matched = locator.services_for_input("SW1A 1AA").await?;
//! for service in &matched.services {
//!     println!("{}", service.service_name);
//! }
//! # Ok(())
//! # }
//! ```

mod audit;
mod core;
pub mod error;
mod geocode;
mod index;
mod location;

pub use carelocator_data_processing as data_processing;
pub use carelocator_data_processing::{Service, ServiceCategory, ServiceRegistry};

pub use crate::{
    audit::{
        AuditConfig, AuditOutcome, AuditReport, CodeAuditor, CodeScheme, DEFAULT_THROTTLE,
        ServiceAuditRecord,
    },
    core::{LocationMatch, ServiceLocator, ServiceLocatorBuilder},
    error::{CarelocatorError, Result},
    geocode::{
        Coordinate, Geocoder, GeocodingError, OutcodeInfo, PlaceInfo, PostcodeInfo,
        PostcodesIoClient,
    },
    index::{ContainmentIndex, IndexError},
    location::{LocationQuery, ResolvedLocation, resolve as resolve_location},
};

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Install the global tracing subscriber. Safe to call more than once; only
/// the first call takes effect. The `RUST_LOG` environment variable
/// overrides `level` when set.
///
/// ```rust
/// use carelocator::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), carelocator::CarelocatorError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static ()> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
