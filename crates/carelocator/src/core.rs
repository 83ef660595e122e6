//! The top-level facade tying registry, index and geocoder together.

use std::path::Path;

use tracing::{instrument, warn};

use carelocator_data_processing::{Service, ServiceCategory, ServiceRegistry};

use crate::{
    Result,
    geocode::{Coordinate, Geocoder, PostcodesIoClient},
    index::ContainmentIndex,
    location::{self, ResolvedLocation},
};

/// A resolved location together with the services covering it.
#[derive(Debug)]
pub struct LocationMatch {
    pub location: ResolvedLocation,
    pub services: Vec<Service>,
}

/// One-stop entry point: resolve free-text locations and answer "which
/// services cover this point".
pub struct ServiceLocator {
    registry: ServiceRegistry,
    index: ContainmentIndex,
    geocoder: Box<dyn Geocoder>,
}

impl ServiceLocator {
    #[must_use]
    pub fn builder() -> ServiceLocatorBuilder {
        ServiceLocatorBuilder::default()
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn index(&self) -> &ContainmentIndex {
        &self.index
    }

    /// Services whose coverage contains `coordinate`, hydrated from the
    /// registry. Ids present in an artifact but absent from the registry are
    /// logged and dropped.
    #[must_use]
    pub fn services_containing(&self, coordinate: Coordinate) -> Vec<&Service> {
        self.hydrate(self.index.services_containing(coordinate))
    }

    /// As [`services_containing`](Self::services_containing), limited to one
    /// category.
    #[must_use]
    pub fn services_containing_in(
        &self,
        category: ServiceCategory,
        coordinate: Coordinate,
    ) -> Vec<&Service> {
        self.hydrate(self.index.services_containing_in(category, coordinate))
    }

    fn hydrate(&self, ids: std::collections::BTreeSet<String>) -> Vec<&Service> {
        ids.iter()
            .filter_map(|id| {
                let service = self.registry.service(id);
                if service.is_none() {
                    warn!(service_id = %id, "Artifact references a service missing from the registry");
                }
                service
            })
            .collect()
    }

    /// Resolve raw location text through the geocoder, then look up the
    /// covering services.
    #[instrument(name = "services_for_input", skip(self), level = "info")]
    pub async fn services_for_input(&self, raw: &str) -> Result<LocationMatch> {
        let location = location::resolve(self.geocoder.as_ref(), raw).await?;
        let services = self
            .services_containing(location.coordinate)
            .into_iter()
            .cloned()
            .collect();
        Ok(LocationMatch { location, services })
    }
}

/// Builder over the three collaborators; the geocoder defaults to the live
/// postcodes.io client.
#[derive(Default)]
pub struct ServiceLocatorBuilder {
    registry: Option<ServiceRegistry>,
    index: Option<ContainmentIndex>,
    geocoder: Option<Box<dyn Geocoder>>,
}

impl ServiceLocatorBuilder {
    #[must_use]
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn registry_file(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.registry = Some(ServiceRegistry::from_file(path)?);
        Ok(self)
    }

    #[must_use]
    pub fn index(mut self, index: ContainmentIndex) -> Self {
        self.index = Some(index);
        self
    }

    /// Load the artifacts through the process-wide index cache; repeated
    /// builders share one load.
    pub fn artifact_dir(mut self, path: impl AsRef<Path>) -> Result<Self> {
        self.index = Some(ContainmentIndex::shared(path)?.clone());
        Ok(self)
    }

    #[must_use]
    pub fn geocoder(mut self, geocoder: Box<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn build(self) -> Result<ServiceLocator> {
        let registry = self
            .registry
            .ok_or_else(|| anyhow::anyhow!("a service registry is required"))?;
        let index = self
            .index
            .ok_or_else(|| anyhow::anyhow!("a containment index is required"))?;
        let geocoder = self
            .geocoder
            .unwrap_or_else(|| Box::new(PostcodesIoClient::new()));

        Ok(ServiceLocator {
            registry,
            index,
            geocoder,
        })
    }
}
