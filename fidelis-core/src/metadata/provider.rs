use tracing::{debug, instrument, warn};

use super::models::Metadata;
use crate::error::Result;
use crate::registration::{MetadataIdentifier, RegistrationResult};

/// A source of authenticator metadata.
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when this source has nothing for `identifier`.
    fn lookup(&self, identifier: &MetadataIdentifier) -> Result<Option<Metadata>>;

    fn get_metadata(&self, registration: &RegistrationResult) -> Result<Option<Metadata>> {
        match registration.identifier()? {
            Some(identifier) => self.lookup(&identifier),
            None => Ok(None),
        }
    }
}

/// Tries providers in order. A failing provider is logged and skipped.
#[derive(Default)]
pub struct MetadataResolver {
    providers: Vec<Box<dyn MetadataProvider>>,
}

impl MetadataResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&mut self, provider: Box<dyn MetadataProvider>) {
        self.providers.push(provider);
    }

    pub fn with_provider(mut self, provider: Box<dyn MetadataProvider>) -> Self {
        self.add_provider(provider);
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// First metadata found for the registration, or `None`.
    #[instrument(level = "debug", skip_all, fields(format = %registration.format))]
    pub fn get_metadata(&self, registration: &RegistrationResult) -> Option<Metadata> {
        self.first_match(|provider| provider.get_metadata(registration))
    }

    #[instrument(level = "debug", skip_all, fields(identifier = %identifier))]
    pub fn get_metadata_for(&self, identifier: &MetadataIdentifier) -> Option<Metadata> {
        self.first_match(|provider| provider.lookup(identifier))
    }

    fn first_match<F>(&self, mut lookup: F) -> Option<Metadata>
    where
        F: FnMut(&dyn MetadataProvider) -> Result<Option<Metadata>>,
    {
        for provider in &self.providers {
            match lookup(provider.as_ref()) {
                Ok(Some(metadata)) => {
                    debug!(provider = provider.name(), description = %metadata.description, "Metadata found");
                    return Some(metadata);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Metadata provider failed, skipping");
                }
            }
        }
        debug!("No metadata available");
        None
    }
}
