use log::debug;

use super::ContentProvider;
use crate::git::GitProvider;

/// Providers in the order they are tried.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: Vec<Box<dyn ContentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the git provider, which accepts anything and
    /// therefore has to stay last.
    pub fn with_default_providers(git: GitProvider) -> Self {
        let mut registry = Self::new();
        registry.push(Box::new(git));
        registry
    }

    pub fn push(&mut self, provider: Box<dyn ContentProvider>) {
        self.providers.push(provider);
    }

    /// Registers a provider ahead of all the others.
    pub fn prepend(&mut self, provider: Box<dyn ContentProvider>) {
        self.providers.insert(0, provider);
    }

    pub fn select(&self, source: &str, reference: Option<&str>) -> Option<&dyn ContentProvider> {
        let provider = self
            .providers
            .iter()
            .map(|provider| provider.as_ref())
            .find(|provider| provider.detect(source, reference));
        match provider {
            Some(provider) => debug!("Using the {} provider for {}", provider.name(), source),
            None => debug!("No provider recognizes {}", source),
        }
        provider
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|provider| provider.name()).collect()
    }
}
