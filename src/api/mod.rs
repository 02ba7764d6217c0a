use std::path::Path;

use anyhow::anyhow;
use log::info;

use crate::{
    fetch,
    model::Specification,
    provider::{ContentProvider, ProviderRegistry},
};

mod builder;

pub use builder::ContentfetchBuilder;

pub struct Contentfetch {
    registry: ProviderRegistry,
    yield_output: bool,
}

impl Contentfetch {
    pub fn builder() -> ContentfetchBuilder {
        ContentfetchBuilder::default()
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Registers a provider that is tried before the built-in ones.
    pub fn prepend_provider(&mut self, provider: Box<dyn ContentProvider>) {
        self.registry.prepend(provider);
    }

    /// Name of the provider that would handle `source`.
    pub fn detect(&self, source: &str, reference: Option<&str>) -> Option<&str> {
        self.registry
            .select(source, reference)
            .map(|provider| provider.name())
    }

    /// Fetches `specification` into `output_dir`, calling `on_line` with each
    /// progress message, and returns the identifier of the fetched content.
    pub fn fetch<F>(
        &self,
        specification: &Specification,
        output_dir: &Path,
        on_line: F,
    ) -> anyhow::Result<Option<String>>
    where
        F: FnMut(&str),
    {
        let provider = self
            .registry
            .select(&specification.repo, specification.reference.as_deref())
            .ok_or_else(|| anyhow!("No content provider recognizes {}", specification))?;

        info!(
            "Fetching {} with the {} provider",
            specification,
            provider.name()
        );
        let progress = provider.fetch(specification, output_dir, self.yield_output);
        fetch::drain(progress, on_line)?;

        Ok(provider.content_id(output_dir))
    }
}
