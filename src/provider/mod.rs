use std::path::Path;

use crate::{fetch::Progress, model::Specification};

mod registry;

pub use registry::ProviderRegistry;

/// Materializes one class of content sources into a directory.
pub trait ContentProvider: Send + Sync {
    /// Short name used in logs and by the command line.
    fn name(&self) -> &str;

    /// Whether this provider recognizes `source`. Must not fail or touch the
    /// filesystem.
    fn detect(&self, source: &str, reference: Option<&str>) -> bool;

    /// Starts fetching `specification` into `output_dir`.
    ///
    /// Nothing happens until the returned sequence is consumed. With
    /// `yield_output` every line of tool output is reported, otherwise only a
    /// curated subset.
    fn fetch(
        &self,
        specification: &Specification,
        output_dir: &Path,
        yield_output: bool,
    ) -> Progress;

    /// Identifier of the content fetched into `output_dir`, if the provider
    /// can tell.
    fn content_id(&self, _output_dir: &Path) -> Option<String> {
        None
    }
}
