pub mod cli;
pub mod config;
pub mod fetch;
pub mod flock;
pub mod git;
pub mod model;
pub mod provider;

mod api;

pub use api::{Contentfetch, ContentfetchBuilder};
pub use fetch::{FetchError, Progress};
pub use git::GitProvider;
pub use model::Specification;
pub use provider::{ContentProvider, ProviderRegistry};
