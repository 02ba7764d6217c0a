mod command;
mod progress;
mod provider;

pub use provider::{GitProvider, DEFAULT_GIT_EXECUTABLE};
