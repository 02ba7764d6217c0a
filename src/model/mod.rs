use thiserror::Error;

pub mod specification;

pub use specification::Specification;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading specification toml: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Missing key `{0}` while parsing specification")]
    MissingKey(String),
    #[error("Key `{0}` must be a string")]
    NotAString(String),
}
