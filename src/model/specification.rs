use std::{collections::HashMap, fmt::Display, path::Path};

use log::debug;
use toml::Value;

use crate::model::ParseError;

const REPO_KEY: &str = "repo";
const REF_KEY: &str = "ref";

/// Where a provider should fetch content from.
///
/// Only `repo` and `ref` are interpreted, any other key of the source mapping
/// is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Specification {
    /// Local path or remote URL of the repository.
    pub repo: String,
    /// Branch, tag or commit to check out after cloning.
    pub reference: Option<String>,
}

impl Specification {
    pub fn new(repo: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            repo: repo.into(),
            reference: reference.filter(|r| !r.is_empty()),
        }
    }

    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, ParseError> {
        let repo = map
            .get(REPO_KEY)
            .ok_or_else(|| ParseError::MissingKey(REPO_KEY.to_string()))?;
        Ok(Self::new(repo.clone(), map.get(REF_KEY).cloned()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ParseError> {
        debug!("Attempting to read specification from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(data: &str) -> Result<Self, ParseError> {
        let table = toml::from_str::<toml::Table>(data)?;

        let repo = match table.get(REPO_KEY) {
            Some(Value::String(repo)) => repo.clone(),
            Some(_) => return Err(ParseError::NotAString(REPO_KEY.to_string())),
            None => return Err(ParseError::MissingKey(REPO_KEY.to_string())),
        };
        let reference = match table.get(REF_KEY) {
            Some(Value::String(reference)) => Some(reference.clone()),
            Some(_) => return Err(ParseError::NotAString(REF_KEY.to_string())),
            None => None,
        };

        Ok(Self::new(repo, reference))
    }
}

impl Display for Specification {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{}@{}", self.repo, reference),
            None => f.write_str(&self.repo),
        }
    }
}
