use std::{error::Error, path::Path};

use log::info;

use crate::{model::Specification, Contentfetch};

/// Handler to detect command
pub fn do_detect(
    contentfetch: &Contentfetch,
    source: &str,
    reference: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    match contentfetch.detect(source, reference) {
        Some(name) => {
            println!("{name}");
            Ok(())
        }
        None => Err(format!("No content provider recognizes {source}").into()),
    }
}

/// Handler to fetch command
pub fn do_fetch(
    contentfetch: &Contentfetch,
    specification: &Specification,
    output_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let content_id = contentfetch.fetch(specification, output_dir, |line| println!("{line}"))?;
    match content_id {
        Some(id) => info!("Fetched {} at {}", specification, id),
        None => info!("Fetched {}", specification),
    }
    Ok(())
}

/// Specification from a TOML file if given, otherwise from the arguments
pub fn build_specification(
    spec_file: Option<&Path>,
    source: Option<String>,
    reference: Option<String>,
) -> Result<Specification, Box<dyn Error>> {
    match (spec_file, source) {
        (Some(path), _) => Ok(Specification::from_file(path)?),
        (None, Some(source)) => Ok(Specification::new(source, reference)),
        (None, None) => Err("Either a source or --spec must be given".into()),
    }
}
