use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// One tracked competitor site as declared in `config/competitors.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorConfig {
    /// Bare host name, e.g. `"onwardticket.com"`. Used for review lookups.
    pub domain: String,
    /// Site root that candidate paths are appended to.
    pub base_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CompetitorsFile {
    pub competitors: Vec<CompetitorConfig>,
}

/// Load and validate the competitor list from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_competitors(path: &Path) -> Result<CompetitorsFile, ConfigError> {
    let content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::CompetitorsFileIo {
            path: path.display().to_string(),
            source: e,
        })?;

    parse_competitors(&content)
}

/// Parse and validate competitor YAML already in memory.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_competitors(content: &str) -> Result<CompetitorsFile, ConfigError> {
    let file: CompetitorsFile = serde_yaml::from_str(content)?;
    validate_competitors(&file)?;
    Ok(file)
}

fn validate_competitors(file: &CompetitorsFile) -> Result<(), ConfigError> {
    let mut seen_domains = HashSet::new();

    for competitor in &file.competitors {
        let domain = competitor.domain.trim();
        if domain.is_empty() {
            return Err(ConfigError::Validation(
                "competitor domain must be non-empty".to_string(),
            ));
        }

        if domain.contains('/') || domain.contains(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "competitor domain '{domain}' must be a bare host name"
            )));
        }

        if !(competitor.base_url.starts_with("https://")
            || competitor.base_url.starts_with("http://"))
        {
            return Err(ConfigError::Validation(format!(
                "competitor '{domain}' has base_url '{}'; expected an http(s) URL",
                competitor.base_url
            )));
        }

        if !seen_domains.insert(domain.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate competitor domain: '{domain}'"
            )));
        }
    }

    Ok(())
}
