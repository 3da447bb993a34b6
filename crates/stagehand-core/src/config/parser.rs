//! TOML parser for stagehand.toml

use super::schema::StagehandConfig;
use anyhow::{Context, Result};
use std::path::Path;

/// Load stagehand.toml, resolving relative paths against its directory.
///
/// A missing file yields the default configuration rooted at the file's
/// directory.
pub fn load_config(path: &Path) -> Result<StagehandConfig> {
    let base = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        StagehandConfig::default()
    };

    config.resolve_paths(base);
    Ok(config)
}

/// Parse stagehand.toml content from string
pub fn parse_config_str(content: &str) -> Result<StagehandConfig> {
    let config: StagehandConfig =
        toml::from_str(content).map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))?;
    config.validate()?;
    Ok(config)
}

/// Serialize a configuration to TOML string
pub fn to_toml(config: &StagehandConfig) -> Result<String> {
    toml::to_string_pretty(config).with_context(|| "Failed to serialize configuration to TOML")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_valid_config() {
        let toml = r#"
spec = "pipeline.yaml"

[sources.app]
kind = "static"
versions = ["v1.0.0", "v1.1.0"]

[sources.api]
kind = "git-tags"
repository = "../api"
pattern = "v*"

[sources.db]
kind = "command"
command = ["sh", "-c", "echo v5.0.0"]
"#;

        let config = parse_config_str(toml).unwrap();
        assert_eq!(config.spec.to_str(), Some("pipeline.yaml"));
        assert_eq!(config.sources.len(), 3);
        assert!(matches!(
            &config.sources["app"],
            SourceConfig::Static { versions } if versions.len() == 2
        ));
        assert!(matches!(
            &config.sources["api"],
            SourceConfig::GitTags { pattern: Some(p), .. } if p == "v*"
        ));
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config_str("").unwrap();
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_parse_unknown_kind() {
        let toml = r#"
[sources.app]
kind = "ftp"
"#;
        assert!(parse_config_str(toml).is_err());
    }

    #[test]
    fn test_load_config_resolves_relative_paths() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "state = \"data/state.yaml\"").unwrap();

        let config = load_config(file.path()).unwrap();
        let dir = file.path().parent().unwrap();
        assert_eq!(config.state, dir.join("data/state.yaml"));
        assert_eq!(config.spec, dir.join("deploy.yaml"));
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = parse_config_str("[sources.app]\nkind = \"static\"\nversions = [\"1.0.0\"]\n").unwrap();
        let text = to_toml(&config).unwrap();
        assert_eq!(parse_config_str(&text).unwrap(), config);
    }
}
