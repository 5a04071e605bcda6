//! Codec configuration loading.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use swe_bindings::CodecConfig;
use tracing::info;

/// Load the codec configuration from `path` when given, from `SWE_*`
/// environment variables otherwise, and validate it.
pub fn load(path: Option<&Path>) -> Result<CodecConfig> {
    let config = match path {
        Some(path) => {
            info!(path = %path.display(), "Loading codec configuration file");
            CodecConfig::from_yaml_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => CodecConfig::from_env(),
    };

    config
        .validate()
        .map_err(|e| anyhow!("invalid codec configuration: {}", e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token_separator: \";\"\nmax_array_size: 64\npretty_json: true").unwrap();

        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.token_separator, ";");
        assert_eq!(config.max_array_size, 64);
        assert!(config.pretty_json);
        assert_eq!(config.block_separator, "\n");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token_separator: \",\"\nblock_separator: \",\"").unwrap();
        assert!(load(Some(file.path())).is_err());

        assert!(load(Some(Path::new("/nonexistent/swe.yaml"))).is_err());
    }
}
