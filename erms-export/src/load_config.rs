/// `load_config` module: loads a static YAML config file into the typed
/// CLI configuration.
///
/// This module is the only place where untrusted YAML is parsed and mapped
/// to typed structs. All errors use `anyhow::Error` for context-rich
/// diagnostics and are surfaced at the CLI boundary.
///
/// # Accepted YAML schema
///
/// ```yaml
/// export_root: ./export
/// ead_template: ./templates/ead-template.xml
/// mappings_dir: ./mappings
/// repository_snapshot: ./repository.json
/// ```
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    /// Directory receiving `metadata/ead.xml` and the mirrored `data/` tree.
    pub export_root: PathBuf,
    /// Path to the EAD template the finding aid is seeded from.
    pub ead_template: PathBuf,
    /// Directory holding mapping profiles as `<name>.xml`.
    pub mappings_dir: PathBuf,
    /// Path to the repository snapshot file served as the repository session.
    pub repository_snapshot: PathBuf,
}

/// Loads a static YAML config file. Returns a processable CLI config.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config)
}
