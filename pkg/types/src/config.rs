use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `podguard` configuration file (YAML).
///
/// Example `config.yaml`:
/// ```yaml
/// runtime-customizer-config:
///   podSecurityContext:
///     runAsUser: 10000
///     runAsNonRoot: true
///   containerSecurityContext:
///     capabilities:
///       drop: [ALL]
///   extraLabels:
///     team: data
/// log-format: json
/// output: yaml
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomizerConfigFile {
    /// Global customizer configuration, handed as-is to every customizer.
    #[serde(
        default,
        alias = "runtime-customizer-config",
        alias = "runtimeCustomizerConfig"
    )]
    pub runtime_customizer_config: Option<Map<String, Value>>,
    /// `text` or `json`
    #[serde(default, alias = "log-format")]
    pub log_format: Option<String>,
    /// `yaml` or `json`
    #[serde(default)]
    pub output: Option<String>,
}

/// Load a YAML config file, returning the default if the file doesn't exist.
pub fn load_config_file<T: serde::de::DeserializeOwned + Default>(path: &str) -> anyhow::Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path)),
    };
    let config: T =
        serde_yaml::from_str(&content).with_context(|| format!("failed to parse {}", path))?;
    Ok(config)
}
