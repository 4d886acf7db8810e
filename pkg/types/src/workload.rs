use serde::{Deserialize, Serialize};

// --- Component type ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentType {
    #[default]
    Function,
    Source,
    Sink,
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentType::Function => write!(f, "function"),
            ComponentType::Source => write!(f, "source"),
            ComponentType::Sink => write!(f, "sink"),
        }
    }
}

impl std::str::FromStr for ComponentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "function" => Ok(ComponentType::Function),
            "source" => Ok(ComponentType::Source),
            "sink" => Ok(ComponentType::Sink),
            other => anyhow::bail!("unknown component type '{}'", other),
        }
    }
}

// --- Workload descriptor ---

/// Identity and configuration record for one function/connector instance.
///
/// Only `custom_runtime_options` feeds customization; the identity fields are
/// used for naming and logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDescriptor {
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub component_type: ComponentType,
    /// Opaque JSON document; may be absent, empty or malformed.
    #[serde(default)]
    pub custom_runtime_options: Option<String>,
}

impl WorkloadDescriptor {
    pub fn new(tenant: &str, namespace: &str, name: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_custom_runtime_options(mut self, options: impl Into<String>) -> Self {
        self.custom_runtime_options = Some(options.into());
        self
    }

    /// `tenant/namespace/name`
    pub fn fully_qualified_name(&self) -> String {
        format!("{}/{}/{}", self.tenant, self.namespace, self.name)
    }

    /// The custom options string, or `None` when it is missing or blank.
    pub fn runtime_options(&self) -> Option<&str> {
        self.custom_runtime_options
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}
