//! Manifest customizers for function and connector workloads.
//!
//! A customizer receives the `StatefulSet` generated for one workload and
//! returns it with extra fields applied. Customizers never fail: bad
//! configuration is logged and skipped so workload creation always proceeds.

pub mod basic;
pub mod security;

pub use basic::BasicCustomizer;
pub use security::SecurityCustomizer;

use pkg_types::manifest::StatefulSet;
use pkg_types::options::RuntimeOptions;
use pkg_types::workload::WorkloadDescriptor;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// String-keyed configuration handed to customizers at initialization.
pub type CustomizerConfig = Map<String, Value>;

pub trait ManifestCustomizer: Send + Sync {
    /// Namespace the workload's resources are created in.
    fn customize_namespace(&self, _workload: &WorkloadDescriptor, current: &str) -> String {
        current.to_string()
    }

    /// Name of the workload's `StatefulSet`.
    fn customize_name(&self, _workload: &WorkloadDescriptor, current: &str) -> String {
        current.to_string()
    }

    fn customize_stateful_set(
        &self,
        workload: &WorkloadDescriptor,
        stateful_set: StatefulSet,
    ) -> StatefulSet;
}

/// Customizer that changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCustomizer;

impl ManifestCustomizer for NoopCustomizer {
    fn customize_stateful_set(
        &self,
        _workload: &WorkloadDescriptor,
        stateful_set: StatefulSet,
    ) -> StatefulSet {
        stateful_set
    }
}

/// Parse the process-wide options once. Falls back to the empty document on
/// a parse failure.
pub(crate) fn global_options<T: RuntimeOptions>(config: Option<&CustomizerConfig>) -> T {
    let Some(config) = config.filter(|c| !c.is_empty()) else {
        return T::default();
    };
    match T::from_config_map(config) {
        Ok(opts) => {
            info!("Initialized {} customizer with global options", T::KIND);
            opts
        }
        Err(e) => {
            warn!("Failed to parse global {} options: {:#}", T::KIND, e);
            T::default()
        }
    }
}

/// Parse the per-workload options from the descriptor. Falls back to the
/// empty document on a parse failure.
pub(crate) fn workload_options<T: RuntimeOptions>(workload: &WorkloadDescriptor) -> T {
    let Some(json) = workload.runtime_options() else {
        return T::default();
    };
    T::from_json(json).unwrap_or_else(|e| {
        warn!(
            "Failed to parse {} options for {}: {:#}",
            T::KIND,
            workload.fully_qualified_name(),
            e
        );
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::security::SecurityRuntimeOptions;
    use serde_json::json;

    #[test]
    fn test_global_options_fall_back_on_bad_config() {
        let Value::Object(config) = json!({ "podSecurityContext": { "runAsUser": "root" } }) else {
            unreachable!()
        };
        let opts: SecurityRuntimeOptions = global_options(Some(&config));
        assert_eq!(opts, SecurityRuntimeOptions::default());

        let opts: SecurityRuntimeOptions = global_options(None);
        assert_eq!(opts, SecurityRuntimeOptions::default());
    }

    #[test]
    fn test_workload_options_fall_back_on_truncated_json() {
        let workload = WorkloadDescriptor::new("public", "default", "f")
            .with_custom_runtime_options(r#"{"podSecurityContext": {"runAsUser": 10"#);
        let opts: SecurityRuntimeOptions = workload_options(&workload);
        assert_eq!(opts, SecurityRuntimeOptions::default());
    }

    #[test]
    fn test_noop_customizer_returns_input() {
        let sts = StatefulSet::default();
        let workload = WorkloadDescriptor::new("t", "n", "f");
        assert_eq!(NoopCustomizer.customize_stateful_set(&workload, sts.clone()), sts);
        assert_eq!(NoopCustomizer.customize_name(&workload, "pf-f"), "pf-f");
    }
}
