use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::manifest::{ResourceRequirements, Toleration};
use crate::options::RuntimeOptions;

/// Non-security runtime options: naming, labels, annotations, placement and
/// resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicRuntimeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_annotations: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector_labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<ResourceRequirements>,
}

/// Union of two maps; entries of `over` win on key clash.
fn merge_maps(
    over: &Option<BTreeMap<String, String>>,
    base: &Option<BTreeMap<String, String>>,
) -> Option<BTreeMap<String, String>> {
    match (over, base) {
        (None, None) => None,
        _ => {
            let mut merged = base.clone().unwrap_or_default();
            merged.extend(over.clone().unwrap_or_default());
            Some(merged)
        }
    }
}

impl RuntimeOptions for BasicRuntimeOptions {
    const KIND: &'static str = "basic";

    fn merge(&self, workload: &Self) -> Self {
        let tolerations = match (&self.tolerations, &workload.tolerations) {
            (None, None) => None,
            (global, local) => Some(
                global
                    .iter()
                    .flatten()
                    .chain(local.iter().flatten())
                    .cloned()
                    .collect(),
            ),
        };

        Self {
            job_namespace: workload.job_namespace.clone().or(self.job_namespace.clone()),
            job_name: workload.job_name.clone().or(self.job_name.clone()),
            extra_labels: merge_maps(&workload.extra_labels, &self.extra_labels),
            extra_annotations: merge_maps(&workload.extra_annotations, &self.extra_annotations),
            node_selector_labels: merge_maps(&workload.node_selector_labels, &self.node_selector_labels),
            tolerations,
            resource_requirements: workload
                .resource_requirements
                .clone()
                .or(self.resource_requirements.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Quantity, TaintEffect, TolerationOperator};

    #[test]
    fn test_maps_are_unioned_workload_wins() {
        let global = BasicRuntimeOptions::from_json(
            r#"{"extraLabels": {"team": "data", "tier": "gold"}, "nodeSelectorLabels": {"pool": "functions"}}"#,
        )
        .unwrap();
        let workload =
            BasicRuntimeOptions::from_json(r#"{"extraLabels": {"tier": "silver", "app": "enrich"}}"#)
                .unwrap();

        let merged = global.merge(&workload);
        let labels = merged.extra_labels.unwrap();
        assert_eq!(labels["team"], "data");
        assert_eq!(labels["tier"], "silver");
        assert_eq!(labels["app"], "enrich");
        assert_eq!(merged.node_selector_labels.unwrap()["pool"], "functions");
        assert_eq!(merged.extra_annotations, None);
    }

    #[test]
    fn test_tolerations_are_concatenated() {
        let global = BasicRuntimeOptions::from_json(
            r#"{"tolerations": [{"key": "dedicated", "operator": "Equal", "value": "pulsar", "effect": "NoSchedule"}]}"#,
        )
        .unwrap();
        let workload = BasicRuntimeOptions::from_json(
            r#"{"tolerations": [{"key": "spot", "operator": "Exists", "effect": "NoExecute", "tolerationSeconds": 30}]}"#,
        )
        .unwrap();

        let tolerations = global.merge(&workload).tolerations.unwrap();
        assert_eq!(tolerations.len(), 2);
        assert_eq!(tolerations[0].key.as_deref(), Some("dedicated"));
        assert_eq!(tolerations[0].effect, Some(TaintEffect::NoSchedule));
        assert_eq!(tolerations[1].operator, Some(TolerationOperator::Exists));
        assert_eq!(tolerations[1].toleration_seconds, Some(30));
    }

    #[test]
    fn test_scalars_override() {
        let global = BasicRuntimeOptions::from_json(
            r#"{"jobNamespace": "functions", "jobName": "global", "resourceRequirements": {"requests": {"cpu": "1"}}}"#,
        )
        .unwrap();
        let workload = BasicRuntimeOptions::from_json(
            r#"{"jobName": "custom", "resourceRequirements": {"limits": {"memory": "1Gi"}}}"#,
        )
        .unwrap();

        let merged = global.merge(&workload);
        assert_eq!(merged.job_namespace.as_deref(), Some("functions"));
        assert_eq!(merged.job_name.as_deref(), Some("custom"));
        let res = merged.resource_requirements.unwrap();
        assert_eq!(res.requests, None);
        assert_eq!(res.limits.unwrap()["memory"], Quantity("1Gi".to_string()));
    }

    #[test]
    fn test_security_keys_are_ignored() {
        let opts =
            BasicRuntimeOptions::from_json(r#"{"podSecurityContext": {"runAsUser": 1}}"#).unwrap();
        assert_eq!(opts, BasicRuntimeOptions::default());
    }
}
