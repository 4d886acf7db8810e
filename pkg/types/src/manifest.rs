use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields the model does not know about, kept so a manifest survives a
/// read/customize/write cycle unchanged.
pub type Extra = BTreeMap<String, Value>;

// --- Metadata ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Extra,
}

// --- Resource requirements ---

/// Kubernetes quantity string, e.g. `500m` or `1Gi`.
/// Bare numbers (`cpu: 1`) are accepted and kept in their string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Quantity(pub String);

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
            Float(f64),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => Quantity(s),
            Raw::Int(n) => Quantity(n.to_string()),
            Raw::Float(n) => Quantity(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<BTreeMap<String, Quantity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<BTreeMap<String, Quantity>>,
}

// --- Tolerations ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    Equal,
    Exists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<TolerationOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<TaintEffect>,
    /// Only meaningful with `NoExecute`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

// --- Security contexts ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeccompProfile {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localhost_profile: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SELinuxOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drop: Option<Vec<String>>,
}

/// Pod-wide security attributes (`spec.template.spec.securityContext`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_non_root: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplemental_groups: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_group_change_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccomp_profile: Option<SeccompProfile>,
    #[serde(rename = "seLinuxOptions", default, skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SELinuxOptions>,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Per-container security attributes (`containers[].securityContext`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_user: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_non_root: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only_root_filesystem: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_privilege_escalation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Capabilities>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccomp_profile: Option<SeccompProfile>,
    #[serde(rename = "seLinuxOptions", default, skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SELinuxOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc_mount: Option<String>,
    #[serde(flatten)]
    pub extra: Extra,
}

// --- Containers ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,
    /// command, args, env, ports, volumeMounts, probes...
    #[serde(flatten)]
    pub extra: Extra,
}

// --- Pod template ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_containers: Option<Vec<Container>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl PodSpec {
    /// Main containers followed by init containers.
    pub fn all_containers_mut(&mut self) -> impl Iterator<Item = &mut Container> {
        self.containers
            .iter_mut()
            .chain(self.init_containers.iter_mut().flatten())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PodSpec>,
}

// --- StatefulSet ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PodTemplateSpec>,
    /// selector, podManagementPolicy, volumeClaimTemplates...
    #[serde(flatten)]
    pub extra: Extra,
}

/// The workload manifest a function, source or sink instance runs as.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatefulSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<StatefulSetSpec>,
    #[serde(flatten)]
    pub extra: Extra,
}

impl StatefulSet {
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("<unnamed>")
    }

    /// The pod spec of the template, if the manifest carries one.
    pub fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        self.spec.as_mut()?.template.as_mut()?.spec.as_mut()
    }

    pub fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut()?.template.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: pf-public-default-enrich
  namespace: pulsar
spec:
  replicas: 1
  serviceName: pf-public-default-enrich
  podManagementPolicy: Parallel
  template:
    metadata:
      labels:
        app: enrich
    spec:
      initContainers:
        - name: download
          image: busybox
      containers:
        - name: pulsarfunction
          image: apachepulsar/pulsar:3.1.0
          command: ["sh", "-c", "exec java"]
          ports:
            - name: grpc
              containerPort: 9093
          securityContext:
            runAsUser: 1000
      volumes:
        - name: scratch
          emptyDir: {}
"#;

    #[test]
    fn test_parse_statefulset_yaml() {
        let mut sts: StatefulSet = serde_yaml::from_str(MANIFEST).unwrap();
        assert_eq!(sts.name(), "pf-public-default-enrich");

        let pod = sts.pod_spec_mut().unwrap();
        assert_eq!(pod.containers.len(), 1);
        assert_eq!(pod.init_containers.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            pod.containers[0]
                .security_context
                .as_ref()
                .and_then(|sc| sc.run_as_user),
            Some(1000)
        );
        assert!(pod.extra.contains_key("volumes"));
        assert!(pod.containers[0].extra.contains_key("ports"));
    }

    #[test]
    fn test_unmodelled_fields_survive_round_trip() {
        let sts: StatefulSet = serde_yaml::from_str(MANIFEST).unwrap();
        let json = serde_json::to_value(&sts).unwrap();

        assert_eq!(json["spec"]["podManagementPolicy"], "Parallel");
        assert_eq!(
            json["spec"]["template"]["spec"]["volumes"][0]["name"],
            "scratch"
        );
        assert_eq!(
            json["spec"]["template"]["spec"]["containers"][0]["command"][1],
            "-c"
        );

        let back: StatefulSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, sts);
    }

    #[test]
    fn test_absent_fields_are_not_serialized() {
        let sc = SecurityContext {
            run_as_non_root: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_value(&sc).unwrap();
        assert_eq!(json, serde_json::json!({ "runAsNonRoot": false }));
    }

    #[test]
    fn test_quantity_accepts_numbers() {
        let res: ResourceRequirements =
            serde_yaml::from_str("requests:\n  cpu: 1\n  memory: 512Mi\n").unwrap();
        let requests = res.requests.unwrap();
        assert_eq!(requests["cpu"], Quantity("1".to_string()));
        assert_eq!(requests["memory"], Quantity("512Mi".to_string()));
    }

    #[test]
    fn test_pod_spec_mut_missing_template() {
        let mut sts = StatefulSet {
            spec: Some(StatefulSetSpec::default()),
            ..Default::default()
        };
        assert!(sts.pod_spec_mut().is_none());
        assert!(StatefulSet::default().pod_spec_mut().is_none());
    }

    #[test]
    fn test_all_containers_mut_includes_init() {
        let mut pod = PodSpec {
            containers: vec![
                Container {
                    name: "a".to_string(),
                    ..Default::default()
                },
                Container {
                    name: "b".to_string(),
                    ..Default::default()
                },
            ],
            init_containers: Some(vec![Container {
                name: "init".to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let names: Vec<String> = pod.all_containers_mut().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["a", "b", "init"]);
    }
}
