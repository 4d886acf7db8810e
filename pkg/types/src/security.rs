//! Security options read from runtime configuration.
//!
//! Every field is an `Option`: `None` means "no opinion" and is distinct from
//! an explicit `false` or `0`. Global and per-workload options are combined
//! with [`RuntimeOptions::merge`], field by field, the per-workload
//! value winning whenever it is present.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::capabilities::deserialize_capability_list;
use crate::options::RuntimeOptions;

/// Field-level precedence: `over` wins when present.
fn pick<T>(over: Option<T>, base: Option<T>) -> Option<T> {
    over.or(base)
}

/// Merge two optional nested blocks field by field.
fn pick_nested<T: Merge>(over: Option<T>, base: Option<T>) -> Option<T> {
    match (over, base) {
        (Some(o), Some(b)) => Some(o.merge_over(b)),
        (o, b) => o.or(b),
    }
}

trait Merge {
    fn merge_over(self, base: Self) -> Self;
}

// --- Nested blocks ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeccompProfileOptions {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localhost_profile: Option<String>,
}

impl SeccompProfileOptions {
    pub fn is_empty(&self) -> bool {
        self.type_.is_none() && self.localhost_profile.is_none()
    }
}

impl Merge for SeccompProfileOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            type_: pick(self.type_, base.type_),
            localhost_profile: pick(self.localhost_profile, base.localhost_profile),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeLinuxOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl SeLinuxOptions {
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.role.is_none() && self.type_.is_none() && self.user.is_none()
    }
}

impl Merge for SeLinuxOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            level: pick(self.level, base.level),
            role: pick(self.role, base.role),
            type_: pick(self.type_, base.type_),
            user: pick(self.user, base.user),
        }
    }
}

/// Capability lists. Both sides accept a list, a bare string or an
/// index-keyed map (see [`crate::capabilities`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOptions {
    #[serde(
        default,
        deserialize_with = "deserialize_capability_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub add: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_capability_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub drop: Option<Vec<String>>,
}

impl CapabilityOptions {
    /// Non-empty `add` list, if any.
    pub fn add_list(&self) -> Option<&[String]> {
        self.add.as_deref().filter(|l| !l.is_empty())
    }

    /// Non-empty `drop` list, if any.
    pub fn drop_list(&self) -> Option<&[String]> {
        self.drop.as_deref().filter(|l| !l.is_empty())
    }
}

impl Merge for CapabilityOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            add: pick(self.add, base.add),
            drop: pick(self.drop, base.drop),
        }
    }
}

/// A `capabilities` value that is not an object is ignored rather than
/// failing the whole document.
fn deserialize_capabilities<'de, D>(deserializer: D) -> Result<Option<CapabilityOptions>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        value @ Value::Object(_) => serde_json::from_value(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
        other => {
            warn!("Ignoring capabilities that are not an object: {}", other);
            Ok(None)
        }
    }
}

// --- Pod options ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSecurityOptions {
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
    pub seccomp_profile: Option<SeccompProfileOptions>,
    #[serde(rename = "seLinuxOptions", default, skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SeLinuxOptions>,
}

impl PodSecurityOptions {
    /// True when applying these options would set no field at all.
    pub fn is_empty(&self) -> bool {
        self.run_as_user.is_none()
            && self.run_as_group.is_none()
            && self.fs_group.is_none()
            && self.run_as_non_root.is_none()
            && self.supplemental_groups.as_ref().is_none_or(Vec::is_empty)
            && self.fs_group_change_policy.is_none()
            && self
                .seccomp_profile
                .as_ref()
                .is_none_or(SeccompProfileOptions::is_empty)
            && self
                .se_linux_options
                .as_ref()
                .is_none_or(SeLinuxOptions::is_empty)
    }
}

impl Merge for PodSecurityOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            run_as_user: pick(self.run_as_user, base.run_as_user),
            run_as_group: pick(self.run_as_group, base.run_as_group),
            fs_group: pick(self.fs_group, base.fs_group),
            run_as_non_root: pick(self.run_as_non_root, base.run_as_non_root),
            supplemental_groups: pick(self.supplemental_groups, base.supplemental_groups),
            fs_group_change_policy: pick(self.fs_group_change_policy, base.fs_group_change_policy),
            seccomp_profile: pick_nested(self.seccomp_profile, base.seccomp_profile),
            se_linux_options: pick_nested(self.se_linux_options, base.se_linux_options),
        }
    }
}

// --- Container options ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSecurityOptions {
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
    #[serde(
        default,
        deserialize_with = "deserialize_capabilities",
        skip_serializing_if = "Option::is_none"
    )]
    pub capabilities: Option<CapabilityOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seccomp_profile: Option<SeccompProfileOptions>,
    #[serde(rename = "seLinuxOptions", default, skip_serializing_if = "Option::is_none")]
    pub se_linux_options: Option<SeLinuxOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc_mount: Option<String>,
}

impl ContainerSecurityOptions {
    /// True when applying these options would set no field at all.
    pub fn is_empty(&self) -> bool {
        self.run_as_user.is_none()
            && self.run_as_group.is_none()
            && self.run_as_non_root.is_none()
            && self.read_only_root_filesystem.is_none()
            && self.allow_privilege_escalation.is_none()
            && self.privileged.is_none()
            && self
                .capabilities
                .as_ref()
                .is_none_or(|c| c.add_list().is_none() && c.drop_list().is_none())
            && self
                .seccomp_profile
                .as_ref()
                .is_none_or(SeccompProfileOptions::is_empty)
            && self
                .se_linux_options
                .as_ref()
                .is_none_or(SeLinuxOptions::is_empty)
            && self.proc_mount.is_none()
    }
}

impl Merge for ContainerSecurityOptions {
    fn merge_over(self, base: Self) -> Self {
        Self {
            run_as_user: pick(self.run_as_user, base.run_as_user),
            run_as_group: pick(self.run_as_group, base.run_as_group),
            run_as_non_root: pick(self.run_as_non_root, base.run_as_non_root),
            read_only_root_filesystem: pick(
                self.read_only_root_filesystem,
                base.read_only_root_filesystem,
            ),
            allow_privilege_escalation: pick(
                self.allow_privilege_escalation,
                base.allow_privilege_escalation,
            ),
            privileged: pick(self.privileged, base.privileged),
            capabilities: pick_nested(self.capabilities, base.capabilities),
            seccomp_profile: pick_nested(self.seccomp_profile, base.seccomp_profile),
            se_linux_options: pick_nested(self.se_linux_options, base.se_linux_options),
            proc_mount: pick(self.proc_mount, base.proc_mount),
        }
    }
}

// --- Runtime options document ---

/// The security part of a runtime options document. Other keys in the same
/// document (labels, tolerations...) are ignored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRuntimeOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_security_context: Option<PodSecurityOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_security_context: Option<ContainerSecurityOptions>,
}

impl RuntimeOptions for SecurityRuntimeOptions {
    const KIND: &'static str = "security";

    /// Per-workload values win field by field; nested blocks are merged the
    /// same way.
    fn merge(&self, workload: &Self) -> Self {
        Self {
            pod_security_context: pick_nested(
                workload.pod_security_context.clone(),
                self.pod_security_context.clone(),
            ),
            container_security_context: pick_nested(
                workload.container_security_context.clone(),
                self.container_security_context.clone(),
            ),
        }
    }
}

impl SecurityRuntimeOptions {
    /// Pod options that would set at least one field.
    pub fn pod_options(&self) -> Option<&PodSecurityOptions> {
        self.pod_security_context.as_ref().filter(|o| !o.is_empty())
    }

    /// Container options that would set at least one field.
    pub fn container_options(&self) -> Option<&ContainerSecurityOptions> {
        self.container_security_context
            .as_ref()
            .filter(|o| !o.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.pod_options().is_none() && self.container_options().is_none()
    }
}
