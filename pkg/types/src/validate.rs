use anyhow::{Result, bail};
use pkg_constants::security::{
    FS_GROUP_CHANGE_POLICIES, MAX_NAME_LENGTH, PROC_MOUNT_TYPES, SECCOMP_LOCALHOST,
    SECCOMP_PROFILE_TYPES,
};

use crate::security::{ContainerSecurityOptions, PodSecurityOptions, SeccompProfileOptions};

/// Validate a Kubernetes-style resource name.
/// Rules: lowercase `[a-z0-9-]`, max 63 chars, no leading/trailing hyphens.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("name must not be empty");
    }
    if name.len() > MAX_NAME_LENGTH {
        bail!(
            "name '{}' exceeds {} characters (got {})",
            name,
            MAX_NAME_LENGTH,
            name.len()
        );
    }
    if name.starts_with('-') || name.ends_with('-') {
        bail!("name '{}' must not start or end with a hyphen", name);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!(
            "name '{}' must contain only lowercase letters, digits, and hyphens [a-z0-9-]",
            name
        );
    }
    Ok(())
}

fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if !allowed.contains(&value) {
        bail!(
            "{} '{}' is not one of [{}]",
            field,
            value,
            allowed.join(", ")
        );
    }
    Ok(())
}

/// Capability names as the kubelet expects them: `NET_ADMIN`, `ALL`, or
/// with the `CAP_` prefix.
pub fn validate_capability_name(name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("capability name must not be empty");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        bail!(
            "capability '{}' must contain only uppercase letters, digits, and underscores",
            name
        );
    }
    Ok(())
}

pub fn validate_seccomp_profile(profile: &SeccompProfileOptions) -> Result<()> {
    let Some(type_) = profile.type_.as_deref() else {
        bail!("seccompProfile.type must be set");
    };
    validate_one_of("seccompProfile.type", type_, SECCOMP_PROFILE_TYPES)?;
    match (type_ == SECCOMP_LOCALHOST, profile.localhost_profile.is_some()) {
        (true, false) => bail!("seccompProfile.localhostProfile is required for type Localhost"),
        (false, true) => bail!(
            "seccompProfile.localhostProfile must only be set for type Localhost (got {})",
            type_
        ),
        _ => Ok(()),
    }
}

/// Every problem found in pod-level options. An empty result means valid.
pub fn check_pod_options(opts: &PodSecurityOptions) -> Vec<anyhow::Error> {
    let mut problems = Vec::new();
    problems.extend(opts.fs_group_change_policy.as_deref().and_then(|policy| {
        validate_one_of("fsGroupChangePolicy", policy, FS_GROUP_CHANGE_POLICIES).err()
    }));
    problems.extend(
        opts.seccomp_profile
            .as_ref()
            .filter(|p| !p.is_empty())
            .and_then(|p| validate_seccomp_profile(p).err()),
    );
    problems
}

/// Every problem found in container-level options. An empty result means valid.
pub fn check_container_options(opts: &ContainerSecurityOptions) -> Vec<anyhow::Error> {
    let mut problems = Vec::new();
    problems.extend(
        opts.proc_mount
            .as_deref()
            .and_then(|mode| validate_one_of("procMount", mode, PROC_MOUNT_TYPES).err()),
    );
    problems.extend(
        opts.seccomp_profile
            .as_ref()
            .filter(|p| !p.is_empty())
            .and_then(|p| validate_seccomp_profile(p).err()),
    );
    if let Some(caps) = &opts.capabilities {
        let names = caps.add.iter().chain(caps.drop.iter()).flatten();
        problems.extend(names.filter_map(|n| validate_capability_name(n).err()));
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::CapabilityOptions;

    #[test]
    fn valid_names() {
        assert!(validate_name("pulsar-funcs").is_ok());
        assert!(validate_name("pf-public-default-enrich").is_ok());
        assert!(validate_name("ns-123").is_ok());
        assert!(validate_name("a").is_ok());
    }

    #[test]
    fn invalid_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name("Pulsar").is_err());
        assert!(validate_name("my_func").is_err());
        assert!(validate_name("-leading").is_err());
        assert!(validate_name("trailing-").is_err());
        assert!(validate_name("public/default").is_err());
        assert!(validate_name(&"a".repeat(64)).is_err());
    }

    #[test]
    fn capability_names() {
        assert!(validate_capability_name("ALL").is_ok());
        assert!(validate_capability_name("NET_BIND_SERVICE").is_ok());
        assert!(validate_capability_name("CAP_SYS_ADMIN").is_ok());
        assert!(validate_capability_name("net_admin").is_err());
        assert!(validate_capability_name("").is_err());
    }

    #[test]
    fn seccomp_profiles() {
        let profile = |t: &str, p: Option<&str>| SeccompProfileOptions {
            type_: Some(t.to_string()),
            localhost_profile: p.map(str::to_string),
        };
        assert!(validate_seccomp_profile(&profile("RuntimeDefault", None)).is_ok());
        assert!(validate_seccomp_profile(&profile("Localhost", Some("profiles/fn.json"))).is_ok());
        assert!(validate_seccomp_profile(&profile("Localhost", None)).is_err());
        assert!(validate_seccomp_profile(&profile("Unconfined", Some("x"))).is_err());
        assert!(validate_seccomp_profile(&profile("Strict", None)).is_err());
        assert!(validate_seccomp_profile(&SeccompProfileOptions::default()).is_err());
    }

    #[test]
    fn pod_option_checks() {
        let ok = PodSecurityOptions {
            fs_group_change_policy: Some("OnRootMismatch".to_string()),
            ..Default::default()
        };
        assert!(check_pod_options(&ok).is_empty());

        let bad = PodSecurityOptions {
            fs_group_change_policy: Some("Sometimes".to_string()),
            seccomp_profile: Some(SeccompProfileOptions {
                type_: Some("Strict".to_string()),
                localhost_profile: None,
            }),
            ..Default::default()
        };
        assert_eq!(check_pod_options(&bad).len(), 2);
    }

    #[test]
    fn empty_seccomp_block_is_not_checked() {
        let opts = PodSecurityOptions {
            run_as_user: Some(10000),
            seccomp_profile: Some(SeccompProfileOptions::default()),
            ..Default::default()
        };
        assert!(check_pod_options(&opts).is_empty());
    }

    #[test]
    fn container_option_checks() {
        let opts = ContainerSecurityOptions {
            proc_mount: Some("Masked".to_string()),
            capabilities: Some(CapabilityOptions {
                add: Some(vec!["NET_ADMIN".to_string(), "bad-cap".to_string()]),
                drop: Some(vec!["ALL".to_string()]),
            }),
            ..Default::default()
        };
        assert_eq!(check_container_options(&opts).len(), 2);
        assert!(check_container_options(&ContainerSecurityOptions::default()).is_empty());
    }
}
