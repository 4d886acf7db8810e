use pkg_types::manifest::{
    Capabilities, PodSecurityContext, PodSpec, SELinuxOptions, SeccompProfile, SecurityContext,
    StatefulSet,
};
use pkg_types::options::RuntimeOptions;
use pkg_types::security::{
    CapabilityOptions, ContainerSecurityOptions, PodSecurityOptions, SeLinuxOptions,
    SeccompProfileOptions, SecurityRuntimeOptions,
};
use pkg_types::validate::{check_container_options, check_pod_options};
use pkg_types::workload::WorkloadDescriptor;
use tracing::{debug, info, warn};

use crate::{CustomizerConfig, ManifestCustomizer, NoopCustomizer, global_options, workload_options};

/// Injects pod and container security contexts on top of a base customizer.
///
/// Global options are parsed once at initialization; per-workload options are
/// read from each descriptor's custom runtime options and win field by field.
pub struct SecurityCustomizer<B = NoopCustomizer> {
    base: B,
    global: SecurityRuntimeOptions,
}

impl<B: ManifestCustomizer> SecurityCustomizer<B> {
    /// Never fails: an unparsable `config` leaves the global options empty.
    pub fn initialize(base: B, config: Option<&CustomizerConfig>) -> Self {
        Self {
            base,
            global: global_options(config),
        }
    }

    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn global_options(&self) -> &SecurityRuntimeOptions {
        &self.global
    }

    /// Global options overlaid with the workload's own.
    pub fn merged_options(&self, workload: &WorkloadDescriptor) -> SecurityRuntimeOptions {
        let local: SecurityRuntimeOptions = workload_options(workload);
        self.global.merge(&local)
    }
}

impl<B: ManifestCustomizer> ManifestCustomizer for SecurityCustomizer<B> {
    fn customize_namespace(&self, workload: &WorkloadDescriptor, current: &str) -> String {
        self.base.customize_namespace(workload, current)
    }

    fn customize_name(&self, workload: &WorkloadDescriptor, current: &str) -> String {
        self.base.customize_name(workload, current)
    }

    fn customize_stateful_set(
        &self,
        workload: &WorkloadDescriptor,
        stateful_set: StatefulSet,
    ) -> StatefulSet {
        let mut stateful_set = self.base.customize_stateful_set(workload, stateful_set);

        let merged = self.merged_options(workload);
        if merged.is_empty() {
            return stateful_set;
        }

        if apply_security_options(&mut stateful_set, &merged) {
            info!(
                "Applied security context to StatefulSet {} ({} {})",
                stateful_set.name(),
                workload.component_type,
                workload.fully_qualified_name()
            );
        }
        stateful_set
    }
}

/// Apply merged options to the pod template. Returns false when the manifest
/// has no pod spec to customize.
pub fn apply_security_options(
    stateful_set: &mut StatefulSet,
    opts: &SecurityRuntimeOptions,
) -> bool {
    let name = stateful_set.name().to_string();
    let Some(pod_spec) = stateful_set.pod_spec_mut() else {
        warn!(
            "StatefulSet {} has no pod template spec, cannot apply security context",
            name
        );
        return false;
    };

    if let Some(pod_opts) = opts.pod_options() {
        for problem in check_pod_options(pod_opts) {
            warn!("StatefulSet {}: {}", name, problem);
        }
        let ctx = build_pod_security_context(pod_opts);
        debug!("Applied pod security context to {}: {:?}", name, ctx);
        pod_spec.security_context = Some(ctx);
    }

    if let Some(container_opts) = opts.container_options() {
        for problem in check_container_options(container_opts) {
            warn!("StatefulSet {}: {}", name, problem);
        }
        let ctx = build_container_security_context(container_opts);
        apply_to_containers(pod_spec, &ctx);
    }

    true
}

/// Every main and init container gets an identical copy of `ctx`.
fn apply_to_containers(pod_spec: &mut PodSpec, ctx: &SecurityContext) {
    for container in &mut pod_spec.containers {
        container.security_context = Some(ctx.clone());
        debug!("Applied container security context to container: {}", container.name);
    }
    for container in pod_spec.init_containers.iter_mut().flatten() {
        container.security_context = Some(ctx.clone());
        debug!(
            "Applied container security context to init container: {}",
            container.name
        );
    }
}

pub fn build_pod_security_context(opts: &PodSecurityOptions) -> PodSecurityContext {
    PodSecurityContext {
        run_as_user: opts.run_as_user,
        run_as_group: opts.run_as_group,
        fs_group: opts.fs_group,
        run_as_non_root: opts.run_as_non_root,
        supplemental_groups: opts
            .supplemental_groups
            .clone()
            .filter(|groups| !groups.is_empty()),
        fs_group_change_policy: opts.fs_group_change_policy.clone(),
        seccomp_profile: build_seccomp_profile(opts.seccomp_profile.as_ref()),
        se_linux_options: build_se_linux_options(opts.se_linux_options.as_ref()),
        ..Default::default()
    }
}

pub fn build_container_security_context(opts: &ContainerSecurityOptions) -> SecurityContext {
    SecurityContext {
        run_as_user: opts.run_as_user,
        run_as_group: opts.run_as_group,
        run_as_non_root: opts.run_as_non_root,
        read_only_root_filesystem: opts.read_only_root_filesystem,
        allow_privilege_escalation: opts.allow_privilege_escalation,
        privileged: opts.privileged,
        capabilities: opts.capabilities.as_ref().and_then(build_capabilities),
        seccomp_profile: build_seccomp_profile(opts.seccomp_profile.as_ref()),
        se_linux_options: build_se_linux_options(opts.se_linux_options.as_ref()),
        proc_mount: opts.proc_mount.clone(),
        ..Default::default()
    }
}

/// `None` unless at least one side is non-empty; an empty side stays unset.
pub fn build_capabilities(opts: &CapabilityOptions) -> Option<Capabilities> {
    let add = opts.add_list().map(<[String]>::to_vec);
    let drop = opts.drop_list().map(<[String]>::to_vec);
    if add.is_none() && drop.is_none() {
        return None;
    }
    Some(Capabilities { add, drop })
}

/// An empty block stays unset, like an empty list.
fn build_seccomp_profile(opts: Option<&SeccompProfileOptions>) -> Option<SeccompProfile> {
    opts.filter(|o| !o.is_empty()).map(|o| SeccompProfile {
        type_: o.type_.clone(),
        localhost_profile: o.localhost_profile.clone(),
    })
}

fn build_se_linux_options(opts: Option<&SeLinuxOptions>) -> Option<SELinuxOptions> {
    opts.filter(|o| !o.is_empty()).map(|o| SELinuxOptions {
        level: o.level.clone(),
        role: o.role.clone(),
        type_: o.type_.clone(),
        user: o.user.clone(),
    })
}
