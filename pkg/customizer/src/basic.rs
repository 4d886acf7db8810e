use pkg_types::manifest::StatefulSet;
use pkg_types::options::RuntimeOptions;
use pkg_types::runtime::BasicRuntimeOptions;
use pkg_types::validate::validate_name;
use pkg_types::workload::WorkloadDescriptor;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::{CustomizerConfig, ManifestCustomizer, global_options, workload_options};

/// Applies naming, labels, annotations, node selection, tolerations and
/// resource requirements.
pub struct BasicCustomizer {
    global: BasicRuntimeOptions,
}

impl BasicCustomizer {
    /// Never fails: an unparsable `config` leaves the global options empty.
    pub fn initialize(config: Option<&CustomizerConfig>) -> Self {
        Self {
            global: global_options(config),
        }
    }

    pub fn merged_options(&self, workload: &WorkloadDescriptor) -> BasicRuntimeOptions {
        let local: BasicRuntimeOptions = workload_options(workload);
        self.global.merge(&local)
    }
}

fn valid_or_current(field: &str, value: Option<String>, current: &str) -> String {
    match value {
        Some(v) => match validate_name(&v) {
            Ok(()) => v,
            Err(e) => {
                warn!("Ignoring invalid {}: {}", field, e);
                current.to_string()
            }
        },
        None => current.to_string(),
    }
}

fn extend(target: &mut Option<BTreeMap<String, String>>, extra: Option<&BTreeMap<String, String>>) {
    if let Some(extra) = extra.filter(|m| !m.is_empty()) {
        target
            .get_or_insert_with(BTreeMap::new)
            .extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

impl ManifestCustomizer for BasicCustomizer {
    fn customize_namespace(&self, workload: &WorkloadDescriptor, current: &str) -> String {
        valid_or_current("jobNamespace", self.merged_options(workload).job_namespace, current)
    }

    fn customize_name(&self, workload: &WorkloadDescriptor, current: &str) -> String {
        valid_or_current("jobName", self.merged_options(workload).job_name, current)
    }

    fn customize_stateful_set(
        &self,
        workload: &WorkloadDescriptor,
        mut stateful_set: StatefulSet,
    ) -> StatefulSet {
        let opts = self.merged_options(workload);
        if opts == BasicRuntimeOptions::default() {
            return stateful_set;
        }

        let name = stateful_set.name().to_string();
        let Some(template) = stateful_set.pod_template_mut() else {
            warn!("StatefulSet {} has no pod template, skipping basic customization", name);
            return stateful_set;
        };

        if opts.extra_labels.is_some() || opts.extra_annotations.is_some() {
            let meta = template.metadata.get_or_insert_with(Default::default);
            extend(&mut meta.labels, opts.extra_labels.as_ref());
            extend(&mut meta.annotations, opts.extra_annotations.as_ref());
        }

        if let Some(pod_spec) = template.spec.as_mut() {
            extend(&mut pod_spec.node_selector, opts.node_selector_labels.as_ref());

            if let Some(tolerations) = opts.tolerations.as_ref().filter(|t| !t.is_empty()) {
                pod_spec
                    .tolerations
                    .get_or_insert_with(Vec::new)
                    .extend(tolerations.iter().cloned());
            }

            if let Some(resources) = &opts.resource_requirements {
                for container in &mut pod_spec.containers {
                    container.resources = Some(resources.clone());
                    debug!("Set resource requirements on container: {}", container.name);
                }
            }
        } else {
            warn!("StatefulSet {} has no pod spec, skipping placement and resources", name);
        }

        extend(&mut stateful_set.metadata.labels, opts.extra_labels.as_ref());
        extend(&mut stateful_set.metadata.annotations, opts.extra_annotations.as_ref());

        debug!("Applied basic customization to StatefulSet {} ({})", name, workload.fully_qualified_name());
        stateful_set
    }
}
