use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use pkg_constants::customizer::{DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use pkg_customizer::{BasicCustomizer, ManifestCustomizer, SecurityCustomizer};
use pkg_types::config::{CustomizerConfigFile, load_config_file};
use pkg_types::manifest::StatefulSet;
use pkg_types::workload::{ComponentType, WorkloadDescriptor};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(
    name = "podguard",
    about = "Apply runtime and security customizations to function StatefulSet manifests"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Customize a StatefulSet manifest and print the result
    Customize {
        /// StatefulSet manifest (YAML or JSON)
        #[arg(long, short)]
        manifest: String,

        #[command(flatten)]
        workload: WorkloadArgs,

        /// Output format for the customized manifest
        #[arg(long, value_enum)]
        output: Option<OutputFormat>,
    },
    /// Print the effective runtime options for a workload
    Merge {
        #[command(flatten)]
        workload: WorkloadArgs,
    },
}

#[derive(Args, Debug)]
struct WorkloadArgs {
    /// Workload descriptor file (YAML or JSON); flags below override it
    #[arg(long)]
    descriptor: Option<String>,

    #[arg(long)]
    tenant: Option<String>,

    #[arg(long)]
    namespace: Option<String>,

    #[arg(long)]
    name: Option<String>,

    /// function, source or sink
    #[arg(long)]
    component_type: Option<ComponentType>,

    /// Per-workload runtime options JSON
    #[arg(long)]
    custom_runtime_options: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

/// Flag value, else config file value, else `default`.
fn pick_format<T: ValueEnum + Copy>(flag: Option<T>, file: Option<&str>, default: T) -> anyhow::Result<T> {
    if let Some(v) = flag {
        return Ok(v);
    }
    match file {
        Some(s) => T::from_str(s, true).map_err(|e| anyhow::anyhow!("invalid format '{}': {}", s, e)),
        None => Ok(default),
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Descriptor file first, then flag overrides.
fn load_workload(args: &WorkloadArgs) -> anyhow::Result<WorkloadDescriptor> {
    let mut workload = match &args.descriptor {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read descriptor {}", path))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse descriptor {}", path))?
        }
        None => WorkloadDescriptor::default(),
    };

    if let Some(tenant) = &args.tenant {
        workload.tenant = tenant.clone();
    }
    if let Some(namespace) = &args.namespace {
        workload.namespace = namespace.clone();
    }
    if let Some(name) = &args.name {
        workload.name = name.clone();
    }
    if let Some(component_type) = args.component_type {
        workload.component_type = component_type;
    }
    if let Some(options) = &args.custom_runtime_options {
        workload.custom_runtime_options = Some(options.clone());
    }
    Ok(workload)
}

fn load_manifest(path: &str) -> anyhow::Result<StatefulSet> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read manifest {}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse manifest {}", path))
}

/// Replace `field` with the customized value only when it differs. An absent
/// field is offered to the customizer as `""`.
fn customize_field(field: &mut Option<String>, customized: impl FnOnce(&str) -> String) {
    let current = field.as_deref().unwrap_or_default();
    let next = customized(current);
    if next != current {
        *field = Some(next);
    }
}

/// Run the full chain over one manifest, including the name and namespace
/// the runtime would create it under.
fn customize(
    customizer: &impl ManifestCustomizer,
    workload: &WorkloadDescriptor,
    manifest: StatefulSet,
) -> StatefulSet {
    let mut manifest = customizer.customize_stateful_set(workload, manifest);

    let meta = &mut manifest.metadata;
    customize_field(&mut meta.namespace, |ns| customizer.customize_namespace(workload, ns));
    customize_field(&mut meta.name, |name| customizer.customize_name(workload, name));

    info!(
        "Customized {} → {}/{}",
        workload.fully_qualified_name(),
        meta.namespace.as_deref().unwrap_or("<none>"),
        meta.name.as_deref().unwrap_or("<unnamed>")
    );
    manifest
}

/// Security and basic options overlaid into a single document.
fn effective_options(
    customizer: &SecurityCustomizer<BasicCustomizer>,
    workload: &WorkloadDescriptor,
) -> anyhow::Result<Value> {
    let mut doc = serde_json::to_value(customizer.base().merged_options(workload))?;
    let security = serde_json::to_value(customizer.merged_options(workload))?;
    if let (Value::Object(doc), Value::Object(security)) = (&mut doc, security) {
        doc.extend(security);
    }
    Ok(doc)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: CustomizerConfigFile = load_config_file(&cli.config)?;

    // Merge: CLI args > config file > defaults
    let log_format = pick_format(cli.log_format, file_cfg.log_format.as_deref(), LogFormat::Text)?;
    init_tracing(log_format);
    info!("Config file: {}", cli.config);

    let global = file_cfg.runtime_customizer_config.as_ref();

    match cli.command {
        Command::Customize {
            manifest,
            workload,
            output,
        } => {
            let output = pick_format(output, file_cfg.output.as_deref(), OutputFormat::Yaml)?;
            let workload = load_workload(&workload)?;
            let manifest = load_manifest(&manifest)?;

            let customizer =
                SecurityCustomizer::initialize(BasicCustomizer::initialize(global), global);
            let manifest = customize(&customizer, &workload, manifest);

            match output {
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&manifest)?),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&manifest)?),
            }
        }
        Command::Merge { workload } => {
            let workload = load_workload(&workload)?;
            let customizer =
                SecurityCustomizer::initialize(BasicCustomizer::initialize(global), global);
            let doc = effective_options(&customizer, &workload)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workload_args() -> WorkloadArgs {
        WorkloadArgs {
            descriptor: None,
            tenant: Some("public".to_string()),
            namespace: Some("default".to_string()),
            name: Some("enrich".to_string()),
            component_type: Some(ComponentType::Sink),
            custom_runtime_options: Some(r#"{"podSecurityContext": {"runAsUser": 20000}}"#.to_string()),
        }
    }

    #[test]
    fn test_cli_parses_customize() {
        let cli = Cli::try_parse_from([
            "podguard",
            "--log-format",
            "json",
            "customize",
            "--manifest",
            "sts.yaml",
            "--tenant",
            "public",
            "--component-type",
            "source",
            "--output",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        match cli.command {
            Command::Customize {
                manifest,
                workload,
                output,
            } => {
                assert_eq!(manifest, "sts.yaml");
                assert_eq!(workload.component_type, Some(ComponentType::Source));
                assert_eq!(output, Some(OutputFormat::Json));
            }
            Command::Merge { .. } => panic!("expected customize"),
        }
    }

    #[test]
    fn test_pick_format_precedence() {
        assert_eq!(
            pick_format(Some(LogFormat::Text), Some("json"), LogFormat::Json).unwrap(),
            LogFormat::Text
        );
        assert_eq!(
            pick_format(None, Some("JSON"), LogFormat::Text).unwrap(),
            LogFormat::Json
        );
        assert_eq!(pick_format::<LogFormat>(None, None, LogFormat::Text).unwrap(), LogFormat::Text);
        assert!(pick_format::<OutputFormat>(None, Some("toml"), OutputFormat::Yaml).is_err());
    }

    #[test]
    fn test_flags_override_descriptor_file() {
        let path = std::env::temp_dir().join(format!("podguard-descriptor-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "tenant: other\nnamespace: ns\nname: old\ncustomRuntimeOptions: '{}'\n",
        )
        .unwrap();

        let mut args = workload_args();
        args.descriptor = Some(path.to_string_lossy().to_string());
        args.tenant = None;
        let workload = load_workload(&args).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(workload.tenant, "other");
        assert_eq!(workload.name, "enrich");
        assert_eq!(workload.component_type, ComponentType::Sink);
        assert!(workload.runtime_options().unwrap().contains("20000"));
    }

    #[test]
    fn test_customize_sets_name_and_security() {
        let Value::Object(global) = json!({
            "jobNamespace": "functions",
            "podSecurityContext": { "runAsUser": 10000, "runAsNonRoot": true }
        }) else {
            unreachable!()
        };
        let customizer =
            SecurityCustomizer::initialize(BasicCustomizer::initialize(Some(&global)), Some(&global));
        let workload = load_workload(&workload_args()).unwrap();
        let manifest: StatefulSet = serde_yaml::from_str(
            "metadata:\n  name: pf-enrich\nspec:\n  template:\n    spec:\n      containers:\n        - name: pulsarfunction\n",
        )
        .unwrap();

        let mut out = customize(&customizer, &workload, manifest);
        assert_eq!(out.metadata.namespace.as_deref(), Some("functions"));
        assert_eq!(out.metadata.name.as_deref(), Some("pf-enrich"));
        let ctx = out.pod_spec_mut().unwrap().security_context.clone().unwrap();
        assert_eq!(ctx.run_as_user, Some(20000));
        assert_eq!(ctx.run_as_non_root, Some(true));
    }

    #[test]
    fn test_customize_without_options_keeps_unnamed_manifest() {
        let customizer =
            SecurityCustomizer::initialize(BasicCustomizer::initialize(None), None);
        let workload = WorkloadDescriptor::new("public", "default", "enrich");
        let manifest: StatefulSet = serde_yaml::from_str(
            "spec:\n  template:\n    spec:\n      containers:\n        - name: pulsarfunction\n",
        )
        .unwrap();

        let out = customize(&customizer, &workload, manifest.clone());
        assert_eq!(out, manifest);
        assert_eq!(out.metadata.name, None);
        assert_eq!(out.metadata.namespace, None);
    }

    #[test]
    fn test_effective_options_document() {
        let Value::Object(global) = json!({
            "extraLabels": { "team": "data" },
            "containerSecurityContext": { "capabilities": { "drop": ["ALL"] } }
        }) else {
            unreachable!()
        };
        let customizer =
            SecurityCustomizer::initialize(BasicCustomizer::initialize(Some(&global)), Some(&global));
        let workload = load_workload(&workload_args()).unwrap();

        let doc = effective_options(&customizer, &workload).unwrap();
        assert_eq!(doc["extraLabels"]["team"], "data");
        assert_eq!(doc["podSecurityContext"]["runAsUser"], 20000);
        assert_eq!(doc["containerSecurityContext"]["capabilities"]["drop"][0], "ALL");
    }
}
