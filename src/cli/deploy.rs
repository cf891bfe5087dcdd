//! `fog deploy`: drives the Deployment State Machine (4.E) end to end.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    change_set,
    cli::{args::KeyValueArg, Global},
    config::Config,
    deploy::{self, DeployOutcome, DeploymentPlan, NonInteractivePrompter, Prompter},
    error::{ErrorCode, FogError},
    output::{Document, OutputSink, TextOutputSink},
    params, provider, tag, template,
    validation::Validation,
};

/// Create and/or execute a change set for a stack, following it through to completion.
#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The name of the stack to deploy.
    #[clap(long)]
    pub stackname: String,

    /// Path (or bare name, resolved under `templates.directory`) of the template to deploy.
    /// Exactly one of `--template` or `--deployment-file` must be given.
    #[clap(long)]
    pub template: Option<String>,

    /// A bundled file carrying the template plus its parameters and tags, as an alternative to
    /// `--template`/`--parameters`/`--tags`. Mutually exclusive with all three.
    #[clap(long)]
    pub deployment_file: Option<PathBuf>,

    /// Parameter files to merge, left to right (later files override earlier ones per key).
    #[clap(long = "parameters")]
    pub parameter_files: Vec<PathBuf>,

    /// Tag files to merge, left to right.
    #[clap(long = "tags")]
    pub tag_files: Vec<PathBuf>,

    /// Additional default tags as `key=value`, applied when not already set by a tag file.
    #[clap(long = "default-tags")]
    pub default_tags: Vec<KeyValueArg>,

    /// S3 bucket to upload the template to, if it's too large to pass inline.
    #[clap(long)]
    pub bucket: Option<String>,

    /// The change set name to use (or reuse, with `--deploy-changeset`).
    #[clap(long)]
    pub changeset: Option<String>,

    /// Capabilities to acknowledge (e.g. `CAPABILITY_IAM`).
    #[clap(long)]
    pub capability: Vec<String>,

    /// Build the change set and report what it would do, without executing it.
    #[clap(long)]
    pub dry_run: bool,

    /// Never prompt; approve automatically unless `--dry-run` is also set.
    #[clap(long)]
    pub non_interactive: bool,

    /// Only create the change set; don't prompt for or perform execution.
    #[clap(long)]
    pub create_changeset: bool,

    /// Execute a change set created by an earlier `--create-changeset` run, without recreating it.
    #[clap(long)]
    pub deploy_changeset: bool,
}

/// A [`Prompter`] that reads a `y`/`n` line from STDIN.
struct TerminalPrompter;

#[async_trait::async_trait]
impl Prompter for TerminalPrompter {
    async fn confirm(&self, prompt: &str, default: bool) -> bool {
        eprint!("{prompt} [{}] ", if default { "Y/n" } else { "y/N" });
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        if reader.read_line(&mut line).await.is_err() {
            return default;
        }
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => true,
            "n" | "no" => false,
            _ => default,
        }
    }
}

pub async fn run(global: &Global, config: &Config, args: Args) -> i32 {
    match try_run(global, config, args).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error}");
            exit_code_for(&error)
        }
    }
}

/// Pre-flight validation, ahead of any file IO or provider call. `deploy::run` validates the
/// resolved [`DeploymentPlan`] again (spec.md §4.K names both call sites), but catching flag
/// conflicts and missing files here means the user never waits on a template load to hear about
/// them.
fn validate_args(args: &Args) -> Result<(), FogError> {
    let mut validation = Validation::new("deploy");
    validation.required_field("--stackname", !args.stackname.trim().is_empty());
    validation.required_field("--template/--deployment-file", args.template.is_some() || args.deployment_file.is_some());
    if args.deployment_file.is_some() {
        if args.template.is_some() {
            validation.conflicting_flags(&["--deployment-file", "--template"]);
        }
        if !args.parameter_files.is_empty() {
            validation.conflicting_flags(&["--deployment-file", "--parameters"]);
        }
        if !args.tag_files.is_empty() {
            validation.conflicting_flags(&["--deployment-file", "--tags"]);
        }
    }
    if args.create_changeset && args.deploy_changeset {
        validation.conflicting_flags(&["--create-changeset", "--deploy-changeset"]);
    }
    if args.dry_run && args.deploy_changeset {
        validation.conflicting_flags(&["--dry-run", "--deploy-changeset"]);
    }
    if args.deploy_changeset {
        validation.missing_dependency("--deploy-changeset", &["--changeset"], args.changeset.is_some());
    }
    for path in args.parameter_files.iter().chain(&args.tag_files).chain(&args.deployment_file) {
        validation.file_not_found("--parameters/--tags/--deployment-file", &path.display().to_string(), path.exists());
    }
    validation.build()
}

async fn try_run(global: &Global, config: &Config, args: Args) -> Result<i32, FogError> {
    validate_args(&args)?;

    let rootdir = PathBuf::from(&config.rootdir);
    let templates_dir = rootdir.join(&config.templates.directory);

    let mut loaded;
    let mut parameter_files = Vec::new();
    let mut tag_files = Vec::new();

    if let Some(path) = &args.deployment_file {
        let bundle = load_deployment_file(path)?;
        loaded = template::Template { content: bundle.template, local_path: path.clone(), remote_url: None };
        parameter_files.push(bundle.parameters);
        tag_files.push(bundle.tags);
    } else {
        loaded = template::load_template(&templates_dir, args.template.as_deref().unwrap_or_default()).await?;
        for path in &args.parameter_files {
            parameter_files.push(load_parameter_file(path)?);
        }
        for path in &args.tag_files {
            tag_files.push(load_tag_file(path)?);
        }
    }
    let parameters = params::load_parameters(&parameter_files);

    let mut defaults: std::collections::BTreeMap<String, String> = config.tags.default.clone();
    for kv in &args.default_tags {
        defaults.insert(kv.key.clone(), kv.value.clone());
    }
    let tags = tag::merge_tags(&tag_files, &defaults);

    let template_source = match loaded.size_class() {
        template::SizeClass::Inline => provider::TemplateSource::Inline(loaded.content.clone()),
        template::SizeClass::RequiresUpload => {
            let bucket = args.bucket.as_deref().ok_or_else(|| {
                FogError::new(ErrorCode::ValidationFailed, "template requires upload but no --bucket was supplied")
            })?;
            let provider = build_provider(global).await?;
            let unix_nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|error| FogError::new(ErrorCode::Internal, "system clock before epoch").with_cause(error))?
                .as_nanos();
            let uploaded = template::upload_template(provider.object_store.as_ref(), &crate::provider::OperationContext::new(), &loaded, bucket, unix_nanos).await?;
            loaded.remote_url = Some(uploaded.url.clone());
            provider::TemplateSource::S3Url(uploaded.url)
        }
    };

    let changeset_name = args.changeset.clone().unwrap_or_else(|| format!("{}-deploy", args.stackname));

    let plan = DeploymentPlan {
        stack_name: args.stackname.clone(),
        template: template_source,
        parameters: parameters.into_iter().map(|p| (p.parameter_key, p.parameter_value.unwrap_or_default())).collect(),
        tags,
        capabilities: args.capability.clone(),
        changeset_name,
        dry_run: args.dry_run,
        non_interactive: args.non_interactive,
        create_only: args.create_changeset,
        deploy_only: args.deploy_changeset,
    };

    let provider = build_provider(global).await?;
    let ctx = crate::provider::OperationContext::new();
    ctx.cancel_on_sigint();
    let prompter: Box<dyn Prompter> = if args.non_interactive { Box::new(NonInteractivePrompter) } else { Box::new(TerminalPrompter) };

    let outcome = deploy::run(&provider, &ctx, prompter.as_ref(), global.region.as_deref().unwrap_or("us-east-1"), plan).await;

    if config.logging.enabled {
        log_deployment(&provider, &ctx, config, &args, &outcome).await;
    }

    let sink = TextOutputSink::new(global.color());
    render_outcome(&sink, &outcome);

    Ok(match outcome {
        DeployOutcome::Succeeded(_) | DeployOutcome::NoOp(_) | DeployOutcome::DryRunComplete(_) | DeployOutcome::ChangesetOnly(_) => 0,
        DeployOutcome::Cancelled(_) => 130,
        DeployOutcome::Failed(_) => 1,
        DeployOutcome::PreconditionsFailed(error) => return Err(error),
    })
}

fn render_outcome(sink: &TextOutputSink, outcome: &DeployOutcome) {
    let (title, info) = match outcome {
        DeployOutcome::Succeeded(info) => ("deployment succeeded", info),
        DeployOutcome::Failed(info) => ("deployment failed", info),
        DeployOutcome::Cancelled(info) => ("deployment cancelled", info),
        DeployOutcome::NoOp(info) => ("no changes to deploy", info),
        DeployOutcome::DryRunComplete(info) => ("dry run complete", info),
        DeployOutcome::ChangesetOnly(info) => ("change set created", info),
        DeployOutcome::PreconditionsFailed(_) => return,
    };

    let mut document = Document::new().title(title).header(["Field", "Value"]);
    document = document.row(["Stack", info.stack_name.as_str()]);
    if let Some(url) = &info.console_url {
        document = document.row(["Console", url.as_str()]);
    }
    if let Some(changeset) = &info.changeset {
        let analysis = change_set::analyze(&changeset.changes);
        let total: usize = analysis.summary.counts.values().sum();
        document = document.row(["Changes", &total.to_string()]);
        document = document.row(["Dangerous", &analysis.danger.len().to_string()]);
    }
    sink.render(&document);
}

fn load_parameter_file(path: &PathBuf) -> Result<Vec<params::ParameterRecord>, FogError> {
    #[derive(serde::Deserialize)]
    struct RawParameter {
        #[serde(alias = "parameter_key")]
        parameter_key: String,
        #[serde(alias = "parameter_value")]
        parameter_value: Option<String>,
        #[serde(alias = "use_previous_value")]
        use_previous_value: Option<bool>,
    }

    let content = std::fs::read_to_string(path)
        .map_err(|error| FogError::new(ErrorCode::FileNotFound, format!("couldn't read parameter file `{}`", path.display())).with_cause(error))?;
    let raw: Vec<RawParameter> = serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .map_err(|error| FogError::new(ErrorCode::InvalidFormat, format!("couldn't parse parameter file `{}`", path.display())).with_cause(error))?;

    Ok(raw
        .into_iter()
        .map(|p| params::ParameterRecord {
            parameter_key: p.parameter_key,
            parameter_value: p.parameter_value,
            use_previous_value: p.use_previous_value,
        })
        .collect())
}

/// A `--deployment-file` bundle's extracted contents, in the shapes the rest of `try_run` already
/// merges (`ParameterRecord`s, a tag map).
struct DeploymentFile {
    template: String,
    parameters: Vec<params::ParameterRecord>,
    tags: std::collections::BTreeMap<String, String>,
}

fn load_deployment_file(path: &PathBuf) -> Result<DeploymentFile, FogError> {
    #[derive(serde::Deserialize)]
    struct RawParameter {
        parameter_key: String,
        parameter_value: Option<String>,
        use_previous_value: Option<bool>,
    }

    #[derive(serde::Deserialize)]
    struct RawDeploymentFile {
        template: String,
        #[serde(default)]
        parameters: Vec<RawParameter>,
        #[serde(default)]
        tags: std::collections::BTreeMap<String, String>,
    }

    let content = std::fs::read_to_string(path)
        .map_err(|error| FogError::new(ErrorCode::FileNotFound, format!("couldn't read deployment file `{}`", path.display())).with_cause(error))?;
    let raw: RawDeploymentFile = serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .map_err(|error| FogError::new(ErrorCode::InvalidFormat, format!("couldn't parse deployment file `{}`", path.display())).with_cause(error))?;

    Ok(DeploymentFile {
        template: raw.template,
        parameters: raw
            .parameters
            .into_iter()
            .map(|p| params::ParameterRecord {
                parameter_key: p.parameter_key,
                parameter_value: p.parameter_value,
                use_previous_value: p.use_previous_value,
            })
            .collect(),
        tags: raw.tags,
    })
}

fn load_tag_file(path: &PathBuf) -> Result<std::collections::BTreeMap<String, String>, FogError> {
    let content = std::fs::read_to_string(path)
        .map_err(|error| FogError::new(ErrorCode::FileNotFound, format!("couldn't read tag file `{}`", path.display())).with_cause(error))?;
    let raw: std::collections::BTreeMap<String, String> = serde_json::from_str(&content)
        .or_else(|_| serde_yaml::from_str(&content))
        .map_err(|error| FogError::new(ErrorCode::InvalidFormat, format!("couldn't parse tag file `{}`", path.display())).with_cause(error))?;

    tag::parse_tag_file(raw.into_iter().collect())
}

async fn log_deployment(provider: &provider::Provider, ctx: &provider::OperationContext, config: &Config, _args: &Args, outcome: &DeployOutcome) {
    let (stack_name, is_new, duration_seconds, success, changeset_id) = match outcome {
        DeployOutcome::Succeeded(info) | DeployOutcome::Failed(info) | DeployOutcome::Cancelled(info) => {
            let duration = match (info.deployment_start, info.deployment_end) {
                (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
                _ => 0.0,
            };
            (info.stack_name.clone(), info.is_new, duration, matches!(outcome, DeployOutcome::Succeeded(_)), info.changeset.as_ref().map(|c| c.id.clone()))
        }
        _ => return,
    };

    let deployment_type = if is_new { crate::log::DeploymentType::Create } else { crate::log::DeploymentType::Update };
    let account = provider.directory.caller_identity(ctx).await.unwrap_or_else(|_| "unknown".to_string());

    let rootdir = PathBuf::from(&config.rootdir);
    let path = rootdir.join(&config.deployments.directory).join(&config.logging.filename);
    let log = crate::log::DeploymentLog::new(path);
    let record = crate::log::DeploymentRecord {
        timestamp: chrono::Utc::now(),
        stack_name,
        account,
        region: config.region.clone().unwrap_or_default(),
        deployment_type,
        duration_seconds,
        success,
        changeset_id,
    };
    if let Err(error) = log.append(record).await {
        tracing::warn!(%error, "failed to append to deployment log");
    }
}

pub(crate) async fn build_provider(global: &Global) -> Result<provider::Provider, FogError> {
    let region = global.region.clone().map(aws_types::region::Region::new);
    let sdk_config = provider::aws::load_sdk_config(region, global.non_interactive).await?;

    Ok(provider::Provider {
        stack: std::sync::Arc::new(provider::aws::CloudFormationAdapter::new(&sdk_config)),
        object_store: std::sync::Arc::new(provider::aws::S3Adapter::new(&sdk_config)),
        network: std::sync::Arc::new(provider::aws::Ec2Adapter::new(&sdk_config)),
        directory: std::sync::Arc::new(provider::aws::DirectoryAdapter::new(&sdk_config, None)),
    })
}

pub(crate) fn exit_code_for(error: &FogError) -> i32 {
    use crate::error::ErrorCategory;
    match error.category() {
        ErrorCategory::Validation => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(stackname: &str, template: &str) -> Args {
        Args {
            stackname: stackname.to_string(),
            template: Some(template.to_string()),
            deployment_file: None,
            parameter_files: Vec::new(),
            tag_files: Vec::new(),
            default_tags: Vec::new(),
            bucket: None,
            changeset: None,
            capability: Vec::new(),
            dry_run: false,
            non_interactive: false,
            create_changeset: false,
            deploy_changeset: false,
        }
    }

    #[test]
    fn validate_args_accepts_a_well_formed_invocation() {
        assert!(validate_args(&args("my-stack", "template.yaml")).is_ok());
    }

    #[test]
    fn validate_args_rejects_an_empty_stackname() {
        let error = validate_args(&args("", "template.yaml")).unwrap_err();
        assert_eq!(error.code(), ErrorCode::RequiredField);
    }

    #[test]
    fn validate_args_rejects_create_and_deploy_changeset_together() {
        let mut bad = args("my-stack", "template.yaml");
        bad.create_changeset = true;
        bad.deploy_changeset = true;
        let error = validate_args(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::ConflictingFlags);
    }

    #[test]
    fn validate_args_rejects_deploy_changeset_without_a_changeset_name() {
        let mut bad = args("my-stack", "template.yaml");
        bad.deploy_changeset = true;
        let error = validate_args(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::DependencyMissing);
    }

    #[test]
    fn validate_args_rejects_a_missing_parameter_file() {
        let mut bad = args("my-stack", "template.yaml");
        bad.parameter_files.push(PathBuf::from("/no/such/parameters.json"));
        let error = validate_args(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::FileNotFound);
    }

    #[test]
    fn validate_args_rejects_a_deployment_file_combined_with_a_template() {
        let mut bad = args("my-stack", "template.yaml");
        bad.deployment_file = Some(PathBuf::from("bundle.yaml"));
        let error = validate_args(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::ConflictingFlags);
    }

    #[test]
    fn validate_args_rejects_neither_template_nor_deployment_file() {
        let mut bad = args("my-stack", "template.yaml");
        bad.template = None;
        let error = validate_args(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::RequiredField);
    }

    #[test]
    fn validate_args_accepts_a_deployment_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("bundle.yaml");
        std::fs::write(&bundle, "template: \"Resources: {}\"").unwrap();

        let mut ok = args("my-stack", "template.yaml");
        ok.template = None;
        ok.deployment_file = Some(bundle);
        assert!(validate_args(&ok).is_ok());
    }

    #[test]
    fn validate_args_collapses_multiple_failures_into_validation_failed() {
        let mut bad = args("", "template.yaml");
        bad.create_changeset = true;
        bad.deploy_changeset = true;
        let error = validate_args(&bad).unwrap_err();
        assert_eq!(error.code(), ErrorCode::ValidationFailed);
    }
}
