//! `fog describe-changeset`: create (or reuse) a change set and report what it would do, without
//! executing it. A thin wrapper over the same Deployment State Machine `deploy` drives, with
//! `create_only` forced on.

use std::path::PathBuf;

use crate::{
    change_set,
    cli::{deploy as deploy_cli, Global},
    config::Config,
    deploy::{DeployOutcome, DeploymentPlan, NonInteractivePrompter},
    output::{Document, OutputSink, TextOutputSink},
    provider::{OperationContext, TemplateSource},
    template,
};

/// Create a change set and report what it would do, without executing it.
#[derive(Debug, clap::Parser)]
pub struct Args {
    #[clap(long)]
    pub stackname: String,

    #[clap(long)]
    pub template: String,

    #[clap(long = "parameters")]
    pub parameter_files: Vec<PathBuf>,

    #[clap(long = "tags")]
    pub tag_files: Vec<PathBuf>,

    #[clap(long)]
    pub bucket: Option<String>,

    #[clap(long)]
    pub changeset: Option<String>,

    #[clap(long)]
    pub capability: Vec<String>,
}

pub async fn run(global: &Global, config: &Config, args: Args) -> i32 {
    match try_run(global, config, args).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("{error}");
            deploy_cli::exit_code_for(&error)
        }
    }
}

async fn try_run(global: &Global, config: &Config, args: Args) -> Result<i32, crate::error::FogError> {
    let rootdir = PathBuf::from(&config.rootdir);
    let templates_dir = rootdir.join(&config.templates.directory);
    let loaded = template::load_template(&templates_dir, &args.template).await?;

    let template_source = match loaded.size_class() {
        template::SizeClass::Inline => TemplateSource::Inline(loaded.content.clone()),
        template::SizeClass::RequiresUpload => {
            let bucket = args.bucket.as_deref().ok_or_else(|| {
                crate::error::FogError::new(crate::error::ErrorCode::ValidationFailed, "template requires upload but no --bucket was supplied")
            })?;
            let provider = deploy_cli::build_provider(global).await?;
            let unix_nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_err(|e| crate::error::FogError::new(crate::error::ErrorCode::Internal, "system clock before epoch").with_cause(e))?
                .as_nanos();
            let uploaded = template::upload_template(provider.object_store.as_ref(), &OperationContext::new(), &loaded, bucket, unix_nanos).await?;
            TemplateSource::S3Url(uploaded.url)
        }
    };

    let changeset_name = args.changeset.clone().unwrap_or_else(|| format!("{}-describe", args.stackname));

    let plan = DeploymentPlan {
        stack_name: args.stackname.clone(),
        template: template_source,
        parameters: Vec::new(),
        tags: Vec::new(),
        capabilities: args.capability.clone(),
        changeset_name,
        dry_run: false,
        non_interactive: true,
        create_only: true,
        deploy_only: false,
    };

    let provider = deploy_cli::build_provider(global).await?;
    let ctx = OperationContext::new();
    let prompter = NonInteractivePrompter;

    let outcome = crate::deploy::run(&provider, &ctx, &prompter, global.region.as_deref().unwrap_or("us-east-1"), plan).await;

    let sink = TextOutputSink::new(global.color());
    match &outcome {
        DeployOutcome::ChangesetOnly(info) | DeployOutcome::NoOp(info) => {
            let mut document = Document::new().title("change set").header(["Field", "Value"]);
            document = document.row(["Stack", info.stack_name.as_str()]);
            if let Some(changeset) = &info.changeset {
                let analysis = change_set::analyze(&changeset.changes);
                for (action, count) in &analysis.summary.counts {
                    document = document.row([(*action).to_string(), count.to_string()]);
                }
                document = document.row(["Dangerous".to_string(), analysis.danger.len().to_string()]);
            }
            sink.render(&document);
            Ok(0)
        }
        DeployOutcome::Failed(info) => {
            eprintln!("{}", info.deployment_error.as_deref().unwrap_or("change set creation failed"));
            Ok(1)
        }
        _ => Ok(1),
    }
}
