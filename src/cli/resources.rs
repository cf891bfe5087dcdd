//! `fog resources`: list the physical resources belonging to a stack.

use crate::{
    cli::{deploy::build_provider, Global},
    config::Config,
    output::{Document, OutputSink, TextOutputSink},
    provider::OperationContext,
};

/// List the physical resources belonging to a stack.
#[derive(Debug, clap::Parser)]
pub struct Args {
    #[clap(long)]
    pub stackname: String,
}

pub async fn run(global: &Global, _config: &Config, args: Args) -> i32 {
    let provider = match build_provider(global).await {
        Ok(provider) => provider,
        Err(error) => {
            eprintln!("{error}");
            return super::deploy::exit_code_for(&error);
        }
    };
    let ctx = OperationContext::new();

    let resources = match provider.stack.describe_stack_resources(&ctx, &args.stackname).await {
        Ok(resources) => resources,
        Err(error) => {
            eprintln!("{error}");
            return super::deploy::exit_code_for(&error);
        }
    };

    let sink = TextOutputSink::new(global.color());
    let mut document = Document::new().title("resources").header(["Logical Id", "Physical Id", "Type", "Status"]);
    for resource in &resources {
        document = document.row([
            resource.logical_resource_id.as_str(),
            resource.physical_resource_id.as_deref().unwrap_or("-"),
            resource.resource_type.as_str(),
            &resource.resource_status.to_string(),
        ]);
    }
    sink.render(&document);

    0
}
