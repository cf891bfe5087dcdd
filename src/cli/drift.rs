//! `fog drift`: detect and report drift for a single stack.

use std::collections::BTreeSet;

use crate::{
    cli::Global,
    cli::deploy::{build_provider, exit_code_for},
    config::Config,
    drift::{self, DriftRequest},
    output::{Document, OutputSink, TextOutputSink},
    provider::OperationContext,
};

/// Detect drift between a stack's template and the live resources it manages.
#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The name of the stack to check.
    #[clap(long)]
    pub stackname: String,

    /// Tag keys to ignore when comparing managed resources (in addition to `drift.ignore-tags`).
    #[clap(long = "ignore-tags")]
    pub ignore_tags: Vec<String>,

    /// Route destinations to ignore when they resolve to a blackhole.
    #[clap(long = "ignore-blackholes")]
    pub ignore_blackholes: Vec<String>,

    /// Resource types to enumerate for unmanaged-resource detection.
    #[clap(long = "detect-unmanaged")]
    pub detect_unmanaged: Vec<String>,

    /// Identifiers to exclude from unmanaged-resource reporting.
    #[clap(long = "ignore-unmanaged")]
    pub ignore_unmanaged: Vec<String>,
}

pub async fn run(global: &Global, config: &Config, args: Args) -> i32 {
    let provider = match build_provider(global).await {
        Ok(provider) => provider,
        Err(error) => {
            eprintln!("{error}");
            return exit_code_for(&error);
        }
    };
    let ctx = OperationContext::new();
    ctx.cancel_on_sigint();

    let mut ignored_tags: BTreeSet<String> = config.drift.ignore_tags.iter().cloned().collect();
    ignored_tags.extend(args.ignore_tags);
    let mut ignored_blackholes: BTreeSet<String> = config.drift.ignore_blackholes.iter().cloned().collect();
    ignored_blackholes.extend(args.ignore_blackholes);
    let mut unmanaged_types: Vec<String> = config.drift.detect_unmanaged_resources.clone();
    unmanaged_types.extend(args.detect_unmanaged);
    let mut ignored_unmanaged: BTreeSet<String> = config.drift.ignore_unmanaged_resources.iter().cloned().collect();
    ignored_unmanaged.extend(args.ignore_unmanaged);

    let request = DriftRequest {
        stack_name: args.stackname.clone(),
        ignored_tags,
        ignored_blackhole_routes: ignored_blackholes,
        unmanaged_types_to_detect: unmanaged_types,
        ignored_unmanaged_identifiers: ignored_unmanaged,
    };

    let result = match drift::detect(&provider, &ctx, &request).await {
        Ok(result) => result,
        Err(error) => {
            eprintln!("{error}");
            return exit_code_for(&error);
        }
    };

    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }

    let sink = TextOutputSink::new(global.color());
    let mut document = Document::new().title("drift").header(["Resource", "Status", "Detail"]);
    for entry in &result.in_sync {
        document = document.row([entry.logical_resource_id.as_str(), "IN_SYNC", ""]);
    }
    for entry in &result.drifted {
        document = document.row([entry.logical_resource_id.as_str(), "MODIFIED", &format!("{} propert{} changed", entry.diff.len(), if entry.diff.len() == 1 { "y" } else { "ies" })]);
    }
    for entry in &result.unmanaged {
        document = document.row([entry.identifier.as_str(), "UNMANAGED", entry.display_name.as_deref().unwrap_or(entry.resource_type.as_str())]);
    }
    sink.render(&document);

    if result.drifted.is_empty() { 0 } else { 1 }
}
