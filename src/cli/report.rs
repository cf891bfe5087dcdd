//! `fog report`: rebuild and render the event timeline for a stack's most recent operation.

use crate::{
    cli::{deploy::build_provider, Global},
    config::Config,
    output::{Document, OutputSink, TextOutputSink},
    provider::OperationContext,
};

/// Render the event timeline for a stack's most recent operation.
#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The name of the stack whose events to render.
    #[clap(long)]
    pub stackname: String,

    /// The change set id or name to pair against the event stream, for richer per-resource rows.
    /// Without this, only stack-level milestones are rendered.
    #[clap(long)]
    pub changeset: Option<String>,
}

pub async fn run(global: &Global, config: &Config, args: Args) -> i32 {
    let provider = match build_provider(global).await {
        Ok(provider) => provider,
        Err(error) => {
            eprintln!("{error}");
            return super::deploy::exit_code_for(&error);
        }
    };
    let ctx = OperationContext::new();

    let stack = match provider.stack.describe_stack(&ctx, &args.stackname).await {
        Ok(Some(stack)) => stack,
        Ok(None) => {
            eprintln!("stack `{}` not found", args.stackname);
            return 1;
        }
        Err(error) => {
            eprintln!("{error}");
            return super::deploy::exit_code_for(&error);
        }
    };

    let events = match provider.stack.describe_stack_events(&ctx, &stack.stack_id).await {
        Ok(events) => events,
        Err(error) => {
            eprintln!("{error}");
            return super::deploy::exit_code_for(&error);
        }
    };

    let changes = match &args.changeset {
        Some(changeset) => match provider.stack.describe_change_set(&ctx, changeset).await {
            Ok(described) => described.changes,
            Err(error) => {
                eprintln!("warning: couldn't load change set `{changeset}`: {error}");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    let zone: chrono_tz::Tz = config.timezone.parse().unwrap_or(chrono_tz::UTC);
    let terminal_at = events.last().map(|e| e.timestamp).unwrap_or_else(chrono::Utc::now);
    let report = crate::report::build(&changes, &events, &stack.stack_id, terminal_at, zone);

    let sink = TextOutputSink::new(global.color());
    let mut document = Document::new().title("timeline").header(["Resource", "Action", "Start", "End", "Critical"]);
    for row in &report.rows {
        document = document.row([
            row.logical_resource_id.clone(),
            row.label.to_string(),
            row.start.to_rfc3339(),
            row.end.map(|e| e.to_rfc3339()).unwrap_or_else(|| if row.incomplete { "(incomplete)".to_string() } else { "-".to_string() }),
            row.critical.to_string(),
        ]);
    }
    for milestone in &report.milestones {
        document = document.row([format!("({})", milestone.status), String::new(), milestone.at.to_rfc3339(), String::new(), String::new()]);
    }
    sink.render(&document);

    0
}
