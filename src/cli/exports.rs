//! `fog exports`: look up an exported value and the stacks that import it.

use crate::{
    cli::{deploy::build_provider, Global},
    config::Config,
    output::{Document, OutputSink, TextOutputSink},
    provider::OperationContext,
};

/// Look up an exported value (`Fn::ImportValue` target) and the stacks that import it.
#[derive(Debug, clap::Parser)]
pub struct Args {
    /// The export name to look up.
    #[clap(long)]
    pub export_name: String,
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

    let import = match provider.stack.list_imports(&ctx, &args.export_name).await {
        Ok(import) => import,
        Err(error) => {
            eprintln!("{error}");
            return super::deploy::exit_code_for(&error);
        }
    };

    let sink = TextOutputSink::new(global.color());
    let mut document = Document::new().title("exports").header(["Export", "Value", "Imported By"]);
    let importers = if import.importing_stack_ids.is_empty() { "(none)".to_string() } else { import.importing_stack_ids.join(", ") };
    document = document.row([import.export_name.as_str(), import.physical_value.as_str(), importers.as_str()]);
    sink.render(&document);

    0
}
