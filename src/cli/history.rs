//! `fog history`: show previously recorded deployments from the Deployment Log.
//!
//! This is the one place outside the core that reads the Deployment Log's file directly — the
//! log writer itself never reads, per spec.md §4.J/§5.

use std::path::PathBuf;

use crate::{cli::Global, config::Config, output::OutputSink};

/// Show previously recorded deployments from the Deployment Log.
#[derive(Debug, clap::Parser)]
pub struct Args {
    /// Only show deployments for this stack.
    #[clap(long)]
    pub stackname: Option<String>,

    /// Show at most this many of the most recent entries.
    #[clap(long, default_value_t = 20)]
    pub limit: usize,
}

pub fn run(global: &Global, config: &Config, args: Args) -> i32 {
    let rootdir = global.rootdir.clone().unwrap_or_else(|| PathBuf::from(&config.rootdir));
    let path = rootdir.join(&config.deployments.directory).join(&config.logging.filename);

    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            eprintln!("no deployment log at `{}`", path.display());
            return 0;
        }
        Err(error) => {
            eprintln!("couldn't read deployment log `{}`: {error}", path.display());
            return 1;
        }
    };

    let mut records: Vec<crate::log::DeploymentRecord> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .filter(|record: &crate::log::DeploymentRecord| {
            args.stackname.as_deref().is_none_or(|name| record.stack_name == name)
        })
        .collect();

    records.sort_by_key(|record| record.timestamp);
    records.reverse();
    records.truncate(args.limit);

    let sink = crate::output::TextOutputSink::new(global.color());
    let mut document = crate::output::Document::new().title("history").header(["Timestamp", "Stack", "Type", "Duration (s)", "Success"]);
    for record in &records {
        document = document.row([
            record.timestamp.to_rfc3339(),
            record.stack_name.clone(),
            format!("{:?}", record.deployment_type),
            format!("{:.1}", record.duration_seconds),
            record.success.to_string(),
        ]);
    }
    sink.render(&document);

    0
}
