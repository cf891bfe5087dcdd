use std::process;

use clap::Parser;

use fog::{
    cli::{self, Cli},
    config,
    error::ErrorCategory,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.global.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let rootdir = config::resolve_rootdir(cli.global.rootdir.clone());
    let mut config = match config::load(&rootdir) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}", error.render(cli.global.verbose));
            process::exit(exit_code(error.category()));
        }
    };
    config.rootdir = rootdir.to_string_lossy().into_owned();
    if let Some(region) = &cli.global.region {
        config.region = Some(region.clone());
    }
    if let Some(timezone) = &cli.global.timezone {
        config.timezone = timezone.clone();
    }

    let code = cli::main(cli.global, config, cli.command).await;
    process::exit(code);
}

fn exit_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Validation => 2,
        _ => 1,
    }
}
