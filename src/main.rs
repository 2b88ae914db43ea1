use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use waterfall::WaterfallError;
use waterfall::cli::{Cli, Commands, INTERRUPTED_EXIT_CODE, Interrupt, SourceArgs};
use waterfall::pipeline::{self, RunReport};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = match &cli.command {
        Commands::Source(args) => source(args.clone()).await,
    };

    match result {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERR: {e}");
            let user_error = e
                .downcast_ref::<WaterfallError>()
                .is_some_and(WaterfallError::is_user_error);
            if user_error {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn source(args: SourceArgs) -> anyhow::Result<RunReport> {
    let config = args.run_config()?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        let mut received = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            received += 1;
            match Interrupt::nth(received) {
                Interrupt::Cancel => {
                    tracing::warn!("Interrupted, stopping (press Ctrl-C again to exit now)");
                    on_interrupt.cancel();
                }
                Interrupt::Exit => {
                    eprintln!("ERR: interrupted");
                    std::process::exit(INTERRUPTED_EXIT_CODE);
                }
            }
        }
    });

    let report = tokio::task::spawn_blocking(move || pipeline::run(&config, &cancel))
        .await
        .context("Ingestion task panicked")??;
    Ok(report)
}

fn init_tracing(cli: &Cli) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
