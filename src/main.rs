mod app;
mod audit;
mod config;
mod metadata;
mod normalize;
mod pipeline;
mod sinks;
mod source;
mod stats;
mod utils;

use anyhow::Result;
use clap::Parser;

use app::{
    Cli, Command, load_rules, log_anomalies, run_audit, run_transform, write_anomalies,
    write_report,
};
use config::RuntimeConfig;
use source::ElementReader;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let rules = load_rules(cli.rules.as_deref(), cli.replace)?;

    match cli.command {
        Command::Audit {
            input,
            format,
            streets,
        } => {
            tracing::info!("Auditing {:?}", input);
            let elements = ElementReader::from_path(&input)?;
            if streets {
                let street_types = audit::classify_street_types(elements, &rules)?;
                write_report(&street_types, format, std::io::stdout().lock())?;
            } else {
                let report = run_audit(elements, &rules, cli.verbose)?;
                write_report(&report, format, std::io::stdout().lock())?;
            }
        }
        Command::Transform {
            input,
            output,
            pretty,
            anomalies,
        } => {
            let output = output.unwrap_or_else(|| utils::default_output_path(&input));
            let runtime = RuntimeConfig {
                pretty,
                progress: cli.verbose,
            };

            let start = std::time::Instant::now();
            let summary = run_transform(&input, &output, &rules, &runtime)?;
            log_anomalies(&summary.anomalies);
            if let Some(path) = anomalies {
                write_anomalies(&path, &summary.anomalies)?;
            }

            let elapsed = start.elapsed();
            tracing::info!(
                "Done! Written {} of {} elements in {:.2}s ({} anomalies)",
                summary.records,
                summary.elements,
                elapsed.as_secs_f64(),
                summary.anomalies.len()
            );
        }
        Command::Stats { input, format } => {
            let summary = stats::summarize_file(&input)?;
            tracing::info!("Stats: {} documents in {:?}", summary.documents, input);
            write_report(&summary, format, std::io::stdout().lock())?;
        }
    }

    Ok(())
}
