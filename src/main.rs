// src/main.rs
// =============================================================================
// Entry point of the seo-audit CLI.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Install logging (stderr, so JSON on stdout stays clean)
// 3. Dispatch to the subcommand handler
// 4. Exit with the proper code:
//      0 = report printed (and above --fail-under, if given)
//      1 = report printed, score below --fail-under
//      2 = fatal error, no report
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{AuditArgs, Cli, Commands};
use seo_audit::capability::Capabilities;
use seo_audit::findings::RuleTable;
use seo_audit::output::{print_report, print_rules};
use seo_audit::run_audit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            // One clear message, no partial score
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let default = if verbose { "seo_audit=debug" } else { "seo_audit=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Audit(args) => handle_audit(args).await,
        Commands::Rules { json } => {
            let table = RuleTable::load().context("rule table is invalid")?;
            print_rules(table, json)?;
            Ok(0)
        }
    }
}

async fn handle_audit(args: AuditArgs) -> Result<i32> {
    let options = args.options();
    let capabilities = Capabilities::resolve(&args.capability_config());

    let report = run_audit(&args.url, options, capabilities)
        .await
        .with_context(|| format!("audit of {} failed", args.url))?;

    print_report(&report, args.json)?;

    match args.fail_under {
        Some(threshold) if report.overall_score < threshold => {
            tracing::warn!(
                score = report.overall_score,
                threshold,
                "Score is below the --fail-under threshold"
            );
            Ok(1)
        }
        _ => Ok(0),
    }
}
