mod cli;
mod commands;
mod output;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use labctl::{Error as LabError, Parser as ConfigParser, SchemaStore};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(lab_error) = e.downcast_ref::<LabError>() {
            eprintln!("Error: {}", lab_error);
            if let Some(suggestion) = lab_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let out = output::select(cli.quiet);

    // ── Tier 1: Commands that need nothing on disk ────────────────────
    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            return Ok(());
        }
        Commands::Deploy {
            compose_file,
            no_detach,
            services,
        } => {
            return commands::run_deploy(compose_file, services, !*no_detach, out).await;
        }
        Commands::Stop {
            compose_file,
            volumes,
            services,
        } => {
            return commands::run_stop(compose_file, services, *volumes, out).await;
        }
        _ => {}
    }

    // ── Tier 2: Commands that need only the configuration ─────────────
    if let Commands::Urls = &cli.command {
        let config = ConfigParser::new().load_config(&cli.config)?;
        return commands::run_urls(&config, out);
    }

    // ── Tier 3: Commands that need the schema directory ───────────────
    let store = SchemaStore::new();
    let schemas = store.load(&cli.schemas, false)?;
    tracing::debug!("Loaded {} schema(s) from {}", schemas.len(), cli.schemas.display());

    match &cli.command {
        Commands::Resolve {
            services,
            include_dependents,
            json,
        } => return commands::run_resolve(&schemas, services, *include_dependents, *json, out),
        Commands::Tree {
            service,
            max_depth,
            json,
        } => return commands::run_tree(&schemas, service, *max_depth, *json, out),
        Commands::RemovalOrder { services } => {
            return commands::run_removal_order(&schemas, services, out)
        }
        Commands::Info { service, json } => return commands::run_info(&schemas, service, *json, out),
        Commands::Services { min_maturity, json } => {
            return commands::run_services(&schemas, *min_maturity, *json, out)
        }
        _ => {}
    }

    // ── Tier 4: Commands that need schemas and configuration ──────────
    let mut config = ConfigParser::new().load_config(&cli.config)?;
    config.apply_schema_defaults(&schemas);

    match &cli.command {
        Commands::Validate { strict } => commands::run_validate(&schemas, &config, *strict, out),
        Commands::Build {
            output,
            skip_validation,
            no_backup,
        } => commands::run_build(
            &schemas,
            &config,
            &commands::BuildOptions {
                output_dir: output.clone(),
                skip_validation: *skip_validation,
                backup: !*no_backup,
            },
            out,
        ),
        // Handled in earlier tiers
        Commands::Completions { .. }
        | Commands::Deploy { .. }
        | Commands::Stop { .. }
        | Commands::Urls
        | Commands::Resolve { .. }
        | Commands::Tree { .. }
        | Commands::RemovalOrder { .. }
        | Commands::Info { .. }
        | Commands::Services { .. } => unreachable!(),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
