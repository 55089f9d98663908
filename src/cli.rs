use clap::{Parser, Subcommand};
use labctl::schema::Maturity;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "labctl")]
#[command(about = "Generate and deploy a docker compose stack from service schemas", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the lab configuration file
    #[arg(short, long, global = true, env = "LABCTL_CONFIG", default_value = "config/config.yaml")]
    pub config: PathBuf,

    /// Directory holding the service schema documents
    #[arg(short, long, global = true, env = "LABCTL_SCHEMAS", default_value = "config/services")]
    pub schemas: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors and command results
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the configuration against the schemas and cross-service rules
    Validate {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
    /// Write docker-compose.yml and .env for the enabled services
    Build {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
        /// Build even when validation reports errors
        #[arg(long)]
        skip_validation: bool,
        /// Do not back up an existing docker-compose.yml
        #[arg(long)]
        no_backup: bool,
    },
    /// Expand a selection with its dependencies, in start order
    Resolve {
        /// Service ids
        #[arg(required = true)]
        services: Vec<String>,
        /// Also pull in services that depend on the selection
        #[arg(long)]
        include_dependents: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the dependency tree of a service
    Tree {
        /// Service id
        service: String,
        /// Maximum depth to expand
        #[arg(long, default_value_t = labctl::dependency::DEFAULT_TREE_DEPTH)]
        max_depth: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest batches for removing services without breaking dependents
    RemovalOrder {
        /// Service ids to remove
        #[arg(required = true)]
        services: Vec<String>,
    },
    /// Show dependencies, dependents and required services of one service
    Info {
        /// Service id
        service: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List available service schemas grouped by category
    Services {
        /// Hide schemas below this maturity (alpha, beta, stable)
        #[arg(long)]
        min_maturity: Option<Maturity>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the URL of every enabled service
    Urls,
    /// Start the generated stack with docker compose
    Deploy {
        /// Manifest to deploy
        #[arg(short = 'f', long, default_value = "docker-compose.yml")]
        compose_file: PathBuf,
        /// Stay attached to the containers
        #[arg(long)]
        no_detach: bool,
        /// Only start these services (defaults to all)
        services: Vec<String>,
    },
    /// Stop the generated stack, or only the named services
    Stop {
        /// Manifest the stack was deployed from
        #[arg(short = 'f', long, default_value = "docker-compose.yml")]
        compose_file: PathBuf,
        /// Also remove named volumes (full teardown only)
        #[arg(long)]
        volumes: bool,
        /// Only stop these services (defaults to all)
        services: Vec<String>,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: clap_complete::Shell,
    },
}
