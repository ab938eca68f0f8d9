mod commands;
mod utils;

use clap::{Args, Parser, Subcommand};
use clustered_config::ConfigError;
use clustered_core::{Application, ClusteredError, ConfigSources, ErrorCategory, NodeType, ResourceState};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for internal invariant violations (EX_SOFTWARE)
const EXIT_UNEXPECTED: u8 = 70;

#[derive(Parser)]
#[command(name = "clustered")]
#[command(about = "Track encryptors, repositories, clusters and nodes in a local metadata store", long_about = None)]
struct Cli {
    /// Print debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Configuration file options shared by `init` and `refresh`
#[derive(Args, Debug, Clone)]
struct SourceArgs {
    /// Repository configuration file (else CLUSTERED__REPOSITORY_CONFIG_FILE or config/Repository_config.json)
    #[arg(long)]
    repo_config: Option<PathBuf>,
    /// Cluster configuration file (else CLUSTERED__CLUSTER_CONFIG_FILE or config/Cluster_config.json)
    #[arg(long)]
    cluster_config: Option<PathBuf>,
    /// Parent (master) node configuration file
    #[arg(long)]
    parent_node_config: Option<PathBuf>,
    /// Child (slave) node configuration file
    #[arg(long)]
    child_node_config: Option<PathBuf>,
    /// Directory holding the default *_config.json files
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,
}

impl SourceArgs {
    fn into_sources(self, environ: Option<PathBuf>) -> ConfigSources {
        ConfigSources {
            environ,
            repository: self.repo_config,
            cluster: self.cluster_config,
            parent_node: self.parent_node_config,
            child_node: self.child_node_config,
            fallback_dir: self.config_dir,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace, capture configuration and build the metadata store
    Init {
        /// Environment configuration file (else CLUSTERED__ENVIRON_CONFIG_FILE or config/Environment_config.json)
        #[arg(long)]
        env_config: Option<PathBuf>,
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// Re-capture the optional configuration documents
    Refresh {
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// Remove the metadata store and the workspace
    Destroy {
        /// Run without confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Manage encryptors
    #[command(subcommand)]
    Encryptor(EncryptorCommands),
    /// Manage repositories
    #[command(subcommand)]
    Repository(RepositoryCommands),
    /// Manage clusters
    #[command(subcommand)]
    Cluster(ClusterCommands),
    /// Manage nodes
    #[command(subcommand)]
    Node(NodeCommands),
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum EncryptorCommands {
    /// Create an encryptor with a fresh key
    Add { name: String },
    /// Show one encryptor
    Describe {
        name: String,
        /// Fail if the encryptor is soft-deleted
        #[arg(long)]
        active: bool,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List encryptors
    List {
        /// Include soft-deleted encryptors
        #[arg(short, long)]
        all: bool,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete an encryptor
    Delete {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Recover a soft-deleted encryptor
    Recover { name: String },
    /// Permanently remove soft-deleted encryptors
    Flush {
        #[arg(short, long)]
        yes: bool,
    },
    /// Permanently remove every encryptor
    PurgeAll {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum RepositoryCommands {
    /// Register a repository under an encryptor
    Add {
        name: String,
        encryptor: String,
        /// Cloud access key (else REPOSITORY_CONFIG ACCESS_KEY)
        #[arg(long, env = "CLUSTERED__ACCESS_KEY", hide_env_values = true)]
        access_key: Option<String>,
        /// Cloud secret key (else REPOSITORY_CONFIG SECRET_KEY)
        #[arg(long, env = "CLUSTERED__SECRET_KEY", hide_env_values = true)]
        secret_key: Option<String>,
        /// Cloud region (else REPOSITORY_CONFIG REGION)
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show one repository
    Describe {
        name: String,
        #[arg(long)]
        active: bool,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List repositories
    List {
        #[arg(short, long)]
        all: bool,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a repository
    Delete {
        name: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Recover a soft-deleted repository
    Recover { name: String },
    /// Permanently remove soft-deleted repositories
    Flush {
        #[arg(short, long)]
        yes: bool,
    },
    /// Permanently remove every repository
    PurgeAll {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Create a cluster in a repository
    Add {
        name: String,
        repository: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        security_group_id: Option<String>,
        /// Whitelisted IP or CIDR (repeatable)
        #[arg(long = "whitelist-ip")]
        whitelisted_ips: Vec<String>,
    },
    /// Show one cluster
    Describe {
        name: String,
        repository: String,
        #[arg(long)]
        active: bool,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List clusters
    List {
        /// Only clusters of this repository
        #[arg(short, long)]
        repository: Option<String>,
        #[arg(short, long)]
        all: bool,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a cluster
    Delete {
        name: String,
        repository: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Recover a soft-deleted cluster
    Recover { name: String, repository: String },
    /// Record the provisioning state of a cluster
    SetState {
        name: String,
        repository: String,
        /// AVAILABLE, RUNNING, STOPPED or TERMINATED
        state: ResourceState,
    },
    /// Permanently remove soft-deleted clusters
    Flush {
        #[arg(short, long)]
        repository: Option<String>,
        #[arg(short, long)]
        yes: bool,
    },
    /// Permanently remove every cluster
    PurgeAll {
        #[arg(short, long)]
        repository: Option<String>,
        #[arg(short, long)]
        yes: bool,
    },
}

/// Cluster scope for node listing and removal
#[derive(Args, Debug, Clone)]
struct NodeScope {
    #[arg(short, long, requires = "repository")]
    cluster: Option<String>,
    #[arg(short, long, requires = "cluster")]
    repository: Option<String>,
}

#[derive(Subcommand)]
enum NodeCommands {
    /// Add a master or slave node to a cluster
    Add {
        name: String,
        cluster: String,
        repository: String,
        /// master or slave
        #[arg(short = 't', long = "type")]
        node_type: NodeType,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        instance_type: Option<String>,
        #[arg(long)]
        key_pair_name: Option<String>,
        /// Block device mapping as JSON
        #[arg(long)]
        block_device_mapping: Option<String>,
    },
    /// Show one node
    Describe {
        name: String,
        cluster: String,
        repository: String,
        #[arg(long)]
        active: bool,
        /// Print the record as JSON
        #[arg(long)]
        json: bool,
    },
    /// List nodes
    List {
        #[command(flatten)]
        scope: NodeScope,
        #[arg(short, long)]
        all: bool,
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Soft-delete a node
    Delete {
        name: String,
        cluster: String,
        repository: String,
        #[arg(short, long)]
        yes: bool,
    },
    /// Recover a soft-deleted node
    Recover {
        name: String,
        cluster: String,
        repository: String,
    },
    /// Permanently remove soft-deleted nodes
    Flush {
        #[command(flatten)]
        scope: NodeScope,
        #[arg(short, long)]
        yes: bool,
    },
    /// Permanently remove every node
    PurgeAll {
        #[command(flatten)]
        scope: NodeScope,
        #[arg(short, long)]
        yes: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "Error:".red().bold(), err);
            tracing::debug!(error = ?err, "command failed");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Diagnostics go to stderr, filtered by CLUSTERED_LOG (default `warn`)
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("CLUSTERED_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let unexpected = match err.downcast_ref::<ClusteredError>() {
        Some(e) => e.category() == ErrorCategory::UnexpectedSystem,
        None => err
            .downcast_ref::<ConfigError>()
            .is_some_and(ConfigError::is_unexpected),
    };
    if unexpected { EXIT_UNEXPECTED } else { 1 }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let command = match cli.command {
        Commands::Version => {
            println!("clustered {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        command => command,
    };

    let mut app = Application::locate()?;
    tracing::debug!(workspace = %app.workspace().root().display(), "workspace located");

    match command {
        Commands::Init {
            env_config,
            sources,
        } => {
            commands::application::handle_init(&mut app, &sources.into_sources(env_config))?;
        }
        Commands::Refresh { sources } => {
            commands::application::handle_refresh(&mut app, &sources.into_sources(None))?;
        }
        Commands::Destroy { yes } => {
            commands::application::handle_destroy(&mut app, yes)?;
        }
        Commands::Encryptor(cmd) => {
            commands::encryptor::handle(&mut app, cmd)?;
        }
        Commands::Repository(cmd) => {
            commands::repository::handle(&mut app, cmd)?;
        }
        Commands::Cluster(cmd) => {
            commands::cluster::handle(&mut app, cmd)?;
        }
        Commands::Node(cmd) => {
            commands::node::handle(&mut app, cmd)?;
        }
        Commands::Version => {}
    }

    Ok(())
}
