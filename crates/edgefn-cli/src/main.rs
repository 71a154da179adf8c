mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "edgefn", about = "Bundle and deploy Edge Functions")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and functions/
    #[arg(long, global = true, default_value = "supabase")]
    workdir: PathBuf,
    /// Verbose logging and bundler output
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy functions to the remote project
    Deploy {
        /// Functions to deploy (default: every function under functions/)
        slugs: Vec<String>,
        /// Project ref (default: project_id from config.toml)
        #[arg(long)]
        project_ref: Option<String>,
        /// Import map used for every function
        #[arg(long)]
        import_map: Option<PathBuf>,
        /// Disable JWT verification for the deployed functions
        #[arg(long)]
        no_verify_jwt: bool,
        /// Bundle with the local edge-runtime binary instead of docker
        #[arg(long)]
        use_native_bundler: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Deploy {
            slugs,
            project_ref,
            import_map,
            no_verify_jwt,
            use_native_bundler,
        } => {
            commands::deploy(commands::DeployArgs {
                workdir: cli.workdir,
                debug: cli.debug,
                slugs,
                project_ref,
                import_map,
                no_verify_jwt,
                use_native_bundler,
            })
            .await?
        }
    }

    Ok(())
}
