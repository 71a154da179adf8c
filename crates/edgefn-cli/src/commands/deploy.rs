use std::path::PathBuf;

use edgefn::build::EdgeBundler;
use edgefn::cloud::FunctionsClient;
use edgefn::{BundlerKind, DeployOptions, Deployer, ProjectConfig, ProjectRef, dashboard_url};
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;

use super::ACCESS_TOKEN_ENV;

/// Flags of `edgefn deploy` plus the global ones it needs.
pub struct DeployArgs {
    pub workdir: PathBuf,
    pub debug: bool,
    pub slugs: Vec<String>,
    pub project_ref: Option<String>,
    pub import_map: Option<PathBuf>,
    pub no_verify_jwt: bool,
    pub use_native_bundler: bool,
}

/// Bundle and upload the requested functions, one at a time.
pub async fn deploy(args: DeployArgs) -> anyhow::Result<()> {
    let workdir = std::path::absolute(&args.workdir)?;
    let mut config = ProjectConfig::load(&workdir)?;
    if args.use_native_bundler {
        config.edge_runtime.bundler = BundlerKind::Native;
    }

    let project_ref = resolve_project_ref(args.project_ref.as_deref(), &config)?;
    let token = access_token()?;

    let options = DeployOptions {
        slugs: args.slugs,
        import_map: args.import_map.map(std::path::absolute).transpose()?,
        verify_jwt: args.no_verify_jwt.then_some(false),
    };

    let bundler = EdgeBundler::from_config(&config.edge_runtime, &workdir, args.debug);
    tracing::debug!(bundler = ?bundler.kind(), workdir = %workdir.display(), "deploy settings");
    let client = FunctionsClient::new(&config.api.url, token, project_ref.clone());
    let api = config.api.clone();
    let deployer = Deployer::new(config, workdir, bundler, client);

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_interrupt(cancel.clone());
    let result = deployer.deploy(&options, &cancel).await;
    interrupt.abort();

    let summary = match result {
        Ok(summary) => summary,
        Err(e) if e.is_cancelled() => anyhow::bail!("deploy interrupted"),
        Err(e) => return Err(e.into()),
    };

    if summary.deployed.is_empty() {
        println!("No functions deployed.");
        return Ok(());
    }
    println!("{}", summary.message(&project_ref));
    println!(
        "You can inspect your deployment in the Dashboard: {}",
        dashboard_url(&api, &project_ref)
    );
    Ok(())
}

fn resolve_project_ref(flag: Option<&str>, config: &ProjectConfig) -> anyhow::Result<ProjectRef> {
    let Some(raw) = flag.or(config.project_id.as_deref()) else {
        anyhow::bail!(
            "project ref not set.\n\
             Pass --project-ref, or set project_id in config.toml."
        );
    };
    Ok(ProjectRef::parse(raw)?)
}

fn access_token() -> anyhow::Result<SecretString> {
    let dotenv_loaded = dotenvy::dotenv().is_ok();
    tracing::debug!(dotenv = dotenv_loaded, "loading access token");

    match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => Ok(SecretString::from(token)),
        Ok(_) | Err(std::env::VarError::NotPresent) => {
            anyhow::bail!("{ACCESS_TOKEN_ENV} is not set. Generate a token and export it first.")
        }
        Err(e) => Err(anyhow::anyhow!(e).context(format!("invalid {ACCESS_TOKEN_ENV}"))),
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("interrupt received, cancelling deploy");
                token.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "failed to listen for interrupt"),
        }
    })
}
