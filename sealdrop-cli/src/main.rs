mod config;
use clap::{Parser, Subcommand};
use config::Config;
use futures_util::future::join_all;
use sealdrop_core::{
    DropPublishJob, FolderId, FolderLockOperation, JobEvent, JobStatus, JsonDropMerger, LockToken,
    PublishDropOperation, ResolveFolderOperation, ResolveFolderOperationRequest,
};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "sealdrop")]
#[command(about = "Publish file drops into end-to-end encrypted folders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge pending file drops of encrypted folders into their metadata
    Publish {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        /// Folder paths relative to the account root
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print the server-side id of a folder
    Resolve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        path: String,
    },
    /// Release a folder lock left behind by a crashed client
    Unlock {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.yaml")]
        config: String,

        folder_id: String,

        token: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sealdrop=info,sealdrop_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Publish { config, paths } => match load_config(&config) {
            Ok(cfg) => publish_drops(&cfg, paths).await,
            Err(error) => Err(error),
        },
        Commands::Resolve { config, path } => match load_config(&config) {
            Ok(cfg) => resolve_folder(&cfg, path).await,
            Err(error) => Err(error),
        },
        Commands::Unlock {
            config,
            folder_id,
            token,
        } => match load_config(&config) {
            Ok(cfg) => unlock_folder(&cfg, folder_id, token).await,
            Err(error) => Err(error),
        },
    };

    if let Err(error) = outcome {
        tracing::error!("{}", error);
        std::process::exit(1);
    }
}

fn load_config(path: &str) -> sealdrop_core::Result<Config> {
    tracing::info!("Loading sealdrop config: {}", path);
    Config::from_file(path)
}

async fn publish_drops(config: &Config, paths: Vec<String>) -> sealdrop_core::Result<()> {
    let transport = Arc::new(config.client_builder().build()?);
    let operation = PublishDropOperation::new(transport, Arc::new(JsonDropMerger::new()));

    // Jobs on the same folder must not overlap; distinct folders run together.
    let mut folders = BTreeSet::new();
    for path in paths {
        folders.insert(ResolveFolderOperationRequest::new(path).normalized_path()?);
    }

    let mut jobs = Vec::with_capacity(folders.len());
    for folder in folders {
        let (mut job, events) = DropPublishJob::new(operation.clone(), folder);
        job.start()?;
        jobs.push((job, events));
    }

    let statuses = join_all(jobs.iter_mut().map(|(job, _)| job.wait())).await;

    let mut stdout = std::io::stdout().lock();
    let mut failed = 0usize;
    for ((job, mut events), status) in jobs.into_iter().zip(statuses) {
        let status = status.unwrap_or(JobStatus::NormalError);
        while let Ok(event) = events.try_recv() {
            if let JobEvent::FolderUnlocked {
                folder_id,
                http_status,
            } = event
            {
                tracing::info!(
                    "path={} folder_id={} unlock_status={}",
                    job.path(),
                    folder_id,
                    http_status
                );
            }
        }

        writeln!(stdout, "{}\t{}", job.path(), status)?;
        if !status.is_success() {
            failed += 1;
        }
    }

    if failed > 0 {
        return Err(sealdrop_core::DropError::Internal(format!(
            "{} drop publish job(s) failed",
            failed
        )));
    }

    Ok(())
}

async fn resolve_folder(config: &Config, path: String) -> sealdrop_core::Result<()> {
    let transport = Arc::new(config.client_builder().build()?);
    let folder = ResolveFolderOperation::new(transport)
        .run(ResolveFolderOperationRequest::new(path))
        .await?;

    writeln!(std::io::stdout(), "{}\t{}", folder.path, folder.folder_id)?;
    Ok(())
}

async fn unlock_folder(
    config: &Config,
    folder_id: String,
    token: String,
) -> sealdrop_core::Result<()> {
    let transport = Arc::new(config.client_builder().build()?);
    let lock = LockToken::new(FolderId::from(folder_id.as_str()), token);

    let released = FolderLockOperation::new(transport).run_release(lock).await?;
    tracing::info!(
        "Released lock of folder {} (status={})",
        released.folder_id,
        released.http_status
    );
    Ok(())
}
