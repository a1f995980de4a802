//! Command-line entry point

use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::discovery::find_project_root;
use crate::s3::S3Uploader;
use crate::settings::Settings;
use crate::upload::Summary;

/// Upload a data product's source folders to S3
#[derive(Debug, Parser)]
#[command(name = "s3-uploader", version, about)]
pub struct Cli {
    /// Root path of the data product [default: directory of this executable]
    #[arg(short = 'p', long = "input-path", visible_alias = "input_path")]
    pub input_path: Option<PathBuf>,

    /// Look for a directory with this name next to the executable's ancestors
    /// when no input path is given
    #[arg(long)]
    pub project: Option<String>,

    /// Configuration document (JSON or YAML) [default: platform config folder]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Upload with this many parallel workers instead of one file at a time
    #[arg(short = 'w', long)]
    pub max_workers: Option<NonZeroUsize>,
}

impl Cli {
    /// Resolve the root directory to scan
    pub fn root_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.input_path {
            return Ok(path.clone());
        }

        let exe = std::env::current_exe().context("Failed to locate the running executable")?;
        let exe_dir = exe
            .parent()
            .map(|p| p.to_path_buf())
            .context("Executable has no parent directory")?;

        match &self.project {
            Some(name) => find_project_root(&exe_dir, name).with_context(|| {
                format!("Project {:?} not found above {}", name, exe_dir.display())
            }),
            None => Ok(exe_dir),
        }
    }

    fn load_settings(&self) -> Result<Settings> {
        let settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load_default()?,
        };
        Ok(settings)
    }
}

/// Run one upload invocation. Per-file failures are part of the returned
/// summary; only fatal errors are returned as `Err`.
pub async fn run(cli: Cli) -> Result<Summary> {
    let root = cli.root_path()?;
    tracing::info!("Root path: {}", root.display());

    let settings = cli.load_settings()?;
    let workers = cli.max_workers.or(settings.max_workers);

    let engine = S3Uploader::new(settings.s3).connect().await?;

    let summary = match workers {
        Some(limit) => {
            engine
                .batch_upload_files(&root, &settings.discovery, limit)
                .await?
        }
        None => engine.upload_files(&root, &settings.discovery).await?,
    };

    Ok(summary)
}
