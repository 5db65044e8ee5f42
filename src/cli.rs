use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "kbo-registry",
    version,
    about = "Business registry ingestion and lookup tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the source extract into staging and merge it into the final tables.
    Ingest(IngestArgs),
    /// Search enterprises by number or denomination.
    Search(SearchArgs),
    /// Show one enterprise with resolved labels.
    Show(ShowArgs),
    /// Report the store schema version and row counts.
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, default_value = ".cache/kbo")]
    pub cache_root: PathBuf,

    #[arg(long, env = "KBO_DB_PATH")]
    pub db_path: Option<PathBuf>,
}

impl StoreArgs {
    pub fn resolved_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.cache_root.join("kbo.sqlite"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long, env = "KBO_FILES_DIR", default_value = "files")]
    pub files_dir: PathBuf,

    #[arg(long)]
    pub staging_db_path: Option<PathBuf>,

    #[arg(long, default_value_t = 4)]
    pub workers: usize,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long)]
    pub term: Option<String>,

    #[arg(long)]
    pub page: Option<String>,

    #[arg(long)]
    pub page_size: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    pub enterprise_number: String,

    /// Preferred label language, e.g. `fr` or `nl-BE,nl;q=0.9`.
    #[arg(long)]
    pub lang: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}
