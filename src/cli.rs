use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::embedding::OPENAI_DEFAULT_BASE_URL;

#[derive(Parser, Debug)]
#[command(
    name = "faqsync",
    version,
    about = "Embed FAQ datasets and keep a relational store in sync with them"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the store tables if they do not exist.
    Setup(SetupArgs),
    /// Refresh stored embeddings when the dataset fingerprint changed.
    Sync(SyncArgs),
    /// Report the stored fingerprint and row counts.
    Status(StatusArgs),
    /// Print the fingerprint of a dataset without touching the store.
    Fingerprint(FingerprintArgs),
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    #[arg(long, env = "FAQSYNC_CACHE_ROOT", default_value = ".cache/faqsync")]
    pub cache_root: PathBuf,

    #[arg(long, env = "DB_NAME", default_value = "default_db")]
    pub db_name: String,

    /// Overrides the `<cache-root>/<db-name>.sqlite` location.
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[arg(long, env = "DB_POOL_SIZE", default_value_t = 10)]
    pub pool_size: usize,

    #[arg(long, env = "DB_POOL_TIMEOUT_SECS", default_value_t = 30)]
    pub pool_timeout_secs: u64,

    #[arg(long, env = "DB_BUSY_TIMEOUT_MS", default_value_t = 5000)]
    pub busy_timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ProviderKind {
    Openai,
    Local,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum HashCheckPolicy {
    /// Treat a failed fingerprint lookup as stale and refresh.
    FailOpen,
    /// Abort the run when the fingerprint lookup fails.
    FailClosed,
}

impl HashCheckPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FailOpen => "fail-open",
            Self::FailClosed => "fail-closed",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    #[arg(long, env = "FAQSYNC_PROVIDER", value_enum, default_value_t = ProviderKind::Openai)]
    pub provider: ProviderKind,

    /// Defaults to text-embedding-3-large (openai) or local-hash-v1 (local).
    #[arg(long, env = "FAQSYNC_MODEL_ID")]
    pub model_id: Option<String>,

    /// Defaults to the model's native width.
    #[arg(long, env = "FAQSYNC_DIMENSIONS")]
    pub dimensions: Option<usize>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_DEFAULT_BASE_URL)]
    pub api_base_url: String,

    #[arg(long, env = "FAQSYNC_EMBED_TIMEOUT_SECS", default_value_t = 60)]
    pub embed_timeout_secs: u64,

    #[arg(long, env = "FAQSYNC_EMBED_BATCH_SIZE", default_value_t = 1000)]
    pub embed_batch_size: usize,
}

#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    /// CSV file with `questions` and `answers` columns; `-` reads stdin.
    #[arg(long)]
    pub dataset: PathBuf,

    /// Re-embed and replace even when the fingerprint is already current.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub provider: ProviderArgs,

    #[arg(
        long,
        env = "FAQSYNC_HASH_CHECK_POLICY",
        value_enum,
        default_value_t = HashCheckPolicy::FailOpen
    )]
    pub hash_check_policy: HashCheckPolicy,

    #[arg(long, env = "FAQSYNC_LOCK_TTL_SECS", default_value_t = 900)]
    pub lock_ttl_secs: u64,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Decode every stored embedding and fail on malformed blobs.
    #[arg(long, default_value_t = false)]
    pub verify_embeddings: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FingerprintArgs {
    #[arg(long)]
    pub dataset: PathBuf,
}
