use std::path::PathBuf;
use std::time::Duration;

use crate::cli::{ProviderArgs, ProviderKind, StoreArgs};
use crate::embedding::{
    EmbeddingProvider, LOCAL_DEFAULT_DIMENSIONS, LOCAL_MODEL_ID, LocalHashProvider,
    OPENAI_DEFAULT_MODEL_ID, OpenAiConfig, OpenAiProvider, openai_model_dimensions,
};
use crate::error::SyncError;
use crate::store::PoolConfig;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub pool: PoolConfig,
}

impl StoreConfig {
    pub fn from_args(args: &StoreArgs) -> Result<Self, SyncError> {
        if args.pool_size == 0 {
            return Err(SyncError::config("pool size must be at least 1"));
        }

        let db_name = args.db_name.trim();
        if args.db_path.is_none() && db_name.is_empty() {
            return Err(SyncError::config("database name must not be empty"));
        }

        let db_path = args
            .db_path
            .clone()
            .unwrap_or_else(|| args.cache_root.join(format!("{db_name}.sqlite")));

        Ok(Self {
            db_path,
            pool: PoolConfig {
                max_size: args.pool_size,
                acquire_timeout: Duration::from_secs(args.pool_timeout_secs),
                busy_timeout: Duration::from_millis(args.busy_timeout_ms),
            },
        })
    }
}

pub fn build_provider(args: &ProviderArgs) -> Result<Box<dyn EmbeddingProvider>, SyncError> {
    if args.dimensions == Some(0) {
        return Err(SyncError::config("embedding dimensions must be at least 1"));
    }

    match args.provider {
        ProviderKind::Local => {
            let model_id = args.model_id.as_deref().unwrap_or(LOCAL_MODEL_ID);
            let dimensions = args.dimensions.unwrap_or(LOCAL_DEFAULT_DIMENSIONS);
            Ok(Box::new(LocalHashProvider::new(model_id, dimensions)))
        }
        ProviderKind::Openai => {
            let api_key = args
                .api_key
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    SyncError::config("OPENAI_API_KEY is required for the openai provider")
                })?;

            if args.embed_batch_size == 0 {
                return Err(SyncError::config("embed batch size must be at least 1"));
            }

            let model_id = args
                .model_id
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(OPENAI_DEFAULT_MODEL_ID);
            let native = openai_model_dimensions(model_id);
            let dimensions = args.dimensions.or(native).ok_or_else(|| {
                SyncError::config(format!(
                    "unknown embedding width for model {model_id}; pass --dimensions"
                ))
            })?;

            let config = OpenAiConfig {
                api_key: api_key.to_string(),
                base_url: args.api_base_url.clone(),
                model_id: model_id.to_string(),
                dimensions,
                requested_dimensions: requested_dimensions(args.dimensions, native),
                timeout: Duration::from_secs(args.embed_timeout_secs),
                batch_size: args.embed_batch_size,
            };

            let provider = OpenAiProvider::new(config)
                .map_err(|err| SyncError::config(format!("failed to build http client: {err}")))?;
            Ok(Box::new(provider))
        }
    }
}

// Only ask the API to shorten vectors when the width differs from the model's own.
fn requested_dimensions(explicit: Option<usize>, native: Option<usize>) -> Option<usize> {
    explicit.filter(|requested| Some(*requested) != native)
}
