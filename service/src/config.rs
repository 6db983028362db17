//! Layered TOML + environment configuration (spec.md §10.4), following the
//! teacher's `config`-crate pattern of a typed struct loaded and validated
//! once at startup rather than parsed ad hoc at each call site.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use newsgraph_core::error::CoreError;
use newsgraph_cluster::HdbscanParams;
use newsgraph_rag::GraphRagConfig;

fn default_max_connections() -> u32 {
    8
}

fn default_ingest_concurrency() -> usize {
    newsgraph_graph::ingest::DEFAULT_CONCURRENCY
}

/// Which `LlmProvider`/`Embedder` pair to construct (spec.md §9: local and
/// cloud share no parent type, so this only selects which adapter to build).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderConfig {
    Local {
        base_url: String,
        chat_model: String,
        embedding_model: String,
    },
    Cloud {
        base_url: String,
        api_key: String,
        chat_model: String,
        embedding_model: String,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HdbscanSettings {
    pub min_cluster_size: usize,
    pub min_samples: usize,
}

impl Default for HdbscanSettings {
    fn default() -> Self {
        Self {
            min_cluster_size: HdbscanParams::DEFAULT_MIN_CLUSTER_SIZE,
            min_samples: HdbscanParams::DEFAULT_MIN_SAMPLES,
        }
    }
}

impl From<HdbscanSettings> for HdbscanParams {
    fn from(s: HdbscanSettings) -> Self {
        HdbscanParams {
            min_cluster_size: s.min_cluster_size,
            min_samples: s.min_samples,
        }
    }
}

/// GraphRAG retrieval/path tunables (spec.md §6's bit-exact constants),
/// overridable per deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphRagSettings {
    pub node_distance_threshold: f32,
    pub chunk_distance_threshold: f32,
    pub max_chunks: usize,
    pub s: usize,
    pub depth_cap: usize,
    pub max_paths: usize,
}

impl Default for GraphRagSettings {
    fn default() -> Self {
        let d = GraphRagConfig::default();
        Self {
            node_distance_threshold: d.node_distance_threshold,
            chunk_distance_threshold: d.chunk_distance_threshold,
            max_chunks: d.max_chunks,
            s: d.s,
            depth_cap: d.depth_cap,
            max_paths: d.max_paths,
        }
    }
}

impl From<GraphRagSettings> for GraphRagConfig {
    fn from(s: GraphRagSettings) -> Self {
        GraphRagConfig {
            node_distance_threshold: s.node_distance_threshold,
            chunk_distance_threshold: s.chunk_distance_threshold,
            max_chunks: s.max_chunks,
            s: s.s,
            depth_cap: s.depth_cap,
            max_paths: s.max_paths,
        }
    }
}

/// Similarity threshold the CLI/façade defaults merge suggestions to when
/// the caller doesn't supply one (spec.md §6's bit-exact `>= 0.85`).
pub const DEFAULT_MERGE_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone, Deserialize)]
pub struct NewsGraphConfig {
    pub database_path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    pub embedding_dim: usize,

    pub provider: ProviderConfig,

    #[serde(default = "default_ingest_concurrency")]
    pub ingest_concurrency: usize,

    #[serde(default)]
    pub hdbscan: HdbscanSettings,

    #[serde(default)]
    pub graph_rag: GraphRagSettings,
}

impl NewsGraphConfig {
    /// Loads configuration from an optional TOML file, overridable by
    /// `NEWSGRAPH__`-prefixed environment variables (double underscore as
    /// the nesting separator, e.g. `NEWSGRAPH__PROVIDER__BASE_URL`),
    /// matching the teacher's layered-source `config` usage.
    pub fn load(config_path: Option<&Path>) -> Result<Self, CoreError> {
        let mut builder = config::Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("NEWSGRAPH")
                .separator("__")
                .try_parsing(true),
        );
        let raw = builder
            .build()
            .map_err(|e| CoreError::configuration(format!("failed to load configuration: {e}")))?;
        let config: Self = raw
            .try_deserialize()
            .map_err(|e| CoreError::configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.database_path.as_os_str().is_empty() {
            return Err(CoreError::configuration("database_path must not be empty"));
        }
        if self.embedding_dim == 0 {
            return Err(CoreError::configuration("embedding_dim must be greater than zero"));
        }
        if self.ingest_concurrency == 0 {
            return Err(CoreError::configuration("ingest_concurrency must be at least 1"));
        }
        if self.max_connections == 0 {
            return Err(CoreError::configuration("max_connections must be at least 1"));
        }
        match &self.provider {
            ProviderConfig::Local {
                base_url,
                chat_model,
                embedding_model,
            } => {
                if base_url.is_empty() || chat_model.is_empty() || embedding_model.is_empty() {
                    return Err(CoreError::configuration(
                        "local provider requires base_url, chat_model, and embedding_model",
                    ));
                }
            }
            ProviderConfig::Cloud {
                base_url,
                api_key,
                chat_model,
                embedding_model,
            } => {
                if base_url.is_empty() || api_key.is_empty() || chat_model.is_empty() || embedding_model.is_empty() {
                    return Err(CoreError::configuration(
                        "cloud provider requires base_url, api_key, chat_model, and embedding_model",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> NewsGraphConfig {
        NewsGraphConfig {
            database_path: PathBuf::from("newsgraph.sqlite"),
            max_connections: 8,
            embedding_dim: 768,
            provider: ProviderConfig::Local {
                base_url: "http://localhost:11434".into(),
                chat_model: "llama3.1".into(),
                embedding_model: "nomic-embed-text".into(),
            },
            ingest_concurrency: 4,
            hdbscan: HdbscanSettings::default(),
            graph_rag: GraphRagSettings::default(),
        }
    }

    #[test]
    fn default_hdbscan_settings_match_bit_exact_constants() {
        let settings = HdbscanSettings::default();
        assert_eq!(settings.min_cluster_size, 20);
        assert_eq!(settings.min_samples, 10);
    }

    #[test]
    fn validate_rejects_empty_embedding_dim() {
        let mut config = base_config();
        config.embedding_dim = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_cloud_provider_without_api_key() {
        let mut config = base_config();
        config.provider = ProviderConfig::Cloud {
            base_url: "https://api.openai.com/v1".into(),
            api_key: "".into(),
            chat_model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_local_config() {
        assert!(base_config().validate().is_ok());
    }
}
