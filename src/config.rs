use secrecy::SecretString;
use serde::Serialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {name} has an unusable value '{value}': {reason}")]
    BadValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Which implementation produces embedding vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
    /// ONNX bi-encoder loaded from disk.
    Local,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "remote" | "api" => Ok(Self::OpenAi),
            "local" | "onnx" | "bi-encoder" => Ok(Self::Local),
            other => Err(format!("unknown embedding backend '{other}'")),
        }
    }
}

/// Process-wide settings, read once at startup and handed to each component.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub openai_api_key: Option<SecretString>,
    pub openai_base_url: String,
    /// Chat model used by the service and the single-configuration evaluation.
    pub router_model: String,
    pub embed_model: String,
    pub embedding_backend: EmbeddingBackend,
    pub bi_encoder_model_path: PathBuf,
    pub bi_encoder_tokenizer_path: PathBuf,
    pub max_sequence_length: usize,
    /// Number of candidate tools shown to the model per query.
    pub top_k: usize,
    /// Check tool arguments against the declared schema before dispatch.
    pub validate_arguments: bool,
    /// Optional embeddings cache. Unset means every index build embeds the catalog.
    pub embeddings_cache_path: Option<PathBuf>,
    pub test_models: Vec<String>,
    pub tool_counts: Vec<usize>,
    pub num_runs: usize,
    /// Accuracy threshold in percent used by the degradation summary.
    pub accuracy_threshold: f64,
    pub golden_path: PathBuf,
    pub results_dir: PathBuf,
    pub chart_path: PathBuf,
    pub resume: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_secs: 30,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            router_model: "gpt-4o-mini".to_string(),
            embed_model: "text-embedding-3-small".to_string(),
            embedding_backend: EmbeddingBackend::OpenAi,
            bi_encoder_model_path: PathBuf::from("./bi-encoder-model/model_int8.onnx"),
            bi_encoder_tokenizer_path: PathBuf::from("./bi-encoder-model/tokenizer.json"),
            max_sequence_length: 512,
            top_k: 4,
            validate_arguments: false,
            embeddings_cache_path: None,
            test_models: vec![
                "gpt-4.1-mini".to_string(),
                "gpt-4o-mini".to_string(),
                "gpt-4.1".to_string(),
            ],
            tool_counts: vec![5, 10, 15, 20, 25, 30],
            num_runs: 1,
            accuracy_threshold: 80.0,
            golden_path: PathBuf::from("evals/golden.jsonl"),
            results_dir: PathBuf::from("."),
            chart_path: PathBuf::from("performance_degradation.svg"),
            resume: false,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("router_model", &self.router_model)
            .field("embed_model", &self.embed_model)
            .field("embedding_backend", &self.embedding_backend)
            .field("top_k", &self.top_k)
            .field("validate_arguments", &self.validate_arguments)
            .field("test_models", &self.test_models)
            .field("tool_counts", &self.tool_counts)
            .field("num_runs", &self.num_runs)
            .field("accuracy_threshold", &self.accuracy_threshold)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// A `.env` file in the working directory is read first if present.
    /// `TEST_MODELS` and `TOOL_COUNTS` are comma separated; tool counts are
    /// sorted ascending and deduplicated so sweeps always grow the catalog.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let mut tool_counts: Vec<usize> = match env::var("TOOL_COUNTS") {
            Ok(raw) => parse_list("TOOL_COUNTS", &raw)?,
            Err(_) => defaults.tool_counts,
        };
        tool_counts.sort_unstable();
        tool_counts.dedup();

        let test_models = match env::var("TEST_MODELS") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => defaults.test_models,
        };

        let top_k: usize = parse_or("TOP_K", defaults.top_k)?;
        if top_k == 0 {
            return Err(ConfigError::BadValue {
                name: "TOP_K",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let num_runs: usize = parse_or("NUM_RUNS", defaults.num_runs)?;
        if num_runs == 0 {
            return Err(ConfigError::BadValue {
                name: "NUM_RUNS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", defaults.port)?,
            shutdown_timeout_secs: parse_or("SHUTDOWN_TIMEOUT", defaults.shutdown_timeout_secs)?,
            openai_api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            router_model: env::var("ROUTER_MODEL").unwrap_or(defaults.router_model),
            embed_model: env::var("EMBED_MODEL").unwrap_or(defaults.embed_model),
            embedding_backend: parse_or("EMBEDDING_BACKEND", defaults.embedding_backend)?,
            bi_encoder_model_path: env::var("BI_ENCODER_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.bi_encoder_model_path),
            bi_encoder_tokenizer_path: env::var("BI_ENCODER_TOKENIZER_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.bi_encoder_tokenizer_path),
            max_sequence_length: parse_or("MAX_SEQ_LENGTH", defaults.max_sequence_length)?,
            top_k,
            validate_arguments: parse_flag("VALIDATE_ARGUMENTS", defaults.validate_arguments)?,
            embeddings_cache_path: env::var("EMBEDDINGS_CACHE_PATH").ok().map(PathBuf::from),
            test_models,
            tool_counts,
            num_runs,
            accuracy_threshold: parse_or("ACCURACY_THRESHOLD", defaults.accuracy_threshold)?,
            golden_path: env::var("GOLDEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.golden_path),
            results_dir: env::var("RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            chart_path: env::var("CHART_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.chart_path),
            resume: parse_flag("RESUME", defaults.resume)?,
        })
    }
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::BadValue {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_flag(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::BadValue {
                name,
                value: raw,
                reason: "expected true or false".to_string(),
            }),
        },
        Err(_) => Ok(default),
    }
}

fn parse_list(name: &'static str, raw: &str) -> Result<Vec<usize>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>().map_err(|e| ConfigError::BadValue {
                name,
                value: raw.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.top_k, 4);
        assert_eq!(config.num_runs, 1);
        assert_eq!(config.tool_counts, vec![5, 10, 15, 20, 25, 30]);
        assert_eq!(config.embed_model, "text-embedding-3-small");
        assert!((config.accuracy_threshold - 80.0).abs() < f64::EPSILON);
        assert!(!config.validate_arguments);
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("openai".parse::<EmbeddingBackend>(), Ok(EmbeddingBackend::OpenAi));
        assert_eq!(" Local ".parse::<EmbeddingBackend>(), Ok(EmbeddingBackend::Local));
        assert!("faiss".parse::<EmbeddingBackend>().is_err());
    }

    #[test]
    fn test_parse_list_rejects_garbage() {
        assert_eq!(parse_list("TOOL_COUNTS", "5, 10,15").unwrap(), vec![5, 10, 15]);
        assert!(parse_list("TOOL_COUNTS", "5,ten").is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            openai_api_key: Some(SecretString::from("sk-live-secret".to_string())),
            ..Config::default()
        };
        let rendered = format!("{config:?}");
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("sk-live-secret"));
    }
}
