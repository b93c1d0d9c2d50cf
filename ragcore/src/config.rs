//! Runtime configuration: the full environment-variable surface the backend reads,
//! collected into one `AppConfig` at startup via [`AppConfig::from_env`].
//!
//! `config::load_and_apply("regrag", None)` should be called once, before this,
//! so that `.env`/XDG values are already in the process environment by the time
//! `from_env` runs.

use crate::error::ConfigError;
use std::time::Duration;

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_required(key: &str) -> Result<String, ConfigError> {
    env_string(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn env_with_default(key: &str, default: &str) -> String {
    env_string(key).unwrap_or_else(|| default.to_string())
}

fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key: key.to_string(), value: v }),
        },
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid { key: key.to_string(), value: v }),
    }
}

fn env_f32(key: &str, default: f32) -> Result<f32, ConfigError> {
    match env_string(key) {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| ConfigError::Invalid { key: key.to_string(), value: v }),
    }
}

/// Redis-backed cache connection settings. Only consulted when `cache_enabled`.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    pub enabled: bool,
    pub url: String,
    pub default_ttl_secs: u64,
}

/// Row-store (sqlite-backed) settings.
#[derive(Clone, Debug)]
pub struct RowStoreConfig {
    pub path: String,
}

/// Text-index (Elasticsearch-style) settings. The backend is a single
/// cluster carrying three distinct indices, one per concern: few-shot
/// cypher examples, knowledge passages, and conversation history.
#[derive(Clone, Debug)]
pub struct TextIndexConfig {
    pub url: String,
    pub cypher_index: String,
    pub knowledge_index: String,
    pub conversation_index: String,
}

/// Graph-engine (Neo4j-style) settings.
#[derive(Clone, Debug)]
pub struct GraphEngineConfig {
    pub enabled: bool,
    pub url: String,
    pub user: String,
    pub password: String,
}

/// LLM endpoint settings, shared by default across all call sites and
/// overridable per call site (answering, routing, citation matching).
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout: Duration,
}

/// Prompt template and truncation-limit settings.
#[derive(Clone, Debug)]
pub struct PromptConfig {
    pub system_template: String,
    pub max_history_chars: usize,
    pub max_knowledge_chars: usize,
    pub max_prompt_chars: usize,
}

/// Which optional stages of the pipeline are turned on.
#[derive(Clone, Debug)]
pub struct FeatureFlags {
    pub knowledge_matching_enabled: bool,
    pub intent_parser_enabled: bool,
    pub knowledge_retrieval_enabled: bool,
}

/// Retry policy applied to outbound calls to external services.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f32,
}

/// The full assembled configuration for one process.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub row_store: RowStoreConfig,
    pub text_index: TextIndexConfig,
    pub graph_engine: GraphEngineConfig,
    pub llm_answer: LlmConfig,
    pub llm_router: LlmConfig,
    pub llm_citation: LlmConfig,
    pub embedding_model: String,
    pub prompt: PromptConfig,
    pub features: FeatureFlags,
    pub retry: RetryConfig,
    pub bind_addr: String,
    pub log_level: String,
    pub log_file_path: Option<String>,
    pub log_rotation: LogRotation,
    pub log_retention: u32,
}

/// How often the rolling file-log sink starts a new file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl LogRotation {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "hourly" => Self::Hourly,
            "never" => Self::Never,
            _ => Self::Daily,
        }
    }
}

impl AppConfig {
    /// Reads the entire environment-variable surface into one config value.
    /// Called once at process startup, after `config::load_and_apply`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let cache = CacheConfig {
            enabled: env_bool("REDIS_ENABLED", true)?,
            url: env_with_default("REDIS_URL", "redis://127.0.0.1:6379"),
            default_ttl_secs: env_u64("CACHE_DEFAULT_TTL_SECS", 3600)?,
        };

        let row_store = RowStoreConfig {
            path: env_with_default("MYSQL_PATH", "./data/sessions.db"),
        };

        let text_index = TextIndexConfig {
            url: env_with_default("ES_URL", "http://127.0.0.1:9200"),
            cypher_index: env_with_default("ES_CYPHER_INDEX", "qa_system"),
            knowledge_index: env_with_default("ES_KNOWLEDGE_INDEX", "kb_vector_store"),
            conversation_index: env_with_default("ES_CONVERSATION_INDEX", "conversation_history"),
        };

        let graph_engine = GraphEngineConfig {
            enabled: env_bool("NEO4J_ENABLED", true)?,
            url: env_with_default("NEO4J_URL", "http://127.0.0.1:7474"),
            user: env_with_default("NEO4J_USER", "neo4j"),
            password: env_string("NEO4J_PASSWORD").unwrap_or_default(),
        };

        let base_llm = LlmConfig {
            api_base: env_with_default("LLM_API_BASE", "https://api.openai.com/v1"),
            api_key: env_required("LLM_API_KEY")?,
            model: env_with_default("LLM_MODEL", "gpt-4o-mini"),
            temperature: env_f32("LLM_TEMPERATURE", 0.2)?,
            request_timeout: Duration::from_secs(env_u64("LLM_TIMEOUT_SECS", 60)?),
        };

        let llm_router = LlmConfig {
            model: env_with_default("LLM_ROUTER_MODEL", &base_llm.model),
            temperature: env_f32("LLM_ROUTER_TEMPERATURE", 0.0)?,
            ..base_llm.clone()
        };

        let llm_citation = LlmConfig {
            model: env_with_default("LLM_CITATION_MODEL", &base_llm.model),
            temperature: env_f32("LLM_CITATION_TEMPERATURE", 0.0)?,
            ..base_llm.clone()
        };

        let prompt = PromptConfig {
            system_template: env_with_default(
                "PROMPT_SYSTEM_TEMPLATE",
                DEFAULT_SYSTEM_TEMPLATE,
            ),
            max_history_chars: env_u64("PROMPT_MAX_HISTORY_CHARS", 60_000)? as usize,
            max_knowledge_chars: env_u64("PROMPT_MAX_KNOWLEDGE_CHARS", 8_000)? as usize,
            max_prompt_chars: env_u64("PROMPT_MAX_PROMPT_CHARS", 98_104)? as usize,
        };

        let features = FeatureFlags {
            knowledge_matching_enabled: env_bool("KNOWLEDGE_MATCHING_ENABLED", true)?,
            intent_parser_enabled: env_bool("INTENT_PARSER_ENABLED", true)?,
            knowledge_retrieval_enabled: env_bool("KNOWLEDGE_RETRIEVAL_ENABLED", true)?,
        };

        let retry = RetryConfig {
            max_attempts: env_u64("RETRY_MAX_ATTEMPTS", 3)? as u32,
            initial_delay: Duration::from_millis(env_u64("RETRY_INITIAL_DELAY_MS", 200)?),
            backoff_multiplier: env_f32("RETRY_BACKOFF_MULTIPLIER", 2.0)?,
        };

        Ok(AppConfig {
            cache,
            row_store,
            text_index,
            graph_engine,
            llm_answer: base_llm,
            llm_router,
            llm_citation,
            embedding_model: env_with_default("LLM_EMBEDDING_MODEL", "text-embedding-3-small"),
            prompt,
            features,
            retry,
            bind_addr: env_with_default("BIND_ADDR", "0.0.0.0:8080"),
            log_level: env_string("RUST_LOG").or_else(|| env_string("LOG_LEVEL")).unwrap_or_else(|| "info".to_string()),
            log_file_path: env_string("LOG_FILE_PATH"),
            log_rotation: LogRotation::parse(&env_with_default("LOG_ROTATION", "daily")),
            log_retention: env_u64("LOG_RETENTION", 7)? as u32,
        })
    }
}

const DEFAULT_SYSTEM_TEMPLATE: &str = "You are a regulatory compliance assistant. Answer the \
question using only the conversation history and the knowledge provided below. Cite sources \
by title when you use them, and say so plainly when the knowledge provided does not answer \
the question.\n\n--- knowledge ---\n{knowledge}\n--- history ---\n{history}\n--- question ---\n{question}\n";

#[cfg(test)]
mod tests {
    use super::*;

    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
        f();
        for (k, _) in vars {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn missing_required_key_is_an_error() {
        std::env::remove_var("LLM_API_KEY");
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(k) if k == "LLM_API_KEY"));
    }

    #[test]
    fn router_and_citation_models_default_to_base_model() {
        with_env(
            &[("LLM_API_KEY", "sk-test"), ("LLM_MODEL", "gpt-4o")],
            || {
                let cfg = AppConfig::from_env().unwrap();
                assert_eq!(cfg.llm_router.model, "gpt-4o");
                assert_eq!(cfg.llm_citation.model, "gpt-4o");
                assert_eq!(cfg.llm_router.temperature, 0.0);
            },
        );
        std::env::remove_var("LLM_MODEL");
    }

    #[test]
    fn invalid_bool_value_is_rejected() {
        with_env(
            &[("LLM_API_KEY", "sk-test"), ("REDIS_ENABLED", "maybe")],
            || {
                let err = AppConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::Invalid { key, .. } if key == "REDIS_ENABLED"));
            },
        );
        std::env::remove_var("REDIS_ENABLED");
    }

    #[test]
    fn feature_flags_default_to_enabled() {
        with_env(&[("LLM_API_KEY", "sk-test")], || {
            let cfg = AppConfig::from_env().unwrap();
            assert!(cfg.features.knowledge_matching_enabled);
            assert!(cfg.features.intent_parser_enabled);
            assert!(cfg.features.knowledge_retrieval_enabled);
        });
    }

    #[test]
    fn file_logging_is_unset_by_default() {
        with_env(&[("LLM_API_KEY", "sk-test")], || {
            let cfg = AppConfig::from_env().unwrap();
            assert!(cfg.log_file_path.is_none());
            assert_eq!(cfg.log_rotation, LogRotation::Daily);
            assert_eq!(cfg.log_retention, 7);
        });
    }

    #[test]
    fn text_index_names_default_to_distinct_indices() {
        with_env(&[("LLM_API_KEY", "sk-test")], || {
            let cfg = AppConfig::from_env().unwrap();
            assert_eq!(cfg.text_index.cypher_index, "qa_system");
            assert_eq!(cfg.text_index.knowledge_index, "kb_vector_store");
            assert_eq!(cfg.text_index.conversation_index, "conversation_history");
        });
    }

    #[test]
    fn prompt_bound_defaults_below_the_context_limit() {
        with_env(&[("LLM_API_KEY", "sk-test")], || {
            let cfg = AppConfig::from_env().unwrap();
            assert_eq!(cfg.prompt.max_prompt_chars, 98_104);
        });
    }

    #[test]
    fn log_rotation_parses_named_values() {
        with_env(
            &[("LLM_API_KEY", "sk-test"), ("LOG_FILE_PATH", "/var/log/regrag/server.log"), ("LOG_ROTATION", "hourly")],
            || {
                let cfg = AppConfig::from_env().unwrap();
                assert_eq!(cfg.log_file_path.as_deref(), Some("/var/log/regrag/server.log"));
                assert_eq!(cfg.log_rotation, LogRotation::Hourly);
            },
        );
        std::env::remove_var("LOG_FILE_PATH");
        std::env::remove_var("LOG_ROTATION");
    }
}
