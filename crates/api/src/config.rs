use infergate_runner::config::RunnerConfig;
use infergate_worker::config::ExecutorConfig;

/// The model this server advertises.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Full model identifier reported by `/health`.
    pub id: String,
    /// Short name used in `/v1/models` and as the default request model.
    pub alias: String,
    pub owner: String,
}

impl ModelConfig {
    /// | Env Var       | Default                        |
    /// |---------------|--------------------------------|
    /// | `MODEL_ID`    | `deepseek-ai/DeepSeek-V3-0324` |
    /// | `MODEL_ALIAS` | `deepseek-v3`                  |
    /// | `MODEL_OWNER` | `deepseek-ai`                  |
    pub fn from_env() -> Self {
        Self {
            id: std::env::var("MODEL_ID").unwrap_or_else(|_| "deepseek-ai/DeepSeek-V3-0324".into()),
            alias: std::env::var("MODEL_ALIAS").unwrap_or_else(|_| "deepseek-v3".into()),
            owner: std::env::var("MODEL_OWNER").unwrap_or_else(|_| "deepseek-ai".into()),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `900`). Kept above the job
    /// deadline so requests end with the job timeout response, not this one.
    pub request_timeout_secs: u64,
    /// Time given to in-flight jobs after the listener closes (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted request body in bytes (default: 512 MiB).
    pub max_upload_bytes: usize,
    pub model: ModelConfig,
    pub executor: ExecutorConfig,
    pub runner: RunnerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `900`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `MAX_UPLOAD_BYTES`     | `536870912`                |
    ///
    /// Model, executor and runner settings are read by their own
    /// `from_env` constructors.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (512 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let executor = ExecutorConfig::from_env();
        if request_timeout_secs <= executor.job_timeout.as_secs() {
            tracing::warn!(
                request_timeout_secs,
                job_timeout_secs = executor.job_timeout.as_secs(),
                "REQUEST_TIMEOUT_SECS does not exceed JOB_TIMEOUT_SECS; \
                 slow jobs will end with 408 instead of 504",
            );
        }

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            model: ModelConfig::from_env(),
            executor,
            runner: RunnerConfig::from_env(),
        }
    }
}
