use crate::image::{ImageLimits, ResizePolicy};
use crate::utils::error::DigitError;
use crate::Result;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Number of classes produced by the MNIST model.
pub const DEFAULT_CLASS_COUNT: usize = 10;
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,

    /// ONNX model file
    pub model_path: PathBuf,

    /// Tokio worker threads
    pub workers: usize,

    /// Development mode
    pub dev_mode: bool,

    pub onnx_config: OnnxConfig,

    pub server_config: ServerConfig,

    pub preprocess: PreprocessConfig,

    /// Chat completion backend, `None` disables the LLM routes
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    pub intra_threads: usize,
    pub optimization_level: i32,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Maximum request body size in bytes. Leaves room for multipart
    /// framing and base64 inflation above the per-image limit.
    pub max_request_size: usize,
}

#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub resize_policy: ResizePolicy,
    pub class_count: usize,
    pub top_k: usize,
    pub image_limits: ImageLimits,
}

#[derive(Clone)]
pub struct LlmConfig {
    pub endpoint: String,
    pub deployment: String,
    pub api_key: String,
    pub api_version: String,
    pub timeout: Duration,
    /// Send the 28x28 thumbnail as an image part of the explain prompt
    pub attach_image: bool,
    /// Template file for `/api/chat/summary`, built-in prompt when absent
    pub summary_prompt_path: Option<PathBuf>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .field("attach_image", &self.attach_image)
            .field("summary_prompt_path", &self.summary_prompt_path)
            .finish()
    }
}

impl LlmConfig {
    pub const DEFAULT_API_VERSION: &'static str = "2024-06-01";
    /// Below the server request timeout so upstream stalls surface as 504.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 45;

    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_key: api_key.into(),
            api_version: Self::DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            attach_image: false,
            summary_prompt_path: None,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_attach_image(mut self, attach_image: bool) -> Self {
        self.attach_image = attach_image;
        self
    }

    pub fn with_summary_prompt_path(mut self, path: Option<PathBuf>) -> Self {
        self.summary_prompt_path = path;
        self
    }
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: String,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores).max(1);

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1),
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 },
            max_request_size: 16 * 1024 * 1024,
        };

        let config = Self {
            bind_addr,
            model_path: PathBuf::from(model_path),
            workers,
            dev_mode,
            onnx_config,
            server_config,
            preprocess: PreprocessConfig {
                resize_policy: ResizePolicy::Letterbox,
                class_count: DEFAULT_CLASS_COUNT,
                top_k: DEFAULT_TOP_K,
                image_limits: ImageLimits::default(),
            },
            llm: None,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn with_resize_policy(mut self, policy: ResizePolicy) -> Self {
        self.preprocess.resize_policy = policy;
        self
    }

    pub fn with_llm(mut self, llm: Option<LlmConfig>) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_image_limits(mut self, limits: ImageLimits) -> Self {
        self.preprocess.image_limits = limits;
        self
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr.parse().map_err(|e| {
            DigitError::Config(format!("Invalid bind address {}: {}", self.bind_addr, e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.preprocess.class_count == 0 {
            return Err(DigitError::Config("class count must be at least 1".to_string()));
        }

        if self.preprocess.top_k == 0 || self.preprocess.top_k > self.preprocess.class_count {
            return Err(DigitError::Config(format!(
                "top-k must be between 1 and {}, got {}",
                self.preprocess.class_count, self.preprocess.top_k
            )));
        }

        let limits = &self.preprocess.image_limits;
        if limits.max_bytes == 0 || limits.max_dimension == 0 {
            return Err(DigitError::Config("image limits must be non-zero".to_string()));
        }

        if limits.max_bytes > self.server_config.max_request_size {
            return Err(DigitError::Config(format!(
                "image limit of {} bytes exceeds the request body limit of {} bytes",
                limits.max_bytes, self.server_config.max_request_size
            )));
        }

        if let Some(llm) = &self.llm {
            let request_timeout = Duration::from_secs(self.server_config.request_timeout);
            if llm.timeout >= request_timeout {
                return Err(DigitError::Config(format!(
                    "LLM timeout ({}s) must be shorter than the request timeout ({}s)",
                    llm.timeout.as_secs(),
                    self.server_config.request_timeout
                )));
            }
        }

        Ok(())
    }
}
