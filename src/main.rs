use anyhow::Result;
use clap::Parser;
use onnx_digits::{
    config::{Config, LlmConfig},
    image::{ImageLimits, ResizePolicy},
    web::serve,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onnx-digits")]
#[command(about = "ONNX digit classification service with LLM explanations")]
struct Args {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:5005")]
    bind: String,

    /// Number of worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// ONNX model file
    #[arg(long, env = "MODEL_PATH", default_value = "mnist-12.onnx")]
    model_path: String,

    /// How non-square images reach 28x28: letterbox or direct
    #[arg(long, env = "RESIZE_POLICY", default_value = "letterbox")]
    resize_policy: ResizePolicy,

    /// Largest accepted image file in bytes
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = ImageLimits::DEFAULT_MAX_BYTES)]
    max_image_bytes: usize,

    /// Largest accepted image width or height in pixels
    #[arg(long, env = "MAX_IMAGE_DIMENSION", default_value_t = ImageLimits::DEFAULT_MAX_DIMENSION)]
    max_image_dimension: u32,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// Azure OpenAI endpoint, e.g. https://my-resource.openai.azure.com
    #[arg(long, env = "OPENAI_ENDPOINT")]
    llm_endpoint: Option<String>,

    /// Chat model deployment name
    #[arg(long, env = "OPENAI_DEPLOYMENT_ID")]
    llm_deployment: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_VERSION", default_value = LlmConfig::DEFAULT_API_VERSION)]
    llm_api_version: String,

    /// LLM request timeout in seconds, must stay below the request timeout
    #[arg(long, default_value_t = LlmConfig::DEFAULT_TIMEOUT_SECS)]
    llm_timeout: u64,

    /// Attach the 28x28 thumbnail to explanation prompts (vision deployments only)
    #[arg(long)]
    llm_attach_image: bool,

    /// Summary prompt template containing {{$input}}
    #[arg(long, env = "SUMMARY_PROMPT_PATH")]
    summary_prompt: Option<PathBuf>,
}

impl Args {
    fn llm_config(&self) -> Result<Option<LlmConfig>> {
        match (&self.llm_endpoint, &self.llm_deployment, &self.llm_api_key) {
            (Some(endpoint), Some(deployment), Some(api_key)) => Ok(Some(
                LlmConfig::new(endpoint, deployment, api_key)
                    .with_api_version(&self.llm_api_version)
                    .with_timeout(Duration::from_secs(self.llm_timeout))
                    .with_attach_image(self.llm_attach_image)
                    .with_summary_prompt_path(self.summary_prompt.clone()),
            )),
            (None, None, None) => Ok(None),
            _ => anyhow::bail!(
                "LLM configuration is incomplete: endpoint, deployment and API key are all required"
            ),
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting ONNX digit service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model path: {}", args.model_path);

    let llm = args.llm_config()?;
    let config = Config::new(args.bind, args.model_path, args.workers, args.dev)?
        .with_resize_policy(args.resize_policy)
        .with_image_limits(ImageLimits {
            max_bytes: args.max_image_bytes,
            max_dimension: args.max_image_dimension,
        })
        .with_llm(llm);
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()?;

    runtime.block_on(serve(config))?;

    Ok(())
}
