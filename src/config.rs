use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::agent::{AgentOptions, Task};
use crate::brain::DEFAULT_MODEL;
use crate::error::AgentError;
use crate::hands::chrome::ChromeOptions;
use crate::types::{DEFAULT_MAX_STEPS, DEFAULT_START_URL};

pub const DEFAULT_API_BASE: &str = "https://api.tzafon.ai";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Remote browser from the hosted computer API.
    Hosted,
    /// Local Chrome over the DevTools protocol.
    Chrome,
}

/// Drive a browser with a vision model until the task is done.
#[derive(Debug, Parser)]
#[command(name = "agent", version, about)]
pub struct Args {
    /// What the agent should accomplish.
    pub task: String,

    /// First page to open; `https://` is added when no scheme is given.
    #[arg(long, default_value = DEFAULT_START_URL)]
    pub start_url: String,

    #[arg(long, default_value_t = DEFAULT_MAX_STEPS)]
    pub max_steps: usize,

    #[arg(long, value_enum, default_value_t = Backend::Hosted)]
    pub backend: Backend,

    #[arg(long, env = "TZAFON_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Hosted computer API base URL.
    #[arg(long, env = "TZAFON_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Chat completions base URL; defaults to `{api_base}/v1`.
    #[arg(long, env = "MODEL_API_BASE")]
    pub model_base: Option<String>,

    #[arg(long, env = "MODEL_NAME", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value = "screenshots")]
    pub screenshot_dir: PathBuf,

    #[arg(long)]
    pub no_screenshots: bool,

    /// Seconds to wait after the first navigation.
    #[arg(long, default_value_t = 1.0)]
    pub settle_secs: f64,

    /// Seconds to wait between steps.
    #[arg(long, default_value_t = 0.5)]
    pub step_delay_secs: f64,

    /// Run the local Chrome without a window.
    #[arg(long)]
    pub headless: bool,

    #[arg(long, env = "CHROME_PATH")]
    pub chrome_path: Option<PathBuf>,

    /// Skip keyword-triggered workflow guidance.
    #[arg(long)]
    pub no_workflow: bool,

    /// Print the final report as JSON.
    #[arg(long)]
    pub json: bool,

    #[arg(short, long)]
    pub verbose: bool,
}

/// Validated settings derived from [`Args`].
#[derive(Debug, Clone)]
pub struct Config {
    pub task: Task,
    pub backend: Backend,
    pub api_key: String,
    pub api_base: String,
    pub model_base: String,
    pub model: String,
    pub screenshot_dir: Option<PathBuf>,
    pub options: AgentOptions,
    pub chrome: ChromeOptions,
    pub workflow: bool,
    pub json: bool,
}

impl Config {
    pub fn from_args(args: Args) -> Result<Self, AgentError> {
        if args.task.trim().is_empty() {
            return Err(AgentError::Config("task must not be empty".into()));
        }
        if args.max_steps == 0 {
            return Err(AgentError::Config("--max-steps must be at least 1".into()));
        }
        // The local Chrome backend still needs a key for the model.
        let api_key = args
            .api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("TZAFON_API_KEY is not set".into()))?;

        let api_base = args.api_base.trim_end_matches('/').to_string();
        let model_base = args
            .model_base
            .unwrap_or_else(|| format!("{api_base}/v1"));

        Ok(Self {
            task: Task {
                description: args.task,
                start_url: args.start_url,
                max_steps: args.max_steps,
            },
            backend: args.backend,
            api_key,
            api_base,
            model_base,
            model: args.model,
            screenshot_dir: (!args.no_screenshots).then_some(args.screenshot_dir),
            options: AgentOptions {
                settle_delay: seconds("--settle-secs", args.settle_secs)?,
                step_delay: seconds("--step-delay-secs", args.step_delay_secs)?,
            },
            chrome: ChromeOptions {
                headless: args.headless,
                chrome_path: args.chrome_path,
                profile_dir: None,
                attach: !args.headless,
            },
            workflow: !args.no_workflow,
            json: args.json,
        })
    }
}

fn seconds(flag: &str, value: f64) -> Result<Duration, AgentError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| AgentError::Config(format!("{flag} must be a non-negative number")))
}
