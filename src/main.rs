use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use fuschia_artifact::FsStore;
use fuschia_flow::{Flow, Label};
use fuschia_queue::InMemoryQueue;
use fuschia_runner::{
  InMemoryFlowRepository, RawValueMap, Runner, RunnerConfig, StateConditionService, UploadPart,
  new_execution, purge_pending_uploads,
};

/// Environment variable overriding the configured secret key.
const SECRET_KEY_ENV: &str = "FUSCHIA_SECRET_KEY";

/// Fuschia - typed flow inputs and outputs
#[derive(Parser)]
#[command(name = "fuschia")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.fuschia)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Path to a JSON runner configuration (default: <data-dir>/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Coerce inputs for a new execution of a flow
  ///
  /// Raw values are read as a JSON object from stdin, then overridden by
  /// `--input` and `--upload`.
  Inputs {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,

    /// Raw input value, as `id=value`
    #[arg(long = "input", value_name = "ID=VALUE")]
    inputs: Vec<String>,

    /// Local file to upload for a FILE input, as `id=path`
    #[arg(long = "upload", value_name = "ID=PATH")]
    uploads: Vec<String>,

    /// Execution label, as `key=value`
    #[arg(long = "label", value_name = "KEY=VALUE")]
    labels: Vec<String>,
  },

  /// Coerce outputs against the outputs declared by a flow
  ///
  /// Raw values are read as a JSON object from stdin, then overridden by
  /// `--output`.
  Outputs {
    /// Path to the flow file (JSON)
    flow_file: PathBuf,

    /// Raw output value, as `id=value`
    #[arg(long = "output", value_name = "ID=VALUE")]
    outputs: Vec<String>,
  },
}

fn main() -> Result<()> {
  init_tracing();
  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(data_dir) => data_dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".fuschia"),
  };

  let result = match cli.command {
    Some(command) => {
      let config = load_config(cli.config.as_deref(), &data_dir)?;
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async { run_command(command, config, data_dir).await })
    }
    None => {
      println!("fuschia - use --help to see available commands");
      Ok(())
    }
  };

  let purged = purge_pending_uploads();
  if purged > 0 {
    debug!(purged, "removed leftover uploads");
  }

  result
}

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(io::stderr)
    .try_init();
}

fn load_config(path: Option<&Path>, data_dir: &Path) -> Result<RunnerConfig> {
  let default_path = data_dir.join("config.json");
  let path = match path {
    Some(path) => Some(path),
    None if default_path.exists() => Some(default_path.as_path()),
    None => None,
  };

  let mut config = match path {
    Some(path) => {
      let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
      serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?
    }
    None => RunnerConfig::default(),
  };

  if let Ok(key) = std::env::var(SECRET_KEY_ENV) {
    config.secret_key = Some(key);
  }

  Ok(config)
}

async fn run_command(command: Commands, config: RunnerConfig, data_dir: PathBuf) -> Result<()> {
  let runner = Runner::new(
    config,
    Arc::new(InMemoryQueue::new()),
    Arc::new(InMemoryFlowRepository::new()),
    Arc::new(FsStore::new(data_dir.join("storage"))),
    Arc::new(StateConditionService),
  );

  match command {
    Commands::Inputs {
      flow_file,
      inputs,
      uploads,
      labels,
    } => run_inputs(&runner, &flow_file, &inputs, &uploads, &labels).await,
    Commands::Outputs { flow_file, outputs } => run_outputs(&runner, &flow_file, &outputs).await,
  }
}

async fn run_inputs(
  runner: &Runner,
  flow_file: &Path,
  inputs: &[String],
  uploads: &[String],
  labels: &[String],
) -> Result<()> {
  let flow = load_flow(flow_file).await?;

  let labels = labels
    .iter()
    .map(|label| split_pair(label).map(|(key, value)| Label::new(key, value)))
    .collect::<Result<Vec<_>>>()?;
  let execution = new_execution(&flow, None, labels).await?;
  info!(execution_id = %execution.id, flow_id = %flow.id, "execution created");

  let mut raw = read_payload_from_stdin()?;
  override_values(&mut raw, inputs)?;

  if !uploads.is_empty() {
    let parts = upload_parts(uploads).await?;
    let uploaded = runner
      .upload_parts(&execution, futures::stream::iter(parts))
      .await
      .context("failed to upload files")?;
    raw.extend(uploaded);
  }

  let typed = runner
    .typed_flow_inputs(&flow, &execution, &raw)
    .await
    .context("failed to coerce inputs")?;

  let execution = execution.with_inputs(typed);
  println!("{}", serde_json::to_string_pretty(&execution)?);

  Ok(())
}

async fn run_outputs(runner: &Runner, flow_file: &Path, outputs: &[String]) -> Result<()> {
  let flow = load_flow(flow_file).await?;
  let execution = new_execution(&flow, None, Vec::new()).await?;

  let mut raw = read_payload_from_stdin()?;
  override_values(&mut raw, outputs)?;

  let typed = runner
    .typed_outputs(&flow, &execution, &raw)
    .await
    .context("failed to coerce outputs")?;

  println!("{}", serde_json::to_string_pretty(&typed)?);

  Ok(())
}

async fn load_flow(flow_file: &Path) -> Result<Flow> {
  let content = tokio::fs::read_to_string(flow_file)
    .await
    .with_context(|| format!("failed to read flow file: {}", flow_file.display()))?;

  let flow: Flow = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse flow file: {}", flow_file.display()))?;
  flow
    .validate()
    .with_context(|| format!("invalid flow file: {}", flow_file.display()))?;

  Ok(flow)
}

async fn upload_parts(uploads: &[String]) -> Result<Vec<UploadPart>> {
  let mut parts = Vec::with_capacity(uploads.len());
  for upload in uploads {
    let (name, path) = split_pair(upload)?;
    let file = tokio::fs::File::open(path)
      .await
      .with_context(|| format!("failed to open upload: {path}"))?;
    let filename = Path::new(path)
      .file_name()
      .and_then(|name| name.to_str())
      .with_context(|| format!("upload has no file name: {path}"))?;

    parts.push(UploadPart::File {
      name: name.to_string(),
      filename: filename.to_string(),
      data: Box::pin(ReaderStream::new(file).map(|chunk| chunk.map_err(fuschia_artifact::Error::Io))),
    });
  }
  Ok(parts)
}

fn override_values(raw: &mut RawValueMap, pairs: &[String]) -> Result<()> {
  for pair in pairs {
    let (id, value) = split_pair(pair)?;
    raw.insert(id.to_string(), serde_json::Value::String(value.to_string()));
  }
  Ok(())
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
  match pair.split_once('=') {
    Some((key, value)) if !key.is_empty() => Ok((key, value)),
    _ => bail!("expected KEY=VALUE, got '{pair}'"),
  }
}

fn read_payload_from_stdin() -> Result<RawValueMap> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(RawValueMap::new());
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;

  if input.trim().is_empty() {
    Ok(RawValueMap::new())
  } else {
    serde_json::from_str(&input).context("failed to parse payload JSON object from stdin")
  }
}
