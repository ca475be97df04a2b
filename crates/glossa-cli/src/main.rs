//! `glossa`: stream translations, summaries and language-learning answers from
//! an OpenAI-compatible endpoint to stdout.
//!
//! Connection settings come from the environment (and `.env`), see
//! [`CloudConfig::from_env`]; the global flags override them.

use std::future::Future;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::{Context as _, bail};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt as _;
use glossa_capabilities::prelude::*;
use glossa_core::observability::init_observability;
use tokio::io::{AsyncRead, AsyncReadExt as _};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "glossa", version, about = "Translate, summarize and study text with an LLM")]
struct Cli {
    /// Model name sent to the endpoint (overrides GLOSSA_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint (overrides GLOSSA_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Sampling temperature for grammar and pronounce
    #[arg(long, global = true)]
    temperature: Option<f32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate text between two languages
    Translate {
        /// Source language tag (e.g. en)
        #[arg(long)]
        from: String,
        /// Target language tag (e.g. es)
        #[arg(long)]
        to: String,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Summarize text
    Summarize {
        #[arg(long, default_value_t = SummaryKind::default())]
        kind: SummaryKind,
        #[arg(long, default_value_t = SummaryLength::default())]
        length: SummaryLength,
        #[arg(long, default_value_t = SummaryFormat::default())]
        format: SummaryFormat,
        /// Background shared with the model
        #[arg(long)]
        context: Option<String>,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Break a sentence down grammatically
    Grammar {
        /// Language of the sentence
        #[arg(long)]
        language: String,
        /// Language of the explanation
        #[arg(long, default_value = "en")]
        explain_in: String,
        #[command(flatten)]
        input: InputArgs,
    },
    /// Show pronunciation (IPA) and tips
    Pronounce {
        #[arg(long)]
        language: String,
        /// Also give a romanization
        #[arg(long)]
        romanize: bool,
        #[command(flatten)]
        input: InputArgs,
    },
}

/// Input text: positional, `--file`, or `stdin` when neither is given.
#[derive(Args, Debug, Default)]
struct InputArgs {
    /// Text to process
    text: Option<String>,

    /// Read the text from a file
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,
}

impl InputArgs {
    async fn read<R: AsyncRead + Unpin>(&self, mut stdin: R) -> anyhow::Result<String> {
        let text = match (&self.text, &self.file) {
            (Some(text), _) => text.clone(),
            (None, Some(path)) => tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?,
            (None, None) => {
                let mut buf = String::new();
                stdin
                    .read_to_string(&mut buf)
                    .await
                    .context("failed to read stdin")?;
                buf
            }
        };
        if text.trim().is_empty() {
            bail!("no input text");
        }
        Ok(text)
    }
}

impl Cli {
    fn cloud_config(&self) -> anyhow::Result<CloudConfig> {
        let mut config = CloudConfig::from_env()?;
        if let Some(base_url) = &self.base_url {
            config = config.base_url(base_url);
        }
        if let Some(model) = &self.model {
            config = config.model(model);
        }
        Ok(config)
    }

    fn prompt_config(&self, config: PromptConfig) -> PromptConfig {
        match self.temperature {
            Some(temperature) => config.temperature(temperature),
            None => config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_observability("warn,glossa_cli=info");
    let cli = Cli::parse();

    let toolkit = Toolkit::cloud(cli.cloud_config()?)?;
    let subscriptions = [
        watch_status(toolkit.translator()),
        watch_status(toolkit.summarizer()),
        watch_status(toolkit.prompter()),
    ];

    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    let result = run_until(&cli, &toolkit, tokio::io::stdin(), ctrl_c).await;

    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    toolkit.destroy_all();
    result
}

/// Runs the command until it finishes or `interrupt` resolves. An interrupt
/// aborts every manager and exits cleanly, wherever the command was waiting.
async fn run_until<R, F>(cli: &Cli, toolkit: &Toolkit, stdin: R, interrupt: F) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::select! {
        result = run(cli, toolkit, stdin) => result,
        () = interrupt => {
            info!("interrupted, aborting");
            toolkit.abort_all();
            Ok(())
        }
    }
}

async fn run<R: AsyncRead + Unpin>(cli: &Cli, toolkit: &Toolkit, stdin: R) -> anyhow::Result<()> {
    let stream = match &cli.command {
        Command::Translate { from, to, input } => {
            let config = TranslatorConfig::new(from.as_str(), to.as_str());
            toolkit.translate(&input.read(stdin).await?, &config).await?
        }
        Command::Summarize {
            kind,
            length,
            format,
            context,
            input,
        } => {
            let mut config = SummarizerConfig::default()
                .kind(*kind)
                .length(*length)
                .format(*format);
            if let Some(context) = context {
                config = config.shared_context(context.as_str());
            }
            toolkit.summarize(&input.read(stdin).await?, &config).await?
        }
        Command::Grammar {
            language,
            explain_in,
            input,
        } => {
            let config = cli.prompt_config(PromptConfig::grammar(language.as_str(), explain_in.as_str()));
            toolkit.prompt(&input.read(stdin).await?, &config).await?
        }
        Command::Pronounce {
            language,
            romanize,
            input,
        } => {
            let config = cli.prompt_config(PromptConfig::pronunciation(language.as_str(), *romanize));
            toolkit.prompt(&input.read(stdin).await?, &config).await?
        }
    };
    print_stream(stream).await
}

async fn print_stream(mut stream: OperationStream) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    let mut chunks = 0usize;
    while let Some(chunk) = stream.next().await {
        stdout.write_all(chunk?.as_bytes())?;
        stdout.flush()?;
        chunks += 1;
    }
    writeln!(stdout)?;
    debug!(chunks, "stream finished");
    Ok(())
}

/// Logs every status change of `manager` from a background task.
fn watch_status<B: Capability>(manager: &SessionManager<B>) -> Subscription {
    let capability = manager.capability().name().to_owned();
    let (subscription, mut statuses) = manager.status_channel();
    tokio::spawn(async move {
        while let Some(status) = statuses.recv().await {
            match &status {
                SessionStatus::Error { error } => {
                    warn!(capability = %capability, %error, "session error");
                }
                SessionStatus::Downloading { progress } => {
                    info!(capability = %capability, progress, "downloading model");
                }
                other => info!(capability = %capability, status = other.label(), "session status"),
            }
        }
    });
    subscription
}
