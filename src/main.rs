use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use sliding_limiter::{Limiter, SerializedLimiter, Settings};

/// Admit or reject keys read from stdin, one per line.
#[derive(Debug, Parser)]
#[command(name = "sliding-limiter", version, about)]
struct Args {
    /// YAML settings file (overridable with SLIDING_LIMITER__* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum events per key within the window
    #[arg(long)]
    limit: Option<usize>,

    /// Window length in seconds
    #[arg(long)]
    window_secs: Option<u64>,

    /// Serialize check-and-record per key so concurrent writers never over-admit
    #[arg(long)]
    serialized: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

/// One output line per key read.
#[derive(Debug, Serialize)]
struct Decision<'a> {
    key: &'a str,
    allowed: bool,
    count: usize,
}

enum Gate {
    Plain(Limiter<String>),
    Serialized(SerializedLimiter<String>),
}

impl Gate {
    fn admit(&self, key: &String) -> bool {
        match self {
            Gate::Plain(limiter) => {
                if limiter.is_limited(key) {
                    return false;
                }
                limiter.increment(key);
                true
            }
            Gate::Serialized(limiter) => limiter.try_acquire(key),
        }
    }

    fn count(&self, key: &String) -> usize {
        match self {
            Gate::Plain(limiter) => limiter.count(key),
            Gate::Serialized(limiter) => limiter.count(key),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting Sliding Limiter");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut settings = match &args.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(limit) = args.limit {
        settings.limiter.limit = limit;
    }
    if let Some(window_secs) = args.window_secs {
        settings.limiter.window_secs = window_secs;
    }

    let limiter = Limiter::from_settings(&settings).context("creating limiter")?;
    info!(
        limit = settings.limiter.limit,
        window_secs = settings.limiter.window_secs,
        serialized = args.serialized,
        "Limiter initialized"
    );
    let gate = if args.serialized {
        Gate::Serialized(SerializedLimiter::new(limiter))
    } else {
        Gate::Plain(limiter)
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    let termination = termination_signal();
    tokio::pin!(termination);

    loop {
        let key = match next_input(&mut lines, termination.as_mut()).await? {
            Input::Key(key) => key,
            Input::Eof => {
                debug!("End of input");
                break;
            }
            Input::Signal(name) => {
                info!(signal = name, "Received termination signal, stopping");
                break;
            }
        };
        if key.is_empty() {
            continue;
        }

        let allowed = gate.admit(&key);
        let decision = Decision {
            key: &key,
            allowed,
            count: gate.count(&key),
        };
        let mut out = serde_json::to_vec(&decision)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
    }

    stdout.flush().await?;
    info!("Sliding Limiter stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// What ended a wait on stdin.
#[derive(Debug, PartialEq)]
enum Input {
    Key(String),
    Eof,
    Signal(&'static str),
}

/// Wait for the next trimmed key on stdin, end of input, or a termination signal.
async fn next_input<R: AsyncBufRead + Unpin>(
    lines: &mut Lines<R>,
    termination: Pin<&mut impl Future<Output = &'static str>>,
) -> anyhow::Result<Input> {
    tokio::select! {
        line = lines.next_line() => Ok(match line.context("reading stdin")? {
            Some(line) => Input::Key(line.trim().to_string()),
            None => Input::Eof,
        }),
        name = termination => Ok(Input::Signal(name)),
    }
}

/// Resolves with the name of the first termination signal delivered.
///
/// A signal whose handler cannot be installed is logged and never fires.
async fn termination_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "SIGINT handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_next_input_reads_trimmed_keys_then_eof() {
        let mut lines = BufReader::new(&b"  user_1 \n\nuser_2"[..]).lines();
        let never = std::future::pending::<&'static str>();
        tokio::pin!(never);

        assert_eq!(
            next_input(&mut lines, never.as_mut()).await.unwrap(),
            Input::Key("user_1".to_string())
        );
        assert_eq!(
            next_input(&mut lines, never.as_mut()).await.unwrap(),
            Input::Key(String::new())
        );
        assert_eq!(
            next_input(&mut lines, never.as_mut()).await.unwrap(),
            Input::Key("user_2".to_string())
        );
        assert_eq!(
            next_input(&mut lines, never.as_mut()).await.unwrap(),
            Input::Eof
        );
    }

    #[tokio::test]
    async fn test_next_input_stops_on_signal() {
        let (_writer, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();
        let signal = std::future::ready("SIGTERM");
        tokio::pin!(signal);

        assert_eq!(
            next_input(&mut lines, signal.as_mut()).await.unwrap(),
            Input::Signal("SIGTERM")
        );
    }

    #[test]
    fn test_plain_gate_admits_up_to_limit() {
        let gate = Gate::Plain(Limiter::new(2, std::time::Duration::from_secs(60)).unwrap());
        let key = "k".to_string();
        assert!(gate.admit(&key));
        assert!(gate.admit(&key));
        assert!(!gate.admit(&key));
        assert_eq!(gate.count(&key), 2);
    }
}
