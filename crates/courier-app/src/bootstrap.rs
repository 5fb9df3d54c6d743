use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use courier_config::{
    DistributionConfig, LogFormatSetting, OssSettings, StaticDirectory, load_config,
    load_directory,
};
use courier_distribution::{Collaborators, DistributionEngine, TracingSink};
use courier_events::{EventBus, FileEvent};
use courier_telemetry::{LogFormat, LoggingConfig, Metrics, build_sha, init_logging};
use courier_vfs::{ObjectStoreConnector, OssConnector, StorageRegistry};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::LinesStream;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};

/// Path of the engine configuration document.
pub const ENV_CONFIG: &str = "COURIER_CONFIG";
/// Path of the rules and accounts document.
pub const ENV_DIRECTORY: &str = "COURIER_DIRECTORY";

/// Dependencies required to bootstrap the Courier application.
pub(crate) struct BootstrapDependencies {
    config: DistributionConfig,
    directory: Arc<StaticDirectory>,
    registry: Arc<StorageRegistry>,
    events: EventBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = load_config(&env_path(ENV_CONFIG)?)
            .map_err(|err| AppError::config("config.load", err))?;
        let directory = load_directory(&env_path(ENV_DIRECTORY)?)
            .map_err(|err| AppError::config("directory.load", err))?;
        let request_timeout = config
            .backends
            .oss
            .as_ref()
            .map(|oss| Duration::from_secs(oss.request_timeout_secs));
        let connector = OssConnector::new(request_timeout)
            .map_err(|err| AppError::storage("oss.connector", err))?;
        Self::new(config, directory, Arc::new(connector))
    }

    /// Wire dependencies around an explicit object-store connector.
    pub(crate) fn new(
        config: DistributionConfig,
        directory: StaticDirectory,
        connector: Arc<dyn ObjectStoreConnector>,
    ) -> AppResult<Self> {
        let registry = StorageRegistry::new(connector)
            .with_defaults(config.backends.oss.as_ref().map(OssSettings::defaults));
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            directory: Arc::new(directory),
            registry: Arc::new(registry),
            events: EventBus::new(),
            metrics,
        })
    }
}

/// What the intake loop saw before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeSummary {
    /// Events handed to the engine.
    pub submitted: u64,
    /// Lines that did not decode as a file event.
    pub malformed: u64,
}

/// Entry point for the Courier application boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction, logging setup or engine
/// startup fails, or stdin cannot be read.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies, tokio::io::stdin()).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with<R>(dependencies: BootstrapDependencies, input: R) -> AppResult<()>
where
    R: AsyncRead + Unpin + Send,
{
    let logging = &dependencies.config.logging;
    init_logging(&LoggingConfig {
        level: &logging.level,
        format: log_format(logging.format),
        build_sha: build_sha(),
    })
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    info!(build_sha = build_sha(), "Courier distribution starting");

    let summary = serve(dependencies, input, interrupted()).await?;
    info!(
        submitted = summary.submitted,
        malformed = summary.malformed,
        "Courier distribution stopped"
    );
    Ok(())
}

/// Resolves on the first Ctrl-C; never resolves when no handler can be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "interrupt handler unavailable, intake runs until EOF");
        std::future::pending::<()>().await;
    }
}

/// Start the engine, feed it one JSON file event per input line until EOF or
/// `shutdown` resolves, then shut it down gracefully.
///
/// `shutdown` is polled while reading and while a submission waits on a full
/// intake queue.
pub(crate) async fn serve<R, S>(
    dependencies: BootstrapDependencies,
    input: R,
    shutdown: S,
) -> AppResult<IntakeSummary>
where
    R: AsyncRead + Unpin + Send,
    S: Future<Output = ()> + Send,
{
    let BootstrapDependencies {
        config,
        directory,
        registry,
        events,
        metrics,
    } = dependencies;

    let sink = Arc::new(TracingSink::new(events, metrics));
    let engine = DistributionEngine::start(
        &config,
        Collaborators {
            rules: directory.clone(),
            accounts: directory,
            registry,
        },
        sink,
    )
    .map_err(|err| AppError::distribution("engine.start", err))?;

    tokio::pin!(shutdown);
    let mut lines = LinesStream::new(BufReader::new(input).lines());
    let mut summary = IntakeSummary::default();
    let mut failure = None;
    loop {
        let next = tokio::select! {
            line = lines.next() => line,
            () = &mut shutdown => {
                info!("interrupt received, draining intake");
                break;
            }
        };
        let line = match next {
            None => break,
            Some(Ok(line)) => line,
            Some(Err(source)) => {
                failure = Some(AppError::Io {
                    operation: "intake.read",
                    path: None,
                    source,
                });
                break;
            }
        };
        let Some(event) = decode(&line, &mut summary) else {
            continue;
        };
        let submitted = tokio::select! {
            result = engine.submit(event) => result,
            () = &mut shutdown => {
                info!("interrupt received while intake was full, draining intake");
                break;
            }
        };
        if let Err(err) = submitted {
            error!(error = %err, "distribution engine stopped accepting events");
            failure = Some(AppError::distribution("engine.submit", err));
            break;
        }
        summary.submitted += 1;
    }

    engine.shutdown().await;
    failure.map_or(Ok(summary), Err)
}

fn decode(line: &str, summary: &mut IntakeSummary) -> Option<FileEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<FileEvent>(line) {
        Ok(event) => Some(event),
        Err(err) => {
            summary.malformed += 1;
            warn!(error = %err, "skipping malformed file event");
            None
        }
    }
}

const fn log_format(setting: Option<LogFormatSetting>) -> LogFormat {
    match setting {
        Some(LogFormatSetting::Json) => LogFormat::Json,
        Some(LogFormatSetting::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    }
}

fn env_path(name: &'static str) -> AppResult<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .ok_or(AppError::MissingEnv { name })
}
