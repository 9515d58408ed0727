//! Console and file logging.
//!
//! Console output goes through `tracing-subscriber`, in the same
//! registry/EnvFilter/fmt-layer shape used elsewhere in this codebase.
//! The file sink is independent: a `log4rs` rolling file appender,
//! fed from the same `tracing` call sites through a thin forwarding
//! layer, since `log4rs` speaks the `log` facade rather than `tracing`.

use camino::Utf8PathBuf;
use std::io::IsTerminal;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Rotating file sink configuration. Defaults match the pipeline's
/// documented retention policy: roll at 500MB or 14 days, keep 5 backups.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub verbose: bool,
    pub file_path: Option<Utf8PathBuf>,
    pub max_size_mb: u64,
    pub max_age_days: u64,
    pub backups: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            verbose: false,
            file_path: None,
            max_size_mb: 500,
            max_age_days: 14,
            backups: 5,
        }
    }
}

fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize both sinks. Idempotent within a process: a second call
/// returns `Ok(())` without reinitializing (tracing and log4rs both
/// reject double-init, which this treats as a no-op rather than an error).
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        if config.verbose {
            EnvFilter::try_new("archiver=debug,info")
        } else {
            EnvFilter::try_new("archiver=info,warn")
        }
    })?;

    let fmt_layer = if config.verbose {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_line_number(false)
            .with_file(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(use_color())
            .compact()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_line_number(false)
            .with_file(false)
            .with_ansi(use_color())
            .compact()
            .boxed()
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    if let Some(path) = &config.file_path {
        init_file_sink(path, &config.level, config.max_size_mb, config.max_age_days, config.backups)?;
        let _ = registry.with(LogForwardLayer).try_init();
    } else {
        let _ = registry.try_init();
    }

    Ok(())
}

fn init_file_sink(
    path: &Utf8PathBuf,
    level: &str,
    max_size_mb: u64,
    max_age_days: u64,
    backups: usize,
) -> anyhow::Result<()> {
    use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
    use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
    use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
    use log4rs::append::rolling_file::RollingFileAppender;
    use log4rs::config::{Appender, Config as Log4rsConfig, Root};
    use log4rs::encode::pattern::PatternEncoder;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pattern = format!("{path}.{{}}.gz");
    let roller = FixedWindowRoller::builder().build(&pattern, backups.max(1) as u32)?;
    let trigger = SizeOrAgeTrigger::new(
        SizeTrigger::new(max_size_mb.saturating_mul(1024 * 1024)),
        max_age_days,
        touch_marker_path(path),
    );
    touch_marker_if_fresh(path, &touch_marker_path(path))?;

    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));
    let encoder = PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} {l} {t} - {m}{n}");
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(encoder))
        .build(path.as_std_path(), Box::new(policy))?;

    let level_filter = level.parse().unwrap_or(log::LevelFilter::Info);
    let config = Log4rsConfig::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(Root::builder().appender("file").build(level_filter))?;

    log4rs::init_config(config)?;
    Ok(())
}

fn touch_marker_path(log_path: &Utf8PathBuf) -> Utf8PathBuf {
    let mut marker = log_path.clone();
    marker.set_extension("started_at");
    marker
}

/// Stamp the rotation-age marker when the log file is fresh (absent or
/// empty, meaning either first run or a rotation just happened), so
/// `SizeOrAgeTrigger` measures age from the current file's real start.
fn touch_marker_if_fresh(log_path: &Utf8PathBuf, marker_path: &Utf8PathBuf) -> std::io::Result<()> {
    let is_fresh = match std::fs::metadata(log_path.as_std_path()) {
        Ok(meta) => meta.len() == 0,
        Err(_) => true,
    };
    if is_fresh {
        crate::atomic_write::write_file_atomic_str(marker_path, &rfc3339_now())?;
    }
    Ok(())
}

fn rfc3339_now() -> String {
    let now: chrono::DateTime<chrono::Utc> = chrono::Utc::now();
    now.to_rfc3339()
}

/// Rolls when either the size trigger fires or the marker file recording
/// the current log epoch's start is older than `max_age_days`.
#[derive(Debug)]
struct SizeOrAgeTrigger {
    size: log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger,
    max_age: std::time::Duration,
    marker_path: Utf8PathBuf,
}

impl SizeOrAgeTrigger {
    fn new(
        size: log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger,
        max_age_days: u64,
        marker_path: Utf8PathBuf,
    ) -> Self {
        SizeOrAgeTrigger {
            size,
            max_age: std::time::Duration::from_secs(max_age_days.saturating_mul(86_400)),
            marker_path,
        }
    }
}

impl log4rs::append::rolling_file::policy::compound::trigger::Trigger for SizeOrAgeTrigger {
    fn trigger(
        &self,
        file: &log4rs::append::rolling_file::LogFile,
    ) -> anyhow::Result<bool> {
        if self.size.trigger(file)? {
            return Ok(true);
        }
        let age = match std::fs::metadata(self.marker_path.as_std_path()).and_then(|m| m.modified()) {
            Ok(modified) => modified.elapsed().unwrap_or(std::time::Duration::ZERO),
            Err(_) => return Ok(false),
        };
        Ok(age > self.max_age)
    }

    fn is_pre_process(&self) -> bool {
        self.size.is_pre_process()
    }
}

/// Forwards every `tracing` event into the `log` facade so the `log4rs`
/// file appender (which only understands `log::Record`s) sees it too.
struct LogForwardLayer;

impl<S> tracing_subscriber::Layer<S> for LogForwardLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let metadata = event.metadata();
        let level = match *metadata.level() {
            tracing::Level::ERROR => log::Level::Error,
            tracing::Level::WARN => log::Level::Warn,
            tracing::Level::INFO => log::Level::Info,
            tracing::Level::DEBUG => log::Level::Debug,
            tracing::Level::TRACE => log::Level::Trace,
        };
        log::logger().log(
            &log::Record::builder()
                .level(level)
                .target(metadata.target())
                .args(format_args!("{}", visitor.message))
                .build(),
        );
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        }
    }
}
