//! Tracing setup shared by the notesync binaries.
//!
//! `RUST_LOG` wins over the configured filter; with neither set the level is `info`.
//! Setting `NOTESYNC_ACCESS_LOG_ROLL=1` adds a rolling file layer for the `http.access` target.

use once_cell::sync::OnceCell;
use std::path::PathBuf;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

pub const ACCESS_TARGET: &str = "http.access";

static ACCESS_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Minutely,
    Hourly,
    Daily,
}

impl Rotation {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hourly" => Rotation::Hourly,
            "minutely" => Rotation::Minutely,
            _ => Rotation::Daily,
        }
    }
}

/// Where and how the rolling access log is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessLogRoll {
    pub dir: PathBuf,
    pub prefix: String,
    pub rotation: Rotation,
}

impl AccessLogRoll {
    /// Read the rolling access log settings; `None` unless `NOTESYNC_ACCESS_LOG_ROLL=1`.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Option<Self> {
        if get("NOTESYNC_ACCESS_LOG_ROLL").as_deref() != Some("1") {
            return None;
        }
        let dir = get("NOTESYNC_ACCESS_LOG_DIR")
            .or_else(|| get("NOTESYNC_LOGS_DIR"))
            .unwrap_or_else(|| "logs".to_string());
        let prefix = get("NOTESYNC_ACCESS_LOG_PREFIX").unwrap_or_else(|| "http-access".into());
        let rotation = get("NOTESYNC_ACCESS_LOG_ROTATION")
            .map(|r| Rotation::parse(&r))
            .unwrap_or(Rotation::Daily);
        Some(Self {
            dir: PathBuf::from(dir),
            prefix,
            rotation,
        })
    }
}

fn console_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .ok()
        .or_else(|| configured.and_then(|f| EnvFilter::try_new(f).ok()))
        .unwrap_or_else(|| EnvFilter::new("info"))
}

pub fn init() {
    init_with_filter(None);
}

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init_with_filter(configured: Option<&str>) {
    let filter = console_filter(configured);
    let registry = tracing_subscriber::registry().with(fmt::layer().with_filter(filter));
    let Some(roll) = AccessLogRoll::from_env() else {
        let _ = registry.try_init();
        return;
    };
    if std::fs::create_dir_all(&roll.dir).is_err() {
        tracing::warn!(directory = %roll.dir.display(), "failed to create access log directory");
    }
    let writer = match roll.rotation {
        Rotation::Hourly => tracing_appender::rolling::hourly(&roll.dir, &roll.prefix),
        Rotation::Minutely => tracing_appender::rolling::minutely(&roll.dir, &roll.prefix),
        Rotation::Daily => tracing_appender::rolling::daily(&roll.dir, &roll.prefix),
    };
    let (nb, guard) = tracing_appender::non_blocking(writer);
    let _ = ACCESS_GUARD.set(guard);
    let targets = Targets::new().with_target(ACCESS_TARGET, tracing::Level::INFO);
    let access_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(nb)
        .with_filter(targets);
    let _ = registry.with(access_layer).try_init();
}
