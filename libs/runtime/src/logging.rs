use crate::config::{LoggingConfig, Section};
use file_rotate::{compression::Compression, suffix::AppendCount, ContentLimit, FileRotate};
use parking_lot::Mutex;
use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Targets, fmt};

const DEFAULT_SECTION: &str = "default";
const DEFAULT_MAX_SIZE_MB: u64 = 100;
const DEFAULT_MAX_BACKUPS: usize = 3;

// -------- level helpers --------

/// Unknown strings fall back to INFO; "off"/"none" disable the sink.
fn parse_level(s: &str) -> LevelFilter {
    match s.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        "off" | "none" => LevelFilter::OFF,
        _ => LevelFilter::INFO,
    }
}

/// Returns true if target == prefix or target starts with "prefix::"
fn matches_target(target: &str, prefix: &str) -> bool {
    target
        .strip_prefix(prefix)
        .map(|rest| rest.is_empty() || rest.starts_with("::"))
        .unwrap_or(false)
}

fn named_sections(cfg: &LoggingConfig) -> impl Iterator<Item = (&String, &Section)> {
    cfg.iter().filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
}

/// Console filter: each named section at its console level, everything else at the
/// "default" section's console level (OFF without a default section).
fn console_targets(cfg: &LoggingConfig) -> Targets {
    let default = cfg
        .get(DEFAULT_SECTION)
        .map(|s| parse_level(&s.console_level))
        .unwrap_or(LevelFilter::OFF);

    named_sections(cfg)
        .fold(Targets::new(), |t, (name, s)| {
            t.with_target(name.clone(), parse_level(&s.console_level))
        })
        .with_default(default)
}

/// File filter: sections without a file are silenced for the file sink so their
/// records do not leak into the default file.
fn file_targets(cfg: &LoggingConfig) -> Targets {
    let level_of = |s: &Section| {
        if s.file.trim().is_empty() {
            LevelFilter::OFF
        } else {
            parse_level(&s.file_level)
        }
    };
    let default = cfg
        .get(DEFAULT_SECTION)
        .map(level_of)
        .unwrap_or(LevelFilter::OFF);

    named_sections(cfg)
        .fold(Targets::new(), |t, (name, s)| {
            t.with_target(name.clone(), level_of(s))
        })
        .with_default(default)
}

// -------- rotating file sinks --------

#[derive(Clone)]
struct FileSink(Arc<Mutex<FileRotate<AppendCount>>>);

/// Writer handed to the fmt layer; `None` drops the record.
struct SinkHandle(Option<FileSink>);

impl Write for SinkHandle {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.0 {
            Some(sink) => sink.0.lock().write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.0 {
            Some(sink) => sink.0.lock().flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to per-subsystem files by target prefix, falling back to the default file.
#[derive(Clone, Default)]
struct FileRouter {
    default: Option<FileSink>,
    by_target: Vec<(String, FileSink)>,
}

impl FileRouter {
    fn build(cfg: &LoggingConfig, base_dir: &Path) -> Self {
        let mut router = FileRouter::default();
        for (name, section) in cfg {
            let Some(sink) = open_sink(name, section, base_dir) else {
                continue;
            };
            if name == DEFAULT_SECTION {
                router.default = Some(sink);
            } else {
                router.by_target.push((name.clone(), sink));
            }
        }
        // Longest prefix wins when sections nest (e.g. "attendance" and "attendance::api").
        router
            .by_target
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        router
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_target.is_empty()
    }

    fn route(&self, target: &str) -> Option<FileSink> {
        self.by_target
            .iter()
            .find(|(prefix, _)| matches_target(target, prefix))
            .map(|(_, sink)| sink.clone())
            .or_else(|| self.default.clone())
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = SinkHandle;

    fn make_writer(&'a self) -> Self::Writer {
        SinkHandle(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        SinkHandle(self.route(meta.target()))
    }
}

/// Absolute paths are kept as-is; relative paths are joined onto `base_dir`.
fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn open_sink(name: &str, section: &Section, base_dir: &Path) -> Option<FileSink> {
    if section.file.trim().is_empty() {
        return None;
    }
    let path = resolve_log_path(&section.file, base_dir);
    let max_bytes = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB) * 1024 * 1024;
    let backups = section.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS);

    match create_rotating_sink(&path, max_bytes as usize, backups) {
        Ok(sink) => Some(sink),
        Err(e) => {
            eprintln!(
                "Failed to init log file for '{}': {} ({})",
                name,
                path.to_string_lossy(),
                e
            );
            None
        }
    }
}

fn create_rotating_sink(
    log_path: &Path,
    max_bytes: usize,
    max_backups: usize,
) -> std::io::Result<FileSink> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let rot = FileRotate::new(
        log_path,
        AppendCount::new(max_backups),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    );

    Ok(FileSink(Arc::new(Mutex::new(rot))))
}

// -------- public init --------

/// Initialize the global subscriber.
/// - `cfg`: logging sections keyed by subsystem ("default" is the catch-all)
/// - `base_dir`: directory used to resolve relative log file paths (usually server.home_dir)
///
/// Console output is human-readable; file output is JSON.
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

    // Bridge `log` → `tracing` before installing the subscriber
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        let _ = tracing_subscriber::fmt()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .try_init();
        return;
    }

    let console_layer = fmt::layer()
        .with_ansi(atty::is(atty::Stream::Stdout))
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(console_targets(cfg));

    let router = FileRouter::build(cfg, base_dir);
    let file_layer = (!router.is_empty()).then(|| {
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(router)
            .with_filter(file_targets(cfg))
    });

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
