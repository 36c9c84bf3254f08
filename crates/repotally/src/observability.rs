//! Logging setup.
//!
//! Structured JSONL records go to a log file; warnings are also echoed to
//! stderr in compact form. Nothing here writes to stdout, which may carry a
//! report (`commits -o -`).

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{Event, Level};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

const ENV_LOG_PATH: &str = "REPOTALLY_LOG_PATH";
const ENV_LOG_DIR: &str = "REPOTALLY_LOG_DIR";
const DEFAULT_LOG_DIR_UNIX: &str = "/var/log";
const LOG_FILE_SUFFIX: &str = ".jsonl";

/// Where and under which name logs are written.
#[derive(Clone, Debug)]
pub struct ObservabilityConfig {
    /// Service name stamped on every record and used for the file name.
    pub service: String,
    /// Log directory from the app config, below the env overrides.
    pub log_dir: Option<PathBuf>,
}

impl ObservabilityConfig {
    /// Config for this binary, with the app config's `log_dir`.
    pub fn from_env_with_overrides(log_dir: Option<PathBuf>) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            log_dir,
        }
    }
}

#[derive(Clone, Debug)]
struct LogTarget {
    dir: PathBuf,
    file_name: String,
}

impl LogTarget {
    #[cfg(test)]
    fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// Keeps the background log writer alive; hold it until exit.
pub struct ObservabilityGuard {
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Install the global subscriber.
///
/// If no log directory is writable, JSON records go to stderr instead.
pub fn init_observability(
    cfg: &ObservabilityConfig,
    env_filter: EnvFilter,
) -> Result<ObservabilityGuard> {
    let (log_writer, log_guard) = match build_log_writer(&cfg.service, cfg.log_dir.as_deref()) {
        Ok(result) => result,
        Err(err) => {
            eprintln!("Warning: {err}. Falling back to stderr logging.");
            tracing_appender::non_blocking(std::io::stderr())
        }
    };

    let warnings = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .compact()
        // errors reach the user through the command's own error report
        .with_filter(filter_fn(|meta| *meta.level() == Level::WARN));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(JsonLogLayer::new(log_writer, cfg.service.clone()))
        .with(warnings)
        .try_init()?;

    tracing::debug!("logging initialized");

    Ok(ObservabilityGuard {
        _log_guard: log_guard,
    })
}

/// Filter from the CLI flags: `-q` beats `-v`, which beats `RUST_LOG`,
/// which beats the configured level.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
    if quiet {
        return EnvFilter::new("error");
    }
    match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    }
}

// JSON lines

struct JsonLogLayer<W> {
    writer: W,
    service: String,
}

impl<W> JsonLogLayer<W> {
    const fn new(writer: W, service: String) -> Self {
        Self { writer, service }
    }
}

impl<S, W> Layer<S> for JsonLogLayer<W>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    fn on_new_span(
        &self,
        attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: LayerContext<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            let mut visitor = JsonVisitor::default();
            attrs.record(&mut visitor);
            span.extensions_mut().insert(SpanFields(visitor.0));
        }
    }

    fn on_record(
        &self,
        id: &tracing::span::Id,
        values: &tracing::span::Record<'_>,
        ctx: LayerContext<'_, S>,
    ) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = JsonVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.0),
            None => extensions.insert(SpanFields(visitor.0)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: LayerContext<'_, S>) {
        let meta = event.metadata();
        let mut map = Map::new();
        map.insert("timestamp".into(), Value::String(timestamp()));
        map.insert("level".into(), Value::String(meta.level().as_str().to_lowercase()));
        map.insert("service".into(), Value::String(self.service.clone()));
        map.insert("target".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    map.extend(fields.0.clone());
                }
            }
        }

        let mut visitor = JsonVisitor::default();
        event.record(&mut visitor);
        map.extend(visitor.0);

        let mut writer = self.writer.make_writer();
        if serde_json::to_writer(&mut writer, &Value::Object(map)).is_ok() {
            let _ = writer.write_all(b"\n");
        }
    }
}

#[derive(Clone, Debug)]
struct SpanFields(Map<String, Value>);

#[derive(Default)]
struct JsonVisitor(Map<String, Value>);

impl JsonVisitor {
    fn put(&mut self, field: &tracing::field::Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl tracing::field::Visit for JsonVisitor {
    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.put(field, Value::Bool(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.put(field, Value::Number(value.into()));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.put(field, Value::Number(value.into()));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        if let Some(number) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(number));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.put(field, Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{value:?}")));
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// Log target resolution: REPOTALLY_LOG_PATH, then REPOTALLY_LOG_DIR, then
// the configured log_dir, then the first writable platform default.

fn build_log_writer(
    service: &str,
    config_log_dir: Option<&Path>,
) -> Result<(
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
)> {
    let target = resolve_log_target(service, config_log_dir).map_err(|e| anyhow::anyhow!("{e}"))?;
    let appender = tracing_appender::rolling::daily(&target.dir, &target.file_name);
    Ok(tracing_appender::non_blocking(appender))
}

fn resolve_log_target(service: &str, config_log_dir: Option<&Path>) -> Result<LogTarget, String> {
    resolve_log_target_with(
        service,
        std::env::var_os(ENV_LOG_PATH).map(PathBuf::from),
        std::env::var_os(ENV_LOG_DIR).map(PathBuf::from),
        config_log_dir.map(PathBuf::from),
    )
}

fn resolve_log_target_with(
    service: &str,
    path_override: Option<PathBuf>,
    dir_override: Option<PathBuf>,
    config_dir: Option<PathBuf>,
) -> Result<LogTarget, String> {
    if let Some(path) = path_override {
        return log_target_from_path(path);
    }
    if let Some(dir) = dir_override.or(config_dir) {
        return log_target_from_dir(dir, service);
    }

    let mut candidates = Vec::new();
    if cfg!(unix) {
        candidates.push(PathBuf::from(DEFAULT_LOG_DIR_UNIX));
    }
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", service) {
        candidates.push(proj_dirs.data_local_dir().join("logs"));
    }
    if let Ok(dir) = std::env::current_dir() {
        candidates.push(dir);
    }

    let file_name = format!("{service}{LOG_FILE_SUFFIX}");
    candidates
        .into_iter()
        .find(|dir| ensure_writable(dir, &file_name).is_ok())
        .map(|dir| LogTarget { dir, file_name })
        .ok_or_else(|| "No writable log directory found".to_string())
}

fn log_target_from_dir(dir: PathBuf, service: &str) -> Result<LogTarget, String> {
    let file_name = format!("{service}{LOG_FILE_SUFFIX}");
    ensure_writable(&dir, &file_name)?;
    Ok(LogTarget { dir, file_name })
}

fn log_target_from_path(path: PathBuf) -> Result<LogTarget, String> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| format!("{ENV_LOG_PATH} must end in a UTF-8 file name"))?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_writable(dir, &file_name)?;
    Ok(LogTarget {
        dir: dir.to_path_buf(),
        file_name,
    })
}

fn ensure_writable(dir: &Path, file_name: &str) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Failed to create log directory {}: {e}", dir.display()))?;
    let path = dir.join(file_name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("Failed to open log file {}: {e}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_beats_verbose() {
        assert_eq!(env_filter(true, 2, "info").to_string(), "error");
    }

    #[test]
    fn verbose_levels() {
        assert_eq!(env_filter(false, 1, "info").to_string(), "debug");
        assert_eq!(env_filter(false, 3, "info").to_string(), "trace");
    }

    #[test]
    fn path_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("tally.jsonl");
        let other = dir.path().join("other");
        let target =
            resolve_log_target_with("repotally", Some(file.clone()), Some(other.clone()), Some(other))
                .unwrap();
        assert_eq!(target.path(), file);
    }

    #[test]
    fn dir_override_beats_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let env_dir = dir.path().join("env");
        let config_dir = dir.path().join("config");
        let target =
            resolve_log_target_with("repotally", None, Some(env_dir.clone()), Some(config_dir))
                .unwrap();
        assert_eq!(target.dir, env_dir);
        assert_eq!(target.file_name, "repotally.jsonl");
    }

    #[test]
    fn config_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join("nested").join("logs");
        let target = resolve_log_target_with("repotally", None, None, Some(config_dir.clone())).unwrap();
        assert_eq!(target.dir, config_dir);
        assert!(config_dir.join("repotally.jsonl").exists());
    }

    #[test]
    fn timestamps_are_utc_millis() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'), "{ts}");
        assert_eq!(ts.len(), 24, "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
