//! Tracing subscriber setup, log line format, and log level reload on SIGHUP.

use std::io::IsTerminal;

use tracing_subscriber::{reload, EnvFilter};

// Global reload handle for dynamic log level changes
pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
pub static RELOAD_HANDLE: std::sync::OnceLock<ReloadHandle> = std::sync::OnceLock::new();

/// "YYYY-MM-DD HH:MM:SS" in local time.
pub struct LocalTimeFormatter;

impl tracing_subscriber::fmt::time::FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        #[cfg(target_os = "linux")]
        unsafe {
            let now = libc::time(std::ptr::null_mut());
            let mut tm: libc::tm = std::mem::zeroed();
            libc::localtime_r(&now, &mut tm);

            write!(w, "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                tm.tm_year + 1900,
                tm.tm_mon + 1,
                tm.tm_mday,
                tm.tm_hour,
                tm.tm_min,
                tm.tm_sec)
        }

        #[cfg(not(target_os = "linux"))]
        {
            write!(w, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
        }
    }
}

/// "YYYY-MM-DD HH:MM:SS [LEVEL] message", levels colored when writing to a terminal.
pub struct LogLineFormat {
    ansi: bool,
}

impl LogLineFormat {
    pub fn for_stderr() -> Self {
        Self {
            ansi: std::io::stderr().is_terminal(),
        }
    }
}

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for LogLineFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use tracing_subscriber::fmt::time::FormatTime;

        LocalTimeFormatter.format_time(&mut writer)?;
        write!(writer, " ")?;

        let level = event.metadata().level();
        if self.ansi {
            let level_color = match *level {
                tracing::Level::TRACE => "\x1b[2m",  // Dim/gray
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::ERROR => "\x1b[31m", // Red
            };
            write!(writer, "{}[{}]\x1b[0m ", level_color, level)?;
        } else {
            write!(writer, "[{}] ", level)?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Map a user-facing level name to a filter directive.
/// `critical` is accepted as an alias for `error`.
pub fn parse_level(level: &str) -> Option<&'static str> {
    match level.trim().to_lowercase().as_str() {
        "critical" => Some("error"),
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

/// Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
pub fn effective_level(
    flag: Option<&str>,
    env: Option<&str>,
    config: Option<&str>,
) -> &'static str {
    for candidate in [flag, env, config].into_iter().flatten() {
        match parse_level(candidate) {
            Some(level) => return level,
            None => eprintln!(
                "Invalid log level '{}'. Valid levels: TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL",
                candidate
            ),
        }
    }
    "info"
}

/// Initialize the tracing subscriber with reload capability.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init_tracing(filter: &str) {
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::new(filter);
    let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .fmt_fields(tracing_subscriber::fmt::format::DefaultFields::new())
                .event_format(LogLineFormat::for_stderr())
        )
        .init();

    // Store reload handle in the global static for signal handler access
    let _ = RELOAD_HANDLE.set(reload_handle);
}

/// Swap the active filter. Fails if tracing was never initialized.
pub fn reload_level(filter: &str) -> Result<(), String> {
    let handle = RELOAD_HANDLE.get().ok_or_else(|| "tracing not initialized".to_string())?;
    handle.reload(EnvFilter::new(filter)).map_err(|e| e.to_string())
}
