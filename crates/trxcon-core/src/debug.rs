use core::fmt;
use std::fs::OpenOptions;
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{self, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt as tracingfmt};

#[macro_export]
macro_rules! unimplemented_log {
    ( $($arg:tt)* ) => {{
        tracing::warn!(
            "unimplemented: {}",
            format_args!($($arg)*),
        );
    }};
}

/// if `cond` is false, logs a warning with your message.
#[macro_export]
macro_rules! assert_warn {
    ($cond:expr, $($arg:tt)+) => {{
        if !$cond {
            tracing::warn!(
                target: module_path!(),
                "assertion warning: `{}` failed: {} at {}:{}",
                stringify!($cond),
                format_args!($($arg)+),
                file!(),
                line!(),
            );
        }
    }};
}

struct AlignedFormatter;

/// Pulls the `ts` field (a frame number) out of an event so it can be printed in its own column
struct TsVisitor {
    ts: Option<String>,
}

impl tracing::field::Visit for TsVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "ts" {
            self.ts = Some(format!("{:?}", value));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        if field.name() == "ts" {
            self.ts = Some(format!("{:7}", value));
        }
    }
}

/// "crates/trxcon-entities/src/l1sched/lchans/xcch.rs" becomes "[entities/l1sched] xcch.rs"
fn short_location(file_path: &str, ts_str: &str) -> String {
    let Some(src_idx) = file_path.find("/src/") else {
        return file_path.to_string();
    };
    let before_src = &file_path[..src_idx];
    let after_src = &file_path[src_idx + 5..];

    let crate_name = if let Some(idx) = before_src.rfind("trxcon-") {
        &before_src[idx + 7..]
    } else {
        before_src.rsplit('/').next().unwrap_or("unknown")
    };

    match after_src.rfind('/') {
        Some(last_slash) => {
            let first_module = after_src[..last_slash].split('/').next().unwrap_or("");
            let filename = &after_src[last_slash + 1..];
            format!("{} [{}/{}] {}", ts_str, crate_name, first_module, filename)
        }
        None => format!("{} [{}] {}", ts_str, crate_name, after_src),
    }
}

impl<S, N> FormatEvent<S, N> for AlignedFormatter
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        let mut visitor = TsVisitor { ts: None };
        event.record(&mut visitor);
        let has_ts = visitor.ts.is_some();
        let ts_str = visitor.ts.unwrap_or_else(|| "       ".to_string());

        let (color_level, color_reset) = match *metadata.level() {
            tracing::Level::ERROR => ("\x1b[31m", "\x1b[0m"),
            tracing::Level::WARN => ("\x1b[33m", "\x1b[0m"),
            tracing::Level::INFO => ("\x1b[32m", "\x1b[0m"),
            tracing::Level::DEBUG => ("\x1b[34m", "\x1b[0m"),
            tracing::Level::TRACE => ("\x1b[35m", "\x1b[0m"),
        };

        let formatted_path = short_location(metadata.file().unwrap_or("unknown"), &ts_str);
        let location = format!(
            "{}{:<5}{} {}:{}:",
            color_level,
            metadata.level(),
            color_reset,
            formatted_path,
            metadata.line().unwrap_or(0)
        );

        let mut message_buf = String::new();
        let message_writer = format::Writer::new(&mut message_buf);
        ctx.field_format().format_fields(message_writer, event)?;

        // The ts field already has its own column
        if has_ts {
            if let Some(ts_idx) = message_buf.find("ts=") {
                if let Some(space_idx) = message_buf[ts_idx..].find(' ') {
                    message_buf.replace_range(ts_idx..ts_idx + space_idx + 1, "");
                } else {
                    message_buf.truncate(ts_idx);
                }
            }
        }

        let mut padding = 64;
        if message_buf.starts_with("->") || message_buf.starts_with("<-") {
            padding -= 3;
        }

        write!(writer, "{:<width$} {}", location, message_buf, width = padding)?;
        writeln!(writer)
    }
}

static INIT_LOG: Once = Once::new();

/// Adds directives to a filter, skipping any that fail to parse
fn with_directives(mut filter: EnvFilter, directives: &[&str]) -> EnvFilter {
    for d in directives {
        match d.parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("invalid log directive {}: {}", d, e),
        }
    }
    filter
}

/// Sets up logging with maximum verbosity (trace level)
/// Mainly for unit tests
pub fn setup_logging_verbose() {
    setup_logging(EnvFilter::new("trace"), None);
}

/// Sets up default logging to stdout and optionally, a verbose log file
/// Returns a guard, that needs to be kept alive for logging to file to work
pub fn setup_logging_default(verbose_logfile: Option<String>) -> Option<WorkerGuard> {
    let stdout_filter = get_default_stdout_filter();
    let logfile_and_filter = verbose_logfile.map(|file| (file, get_default_logfile_filter()));
    setup_logging(stdout_filter, logfile_and_filter)
}

pub fn get_default_stdout_filter() -> EnvFilter {
    with_directives(
        EnvFilter::new("info"),
        &[
            // Per-frame routing and per-burst handling is very chatty
            "trxcon_entities::messagerouter=warn",
            "trxcon_entities::l1sched::clock=info",
            "trxcon_entities::l1sched::sched=info",
            "trxcon_entities::l1sched::components=warn",
            "trxcon_entities::l1sched::lchans=info",
            "trxcon_entities::l1sched::prim=info",
            // Link state changes and command traffic
            "trxcon_entities::trx::link=debug",
            "trxcon_entities::trx::transport=info",
        ],
    )
}

fn get_default_logfile_filter() -> EnvFilter {
    EnvFilter::new("debug")
}

/// Sets up logging to stdout and optionally, a verbose log file
/// If an output file is requested and can be opened, returns Some<WorkerGuard>. Keep this
/// value alive or logging to file may cease working.
fn setup_logging(stdout_filter: EnvFilter, outfile: Option<(String, EnvFilter)>) -> Option<WorkerGuard> {
    let file = outfile.and_then(|(path, filter)| {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => Some((f, filter)),
            Err(e) => {
                eprintln!("failed to open log file {}: {}", path, e);
                None
            }
        }
    });

    if let Some((file, outfile_filter)) = file {
        let (file_writer, guard) = tracing_appender::non_blocking(file);

        INIT_LOG.call_once(|| {
            let file_layer = tracingfmt::layer()
                .event_format(AlignedFormatter)
                .with_writer(file_writer)
                .with_ansi(false);
            let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter);

            tracing_subscriber::registry()
                .with(file_layer.with_filter(outfile_filter))
                .with(stdout_layer.with_filter(stdout_filter))
                .init();
        });

        Some(guard)
    } else {
        INIT_LOG.call_once(|| {
            let stdout_layer = tracingfmt::layer().event_format(AlignedFormatter);
            tracing_subscriber::registry()
                .with(stdout_layer.with_filter(stdout_filter))
                .init();
        });
        None
    }
}
