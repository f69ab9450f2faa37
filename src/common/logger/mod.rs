use std::{fs, path::Path, sync::OnceLock};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub mod formatter;
pub mod writer;

pub use formatter::EngineFormatter;
pub use writer::strip_ansi_escapes;
pub(crate) use writer::CircularFileWriter;

use crate::configs::Config;

static FILE_SINK: OnceLock<CircularFileWriter> = OnceLock::new();

/// Println that also lands in the log file, for output emitted before the
/// subscriber is installed (banner, config loading).
#[macro_export]
macro_rules! log_println {
    () => {{
        std::println!();
        $crate::common::logger::mirror_to_file("\n");
    }};
    ($($arg:tt)*) => {{
        let line = format!($($arg)*);
        std::println!("{}", line);
        $crate::common::logger::mirror_to_file(&format!("{}\n", line));
    }};
}

pub fn mirror_to_file(text: &str) {
    use std::io::Write;
    if let Some(mut sink) = FILE_SINK.get().cloned() {
        let _ = sink.write_all(strip_ansi_escapes(text).as_bytes());
    }
}

/// `RUST_LOG` wins when set; otherwise the configured level plus any extra
/// per-target directives. The `log` bridge target stays at error either way.
fn filter_directives(config: &Config) -> String {
    let logging = config.logging.as_ref();
    let level = logging.and_then(|l| l.level.as_deref()).unwrap_or("info");

    let mut directives = format!("{},log=error", level);
    if let Some(extra) = logging
        .and_then(|l| l.filters.as_deref())
        .filter(|f| !f.is_empty())
    {
        directives.push(',');
        directives.push_str(extra);
    }
    directives
}

pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let stdout_layer = fmt::layer()
        .event_format(EngineFormatter::new(true))
        .with_ansi(true);

    let file_layer = config
        .logging
        .as_ref()
        .and_then(|l| l.file.as_ref())
        .map(|file_config| {
            if let Some(parent) = Path::new(&file_config.path).parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!("failed to create log directory: {}", e);
                }
            }

            let writer = CircularFileWriter::new(file_config.path.clone(), file_config.max_lines);
            let _ = FILE_SINK.set(writer.clone());
            fmt::layer()
                .with_writer(writer)
                .event_format(EngineFormatter::new(false))
                .with_ansi(false)
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
