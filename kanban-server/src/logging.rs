/// Process-wide logger: `env_logger` behind the `log` facade.
///
/// `RUST_LOG` selects levels per target (`kanban.ordering=debug`, ...) and
/// defaults to `info`.
use env_logger::{Builder, Env};
use log::SetLoggerError;
use std::io::Write;

pub fn init() -> Result<(), SetLoggerError> {
    builder().try_init()
}

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] [{}] {}",
            buf.timestamp_millis(),
            record.level(),
            record.target(),
            record.args().to_string().replace('\n', "\\n")
        )
    });
    builder
}

/// Last-resort output when the logger itself could not be installed.
pub fn write_fallback_line(message: &str) {
    eprintln!("[ERROR] [kanban.logging] {}", message);
}
