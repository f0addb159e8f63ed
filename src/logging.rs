use env_logger::WriteStyle;
use log::LevelFilter;
use std::io::Write;

/// Installs the crate's default logger. Safe to call more than once; later
/// calls report the error from the global registry.
pub fn try_init() -> Result<(), log::SetLoggerError> {
    env_logger::builder()
        .format(|buf, record| {
            writeln!(buf, "[TUMBLE | {}] {}", record.level(), record.args())
        })
        .write_style(WriteStyle::Always)
        .filter(None, LevelFilter::Info)
        .try_init()
}
