use std::env;
use std::io::Write;

use chrono::Local;
use env_logger::Builder;
use log::LevelFilter;

// Visible widths of the level and file:line columns.
const LEVEL_FIELD_WIDTH: usize = 8;
const FILE_LINE_FIELD_WIDTH: usize = 22;

fn level_color(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[34m",
        log::Level::Trace => "\x1b[35m",
    }
}

/// Initialize the process logger: aligned columns for timestamp, level
/// and source location, colored unless `NO_COLOR` is set. `RUST_LOG`
/// overrides the default `info` filter.
pub fn configure_logger() {
    let no_color = env::var("NO_COLOR").is_ok();

    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info);
    if let Ok(rust_log) = env::var("RUST_LOG") {
        builder.parse_filters(&rust_log);
    }

    builder
        .format(move |buf, record| {
            let level = record.level();
            let level_display = if no_color {
                format!("[{level}]")
            } else {
                format!("{}[{level}]\x1b[0m", level_color(level))
            };
            // padding is computed on the plain text so ANSI codes do not
            // skew the columns
            let level_plain_len = format!("[{level}]").len();
            let level_pad = LEVEL_FIELD_WIDTH.saturating_sub(level_plain_len).max(1);

            let file_line = format!(
                "{}:{}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0)
            );
            let file_line_pad = FILE_LINE_FIELD_WIDTH
                .saturating_sub(file_line.len())
                .max(1);

            writeln!(
                buf,
                "{} | {}{}| {}{}| {}",
                Local::now().format("%b %d %y %I:%M:%S %p"),
                level_display,
                " ".repeat(level_pad),
                file_line,
                " ".repeat(file_line_pad),
                record.args(),
            )
        })
        .init();
}
