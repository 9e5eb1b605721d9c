use std::fmt::Write as _;
use std::io::IsTerminal;

use chrono::{DateTime, Local, TimeZone};
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::util::SubscriberInitExt;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prints `[YYYY-MM-DD HH:MM:SS]` in local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct BracketedLocalTime;

impl FormatTime for BracketedLocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        w.write_str(&format_timestamp(&Local::now()))
    }
}

pub fn format_timestamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::with_capacity(21);
    // Writing to a String cannot fail.
    let _ = write!(out, "[{}]", at.format(TIMESTAMP_FORMAT));
    out
}

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
///
/// Color codes are only written when stdout is a terminal.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    subscriber(filter, std::io::stdout, std::io::stdout().is_terminal()).init();
}

fn subscriber<W>(filter: EnvFilter, writer: W, ansi: bool) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(BracketedLocalTime)
        .with_target(false)
        .with_level(false)
        .with_ansi(ansi)
        .with_writer(writer)
        .finish()
}
