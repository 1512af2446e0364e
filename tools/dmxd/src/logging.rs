//! Structured logging (§10.2): `tracing` + `tracing-subscriber`, with the
//! active filter behind a `reload::Handle` so `SIGUSR1` can raise the log
//! level at runtime without restarting the daemon.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, reload, EnvFilter};

/// `off → error → warn → info → debug → trace`, the ladder `SIGUSR1`
/// climbs one rung at a time (§6).
const LEVELS: [LevelFilter; 6] = [
    LevelFilter::OFF,
    LevelFilter::ERROR,
    LevelFilter::WARN,
    LevelFilter::INFO,
    LevelFilter::DEBUG,
    LevelFilter::TRACE,
];

pub type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

/// A runtime-adjustable log level, backed by the reload handle returned
/// from [`init`].
pub struct LevelControl {
    handle: ReloadHandle,
    index: usize,
}

impl LevelControl {
    /// Raises the level by one rung, saturating at `trace`. Called from the
    /// `SIGUSR1` handler.
    pub fn bump(&mut self) {
        self.index = (self.index + 1).min(LEVELS.len() - 1);
        let level = LEVELS[self.index];
        let _ = self.handle.modify(|filter| *filter = EnvFilter::new(level.to_string()));
        tracing::info!(level = %level, "log level raised");
    }
}

/// `--debug/-d` (0-4): initializes the subscriber at the corresponding
/// rung and returns a [`LevelControl`] for `SIGUSR1` to drive. `--no-syslog`
/// selects a plain, uncolored line format suited to being captured by a
/// process supervisor rather than a terminal.
pub fn init(debug_level: u8, no_syslog: bool) -> LevelControl {
    let index = (debug_level as usize).min(LEVELS.len() - 2);
    let filter = EnvFilter::new(LEVELS[index].to_string());
    let (filter, handle) = reload::Layer::new(filter);

    let fmt_layer = fmt::layer().with_ansi(!no_syslog).with_target(no_syslog);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();

    LevelControl { handle, index }
}
