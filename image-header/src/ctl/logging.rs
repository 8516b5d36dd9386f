//! Logging for `image-header-ctl`.

use std::io::Write;

use log::Log;

static LOGGER: Logger = Logger;

/// Installs the stderr logger, logging messages up to `level`.
pub fn init_logging(level: log::LevelFilter) {
    // Only fails if a logger is already installed, in which case that logger is kept.
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

struct Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // A failure to log shouldn't bring down the tool.
        let _ = writeln!(
            std::io::stderr().lock(),
            "[{:?}] {}",
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_max_level() {
        init_logging(log::LevelFilter::Info);

        let info = log::Metadata::builder().level(log::Level::Info).build();
        let debug = log::Metadata::builder().level(log::Level::Debug).build();
        assert!(LOGGER.enabled(&info));
        assert!(!LOGGER.enabled(&debug));
    }
}
