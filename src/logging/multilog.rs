use log::{LevelFilter, Log, Metadata};

/// Fans log records out to several loggers. Records from noisy dependencies
/// can be capped per target prefix with global filters.
pub struct MultiLogger {
    loggers: Vec<Box<dyn Log>>,
    global_filters: Vec<(String, LevelFilter)>,
}

impl Default for MultiLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiLogger {
    pub fn new() -> Self {
        Self {
            loggers: Vec::new(),
            global_filters: Vec::new(),
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn Log>) -> Self {
        self.loggers.push(logger);
        self
    }

    /// Cap records whose target starts with `target` at `level`, for every
    /// logger.
    pub fn with_global_filter(mut self, target: &str, level: LevelFilter) -> Self {
        self.global_filters.push((target.into(), level));
        self
    }

    pub fn init(self) -> Result<(), log::SetLoggerError> {
        // Each logger filters on its own
        log::set_max_level(LevelFilter::Trace);
        log::set_boxed_logger(Box::new(self))
    }

    fn passes_global_filters(&self, metadata: &Metadata) -> bool {
        self.global_filters
            .iter()
            .filter(|(target, _)| metadata.target().starts_with(target.as_str()))
            .all(|(_, level)| metadata.level() <= *level)
    }
}

impl Log for MultiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.passes_global_filters(metadata) && self.loggers.iter().any(|l| l.enabled(metadata))
    }

    fn log(&self, record: &log::Record) {
        if !self.passes_global_filters(record.metadata()) {
            return;
        }

        self.loggers
            .iter()
            .filter(|l| l.enabled(record.metadata()))
            .for_each(|l| l.log(record));
    }

    fn flush(&self) {
        self.loggers.iter().for_each(|l| l.flush());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use log::Level;

    #[derive(Default)]
    struct CountingLogger {
        enabled: bool,
        records: Arc<AtomicUsize>,
    }

    impl Log for CountingLogger {
        fn enabled(&self, _: &Metadata) -> bool {
            self.enabled
        }

        fn log(&self, _: &log::Record) {
            self.records.fetch_add(1, Ordering::Relaxed);
        }

        fn flush(&self) {}
    }

    fn logger(enabled: bool) -> (Box<CountingLogger>, Arc<AtomicUsize>) {
        let logger = Box::new(CountingLogger {
            enabled,
            ..Default::default()
        });
        let records = logger.records.clone();
        (logger, records)
    }

    #[test]
    fn test_fan_out() {
        let (enabled, enabled_records) = logger(true);
        let (disabled, disabled_records) = logger(false);
        let multi_logger = MultiLogger::new().with_logger(enabled).with_logger(disabled);

        assert!(multi_logger.enabled(&Metadata::builder().level(Level::Error).build()));
        multi_logger.log(&log::Record::builder().build());

        assert_eq!(enabled_records.load(Ordering::Relaxed), 1);
        assert_eq!(disabled_records.load(Ordering::Relaxed), 0);

        let (disabled, _) = logger(false);
        let multi_logger = MultiLogger::new().with_logger(disabled);
        assert!(!multi_logger.enabled(&Metadata::builder().level(Level::Error).build()));
    }

    #[test]
    fn test_global_filter() {
        let (enabled, records) = logger(true);
        let multi_logger = MultiLogger::new()
            .with_logger(enabled)
            .with_global_filter("reqwest", LevelFilter::Info)
            .with_global_filter("hyper", LevelFilter::Off);

        let metadata = |target, level| Metadata::builder().target(target).level(level).build();
        assert!(multi_logger.enabled(&metadata("reqwest::connect", Level::Info)));
        assert!(!multi_logger.enabled(&metadata("reqwest::connect", Level::Debug)));
        assert!(!multi_logger.enabled(&metadata("hyper", Level::Error)));
        assert!(multi_logger.enabled(&metadata("dist_tester::runner", Level::Trace)));

        multi_logger.log(
            &log::Record::builder()
                .target("hyper::proto")
                .level(Level::Warn)
                .build(),
        );
        multi_logger.log(
            &log::Record::builder()
                .target("dist_tester")
                .level(Level::Warn)
                .build(),
        );
        assert_eq!(records.load(Ordering::Relaxed), 1);
    }
}
