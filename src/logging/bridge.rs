use std::sync::Arc;

use eyre::Context;
use log::{LevelFilter, Log};

use super::{Level, Logger, INTERNAL_TARGET};

/// Routes records from the `log` facade through a [`Logger`].
pub struct LogBridge {
    logger: Arc<Logger>,
    filter: LevelFilter,
}

impl LogBridge {
    pub fn new(logger: Arc<Logger>, filter: LevelFilter) -> Self {
        Self { logger, filter }
    }

    pub fn init(self) -> eyre::Result<()> {
        log::set_max_level(self.filter);
        log::set_boxed_logger(Box::new(self)).context("Failed registering boxed logger")?;

        Ok(())
    }
}

impl Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        // The logger emits its own diagnostics while holding its lock.
        metadata.target() != INTERNAL_TARGET && self.filter >= metadata.level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let message = record.args().to_string();
            self.logger
                .print(Level::from(record.level()), &message, None);
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use std::{
        io::{self, Write},
        sync::Mutex,
    };

    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn bridge(filter: LevelFilter, debug: bool) -> (LogBridge, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let logger = Logger::new();
        logger.set_debug_mode(debug);
        logger.add_stream(Some(Box::new(buffer.clone()))).unwrap();
        (LogBridge::new(Arc::new(logger), filter), buffer)
    }

    fn contents(buffer: &SharedBuffer) -> String {
        String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap()
    }

    #[test]
    fn forwards_records_with_mapped_levels() {
        let (bridge, buffer) = bridge(LevelFilter::Trace, true);

        bridge.log(
            &log::Record::builder()
                .args(format_args!("careful"))
                .level(log::Level::Warn)
                .target("app")
                .build(),
        );
        bridge.log(
            &log::Record::builder()
                .args(format_args!("noise"))
                .level(log::Level::Trace)
                .target("app")
                .build(),
        );

        let contents = contents(&buffer);
        assert!(contents.contains("ERROR\tcareful"));
        assert!(contents.contains("DEBUG\tnoise"));
    }

    #[test]
    fn drops_internal_and_filtered_records() {
        let (bridge, buffer) = bridge(LevelFilter::Info, true);

        bridge.log(
            &log::Record::builder()
                .args(format_args!("internal"))
                .level(log::Level::Error)
                .target(INTERNAL_TARGET)
                .build(),
        );
        bridge.log(
            &log::Record::builder()
                .args(format_args!("too chatty"))
                .level(log::Level::Debug)
                .target("app")
                .build(),
        );

        assert_eq!(contents(&buffer), "");
    }
}
