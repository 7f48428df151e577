use alloc::boxed::Box;
use core::fmt::{self, Write};

use log::{LevelFilter, SetLoggerError};
use spinning_top::Spinlock;

/// Where log records and `print!` output go. Installed once at boot.
static SINK: Spinlock<Option<Box<dyn Write + Send>>> = Spinlock::new(None);

static LOGGER: Logger = Logger;

/// Route kernel output to `sink` and install the logger at `level`.
pub fn init(sink: Box<dyn Write + Send>, level: LevelFilter) -> Result<(), SetLoggerError> {
    *SINK.lock() = Some(sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

pub fn _print(args: fmt::Arguments) {
    if let Some(sink) = SINK.lock().as_mut() {
        let _ = sink.write_fmt(args);
    }
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::logging::_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! println {
    () => { $crate::print!("\n") };
    ($($arg:tt)*) => {
        $crate::logging::_print(format_args!("{}\n", format_args!($($arg)*)))
    };
}

pub struct Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            println!(
                "[{}:{}] {}: {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::String;
    use alloc::sync::Arc;

    #[derive(Clone, Default)]
    struct Capture(Arc<Spinlock<String>>);

    impl Write for Capture {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0.lock().push_str(s);
            Ok(())
        }
    }

    // The logger is global, so everything that touches it lives in one test.
    #[test]
    fn records_and_prints_reach_the_sink() {
        let capture = Capture::default();
        init(Box::new(capture.clone()), LevelFilter::Info).unwrap();

        log::info!("booted with {} slots", 4);
        log::debug!("filtered out");
        crate::println!("pid {}", 3);

        // Other tests may log concurrently, so look for our lines only.
        let text = capture.0.lock().clone();
        assert!(text.lines().any(|line| line.contains("logging.rs:")
            && line.ends_with("] INFO: booted with 4 slots")));
        assert!(text.lines().any(|line| line == "pid 3"));
        assert!(!text.contains("filtered out"));
    }
}
