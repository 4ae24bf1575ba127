//! # ITM Logger
//!
//! Implements `log::Log` on top of the Cortex-M ITM, stimulus port 0.
//! Each record becomes one `[LEVEL] message` line.

use core::cell::RefCell;

use cortex_m::peripheral::ITM;
use critical_section::Mutex;
use log::{LevelFilter, Metadata, Record, SetLoggerError};

static ITM_PORT: Mutex<RefCell<Option<ITM>>> = Mutex::new(RefCell::new(None));

static LOGGER: ItmLogger = ItmLogger;

struct ItmLogger;

impl log::Log for ItmLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        critical_section::with(|cs| {
            if let Some(itm) = ITM_PORT.borrow_ref_mut(cs).as_mut() {
                cortex_m::iprintln!(&mut itm.stim[0], "[{}] {}", record.level(), record.args());
            }
        });
    }

    fn flush(&self) {}
}

/// Install the logger on `itm`.
///
/// # Arguments
/// * `max_level` - The maximum log level to emit.
pub fn init(itm: ITM, max_level: LevelFilter) -> Result<(), SetLoggerError> {
    critical_section::with(|cs| ITM_PORT.borrow_ref_mut(cs).replace(itm));
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}
