use core::cell::RefCell;
use core::fmt::Write;

use cortex_m::interrupt::Mutex;
use log::{LevelFilter, Metadata, Record};
use stm32f1xx_hal::{pac::USART1, serial};

static DEBUG_TX: Mutex<RefCell<Option<serial::Tx<USART1>>>> = Mutex::new(RefCell::new(None));

struct Logger;
static LOGGER: Logger = Logger;

impl log::Log for Logger {
	fn enabled(&self, metadata: &Metadata) -> bool {
		metadata.level() <= log::max_level()
	}

	fn log(&self, record: &Record) {
		if !self.enabled(record.metadata()) {
			return;
		}
		with_tx(|tx| {
			writeln!(tx, "{}: {}", record.level(), record.args()).ok();
		});
	}

	fn flush(&self) {}
}

fn max_level() -> LevelFilter {
	if cfg!(feature = "debugprint_verbose") {
		LevelFilter::Debug
	}
	else if cfg!(feature = "debugprint_basic") {
		LevelFilter::Info
	}
	else {
		LevelFilter::Off
	}
}

/// Routes `log` output to the debug UART.
pub fn init(tx: serial::Tx<USART1>) {
	cortex_m::interrupt::free(|cs| DEBUG_TX.borrow(cs).replace(Some(tx)));
	if log::set_logger(&LOGGER).is_ok() {
		log::set_max_level(max_level());
	}
}

/// Writes directly to the debug UART, also when logging is disabled.
pub fn write_raw(args: core::fmt::Arguments) {
	with_tx(|tx| {
		tx.write_fmt(args).ok();
	});
}

/// Borrows the debug UART for one write. Only taking and returning it masks
/// interrupts; the write itself runs at the caller's priority. A line logged
/// while a preempted write holds the UART is dropped.
fn with_tx(f: impl FnOnce(&mut serial::Tx<USART1>)) {
	let tx = cortex_m::interrupt::free(|cs| DEBUG_TX.borrow(cs).borrow_mut().take());
	if let Some(mut tx) = tx {
		f(&mut tx);
		cortex_m::interrupt::free(|cs| DEBUG_TX.borrow(cs).replace(Some(tx)));
	}
}
