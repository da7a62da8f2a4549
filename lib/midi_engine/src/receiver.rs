use core::cell::Cell;
use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering::{AcqRel, Relaxed, Release};

use critical_section::Mutex;
use heapless::spsc::Producer;

use crate::event::MidiEvent;
use crate::parser::MidiParser;
use crate::transport::{RxError, RxSink};

/// Custom receive hook. Gets the raw bytes instead of the built-in decoder and
/// may feed them back with [`MidiReceiver::parse`].
pub type RxCallback<const N: usize> = fn(&[u8], &mut MidiReceiver<'_, N>);

/// State shared between the handler and the receive half, which may live in an interrupt.
pub struct RxControl<const N: usize> {
	reset: AtomicBool,
	running_status: AtomicBool,
	callback: Mutex<Cell<Option<RxCallback<N>>>>,
}

impl<const N: usize> RxControl<N> {
	pub const fn new() -> RxControl<N> {
		RxControl {
			reset: AtomicBool::new(false),
			running_status: AtomicBool::new(true),
			callback: Mutex::new(Cell::new(None)),
		}
	}

	/// The receiver resets its parser before it interprets the next byte.
	pub fn request_reset(&self) {
		self.reset.store(true, Release);
	}

	pub fn reset_pending(&self) -> bool {
		self.reset.load(Relaxed)
	}

	pub fn set_running_status(&self, enabled: bool) {
		self.running_status.store(enabled, Release);
	}

	pub fn set_callback(&self, callback: Option<RxCallback<N>>) {
		critical_section::with(|cs| self.callback.borrow(cs).set(callback));
	}

	pub fn callback(&self) -> Option<RxCallback<N>> {
		critical_section::with(|cs| self.callback.borrow(cs).get())
	}
}

/// The receiving half of a [`MidiHandler`](crate::MidiHandler): decodes bytes and
/// pushes complete events into the event queue.
///
/// Runs in whatever context the transport delivers data from, so it never
/// blocks and never logs.
pub struct MidiReceiver<'a, const N: usize> {
	parser: MidiParser,
	events: Producer<'a, MidiEvent, N>,
	control: &'a RxControl<N>,
	dropped: u32,
}

impl<'a, const N: usize> MidiReceiver<'a, N> {
	pub(crate) fn new(events: Producer<'a, MidiEvent, N>, control: &'a RxControl<N>) -> MidiReceiver<'a, N> {
		MidiReceiver {
			parser: MidiParser::with_running_status(control.running_status.load(Relaxed)),
			events,
			control,
			dropped: 0,
		}
	}

	/// Feeds one byte to the decoder, queueing the event it completes, if any.
	/// When the queue is full the event is dropped and counted.
	pub fn parse(&mut self, byte: u8) {
		self.apply_pending_reset();
		if let Some(event) = self.parser.parse(byte) {
			if self.events.enqueue(event).is_err() {
				self.dropped = self.dropped.wrapping_add(1);
			}
		}
	}

	/// Number of events lost because the event queue was full.
	pub fn dropped_events(&self) -> u32 {
		self.dropped
	}

	pub fn parser(&self) -> &MidiParser {
		&self.parser
	}

	fn apply_pending_reset(&mut self) {
		if self.control.reset.swap(false, AcqRel) {
			self.parser.reset();
			self.parser.set_running_status(self.control.running_status.load(Relaxed));
		}
	}
}

impl<const N: usize> RxSink for MidiReceiver<'_, N> {
	fn on_rx(&mut self, data: &[u8], result: Result<(), RxError>) {
		if result.is_err() {
			// the stream position is lost, wait for the next status byte
			self.parser.reset();
			return;
		}

		match self.control.callback() {
			Some(callback) => callback(data, self),
			None => {
				for byte in data {
					self.parse(*byte);
				}
			}
		}
	}
}
