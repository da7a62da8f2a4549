use super::{RxError, RxSink, Transport, TransportError};

extern crate std;
use std::vec::Vec;

/// Scripted transport for tests. Bytes in `pending_rx` are delivered on the next
/// `receive()` call, writes are recorded in `written`.
#[derive(Default)]
pub(crate) struct MockTransport {
	pub initialized: bool,
	pub active: bool,
	pub start_count: usize,
	pub flush_count: usize,
	pub pending_rx: Vec<u8>,
	pub pending_error: Option<RxError>,
	pub written: Vec<Vec<u8>>,
	pub fail_tx: Option<TransportError>,
}

impl MockTransport {
	pub fn new() -> MockTransport {
		Default::default()
	}

	/// All written bytes, concatenated.
	pub fn wire(&self) -> Vec<u8> {
		self.written.concat()
	}
}

impl Transport for MockTransport {
	type Config = ();

	fn init(&mut self, _config: ()) -> Result<(), TransportError> {
		self.initialized = true;
		Ok(())
	}

	fn start_rx(&mut self) {
		self.active = true;
		self.start_count += 1;
	}

	fn rx_active(&self) -> bool {
		self.active
	}

	fn flush_rx(&mut self) {
		self.pending_rx.clear();
		self.flush_count += 1;
	}

	fn receive(&mut self, sink: &mut dyn RxSink) {
		if !self.active {
			return;
		}
		let data = core::mem::take(&mut self.pending_rx);
		match self.pending_error.take() {
			Some(error) => {
				sink.on_rx(&data, Err(error));
				self.active = false;
			}
			None => {
				if !data.is_empty() {
					sink.on_rx(&data, Ok(()));
				}
			}
		}
	}

	fn tx(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
		if let Some(error) = self.fail_tx {
			return Err(error);
		}
		self.written.push(bytes.to_vec());
		Ok(())
	}
}
