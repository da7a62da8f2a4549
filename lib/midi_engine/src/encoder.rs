use crate::{is_channel, is_realtime};

/// Collects outgoing messages into one contiguous buffer for a single transport write.
///
/// With running status enabled, the status byte of a channel voice message is
/// left out when it repeats the previous channel status. Real-time messages
/// don't affect running status, any other system message cancels it.
pub struct MidiTxBuffer<const N: usize> {
	data: heapless::Vec<u8, N>,
	running_status_enabled: bool,
	/// last channel status written to the wire, 0 if none
	running_status: u8,
}

impl<const N: usize> MidiTxBuffer<N> {
	pub const fn new(running_status_enabled: bool) -> MidiTxBuffer<N> {
		MidiTxBuffer {
			data: heapless::Vec::new(),
			running_status_enabled,
			running_status: 0,
		}
	}

	/// Clears the buffer and selects whether running status compression is used.
	pub fn init(&mut self, running_status_enabled: bool) {
		self.data.clear();
		self.running_status_enabled = running_status_enabled;
		self.running_status = 0;
	}

	/// Appends `message`, compressing its status byte if possible.
	/// Returns `false` and leaves the buffer untouched if the message does not fit.
	pub fn write_message(&mut self, message: &[u8]) -> bool {
		let Some(&status) = message.first() else {
			return true;
		};

		let skip_status = self.running_status_enabled && is_channel(status) && status == self.running_status;
		let encoded = if skip_status { &message[1..] } else { message };
		if self.data.extend_from_slice(encoded).is_err() {
			return false;
		}

		if is_channel(status) {
			self.running_status = status;
		}
		else if !is_realtime(status) {
			self.running_status = 0;
		}
		return true;
	}

	/// Forgets the running status, so the next channel message is sent with its status byte.
	/// Needed whenever bytes reach the wire without passing through this buffer.
	pub fn reset_running_status(&mut self) {
		self.running_status = 0;
	}

	/// Marks the buffered bytes as sent.
	pub fn consume(&mut self) {
		self.data.clear();
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn len(&self) -> usize {
		self.data.len()
	}

	pub fn is_empty(&self) -> bool {
		self.data.is_empty()
	}

	pub fn capacity(&self) -> usize {
		N
	}
}
