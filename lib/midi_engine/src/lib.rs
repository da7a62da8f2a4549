//! MIDI transport, parsing and queueing engine.
//!
//! Raw bytes arriving from a [`Transport`](transport::Transport) are decoded by a
//! [`MidiParser`](parser::MidiParser) into [`MidiEvent`](event::MidiEvent)s and queued for the
//! application. Outgoing [`MidiTxMessage`](message::MidiTxMessage)s are queued, merged by priority
//! and encoded (optionally with running status) into one transport write per main loop tick.
//!
//! Everything is fixed-capacity and allocation free, so the receive path and
//! [`MidiIsrSender`](queue::MidiIsrSender) can be used from interrupt handlers.
#![no_std]

pub mod encoder;
pub mod event;
pub mod handler;
pub mod message;
pub mod parser;
pub mod queue;
pub mod receiver;
pub mod transport;

pub use encoder::MidiTxBuffer;
pub use event::{ChannelMode, MessageType, MidiEvent, SysEx, SystemCommon, SystemRealTime};
pub use handler::{Config, HandlerState, MidiHandler};
pub use message::{MessageError, MidiTxMessage};
pub use parser::MidiParser;
pub use queue::{MidiBuffers, MidiIsrSender};
pub use receiver::{MidiReceiver, RxCallback};
pub use transport::{RxError, RxSink, Transport, TransportError};

/// Maximum SysEx payload length, excluding the 0xF0 / 0xF7 framing bytes.
pub const SYSEX_BUFFER_LEN: usize = 128;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

pub fn is_status(byte: u8) -> bool {
	return byte & 0x80 != 0;
}
pub fn is_realtime(byte: u8) -> bool {
	return byte & 0xF8 == 0xF8;
}
pub fn is_system_common(byte: u8) -> bool {
	return byte & 0xF8 == 0xF0 && byte != SYSEX_START && byte != SYSEX_END;
}
pub fn is_channel(byte: u8) -> bool {
	return is_status(byte) && byte & 0xF0 != 0xF0;
}

/// Number of data bytes following `status`, or `None` for SysEx, whose length
/// is only known once it is terminated.
pub fn data_length(status: u8) -> Option<u8> {
	debug_assert!(is_status(status));
	match status & 0xF0 {
		0x80 | 0x90 | 0xA0 | 0xB0 | 0xE0 => Some(2),
		0xC0 | 0xD0 => Some(1),
		_ => match status {
			SYSEX_START => None,
			0xF1 | 0xF3 => Some(1),
			0xF2 => Some(2),
			_ => Some(0),
		},
	}
}
