use core::fmt;

use crate::event::{split_u14, MidiEvent};
use crate::{data_length, is_status, SYSEX_BUFFER_LEN, SYSEX_END, SYSEX_START};

/// Longest message that can be queued for transmission: a full SysEx with its framing.
pub const MAX_MESSAGE_LEN: usize = SYSEX_BUFFER_LEN + 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageError {
	Empty,
	/// The first byte is not a status byte.
	MissingStatus,
	/// A status byte appears where a data byte is expected.
	UnexpectedStatus { position: usize },
	WrongLength { expected: usize, actual: usize },
	/// A SysEx does not end in 0xF7.
	UnterminatedSysEx,
	TooLong,
}

impl fmt::Display for MessageError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MessageError::Empty => write!(f, "empty message"),
			MessageError::MissingStatus => write!(f, "message does not start with a status byte"),
			MessageError::UnexpectedStatus { position } => write!(f, "status byte at data position {}", position),
			MessageError::WrongLength { expected, actual } => write!(f, "expected {} bytes, got {}", expected, actual),
			MessageError::UnterminatedSysEx => write!(f, "sysex is not terminated by 0xF7"),
			MessageError::TooLong => write!(f, "message exceeds {} bytes", MAX_MESSAGE_LEN),
		}
	}
}

/// An outgoing message: one status byte followed by the data bytes its status implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiTxMessage {
	bytes: heapless::Vec<u8, MAX_MESSAGE_LEN>,
}

impl MidiTxMessage {
	/// Validates `bytes` against the MIDI grammar.
	pub fn new(bytes: &[u8]) -> Result<MidiTxMessage, MessageError> {
		let (&status, data) = bytes.split_first().ok_or(MessageError::Empty)?;
		if !is_status(status) || status == SYSEX_END {
			return Err(MessageError::MissingStatus);
		}

		let payload = match data_length(status) {
			Some(length) => {
				let expected = 1 + length as usize;
				if bytes.len() != expected {
					return Err(MessageError::WrongLength { expected, actual: bytes.len() });
				}
				data
			}
			None => match data.split_last() {
				Some((&SYSEX_END, payload)) => payload,
				_ => return Err(MessageError::UnterminatedSysEx),
			},
		};
		if let Some(position) = payload.iter().position(|byte| is_status(*byte)) {
			return Err(MessageError::UnexpectedStatus { position: position + 1 });
		}

		let bytes = heapless::Vec::from_slice(bytes).map_err(|_| MessageError::TooLong)?;
		Ok(MidiTxMessage { bytes })
	}

	fn from_trusted(bytes: &[u8]) -> MidiTxMessage {
		debug_assert!(bytes.len() <= 3);
		let mut message = MidiTxMessage { bytes: heapless::Vec::new() };
		message.bytes.extend_from_slice(bytes).ok();
		message
	}

	fn channel_message(kind: u8, channel: u8, data: &[u8]) -> MidiTxMessage {
		let mut bytes = [kind | (channel & 0x0F), 0, 0];
		for (dst, src) in bytes[1..].iter_mut().zip(data) {
			*dst = src & 0x7F;
		}
		MidiTxMessage::from_trusted(&bytes[..1 + data.len()])
	}

	pub fn note_off(channel: u8, note: u8, velocity: u8) -> MidiTxMessage {
		MidiTxMessage::channel_message(0x80, channel, &[note, velocity])
	}
	pub fn note_on(channel: u8, note: u8, velocity: u8) -> MidiTxMessage {
		MidiTxMessage::channel_message(0x90, channel, &[note, velocity])
	}
	pub fn polyphonic_key_pressure(channel: u8, note: u8, pressure: u8) -> MidiTxMessage {
		MidiTxMessage::channel_message(0xA0, channel, &[note, pressure])
	}
	pub fn control_change(channel: u8, control: u8, value: u8) -> MidiTxMessage {
		MidiTxMessage::channel_message(0xB0, channel, &[control, value])
	}
	pub fn program_change(channel: u8, program: u8) -> MidiTxMessage {
		MidiTxMessage::channel_message(0xC0, channel, &[program])
	}
	pub fn channel_pressure(channel: u8, pressure: u8) -> MidiTxMessage {
		MidiTxMessage::channel_message(0xD0, channel, &[pressure])
	}
	/// `value` is the raw 14 bit bend, 8192 being centered.
	pub fn pitch_bend(channel: u8, value: u16) -> MidiTxMessage {
		MidiTxMessage::channel_message(0xE0, channel, &split_u14(value))
	}

	pub fn time_code_quarter_frame(value: u8) -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xF1, value & 0x7F])
	}
	pub fn song_position(beats: u16) -> MidiTxMessage {
		let [lsb, msb] = split_u14(beats);
		MidiTxMessage::from_trusted(&[0xF2, lsb, msb])
	}
	pub fn song_select(song: u8) -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xF3, song & 0x7F])
	}
	pub fn tune_request() -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xF6])
	}

	pub fn timing_clock() -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xF8])
	}
	pub fn start() -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xFA])
	}
	pub fn continue_() -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xFB])
	}
	pub fn stop() -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xFC])
	}
	pub fn active_sensing() -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xFE])
	}
	pub fn system_reset() -> MidiTxMessage {
		MidiTxMessage::from_trusted(&[0xFF])
	}

	/// Frames `payload` with 0xF0 / 0xF7.
	pub fn system_exclusive(payload: &[u8]) -> Result<MidiTxMessage, MessageError> {
		if payload.len() > SYSEX_BUFFER_LEN {
			return Err(MessageError::TooLong);
		}
		if let Some(position) = payload.iter().position(|byte| is_status(*byte)) {
			return Err(MessageError::UnexpectedStatus { position: position + 1 });
		}
		let mut bytes = heapless::Vec::new();
		bytes.push(SYSEX_START).ok();
		bytes.extend_from_slice(payload).ok();
		bytes.push(SYSEX_END).ok();
		Ok(MidiTxMessage { bytes })
	}

	pub fn status(&self) -> u8 {
		self.bytes[0]
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.bytes
	}

	pub fn len(&self) -> usize {
		self.bytes.len()
	}
}

impl From<&MidiEvent> for MidiTxMessage {
	fn from(event: &MidiEvent) -> MidiTxMessage {
		match event {
			MidiEvent::SystemExclusive(payload) => {
				let mut bytes = heapless::Vec::new();
				bytes.push(SYSEX_START).ok();
				bytes.extend_from_slice(payload).ok();
				bytes.push(SYSEX_END).ok();
				MidiTxMessage { bytes }
			}
			_ => {
				let status = event.status();
				let [d0, d1] = event.data();
				let length = data_length(status).unwrap_or(0) as usize;
				MidiTxMessage::from_trusted(&[status, d0, d1][..1 + length])
			}
		}
	}
}
