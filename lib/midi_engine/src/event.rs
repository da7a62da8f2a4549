use crate::SYSEX_BUFFER_LEN;

/// SysEx payload, without the 0xF0 / 0xF7 framing.
pub type SysEx = heapless::Vec<u8, SYSEX_BUFFER_LEN>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageType {
	NoteOff,
	NoteOn,
	PolyphonicKeyPressure,
	ControlChange,
	ProgramChange,
	ChannelPressure,
	PitchBend,
	SystemExclusive,
	SystemCommon,
	SystemRealTime,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SystemCommon {
	TimeCodeQuarterFrame(u8),
	/// 14 bit song position, in MIDI beats (sixteenth notes).
	SongPosition(u16),
	SongSelect(u8),
	TuneRequest,
	/// 0xF4 and 0xF5 are reserved by the MIDI standard.
	Undefined(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SystemRealTime {
	TimingClock,
	Start,
	Continue,
	Stop,
	ActiveSensing,
	Reset,
	/// 0xF9 and 0xFD are reserved by the MIDI standard.
	Undefined(u8),
}

impl SystemRealTime {
	pub fn from_status(status: u8) -> SystemRealTime {
		debug_assert!(crate::is_realtime(status));
		match status {
			0xF8 => SystemRealTime::TimingClock,
			0xFA => SystemRealTime::Start,
			0xFB => SystemRealTime::Continue,
			0xFC => SystemRealTime::Stop,
			0xFE => SystemRealTime::ActiveSensing,
			0xFF => SystemRealTime::Reset,
			other => SystemRealTime::Undefined(other),
		}
	}

	pub fn status(&self) -> u8 {
		match self {
			SystemRealTime::TimingClock => 0xF8,
			SystemRealTime::Start => 0xFA,
			SystemRealTime::Continue => 0xFB,
			SystemRealTime::Stop => 0xFC,
			SystemRealTime::ActiveSensing => 0xFE,
			SystemRealTime::Reset => 0xFF,
			SystemRealTime::Undefined(status) => *status,
		}
	}
}

/// Channel mode messages, sent as control changes 120 to 127.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ChannelMode {
	AllSoundOff,
	ResetAllControllers,
	LocalControl(bool),
	AllNotesOff,
	OmniOff,
	OmniOn,
	/// Number of channels, 0 meaning "as many as there are voices".
	MonoOn(u8),
	PolyOn,
}

/// A complete, decoded MIDI message. All data bytes are in 0..=127 and channels in 0..=15.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MidiEvent {
	NoteOff { channel: u8, note: u8, velocity: u8 },
	NoteOn { channel: u8, note: u8, velocity: u8 },
	PolyphonicKeyPressure { channel: u8, note: u8, pressure: u8 },
	ControlChange { channel: u8, control: u8, value: u8 },
	ProgramChange { channel: u8, program: u8 },
	ChannelPressure { channel: u8, pressure: u8 },
	/// Raw 14 bit value, 8192 is centered.
	PitchBend { channel: u8, value: u16 },
	SystemExclusive(SysEx),
	SystemCommon(SystemCommon),
	SystemRealTime(SystemRealTime),
}

impl MidiEvent {
	/// Builds the event for a complete channel voice or system common message.
	/// Returns `None` for SysEx and real-time status bytes, which are not framed this way.
	pub(crate) fn from_parts(status: u8, data: [u8; 2]) -> Option<MidiEvent> {
		let channel = status & 0x0F;
		let [d0, d1] = data;
		let event = match status & 0xF0 {
			0x80 => MidiEvent::NoteOff { channel, note: d0, velocity: d1 },
			0x90 => MidiEvent::NoteOn { channel, note: d0, velocity: d1 },
			0xA0 => MidiEvent::PolyphonicKeyPressure { channel, note: d0, pressure: d1 },
			0xB0 => MidiEvent::ControlChange { channel, control: d0, value: d1 },
			0xC0 => MidiEvent::ProgramChange { channel, program: d0 },
			0xD0 => MidiEvent::ChannelPressure { channel, pressure: d0 },
			0xE0 => MidiEvent::PitchBend { channel, value: u14(d0, d1) },
			_ => MidiEvent::SystemCommon(match status {
				0xF1 => SystemCommon::TimeCodeQuarterFrame(d0),
				0xF2 => SystemCommon::SongPosition(u14(d0, d1)),
				0xF3 => SystemCommon::SongSelect(d0),
				0xF6 => SystemCommon::TuneRequest,
				0xF4 | 0xF5 => SystemCommon::Undefined(status),
				_ => return None,
			}),
		};
		Some(event)
	}

	pub fn message_type(&self) -> MessageType {
		match self {
			MidiEvent::NoteOff { .. } => MessageType::NoteOff,
			MidiEvent::NoteOn { .. } => MessageType::NoteOn,
			MidiEvent::PolyphonicKeyPressure { .. } => MessageType::PolyphonicKeyPressure,
			MidiEvent::ControlChange { .. } => MessageType::ControlChange,
			MidiEvent::ProgramChange { .. } => MessageType::ProgramChange,
			MidiEvent::ChannelPressure { .. } => MessageType::ChannelPressure,
			MidiEvent::PitchBend { .. } => MessageType::PitchBend,
			MidiEvent::SystemExclusive(_) => MessageType::SystemExclusive,
			MidiEvent::SystemCommon(_) => MessageType::SystemCommon,
			MidiEvent::SystemRealTime(_) => MessageType::SystemRealTime,
		}
	}

	/// The channel of a channel voice message, `None` for system messages.
	pub fn channel(&self) -> Option<u8> {
		match *self {
			MidiEvent::NoteOff { channel, .. }
			| MidiEvent::NoteOn { channel, .. }
			| MidiEvent::PolyphonicKeyPressure { channel, .. }
			| MidiEvent::ControlChange { channel, .. }
			| MidiEvent::ProgramChange { channel, .. }
			| MidiEvent::ChannelPressure { channel, .. }
			| MidiEvent::PitchBend { channel, .. } => Some(channel),
			_ => None,
		}
	}

	/// The status byte this event is transmitted with.
	pub fn status(&self) -> u8 {
		let channel = self.channel().unwrap_or(0);
		match self {
			MidiEvent::NoteOff { .. } => 0x80 | channel,
			MidiEvent::NoteOn { .. } => 0x90 | channel,
			MidiEvent::PolyphonicKeyPressure { .. } => 0xA0 | channel,
			MidiEvent::ControlChange { .. } => 0xB0 | channel,
			MidiEvent::ProgramChange { .. } => 0xC0 | channel,
			MidiEvent::ChannelPressure { .. } => 0xD0 | channel,
			MidiEvent::PitchBend { .. } => 0xE0 | channel,
			MidiEvent::SystemExclusive(_) => crate::SYSEX_START,
			MidiEvent::SystemCommon(common) => match common {
				SystemCommon::TimeCodeQuarterFrame(_) => 0xF1,
				SystemCommon::SongPosition(_) => 0xF2,
				SystemCommon::SongSelect(_) => 0xF3,
				SystemCommon::TuneRequest => 0xF6,
				SystemCommon::Undefined(status) => *status,
			},
			MidiEvent::SystemRealTime(realtime) => realtime.status(),
		}
	}

	/// The data bytes following the status byte; unused bytes are zero.
	/// SysEx payloads are not covered, see [`MidiEvent::SystemExclusive`].
	pub fn data(&self) -> [u8; 2] {
		match *self {
			MidiEvent::NoteOff { note, velocity, .. } | MidiEvent::NoteOn { note, velocity, .. } => [note, velocity],
			MidiEvent::PolyphonicKeyPressure { note, pressure, .. } => [note, pressure],
			MidiEvent::ControlChange { control, value, .. } => [control, value],
			MidiEvent::ProgramChange { program, .. } => [program, 0],
			MidiEvent::ChannelPressure { pressure, .. } => [pressure, 0],
			MidiEvent::PitchBend { value, .. } | MidiEvent::SystemCommon(SystemCommon::SongPosition(value)) => split_u14(value),
			MidiEvent::SystemCommon(SystemCommon::TimeCodeQuarterFrame(value))
			| MidiEvent::SystemCommon(SystemCommon::SongSelect(value)) => [value, 0],
			_ => [0, 0],
		}
	}

	/// Pitch bend relative to the center, in -8192..=8191.
	pub fn pitch_bend_signed(&self) -> Option<i16> {
		match *self {
			MidiEvent::PitchBend { value, .. } => Some(value as i16 - 8192),
			_ => None,
		}
	}

	/// Interprets control changes 120 to 127 as channel mode messages.
	pub fn as_channel_mode(&self) -> Option<ChannelMode> {
		let MidiEvent::ControlChange { control, value, .. } = *self else {
			return None;
		};
		let mode = match control {
			120 => ChannelMode::AllSoundOff,
			121 => ChannelMode::ResetAllControllers,
			122 => ChannelMode::LocalControl(value >= 64),
			123 => ChannelMode::AllNotesOff,
			124 => ChannelMode::OmniOff,
			125 => ChannelMode::OmniOn,
			126 => ChannelMode::MonoOn(value),
			127 => ChannelMode::PolyOn,
			_ => return None,
		};
		Some(mode)
	}
}

fn u14(lsb: u8, msb: u8) -> u16 {
	(lsb as u16 & 0x7F) | ((msb as u16 & 0x7F) << 7)
}

pub(crate) fn split_u14(value: u16) -> [u8; 2] {
	[(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}
