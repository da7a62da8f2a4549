use crate::event::{MidiEvent, SysEx, SystemRealTime};
use crate::{data_length, is_channel, is_realtime, is_status, SYSEX_END, SYSEX_START};

/// Byte-at-a-time MIDI decoder.
///
/// Tracks running status, lets system real-time bytes interleave with any
/// other message and collects SysEx payloads. Bytes that do not fit the
/// grammar are dropped; a partial message is never returned.
///
/// A SysEx is closed by 0xF7 or by any other non-real-time status byte. A
/// SysEx that outgrows [`SYSEX_BUFFER_LEN`](crate::SYSEX_BUFFER_LEN) is
/// discarded entirely and the parser skips to the next status byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MidiParser {
	running_status_enabled: bool,
	/// last channel voice status, 0 if none
	running_status: u8,
	/// status of the message in progress, 0 if none
	status: u8,
	data: [u8; 2],
	datalen: u8,
	sysex: SysEx,
	sysex_overflow: bool,
}

impl Default for MidiParser {
	fn default() -> MidiParser {
		MidiParser::new()
	}
}

impl MidiParser {
	/// A parser in its initial state, with running status decoding enabled.
	pub fn new() -> MidiParser {
		MidiParser::with_running_status(true)
	}

	pub fn with_running_status(enabled: bool) -> MidiParser {
		MidiParser {
			running_status_enabled: enabled,
			running_status: 0,
			status: 0,
			data: [0; 2],
			datalen: 0,
			sysex: SysEx::new(),
			sysex_overflow: false,
		}
	}

	/// Enables or disables decoding of data bytes that arrive without a status byte.
	pub fn set_running_status(&mut self, enabled: bool) {
		self.running_status_enabled = enabled;
		if !enabled {
			self.running_status = 0;
		}
	}

	pub fn running_status_enabled(&self) -> bool {
		self.running_status_enabled
	}

	/// Forgets the message in progress and the running status, so that the
	/// next byte is only accepted if it is a status byte.
	pub fn reset(&mut self) {
		self.running_status = 0;
		self.status = 0;
		self.data = [0; 2];
		self.datalen = 0;
		self.sysex.clear();
		self.sysex_overflow = false;
	}

	/// Whether a message has been started but not completed yet.
	pub fn in_progress(&self) -> bool {
		self.status != 0
	}

	pub fn parse(&mut self, byte: u8) -> Option<MidiEvent> {
		if is_realtime(byte) {
			return Some(MidiEvent::SystemRealTime(SystemRealTime::from_status(byte)));
		}
		if is_status(byte) {
			return self.begin(byte);
		}
		self.push_data(byte)
	}

	fn begin(&mut self, status: u8) -> Option<MidiEvent> {
		let closed = if self.status == SYSEX_START { self.finish_sysex() } else { None };
		self.status = 0;
		self.data = [0; 2];
		self.datalen = 0;

		if is_channel(status) {
			self.status = status;
			self.running_status = status;
			return closed;
		}

		// SysEx and system common messages cancel running status
		self.running_status = 0;
		if status == SYSEX_END {
			return closed;
		}
		if status == SYSEX_START {
			self.status = SYSEX_START;
			return closed;
		}

		match data_length(status) {
			Some(0) => {
				// a single byte message interrupting an unterminated SysEx is absorbed
				if closed.is_some() {
					return closed;
				}
				MidiEvent::from_parts(status, [0; 2])
			}
			_ => {
				self.status = status;
				closed
			}
		}
	}

	fn push_data(&mut self, byte: u8) -> Option<MidiEvent> {
		if self.status == SYSEX_START {
			if !self.sysex_overflow && self.sysex.push(byte).is_err() {
				self.sysex_overflow = true;
			}
			return None;
		}

		if self.status == 0 {
			if !self.running_status_enabled || self.running_status == 0 {
				return None;
			}
			self.status = self.running_status;
		}

		self.data[self.datalen as usize] = byte;
		self.datalen += 1;

		if Some(self.datalen) != data_length(self.status) {
			return None;
		}

		let event = MidiEvent::from_parts(self.status, self.data);
		self.status = 0;
		self.data = [0; 2];
		self.datalen = 0;
		return event;
	}

	fn finish_sysex(&mut self) -> Option<MidiEvent> {
		self.status = 0;
		if self.sysex_overflow {
			self.sysex_overflow = false;
			self.sysex.clear();
			return None;
		}
		Some(MidiEvent::SystemExclusive(core::mem::take(&mut self.sysex)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::event::SystemCommon;
	use crate::SYSEX_BUFFER_LEN;
	use rand_core::RngCore;

	fn note_on(channel: u8, note: u8, velocity: u8) -> MidiEvent {
		MidiEvent::NoteOn { channel, note, velocity }
	}

	fn sysex(payload: &[u8]) -> MidiEvent {
		MidiEvent::SystemExclusive(SysEx::from_slice(payload).unwrap())
	}

	fn check(parser: &mut MidiParser, input: &[u8], desired_output: &[MidiEvent]) {
		let mut count = 0;
		for actual in input.iter().filter_map(|byte| parser.parse(*byte)) {
			assert!(count < desired_output.len(), "unexpected extra event {:?}", actual);
			let desired = &desired_output[count];
			assert!(actual == *desired, "expected {:02X?}, got {:02X?}", desired, actual);
			count += 1;
		}
		assert!(count == desired_output.len(), "expected {} events, got {}", desired_output.len(), count);
	}

	#[test]
	fn withstands_garbage_input() {
		let mut rng = rand_pcg::Pcg32::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);
		for _ in 0..10000 {
			let mut parser = MidiParser::new();
			for _ in 0..100 {
				parser.parse(rng.next_u32() as u8);
			}
			// check if it's recovering
			parser.parse(0xB0);
			assert!(parser.parse(0x13) == None);
			assert!(parser.parse(0x37) == Some(MidiEvent::ControlChange { channel: 0, control: 0x13, value: 0x37 }));
		}
	}

	#[test]
	fn withstands_zero_input() {
		let mut parser = MidiParser::new();
		for _ in 0..100 {
			assert!(parser.parse(0) == None);
		}
		assert!(parser.parse(0xB0) == None);
		assert!(parser.parse(0x13) == None);
		assert!(parser.parse(0x37) == Some(MidiEvent::ControlChange { channel: 0, control: 0x13, value: 0x37 }));
	}

	#[test]
	fn voice_messages_and_running_status() {
		let mut parser = MidiParser::new();
		let input = [
			0x84, 42, 52, 43, 53, // note off
			0x93, 13, 37, 11, 11, // note on
			0xA0, 12, 34, 56, 78, // poly aftertouch
			0xB0, 0, 0, 47, 11, // control change
			0xC0, 64, 65, 66, // program change
			0xD0, 1, 2, // mono aftertouch
			0xE0, 0, 64, 127, 127, // pitch bend
		];

		let desired_output = [
			MidiEvent::NoteOff { channel: 4, note: 42, velocity: 52 },
			MidiEvent::NoteOff { channel: 4, note: 43, velocity: 53 },
			note_on(3, 13, 37),
			note_on(3, 11, 11),
			MidiEvent::PolyphonicKeyPressure { channel: 0, note: 12, pressure: 34 },
			MidiEvent::PolyphonicKeyPressure { channel: 0, note: 56, pressure: 78 },
			MidiEvent::ControlChange { channel: 0, control: 0, value: 0 },
			MidiEvent::ControlChange { channel: 0, control: 47, value: 11 },
			MidiEvent::ProgramChange { channel: 0, program: 64 },
			MidiEvent::ProgramChange { channel: 0, program: 65 },
			MidiEvent::ProgramChange { channel: 0, program: 66 },
			MidiEvent::ChannelPressure { channel: 0, pressure: 1 },
			MidiEvent::ChannelPressure { channel: 0, pressure: 2 },
			MidiEvent::PitchBend { channel: 0, value: 8192 },
			MidiEvent::PitchBend { channel: 0, value: 16383 },
		];

		check(&mut parser, &input, &desired_output);
	}

	#[test]
	fn running_status_repeats_note_on() {
		let mut parser = MidiParser::new();
		check(&mut parser, &[0x90, 0x40, 0x7F, 0x41, 0x7F], &[note_on(0, 0x40, 0x7F), note_on(0, 0x41, 0x7F)]);
	}

	#[test]
	fn running_status_can_be_disabled() {
		let mut parser = MidiParser::with_running_status(false);
		check(&mut parser, &[0x90, 0x40, 0x7F, 0x41, 0x7F, 0x90, 0x42, 0x7F], &[note_on(0, 0x40, 0x7F), note_on(0, 0x42, 0x7F)]);
		assert!(!parser.running_status_enabled());
	}

	#[test]
	fn realtime_interleaves_with_channel_message() {
		let mut parser = MidiParser::new();
		check(
			&mut parser,
			&[0x90, 0xF8, 0x40, 0x7F],
			&[MidiEvent::SystemRealTime(SystemRealTime::TimingClock), note_on(0, 0x40, 0x7F)],
		);
	}

	#[test]
	fn realtime_works_and_does_not_interfere_with_running_status() {
		for msg in [0xF8u8, 0xFA, 0xFB, 0xFC, 0xFE, 0xFF] {
			let mut parser = MidiParser::new();
			let rt = MidiEvent::SystemRealTime(SystemRealTime::from_status(msg));
			let note_off = |note| MidiEvent::NoteOff { channel: 4, note, velocity: note };
			let input = [
				msg, 0x84, msg, 11, 11, msg, 22, 22, msg, 33, msg, msg, 33, msg, // note off
			];

			let desired_output = [
				rt.clone(),
				rt.clone(),
				note_off(11),
				rt.clone(),
				note_off(22),
				rt.clone(),
				rt.clone(),
				rt.clone(),
				note_off(33),
				rt.clone(),
			];

			check(&mut parser, &input, &desired_output);
		}
	}

	#[test]
	fn sysex_messages() {
		let mut parser = MidiParser::new();
		let input = [
			0xF0, 0xF7,
			0xF0, 1, 0xF7,
			0xF0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0xF7,
		];
		let desired_output = [sysex(&[]), sysex(&[1]), sysex(&[1, 2, 3, 4, 5, 6, 7, 8, 9])];
		check(&mut parser, &input, &desired_output);
	}

	#[test]
	fn sysex_with_realtime() {
		let mut parser = MidiParser::new();
		let clock = MidiEvent::SystemRealTime(SystemRealTime::TimingClock);
		let input = [
			0xF0, 0xF8, 0xF7,
			0xF0, 1, 0xF8, 2, 0xF7,
			0xF0, 1, 2, 0xF8, 3, 4, 5, 6, 0xF8, 7, 8, 9, 0xF7,
		];
		let desired_output = [
			clock.clone(), sysex(&[]),
			clock.clone(), sysex(&[1, 2]),
			clock.clone(), clock.clone(), sysex(&[1, 2, 3, 4, 5, 6, 7, 8, 9]),
		];
		check(&mut parser, &input, &desired_output);
	}

	#[test]
	fn sysex_may_end_with_other_status() {
		let mut parser = MidiParser::new();
		let input = [
			0xF0,
			0xF0, 1,
			0xF0, 1, 2, 3,
			0xB0, 13, 37,
		];
		let desired_output = [
			sysex(&[]),
			sysex(&[1]),
			sysex(&[1, 2, 3]),
			MidiEvent::ControlChange { channel: 0, control: 13, value: 37 },
		];
		check(&mut parser, &input, &desired_output);
	}

	#[test]
	fn sysex_cancels_running_status() {
		let mut parser = MidiParser::new();
		check(&mut parser, &[0x90, 1, 2, 0xF0, 5, 0xF7, 3, 4], &[note_on(0, 1, 2), sysex(&[5])]);
	}

	#[test]
	fn oversized_sysex_is_dropped() {
		let mut parser = MidiParser::new();
		parser.parse(0xF0);
		for i in 0..(SYSEX_BUFFER_LEN + 10) {
			assert!(parser.parse((i & 0x7F) as u8) == None);
		}
		assert!(parser.parse(0xF7) == None);
		assert!(!parser.in_progress());

		// the parser is usable again
		check(&mut parser, &[0xF0, 1, 2, 0xF7, 0x90, 1, 2], &[sysex(&[1, 2]), note_on(0, 1, 2)]);
	}

	#[test]
	fn sysex_of_maximum_length_fits() {
		let mut parser = MidiParser::new();
		parser.parse(0xF0);
		for _ in 0..SYSEX_BUFFER_LEN {
			parser.parse(0x55);
		}
		match parser.parse(0xF7) {
			Some(MidiEvent::SystemExclusive(payload)) => assert!(payload.len() == SYSEX_BUFFER_LEN),
			other => panic!("expected sysex, got {:?}", other),
		}
	}

	#[test]
	fn system_common() {
		let mut parser = MidiParser::new();
		let input = [
			0xF1, 42, // midi time code quarter frame
			0xF2, 13, 37, // song position pointer
			0xF3, 66, // song select
			0xF6, // tune request
			0xF6, // tune request
			0xF3, 67, // song select
			68, // no running status for system common
			0xF4, 0xF5,
		];

		let desired_output = [
			MidiEvent::SystemCommon(SystemCommon::TimeCodeQuarterFrame(42)),
			MidiEvent::SystemCommon(SystemCommon::SongPosition(13 | (37 << 7))),
			MidiEvent::SystemCommon(SystemCommon::SongSelect(66)),
			MidiEvent::SystemCommon(SystemCommon::TuneRequest),
			MidiEvent::SystemCommon(SystemCommon::TuneRequest),
			MidiEvent::SystemCommon(SystemCommon::SongSelect(67)),
			MidiEvent::SystemCommon(SystemCommon::Undefined(0xF4)),
			MidiEvent::SystemCommon(SystemCommon::Undefined(0xF5)),
		];

		check(&mut parser, &input, &desired_output);
	}

	#[test]
	fn system_common_cancels_running_status() {
		let mut parser = MidiParser::new();
		check(&mut parser, &[0x90, 1, 2, 0xF6, 3, 4], &[note_on(0, 1, 2), MidiEvent::SystemCommon(SystemCommon::TuneRequest)]);
	}

	#[test]
	fn tune_request_closes_unterminated_sysex() {
		let mut parser = MidiParser::new();
		check(&mut parser, &[0xF0, 1, 2, 0xF6], &[sysex(&[1, 2])]);
		assert!(!parser.in_progress());
	}

	#[test]
	fn stray_end_of_sysex_is_ignored() {
		let mut parser = MidiParser::new();
		check(&mut parser, &[0x90, 1, 2, 0xF7, 3, 4, 0x80, 5, 6], &[note_on(0, 1, 2), MidiEvent::NoteOff { channel: 0, note: 5, velocity: 6 }]);
	}

	#[test]
	fn new_status_abandons_partial_message() {
		let mut parser = MidiParser::new();
		check(&mut parser, &[0x90, 0x40, 0xB1, 7, 100], &[MidiEvent::ControlChange { channel: 1, control: 7, value: 100 }]);
	}

	#[test]
	fn reset_forgets_partial_message_and_running_status() {
		let mut parser = MidiParser::new();
		check(&mut parser, &[0x90, 1, 2, 0x90, 3], &[note_on(0, 1, 2)]);
		assert!(parser.in_progress());
		parser.reset();
		assert!(!parser.in_progress());
		check(&mut parser, &[4, 5, 6], &[]);
		assert!(parser == MidiParser::new());
	}

	#[test]
	fn reset_is_idempotent() {
		let mut once = MidiParser::new();
		let mut twice = MidiParser::new();
		for byte in [0x90, 1, 2, 0xF0, 3, 4] {
			once.parse(byte);
			twice.parse(byte);
		}
		once.reset();
		twice.reset();
		twice.reset();
		assert!(once == twice);
		assert!(twice == MidiParser::new());
	}
}
