//! USB-MIDI class transport. Only the 4-byte event packet layer is handled here,
//! enumeration and endpoint buffering belong to the USB stack behind [`UsbMidiPort`].

use core::fmt;

use super::{RxError, RxSink, Transport, TransportError};
use crate::{data_length, is_channel, is_realtime, is_status, is_system_common, SYSEX_END, SYSEX_START};

/// Endpoint access for USB-MIDI event packets.
pub trait UsbMidiPort {
	type Error: fmt::Debug;

	/// Whether the host has configured the device.
	fn configured(&self) -> bool;

	/// Reads whole event packets into `buffer`, returning the number of bytes read.
	fn read_packets(&mut self, buffer: &mut [u8]) -> nb::Result<usize, Self::Error>;

	fn write_packet(&mut self, packet: [u8; 4]) -> nb::Result<(), Self::Error>;
}

pub struct UsbConfig {
	/// Virtual cable number, 0..=15.
	pub cable: u8,
	/// How often a busy endpoint is retried per packet before giving up.
	pub tx_timeout: u32,
}

impl Default for UsbConfig {
	fn default() -> UsbConfig {
		UsbConfig { cable: 0, tx_timeout: 1000 }
	}
}

/// Number of MIDI bytes carried by a packet, from its code index number.
pub fn payload_length(header: u8) -> u8 {
	match header & 0x0F {
		0x0 | 0x1 => 0, // reserved
		0x5 | 0xF => 1,
		0x2 | 0x6 | 0xC | 0xD => 2,
		_ => 3,
	}
}

fn code_index(status: u8, len: u8, sysex_ends: bool) -> u8 {
	if status == SYSEX_START {
		match (sysex_ends, len) {
			(false, _) => 0x4,
			(true, 1) => 0x5,
			(true, 2) => 0x6,
			(true, _) => 0x7,
		}
	}
	else if is_channel(status) {
		status >> 4
	}
	else if is_realtime(status) {
		0xF
	}
	else {
		match len {
			1 => 0x5,
			2 => 0x2,
			_ => 0x3,
		}
	}
}

/// Turns a MIDI byte stream into USB-MIDI event packets.
///
/// Running status is expanded, SysEx is split into 3-byte packets and real-time
/// bytes get packets of their own wherever they appear. A SysEx interrupted by
/// another status byte is terminated with 0xF7.
pub struct UsbPacketizer {
	cable: u8,
	/// status of the message being collected, 0 if none
	status: u8,
	data: [u8; 3],
	len: u8,
}

impl UsbPacketizer {
	pub fn new(cable: u8) -> UsbPacketizer {
		UsbPacketizer {
			cable: cable & 0x0F,
			status: 0,
			data: [0; 3],
			len: 0,
		}
	}

	pub fn reset(&mut self) {
		self.status = 0;
		self.data = [0; 3];
		self.len = 0;
	}

	/// Returns the packets completed by `byte`: usually none or one, two when a
	/// status byte terminates a SysEx and is a complete message by itself.
	pub fn push(&mut self, byte: u8) -> heapless::Vec<[u8; 4], 2> {
		let mut packets = heapless::Vec::new();

		if is_realtime(byte) {
			packets.push(self.packet(0xF, [byte, 0, 0])).ok();
			return packets;
		}

		if is_status(byte) {
			if self.status == SYSEX_START {
				self.append(SYSEX_END);
				packets.push(self.take_packet(true)).ok();
			}
			self.reset();
			if byte == SYSEX_END {
				return packets;
			}
			self.status = byte;
			self.append(byte);
			if data_length(byte) == Some(0) {
				packets.push(self.take_packet(false)).ok();
				self.status = 0;
			}
			return packets;
		}

		match self.status {
			0 => {}
			SYSEX_START => {
				self.append(byte);
				if self.len == 3 {
					packets.push(self.take_packet(false)).ok();
				}
			}
			status => {
				if self.len == 0 {
					// running status
					self.append(status);
				}
				self.append(byte);
				if Some(self.len - 1) == data_length(status) {
					packets.push(self.take_packet(false)).ok();
					if is_system_common(status) {
						self.status = 0;
					}
				}
			}
		}
		packets
	}

	fn append(&mut self, byte: u8) {
		self.data[self.len as usize] = byte;
		self.len += 1;
	}

	fn take_packet(&mut self, sysex_ends: bool) -> [u8; 4] {
		let cin = code_index(self.status, self.len, sysex_ends);
		let packet = self.packet(cin, self.data);
		self.data = [0; 3];
		self.len = 0;
		packet
	}

	fn packet(&self, cin: u8, data: [u8; 3]) -> [u8; 4] {
		[self.cable << 4 | cin, data[0], data[1], data[2]]
	}
}

pub struct UsbTransport<P> {
	port: P,
	config: UsbConfig,
	packetizer: UsbPacketizer,
	listening: bool,
}

impl<P: UsbMidiPort> UsbTransport<P> {
	pub fn new(port: P) -> UsbTransport<P> {
		UsbTransport {
			port,
			config: UsbConfig::default(),
			packetizer: UsbPacketizer::new(0),
			listening: false,
		}
	}

	pub fn port(&self) -> &P {
		&self.port
	}

	pub fn port_mut(&mut self) -> &mut P {
		&mut self.port
	}

	fn write_packet(&mut self, packet: [u8; 4]) -> Result<(), TransportError> {
		for _ in 0..self.config.tx_timeout.max(1) {
			match self.port.write_packet(packet) {
				Ok(()) => return Ok(()),
				Err(nb::Error::WouldBlock) => continue,
				Err(nb::Error::Other(error)) => {
					log::warn!("usb midi: write failed: {:?}", error);
					return Err(TransportError::Bus);
				}
			}
		}
		Err(TransportError::Timeout)
	}
}

impl<P: UsbMidiPort> Transport for UsbTransport<P> {
	type Config = UsbConfig;

	fn init(&mut self, config: UsbConfig) -> Result<(), TransportError> {
		self.packetizer = UsbPacketizer::new(config.cable);
		self.config = config;
		self.listening = false;
		Ok(())
	}

	fn start_rx(&mut self) {
		self.listening = true;
	}

	fn rx_active(&self) -> bool {
		self.listening
	}

	fn flush_rx(&mut self) {
		let mut buffer = [0u8; 64];
		while let Ok(len) = self.port.read_packets(&mut buffer) {
			if len == 0 {
				break;
			}
		}
	}

	fn receive(&mut self, sink: &mut dyn RxSink) {
		if !self.listening || !self.port.configured() {
			return;
		}
		let mut buffer = [0u8; 64];
		loop {
			let len = match self.port.read_packets(&mut buffer) {
				Ok(0) | Err(nb::Error::WouldBlock) => return,
				Ok(len) => len,
				Err(nb::Error::Other(_)) => {
					self.listening = false;
					sink.on_rx(&[], Err(RxError::Bus));
					return;
				}
			};

			let mut bytes: heapless::Vec<u8, 48> = heapless::Vec::new();
			for packet in buffer[..len].chunks_exact(4) {
				if packet[0] >> 4 != self.config.cable {
					continue;
				}
				let payload = payload_length(packet[0]) as usize;
				bytes.extend_from_slice(&packet[1..1 + payload]).ok();
			}
			if !bytes.is_empty() {
				sink.on_rx(&bytes, Ok(()));
			}
		}
	}

	fn tx(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
		if !self.port.configured() {
			return Err(TransportError::NotReady);
		}
		for byte in bytes {
			for packet in self.packetizer.push(*byte) {
				if let Err(error) = self.write_packet(packet) {
					self.packetizer.reset();
					return Err(error);
				}
			}
		}
		Ok(())
	}
}
