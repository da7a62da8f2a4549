//! DIN / TRS MIDI over a serial port.
//!
//! The port is split into a main loop half ([`UartTransport`], sending and
//! (re-)arming reception) and an interrupt half ([`UartRx`], draining the
//! receiver). Both share a [`UartLink`].

use core::sync::atomic::AtomicBool;
use core::sync::atomic::Ordering::{Acquire, Release};

use embedded_hal::serial;

use super::{RxError, RxSink, Transport, TransportError};

pub struct UartConfig {
	/// How often a busy transmitter is polled per byte before giving up.
	pub tx_timeout: u32,
}

impl Default for UartConfig {
	fn default() -> UartConfig {
		UartConfig { tx_timeout: 100_000 }
	}
}

pub struct UartLink {
	listening: AtomicBool,
}

impl UartLink {
	pub const fn new() -> UartLink {
		UartLink { listening: AtomicBool::new(false) }
	}

	/// `rx_buffer` collects received bytes before they are handed to the sink,
	/// its length is the largest chunk delivered at once.
	pub fn split<'a, TX, RX>(&'a self, tx: TX, rx: RX, rx_buffer: &'a mut [u8]) -> (UartTransport<'a, TX>, UartRx<'a, RX>)
	where
		RX: serial::Read<u8>,
	{
		let transport = UartTransport { tx, link: self, config: UartConfig::default() };
		let rx = UartRx { rx, link: self, buffer: rx_buffer, classify: |_| RxError::Line };
		(transport, rx)
	}
}

pub struct UartTransport<'a, TX> {
	tx: TX,
	link: &'a UartLink,
	config: UartConfig,
}

impl<TX: serial::Write<u8>> Transport for UartTransport<'_, TX> {
	type Config = UartConfig;

	fn init(&mut self, config: UartConfig) -> Result<(), TransportError> {
		self.config = config;
		self.link.listening.store(false, Release);
		Ok(())
	}

	fn start_rx(&mut self) {
		self.link.listening.store(true, Release);
	}

	fn rx_active(&self) -> bool {
		self.link.listening.load(Acquire)
	}

	/// Nothing is buffered between interrupts, and bytes arriving while
	/// reception is inactive are discarded by the interrupt half.
	fn flush_rx(&mut self) {}

	fn receive(&mut self, _sink: &mut dyn RxSink) {}

	fn tx(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
		let budget = self.config.tx_timeout;
		let tx = &mut self.tx;
		for byte in bytes {
			poll_budget(budget, || tx.write(*byte))?;
		}
		poll_budget(budget, || tx.flush())
	}
}

fn poll_budget<E>(budget: u32, mut operation: impl FnMut() -> nb::Result<(), E>) -> Result<(), TransportError> {
	for _ in 0..budget.max(1) {
		match operation() {
			Ok(()) => return Ok(()),
			Err(nb::Error::WouldBlock) => continue,
			Err(nb::Error::Other(_)) => return Err(TransportError::Bus),
		}
	}
	Err(TransportError::Timeout)
}

/// Interrupt half of the serial port.
pub struct UartRx<'a, RX: serial::Read<u8>> {
	rx: RX,
	link: &'a UartLink,
	buffer: &'a mut [u8],
	classify: fn(&RX::Error) -> RxError,
}

impl<RX: serial::Read<u8>> UartRx<'_, RX> {
	/// Maps the serial driver's errors, which are reported as [`RxError::Line`] otherwise.
	pub fn classify_errors(&mut self, classify: fn(&RX::Error) -> RxError) {
		self.classify = classify;
	}

	/// Call from the receive interrupt. Reads everything the port has and
	/// delivers it to `sink`. A receive error stops reception until
	/// [`Transport::start_rx`] re-arms it.
	pub fn on_interrupt(&mut self, sink: &mut dyn RxSink) {
		let listening = self.link.listening.load(Acquire);
		let mut len = 0;
		loop {
			match self.rx.read() {
				Ok(_) if !listening => {}
				Ok(byte) => {
					if self.buffer.is_empty() {
						sink.on_rx(&[byte], Ok(()));
						continue;
					}
					self.buffer[len] = byte;
					len += 1;
					if len == self.buffer.len() {
						sink.on_rx(&self.buffer[..len], Ok(()));
						len = 0;
					}
				}
				Err(nb::Error::WouldBlock) => break,
				Err(nb::Error::Other(error)) => {
					if listening {
						self.link.listening.store(false, Release);
						sink.on_rx(&self.buffer[..len], Err((self.classify)(&error)));
					}
					return;
				}
			}
		}
		if len > 0 {
			sink.on_rx(&self.buffer[..len], Ok(()));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	extern crate std;
	use std::collections::VecDeque;
	use std::vec;
	use std::vec::Vec;

	#[derive(Debug, PartialEq)]
	enum SerialError {
		Overrun,
		Framing,
	}

	#[derive(Default)]
	struct FakeSerial {
		incoming: VecDeque<Result<u8, SerialError>>,
		outgoing: Vec<u8>,
		/// polls that report busy before each byte is accepted
		busy_polls: u32,
		busy: u32,
		stuck: bool,
	}

	impl serial::Read<u8> for FakeSerial {
		type Error = SerialError;
		fn read(&mut self) -> nb::Result<u8, SerialError> {
			match self.incoming.pop_front() {
				Some(Ok(byte)) => Ok(byte),
				Some(Err(error)) => Err(nb::Error::Other(error)),
				None => Err(nb::Error::WouldBlock),
			}
		}
	}

	impl serial::Write<u8> for FakeSerial {
		type Error = SerialError;
		fn write(&mut self, byte: u8) -> nb::Result<(), SerialError> {
			if self.stuck || self.busy < self.busy_polls {
				self.busy += 1;
				return Err(nb::Error::WouldBlock);
			}
			self.busy = 0;
			self.outgoing.push(byte);
			Ok(())
		}
		fn flush(&mut self) -> nb::Result<(), SerialError> {
			Ok(())
		}
	}

	#[derive(Default)]
	struct Collect {
		chunks: Vec<Vec<u8>>,
		errors: Vec<RxError>,
	}

	impl RxSink for Collect {
		fn on_rx(&mut self, data: &[u8], result: Result<(), RxError>) {
			self.chunks.push(data.to_vec());
			if let Err(error) = result {
				self.errors.push(error);
			}
		}
	}

	fn incoming(bytes: &[u8]) -> FakeSerial {
		FakeSerial { incoming: bytes.iter().map(|byte| Ok(*byte)).collect(), ..Default::default() }
	}

	#[test]
	fn delivers_in_chunks() {
		let link = UartLink::new();
		let mut buffer = [0u8; 4];
		let (mut transport, mut rx) = link.split(FakeSerial::default(), incoming(&[1, 2, 3, 4, 5, 6]), &mut buffer);
		transport.init(UartConfig::default()).unwrap();
		transport.start_rx();

		let mut sink = Collect::default();
		rx.on_interrupt(&mut sink);
		assert!(sink.chunks == [vec![1, 2, 3, 4], vec![5, 6]]);
		assert!(sink.errors.is_empty());
	}

	#[test]
	fn discards_while_inactive() {
		let link = UartLink::new();
		let mut buffer = [0u8; 4];
		let (mut transport, mut rx) = link.split(FakeSerial::default(), incoming(&[1, 2]), &mut buffer);
		transport.init(UartConfig::default()).unwrap();
		assert!(!transport.rx_active());

		let mut sink = Collect::default();
		rx.on_interrupt(&mut sink);
		assert!(sink.chunks.is_empty());

		rx.rx.incoming.push_back(Ok(3));
		transport.start_rx();
		rx.on_interrupt(&mut sink);
		assert!(sink.chunks == [vec![3]]);
	}

	#[test]
	fn error_stops_reception() {
		let link = UartLink::new();
		let mut buffer = [0u8; 8];
		let mut serial = incoming(&[0x90, 0x40]);
		serial.incoming.push_back(Err(SerialError::Framing));
		serial.incoming.push_back(Ok(0x7F));
		let (mut transport, mut rx) = link.split(FakeSerial::default(), serial, &mut buffer);
		transport.init(UartConfig::default()).unwrap();
		transport.start_rx();

		let mut sink = Collect::default();
		rx.on_interrupt(&mut sink);
		assert!(sink.chunks == [vec![0x90, 0x40]]);
		assert!(sink.errors == [RxError::Line]);
		assert!(!transport.rx_active());

		// the byte after the error is discarded while inactive
		rx.on_interrupt(&mut sink);
		assert!(sink.chunks.len() == 1);
	}

	#[test]
	fn classified_errors() {
		let link = UartLink::new();
		let mut buffer = [0u8; 8];
		let mut serial = FakeSerial::default();
		serial.incoming.push_back(Err(SerialError::Overrun));
		let (mut transport, mut rx) = link.split(FakeSerial::default(), serial, &mut buffer);
		rx.classify_errors(|error| match error {
			SerialError::Overrun => RxError::Overrun,
			SerialError::Framing => RxError::Line,
		});
		transport.start_rx();

		let mut sink = Collect::default();
		rx.on_interrupt(&mut sink);
		assert!(sink.errors == [RxError::Overrun]);
	}

	#[test]
	fn transmits_with_busy_transmitter() {
		let link = UartLink::new();
		let mut buffer = [0u8; 8];
		let serial = FakeSerial { busy_polls: 3, ..Default::default() };
		let (mut transport, _rx) = link.split(serial, FakeSerial::default(), &mut buffer);
		transport.init(UartConfig { tx_timeout: 10 }).unwrap();

		assert!(transport.tx(&[0xF8, 0x90, 1, 2]) == Ok(()));
		assert!(transport.tx.outgoing == [0xF8, 0x90, 1, 2]);
	}

	#[test]
	fn transmit_times_out() {
		let link = UartLink::new();
		let mut buffer = [0u8; 8];
		let serial = FakeSerial { stuck: true, ..Default::default() };
		let (mut transport, _rx) = link.split(serial, FakeSerial::default(), &mut buffer);
		transport.init(UartConfig { tx_timeout: 10 }).unwrap();

		assert!(transport.tx(&[0xF8]) == Err(TransportError::Timeout));
		assert!(transport.tx.busy == 10);
	}
}
