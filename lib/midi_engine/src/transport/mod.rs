//! The physical side of the engine: something that delivers raw MIDI bytes and
//! accepts raw MIDI bytes for sending.

use core::fmt;

pub mod uart;
pub mod usb;

#[cfg(test)]
pub(crate) mod mock;

/// Receive failure reported alongside delivered data.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxError {
	/// A byte arrived before the previous one was read.
	Overrun,
	/// Framing, noise or parity error on the serial line.
	Line,
	/// The bus (e.g. USB) reported an error.
	Bus,
}

impl fmt::Display for RxError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			RxError::Overrun => write!(f, "receiver overrun"),
			RxError::Line => write!(f, "line error"),
			RxError::Bus => write!(f, "bus error"),
		}
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
	/// The transmitter did not accept data within the configured budget.
	Timeout,
	/// The transport is not in a state where it can send (e.g. USB not configured).
	NotReady,
	Bus,
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransportError::Timeout => write!(f, "transmit timed out"),
			TransportError::NotReady => write!(f, "transport not ready"),
			TransportError::Bus => write!(f, "bus error"),
		}
	}
}

/// Receives bytes from a transport, in whatever context the transport delivers them.
pub trait RxSink {
	/// Called with freshly received bytes. On `Err`, `data` holds whatever was
	/// received before the error and the stream position is unreliable.
	fn on_rx(&mut self, data: &[u8], result: Result<(), RxError>);
}

pub trait Transport {
	type Config;

	fn init(&mut self, config: Self::Config) -> Result<(), TransportError>;

	/// Arms background reception.
	fn start_rx(&mut self);

	/// Whether reception is armed and healthy. Becomes `false` after a receive fault.
	fn rx_active(&self) -> bool;

	/// Discards received but not yet delivered bytes.
	fn flush_rx(&mut self);

	/// Polling pump: delivers pending bytes to `sink`. Push style transports do nothing here.
	fn receive(&mut self, sink: &mut dyn RxSink);

	/// Blocking write with a bounded wait.
	fn tx(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}
