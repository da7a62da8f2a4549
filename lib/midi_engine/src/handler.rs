use heapless::spsc::{Consumer, Queue};

use crate::encoder::MidiTxBuffer;
use crate::event::MidiEvent;
use crate::message::MidiTxMessage;
use crate::queue::{MidiBuffers, MidiIsrSender};
use crate::receiver::{MidiReceiver, RxCallback, RxControl};
use crate::transport::{Transport, TransportError};

pub struct Config<C> {
	pub transport: C,
	/// Running status compression when sending and decompression when receiving.
	/// Off by default.
	pub running_status: bool,
}

impl<C: Default> Default for Config<C> {
	fn default() -> Config<C> {
		Config { transport: C::default(), running_status: false }
	}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandlerState {
	Uninitialized,
	Idle,
	Listening,
	/// Reception failed and was re-armed. Left on the next `listen` that
	/// finds the transport active.
	Recovering,
}

/// Ties a [`Transport`] to the receive decoder, the event queue and the two
/// transmit queues.
///
/// Received events are popped with [`pop_event`](Self::pop_event). Outgoing
/// messages are either sent immediately with [`send_message`](Self::send_message)
/// or queued and sent in one transport write by
/// [`transmit_enqueued_messages`](Self::transmit_enqueued_messages), the
/// priority queue (fed by [`MidiIsrSender`]) first.
///
/// `RX`, `TX` and `ISR` size the received event queue, the normal and the
/// priority transmit queue. Each queue holds one entry less than its size, so
/// the defaults keep 63, 63 and 31 entries. `BUF` is the size of the transmit
/// buffer in bytes.
pub struct MidiHandler<'a, T: Transport, const RX: usize = 64, const TX: usize = 64, const ISR: usize = 32, const BUF: usize = 256> {
	transport: T,
	state: HandlerState,
	control: &'a RxControl<RX>,
	receiver: Option<MidiReceiver<'a, RX>>,
	events: Consumer<'a, MidiEvent, RX>,
	tx_queue: Queue<MidiTxMessage, TX>,
	isr_queue: Consumer<'a, MidiTxMessage, ISR>,
	tx_buffer: MidiTxBuffer<BUF>,
}

impl<'a, T: Transport, const RX: usize, const TX: usize, const ISR: usize, const BUF: usize> MidiHandler<'a, T, RX, TX, ISR, BUF> {
	/// Builds the handler on top of `buffers`. The returned sender feeds the
	/// priority queue and may be moved to another context.
	pub fn new(buffers: &'a mut MidiBuffers<RX, ISR>, transport: T) -> (Self, MidiIsrSender<'a, ISR>) {
		let MidiBuffers { events, isr_messages, control } = buffers;
		let control: &'a RxControl<RX> = control;
		let (event_producer, event_consumer) = events.split();
		let (isr_producer, isr_consumer) = isr_messages.split();

		let handler = MidiHandler {
			transport,
			state: HandlerState::Uninitialized,
			control,
			receiver: Some(MidiReceiver::new(event_producer, control)),
			events: event_consumer,
			tx_queue: Queue::new(),
			isr_queue: isr_consumer,
			tx_buffer: MidiTxBuffer::new(false),
		};
		(handler, MidiIsrSender::new(isr_producer))
	}

	pub fn init(&mut self, config: Config<T::Config>) -> Result<(), TransportError> {
		self.transport.init(config.transport)?;
		self.tx_buffer.init(config.running_status);
		self.control.set_running_status(config.running_status);
		self.control.request_reset();
		self.state = HandlerState::Idle;
		log::debug!("midi: initialized, running status {}", config.running_status);
		Ok(())
	}

	/// Starts reception with the built-in decoder.
	pub fn start_receive(&mut self) {
		self.start(None);
	}

	/// Starts reception, handing raw bytes to `callback` instead of the decoder.
	pub fn start_receive_with_callback(&mut self, callback: RxCallback<RX>) {
		self.start(Some(callback));
	}

	fn start(&mut self, callback: Option<RxCallback<RX>>) {
		if self.state == HandlerState::Uninitialized {
			log::warn!("midi: start_receive before init");
			return;
		}
		self.control.set_callback(callback);
		self.transport.start_rx();
		self.state = HandlerState::Listening;
	}

	/// Call on every main loop iteration. Re-arms reception after a transport
	/// fault and pumps polling transports.
	pub fn listen(&mut self) {
		if self.state == HandlerState::Uninitialized {
			return;
		}
		if !self.transport.rx_active() {
			if self.state == HandlerState::Listening {
				log::warn!("midi: reception stopped, restarting");
			}
			self.state = HandlerState::Recovering;
			self.control.request_reset();
			self.transport.flush_rx();
			self.transport.start_rx();
		}
		else if self.state == HandlerState::Recovering {
			log::debug!("midi: reception restored");
			self.state = HandlerState::Listening;
		}
		if let Some(receiver) = self.receiver.as_mut() {
			self.transport.receive(receiver);
		}
	}

	/// Detaches the receive half for transports that deliver from an interrupt.
	/// `listen` keeps handling recovery but no longer pumps the transport.
	pub fn take_receiver(&mut self) -> Option<MidiReceiver<'a, RX>> {
		self.receiver.take()
	}

	pub fn has_events(&self) -> bool {
		self.events.ready()
	}

	pub fn pop_event(&mut self) -> Option<MidiEvent> {
		self.events.dequeue()
	}

	pub fn rx_active(&self) -> bool {
		self.transport.rx_active()
	}

	pub fn state(&self) -> HandlerState {
		self.state
	}

	/// Feeds one received byte to the decoder. Returns `false` and discards
	/// the byte once the receiver was detached with `take_receiver`; a detached
	/// receiver has its own `parse`.
	pub fn parse(&mut self, byte: u8) -> bool {
		match self.receiver.as_mut() {
			Some(receiver) => {
				receiver.parse(byte);
				true
			}
			None => false,
		}
	}

	/// Sends `bytes` right away, bypassing both queues.
	pub fn send_message(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
		// the receiving side loses track of our running status
		self.tx_buffer.reset_running_status();
		self.transport.tx(bytes)
	}

	/// Never blocks. A full queue hands the message back.
	pub fn enqueue_message(&mut self, message: MidiTxMessage) -> Result<(), MidiTxMessage> {
		self.tx_queue.enqueue(message)
	}

	/// Encodes as many queued messages as fit into the transmit buffer, priority
	/// queue first, and sends them in one transport write. Messages that don't
	/// fit stay queued for the next call. Returns the number of bytes written.
	pub fn transmit_enqueued_messages(&mut self) -> Result<usize, TransportError> {
		let mut full = fill_from_queue(&mut self.tx_buffer, &mut self.isr_queue);
		if !full {
			let mut normal = self.tx_queue.split().1;
			full = fill_from_queue(&mut self.tx_buffer, &mut normal);
		}
		if full {
			log::debug!("midi: transmit buffer full, {} messages deferred", self.isr_queue.len() + self.tx_queue.len());
		}

		if self.tx_buffer.is_empty() {
			return Ok(0);
		}
		let sent = self.tx_buffer.len();
		let result = self.transport.tx(self.tx_buffer.data());
		self.tx_buffer.consume();
		match result {
			Ok(()) => Ok(sent),
			Err(error) => {
				log::warn!("midi: transmit failed: {}", error);
				self.tx_buffer.reset_running_status();
				Err(error)
			}
		}
	}

	pub fn transport(&self) -> &T {
		&self.transport
	}

	pub fn transport_mut(&mut self) -> &mut T {
		&mut self.transport
	}
}

/// Moves messages from `queue` into `buffer` until the queue is empty or the
/// next message does not fit. Returns `true` in the latter case.
fn fill_from_queue<const BUF: usize, const N: usize>(buffer: &mut MidiTxBuffer<BUF>, queue: &mut Consumer<'_, MidiTxMessage, N>) -> bool {
	while let Some(message) = queue.peek() {
		if !buffer.write_message(message.as_bytes()) {
			if !buffer.is_empty() {
				return true;
			}
			// can never fit, even into an empty buffer
			log::warn!("midi: dropping {} byte message, transmit buffer holds {}", message.len(), buffer.capacity());
		}
		queue.dequeue();
	}
	return false;
}
