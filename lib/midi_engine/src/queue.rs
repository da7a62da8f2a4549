use heapless::spsc::{Producer, Queue};

use crate::event::MidiEvent;
use crate::message::MidiTxMessage;
use crate::receiver::RxControl;

/// Storage shared between a [`MidiHandler`](crate::MidiHandler) and the
/// contexts feeding it: the received event queue, the priority transmit queue
/// and the receive control block.
///
/// Lives for as long as the handler borrows it, typically in a `static` or an
/// RTIC `local` resource. A queue of capacity `N` holds `N - 1` entries.
pub struct MidiBuffers<const RX: usize = 64, const ISR: usize = 32> {
	pub(crate) events: Queue<MidiEvent, RX>,
	pub(crate) isr_messages: Queue<MidiTxMessage, ISR>,
	pub(crate) control: RxControl<RX>,
}

impl<const RX: usize, const ISR: usize> MidiBuffers<RX, ISR> {
	pub const fn new() -> MidiBuffers<RX, ISR> {
		MidiBuffers {
			events: Queue::new(),
			isr_messages: Queue::new(),
			control: RxControl::new(),
		}
	}
}

/// Producer end of the priority transmit queue, meant to be moved into an
/// interrupt handler (e.g. a clock generator). Everything queued here goes out
/// before the handler's normal queue.
pub struct MidiIsrSender<'a, const ISR: usize> {
	producer: Producer<'a, MidiTxMessage, ISR>,
}

impl<'a, const ISR: usize> MidiIsrSender<'a, ISR> {
	pub(crate) fn new(producer: Producer<'a, MidiTxMessage, ISR>) -> MidiIsrSender<'a, ISR> {
		MidiIsrSender { producer }
	}

	/// Never blocks. A full queue hands the message back.
	pub fn enqueue_message(&mut self, message: MidiTxMessage) -> Result<(), MidiTxMessage> {
		self.producer.enqueue(message)
	}

	pub fn ready(&self) -> bool {
		self.producer.ready()
	}

	pub fn len(&self) -> usize {
		self.producer.len()
	}

	pub fn capacity(&self) -> usize {
		self.producer.capacity()
	}
}
