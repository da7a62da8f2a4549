#![no_main]
#![no_std]

mod logger;
mod panic;

use stm32f1xx_hal::time::Hertz;

const SYSCLK: Hertz = Hertz(72_000_000);
const MIDI_BAUDRATE: u32 = 31_250;
const CLOCK_BPM: u32 = 120;
const CLOCKS_PER_QUARTER_NOTE: u32 = 24;

#[rtic::app(device = stm32f1xx_hal::pac, peripherals = true)]
mod app {
	use super::*;

	use embedded_hal::digital::v2::OutputPin;
	use midi_engine::message::MidiTxMessage;
	use midi_engine::transport::uart::{UartConfig, UartLink, UartRx, UartTransport};
	use midi_engine::{Config, MidiBuffers, MidiHandler, MidiIsrSender, MidiReceiver, RxError};
	use stm32f1xx_hal::{pac, prelude::*, serial, timer};

	// every queued event or message reserves room for a full SysEx
	const RX_EVENTS: usize = 16;
	const TX_MESSAGES: usize = 16;
	const ISR_MESSAGES: usize = 8;
	const TX_BUFFER: usize = 64;

	type DinTransport = UartTransport<'static, serial::Tx<pac::USART2>>;
	type DinMidi = MidiHandler<'static, DinTransport, RX_EVENTS, TX_MESSAGES, ISR_MESSAGES, TX_BUFFER>;

	#[shared]
	struct Shared {}

	#[local]
	struct Local {
		midi: DinMidi,
		receiver: MidiReceiver<'static, RX_EVENTS>,
		din_rx: UartRx<'static, serial::Rx<pac::USART2>>,
		clock: MidiIsrSender<'static, ISR_MESSAGES>,
		clock_timer: timer::CountDownTimer<pac::TIM2>,
	}

	#[init(local = [
		buffers: MidiBuffers<RX_EVENTS, ISR_MESSAGES> = MidiBuffers::new(),
		link: UartLink = UartLink::new(),
		rx_buffer: [u8; 16] = [0; 16],
	])]
	fn init(cx: init::Context) -> (Shared, Local, init::Monotonics) {
		let dp = cx.device;

		// Clock configuration
		let mut flash = dp.FLASH.constrain();
		let mut rcc = dp.RCC.constrain();

		let clocks = rcc.cfgr
			.use_hse(8.mhz())
			.sysclk(SYSCLK)
			.pclk1(36.mhz())
			.pclk2(72.mhz())
			.freeze(&mut flash.acr);

		let mut afio = dp.AFIO.constrain(&mut rcc.apb2);
		let mut gpioa = dp.GPIOA.split(&mut rcc.apb2);
		let mut gpioc = dp.GPIOC.split(&mut rcc.apb2);

		// Configure the on-board LED (PC13, green)
		let mut led = gpioc.pc13.into_push_pull_output(&mut gpioc.crh);
		led.set_high().ok(); // Turn off

		// Debug output on USART1
		let debug = serial::Serial::usart1(
			dp.USART1,
			(gpioa.pa9.into_alternate_push_pull(&mut gpioa.crh), gpioa.pa10),
			&mut afio.mapr,
			serial::Config::default().baudrate(38400.bps()),
			clocks,
			&mut rcc.apb2
		);
		let (debug_tx, _debug_rx) = debug.split();
		logger::init(debug_tx);
		log::info!("========================================================");
		log::info!("midi_engine firmware {}", env!("CARGO_PKG_VERSION"));
		log::info!("========================================================");

		// DIN MIDI on USART2
		let mut din = serial::Serial::usart2(
			dp.USART2,
			(gpioa.pa2.into_alternate_push_pull(&mut gpioa.crl), gpioa.pa3),
			&mut afio.mapr,
			serial::Config::default().baudrate(MIDI_BAUDRATE.bps()),
			clocks,
			&mut rcc.apb1
		);
		din.listen(serial::Event::Rxne);
		let (din_tx, din_rx) = din.split();

		let link: &'static UartLink = cx.local.link;
		let (transport, mut din_rx) = link.split(din_tx, din_rx, cx.local.rx_buffer);
		din_rx.classify_errors(|error| match error {
			serial::Error::Overrun => RxError::Overrun,
			_ => RxError::Line,
		});

		let (mut midi, clock) = DinMidi::new(cx.local.buffers, transport);
		if let Err(error) = midi.init(Config { transport: UartConfig::default(), running_status: true }) {
			log::error!("midi init failed: {}", error);
		}
		let receiver = midi.take_receiver().unwrap();
		midi.start_receive();

		// MIDI clock generator
		let mut clock_timer = timer::Timer::tim2(dp.TIM2, &clocks, &mut rcc.apb1)
			.start_count_down(Hertz(CLOCK_BPM * CLOCKS_PER_QUARTER_NOTE / 60));
		clock_timer.listen(timer::Event::Update);

		log::info!("listening, clock at {} bpm", CLOCK_BPM);

		(Shared {}, Local { midi, receiver, din_rx, clock, clock_timer }, init::Monotonics())
	}

	#[idle(local = [midi])]
	fn idle(cx: idle::Context) -> ! {
		let midi = cx.local.midi;
		loop {
			midi.listen();

			while let Some(event) = midi.pop_event() {
				log::debug!("DIN >>> {:?}", event);
				// MIDI thru for channel messages, clock comes from our own generator
				if event.channel().is_some() && midi.enqueue_message(MidiTxMessage::from(&event)).is_err() {
					log::info!("thru queue full, dropping {:?}", event);
				}
			}

			// failures are logged by the handler and not retried
			midi.transmit_enqueued_messages().ok();
		}
	}

	#[task(binds = USART2, local = [din_rx, receiver], priority = 3)]
	fn din_received(cx: din_received::Context) {
		cx.local.din_rx.on_interrupt(cx.local.receiver);
	}

	#[task(binds = TIM2, local = [clock_timer, clock], priority = 2)]
	fn midi_clock(cx: midi_clock::Context) {
		cx.local.clock_timer.clear_update_interrupt_flag();
		// the pulse is lost if the main loop stalls long enough to fill the queue
		cx.local.clock.enqueue_message(MidiTxMessage::timing_clock()).ok();
	}
}
