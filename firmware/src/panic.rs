use stm32f1xx_hal::pac;

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
	cortex_m::interrupt::disable();

	#[cfg(feature = "debugpanic")]
	crate::logger::write_raw(format_args!("Panic!\n{}\n", _info));

	// PC13 (on-board LED, active low) as push-pull output. The GPIOC clock was enabled during init.
	let gpioc = unsafe { &*pac::GPIOC::ptr() };
	gpioc.crh.modify(|r, w| unsafe { w.bits((r.bits() & !(0xF << 20)) | (0x2 << 20)) });
	let led = |on: bool| {
		let bit = if on { 1 << (13 + 16) } else { 1 << 13 };
		gpioc.bsrr.write(|w| unsafe { w.bits(bit) });
	};

	for _ in 0..3 {
		let blink_thrice = |delay: u32| {
			for _ in 0..3 {
				led(true);
				cortex_m::asm::delay(5000000*delay);
				led(false);
				cortex_m::asm::delay(10000000);
			}
			cortex_m::asm::delay(10000000);
		};
		blink_thrice(1);
		blink_thrice(4);
		blink_thrice(1);
		cortex_m::asm::delay(10000000);
	}

	cortex_m::peripheral::SCB::sys_reset();
}
