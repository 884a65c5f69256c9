//! Bus engine state machine driven by a scripted mock driver.

mod common;

use common::{Spy, on_done};
use fugit::{HertzU32, MicrosDurationU32};
use joybus_hal::bus::{BusEvent, Config, Driver};
use joybus_hal::gamecube::{self, GcStatus};
use joybus_hal::target::GcController;
use joybus_hal::{Bus, BusEngine, Error, Instant, Role, host};

const CAPTURE_CLOCK_HZ: u32 = 8_000_000;
// capture ticks per bit at the two chip rates
const HOST_BIT_PERIOD: u16 = (CAPTURE_CLOCK_HZ / 200_000) as u16;
const TARGET_BIT_PERIOD: u16 = (CAPTURE_CLOCK_HZ / 250_000) as u16;

//==================================================================================================
// Mock driver
//==================================================================================================

#[derive(Default)]
struct MockDriver {
    enabled: bool,
    role: Option<(Role, HertzU32)>,
    tx: Option<(Vec<u8>, u16)>,
    rx_armed: Option<bool>,
    deadline: Option<MicrosDurationU32>,
    idle_waits: usize,
    now_us: u64,
}

impl Driver for MockDriver {
    fn enable(&mut self) -> Result<(), Error> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) {
        self.enabled = false;
    }

    fn capture_clock(&self) -> HertzU32 {
        HertzU32::from_raw(CAPTURE_CLOCK_HZ)
    }

    fn now(&mut self) -> Instant {
        Instant::from_ticks(self.now_us)
    }

    fn set_role(&mut self, role: Role, bit_rate: HertzU32) {
        self.role = Some((role, bit_rate));
    }

    fn tx_begin(&mut self, chips: &[u8], data_bits: u16) {
        self.tx = Some((chips.to_vec(), data_bits));
    }

    fn rx_arm(&mut self, first_byte: bool) {
        self.rx_armed = Some(first_byte);
    }

    fn rx_stop(&mut self) {
        self.rx_armed = None;
    }

    fn deadline_arm(&mut self, timeout: MicrosDurationU32) {
        self.deadline = Some(timeout);
    }

    fn deadline_cancel(&mut self) {
        self.deadline = None;
    }

    fn await_line_idle(&mut self, _threshold: MicrosDurationU32) {
        self.idle_waits += 1;
    }
}

//==================================================================================================
// Wire helpers
//==================================================================================================

// Lay a byte stream plus one stop pulse out as capture windows: 18
// timestamps for the first byte, 16 for each byte after.
fn synthesize_windows(bytes: &[u8], bit_period: u16) -> Vec<Vec<u16>> {
    let chip = bit_period / 4;
    let mut edges = Vec::new();
    let mut t = 500u16;
    for &byte in bytes {
        for bit in (0..8).rev() {
            let low = if byte & (1 << bit) != 0 { chip } else { 3 * chip };
            edges.push(t);
            edges.push(t.wrapping_add(low));
            t = t.wrapping_add(bit_period);
        }
    }
    edges.push(t);
    edges.push(t.wrapping_add(chip));

    let mut windows = Vec::new();
    let (first, mut rest) = edges.split_at(18);
    windows.push(first.to_vec());
    while !rest.is_empty() {
        let (window, tail) = rest.split_at(16);
        windows.push(window.to_vec());
        rest = tail;
    }
    windows
}

// Undo the line coding of a transmitted chip stream.
fn decode_chips(chips: &[u8]) -> Vec<u8> {
    chips
        .chunks(4)
        .map(|group| {
            let mut byte = 0u8;
            for (i, &chip) in group.iter().enumerate() {
                byte |= u8::from(chip >> 4 == 0x7) << (7 - 2 * i);
                byte |= u8::from(chip & 0x0F == 0x7) << (6 - 2 * i);
            }
            byte
        })
        .collect()
}

fn host_engine() -> BusEngine<MockDriver, GcController> {
    let mut bus = BusEngine::new(MockDriver::default(), Config::default());
    bus.enable().unwrap();
    bus
}

//==================================================================================================
// Host mode
//==================================================================================================

#[test]
fn transfer_rejected_while_disabled() {
    let mut bus: BusEngine<MockDriver, GcController> =
        BusEngine::new(MockDriver::default(), Config::default());
    let mut spy = Spy::new();

    let result = host::identify(&mut bus, Some(on_done), spy.user_data());
    assert_eq!(result, Err(Error::Disabled));
    assert_eq!(spy.calls, 0);
}

#[test]
fn transfer_rejected_while_busy() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    let second = host::identify(&mut bus, Some(on_done), spy.user_data());

    assert_eq!(second, Err(Error::Busy));
    assert_eq!(spy.calls, 0);
}

#[test]
fn host_transfer_round_trip_on_the_wire() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();

    {
        let driver = bus.driver_mut();
        assert_eq!(driver.role, Some((Role::Host, joybus_hal::FREQ_CONSOLE)));
        // capture is pre-armed before the command finishes clocking out
        assert_eq!(driver.rx_armed, Some(true));
        let (chips, bits) = driver.tx.take().unwrap();
        assert_eq!(bits, 8);
        assert_eq!(decode_chips(&chips), [0x00]);
    }

    bus.on_event(BusEvent::TxComplete);
    assert_eq!(
        bus.driver_mut().deadline,
        Some(MicrosDurationU32::from_ticks(100))
    );

    for window in synthesize_windows(&[0x09, 0x00, 0x00], TARGET_BIT_PERIOD) {
        bus.on_event(BusEvent::RxWindow(&window));
    }

    assert_eq!(spy.result, Some(Ok(3)));
    assert_eq!(spy.response, [0x09, 0x00, 0x00]);
    assert_eq!(spy.calls, 1);
}

#[test]
fn per_byte_deadline_shortens_after_first_reply_byte() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    bus.on_event(BusEvent::TxComplete);

    let windows = synthesize_windows(&[0x09, 0x00, 0x00], TARGET_BIT_PERIOD);
    bus.on_event(BusEvent::RxWindow(&windows[0]));

    let driver = bus.driver_mut();
    assert_eq!(driver.deadline, Some(MicrosDurationU32::from_ticks(60)));
    // follow-up windows are 16-edge captures
    assert_eq!(driver.rx_armed, Some(false));
}

#[test]
fn completion_fires_exactly_once() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    bus.on_event(BusEvent::TxComplete);
    for window in synthesize_windows(&[0x09, 0x00, 0x00], TARGET_BIT_PERIOD) {
        bus.on_event(BusEvent::RxWindow(&window));
    }

    // stray events after completion must not re-fire the callback
    bus.on_event(BusEvent::TxComplete);
    bus.on_event(BusEvent::Deadline);

    assert_eq!(spy.calls, 1);
}

#[test]
fn reply_timeout_reports_error_and_recovers() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    bus.on_event(BusEvent::TxComplete);
    bus.on_event(BusEvent::Deadline);

    assert_eq!(spy.result, Some(Err(Error::Timeout)));
    assert_eq!(spy.calls, 1);
    assert_eq!(bus.driver_mut().rx_armed, None);
    bus.driver_mut().tx = None;

    // the bus is idle again; pacing delays the next transfer by 20 us
    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    assert_eq!(
        bus.driver_mut().deadline,
        Some(MicrosDurationU32::from_ticks(20))
    );
    bus.on_event(BusEvent::Deadline);
    assert!(bus.driver_mut().tx.is_some());
}

#[test]
fn write_only_transfer_completes_after_tx() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    bus.command_buffer_mut()[0] = 0x1D;
    bus.transfer(1, 0, Some(on_done), spy.user_data()).unwrap();

    // no reply expected, so capture is never armed
    assert_eq!(bus.driver_mut().rx_armed, None);

    bus.on_event(BusEvent::TxComplete);
    assert_eq!(spy.result, Some(Ok(0)));
    assert!(spy.response.is_empty());
}

#[test]
fn inter_transfer_delay_is_enforced() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    bus.command_buffer_mut()[0] = 0x1D;
    bus.transfer(1, 0, Some(on_done), spy.user_data()).unwrap();
    bus.on_event(BusEvent::TxComplete);
    bus.driver_mut().tx = None;

    // 5 us later: the next transfer must wait out the remaining 15 us
    bus.driver_mut().now_us = 5;
    bus.command_buffer_mut()[0] = 0x1D;
    bus.transfer(1, 0, Some(on_done), spy.user_data()).unwrap();

    assert!(bus.driver_mut().tx.is_none());
    assert_eq!(
        bus.driver_mut().deadline,
        Some(MicrosDurationU32::from_ticks(15))
    );

    bus.on_event(BusEvent::Deadline);
    assert!(bus.driver_mut().tx.is_some());

    // well past the window, the transfer starts immediately
    bus.on_event(BusEvent::TxComplete);
    bus.driver_mut().tx = None;
    bus.driver_mut().now_us = 100;
    bus.command_buffer_mut()[0] = 0x1D;
    bus.transfer(1, 0, Some(on_done), spy.user_data()).unwrap();
    assert!(bus.driver_mut().tx.is_some());
}

#[test]
fn disable_drops_pending_callback() {
    let mut bus = host_engine();
    let mut spy = Spy::new();

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    bus.disable().unwrap();

    assert_eq!(spy.calls, 0);
    assert!(!bus.driver_mut().enabled);
}

//==================================================================================================
// Target mode
//==================================================================================================

fn target_engine() -> BusEngine<MockDriver, GcController> {
    let mut bus = host_engine();
    bus.target_register(GcController::new(gamecube::GAMECUBE_CONTROLLER))
        .unwrap();
    bus
}

#[test]
fn target_register_requires_enabled_bus() {
    let mut bus: BusEngine<MockDriver, GcController> =
        BusEngine::new(MockDriver::default(), Config::default());

    let result = bus.target_register(GcController::new(gamecube::GAMECUBE_CONTROLLER));
    assert!(matches!(result, Err(Error::Disabled)));
}

#[test]
fn target_register_switches_to_reception() {
    let mut bus = target_engine();

    let driver = bus.driver_mut();
    assert_eq!(driver.role, Some((Role::Target, joybus_hal::FREQ_GCC)));
    assert_eq!(driver.rx_armed, Some(true));
    assert_eq!(driver.idle_waits, 1);
}

#[test]
fn target_answers_identify() {
    let mut bus = target_engine();

    for window in synthesize_windows(&[0x00], HOST_BIT_PERIOD) {
        bus.on_event(BusEvent::RxWindow(&window));
    }

    let (chips, bits) = bus.driver_mut().tx.take().unwrap();
    assert_eq!(bits, 24);
    assert_eq!(decode_chips(&chips), [0x09, 0x00, 0x00]);

    // after the reply clocks out, reception resumes
    bus.on_event(BusEvent::TxComplete);
    assert_eq!(bus.driver_mut().rx_armed, Some(true));
}

#[test]
fn target_answers_read_and_records_poll_state() {
    let mut bus = target_engine();

    let windows = synthesize_windows(&[0x40, 0x03, 0x01], HOST_BIT_PERIOD);

    bus.on_event(BusEvent::RxWindow(&windows[0]));
    // opcode alone does not determine the reply yet
    assert!(bus.driver_mut().tx.is_none());
    assert_eq!(
        bus.driver_mut().deadline,
        Some(MicrosDurationU32::from_ticks(60))
    );

    bus.on_event(BusEvent::RxWindow(&windows[1]));
    // the reply is staged once the analog mode is known, but nothing is
    // clocked out before the command completes
    assert!(bus.driver_mut().tx.is_none());

    bus.on_event(BusEvent::RxWindow(&windows[2]));
    let (chips, _) = bus.driver_mut().tx.take().unwrap();
    assert_eq!(
        decode_chips(&chips),
        [0x00, 0x00, 0x80, 0x80, 0x80, 0x80, 0x00, 0x00]
    );

    let status = GcStatus::new_with_raw_value(bus.target_mut().unwrap().id().status());
    assert_eq!(status.analog_mode().value(), 3);
    assert_eq!(status.motor_state().value(), 1);
}

#[test]
fn target_stays_silent_on_unsupported_opcode() {
    let mut bus = target_engine();
    let idle_waits = bus.driver_mut().idle_waits;

    for window in synthesize_windows(&[0x05], HOST_BIT_PERIOD) {
        bus.on_event(BusEvent::RxWindow(&window));
    }

    let driver = bus.driver_mut();
    assert!(driver.tx.is_none());
    // the engine resynchronized on an idle line and is receiving again
    assert_eq!(driver.rx_armed, Some(true));
    assert_eq!(driver.idle_waits, idle_waits + 1);
}

#[test]
fn target_recovers_from_stale_command() {
    let mut bus = target_engine();

    let windows = synthesize_windows(&[0x40, 0x03, 0x01], HOST_BIT_PERIOD);
    bus.on_event(BusEvent::RxWindow(&windows[0]));
    bus.on_event(BusEvent::Deadline);

    let driver = bus.driver_mut();
    assert!(driver.tx.is_none());
    assert_eq!(driver.rx_armed, Some(true));

    // a fresh command decodes cleanly after the reset
    for window in synthesize_windows(&[0x00], HOST_BIT_PERIOD) {
        bus.on_event(BusEvent::RxWindow(&window));
    }
    let (chips, _) = bus.driver_mut().tx.take().unwrap();
    assert_eq!(decode_chips(&chips), [0x09, 0x00, 0x00]);
}

#[test]
fn wavebird_config_replies_at_the_slower_chip_rate() {
    let mut bus: BusEngine<MockDriver, GcController> = BusEngine::new(
        MockDriver::default(),
        Config::default().target_freq(joybus_hal::FREQ_WAVEBIRD),
    );
    bus.enable().unwrap();
    bus.target_register(GcController::new(gamecube::WAVEBIRD_RECEIVER))
        .unwrap();

    assert_eq!(
        bus.driver_mut().role,
        Some((Role::Target, joybus_hal::FREQ_WAVEBIRD))
    );
}

#[test]
fn target_unregister_returns_to_host_mode() {
    let mut bus = target_engine();

    let controller = bus.target_unregister();
    assert!(controller.is_some());
    assert_eq!(
        bus.driver_mut().role,
        Some((Role::Host, joybus_hal::FREQ_CONSOLE))
    );

    // the bus accepts host transfers again
    let mut spy = Spy::new();
    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    assert!(bus.driver_mut().tx.is_some());
}
