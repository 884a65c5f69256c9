//! N64 controller served over the loopback bus.

mod common;

use common::{Spy, on_done};
use joybus_hal::n64::{N64Buttons, N64Input};
use joybus_hal::target::N64Controller;
use joybus_hal::{Bus, Error, Loopback, commands, host};

fn setup() -> Loopback<N64Controller> {
    let mut bus = Loopback::new();
    bus.enable().unwrap();
    bus.target_register(N64Controller::new(commands::ID_N64_CONTROLLER))
        .unwrap();
    bus
}

#[test]
fn identify_reports_standard_controller() {
    let mut bus = setup();
    let mut spy = Spy::new();

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();

    assert_eq!(spy.result, Some(Ok(3)));
    assert_eq!(spy.response, [0x05, 0x00, 0x00]);
}

#[test]
fn identify_carries_accessory_status() {
    let mut bus = setup();
    let mut spy = Spy::new();

    bus.target_mut()
        .unwrap()
        .id_mut()
        .set_status_flags(commands::ID_N64_ACCESSORY_PRESENT);

    host::identify(&mut bus, Some(on_done), spy.user_data()).unwrap();
    assert_eq!(spy.response, [0x05, 0x00, 0x01]);
}

#[test]
fn read_reports_input_state() {
    let mut bus = setup();
    let mut spy = Spy::new();

    bus.target_mut().unwrap().set_input(N64Input {
        buttons: N64Buttons::new_with_raw_value(0)
            .with_a(true)
            .with_z(true),
        stick_x: 0x14,
        stick_y: 0xF3,
    });

    host::n64::read(&mut bus, Some(on_done), spy.user_data()).unwrap();

    assert_eq!(spy.result, Some(Ok(4)));
    assert_eq!(spy.response, [0xA0, 0x00, 0x14, 0xF3]);
}

#[test]
fn reset_fires_callback() {
    fn on_reset(controller: &mut N64Controller) {
        controller.set_input(N64Input::default());
    }

    let mut bus = setup();
    let mut spy = Spy::new();

    let controller = bus.target_mut().unwrap();
    controller.set_reset_callback(on_reset);
    controller.set_input(N64Input {
        stick_x: 0x55,
        ..N64Input::default()
    });

    host::reset(&mut bus, Some(on_done), spy.user_data()).unwrap();

    assert_eq!(spy.response, [0x05, 0x00, 0x00]);
    assert_eq!(bus.target_mut().unwrap().input().stick_x, 0x00);
}

#[test]
fn gamecube_commands_are_not_supported() {
    let mut bus = setup();
    let mut spy = Spy::new();

    let command = bus.command_buffer_mut();
    command[0] = commands::GCN_READ;
    command[1] = 0x03;
    command[2] = 0x00;
    bus.transfer(
        commands::GCN_READ_TX,
        commands::GCN_READ_RX,
        Some(on_done),
        spy.user_data(),
    )
    .unwrap();

    assert_eq!(spy.result, Some(Err(Error::NotSupported)));
}
