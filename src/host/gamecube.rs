//! GameCube host commands.

use arbitrary_int::u10;

use crate::Error;
use crate::bus::{Bus, TransferCallback, UserData};
use crate::commands;
use crate::gamecube::{AnalogMode, MotorState};

pub use crate::gamecube::unpack_input;

/// Poll a controller for its packed 8-byte input state.
pub fn read(
    bus: &mut dyn Bus,
    analog_mode: AnalogMode,
    motor_state: MotorState,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    let command = bus.command_buffer_mut();
    command[0] = commands::GCN_READ;
    command[1] = analog_mode.raw_value().value();
    command[2] = motor_state.raw_value().value();

    bus.transfer(commands::GCN_READ_TX, commands::GCN_READ_RX, done, user_data)
}

/// Read the 10-byte origin of a controller.
pub fn read_origin(
    bus: &mut dyn Bus,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    bus.command_buffer_mut()[0] = commands::GCN_READ_ORIGIN;

    bus.transfer(
        commands::GCN_READ_ORIGIN_TX,
        commands::GCN_READ_ORIGIN_RX,
        done,
        user_data,
    )
}

/// Make the controller adopt its current input state as the new origin, and
/// read that origin back.
pub fn calibrate(
    bus: &mut dyn Bus,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    let command = bus.command_buffer_mut();
    command[0] = commands::GCN_CALIBRATE;
    command[1] = 0;
    command[2] = 0;

    bus.transfer(
        commands::GCN_CALIBRATE_TX,
        commands::GCN_CALIBRATE_RX,
        done,
        user_data,
    )
}

/// Poll a controller for its full-precision 10-byte input state.
pub fn read_long(
    bus: &mut dyn Bus,
    motor_state: MotorState,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    let command = bus.command_buffer_mut();
    command[0] = commands::GCN_READ_LONG;
    // analog mode is meaningless for full precision reads
    command[1] = 0;
    command[2] = motor_state.raw_value().value();

    bus.transfer(
        commands::GCN_READ_LONG_TX,
        commands::GCN_READ_LONG_RX,
        done,
        user_data,
    )
}

/// Probe a wireless receiver that has not paired yet.
pub fn probe_device(
    bus: &mut dyn Bus,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    let command = bus.command_buffer_mut();
    command[0] = commands::GCN_PROBE_DEVICE;
    command[1] = 0;
    command[2] = 0;

    bus.transfer(
        commands::GCN_PROBE_DEVICE_TX,
        commands::GCN_PROBE_DEVICE_RX,
        done,
        user_data,
    )
}

/// Fix a wireless receiver to the controller with the given 10-bit wireless
/// ID, pairing the two.
pub fn fix_device(
    bus: &mut dyn Bus,
    wireless_id: u10,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    let wid = wireless_id.value();
    let command = bus.command_buffer_mut();
    command[0] = commands::GCN_FIX_DEVICE;
    command[1] = ((wid >> 2) & 0xC0) as u8 | 0x10;
    command[2] = wid as u8;

    bus.transfer(
        commands::GCN_FIX_DEVICE_TX,
        commands::GCN_FIX_DEVICE_RX,
        done,
        user_data,
    )
}
