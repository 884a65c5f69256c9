//! N64 host commands and accessory handling.
//!
//! Accessory reads and writes carry a checksummed 16-bit address and are
//! validated with the data CRC8 from [crate::crc8]. The detection sequence
//! follows libdragon's probing order: reset the port, try to overwrite the
//! Controller Pak label, then walk the probe values of the remaining
//! accessory types.

use crate::bus::{Bus, TransferCallback, UserData};
use crate::{Error, commands, crc8, n64};

/// Read the input state of an N64 controller.
pub fn read(
    bus: &mut dyn Bus,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    bus.command_buffer_mut()[0] = commands::N64_READ;
    bus.transfer(commands::N64_READ_TX, commands::N64_READ_RX, done, user_data)
}

/// Write 32 bytes to a controller's accessory port.
///
/// `addr` must be 32-byte aligned; its checksum is filled in automatically.
/// The 1-byte reply carries the CRC8 of the written data.
pub fn accessory_write(
    bus: &mut dyn Bus,
    addr: u16,
    data: &[u8; 32],
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    let with_checksum = crc8::address_with_checksum(addr);
    let command = bus.command_buffer_mut();
    command[0] = commands::N64_ACCESSORY_WRITE;
    command[1] = (with_checksum >> 8) as u8;
    command[2] = with_checksum as u8;
    command[3..35].copy_from_slice(data);

    bus.transfer(
        commands::N64_ACCESSORY_WRITE_TX,
        commands::N64_ACCESSORY_WRITE_RX,
        done,
        user_data,
    )
}

/// Read 32 bytes from a controller's accessory port.
///
/// `addr` must be 32-byte aligned; its checksum is filled in automatically.
/// The 33-byte reply carries the data followed by its CRC8.
pub fn accessory_read(
    bus: &mut dyn Bus,
    addr: u16,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    let with_checksum = crc8::address_with_checksum(addr);
    let command = bus.command_buffer_mut();
    command[0] = commands::N64_ACCESSORY_READ;
    command[1] = (with_checksum >> 8) as u8;
    command[2] = with_checksum as u8;

    bus.transfer(
        commands::N64_ACCESSORY_READ_TX,
        commands::N64_ACCESSORY_READ_RX,
        done,
        user_data,
    )
}

/// Start the rumble motor of a connected Rumble Pak.
pub fn motor_start(bus: &mut dyn Bus) -> Result<(), Error> {
    accessory_write(bus, n64::ACCESSORY_ADDR_MOTOR, &[0x01; 32], None, UserData::NONE)
}

/// Stop the rumble motor of a connected Rumble Pak.
pub fn motor_stop(bus: &mut dyn Bus) -> Result<(), Error> {
    accessory_write(bus, n64::ACCESSORY_ADDR_MOTOR, &[0x00; 32], None, UserData::NONE)
}

//==================================================================================================
// Accessory detection
//==================================================================================================

/// Accessory types distinguishable through the controller port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessoryType {
    /// No accessory connected.
    None,
    /// Accessory type could not be determined.
    Unknown,
    ControllerPak,
    RumblePak,
    TransferPak,
    BioSensor,
    SnapStation,
}

/// Detection completion callback, invoked from interrupt context.
pub type DetectCallback = fn(accessory: AccessoryType, user_data: UserData);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectStep {
    Init,
    ControllerPakReset,
    LabelBackup,
    LabelOverwrite,
    LabelTest,
    LabelRestore,
    RumblePakProbeWrite,
    RumblePakProbeRead,
    TransferPakProbeWrite,
    TransferPakProbeRead,
    TransferPakTurnOff,
    SnapStationProbeWrite,
    SnapStationProbeRead,
}

/// State of one accessory detection sequence.
///
/// The caller owns the state, so controllers on separate buses can be probed
/// concurrently. It must stay alive until the detection callback fires,
/// which is why [accessory_detect] borrows it for `'static`.
pub struct DetectionState {
    step: DetectStep,
    response: [u8; commands::N64_ACCESSORY_READ_RX as usize],
    write_buf: [u8; 32],
    label_backup: [u8; 32],
    callback: Option<DetectCallback>,
    user_data: UserData,
}

impl DetectionState {
    pub const fn new() -> Self {
        DetectionState {
            step: DetectStep::Init,
            response: [0; commands::N64_ACCESSORY_READ_RX as usize],
            write_buf: [0; 32],
            label_backup: [0; 32],
            callback: None,
            user_data: UserData::NONE,
        }
    }
}

impl Default for DetectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Probe the accessory port of the controller on `bus`.
///
/// Chains accessory writes and reads through the transfer completion
/// callback and validates each one with the data CRC8: a matching CRC
/// continues the sequence, the complemented CRC reports
/// [AccessoryType::None], anything else reports [AccessoryType::Unknown].
/// `callback` fires exactly once with the result.
pub fn accessory_detect(
    bus: &mut dyn Bus,
    state: &'static mut DetectionState,
    callback: DetectCallback,
    user_data: UserData,
) -> Result<(), Error> {
    state.step = DetectStep::Init;
    state.callback = Some(callback);
    state.user_data = user_data;
    state.write_buf = [n64::PROBE_RESET; 32];

    let data = state.write_buf;
    let ctx = UserData(core::ptr::from_mut(state).cast());
    accessory_write(bus, n64::ACCESSORY_ADDR_PROBE, &data, Some(detect_step), ctx)
}

// What the state machine wants to do next.
enum Action {
    Write(u16),
    Read(u16),
    Report(AccessoryType),
}

fn validate_write(state: &DetectionState) -> Result<(), AccessoryType> {
    let expected = crc8::crc8(&state.write_buf);
    if state.response[0] == expected ^ 0xFF {
        return Err(AccessoryType::None);
    }
    if state.response[0] != expected {
        return Err(AccessoryType::Unknown);
    }
    Ok(())
}

fn validate_read(state: &DetectionState) -> Result<(), AccessoryType> {
    let expected = crc8::crc8(&state.response[..32]);
    if state.response[32] == expected ^ 0xFF {
        return Err(AccessoryType::None);
    }
    if state.response[32] != expected {
        return Err(AccessoryType::Unknown);
    }
    Ok(())
}

fn advance(state: &mut DetectionState) -> Action {
    match state.step {
        DetectStep::Init => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            // reset the Controller Pak by writing all zeros to the probe area
            state.step = DetectStep::ControllerPakReset;
            state.write_buf = [0x00; 32];
            Action::Write(n64::ACCESSORY_ADDR_PROBE)
        }
        DetectStep::ControllerPakReset => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            state.step = DetectStep::LabelBackup;
            Action::Read(n64::ACCESSORY_ADDR_LABEL)
        }
        DetectStep::LabelBackup => {
            if let Err(kind) = validate_read(state) {
                return Action::Report(kind);
            }
            state.label_backup.copy_from_slice(&state.response[..32]);

            // overwrite the label area; only a Controller Pak has memory
            // there that will hold the new bytes
            state.step = DetectStep::LabelOverwrite;
            for (i, byte) in state.write_buf.iter_mut().enumerate() {
                *byte = i as u8;
            }
            Action::Write(n64::ACCESSORY_ADDR_LABEL)
        }
        DetectStep::LabelOverwrite => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            state.step = DetectStep::LabelTest;
            Action::Read(n64::ACCESSORY_ADDR_LABEL)
        }
        DetectStep::LabelTest => {
            if let Err(kind) = validate_read(state) {
                return Action::Report(kind);
            }
            if state.response[..32] == state.write_buf {
                state.step = DetectStep::LabelRestore;
                state.write_buf = state.label_backup;
                Action::Write(n64::ACCESSORY_ADDR_LABEL)
            } else {
                state.step = DetectStep::RumblePakProbeWrite;
                state.write_buf = [n64::PROBE_RUMBLE_PAK; 32];
                Action::Write(n64::ACCESSORY_ADDR_PROBE)
            }
        }
        DetectStep::LabelRestore => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            Action::Report(AccessoryType::ControllerPak)
        }
        DetectStep::RumblePakProbeWrite => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            state.step = DetectStep::RumblePakProbeRead;
            Action::Read(n64::ACCESSORY_ADDR_PROBE)
        }
        DetectStep::RumblePakProbeRead => {
            if let Err(kind) = validate_read(state) {
                return Action::Report(kind);
            }
            match state.response[0] {
                n64::PROBE_RUMBLE_PAK => Action::Report(AccessoryType::RumblePak),
                n64::PROBE_BIO_SENSOR => Action::Report(AccessoryType::BioSensor),
                _ => {
                    state.step = DetectStep::TransferPakProbeWrite;
                    state.write_buf = [n64::PROBE_TRANSFER_PAK; 32];
                    Action::Write(n64::ACCESSORY_ADDR_PROBE)
                }
            }
        }
        DetectStep::TransferPakProbeWrite => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            state.step = DetectStep::TransferPakProbeRead;
            Action::Read(n64::ACCESSORY_ADDR_PROBE)
        }
        DetectStep::TransferPakProbeRead => {
            if let Err(kind) = validate_read(state) {
                return Action::Report(kind);
            }
            if state.response[0] == n64::PROBE_TRANSFER_PAK {
                // power the Transfer Pak back off before reporting it
                state.step = DetectStep::TransferPakTurnOff;
                state.write_buf = [n64::PROBE_RESET; 32];
                Action::Write(n64::ACCESSORY_ADDR_PROBE)
            } else {
                state.step = DetectStep::SnapStationProbeWrite;
                state.write_buf = [n64::PROBE_SNAP_STATION; 32];
                Action::Write(n64::ACCESSORY_ADDR_PROBE)
            }
        }
        DetectStep::TransferPakTurnOff => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            Action::Report(AccessoryType::TransferPak)
        }
        DetectStep::SnapStationProbeWrite => {
            if let Err(kind) = validate_write(state) {
                return Action::Report(kind);
            }
            state.step = DetectStep::SnapStationProbeRead;
            Action::Read(n64::ACCESSORY_ADDR_PROBE)
        }
        DetectStep::SnapStationProbeRead => {
            if let Err(kind) = validate_read(state) {
                return Action::Report(kind);
            }
            if state.response[0] == n64::PROBE_SNAP_STATION {
                Action::Report(AccessoryType::SnapStation)
            } else {
                // out of detection techniques
                Action::Report(AccessoryType::Unknown)
            }
        }
    }
}

fn detect_step(bus: &mut dyn Bus, result: Result<u8, Error>, user_data: UserData) {
    // SAFETY: `user_data` carries the unique `&'static mut DetectionState`
    // handed to `accessory_detect`. Nothing else can reach it while the
    // sequence runs, and the borrow ends before the chained transfer below
    // re-enters this function.
    let state = unsafe { &mut *user_data.0.cast::<DetectionState>() };

    let Some(callback) = state.callback else {
        return;
    };
    let finish_user_data = state.user_data;

    if result.is_err() {
        callback(AccessoryType::Unknown, finish_user_data);
        return;
    }

    let reply = bus.response();
    let n = reply.len().min(state.response.len());
    state.response[..n].copy_from_slice(&reply[..n]);

    let action = advance(state);
    let data = state.write_buf;

    match action {
        Action::Report(kind) => callback(kind, finish_user_data),
        Action::Write(addr) => {
            if accessory_write(bus, addr, &data, Some(detect_step), user_data).is_err() {
                callback(AccessoryType::Unknown, finish_user_data);
            }
        }
        Action::Read(addr) => {
            if accessory_read(bus, addr, Some(detect_step), user_data).is_err() {
                callback(AccessoryType::Unknown, finish_user_data);
            }
        }
    }
}
