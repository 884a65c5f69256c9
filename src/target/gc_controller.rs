//! GameCube controller target.
//!
//! Serves the command set of an OEM GameCube controller or WaveBird
//! receiver: reset, identify, the three input reads, calibration and the
//! wireless pairing commands.

use arbitrary_int::{u2, u3, u10};

use crate::Error;
use crate::commands::{self, DeviceId};
use crate::gamecube::{self, AnalogMode, GcInput, GcStatus, MotorState, pack_input};
use crate::target::{Responder, Target};

/// Callback for reset commands, invoked from interrupt context.
pub type ResetCallback = fn(&mut GcController);

/// Callback for motor state changes, invoked from interrupt context.
pub type MotorCallback = fn(&mut GcController, MotorState);

/// A GameCube controller (or WaveBird receiver) answering host commands.
pub struct GcController {
    id: DeviceId,
    origin: GcInput,
    input: GcInput,
    input_valid: bool,
    motor: MotorState,
    on_reset: Option<ResetCallback>,
    on_motor: Option<MotorCallback>,
}

impl GcController {
    /// Create a controller with the given identify type flags (e.g.
    /// [gamecube::GAMECUBE_CONTROLLER] or [gamecube::WAVEBIRD_RECEIVER]), a
    /// centered origin and a valid input state mirroring it.
    pub fn new(device_type: u16) -> Self {
        let origin = GcInput::neutral();
        GcController {
            id: DeviceId::new(device_type),
            origin,
            input: origin,
            input_valid: true,
            motor: MotorState::Stop,
            on_reset: None,
            on_motor: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    #[inline]
    pub fn origin(&self) -> &GcInput {
        &self.origin
    }

    #[inline]
    pub fn input(&self) -> &GcInput {
        &self.input
    }

    /// Update the live input state.
    #[inline]
    pub fn set_input(&mut self, input: GcInput) {
        self.input = input;
    }

    /// Mark the input state as valid. While invalid, polls are answered
    /// with the origin instead.
    #[inline]
    pub fn set_input_valid(&mut self, valid: bool) {
        self.input_valid = valid;
    }

    pub fn set_reset_callback(&mut self, callback: ResetCallback) {
        self.on_reset = Some(callback);
    }

    pub fn set_motor_callback(&mut self, callback: MotorCallback) {
        self.on_motor = Some(callback);
    }

    /// Whether this device reports itself as wireless.
    #[inline]
    pub fn is_wireless(&self) -> bool {
        self.id.device_type() & gamecube::TYPE_WIRELESS != 0
    }

    /// Whether the wireless ID has been fixed by the console.
    #[inline]
    pub fn wireless_id_fixed(&self) -> bool {
        self.id.device_type() & gamecube::TYPE_WIRELESS_ID_FIXED != 0
    }

    #[inline]
    pub fn wireless_id(&self) -> u10 {
        self.id.wireless_id()
    }

    /// Adopt the wireless ID of a received packet.
    ///
    /// Wireless IDs are not globally unique, but distinct enough to bind a
    /// controller to a port after reception. No-op once the console has
    /// fixed the ID.
    pub fn set_wireless_id(&mut self, wireless_id: u10) {
        if self.wireless_id_fixed() {
            return;
        }

        self.id.set_wireless_id(wireless_id);
        self.id
            .set_type_flags(gamecube::TYPE_STANDARD | gamecube::TYPE_WIRELESS_RECEIVED);
    }

    /// Update the origin, raising the need-origin flag when any of the six
    /// analog values moved so the host knows to re-read it.
    pub fn set_origin(&mut self, new_origin: &GcInput) {
        if self.origin.analog_bytes() != new_origin.analog_bytes() {
            self.origin.stick_x = new_origin.stick_x;
            self.origin.stick_y = new_origin.stick_y;
            self.origin.substick_x = new_origin.substick_x;
            self.origin.substick_y = new_origin.substick_y;
            self.origin.trigger_left = new_origin.trigger_left;
            self.origin.trigger_right = new_origin.trigger_right;
            self.set_need_origin(true);
        }

        if self.is_wireless() {
            self.id.set_type_flags(gamecube::TYPE_WIRELESS_ORIGIN);
        }
    }

    fn set_need_origin(&mut self, need_origin: bool) {
        self.input.buttons = self.input.buttons.with_need_origin(need_origin);

        // wireless devices carry origin state in the type flags instead
        if !self.is_wireless() {
            self.modify_status(|status| status.with_need_origin(need_origin));
        }
    }

    fn modify_status(&mut self, f: impl FnOnce(GcStatus) -> GcStatus) {
        self.id
            .set_status(f(GcStatus::new_with_raw_value(self.id.status())).raw_value());
    }

    fn set_motor(&mut self, motor: MotorState) {
        if motor != self.motor {
            self.motor = motor;
            if let Some(on_motor) = self.on_motor {
                on_motor(self, motor);
            }
        }
    }

    // Record the analog mode and motor state of a poll in the status byte,
    // and flag the input as origin-referenced.
    fn record_poll_flags(&mut self, mode: u8, motor: u8) {
        if self.is_wireless() {
            return;
        }

        self.input.buttons = self.input.buttons.with_use_origin(true);
        self.modify_status(|status| {
            status
                .with_motor_state(u2::new(motor & 0x03))
                .with_analog_mode(u3::new(mode & 0x07))
        });
    }

    fn polled_input(&self) -> &GcInput {
        if self.input_valid { &self.input } else { &self.origin }
    }

    /// Handle "reset": reply with the ID, notify the application, stop the
    /// motor.
    fn handle_reset(&mut self, responder: &mut Responder<'_>) -> Result<u8, Error> {
        responder.send(self.id.as_bytes());

        if let Some(on_reset) = self.on_reset {
            on_reset(self);
        }
        self.set_motor(MotorState::Stop);

        Ok(0)
    }

    /// Handle "identify": reply with the 3-byte ID.
    fn handle_identify(&mut self, responder: &mut Responder<'_>) -> Result<u8, Error> {
        responder.send(self.id.as_bytes());
        Ok(0)
    }

    /// Handle "read" (`{0x40, analog_mode, motor_state}`).
    ///
    /// The reply is determined once the analog mode arrived, so it is staged
    /// after the second byte to keep latency low; the motor byte is only
    /// bookkeeping.
    fn handle_read(&mut self, command: &[u8], responder: &mut Responder<'_>) -> Result<u8, Error> {
        let bytes_read = command.len() as u8;
        if bytes_read == 2 {
            let input = self.polled_input();
            let mode = AnalogMode::from_command(command[1]);
            if mode == AnalogMode::Mode3 {
                // mode 3 is simply the leading 8 bytes of the full state
                let bytes = input.to_bytes();
                responder.send(&bytes[..usize::from(commands::GCN_READ_RX)]);
            } else {
                let mut packed = [0u8; 8];
                pack_input(&mut packed, input, mode);
                responder.send(&packed);
            }
        } else if bytes_read == commands::GCN_READ_TX {
            self.record_poll_flags(command[1], command[2]);
            self.set_motor(MotorState::from_command(command[2]));
        }

        Ok(commands::GCN_READ_TX - bytes_read)
    }

    /// Handle "read origin": reply with the 10-byte origin and clear the
    /// need-origin flag.
    fn handle_read_origin(&mut self, responder: &mut Responder<'_>) -> Result<u8, Error> {
        responder.send(&self.origin.to_bytes());
        self.set_need_origin(false);
        Ok(0)
    }

    /// Handle "calibrate" (`{0x42, 0x00, 0x00}`): adopt the current input as
    /// the origin and reply with it.
    fn handle_calibrate(
        &mut self,
        command: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<u8, Error> {
        let bytes_read = command.len() as u8;
        if bytes_read == 1 {
            self.origin = self.input;
            responder.send(&self.origin.to_bytes());
            self.set_need_origin(false);
        }

        Ok(commands::GCN_CALIBRATE_TX - bytes_read)
    }

    /// Handle "read long" (`{0x43, analog_mode, motor_state}`): reply with
    /// the full 10-byte input state. No game is known to use this command.
    fn handle_read_long(
        &mut self,
        command: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<u8, Error> {
        let bytes_read = command.len() as u8;
        if bytes_read == 2 {
            let bytes = self.polled_input().to_bytes();
            responder.send(&bytes);
        } else if bytes_read == commands::GCN_READ_LONG_TX {
            self.record_poll_flags(command[1], command[2]);
            self.set_motor(MotorState::from_command(command[2]));
        }

        Ok(commands::GCN_READ_LONG_TX - bytes_read)
    }

    /// Handle "probe device".
    ///
    /// Launch-window games probe for wireless capabilities. A receiver
    /// answers with eight zero bytes until it has received a packet from a
    /// controller, then goes silent on further probes.
    fn handle_probe_device(
        &mut self,
        command: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<u8, Error> {
        let bytes_read = command.len() as u8;
        if bytes_read == 1 {
            let device_type = self.id.device_type();
            let wireless = device_type & gamecube::TYPE_WIRELESS != 0;
            let received = device_type & gamecube::TYPE_WIRELESS_RECEIVED != 0;
            if wireless && !received {
                responder.send(&[0u8; commands::GCN_PROBE_DEVICE_RX as usize]);
            }
        }

        Ok(commands::GCN_PROBE_DEVICE_TX - bytes_read)
    }

    /// Handle "fix device" (`{0x4E, wid_h | 0x10, wid_l}`): bind this
    /// receiver to the given wireless ID and reply with the updated ID.
    fn handle_fix_device(
        &mut self,
        command: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<u8, Error> {
        let bytes_read = command.len() as u8;
        if bytes_read == commands::GCN_FIX_DEVICE_TX {
            let wireless_id =
                u10::new((u16::from(command[1] & 0xC0) << 2) | u16::from(command[2]));
            self.id.set_wireless_id(wireless_id);
            self.id.set_type_flags(
                gamecube::TYPE_STANDARD
                    | gamecube::TYPE_WIRELESS_STATE
                    | gamecube::TYPE_WIRELESS_ID_FIXED,
            );
            responder.send(self.id.as_bytes());
        }

        Ok(commands::GCN_FIX_DEVICE_TX - bytes_read)
    }
}

impl Target for GcController {
    fn byte_received(
        &mut self,
        command: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<u8, Error> {
        match command[0] {
            commands::RESET => self.handle_reset(responder),
            commands::IDENTIFY => self.handle_identify(responder),
            commands::GCN_READ => self.handle_read(command, responder),
            commands::GCN_READ_ORIGIN => self.handle_read_origin(responder),
            commands::GCN_CALIBRATE => self.handle_calibrate(command, responder),
            commands::GCN_READ_LONG => self.handle_read_long(command, responder),
            commands::GCN_PROBE_DEVICE => self.handle_probe_device(command, responder),
            commands::GCN_FIX_DEVICE => self.handle_fix_device(command, responder),
            _ => Err(Error::NotSupported),
        }
    }
}
