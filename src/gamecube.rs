//! GameCube controller data types and analog-mode packing.

use arbitrary_int::{u2, u3};

/// Identify type flag: wireless ID has been fixed.
pub const TYPE_WIRELESS_ID_FIXED: u16 = 0x0010;
/// Identify type flag: wireless origin available.
pub const TYPE_WIRELESS_ORIGIN: u16 = 0x0020;
/// Identify type flag: standard GameCube controller.
pub const TYPE_STANDARD: u16 = 0x0100;
/// Identify type flag: wireless state available.
pub const TYPE_WIRELESS_STATE: u16 = 0x0200;
/// Identify type flag: GameCube device.
pub const TYPE_DEVICE: u16 = 0x0800;
/// Identify type flag: no rumble motor present.
pub const TYPE_NO_MOTOR: u16 = 0x2000;
/// Identify type flag: wireless receiver has received a packet.
pub const TYPE_WIRELESS_RECEIVED: u16 = 0x4000;
/// Identify type flag: controller is wireless.
pub const TYPE_WIRELESS: u16 = 0x8000;

/// Device type of a standard GameCube controller.
pub const GAMECUBE_CONTROLLER: u16 = TYPE_DEVICE | TYPE_STANDARD;

/// Device type of a WaveBird receiver.
pub const WAVEBIRD_RECEIVER: u16 = TYPE_DEVICE | TYPE_WIRELESS | TYPE_NO_MOTOR;

/// Bits of the button word that are actual buttons.
pub const BUTTON_MASK: u16 = 0x7F1F;

/// Button word of the GameCube input state.
///
/// Bits 5..7 and 15 double as origin/error flags on the wire.
#[bitbybit::bitfield(u16, default = 0x0, debug, defmt_bitfields(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct GcButtons {
    #[bit(0, rw)]
    a: bool,
    #[bit(1, rw)]
    b: bool,
    #[bit(2, rw)]
    x: bool,
    #[bit(3, rw)]
    y: bool,
    #[bit(4, rw)]
    start: bool,
    #[bit(5, rw)]
    need_origin: bool,
    #[bit(6, rw)]
    error_latch: bool,
    #[bit(7, rw)]
    error: bool,
    #[bit(8, rw)]
    left: bool,
    #[bit(9, rw)]
    right: bool,
    #[bit(10, rw)]
    down: bool,
    #[bit(11, rw)]
    up: bool,
    #[bit(12, rw)]
    z: bool,
    #[bit(13, rw)]
    r: bool,
    #[bit(14, rw)]
    l: bool,
    #[bit(15, rw)]
    use_origin: bool,
}

/// Status byte of a non-wireless controller's identify payload.
#[bitbybit::bitfield(u8, default = 0x0, debug, defmt_bitfields(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct GcStatus {
    #[bit(7, rw)]
    error: bool,
    #[bit(6, rw)]
    error_latched: bool,
    #[bit(5, rw)]
    need_origin: bool,
    #[bits(3..=4, rw)]
    motor_state: u2,
    #[bits(0..=2, rw)]
    analog_mode: u3,
}

/// Analog packing modes for "read" replies.
///
/// The full input state is 10 bytes; read replies are 8. Each mode decides
/// which analog pairs keep full precision, get truncated to their high
/// nibble, or are dropped. All production games except Luigi's Mansion use
/// mode 3. Analog A/B only ever existed on pre-production controllers.
#[bitbybit::bitenum(u3, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AnalogMode {
    /// Substick full precision, triggers and analog A/B truncated.
    Mode0 = 0,
    /// Triggers full precision, substick and analog A/B truncated.
    Mode1 = 1,
    /// Analog A/B full precision, substick and triggers truncated.
    Mode2 = 2,
    /// Substick and triggers full precision, analog A/B omitted.
    Mode3 = 3,
    /// Substick and analog A/B full precision, triggers omitted.
    Mode4 = 4,
}

impl AnalogMode {
    /// Decode the mode byte of a read command. Unknown values pack like
    /// mode 0.
    pub fn from_command(raw: u8) -> Self {
        match raw & 0x07 {
            1 => AnalogMode::Mode1,
            2 => AnalogMode::Mode2,
            3 => AnalogMode::Mode3,
            4 => AnalogMode::Mode4,
            _ => AnalogMode::Mode0,
        }
    }
}

/// Rumble motor states carried in read commands.
#[bitbybit::bitenum(u2, exhaustive = false)]
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorState {
    Stop = 0,
    Rumble = 1,
    StopHard = 2,
}

impl MotorState {
    /// Decode the motor byte of a read command. Unknown values stop the
    /// motor.
    pub fn from_command(raw: u8) -> Self {
        match raw & 0x03 {
            1 => MotorState::Rumble,
            2 => MotorState::StopHard,
            _ => MotorState::Stop,
        }
    }
}

/// Full-precision GameCube controller input state, 10 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GcInput {
    pub buttons: GcButtons,
    pub stick_x: u8,
    pub stick_y: u8,
    pub substick_x: u8,
    pub substick_y: u8,
    pub trigger_left: u8,
    pub trigger_right: u8,
    pub analog_a: u8,
    pub analog_b: u8,
}

impl GcInput {
    /// Neutral input state: no buttons, centered sticks, released triggers.
    pub const fn neutral() -> Self {
        GcInput {
            buttons: GcButtons::new_with_raw_value(0),
            stick_x: 0x80,
            stick_y: 0x80,
            substick_x: 0x80,
            substick_y: 0x80,
            trigger_left: 0,
            trigger_right: 0,
            analog_a: 0,
            analog_b: 0,
        }
    }

    /// The 10-byte wire representation, button word little endian.
    pub fn to_bytes(&self) -> [u8; 10] {
        let buttons = self.buttons.raw_value().to_le_bytes();
        [
            buttons[0],
            buttons[1],
            self.stick_x,
            self.stick_y,
            self.substick_x,
            self.substick_y,
            self.trigger_left,
            self.trigger_right,
            self.analog_a,
            self.analog_b,
        ]
    }

    pub fn from_bytes(bytes: &[u8; 10]) -> Self {
        GcInput {
            buttons: GcButtons::new_with_raw_value(u16::from_le_bytes([bytes[0], bytes[1]])),
            stick_x: bytes[2],
            stick_y: bytes[3],
            substick_x: bytes[4],
            substick_y: bytes[5],
            trigger_left: bytes[6],
            trigger_right: bytes[7],
            analog_a: bytes[8],
            analog_b: bytes[9],
        }
    }

    // The six analog bytes compared when deciding whether the origin moved.
    pub(crate) fn analog_bytes(&self) -> [u8; 6] {
        [
            self.stick_x,
            self.stick_y,
            self.substick_x,
            self.substick_y,
            self.trigger_left,
            self.trigger_right,
        ]
    }
}

impl Default for GcInput {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Pack a full input state into the 8-byte "read" reply for `mode`.
///
/// Buttons and main stick always occupy the first four bytes; the remaining
/// four carry the analog pairs the mode keeps. When two values share a byte,
/// the high nibble of each lands in the high/low nibble of the output.
pub fn pack_input(dest: &mut [u8; 8], input: &GcInput, mode: AnalogMode) {
    let buttons = input.buttons.raw_value().to_le_bytes();
    dest[0] = buttons[0];
    dest[1] = buttons[1];
    dest[2] = input.stick_x;
    dest[3] = input.stick_y;

    match mode {
        AnalogMode::Mode0 => {
            dest[4] = input.substick_x;
            dest[5] = input.substick_y;
            dest[6] = (input.trigger_left & 0xF0) | (input.trigger_right >> 4);
            dest[7] = (input.analog_a & 0xF0) | (input.analog_b >> 4);
        }
        AnalogMode::Mode1 => {
            dest[4] = (input.substick_x & 0xF0) | (input.substick_y >> 4);
            dest[5] = input.trigger_left;
            dest[6] = input.trigger_right;
            dest[7] = (input.analog_a & 0xF0) | (input.analog_b >> 4);
        }
        AnalogMode::Mode2 => {
            dest[4] = (input.substick_x & 0xF0) | (input.substick_y >> 4);
            dest[5] = (input.trigger_left & 0xF0) | (input.trigger_right >> 4);
            dest[6] = input.analog_a;
            dest[7] = input.analog_b;
        }
        AnalogMode::Mode3 => {
            dest[4] = input.substick_x;
            dest[5] = input.substick_y;
            dest[6] = input.trigger_left;
            dest[7] = input.trigger_right;
        }
        AnalogMode::Mode4 => {
            dest[4] = input.substick_x;
            dest[5] = input.substick_y;
            dest[6] = input.analog_a;
            dest[7] = input.analog_b;
        }
    }
}

/// Reconstruct an input state from an 8-byte "read" reply.
///
/// Values the mode truncated come back with a zero low nibble; values it
/// omitted come back as zero.
pub fn unpack_input(src: &[u8; 8], mode: AnalogMode) -> GcInput {
    let mut input = GcInput {
        buttons: GcButtons::new_with_raw_value(u16::from_le_bytes([src[0], src[1]])),
        stick_x: src[2],
        stick_y: src[3],
        substick_x: 0,
        substick_y: 0,
        trigger_left: 0,
        trigger_right: 0,
        analog_a: 0,
        analog_b: 0,
    };

    match mode {
        AnalogMode::Mode0 => {
            input.substick_x = src[4];
            input.substick_y = src[5];
            input.trigger_left = src[6] & 0xF0;
            input.trigger_right = (src[6] & 0x0F) << 4;
            input.analog_a = src[7] & 0xF0;
            input.analog_b = (src[7] & 0x0F) << 4;
        }
        AnalogMode::Mode1 => {
            input.substick_x = src[4] & 0xF0;
            input.substick_y = (src[4] & 0x0F) << 4;
            input.trigger_left = src[5];
            input.trigger_right = src[6];
            input.analog_a = src[7] & 0xF0;
            input.analog_b = (src[7] & 0x0F) << 4;
        }
        AnalogMode::Mode2 => {
            input.substick_x = src[4] & 0xF0;
            input.substick_y = (src[4] & 0x0F) << 4;
            input.trigger_left = src[5] & 0xF0;
            input.trigger_right = (src[5] & 0x0F) << 4;
            input.analog_a = src[6];
            input.analog_b = src[7];
        }
        AnalogMode::Mode3 => {
            input.substick_x = src[4];
            input.substick_y = src[5];
            input.trigger_left = src[6];
            input.trigger_right = src[7];
        }
        AnalogMode::Mode4 => {
            input.substick_x = src[4];
            input.substick_y = src[5];
            input.analog_a = src[6];
            input.analog_b = src[7];
        }
    }

    input
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> GcInput {
        GcInput {
            buttons: GcButtons::new_with_raw_value(0x1013),
            stick_x: 0x7C,
            stick_y: 0x84,
            substick_x: 0x12,
            substick_y: 0x34,
            trigger_left: 0x56,
            trigger_right: 0x78,
            analog_a: 0x9A,
            analog_b: 0xBC,
        }
    }

    #[test]
    fn wire_layout_round_trips() {
        let input = sample_input();
        let bytes = input.to_bytes();
        assert_eq!(bytes[..2], [0x13, 0x10]);
        assert_eq!(GcInput::from_bytes(&bytes), input);
    }

    #[test]
    fn mode3_packs_leading_bytes_verbatim() {
        let input = sample_input();
        let mut packed = [0u8; 8];
        pack_input(&mut packed, &input, AnalogMode::Mode3);
        assert_eq!(packed, input.to_bytes()[..8]);
    }

    #[test]
    fn mode0_truncates_triggers_and_analog() {
        let input = sample_input();
        let mut packed = [0u8; 8];
        pack_input(&mut packed, &input, AnalogMode::Mode0);
        assert_eq!(packed[4..], [0x12, 0x34, 0x57, 0x9B]);
    }

    #[test]
    fn mode1_truncates_substick_and_analog() {
        let input = sample_input();
        let mut packed = [0u8; 8];
        pack_input(&mut packed, &input, AnalogMode::Mode1);
        assert_eq!(packed[4..], [0x13, 0x56, 0x78, 0x9B]);
    }

    #[test]
    fn mode2_truncates_substick_and_triggers() {
        let input = sample_input();
        let mut packed = [0u8; 8];
        pack_input(&mut packed, &input, AnalogMode::Mode2);
        assert_eq!(packed[4..], [0x13, 0x57, 0x9A, 0xBC]);
    }

    #[test]
    fn mode4_drops_triggers() {
        let input = sample_input();
        let mut packed = [0u8; 8];
        pack_input(&mut packed, &input, AnalogMode::Mode4);
        assert_eq!(packed[4..], [0x12, 0x34, 0x9A, 0xBC]);
    }

    #[test]
    fn unpack_inverts_pack_on_preserved_fields() {
        let input = sample_input();
        for mode in [
            AnalogMode::Mode0,
            AnalogMode::Mode1,
            AnalogMode::Mode2,
            AnalogMode::Mode3,
            AnalogMode::Mode4,
        ] {
            let mut packed = [0u8; 8];
            pack_input(&mut packed, &input, mode);
            let unpacked = unpack_input(&packed, mode);

            assert_eq!(unpacked.buttons, input.buttons);
            assert_eq!(unpacked.stick_x, input.stick_x);
            assert_eq!(unpacked.stick_y, input.stick_y);

            // truncated fields keep their high nibble, omitted fields are zero
            match mode {
                AnalogMode::Mode0 => {
                    assert_eq!(unpacked.substick_x, input.substick_x);
                    assert_eq!(unpacked.substick_y, input.substick_y);
                    assert_eq!(unpacked.trigger_left, input.trigger_left & 0xF0);
                    assert_eq!(unpacked.trigger_right, input.trigger_right & 0xF0);
                    assert_eq!(unpacked.analog_a, input.analog_a & 0xF0);
                    assert_eq!(unpacked.analog_b, input.analog_b & 0xF0);
                }
                AnalogMode::Mode1 => {
                    assert_eq!(unpacked.substick_x, input.substick_x & 0xF0);
                    assert_eq!(unpacked.substick_y, input.substick_y & 0xF0);
                    assert_eq!(unpacked.trigger_left, input.trigger_left);
                    assert_eq!(unpacked.trigger_right, input.trigger_right);
                }
                AnalogMode::Mode2 => {
                    assert_eq!(unpacked.analog_a, input.analog_a);
                    assert_eq!(unpacked.analog_b, input.analog_b);
                }
                AnalogMode::Mode3 => {
                    assert_eq!(unpacked.substick_x, input.substick_x);
                    assert_eq!(unpacked.trigger_left, input.trigger_left);
                    assert_eq!(unpacked.trigger_right, input.trigger_right);
                    assert_eq!(unpacked.analog_a, 0);
                    assert_eq!(unpacked.analog_b, 0);
                }
                AnalogMode::Mode4 => {
                    assert_eq!(unpacked.analog_a, input.analog_a);
                    assert_eq!(unpacked.trigger_left, 0);
                    assert_eq!(unpacked.trigger_right, 0);
                }
            }
        }
    }

    #[test]
    fn unknown_analog_mode_behaves_like_mode0() {
        assert_eq!(AnalogMode::from_command(0x05), AnalogMode::Mode0);
        assert_eq!(AnalogMode::from_command(0x07), AnalogMode::Mode0);
        assert_eq!(AnalogMode::from_command(0x0B), AnalogMode::Mode3);
    }

    #[test]
    fn status_bitfield_layout() {
        let status = GcStatus::new_with_raw_value(0)
            .with_need_origin(true)
            .with_motor_state(u2::new(1))
            .with_analog_mode(u3::new(3));
        assert_eq!(status.raw_value(), 0x2B);
    }
}
