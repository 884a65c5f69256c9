//! N64 controller data types and accessory port constants.

/// Button word of the N64 input state.
#[bitbybit::bitfield(u16, default = 0x0, debug, defmt_bitfields(feature = "defmt"))]
#[derive(PartialEq, Eq)]
pub struct N64Buttons {
    #[bit(0, rw)]
    right: bool,
    #[bit(1, rw)]
    left: bool,
    #[bit(2, rw)]
    down: bool,
    #[bit(3, rw)]
    up: bool,
    #[bit(4, rw)]
    start: bool,
    #[bit(5, rw)]
    z: bool,
    #[bit(6, rw)]
    b: bool,
    #[bit(7, rw)]
    a: bool,
    #[bit(8, rw)]
    c_right: bool,
    #[bit(9, rw)]
    c_left: bool,
    #[bit(10, rw)]
    c_down: bool,
    #[bit(11, rw)]
    c_up: bool,
    #[bit(12, rw)]
    r: bool,
    #[bit(13, rw)]
    l: bool,
    #[bit(15, rw)]
    reset: bool,
}

/// Bits of the button word that are actual buttons.
pub const BUTTON_MASK: u16 = 0x3FFF;

/// N64 controller input state, 4 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct N64Input {
    pub buttons: N64Buttons,
    pub stick_x: u8,
    pub stick_y: u8,
}

impl N64Input {
    /// The 4-byte wire representation, button word little endian.
    pub fn to_bytes(&self) -> [u8; 4] {
        let buttons = self.buttons.raw_value().to_le_bytes();
        [buttons[0], buttons[1], self.stick_x, self.stick_y]
    }

    pub fn from_bytes(bytes: &[u8; 4]) -> Self {
        N64Input {
            buttons: N64Buttons::new_with_raw_value(u16::from_le_bytes([bytes[0], bytes[1]])),
            stick_x: bytes[2],
            stick_y: bytes[3],
        }
    }
}

impl Default for N64Input {
    fn default() -> Self {
        N64Input {
            buttons: N64Buttons::new_with_raw_value(0),
            stick_x: 0,
            stick_y: 0,
        }
    }
}

/// Accessory port address of the Controller Pak label area.
pub const ACCESSORY_ADDR_LABEL: u16 = 0x0000;
/// Accessory port address probed during accessory detection.
pub const ACCESSORY_ADDR_PROBE: u16 = 0x8000;
/// Accessory port address of the Rumble Pak motor.
pub const ACCESSORY_ADDR_MOTOR: u16 = 0xC000;

/// Probe value identifying a Rumble Pak.
pub const PROBE_RUMBLE_PAK: u8 = 0x80;
/// Probe value identifying a Bio Sensor.
pub const PROBE_BIO_SENSOR: u8 = 0x81;
/// Probe value identifying a Transfer Pak.
pub const PROBE_TRANSFER_PAK: u8 = 0x84;
/// Probe value identifying a Snap Station.
pub const PROBE_SNAP_STATION: u8 = 0x85;
/// Probe value resetting the accessory.
pub const PROBE_RESET: u8 = 0xFE;
