//! Portable host and target drivers for the Nintendo Joybus serial protocol.
//!
//! Joybus is the single-wire, half-duplex, asynchronous bus spoken by
//! Nintendo 64 and GameCube peripherals. This crate provides the wire-level
//! bus engine ([bus::BusEngine]), host-side command encoders ([host]) and
//! byte-by-byte command targets ([target]) on top of a small platform
//! adapter contract ([bus::Driver]).
//!
//! ## Example
//!
//! Answering identify commands with a controller target on the loopback bus:
//!
//! ```
//! use joybus_hal::target::GcController;
//! use joybus_hal::{Bus, Error, Loopback, UserData, gamecube, host};
//!
//! fn on_done(bus: &mut dyn Bus, result: Result<u8, Error>, _user_data: UserData) {
//!     assert_eq!(result, Ok(3));
//!     assert_eq!(bus.response(), &[0x09, 0x00, 0x00][..]);
//! }
//!
//! let mut bus = Loopback::new();
//! bus.enable()?;
//! bus.target_register(GcController::new(gamecube::GAMECUBE_CONTROLLER))?;
//! host::identify(&mut bus, Some(on_done), UserData::NONE)?;
//! # Ok::<(), Error>(())
//! ```
#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod codec;
pub mod commands;
pub mod crc8;
pub mod gamecube;
pub mod host;
pub mod n64;
pub mod target;

pub use bus::{Bus, BusEngine, BusEvent, Config, Driver, Loopback, TransferCallback, UserData};
pub use target::{Responder, Target};

use fugit::{HertzU32, MicrosDurationU32};

/// Chip frequency of an OEM GameCube controller.
pub const FREQ_GCC: HertzU32 = HertzU32::from_raw(250_000);

/// Chip frequency of a WaveBird receiver.
pub const FREQ_WAVEBIRD: HertzU32 = HertzU32::from_raw(225_000);

/// Chip frequency of a console.
pub const FREQ_CONSOLE: HertzU32 = HertzU32::from_raw(200_000);

/// Maximum size of a Joybus transfer, in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Minimum delay between two host transfers on the wire.
pub const INTER_TRANSFER_DELAY: MicrosDurationU32 = MicrosDurationU32::from_ticks(20);

/// Timeout for the first reply byte from a target.
pub const REPLY_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::from_ticks(100);

/// Deadline for each received byte after the first one.
pub const BYTE_TIMEOUT: MicrosDurationU32 = MicrosDurationU32::from_ticks(60);

/// Continuous high time after which the line counts as idle.
pub const IDLE_THRESHOLD: MicrosDurationU32 = MicrosDurationU32::from_ticks(100);

// Transfer lengths travel in u8 fields.
static_assertions::const_assert!(BLOCK_SIZE <= u8::MAX as usize);

/// Microsecond instant used for inter-transfer pacing.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

/// Which side of a transaction a bus currently drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Host,
    Target,
}

/// Joybus error codes.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Operation attempted while the bus is not enabled.
    #[error("bus is not enabled")]
    Disabled,
    /// A transfer is already in flight.
    #[error("bus is busy with another transfer")]
    Busy,
    /// The reply did not arrive, or a per-byte deadline expired mid-reception.
    #[error("transfer timed out")]
    Timeout,
    /// The target does not handle the received opcode.
    #[error("command not supported by target")]
    NotSupported,
}
