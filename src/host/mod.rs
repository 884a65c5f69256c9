//! Host-side command encoders.
//!
//! Every command stages its bytes in the bus command buffer and submits the
//! transfer lengths from [crate::commands]; the reply is picked up from
//! [Bus::response] inside the completion callback.

use crate::Error;
use crate::bus::{Bus, TransferCallback, UserData};
use crate::commands;

pub mod gamecube;
pub mod n64;

/// Reset the device on the bus and read its 3-byte identity.
pub fn reset(
    bus: &mut dyn Bus,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    bus.command_buffer_mut()[0] = commands::RESET;
    bus.transfer(commands::RESET_TX, commands::RESET_RX, done, user_data)
}

/// Read the 3-byte identity of the device on the bus.
pub fn identify(
    bus: &mut dyn Bus,
    done: Option<TransferCallback>,
    user_data: UserData,
) -> Result<(), Error> {
    bus.command_buffer_mut()[0] = commands::IDENTIFY;
    bus.transfer(commands::IDENTIFY_TX, commands::IDENTIFY_RX, done, user_data)
}
