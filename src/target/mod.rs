//! Joybus targets: devices that answer commands on the bus.

use crate::{BLOCK_SIZE, Error};

pub mod gc_controller;
pub mod n64_controller;

pub use gc_controller::GcController;
pub use n64_controller::N64Controller;

/// Reply staging handle passed to [Target::byte_received].
///
/// A handler stages at most one reply per command, typically at the earliest
/// byte index at which the reply is fully determined; the reply starts
/// clocking out once the handler reports the command complete.
pub struct Responder<'a> {
    buffer: &'a mut [u8; BLOCK_SIZE],
    len: &'a mut u8,
}

impl<'a> Responder<'a> {
    pub(crate) fn new(buffer: &'a mut [u8; BLOCK_SIZE], len: &'a mut u8) -> Self {
        Responder { buffer, len }
    }

    /// Stage `response` as the reply to the in-flight command.
    pub fn send(&mut self, response: &[u8]) {
        debug_assert!(response.len() <= BLOCK_SIZE);
        let len = response.len().min(BLOCK_SIZE);
        self.buffer[..len].copy_from_slice(&response[..len]);
        *self.len = len as u8;
    }
}

/// A device answering commands byte by byte.
pub trait Target {
    /// Handle the latest received command byte.
    ///
    /// `command` holds every byte received so far, `command[0]` being the
    /// opcode. Returns the number of bytes still expected: a positive count
    /// keeps the bus receiving, zero completes the command and sends any
    /// staged reply. An error drops the command without replying, which a
    /// Joybus host treats as "no such device".
    ///
    /// Invoked from interrupt context; must not block.
    fn byte_received(
        &mut self,
        command: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<u8, Error>;
}
