//! N64 controller target.

use crate::Error;
use crate::commands::{self, DeviceId};
use crate::n64::N64Input;
use crate::target::{Responder, Target};

/// Callback for reset commands, invoked from interrupt context.
pub type ResetCallback = fn(&mut N64Controller);

/// An N64 controller answering host commands.
pub struct N64Controller {
    id: DeviceId,
    input: N64Input,
    on_reset: Option<ResetCallback>,
}

impl N64Controller {
    /// Create a controller with the given identify type, e.g.
    /// [commands::ID_N64_CONTROLLER].
    pub fn new(device_type: u16) -> Self {
        N64Controller {
            id: DeviceId::new(device_type),
            input: N64Input::default(),
            on_reset: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    /// Mutable ID access, e.g. to report accessory presence in the status
    /// byte.
    #[inline]
    pub fn id_mut(&mut self) -> &mut DeviceId {
        &mut self.id
    }

    #[inline]
    pub fn input(&self) -> &N64Input {
        &self.input
    }

    /// Update the live input state.
    #[inline]
    pub fn set_input(&mut self, input: N64Input) {
        self.input = input;
    }

    pub fn set_reset_callback(&mut self, callback: ResetCallback) {
        self.on_reset = Some(callback);
    }

    fn handle_reset(&mut self, responder: &mut Responder<'_>) -> Result<u8, Error> {
        responder.send(self.id.as_bytes());

        if let Some(on_reset) = self.on_reset {
            on_reset(self);
        }

        Ok(0)
    }

    fn handle_identify(&mut self, responder: &mut Responder<'_>) -> Result<u8, Error> {
        responder.send(self.id.as_bytes());
        Ok(0)
    }

    fn handle_read(&mut self, responder: &mut Responder<'_>) -> Result<u8, Error> {
        responder.send(&self.input.to_bytes());
        Ok(0)
    }
}

impl Target for N64Controller {
    fn byte_received(
        &mut self,
        command: &[u8],
        responder: &mut Responder<'_>,
    ) -> Result<u8, Error> {
        match command[0] {
            commands::RESET => self.handle_reset(responder),
            commands::IDENTIFY => self.handle_identify(responder),
            commands::N64_READ => self.handle_read(responder),
            _ => Err(Error::NotSupported),
        }
    }
}
