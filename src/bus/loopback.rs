//! Loopback bus for exercising targets without hardware.

use heapless::Vec;

use crate::bus::{Bus, TransferCallback, UserData};
use crate::target::{Responder, Target};
use crate::{BLOCK_SIZE, Error};

/// A bus that feeds staged commands straight back into the registered
/// target, skipping the wire.
///
/// Transfers complete synchronously: the completion callback runs before
/// [Bus::transfer] returns, reporting how many bytes the target actually
/// replied with. A silent target completes with `Ok(0)`; a missing target
/// completes with [Error::Timeout], matching what a host would observe on a
/// real line.
pub struct Loopback<T: Target> {
    enabled: bool,
    target: Option<T>,
    command_buffer: [u8; BLOCK_SIZE],
    response: Vec<u8, BLOCK_SIZE>,
}

impl<T: Target> Loopback<T> {
    pub fn new() -> Self {
        Loopback {
            enabled: false,
            target: None,
            command_buffer: [0; BLOCK_SIZE],
            response: Vec::new(),
        }
    }

    /// Register `target`, replacing any previously registered one.
    pub fn target_register(&mut self, target: T) -> Result<Option<T>, Error> {
        if !self.enabled {
            return Err(Error::Disabled);
        }
        Ok(self.target.replace(target))
    }

    pub fn target_unregister(&mut self) -> Option<T> {
        self.target.take()
    }

    /// Access the registered target.
    #[inline]
    pub fn target_mut(&mut self) -> Option<&mut T> {
        self.target.as_mut()
    }
}

impl<T: Target> Default for Loopback<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Target> Bus for Loopback<T> {
    fn enable(&mut self) -> Result<(), Error> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Error> {
        self.enabled = false;
        Ok(())
    }

    fn command_buffer_mut(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.command_buffer
    }

    fn transfer(
        &mut self,
        write_len: u8,
        _read_len: u8,
        done: Option<TransferCallback>,
        user_data: UserData,
    ) -> Result<(), Error> {
        if !self.enabled {
            return Err(Error::Disabled);
        }

        let mut reply = [0u8; BLOCK_SIZE];
        let mut reply_len = 0u8;
        let mut result = Ok(0);

        match self.target.as_mut() {
            None => result = Err(Error::Timeout),
            Some(target) => {
                let mut responder = Responder::new(&mut reply, &mut reply_len);
                for i in 1..=write_len {
                    match target.byte_received(&self.command_buffer[..usize::from(i)], &mut responder)
                    {
                        Ok(0) => break,
                        Ok(_) => {}
                        Err(error) => {
                            result = Err(error);
                            break;
                        }
                    }
                }
            }
        }

        self.response.clear();
        if result.is_ok() {
            self.response
                .extend_from_slice(&reply[..usize::from(reply_len)])
                .ok();
            result = Ok(reply_len);
        }

        if let Some(callback) = done {
            callback(self, result, user_data);
        }
        Ok(())
    }

    fn response(&self) -> &[u8] {
        &self.response
    }
}
