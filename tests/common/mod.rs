//! Shared helpers for the integration tests.

use joybus_hal::{Bus, Error, UserData};

/// Captures the outcome of a transfer completion callback.
#[derive(Default)]
pub struct Spy {
    pub result: Option<Result<u8, Error>>,
    pub response: Vec<u8>,
    pub calls: usize,
}

impl Spy {
    pub fn new() -> Self {
        Spy::default()
    }

    /// Context pointer for [on_done]. Re-create it for every transfer.
    pub fn user_data(&mut self) -> UserData {
        UserData(std::ptr::from_mut(self).cast())
    }
}

/// Completion callback recording into the [Spy] behind `user_data`.
pub fn on_done(bus: &mut dyn Bus, result: Result<u8, Error>, user_data: UserData) {
    // SAFETY: `user_data` points at the test-local `Spy` that stays alive
    // and untouched for the duration of the transfer.
    let spy = unsafe { &mut *user_data.0.cast::<Spy>() };
    spy.result = Some(result);
    spy.response = bus.response().to_vec();
    spy.calls += 1;
}
