//! # Joybus bus engine
//!
//! The core of this module are the [Bus] capability trait, the wire-level
//! [BusEngine] state machine and the platform [Driver] contract it runs on.
//!
//! [BusEngine] owns everything above the peripherals: command staging, chip
//! encoding, pulse decoding, byte counting, deadlines and target dispatch.
//! The platform adapter only has to clock out a pre-encoded chip stream,
//! capture edge-timestamp windows, run a deadline timer and report those
//! three event sources back through [BusEngine::on_event].
//!
//! In host mode the engine pre-arms edge capture before the last command
//! chip has left the transmitter, so the first reply edge on the half-duplex
//! line is never missed. Platforms that cannot pre-arm capture during
//! transmission must pad the stop symbol by one chip to create slack; peers
//! tolerate the longer idle.

use fugit::{HertzU32, MicrosDurationU32, MicrosDurationU64};

use crate::codec::{self, CHIPS_PER_BIT, PulseDecoder};
use crate::target::{Responder, Target};
use crate::{
    BLOCK_SIZE, BYTE_TIMEOUT, Error, IDLE_THRESHOLD, INTER_TRANSFER_DELAY, Instant, REPLY_TIMEOUT,
    Role,
};

pub mod loopback;
pub use loopback::Loopback;

//==================================================================================================
// Callbacks
//==================================================================================================

/// Opaque context forwarded to interrupt-context callbacks.
#[derive(Debug, Clone, Copy)]
pub struct UserData(pub *mut ());

impl UserData {
    /// No context.
    pub const NONE: UserData = UserData(core::ptr::null_mut());
}

// The pointer is only ever handed back to the callback it was registered
// with; the bus itself never dereferences it.
unsafe impl Send for UserData {}

/// Transfer completion callback.
///
/// On success carries the number of reply bytes available through
/// [Bus::response]. Invoked from interrupt context: it must not block, but
/// it may submit the next transfer.
pub type TransferCallback = fn(bus: &mut dyn Bus, result: Result<u8, Error>, user_data: UserData);

//==================================================================================================
// Bus capability
//==================================================================================================

/// Capability set shared by every bus implementation.
///
/// Command encoders stage their bytes in the bus-owned command buffer and
/// submit them with [Bus::transfer]; the reply is read back from
/// [Bus::response] inside the completion callback.
pub trait Bus {
    /// Enable the bus. Starts answering commands if a target is registered.
    fn enable(&mut self) -> Result<(), Error>;

    /// Disable the bus. Pending completion callbacks are dropped.
    fn disable(&mut self) -> Result<(), Error>;

    /// Staging area for outgoing commands.
    fn command_buffer_mut(&mut self) -> &mut [u8; BLOCK_SIZE];

    /// Send `write_len` staged command bytes and read a `read_len`-byte
    /// reply.
    ///
    /// Returns [Error::Busy] unless the bus is idle in host mode. All later
    /// outcomes, including timeouts, are delivered through `done`.
    fn transfer(
        &mut self,
        write_len: u8,
        read_len: u8,
        done: Option<TransferCallback>,
        user_data: UserData,
    ) -> Result<(), Error>;

    /// Reply bytes of the most recent transfer.
    fn response(&self) -> &[u8];
}

//==================================================================================================
// Platform contract
//==================================================================================================

/// Platform adapter driving the physical line.
///
/// Implementations route the data pin, run the transmit and capture
/// peripherals and deliver [BusEvent]s to [BusEngine::on_event] from
/// interrupt context.
pub trait Driver {
    /// Bring up the peripherals and route the data pin.
    fn enable(&mut self) -> Result<(), Error>;

    /// Stop the peripherals and release the data pin.
    fn disable(&mut self);

    /// Tick rate of the edge-capture timer.
    fn capture_clock(&self) -> HertzU32;

    /// Current time, used for inter-transfer pacing.
    fn now(&mut self) -> Instant;

    /// Reconfigure the transmitter for `role` at `bit_rate` (the chip clock
    /// is four times the bit rate) and select the role's stop symbol.
    fn set_role(&mut self, role: Role, bit_rate: HertzU32);

    /// Clock out `data_bits` bits from the pre-encoded chip stream, followed
    /// by the configured stop symbol. Raise [BusEvent::TxComplete] once the
    /// stop has been clocked and the line has returned high.
    fn tx_begin(&mut self, chips: &[u8], data_bits: u16);

    /// Begin capturing the next byte's worth of edge timestamps (18 for the
    /// first byte of a reception, 16 afterwards) and deliver them through
    /// [BusEvent::RxWindow].
    fn rx_arm(&mut self, first_byte: bool);

    /// Stop edge capture.
    fn rx_stop(&mut self);

    /// Arm the deadline timer, superseding any armed deadline.
    fn deadline_arm(&mut self, timeout: MicrosDurationU32);

    /// Cancel the armed deadline.
    fn deadline_cancel(&mut self);

    /// Busy-wait until the line has been continuously high for `threshold`.
    fn await_line_idle(&mut self, threshold: MicrosDurationU32);
}

/// Events delivered by the platform adapter, from interrupt context.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusEvent<'a> {
    /// All queued chips plus the stop symbol left the transmitter and the
    /// line returned high.
    TxComplete,
    /// One byte's worth of edge timestamps was captured.
    RxWindow(&'a [u16]),
    /// The armed deadline elapsed.
    Deadline,
}

//==================================================================================================
// Engine
//==================================================================================================

/// Configuration of a bus engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Chip frequency used when transmitting as host, and when decoding
    /// received commands.
    pub host_freq: HertzU32,
    /// Chip frequency used when replying as target, and when decoding
    /// replies.
    pub target_freq: HertzU32,
}

impl Config {
    pub fn host_freq(mut self, freq: HertzU32) -> Self {
        self.host_freq = freq;
        self
    }

    pub fn target_freq(mut self, freq: HertzU32) -> Self {
        self.target_freq = freq;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            host_freq: crate::FREQ_CONSOLE,
            target_freq: crate::FREQ_GCC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    Disabled,
    HostIdle,
    HostTx,
    HostRx,
    TargetRx,
    TargetTx,
}

const TX_CHIP_BUF_SIZE: usize = BLOCK_SIZE * CHIPS_PER_BIT;

/// Wire-level Joybus state machine over a platform [Driver].
///
/// At most one transfer is in flight per engine, and completion callbacks
/// for consecutive transfers are strictly ordered. All peripheral-level
/// failures collapse to [Error::Timeout]; every error path recovers to the
/// idle (or target-receive) state.
pub struct BusEngine<D: Driver, T: Target> {
    driver: D,
    state: State,
    config: Config,
    target: Option<T>,

    command_buffer: [u8; BLOCK_SIZE],
    read_buffer: [u8; BLOCK_SIZE],
    reply_buffer: [u8; BLOCK_SIZE],
    tx_chips: [u8; TX_CHIP_BUF_SIZE],

    decoder: PulseDecoder,
    host_half_period: u16,
    target_half_period: u16,

    write_len: u8,
    read_len: u8,
    read_count: u8,
    reply_len: u8,
    done: Option<(TransferCallback, UserData)>,
    last_transfer: Option<Instant>,
}

impl<D: Driver, T: Target> BusEngine<D, T> {
    /// Create a disabled engine over `driver`.
    pub fn new(driver: D, config: Config) -> Self {
        BusEngine {
            driver,
            state: State::Disabled,
            config,
            target: None,
            command_buffer: [0; BLOCK_SIZE],
            read_buffer: [0; BLOCK_SIZE],
            reply_buffer: [0; BLOCK_SIZE],
            tx_chips: [0; TX_CHIP_BUF_SIZE],
            decoder: PulseDecoder::new(),
            host_half_period: 0,
            target_half_period: 0,
            write_len: 0,
            read_len: 0,
            read_count: 0,
            reply_len: 0,
            done: None,
            last_transfer: None,
        }
    }

    /// Access the platform driver, e.g. from the interrupt shim.
    #[inline]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Register `target` and start answering commands, replacing any
    /// previously registered target.
    pub fn target_register(&mut self, target: T) -> Result<Option<T>, Error> {
        if self.state == State::Disabled {
            return Err(Error::Disabled);
        }

        let previous = self.target.replace(target);
        self.driver.set_role(Role::Target, self.config.target_freq);
        self.enter_target_read(true);
        Ok(previous)
    }

    /// Unregister the target and return to host operation.
    pub fn target_unregister(&mut self) -> Option<T> {
        let previous = self.target.take();
        if self.state != State::Disabled {
            self.driver.rx_stop();
            self.driver.deadline_cancel();
            self.driver.set_role(Role::Host, self.config.host_freq);
            self.state = State::HostIdle;
        }
        previous
    }

    /// Access the registered target, e.g. to feed it fresh input state.
    #[inline]
    pub fn target_mut(&mut self) -> Option<&mut T> {
        self.target.as_mut()
    }

    /// Handle a platform event. Call from the interrupt shim.
    pub fn on_event(&mut self, event: BusEvent<'_>) {
        match event {
            BusEvent::TxComplete => self.on_tx_complete(),
            BusEvent::RxWindow(edges) => self.on_rx_window(edges),
            BusEvent::Deadline => self.on_deadline(),
        }
    }

    fn on_tx_complete(&mut self) {
        match self.state {
            State::HostTx => {
                if self.read_len > 0 {
                    // capture was pre-armed before the stop bit ended
                    self.state = State::HostRx;
                    self.driver.deadline_arm(REPLY_TIMEOUT);
                } else {
                    self.state = State::HostIdle;
                    self.last_transfer = Some(self.driver.now());
                    self.complete(Ok(0));
                }
            }
            State::TargetTx => {
                if self.target.is_some() {
                    self.enter_target_read(false);
                } else {
                    self.state = State::HostIdle;
                }
            }
            _ => {}
        }
    }

    fn on_rx_window(&mut self, edges: &[u16]) {
        match self.state {
            State::HostRx => {
                self.driver.deadline_cancel();
                let byte = self.decoder.decode(edges, self.target_half_period);
                self.read_buffer[usize::from(self.read_count)] = byte;
                self.read_count += 1;

                if self.read_count == self.read_len {
                    self.driver.rx_stop();
                    self.finish_host_transfer();
                    self.complete(Ok(self.read_len));
                } else {
                    self.driver.rx_arm(false);
                    self.driver.deadline_arm(BYTE_TIMEOUT);
                }
            }
            State::TargetRx => {
                self.driver.deadline_cancel();
                if usize::from(self.read_count) == BLOCK_SIZE {
                    // runaway command, drop it and resynchronize
                    self.driver.rx_stop();
                    self.enter_target_read(true);
                    return;
                }
                let byte = self.decoder.decode(edges, self.host_half_period);
                self.command_buffer[usize::from(self.read_count)] = byte;
                self.read_count += 1;
                self.dispatch_target_byte();
            }
            _ => {}
        }
    }

    fn on_deadline(&mut self) {
        match self.state {
            // the inter-transfer delay elapsed
            State::HostTx => self.start_tx(),
            State::HostRx => {
                self.driver.rx_stop();
                self.finish_host_transfer();
                self.complete(Err(Error::Timeout));
            }
            State::TargetRx => {
                // a half-received command went stale; drop it
                self.driver.rx_stop();
                self.enter_target_read(true);
            }
            _ => {}
        }
    }

    fn start_tx(&mut self) {
        self.decoder.reset();
        if self.read_len > 0 {
            // pre-arm capture so the first reply edge is not missed
            self.driver.rx_arm(true);
        }

        let len = usize::from(self.write_len);
        let Self {
            driver,
            tx_chips,
            command_buffer,
            ..
        } = self;
        codec::encode_frame(tx_chips, &command_buffer[..len]);
        driver.tx_begin(&tx_chips[..len * CHIPS_PER_BIT], (len * 8) as u16);
    }

    fn dispatch_target_byte(&mut self) {
        let count = usize::from(self.read_count);
        let Self {
            target,
            command_buffer,
            reply_buffer,
            reply_len,
            ..
        } = self;
        let Some(target) = target.as_mut() else {
            return;
        };

        let mut responder = Responder::new(reply_buffer, reply_len);
        let result = target.byte_received(&command_buffer[..count], &mut responder);

        match result {
            Ok(0) => {
                self.driver.rx_stop();
                if self.reply_len > 0 {
                    self.start_target_reply();
                } else if self.target.is_some() {
                    self.enter_target_read(false);
                } else {
                    self.state = State::HostIdle;
                }
            }
            Ok(_) => {
                self.driver.rx_arm(false);
                self.driver.deadline_arm(BYTE_TIMEOUT);
            }
            Err(_) => {
                // unsupported or malformed command: stay silent, the host
                // treats the missing reply as "no such device"
                self.driver.rx_stop();
                self.enter_target_read(true);
            }
        }
    }

    fn start_target_reply(&mut self) {
        let len = usize::from(self.reply_len);
        self.state = State::TargetTx;

        let Self {
            driver,
            tx_chips,
            reply_buffer,
            ..
        } = self;
        codec::encode_frame(tx_chips, &reply_buffer[..len]);
        driver.tx_begin(&tx_chips[..len * CHIPS_PER_BIT], (len * 8) as u16);
    }

    fn enter_target_read(&mut self, await_idle: bool) {
        self.read_count = 0;
        self.reply_len = 0;
        self.decoder.reset();
        self.driver.rx_arm(true);
        if await_idle {
            self.driver.await_line_idle(IDLE_THRESHOLD);
        }
        self.state = State::TargetRx;
    }

    fn finish_host_transfer(&mut self) {
        if self.target.is_some() {
            self.enter_target_read(true);
        } else {
            self.state = State::HostIdle;
        }
        self.last_transfer = Some(self.driver.now());
    }

    fn complete(&mut self, result: Result<u8, Error>) {
        // taken before invocation so the callback can chain a new transfer
        if let Some((callback, user_data)) = self.done.take() {
            callback(self, result, user_data);
        }
    }
}

impl<D: Driver, T: Target> Bus for BusEngine<D, T> {
    fn enable(&mut self) -> Result<(), Error> {
        if self.state != State::Disabled {
            return Ok(());
        }
        self.driver.enable()?;

        let capture_hz = self.driver.capture_clock().raw();
        self.host_half_period = ((capture_hz / self.config.host_freq.raw()) / 2) as u16;
        self.target_half_period = ((capture_hz / self.config.target_freq.raw()) / 2) as u16;

        if self.target.is_some() {
            self.driver.set_role(Role::Target, self.config.target_freq);
            self.enter_target_read(true);
        } else {
            self.driver.set_role(Role::Host, self.config.host_freq);
            self.state = State::HostIdle;
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Error> {
        if self.state == State::Disabled {
            return Ok(());
        }
        self.driver.disable();
        self.done = None;
        self.state = State::Disabled;
        Ok(())
    }

    fn command_buffer_mut(&mut self) -> &mut [u8; BLOCK_SIZE] {
        &mut self.command_buffer
    }

    fn transfer(
        &mut self,
        write_len: u8,
        read_len: u8,
        done: Option<TransferCallback>,
        user_data: UserData,
    ) -> Result<(), Error> {
        if self.state == State::Disabled {
            return Err(Error::Disabled);
        }
        if self.state != State::HostIdle {
            return Err(Error::Busy);
        }
        debug_assert!(write_len >= 1 && usize::from(write_len) <= BLOCK_SIZE);
        debug_assert!(usize::from(read_len) <= BLOCK_SIZE);

        self.write_len = write_len;
        self.read_len = read_len;
        self.read_count = 0;
        self.done = done.map(|callback| (callback, user_data));
        self.state = State::HostTx;

        // keep at least INTER_TRANSFER_DELAY of idle line between transfers
        let now = self.driver.now();
        let ready = self
            .last_transfer
            .map(|last| last + MicrosDurationU64::from(INTER_TRANSFER_DELAY));
        match ready {
            Some(ready) if now < ready => {
                let wait = ready - now;
                self.driver
                    .deadline_arm(MicrosDurationU32::from_ticks(wait.ticks() as u32));
            }
            _ => self.start_tx(),
        }

        Ok(())
    }

    fn response(&self) -> &[u8] {
        &self.read_buffer[..usize::from(self.read_count)]
    }
}
