//! I2C master driver.
//!
//! The EZ-USB I2C controller buffers exactly one byte, so a multi-byte
//! transfer is a sequence of interrupt events with one byte of work each.
//! This module owns the transfer state machine that sequences those events:
//! start condition, address byte, data bytes, the "last byte" no-acknowledge
//! arming for reads, and the stop condition.
//!
//! # Usage
//!
//! Blocking transfers pump the state machine in place:
//!
//! ```ignore
//! let mut i2c = I2c::new(regs, Config::new());
//!
//! let mut id = [0u8; 2];
//! i2c.write(0x50, &[0x00])?;
//! i2c.read(0x50, &mut id)?;
//! ```
//!
//! The driver also exposes the controller through the embedded-hal
//! `i2c::I2c` trait, so device drivers written against embedded-hal run on
//! it unchanged.
//!
//! Split-phase operation is available for callers that want to do other
//! work while a transfer runs; the returned [`Transfer`] borrows the driver
//! and the caller's buffer for the transfer's duration:
//!
//! ```ignore
//! let mut transfer = i2c.start_read(0x50, &mut buf)?;
//! loop {
//!     match transfer.poll() {
//!         Ok(n) => break n,
//!         Err(nb::Error::WouldBlock) => continue,
//!         Err(nb::Error::Other(e)) => return Err(e),
//!     }
//! }
//! ```
//!
//! Each [`Transfer::poll`] consumes at most one pending interrupt event, so
//! the one-byte-per-interrupt contract of the controller is preserved
//! whether the events are polled from the main loop or delivered from the
//! I2C interrupt handler.

mod hal;

/// Direction bit appended to the 7-bit address on the wire.
const READ_BIT: u8 = 0x01;

/// I2C error
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// A transfer is already in flight; retry once it has finished.
    Busy,
    /// Electrical or protocol fault on the bus. The transfer was aborted
    /// and a stop condition requested.
    BusError,
    /// The addressed target did not acknowledge. Aborted like a bus error,
    /// but distinguishable so callers can retry with backoff.
    NotAcknowledged,
    /// The bus did not complete the transfer within the configured poll
    /// budget.
    Timeout,
    /// Zero-length transfers cannot be expressed on this controller.
    InvalidLength,
}

/// Transfer state, advanced one step per interrupt event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum State {
    Idle,
    /// Read transfer: address sent, waiting to clock in the first byte.
    ReceivingFirstByte,
    Receiving,
    Sending,
    /// Write transfer: all bytes sent, the next event requests the stop.
    AwaitingStop,
    BusError,
    NotAcknowledged,
}

impl State {
    fn in_flight(self) -> bool {
        matches!(
            self,
            State::ReceivingFirstByte | State::Receiving | State::Sending | State::AwaitingStop
        )
    }
}

/// Register capability of the I2C controller.
///
/// Semantics follow the EZ-USB I2CS/I2DAT register pair: writing the data
/// register clocks a byte out, reading it returns the received byte *and*
/// starts the next 9-clock read burst, and the START/STOP/LASTRD bits are
/// armed ahead of the byte they affect. Board integrations implement this
/// over the real registers; the tests implement it over a simulated bus.
pub trait Instance {
    /// Enable the I2C interrupt source.
    fn enable_irq(&mut self);

    /// Arm a start condition for the next data-register write.
    fn set_start(&mut self);

    /// Load the data register; hardware clocks the byte out.
    fn write_data(&mut self, byte: u8);

    /// Read the data register: returns the received byte and triggers the
    /// next read burst (unless a stop has been requested).
    fn read_data(&mut self) -> u8;

    /// Request a stop condition after the current byte.
    fn request_stop(&mut self);

    /// True while a requested stop condition has not completed yet.
    fn stop_pending(&self) -> bool;

    /// Arm the "last read" flag: the next received byte is not
    /// acknowledged, telling the target it is the final one.
    fn arm_last_read(&mut self);

    /// Bus error flag.
    fn bus_error(&self) -> bool;

    /// Acknowledge flag of the last completed byte.
    fn acked(&self) -> bool;

    /// Interrupt flag: a byte finished clocking.
    fn irq_pending(&self) -> bool;

    /// Clear the interrupt flag.
    fn clear_irq(&mut self);
}

/// Driver configuration.
///
/// ```ignore
/// let config = Config::new().timeout_iters(poll_budget(clk, 10.millis()));
/// ```
#[derive(Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Iteration budget for every busy-wait loop in the driver. The chip
    /// has no spare timer, so timeouts are poll counts; see
    /// [`crate::time::poll_budget`] to derive one from wall-clock time.
    pub(crate) timeout_iters: u32,
}

impl Config {
    pub const fn new() -> Self {
        Config {
            timeout_iters: 100_000,
        }
    }

    /// Set the busy-wait iteration budget.
    pub const fn timeout_iters(mut self, iters: u32) -> Self {
        self.timeout_iters = iters;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone, Debug)]
struct TransferState {
    state: State,
    length: u8,
    count: u8,
}

impl TransferState {
    const fn idle() -> Self {
        TransferState {
            state: State::Idle,
            length: 0,
            count: 0,
        }
    }
}

/// The caller's storage, borrowed for the duration of one transfer.
enum Buffer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// I2C master driver over a controller instance.
pub struct I2c<I2C: Instance> {
    i2c: I2C,
    config: Config,
    xfer: TransferState,
}

impl<I2C: Instance> I2c<I2C> {
    /// Take ownership of the controller and enable its interrupt source.
    pub fn new(mut i2c: I2C, config: Config) -> Self {
        i2c.enable_irq();
        I2c {
            i2c,
            config,
            xfer: TransferState::idle(),
        }
    }

    /// Releases the I2C controller.
    pub fn free(self) -> I2C {
        self.i2c
    }

    /// True when no transfer is in flight.
    pub fn is_idle(&self) -> bool {
        self.xfer.state == State::Idle
    }

    /// Bytes moved by the most recent transfer. After a failed transfer
    /// this is how much of the caller's buffer was actually used before
    /// the terminal state; the data up to here is on the bus/in the buffer,
    /// whether it is still meaningful is the caller's decision.
    pub fn last_transfer_len(&self) -> usize {
        usize::from(self.xfer.count)
    }

    /// Abandon any in-flight transfer record and request a stop condition.
    ///
    /// This is the recovery path after a [`Transfer`] was dropped without
    /// completing, or after a stuck bus produced [`Error::Timeout`].
    pub fn reset(&mut self) {
        self.i2c.request_stop();
        self.xfer = TransferState::idle();
    }

    /// Begin an asynchronous read of `buffer.len()` bytes from `address`.
    ///
    /// Waits (bounded) for a previous transfer's stop condition, then
    /// programs the start condition and the address byte. The transfer then
    /// advances exclusively through [`Transfer::poll`].
    ///
    /// Errors with [`Error::Busy`] if a transfer is still in flight and
    /// [`Error::InvalidLength`] for an empty buffer.
    pub fn start_read<'a>(
        &'a mut self,
        address: u8,
        buffer: &'a mut [u8],
    ) -> Result<Transfer<'a, I2C>, Error> {
        self.begin(address, READ_BIT, buffer.len(), State::ReceivingFirstByte)?;
        Ok(Transfer {
            i2c: self,
            buffer: Buffer::Read(buffer),
        })
    }

    /// Begin an asynchronous write of `bytes` to `address`. See
    /// [`I2c::start_read`].
    pub fn start_write<'a>(
        &'a mut self,
        address: u8,
        bytes: &'a [u8],
    ) -> Result<Transfer<'a, I2C>, Error> {
        self.begin(address, 0, bytes.len(), State::Sending)?;
        Ok(Transfer {
            i2c: self,
            buffer: Buffer::Write(bytes),
        })
    }

    /// Read `buffer.len()` bytes from `address`, blocking until the
    /// transfer reaches a terminal state. Returns the achieved byte count.
    pub fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Error> {
        self.start_read(address, buffer)?.wait()
    }

    /// Write `bytes` to `address`, blocking until the transfer reaches a
    /// terminal state. Returns the achieved byte count.
    pub fn write(&mut self, address: u8, bytes: &[u8]) -> Result<usize, Error> {
        self.start_write(address, bytes)?.wait()
    }

    fn begin(
        &mut self,
        address: u8,
        direction_bit: u8,
        length: usize,
        first_state: State,
    ) -> Result<(), Error> {
        assert!(
            length <= usize::from(u8::MAX),
            "I2C max transfer size = {} bytes",
            u8::MAX
        );
        assert!(address <= 0x7f, "I2C addresses are 7 bit");
        if length == 0 {
            return Err(Error::InvalidLength);
        }

        // Wait for a previous transfer's stop condition to finish.
        self.wait_stop()?;
        if self.xfer.state != State::Idle {
            return Err(Error::Busy);
        }

        // Arm the start condition and send the address byte; everything
        // after this happens one interrupt event at a time.
        self.i2c.set_start();
        self.i2c.write_data(address << 1 | direction_bit);
        self.xfer = TransferState {
            state: first_state,
            length: length as u8,
            count: 0,
        };
        Ok(())
    }

    fn wait_stop(&mut self) -> Result<(), Error> {
        for _ in 0..self.config.timeout_iters {
            if !self.i2c.stop_pending() {
                return Ok(());
            }
        }
        Err(Error::Timeout)
    }

    /// Process one interrupt event: exactly one byte of work, then clear
    /// the interrupt flag.
    fn service_interrupt(&mut self, buffer: &mut Buffer<'_>) {
        Self::step(&mut self.i2c, &mut self.xfer, buffer);
        self.i2c.clear_irq();
    }

    fn step(regs: &mut I2C, xfer: &mut TransferState, buffer: &mut Buffer<'_>) {
        if regs.bus_error() {
            xfer.state = State::BusError;
            regs.request_stop();
            return;
        }
        // A missing acknowledge aborts the transfer, except mid-read: the
        // controller itself withholds the acknowledge of the final incoming
        // byte, and that must not read as a target failure.
        if xfer.state != State::Receiving && !regs.acked() {
            xfer.state = State::NotAcknowledged;
            regs.request_stop();
            return;
        }

        match xfer.state {
            State::ReceivingFirstByte => {
                // For a single-byte read the "last byte" flag has to be up
                // before the first burst: it controls the acknowledge sent
                // for the byte about to be received.
                if xfer.length == 1 {
                    regs.arm_last_read();
                }
                // Dummy read: discard the data register to start the first
                // 9-clock burst.
                let _ = regs.read_data();
                xfer.state = State::Receiving;
            }
            State::Receiving => {
                // Arm "last byte" one event early, for the same reason as
                // above; on the final byte request the stop condition
                // before touching the data register.
                if usize::from(xfer.count) + 2 == usize::from(xfer.length) {
                    regs.arm_last_read();
                }
                if usize::from(xfer.count) + 1 == usize::from(xfer.length) {
                    regs.request_stop();
                    xfer.state = State::Idle;
                }
                let byte = regs.read_data();
                if let Buffer::Read(buf) = buffer {
                    buf[usize::from(xfer.count)] = byte;
                }
                xfer.count += 1;
            }
            State::Sending => {
                if let Buffer::Write(bytes) = buffer {
                    regs.write_data(bytes[usize::from(xfer.count)]);
                }
                xfer.count += 1;
                if xfer.count == xfer.length {
                    xfer.state = State::AwaitingStop;
                }
            }
            State::AwaitingStop => {
                regs.request_stop();
                xfer.state = State::Idle;
            }
            // Never entered with a pending event; see Transfer::poll.
            State::Idle | State::BusError | State::NotAcknowledged => {}
        }
    }
}

/// An in-flight transfer.
///
/// Borrows the driver and the caller's buffer until it completes, so a
/// second transfer cannot start while one is running. There is no
/// cancellation: dropping an unfinished transfer leaves the driver busy
/// until [`I2c::reset`] is called.
pub struct Transfer<'a, I2C: Instance> {
    i2c: &'a mut I2c<I2C>,
    buffer: Buffer<'a>,
}

impl<I2C: Instance> core::fmt::Debug for Transfer<'_, I2C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transfer").finish_non_exhaustive()
    }
}

impl<I2C: Instance> Transfer<'_, I2C> {
    /// Advance the transfer by at most one pending interrupt event.
    ///
    /// Returns the achieved byte count once the transfer is complete,
    /// `WouldBlock` while it is still in flight, and the terminal error if
    /// the bus faulted or the target did not acknowledge (the driver is
    /// idle again afterwards).
    pub fn poll(&mut self) -> nb::Result<usize, Error> {
        if self.i2c.xfer.state.in_flight() && self.i2c.i2c.irq_pending() {
            self.i2c.service_interrupt(&mut self.buffer);
        }

        match self.i2c.xfer.state {
            State::Idle => Ok(usize::from(self.i2c.xfer.count)),
            State::BusError => {
                self.i2c.xfer.state = State::Idle;
                Err(nb::Error::Other(Error::BusError))
            }
            State::NotAcknowledged => {
                self.i2c.xfer.state = State::Idle;
                Err(nb::Error::Other(Error::NotAcknowledged))
            }
            _ => Err(nb::Error::WouldBlock),
        }
    }

    /// Bytes moved so far.
    pub fn count(&self) -> usize {
        usize::from(self.i2c.xfer.count)
    }

    /// Block until the transfer reaches a terminal state, bounded by the
    /// driver's poll budget. On expiry the transfer is aborted with a stop
    /// condition and [`Error::Timeout`].
    pub fn wait(mut self) -> Result<usize, Error> {
        for _ in 0..self.i2c.config.timeout_iters {
            match self.poll() {
                Ok(count) => return Ok(count),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {}
            }
        }
        self.i2c.reset();
        Err(Error::Timeout)
    }
}
