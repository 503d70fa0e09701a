//! Command dispatch loop.
//!
//! After initialization the firmware is a single cooperative loop: hardware
//! events (a vendor command arriving on the control endpoint, a bulk
//! endpoint completing a transfer) raise signal flags, and the loop drains
//! those flags and runs the matching handler. The loop never blocks and
//! never returns.
//!
//! A signal flag is a level, not a queue: events are set by the interrupt
//! side and cleared by the loop, and a second event of the same kind before
//! the loop drains the first coalesces into a single observed event. The
//! hardware can only have one transfer outstanding per endpoint, so there
//! is never more than one real event to observe.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::commands::CommandHandler;
use crate::i2c;
use crate::usb::{ControlPipe, Instance};

/// The three signal flags connecting interrupt context to the loop.
///
/// Single-writer-per-direction: event sources only set, the loop only
/// clears. On the single-core target that rule makes the flags race-free
/// without any further synchronization; relaxed atomics keep them sound to
/// share with interrupt handlers.
pub struct Signals {
    command_pending: AtomicBool,
    bulk_in_complete: AtomicBool,
    bulk_out_complete: AtomicBool,
}

impl Signals {
    pub const fn new() -> Self {
        Signals {
            command_pending: AtomicBool::new(false),
            bulk_in_complete: AtomicBool::new(false),
            bulk_out_complete: AtomicBool::new(false),
        }
    }

    /// A vendor command is waiting for the loop.
    pub fn raise_command(&self) {
        self.command_pending.store(true, Ordering::Relaxed);
    }

    /// Consume the command-pending flag.
    ///
    /// Load-then-clear, no read-modify-write: the loop is the only clearer
    /// and the target has no compare-and-swap.
    pub fn take_command(&self) -> bool {
        let raised = self.command_pending.load(Ordering::Relaxed);
        if raised {
            self.command_pending.store(false, Ordering::Relaxed);
        }
        raised
    }

    /// The bulk IN endpoint finished a transfer.
    pub fn raise_bulk_in(&self) {
        self.bulk_in_complete.store(true, Ordering::Relaxed);
    }

    /// Consume the bulk-IN-complete flag.
    pub fn take_bulk_in(&self) -> bool {
        let raised = self.bulk_in_complete.load(Ordering::Relaxed);
        if raised {
            self.bulk_in_complete.store(false, Ordering::Relaxed);
        }
        raised
    }

    /// The bulk OUT endpoint finished a transfer.
    pub fn raise_bulk_out(&self) {
        self.bulk_out_complete.store(true, Ordering::Relaxed);
    }

    /// Consume the bulk-OUT-complete flag.
    pub fn take_bulk_out(&self) -> bool {
        let raised = self.bulk_out_complete.load(Ordering::Relaxed);
        if raised {
            self.bulk_out_complete.store(false, Ordering::Relaxed);
        }
        raised
    }
}

impl Default for Signals {
    fn default() -> Self {
        Self::new()
    }
}

/// The assembled firmware: control pipe, I2C driver, signals and the
/// command handler, driven by one poll loop.
pub struct Device<USB, I2C, H>
where
    USB: Instance,
    I2C: i2c::Instance,
    H: CommandHandler<USB, I2C>,
{
    pipe: ControlPipe<USB>,
    i2c: i2c::I2c<I2C>,
    signals: Signals,
    handler: H,
}

impl<USB, I2C, H> Device<USB, I2C, H>
where
    USB: Instance,
    I2C: i2c::Instance,
    H: CommandHandler<USB, I2C>,
{
    pub fn new(pipe: ControlPipe<USB>, i2c: i2c::I2c<I2C>, handler: H) -> Self {
        Device {
            pipe,
            i2c,
            signals: Signals::new(),
            handler,
        }
    }

    pub fn pipe_mut(&mut self) -> &mut ControlPipe<USB> {
        &mut self.pipe
    }

    pub fn i2c_mut(&mut self) -> &mut i2c::I2c<I2C> {
        &mut self.i2c
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    /// One loop iteration: observe pending hardware events, then drain
    /// each signal flag and invoke its handler.
    pub fn poll(&mut self) {
        // Event half: this is what the interrupt handlers do on silicon.
        if self.pipe.setup_pending() {
            let _ = self.pipe.handle_setup(&self.signals);
        }
        if self.pipe.take_bulk_in_event() {
            self.signals.raise_bulk_in();
        }
        if self.pipe.take_bulk_out_event() {
            self.signals.raise_bulk_out();
        }

        // Loop half: consume the levels.
        if self.signals.take_command() {
            if let Some(command) = self.pipe.take_pending_command() {
                self.handler
                    .on_command(command, &mut self.pipe, &mut self.i2c);
            }
        }
        if self.signals.take_bulk_in() {
            self.handler.on_bulk_in_complete(&mut self.pipe);
        }
        if self.signals.take_bulk_out() {
            self.handler.on_bulk_out_complete(&mut self.pipe);
        }
    }

    /// Arm the bulk OUT endpoint for the first host packet, then poll
    /// forever. This is the firmware's only top-level control flow after
    /// initialization.
    pub fn run(&mut self) -> ! {
        self.pipe.arm_bulk_out();
        loop {
            self.poll();
        }
    }
}
