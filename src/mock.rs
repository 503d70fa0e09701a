//! Simulated hardware for host-side tests.
//!
//! `SimI2c` models the one-byte-buffered I2C controller: writing the data
//! register clocks a byte out and completes "later" (the completion
//! interrupt shows up after the driver clears the current one, like the
//! real controller raising it after nine clocks), reading the data register
//! returns the received byte and clocks the next one in. Target behavior
//! (acknowledge or not, bytes to return, bus faults) is scripted through
//! public fields.
//!
//! `SimUsb` models the USB core's control surface as plain state so tests
//! can assert on stall bits, armed responses and descriptor pointers.

use std::collections::{HashMap, VecDeque};

use crate::i2c;
use crate::usb::{self, Endpoint};

pub struct SimI2c {
    /// Bus error flag, scripted by tests.
    pub berr: bool,
    /// The target does not acknowledge the address byte.
    pub nack_address: bool,
    /// The target does not acknowledge this data byte (0-based index).
    pub nack_on_data: Option<usize>,
    /// Dead bus: nothing ever completes, no interrupts fire.
    pub silent: bool,
    /// A requested stop condition never completes.
    pub stuck_stop: bool,
    /// Bytes the addressed target returns for a read transfer.
    pub incoming: VecDeque<u8>,
    /// Every byte clocked onto the bus, address byte included.
    pub written: Vec<u8>,
    /// State of the "last read" flag at the moment each incoming byte was
    /// clocked in. The driver must arm it before the final byte.
    pub lastrd_when_clocked: Vec<bool>,
    /// Stop conditions requested.
    pub stops: usize,
    /// Whether the driver enabled the interrupt source.
    pub irq_enabled: bool,

    irq: bool,
    in_transit: bool,
    ack: bool,
    lastrd: bool,
    data: u8,
    stop_requested: bool,
    expecting_address: bool,
    data_written: usize,
}

impl SimI2c {
    pub fn new() -> Self {
        SimI2c {
            berr: false,
            nack_address: false,
            nack_on_data: None,
            silent: false,
            stuck_stop: false,
            incoming: VecDeque::new(),
            written: Vec::new(),
            lastrd_when_clocked: Vec::new(),
            stops: 0,
            irq_enabled: false,
            irq: false,
            in_transit: false,
            ack: true,
            lastrd: false,
            data: 0,
            stop_requested: false,
            expecting_address: false,
            data_written: 0,
        }
    }
}

impl i2c::Instance for SimI2c {
    fn enable_irq(&mut self) {
        self.irq_enabled = true;
    }

    fn set_start(&mut self) {
        self.expecting_address = true;
        self.stop_requested = false;
        self.lastrd = false;
    }

    fn write_data(&mut self, byte: u8) {
        self.written.push(byte);
        if self.silent {
            return;
        }
        if self.expecting_address {
            self.expecting_address = false;
            self.ack = !self.nack_address;
        } else {
            let index = self.data_written;
            self.data_written += 1;
            self.ack = Some(index) != self.nack_on_data;
        }
        self.in_transit = true;
        self.irq = true;
    }

    fn read_data(&mut self) -> u8 {
        let current = self.data;
        if !self.stop_requested {
            if let Some(next) = self.incoming.pop_front() {
                self.lastrd_when_clocked.push(self.lastrd);
                // With LASTRD armed the controller withholds the
                // acknowledge of the byte being clocked in.
                self.ack = !self.lastrd;
                self.data = next;
                if !self.silent {
                    self.in_transit = true;
                    self.irq = true;
                }
            }
        }
        current
    }

    fn request_stop(&mut self) {
        self.stops += 1;
        self.stop_requested = true;
    }

    fn stop_pending(&self) -> bool {
        self.stuck_stop
    }

    fn arm_last_read(&mut self) {
        self.lastrd = true;
    }

    fn bus_error(&self) -> bool {
        self.berr
    }

    fn acked(&self) -> bool {
        self.ack
    }

    fn irq_pending(&self) -> bool {
        self.irq
    }

    fn clear_irq(&mut self) {
        // A byte still in transit re-raises the flag once it completes;
        // collapsing "later" to "immediately after the clear" keeps the
        // one-event-per-poll cadence of the real controller.
        self.irq = self.in_transit;
        self.in_transit = false;
    }
}

#[derive(Copy, Clone, Default)]
struct EpState {
    stalled: bool,
    busy: bool,
    byte_count: u8,
}

pub struct SimUsb {
    pub setup: [u8; 8],
    pub setup_irq: bool,
    pub bulk_in_irq: bool,
    pub bulk_out_irq: bool,
    /// Data most recently armed on EP0 IN.
    pub ep0_response: Option<Vec<u8>>,
    /// Table most recently loaded into the descriptor pointer.
    pub loaded: Option<&'static [u8]>,
    /// Completed control handshakes.
    pub handshakes: usize,
    /// Endpoints whose data toggle was reset, in order.
    pub toggles_reset: Vec<Endpoint>,
    endpoints: HashMap<Endpoint, EpState>,
}

impl SimUsb {
    pub fn new() -> Self {
        SimUsb {
            setup: [0; 8],
            setup_irq: false,
            bulk_in_irq: false,
            bulk_out_irq: false,
            ep0_response: None,
            loaded: None,
            handshakes: 0,
            toggles_reset: Vec::new(),
            endpoints: HashMap::new(),
        }
    }

    /// A setup packet arrives from the host.
    pub fn deliver_setup(&mut self, packet: [u8; 8]) {
        self.setup = packet;
        self.setup_irq = true;
    }

    pub fn force_stall(&mut self, ep: Endpoint) {
        self.state_mut(ep).stalled = true;
    }

    pub fn force_busy(&mut self, ep: Endpoint, byte_count: u8) {
        let state = self.state_mut(ep);
        state.busy = true;
        state.byte_count = byte_count;
    }

    pub fn stalled(&self, ep: Endpoint) -> bool {
        self.endpoints.get(&ep).is_some_and(|s| s.stalled)
    }

    pub fn busy(&self, ep: Endpoint) -> bool {
        self.endpoints.get(&ep).is_some_and(|s| s.busy)
    }

    pub fn byte_count(&self, ep: Endpoint) -> u8 {
        self.endpoints.get(&ep).map_or(0, |s| s.byte_count)
    }

    fn state_mut(&mut self, ep: Endpoint) -> &mut EpState {
        self.endpoints.entry(ep).or_default()
    }
}

impl usb::Instance for SimUsb {
    fn setup_pending(&self) -> bool {
        self.setup_irq
    }

    fn clear_setup_irq(&mut self) {
        self.setup_irq = false;
    }

    fn setup_packet(&self) -> [u8; 8] {
        self.setup
    }

    fn ep0_respond(&mut self, data: &[u8]) {
        assert!(data.len() <= 64, "EP0 IN buffer is 64 bytes");
        self.ep0_response = Some(data.to_vec());
    }

    fn load_descriptor(&mut self, descriptor: &'static [u8]) {
        self.loaded = Some(descriptor);
    }

    fn ack_handshake(&mut self) {
        self.handshakes += 1;
    }

    fn set_stall(&mut self, ep: Endpoint, stalled: bool) {
        self.state_mut(ep).stalled = stalled;
    }

    fn is_stalled(&self, ep: Endpoint) -> bool {
        self.stalled(ep)
    }

    fn reset_toggle(&mut self, ep: Endpoint) {
        self.toggles_reset.push(ep);
    }

    fn reset_endpoint(&mut self, ep: Endpoint) {
        *self.state_mut(ep) = EpState::default();
    }

    fn bulk_in_done(&self) -> bool {
        self.bulk_in_irq
    }

    fn clear_bulk_in_irq(&mut self) {
        self.bulk_in_irq = false;
    }

    fn bulk_out_done(&self) -> bool {
        self.bulk_out_irq
    }

    fn clear_bulk_out_irq(&mut self) {
        self.bulk_out_irq = false;
    }
}
