//! Vendor command framing.
//!
//! Control requests with codes at or above [`VENDOR_BASE`] are not part of
//! the standard USB request set; they are this device's command surface.
//! The setup dispatcher only frames them: code, value and index are
//! snapshotted and handed to a [`CommandHandler`] by the dispatch loop,
//! outside the control-transfer handshake window. Command bodies answer the
//! host themselves through [`crate::usb::ControlPipe::respond`].

use crate::i2c;
use crate::usb::{ControlPipe, Instance};

/// First vendor-defined request code.
pub const VENDOR_BASE: u8 = 0x80;

/// Request codes reserved by the silicon vendor; the USB core answers
/// these itself (firmware load protocol) and they never reach the command
/// handler.
pub const SILICON_RESERVED: core::ops::RangeInclusive<u8> = 0xa0..=0xaf;

/// Command: report the firmware version word.
pub const CMD_GET_VERSION: u8 = 0x80;
/// Command: report the firmware version string.
pub const CMD_GET_VERSION_STRING: u8 = 0x81;
/// Command: report the current device status.
pub const CMD_GET_STATUS: u8 = 0x82;

/// Firmware version word, major.minor in BCD.
pub const FIRMWARE_VERSION: u16 = 0x0001; // 0.1

/// Human-readable firmware version.
pub const VERSION_STRING: &str = "EZ-USB Firmware 0.1";

/// True for request codes routed to vendor command handling.
pub fn is_vendor_code(code: u8) -> bool {
    code >= VENDOR_BASE && !SILICON_RESERVED.contains(&code)
}

/// A vendor command as framed by the setup dispatcher: the raw request
/// code plus the 16-bit value and index fields of its setup packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VendorCommand {
    pub code: u8,
    pub value: u16,
    pub index: u16,
}

/// The seam between the dispatch loop and the command bodies.
///
/// Implementations run in loop context, never in an interrupt, so they may
/// freely perform blocking I2C transfers.
pub trait CommandHandler<USB: Instance, I2C: i2c::Instance> {
    /// A vendor command arrived. Answer the host via
    /// [`ControlPipe::respond`].
    fn on_command(
        &mut self,
        command: VendorCommand,
        pipe: &mut ControlPipe<USB>,
        i2c: &mut i2c::I2c<I2C>,
    );

    /// The bulk IN endpoint finished sending data to the host.
    fn on_bulk_in_complete(&mut self, pipe: &mut ControlPipe<USB>) {
        let _ = pipe;
    }

    /// The bulk OUT endpoint received data from the host.
    fn on_bulk_out_complete(&mut self, pipe: &mut ControlPipe<USB>) {
        let _ = pipe;
    }
}

/// Built-in handler for the firmware's information commands.
///
/// Unknown vendor codes are ignored; the host sees an empty answer rather
/// than a stall.
pub struct InfoCommands {
    status: u8,
}

impl InfoCommands {
    pub const fn new() -> Self {
        InfoCommands { status: 0x01 }
    }
}

impl Default for InfoCommands {
    fn default() -> Self {
        Self::new()
    }
}

impl<USB: Instance, I2C: i2c::Instance> CommandHandler<USB, I2C> for InfoCommands {
    fn on_command(
        &mut self,
        command: VendorCommand,
        pipe: &mut ControlPipe<USB>,
        _i2c: &mut i2c::I2c<I2C>,
    ) {
        match command.code {
            CMD_GET_VERSION => pipe.respond(&FIRMWARE_VERSION.to_le_bytes()),
            CMD_GET_VERSION_STRING => pipe.respond(VERSION_STRING.as_bytes()),
            CMD_GET_STATUS => pipe.respond(&[self.status]),
            _ => {}
        }
    }
}
