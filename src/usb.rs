//! USB control endpoint handling.
//!
//! This module owns the setup-packet dispatcher: every control transfer
//! begins with an 8-byte setup packet which must be classified and answered
//! synchronously, before the control handshake completes. Standard USB 1.1
//! requests are executed immediately; vendor-defined request codes are
//! recorded and signalled to the command dispatch loop, which answers them
//! outside the handshake path.
//!
//! The device model assumes exactly one configuration and one alternate
//! setting, which eliminates configuration-switching logic entirely
//! (SET_CONFIGURATION is accepted unconditionally,
//! GET_CONFIGURATION/GET_INTERFACE answer fixed values).
//!
//! # Usage
//!
//! ```ignore
//! let mut pipe = ControlPipe::new(regs, &descriptors::DESCRIPTORS);
//!
//! // From the main loop or the setup-data-available ISR:
//! if pipe.setup_pending() {
//!     pipe.handle_setup(&signals);
//! }
//! ```
//!
//! Any request the dispatcher cannot satisfy is answered by stalling
//! endpoint 0, the USB protocol's mechanism for "request not supported".

use num_traits::FromPrimitive;

use crate::commands::{self, VendorCommand};
use crate::dispatch::Signals;

pub mod descriptors;
pub mod setup;

pub use descriptors::DescriptorSet;
pub use setup::SetupPacket;

use descriptors::{DescriptorType, CONFIGURATION_VALUE, INTERFACE_NUMBER, LANG_ENGLISH_US};
use setup::{Recipient, StandardRequest, FEATURE_DEVICE_REMOTE_WAKEUP, FEATURE_ENDPOINT_HALT};

/// Direction of a USB transfer, seen from the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Host to device.
    Out,
    /// Device to host.
    In,
}

/// The endpoints this device family actually has.
///
/// Endpoint 0 is the bidirectional control endpoint; endpoints 1..=7 exist
/// once per direction. Addresses outside this set do not name hardware, so
/// [`Endpoint::from_address`] returns `None` for them and the invalid case
/// is gone before any register access happens.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Endpoint {
    Ep0,
    In1,
    Out1,
    In2,
    Out2,
    In3,
    Out3,
    In4,
    Out4,
    In5,
    Out5,
    In6,
    Out6,
    In7,
    Out7,
}

impl Endpoint {
    /// Resolve a `bEndpointAddress` (direction bit 7, number in the low
    /// nibble) to an endpoint, if the device has one.
    pub const fn from_address(address: u8) -> Option<Self> {
        let is_in = address & 0x80 != 0;
        match (address & 0x0f, is_in) {
            (0, _) => Some(Endpoint::Ep0),
            (1, true) => Some(Endpoint::In1),
            (1, false) => Some(Endpoint::Out1),
            (2, true) => Some(Endpoint::In2),
            (2, false) => Some(Endpoint::Out2),
            (3, true) => Some(Endpoint::In3),
            (3, false) => Some(Endpoint::Out3),
            (4, true) => Some(Endpoint::In4),
            (4, false) => Some(Endpoint::Out4),
            (5, true) => Some(Endpoint::In5),
            (5, false) => Some(Endpoint::Out5),
            (6, true) => Some(Endpoint::In6),
            (6, false) => Some(Endpoint::Out6),
            (7, true) => Some(Endpoint::In7),
            (7, false) => Some(Endpoint::Out7),
            _ => None,
        }
    }

    /// The `bEndpointAddress` encoding of this endpoint. Endpoint 0 reports
    /// address 0.
    pub const fn address(self) -> u8 {
        match self {
            Endpoint::Ep0 => 0x00,
            Endpoint::In1 => 0x81,
            Endpoint::Out1 => 0x01,
            Endpoint::In2 => 0x82,
            Endpoint::Out2 => 0x02,
            Endpoint::In3 => 0x83,
            Endpoint::Out3 => 0x03,
            Endpoint::In4 => 0x84,
            Endpoint::Out4 => 0x04,
            Endpoint::In5 => 0x85,
            Endpoint::Out5 => 0x05,
            Endpoint::In6 => 0x86,
            Endpoint::Out6 => 0x06,
            Endpoint::In7 => 0x87,
            Endpoint::Out7 => 0x07,
        }
    }

    /// Endpoint number without the direction bit.
    pub const fn number(self) -> u8 {
        self.address() & 0x0f
    }
}

/// Why a control request was rejected.
///
/// Every rejection is reported to the host the same way, by stalling
/// endpoint 0; the variants exist for logging and tests.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Reserved or unimplemented request code.
    UnsupportedRequest,
    /// `bmRequestType` names a recipient this device cannot resolve.
    UnknownRecipient,
    /// Descriptor type or index outside the static tables.
    UnknownDescriptor,
    /// String descriptor requested for a language the device does not carry.
    UnsupportedLanguage,
    /// `wIndex` does not address a valid endpoint.
    InvalidEndpoint,
    /// Feature selector not supported for this recipient.
    UnsupportedFeature,
}

/// Register capability of the USB core.
///
/// The dispatcher drives the silicon exclusively through this trait:
/// endpoint control/status bits, the setup buffer, the EP0 IN buffer and the
/// descriptor pointer. Implementations exist per board/register layout; the
/// crate's tests implement it over a simulated core.
pub trait Instance {
    /// "Setup data available" interrupt flag.
    fn setup_pending(&self) -> bool;

    /// Clear the "setup data available" interrupt flag.
    fn clear_setup_irq(&mut self);

    /// Snapshot of the 8-byte setup buffer.
    fn setup_packet(&self) -> [u8; 8];

    /// Fill the EP0 IN buffer and arm it by writing the byte count.
    /// `data` is at most 64 bytes.
    fn ep0_respond(&mut self, data: &[u8]);

    /// Point the control-transfer descriptor pointer at a static table; the
    /// core streams the descriptor from there without a copy.
    fn load_descriptor(&mut self, descriptor: &'static [u8]);

    /// Complete the control handshake for the current setup transaction.
    fn ack_handshake(&mut self);

    /// Set or clear the stall bit of an endpoint.
    fn set_stall(&mut self, ep: Endpoint, stalled: bool);

    /// Read the stall bit of an endpoint.
    fn is_stalled(&self, ep: Endpoint) -> bool;

    /// Reset the data-toggle synchronization bit of an endpoint.
    fn reset_toggle(&mut self, ep: Endpoint);

    /// Clear an endpoint's stall and busy bits and its byte count,
    /// re-arming the pipe from scratch.
    fn reset_endpoint(&mut self, ep: Endpoint);

    /// Bulk IN endpoint completion flag (data went to the host).
    fn bulk_in_done(&self) -> bool;

    /// Clear the bulk IN completion flag.
    fn clear_bulk_in_irq(&mut self);

    /// Bulk OUT endpoint completion flag (data arrived from the host).
    fn bulk_out_done(&self) -> bool;

    /// Clear the bulk OUT completion flag.
    fn clear_bulk_out_irq(&mut self);
}

/// The control endpoint: setup dispatch over a USB core instance.
pub struct ControlPipe<USB: Instance> {
    usb: USB,
    descriptors: &'static DescriptorSet,
    pending_command: Option<VendorCommand>,
}

impl<USB: Instance> ControlPipe<USB> {
    /// Take ownership of the USB core and serve the given descriptor set.
    pub fn new(usb: USB, descriptors: &'static DescriptorSet) -> Self {
        ControlPipe {
            usb,
            descriptors,
            pending_command: None,
        }
    }

    /// Releases the USB core.
    pub fn free(self) -> USB {
        self.usb
    }

    /// Direct access to the USB core, for integration code that touches
    /// registers outside the control pipe's concern.
    pub fn instance_mut(&mut self) -> &mut USB {
        &mut self.usb
    }

    /// True when a setup packet has arrived and awaits dispatch.
    pub fn setup_pending(&self) -> bool {
        self.usb.setup_pending()
    }

    /// Dispatch the setup packet currently in the setup buffer.
    ///
    /// Executes standard requests synchronously; for vendor request codes
    /// the command is recorded (latest wins) and the command-pending signal
    /// raised instead, so the dispatch loop can run it outside the
    /// handshake window. On failure endpoint 0 is stalled. The interrupt
    /// flag is cleared and the handshake completed in every case.
    pub fn handle_setup(&mut self, signals: &Signals) -> Result<(), Error> {
        let packet = SetupPacket::from_bytes(self.usb.setup_packet());
        let result = self.dispatch(&packet, signals);
        if result.is_err() {
            self.usb.set_stall(Endpoint::Ep0, true);
        }
        self.usb.clear_setup_irq();
        self.usb.ack_handshake();
        result
    }

    /// Answer the data stage of the current control transfer. Used by
    /// vendor command handlers.
    pub fn respond(&mut self, data: &[u8]) {
        self.usb.ep0_respond(data);
    }

    /// Re-arm the bulk OUT endpoint to accept the next packet.
    pub fn arm_bulk_out(&mut self) {
        self.usb.reset_endpoint(Endpoint::Out2);
    }

    /// The most recent vendor command, if it has not been consumed yet.
    pub fn take_pending_command(&mut self) -> Option<VendorCommand> {
        self.pending_command.take()
    }

    pub(crate) fn take_bulk_in_event(&mut self) -> bool {
        if self.usb.bulk_in_done() {
            self.usb.clear_bulk_in_irq();
            true
        } else {
            false
        }
    }

    pub(crate) fn take_bulk_out_event(&mut self) -> bool {
        if self.usb.bulk_out_done() {
            self.usb.clear_bulk_out_irq();
            true
        } else {
            false
        }
    }

    fn dispatch(&mut self, packet: &SetupPacket, signals: &Signals) -> Result<(), Error> {
        match StandardRequest::from_u8(packet.request) {
            Some(StandardRequest::GetStatus) => self.get_status(packet),
            Some(StandardRequest::ClearFeature) => self.feature(packet, false),
            Some(StandardRequest::SetFeature) => self.feature(packet, true),
            // The USB core updates the device address itself.
            Some(StandardRequest::SetAddress) => Ok(()),
            Some(StandardRequest::SetDescriptor) => Err(Error::UnsupportedRequest),
            Some(StandardRequest::GetDescriptor) => self.get_descriptor(packet),
            Some(StandardRequest::GetConfiguration) => {
                // Exactly one configuration exists; report its value.
                self.usb.ep0_respond(&[CONFIGURATION_VALUE]);
                Ok(())
            }
            Some(StandardRequest::SetConfiguration) => Ok(()),
            Some(StandardRequest::GetInterface) => {
                self.usb.ep0_respond(&[INTERFACE_NUMBER]);
                Ok(())
            }
            Some(StandardRequest::SetInterface) => {
                self.reset_bulk_pipes();
                Ok(())
            }
            // No isochronous endpoints exist.
            Some(StandardRequest::SynchFrame) => Ok(()),
            None => self.nonstandard(packet, signals),
        }
    }

    fn get_status(&mut self, packet: &SetupPacket) -> Result<(), Error> {
        match packet.request_type.recipient() {
            Some(Recipient::Device) | Some(Recipient::Interface) => {
                // Byte 0 bit 0 = self-powered, bit 1 = remote wakeup; both
                // report as off. Interfaces always answer two zero bytes
                // per USB 1.1. Byte 1 is reserved.
                self.usb.ep0_respond(&[0, 0]);
                Ok(())
            }
            Some(Recipient::Endpoint) => {
                let ep = Endpoint::from_address(packet.index as u8)
                    .ok_or(Error::InvalidEndpoint)?;
                let halted = if self.usb.is_stalled(ep) { 0x01 } else { 0x00 };
                self.usb.ep0_respond(&[halted, 0]);
                Ok(())
            }
            _ => Err(Error::UnknownRecipient),
        }
    }

    fn feature(&mut self, packet: &SetupPacket, set: bool) -> Result<(), Error> {
        match packet.request_type.recipient() {
            Some(Recipient::Device) => {
                // Remote wakeup toggling is accepted but the feature stays
                // off; there is no wakeup source to wire it to.
                if packet.value == FEATURE_DEVICE_REMOTE_WAKEUP {
                    Ok(())
                } else {
                    Err(Error::UnsupportedFeature)
                }
            }
            Some(Recipient::Endpoint) => {
                if packet.value != FEATURE_ENDPOINT_HALT {
                    return Err(Error::UnsupportedFeature);
                }
                let ep = Endpoint::from_address(packet.index as u8)
                    .ok_or(Error::InvalidEndpoint)?;
                self.usb.set_stall(ep, set);
                Ok(())
            }
            _ => Err(Error::UnknownRecipient),
        }
    }

    fn get_descriptor(&mut self, packet: &SetupPacket) -> Result<(), Error> {
        let index = packet.value as u8;
        match DescriptorType::from_u8((packet.value >> 8) as u8) {
            Some(DescriptorType::Device) => {
                self.usb.load_descriptor(self.descriptors.device_bytes());
                Ok(())
            }
            Some(DescriptorType::Configuration) => {
                self.usb
                    .load_descriptor(self.descriptors.configuration_bytes());
                Ok(())
            }
            Some(DescriptorType::String) => self.get_string_descriptor(index, packet.index),
            _ => Err(Error::UnknownDescriptor),
        }
    }

    fn get_string_descriptor(&mut self, index: u8, language: u16) -> Result<(), Error> {
        // Index zero names the language table, regardless of the language
        // id the host put in wIndex.
        if index == 0 {
            self.usb.load_descriptor(self.descriptors.languages);
            return Ok(());
        }
        if language != LANG_ENGLISH_US {
            return Err(Error::UnsupportedLanguage);
        }
        let string = self
            .descriptors
            .strings
            .get(usize::from(index) - 1)
            .ok_or(Error::UnknownDescriptor)?;
        self.usb.load_descriptor(string);
        Ok(())
    }

    /// SET_INTERFACE: with a single alternate setting there is nothing to
    /// select, but the request re-arms the bulk pipes from scratch: data
    /// toggles reset, stall/busy cleared, byte counts zeroed.
    fn reset_bulk_pipes(&mut self) {
        for ep in [Endpoint::In2, Endpoint::Out2] {
            self.usb.reset_toggle(ep);
            self.usb.reset_endpoint(ep);
        }
    }

    fn nonstandard(&mut self, packet: &SetupPacket, signals: &Signals) -> Result<(), Error> {
        if commands::is_vendor_code(packet.request) {
            // Answering has to happen outside the interrupt context; hand
            // the command to the dispatch loop. A second command arriving
            // before the loop drains the first replaces it.
            self.pending_command = Some(VendorCommand {
                code: packet.request,
                value: packet.value,
                index: packet.index,
            });
            signals.raise_command();
            Ok(())
        } else if commands::SILICON_RESERVED.contains(&packet.request) {
            // The USB core answers the firmware-load block itself.
            Ok(())
        } else {
            Err(Error::UnsupportedRequest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::SimUsb;
    use zerocopy::AsBytes;

    fn make_pipe(setup: [u8; 8]) -> ControlPipe<SimUsb> {
        let mut usb = SimUsb::new();
        usb.deliver_setup(setup);
        ControlPipe::new(usb, &descriptors::DESCRIPTORS)
    }

    fn setup(request_type: u8, request: u8, value: u16, index: u16) -> [u8; 8] {
        let v = value.to_le_bytes();
        let i = index.to_le_bytes();
        [request_type, request, v[0], v[1], i[0], i[1], 0, 0]
    }

    fn run(mut pipe: ControlPipe<SimUsb>) -> (ControlPipe<SimUsb>, Result<(), Error>, Signals) {
        let signals = Signals::new();
        let result = pipe.handle_setup(&signals);
        (pipe, result, signals)
    }

    #[test]
    fn get_descriptor_device_loads_the_device_table() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 6, 0x0100, 0)));
        assert_eq!(result, Ok(()));
        let usb = pipe.free();
        assert_eq!(usb.loaded, Some(descriptors::DEVICE.as_bytes()));
        assert!(!usb.stalled(Endpoint::Ep0));
        assert_eq!(usb.handshakes, 1);
        assert!(!usb.setup_irq);
    }

    #[test]
    fn get_descriptor_configuration_loads_the_whole_bundle() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 6, 0x0200, 0)));
        assert_eq!(result, Ok(()));
        let loaded = pipe.free().loaded.unwrap();
        assert_eq!(loaded.len(), 32);
        assert_eq!(loaded, descriptors::CONFIGURATION.as_bytes());
    }

    #[test]
    fn string_index_zero_always_answers_the_language_table() {
        // Even with a bogus language id in wIndex.
        let (pipe, result, _) = run(make_pipe(setup(0x80, 6, 0x0300, 0x1234)));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().loaded, Some(descriptors::LANGUAGES));
    }

    #[test]
    fn string_indices_are_one_based_into_the_table() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 6, 0x0302, 0x0409)));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().loaded, Some(descriptors::STRINGS[1]));
    }

    #[test]
    fn unsupported_language_stalls() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 6, 0x0301, 0x040c)));
        assert_eq!(result, Err(Error::UnsupportedLanguage));
        let usb = pipe.free();
        assert!(usb.stalled(Endpoint::Ep0));
        assert_eq!(usb.loaded, None);
    }

    #[test]
    fn string_index_out_of_range_stalls() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 6, 0x0306, 0x0409)));
        assert_eq!(result, Err(Error::UnknownDescriptor));
        assert!(pipe.free().stalled(Endpoint::Ep0));
    }

    #[test]
    fn unknown_descriptor_type_stalls_and_does_nothing_else() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 6, 0x0600, 0)));
        assert_eq!(result, Err(Error::UnknownDescriptor));
        let usb = pipe.free();
        assert!(usb.stalled(Endpoint::Ep0));
        assert_eq!(usb.loaded, None);
        assert_eq!(usb.ep0_response, None);
        assert!(usb.toggles_reset.is_empty());
        // The handshake still completes; the stall is the answer.
        assert_eq!(usb.handshakes, 1);
    }

    #[test]
    fn get_status_device_and_interface_answer_two_zero_bytes() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 0, 0, 0)));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().ep0_response, Some(vec![0, 0]));

        let (pipe, result, _) = run(make_pipe(setup(0x81, 0, 0, 0)));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().ep0_response, Some(vec![0, 0]));
    }

    #[test]
    fn get_status_endpoint_reports_the_stall_bit() {
        let mut usb = SimUsb::new();
        usb.force_stall(Endpoint::In2);
        usb.deliver_setup(setup(0x82, 0, 0, 0x0082));
        let (pipe, result, _) = run(ControlPipe::new(usb, &descriptors::DESCRIPTORS));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().ep0_response, Some(vec![1, 0]));

        let (pipe, result, _) = run(make_pipe(setup(0x82, 0, 0, 0x0002)));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().ep0_response, Some(vec![0, 0]));
    }

    #[test]
    fn get_status_with_unresolvable_endpoint_stalls() {
        let (pipe, result, _) = run(make_pipe(setup(0x82, 0, 0, 0x0008)));
        assert_eq!(result, Err(Error::InvalidEndpoint));
        let usb = pipe.free();
        assert!(usb.stalled(Endpoint::Ep0));
        assert_eq!(usb.ep0_response, None);
    }

    #[test]
    fn get_status_with_unknown_recipient_stalls() {
        let (pipe, result, _) = run(make_pipe(setup(0x83, 0, 0, 0)));
        assert_eq!(result, Err(Error::UnknownRecipient));
        assert!(pipe.free().stalled(Endpoint::Ep0));
    }

    #[test]
    fn set_and_clear_feature_toggle_the_endpoint_halt() {
        let (pipe, result, _) = run(make_pipe(setup(0x02, 3, 0, 0x0002)));
        assert_eq!(result, Ok(()));
        let mut usb = pipe.free();
        assert!(usb.stalled(Endpoint::Out2));

        usb.deliver_setup(setup(0x02, 1, 0, 0x0002));
        let (pipe, result, _) = run(ControlPipe::new(usb, &descriptors::DESCRIPTORS));
        assert_eq!(result, Ok(()));
        assert!(!pipe.free().stalled(Endpoint::Out2));
    }

    #[test]
    fn feature_with_bad_selector_stalls() {
        let (pipe, result, _) = run(make_pipe(setup(0x02, 3, 2, 0x0002)));
        assert_eq!(result, Err(Error::UnsupportedFeature));
        let usb = pipe.free();
        assert!(usb.stalled(Endpoint::Ep0));
        assert!(!usb.stalled(Endpoint::Out2));
    }

    #[test]
    fn device_remote_wakeup_is_accepted_without_effect() {
        let (pipe, result, _) = run(make_pipe(setup(0x00, 3, 1, 0)));
        assert_eq!(result, Ok(()));
        assert!(!pipe.free().stalled(Endpoint::Ep0));
    }

    #[test]
    fn reserved_request_codes_stall() {
        for code in [2, 4] {
            let (pipe, result, _) = run(make_pipe(setup(0x00, code, 0, 0)));
            assert_eq!(result, Err(Error::UnsupportedRequest));
            assert!(pipe.free().stalled(Endpoint::Ep0));
        }
    }

    #[test]
    fn set_address_and_synch_frame_are_quietly_accepted() {
        for (request_type, code) in [(0x00, 5), (0x02, 12), (0x00, 9)] {
            let (pipe, result, _) = run(make_pipe(setup(request_type, code, 0, 0)));
            assert_eq!(result, Ok(()));
            let usb = pipe.free();
            assert!(!usb.stalled(Endpoint::Ep0));
            assert_eq!(usb.ep0_response, None);
            assert_eq!(usb.handshakes, 1);
        }
    }

    #[test]
    fn get_configuration_and_interface_answer_fixed_values() {
        let (pipe, result, _) = run(make_pipe(setup(0x80, 8, 0, 0)));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().ep0_response, Some(vec![CONFIGURATION_VALUE]));

        let (pipe, result, _) = run(make_pipe(setup(0x81, 10, 0, 0)));
        assert_eq!(result, Ok(()));
        assert_eq!(pipe.free().ep0_response, Some(vec![INTERFACE_NUMBER]));
    }

    #[test]
    fn set_interface_rearms_both_bulk_pipes() {
        let mut usb = SimUsb::new();
        usb.force_stall(Endpoint::In2);
        usb.force_busy(Endpoint::Out2, 17);
        usb.deliver_setup(setup(0x01, 11, 0, 0));
        let (pipe, result, _) = run(ControlPipe::new(usb, &descriptors::DESCRIPTORS));
        assert_eq!(result, Ok(()));
        let usb = pipe.free();
        assert_eq!(usb.toggles_reset, vec![Endpoint::In2, Endpoint::Out2]);
        assert!(!usb.stalled(Endpoint::In2));
        assert!(!usb.busy(Endpoint::Out2));
        assert_eq!(usb.byte_count(Endpoint::Out2), 0);
    }

    #[test]
    fn vendor_codes_raise_the_command_signal() {
        let (mut pipe, result, signals) = run(make_pipe(setup(0xc0, 0x80, 0xbeef, 0x1234)));
        assert_eq!(result, Ok(()));
        assert!(signals.take_command());
        assert_eq!(
            pipe.take_pending_command(),
            Some(VendorCommand {
                code: 0x80,
                value: 0xbeef,
                index: 0x1234,
            })
        );
        // The handshake completed; the handler answers the data stage.
        let usb = pipe.free();
        assert!(!usb.stalled(Endpoint::Ep0));
        assert_eq!(usb.handshakes, 1);
    }

    #[test]
    fn silicon_reserved_block_is_left_to_the_core() {
        let (mut pipe, result, signals) = run(make_pipe(setup(0x40, 0xa5, 0, 0)));
        assert_eq!(result, Ok(()));
        assert!(!signals.take_command());
        assert_eq!(pipe.take_pending_command(), None);
        assert!(!pipe.free().stalled(Endpoint::Ep0));
    }

    #[test]
    fn unknown_request_codes_below_the_vendor_range_stall() {
        let (pipe, result, signals) = run(make_pipe(setup(0x40, 0x30, 0, 0)));
        assert_eq!(result, Err(Error::UnsupportedRequest));
        assert!(!signals.take_command());
        assert!(pipe.free().stalled(Endpoint::Ep0));
    }

    #[test]
    fn latest_vendor_command_wins_before_the_loop_drains() {
        let (mut pipe, _, signals) = run(make_pipe(setup(0xc0, 0x81, 1, 0)));
        // A second command lands before the loop consumed the first.
        pipe.instance_mut().deliver_setup(setup(0xc0, 0x82, 2, 0));
        pipe.handle_setup(&signals).unwrap();
        let cmd = pipe.take_pending_command().unwrap();
        assert_eq!(cmd.code, 0x82);
        assert_eq!(pipe.take_pending_command(), None);
    }

    #[test]
    fn endpoint_addresses_round_trip() {
        for addr in [0x00, 0x80, 0x01, 0x81, 0x07, 0x87] {
            let ep = Endpoint::from_address(addr).unwrap();
            // Address 0x80 folds onto the single control endpoint.
            assert_eq!(ep.address() & 0x7f, addr & 0x7f);
        }
        assert_eq!(Endpoint::from_address(0x08), None);
        assert_eq!(Endpoint::from_address(0x8f), None);
        assert_eq!(Endpoint::In2.number(), 2);
    }
}
