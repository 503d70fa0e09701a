//! Control-transfer setup packets.
//!
//! Every USB control transfer begins with an 8-byte setup packet naming the
//! request and its parameters. The packet is delivered by the USB core as a
//! raw byte snapshot; [`SetupPacket::from_bytes`] decodes it once per
//! transfer and the decoded value is never mutated mid-dispatch.

use num_derive::FromPrimitive;

use super::Direction;

/// Feature selector for endpoint halt (CLEAR_FEATURE / SET_FEATURE).
pub const FEATURE_ENDPOINT_HALT: u16 = 0;

/// Feature selector for device remote wakeup (CLEAR_FEATURE / SET_FEATURE).
pub const FEATURE_DEVICE_REMOTE_WAKEUP: u16 = 1;

/// Decoded 8-byte setup packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetupPacket {
    /// Request characteristics bitmap: direction, type and recipient.
    pub request_type: RequestType,
    /// Request code. Standard codes are listed in [`StandardRequest`];
    /// everything else is class- or vendor-defined.
    pub request: u8,
    /// Request-specific 16-bit argument.
    pub value: u16,
    /// Request-specific 16-bit index, typically an endpoint address or
    /// language id.
    pub index: u16,
    /// Number of bytes in the data stage that follows, if any.
    pub length: u16,
}

impl SetupPacket {
    /// Decode the raw setup buffer snapshot (little-endian 16-bit fields).
    pub fn from_bytes(raw: [u8; 8]) -> Self {
        SetupPacket {
            request_type: RequestType(raw[0]),
            request: raw[1],
            value: u16::from_le_bytes([raw[2], raw[3]]),
            index: u16::from_le_bytes([raw[4], raw[5]]),
            length: u16::from_le_bytes([raw[6], raw[7]]),
        }
    }
}

/// The `bmRequestType` bitmap of a setup packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RequestType(pub u8);

impl RequestType {
    /// Direction of the data stage.
    pub fn direction(self) -> Direction {
        if self.0 & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    /// Request type category (bits 6..5). `None` for the reserved value.
    pub fn kind(self) -> Option<RequestKind> {
        num_traits::FromPrimitive::from_u8((self.0 >> 5) & 0x03)
    }

    /// Addressed recipient (bits 4..0). `None` for reserved values.
    pub fn recipient(self) -> Option<Recipient> {
        num_traits::FromPrimitive::from_u8(self.0 & 0x1f)
    }
}

/// Request type category of a setup packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestKind {
    Standard = 0,
    Class = 1,
    Vendor = 2,
}

/// Recipient of a setup packet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recipient {
    Device = 0,
    Interface = 1,
    Endpoint = 2,
    Other = 3,
}

/// Standard USB 1.1 request codes.
///
/// Codes 2 and 4 are reserved by the USB specification and have no variant
/// here; they parse to `None` and are rejected by the dispatcher.
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StandardRequest {
    GetStatus = 0,
    ClearFeature = 1,
    SetFeature = 3,
    SetAddress = 5,
    GetDescriptor = 6,
    SetDescriptor = 7,
    GetConfiguration = 8,
    SetConfiguration = 9,
    GetInterface = 10,
    SetInterface = 11,
    SynchFrame = 12,
}
