//! Static USB descriptor tables.
//!
//! The device advertises exactly one configuration with one vendor-specific
//! interface and a bulk IN/OUT endpoint pair. All descriptors are static
//! data; the control pipe answers GET_DESCRIPTOR by pointing the descriptor
//! pointer hardware at one of these tables, without copying.

use core::mem::size_of;

use byteorder::LittleEndian;
use num_derive::FromPrimitive;
use zerocopy::{AsBytes, U16};

use super::Endpoint;

/// USB idVendor value.
pub const ID_VENDOR: u16 = 0xFFF0;
/// USB idProduct value.
pub const ID_PRODUCT: u16 = 0x0002;
/// USB bcdDevice value, release number in BCD.
pub const BCD_DEVICE: u16 = 0x0100;

/// bConfigurationValue of the only configuration.
pub const CONFIGURATION_VALUE: u8 = 1;
/// bInterfaceNumber of the only interface.
pub const INTERFACE_NUMBER: u8 = 0;

/// The only supported string language, US English.
pub const LANG_ENGLISH_US: u16 = 0x0409;

const CLASS_VENDOR_SPECIFIC: u8 = 0xff;
const ENDPOINT_TYPE_BULK: u8 = 0x02;
const BULK_MAX_PACKET: u16 = 64;

/// Descriptor type codes used in descriptors and GET_DESCRIPTOR requests.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, AsBytes)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DescriptorType {
    Device = 0x01,
    Configuration = 0x02,
    String = 0x03,
    Interface = 0x04,
    Endpoint = 0x05,
}

/// Standard device descriptor.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct DeviceDescriptor {
    pub length: u8,
    pub descriptor_type: DescriptorType,
    pub bcd_usb: U16<LittleEndian>,
    pub device_class: u8,
    pub device_subclass: u8,
    pub device_protocol: u8,
    pub max_packet_size0: u8,
    pub vendor: U16<LittleEndian>,
    pub product: U16<LittleEndian>,
    pub bcd_device: U16<LittleEndian>,
    /// Index of the manufacturer name in the string table.
    pub manufacturer_s: u8,
    /// Index of the product name in the string table.
    pub product_s: u8,
    /// Index of the serial number in the string table.
    pub serial_s: u8,
    pub num_configurations: u8,
}

/// Standard configuration descriptor.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct ConfigurationDescriptor {
    pub length: u8,
    pub descriptor_type: DescriptorType,
    /// Total length of this descriptor plus all interface and endpoint
    /// descriptors that follow it.
    pub total_length: U16<LittleEndian>,
    pub num_interfaces: u8,
    pub configuration_value: u8,
    pub configuration_s: u8,
    pub attributes: u8,
    /// Maximum bus power draw in units of 2 mA.
    pub max_power: u8,
}

/// Standard interface descriptor.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct InterfaceDescriptor {
    pub length: u8,
    pub descriptor_type: DescriptorType,
    pub interface_number: u8,
    pub alternate_setting: u8,
    pub num_endpoints: u8,
    pub interface_class: u8,
    pub interface_subclass: u8,
    pub interface_protocol: u8,
    pub interface_s: u8,
}

/// Standard endpoint descriptor.
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct EndpointDescriptor {
    pub length: u8,
    pub descriptor_type: DescriptorType,
    pub endpoint_address: u8,
    pub attributes: u8,
    pub max_packet_size: U16<LittleEndian>,
    pub interval: u8,
}

/// Configuration descriptor together with its interface and endpoint
/// descriptors.
///
/// The descriptor pointer hardware streams `total_length` bytes starting at
/// the configuration descriptor, so the four descriptors must be adjacent in
/// memory. `repr(C)` on this bundle guarantees that (none of the member
/// descriptors require padding).
#[repr(C)]
#[derive(Debug, AsBytes)]
pub struct ConfigurationBundle {
    pub configuration: ConfigurationDescriptor,
    pub interface: InterfaceDescriptor,
    pub bulk_in: EndpointDescriptor,
    pub bulk_out: EndpointDescriptor,
}

/// Build a complete UTF-16LE string descriptor from an ASCII string.
///
/// `N` must be `2 + 2 * ascii.len()`; the mismatch is caught at compile
/// time.
pub const fn string_descriptor<const N: usize>(ascii: &str) -> [u8; N] {
    let bytes = ascii.as_bytes();
    assert!(N == 2 + 2 * bytes.len());
    assert!(N <= u8::MAX as usize);

    let mut out = [0u8; N];
    out[0] = N as u8;
    out[1] = DescriptorType::String as u8;
    let mut i = 0;
    while i < bytes.len() {
        // ASCII maps 1:1 onto the low byte of a UTF-16 code unit.
        assert!(bytes[i].is_ascii());
        out[2 + 2 * i] = bytes[i];
        i += 1;
    }
    out
}

pub static DEVICE: DeviceDescriptor = DeviceDescriptor {
    length: size_of::<DeviceDescriptor>() as u8,
    descriptor_type: DescriptorType::Device,
    bcd_usb: U16::from_bytes(u16::to_le_bytes(0x0110)), // USB 1.1
    device_class: CLASS_VENDOR_SPECIFIC,
    device_subclass: CLASS_VENDOR_SPECIFIC,
    device_protocol: CLASS_VENDOR_SPECIFIC,
    max_packet_size0: 64,
    vendor: U16::from_bytes(u16::to_le_bytes(ID_VENDOR)),
    product: U16::from_bytes(u16::to_le_bytes(ID_PRODUCT)),
    bcd_device: U16::from_bytes(u16::to_le_bytes(BCD_DEVICE)),
    manufacturer_s: 1,
    product_s: 2,
    serial_s: 3,
    num_configurations: 1,
};

pub static CONFIGURATION: ConfigurationBundle = ConfigurationBundle {
    configuration: ConfigurationDescriptor {
        length: size_of::<ConfigurationDescriptor>() as u8,
        descriptor_type: DescriptorType::Configuration,
        total_length: U16::from_bytes(u16::to_le_bytes(
            size_of::<ConfigurationBundle>() as u16,
        )),
        num_interfaces: 1,
        configuration_value: CONFIGURATION_VALUE,
        configuration_s: 4,
        attributes: 0x80, // bus powered, reserved bit per USB 1.1
        max_power: 50,    // 50 * 2 = 100 mA
    },
    interface: InterfaceDescriptor {
        length: size_of::<InterfaceDescriptor>() as u8,
        descriptor_type: DescriptorType::Interface,
        interface_number: INTERFACE_NUMBER,
        alternate_setting: 0,
        num_endpoints: 2,
        interface_class: CLASS_VENDOR_SPECIFIC,
        interface_subclass: CLASS_VENDOR_SPECIFIC,
        interface_protocol: CLASS_VENDOR_SPECIFIC,
        interface_s: 5,
    },
    bulk_in: EndpointDescriptor {
        length: size_of::<EndpointDescriptor>() as u8,
        descriptor_type: DescriptorType::Endpoint,
        endpoint_address: Endpoint::In2.address(),
        attributes: ENDPOINT_TYPE_BULK,
        max_packet_size: U16::from_bytes(u16::to_le_bytes(BULK_MAX_PACKET)),
        interval: 0,
    },
    bulk_out: EndpointDescriptor {
        length: size_of::<EndpointDescriptor>() as u8,
        descriptor_type: DescriptorType::Endpoint,
        endpoint_address: Endpoint::Out2.address(),
        attributes: ENDPOINT_TYPE_BULK,
        max_packet_size: U16::from_bytes(u16::to_le_bytes(BULK_MAX_PACKET)),
        interval: 0,
    },
};

/// Language id list: US English only.
pub static LANGUAGES: &[u8] = &[4, DescriptorType::String as u8, 0x09, 0x04];

static STR_MANUFACTURER: [u8; 18] = string_descriptor("ezusb-rs");
static STR_PRODUCT: [u8; 32] = string_descriptor("EZ-USB Firmware");
static STR_SERIAL: [u8; 14] = string_descriptor("000001");
static STR_CONFIGURATION: [u8; 16] = string_descriptor("Default");
static STR_INTERFACE: [u8; 16] = string_descriptor("Command");

/// String descriptor table, indexed 1-based from GET_DESCRIPTOR requests.
pub static STRINGS: [&[u8]; 5] = [
    &STR_MANUFACTURER,
    &STR_PRODUCT,
    &STR_SERIAL,
    &STR_CONFIGURATION,
    &STR_INTERFACE,
];

/// The descriptor tables served by a [`super::ControlPipe`].
pub struct DescriptorSet {
    pub device: &'static DeviceDescriptor,
    pub configuration: &'static ConfigurationBundle,
    pub languages: &'static [u8],
    pub strings: &'static [&'static [u8]],
}

impl DescriptorSet {
    pub fn device_bytes(&self) -> &'static [u8] {
        self.device.as_bytes()
    }

    pub fn configuration_bytes(&self) -> &'static [u8] {
        self.configuration.as_bytes()
    }
}

/// The descriptor set for the standard device identity of this firmware.
pub static DESCRIPTORS: DescriptorSet = DescriptorSet {
    device: &DEVICE,
    configuration: &CONFIGURATION,
    languages: LANGUAGES,
    strings: &STRINGS,
};
