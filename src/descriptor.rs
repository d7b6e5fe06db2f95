//! Descriptor composition.

use crate::bus::{InterfaceNumber, UsbBus};
use crate::device;
use crate::device::Config;
use crate::endpoint::{Endpoint, EndpointDirection};
use crate::{Result, UsbError};

/// Standard descriptor types
pub mod descriptor_type {
    /// Device descriptor
    pub const DEVICE: u8 = 1;
    /// Configuration descriptor
    pub const CONFIGURATION: u8 = 2;
    /// String descriptor
    pub const STRING: u8 = 3;
    /// Interface descriptor
    pub const INTERFACE: u8 = 4;
    /// Endpoint descriptor
    pub const ENDPOINT: u8 = 5;
    /// Class-specific interface descriptor (CS_INTERFACE)
    pub const CS_INTERFACE: u8 = 0x24;
    /// Class-specific endpoint descriptor (CS_ENDPOINT)
    pub const CS_ENDPOINT: u8 = 0x25;
}

/// String descriptor language IDs.
pub mod lang_id {
    /// English (US)
    ///
    /// Recommended for use as the first language ID for compatibility.
    pub const ENGLISH_US: u16 = 0x0409;
}

/// A writer for USB descriptors.
pub struct DescriptorWriter<'a> {
    buf: &'a mut [u8],
    position: usize,
    num_interfaces_mark: Option<usize>,
    num_endpoints_mark: Option<usize>,
}

impl DescriptorWriter<'_> {
    pub(crate) fn new(buf: &mut [u8]) -> DescriptorWriter<'_> {
        DescriptorWriter {
            buf,
            position: 0,
            num_interfaces_mark: None,
            num_endpoints_mark: None,
        }
    }

    /// Gets the current position in the buffer, i.e. the number of bytes
    /// written so far.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Writes an arbitrary (usually class-specific) descriptor. The length
    /// and type bytes are prepended automatically.
    pub fn write(&mut self, descriptor_type: u8, descriptor: &[u8]) -> Result<()> {
        let length = descriptor.len();

        if (self.position + 2 + length) > self.buf.len() || (length + 2) > 255 {
            return Err(UsbError::BufferOverflow);
        }

        self.buf[self.position] = (length + 2) as u8;
        self.buf[self.position + 1] = descriptor_type;

        let start = self.position + 2;

        self.buf[start..start + length].copy_from_slice(descriptor);

        self.position = start + length;

        Ok(())
    }

    pub(crate) fn device(&mut self, config: &Config) -> Result<()> {
        self.write(
            descriptor_type::DEVICE,
            &[
                0x00,
                0x02, // bcdUSB 2.00
                config.device_class,
                config.device_sub_class,
                config.device_protocol,
                config.max_packet_size_0,
                config.vendor_id as u8,
                (config.vendor_id >> 8) as u8,
                config.product_id as u8,
                (config.product_id >> 8) as u8,
                config.device_release as u8,
                (config.device_release >> 8) as u8,
                if config.manufacturer.is_some() { 1 } else { 0 }, // iManufacturer
                if config.product.is_some() { 2 } else { 0 },      // iProduct
                if config.serial_number.is_some() { 3 } else { 0 }, // iSerialNumber
                1, // bNumConfigurations
            ],
        )
    }

    pub(crate) fn configuration(&mut self, config: &Config) -> Result<()> {
        self.num_interfaces_mark = Some(self.position + 4);

        self.write(
            descriptor_type::CONFIGURATION,
            &[
                0,
                0, // wTotalLength, filled in by end_configuration
                0, // bNumInterfaces, filled in by interface
                device::CONFIGURATION_VALUE,
                0, // iConfiguration
                // bmAttributes:
                0x80 | if config.self_powered { 0x40 } else { 0x00 }
                    | if config.supports_remote_wakeup { 0x20 } else { 0x00 },
                config.max_power, // bMaxPower
            ],
        )
    }

    pub(crate) fn end_class(&mut self) {
        self.num_endpoints_mark = None;
    }

    pub(crate) fn end_configuration(&mut self) {
        let total_length = self.position as u16;
        self.buf[2..4].copy_from_slice(&total_length.to_le_bytes());
    }

    /// Writes an interface descriptor with the default alternate setting.
    ///
    /// # Arguments
    ///
    /// * `number` - Interface number previously allocated with
    ///   [`UsbBusAllocator::interface`](crate::bus::UsbBusAllocator::interface).
    /// * `interface_class` - Class code assigned by USB.org.
    /// * `interface_sub_class` - Sub-class code. Depends on class.
    /// * `interface_protocol` - Protocol code. Depends on class and
    ///   sub-class.
    pub fn interface(
        &mut self,
        number: InterfaceNumber,
        interface_class: u8,
        interface_sub_class: u8,
        interface_protocol: u8,
    ) -> Result<()> {
        self.interface_alt(
            number,
            device::DEFAULT_ALTERNATE_SETTING,
            interface_class,
            interface_sub_class,
            interface_protocol,
        )
    }

    /// Writes an interface descriptor for an alternate setting. The default
    /// setting descriptor must be written first.
    pub fn interface_alt(
        &mut self,
        number: InterfaceNumber,
        alternate_setting: u8,
        interface_class: u8,
        interface_sub_class: u8,
        interface_protocol: u8,
    ) -> Result<()> {
        if alternate_setting == device::DEFAULT_ALTERNATE_SETTING {
            match self.num_interfaces_mark {
                Some(mark) => self.buf[mark] += 1,
                None => return Err(UsbError::InvalidState),
            };
        }

        self.num_endpoints_mark = Some(self.position + 4);

        self.write(
            descriptor_type::INTERFACE,
            &[
                number.into(),
                alternate_setting,
                0, // bNumEndpoints, filled in by endpoint
                interface_class,
                interface_sub_class,
                interface_protocol,
                0, // iInterface
            ],
        )
    }

    /// Writes an endpoint descriptor. The corresponding interface descriptor
    /// must be written first.
    pub fn endpoint<B: UsbBus, D: EndpointDirection>(
        &mut self,
        endpoint: &Endpoint<'_, B, D>,
    ) -> Result<()> {
        match self.num_endpoints_mark {
            Some(mark) => self.buf[mark] += 1,
            None => return Err(UsbError::InvalidState),
        };

        let mps = endpoint.max_packet_size();

        self.write(
            descriptor_type::ENDPOINT,
            &[
                endpoint.address().into(),
                endpoint.ep_type() as u8,
                mps as u8,
                (mps >> 8) as u8,
                endpoint.interval(),
            ],
        )
    }

    /// Writes a string descriptor. The string is encoded as UTF-16LE as the
    /// wire format requires.
    pub fn string(&mut self, string: &str) -> Result<()> {
        let mut pos = self.position;

        if pos + 2 > self.buf.len() {
            return Err(UsbError::BufferOverflow);
        }

        self.buf[pos] = 0; // length is filled in once known
        self.buf[pos + 1] = descriptor_type::STRING;
        pos += 2;

        for cp in string.encode_utf16() {
            if pos + 2 > self.buf.len() {
                return Err(UsbError::BufferOverflow);
            }

            self.buf[pos..pos + 2].copy_from_slice(&cp.to_le_bytes());
            pos += 2;
        }

        self.buf[self.position] = (pos - self.position) as u8;
        self.position = pos;

        Ok(())
    }
}
