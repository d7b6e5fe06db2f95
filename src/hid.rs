//! HID class: report, idle-rate and protocol requests, HID descriptor
//! serving, and the out-of-band bootloader entry sequence.

use heapless::Vec;

use crate::class_prelude::*;
use crate::control::{Recipient, Request, RequestType};

/// bInterfaceClass for HID.
const USB_CLASS_HID: u8 = 0x03;

/// HID descriptor types served through interface-level GET_DESCRIPTOR.
pub mod hid_descriptor_type {
    /// HID descriptor
    pub const HID: u8 = 0x21;
    /// HID report descriptor
    pub const REPORT: u8 = 0x22;
    /// HID physical descriptor
    pub const PHYSICAL: u8 = 0x23;
}

// Class requests, HID 1.11 section 7.2
mod hid_request {
    pub const GET_REPORT: u8 = 0x01;
    pub const GET_IDLE: u8 = 0x02;
    pub const GET_PROTOCOL: u8 = 0x03;
    pub const SET_REPORT: u8 = 0x09;
    pub const SET_IDLE: u8 = 0x0a;
    pub const SET_PROTOCOL: u8 = 0x0b;
}

// Report types in the wValue high byte of GET/SET_REPORT
mod report_type {
    pub const INPUT: u8 = 1;
    pub const OUTPUT: u8 = 2;
    pub const FEATURE: u8 = 3;
}

/// Feature report payload that arms the jump to the bootloader. The sequence
/// is the device's out-of-band firmware update trigger and must match
/// byte for byte.
const BOOTLOADER_KEY: [u8; 4] = [0x55, 0xaa, 0x55, 0xaa];

/// Largest report the class stores.
const MAX_REPORT_LEN: usize = 64;

/// Active HID protocol.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HidProtocol {
    /// Simplified boot protocol (keyboards and mice on BIOS-level hosts).
    Boot = 0,
    /// Full report protocol driven by the report descriptor.
    Report = 1,
}

/// A HID class with a single interrupt IN endpoint.
///
/// The report descriptor is supplied by the caller; the class serves it to
/// the host and manages the class-level request state (idle rate, protocol,
/// output/feature reports).
pub struct HidClass<'a, B: UsbBus> {
    interface: InterfaceNumber,
    ep_in: EndpointIn<'a, B>,
    report_descriptor: &'static [u8],
    idle_rate: u8,
    protocol: HidProtocol,
    input_report: Vec<u8, MAX_REPORT_LEN>,
    output_report: Vec<u8, MAX_REPORT_LEN>,
    feature_report: Vec<u8, MAX_REPORT_LEN>,
    bootloader_requested: bool,
}

impl<'a, B: UsbBus> HidClass<'a, B> {
    /// Creates a new HidClass serving the given report descriptor.
    pub fn new(alloc: &'a UsbBusAllocator<B>, report_descriptor: &'static [u8]) -> HidClass<'a, B> {
        HidClass {
            interface: alloc.interface(),
            ep_in: alloc.interrupt(8, 10),
            report_descriptor,
            idle_rate: 0,
            protocol: HidProtocol::Report,
            input_report: Vec::new(),
            output_report: Vec::new(),
            feature_report: Vec::new(),
            bootloader_requested: false,
        }
    }

    /// Gets the idle rate set by the host, in 4 millisecond units. Zero means
    /// reports are only sent on change.
    pub fn idle_rate(&self) -> u8 {
        self.idle_rate
    }

    /// Gets the currently selected protocol.
    pub fn protocol(&self) -> HidProtocol {
        self.protocol
    }

    /// Gets the latest output report sent by the host (e.g. keyboard LED
    /// state).
    pub fn output_report(&self) -> &[u8] {
        &self.output_report
    }

    /// Gets the latest feature report sent by the host.
    pub fn feature_report(&self) -> &[u8] {
        &self.feature_report
    }

    /// Whether the host has sent the bootloader entry sequence. The
    /// application is expected to detach from the bus and reset into the
    /// bootloader when this returns true.
    pub fn bootloader_requested(&self) -> bool {
        self.bootloader_requested
    }

    /// Stores `data` as the current input report, served to the host on
    /// GET_REPORT(Input), and writes it to the interrupt endpoint.
    pub fn push_input(&mut self, data: &[u8]) -> Result<usize> {
        self.input_report.clear();
        self.input_report
            .extend_from_slice(data)
            .map_err(|_| UsbError::BufferOverflow)?;

        self.ep_in.write(data)
    }
}

impl<B: UsbBus> UsbClass<B> for HidClass<'_, B> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        writer.interface(self.interface, USB_CLASS_HID, 0, 0)?;

        let report_len = self.report_descriptor.len() as u16;

        writer.write(
            hid_descriptor_type::HID,
            &[
                0x11,
                0x01, // bcdHID 1.11
                0x00, // bCountryCode
                0x01, // bNumDescriptors
                hid_descriptor_type::REPORT,
                report_len as u8,
                (report_len >> 8) as u8,
            ],
        )?;

        writer.endpoint(&self.ep_in)?;

        Ok(())
    }

    fn reset(&mut self) {
        self.idle_rate = 0;
        self.protocol = HidProtocol::Report;
        self.output_report.clear();
        self.feature_report.clear();
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if req.recipient != Recipient::Interface
            || req.index != u8::from(self.interface) as u16
        {
            return;
        }

        match (req.request_type, req.request) {
            // The HID descriptors hang off the standard GET_DESCRIPTOR
            // request with class-defined descriptor type values.
            (RequestType::Standard, Request::GET_DESCRIPTOR) => {
                let (dtype, _) = req.descriptor_type_index();

                match dtype {
                    hid_descriptor_type::REPORT => {
                        xfer.accept_with_static(self.report_descriptor).ok();
                    }
                    hid_descriptor_type::HID => {
                        let report_len = self.report_descriptor.len() as u16;

                        xfer.accept_with(&[
                            0x09,
                            hid_descriptor_type::HID,
                            0x11,
                            0x01, // bcdHID 1.11
                            0x00, // bCountryCode
                            0x01, // bNumDescriptors
                            hid_descriptor_type::REPORT,
                            report_len as u8,
                            (report_len >> 8) as u8,
                        ])
                        .ok();
                    }
                    _ => {}
                }
            }
            (RequestType::Class, hid_request::GET_REPORT) => {
                let rtype = (req.value >> 8) as u8;

                let report = match rtype {
                    report_type::INPUT => Some(self.input_report.as_slice()),
                    report_type::OUTPUT => Some(self.output_report.as_slice()),
                    report_type::FEATURE => Some(self.feature_report.as_slice()),
                    _ => None,
                };

                match report {
                    Some(data) if !data.is_empty() => {
                        xfer.accept_with(data).ok();
                    }
                    _ => {
                        xfer.reject().ok();
                    }
                }
            }
            (RequestType::Class, hid_request::GET_IDLE) if req.length > 0 => {
                xfer.accept_with(&[self.idle_rate]).ok();
            }
            (RequestType::Class, hid_request::GET_PROTOCOL) => {
                xfer.accept_with(&[self.protocol as u8]).ok();
            }
            _ => {}
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if !(req.request_type == RequestType::Class
            && req.recipient == Recipient::Interface
            && req.index == u8::from(self.interface) as u16)
        {
            return;
        }

        match req.request {
            hid_request::SET_IDLE => {
                // Duration in the high byte, report ID in the low byte. A
                // report ID of zero applies to every input report.
                self.idle_rate = (req.value >> 8) as u8;
                xfer.accept().ok();
            }
            hid_request::SET_PROTOCOL => match req.value {
                0 => {
                    self.protocol = HidProtocol::Boot;
                    xfer.accept().ok();
                }
                1 => {
                    self.protocol = HidProtocol::Report;
                    xfer.accept().ok();
                }
                _ => {
                    xfer.reject().ok();
                }
            },
            hid_request::SET_REPORT => {
                let rtype = (req.value >> 8) as u8;
                let data = xfer.data();

                let store = match rtype {
                    report_type::OUTPUT => &mut self.output_report,
                    report_type::FEATURE => {
                        if data == &BOOTLOADER_KEY[..] {
                            self.bootloader_requested = true;
                            usb_debug!("bootloader jump requested");
                        }

                        &mut self.feature_report
                    }
                    _ => {
                        xfer.reject().ok();
                        return;
                    }
                };

                store.clear();

                if store.extend_from_slice(data).is_err() {
                    xfer.reject().ok();
                    return;
                }

                xfer.accept().ok();
            }
            _ => {
                xfer.reject().ok();
            }
        }
    }
}
