//! CDC-ACM class: a virtual serial port with line coding and control line
//! state handling.

use core::convert::TryFrom;

use num_enum::TryFromPrimitive;

use crate::class_prelude::*;
use crate::control::{Recipient, RequestType};

/// bInterfaceClass for the communications interface.
const USB_CLASS_CDC: u8 = 0x02;
/// bInterfaceClass for the data interface.
const USB_CLASS_CDC_DATA: u8 = 0x0a;

const CDC_SUB_CLASS_ACM: u8 = 0x02;
const CDC_PROTOCOL_NONE: u8 = 0x00;

// Functional descriptor subtypes
const CDC_TYPE_HEADER: u8 = 0x00;
const CDC_TYPE_CALL_MANAGEMENT: u8 = 0x01;
const CDC_TYPE_ACM: u8 = 0x02;
const CDC_TYPE_UNION: u8 = 0x06;

// Class requests, CDC 1.1 section 6.2
const REQ_SET_LINE_CODING: u8 = 0x20;
const REQ_GET_LINE_CODING: u8 = 0x21;
const REQ_SET_CONTROL_LINE_STATE: u8 = 0x22;

/// Number of stop bits for [`LineCoding`].
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// 1 stop bit
    One = 0,
    /// 1.5 stop bits
    OnePointFive = 1,
    /// 2 stop bits
    Two = 2,
}

/// Parity for [`LineCoding`].
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParityType {
    /// No parity bit.
    None = 0,
    /// Parity bit is 1 if the amount of ones in the data bits is odd.
    Odd = 1,
    /// Parity bit is 1 if the amount of ones in the data bits is even.
    Even = 2,
    /// Parity bit is always 1.
    Mark = 3,
    /// Parity bit is always 0.
    Space = 4,
}

/// Line coding parameters for the virtual serial port: the 7 byte structure
/// carried by the GET/SET_LINE_CODING requests.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineCoding {
    data_rate: u32,
    stop_bits: StopBits,
    parity_type: ParityType,
    data_bits: u8,
}

impl LineCoding {
    /// Gets the number of stop bits for UART communication.
    pub fn stop_bits(&self) -> StopBits {
        self.stop_bits
    }

    /// Gets the number of data bits for UART communication.
    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }

    /// Gets the parity type for UART communication.
    pub fn parity_type(&self) -> ParityType {
        self.parity_type
    }

    /// Gets the data rate in bits per second for UART communication.
    pub fn data_rate(&self) -> u32 {
        self.data_rate
    }

    fn parse(buf: &[u8]) -> Result<LineCoding> {
        if buf.len() < 7 {
            return Err(UsbError::ParseError);
        }

        Ok(LineCoding {
            data_rate: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            stop_bits: StopBits::try_from(buf[4]).map_err(|_| UsbError::ParseError)?,
            parity_type: ParityType::try_from(buf[5]).map_err(|_| UsbError::ParseError)?,
            data_bits: buf[6],
        })
    }

    fn encode(&self, buf: &mut [u8; 7]) {
        buf[0..4].copy_from_slice(&self.data_rate.to_le_bytes());
        buf[4] = self.stop_bits as u8;
        buf[5] = self.parity_type as u8;
        buf[6] = self.data_bits;
    }
}

impl Default for LineCoding {
    fn default() -> LineCoding {
        LineCoding {
            data_rate: 9600,
            stop_bits: StopBits::One,
            parity_type: ParityType::None,
            data_bits: 8,
        }
    }
}

/// A CDC-ACM serial port class.
///
/// The class handles the control plane only: line coding and control line
/// state. Serial payload moves through [`read_packet`](CdcAcmClass::read_packet)
/// and [`write_packet`](CdcAcmClass::write_packet).
pub struct CdcAcmClass<'a, B: UsbBus> {
    comm_if: InterfaceNumber,
    comm_ep: EndpointIn<'a, B>,
    data_if: InterfaceNumber,
    read_ep: EndpointOut<'a, B>,
    write_ep: EndpointIn<'a, B>,
    line_coding: LineCoding,
    dtr: bool,
    rts: bool,
}

impl<'a, B: UsbBus> CdcAcmClass<'a, B> {
    /// Creates a new CdcAcmClass with the provided UsbBusAllocator and
    /// `max_packet_size` in bytes. For full-speed devices, `max_packet_size`
    /// has to be one of 8, 16, 32 or 64.
    pub fn new(alloc: &'a UsbBusAllocator<B>, max_packet_size: u16) -> CdcAcmClass<'a, B> {
        CdcAcmClass {
            comm_if: alloc.interface(),
            comm_ep: alloc.interrupt(8, 255),
            data_if: alloc.interface(),
            read_ep: alloc.bulk(max_packet_size),
            write_ep: alloc.bulk(max_packet_size),
            line_coding: LineCoding::default(),
            dtr: false,
            rts: false,
        }
    }

    /// Gets the maximum packet size in bytes.
    pub fn max_packet_size(&self) -> u16 {
        self.read_ep.max_packet_size()
    }

    /// Gets the current line coding. The line coding contains the baud rate
    /// the host has most recently requested; applying it to the actual UART
    /// is up to the caller.
    pub fn line_coding(&self) -> &LineCoding {
        &self.line_coding
    }

    /// Gets the DTR (data terminal ready) state.
    pub fn dtr(&self) -> bool {
        self.dtr
    }

    /// Gets the RTS (request to send) state.
    pub fn rts(&self) -> bool {
        self.rts
    }

    /// Writes a single packet into the IN endpoint.
    pub fn write_packet(&self, data: &[u8]) -> Result<usize> {
        self.write_ep.write(data)
    }

    /// Reads a single packet from the OUT endpoint.
    pub fn read_packet(&self, data: &mut [u8]) -> Result<usize> {
        self.read_ep.read(data)
    }
}

impl<B: UsbBus> UsbClass<B> for CdcAcmClass<'_, B> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        use crate::descriptor::descriptor_type::CS_INTERFACE;

        writer.interface(self.comm_if, USB_CLASS_CDC, CDC_SUB_CLASS_ACM, CDC_PROTOCOL_NONE)?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_HEADER,
                0x10,
                0x01, // bcdCDC 1.10
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_ACM,
                0x02, // bmCapabilities: line coding and serial state
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_UNION,
                self.comm_if.into(), // bControlInterface
                self.data_if.into(), // bSubordinateInterface
            ],
        )?;

        writer.write(
            CS_INTERFACE,
            &[
                CDC_TYPE_CALL_MANAGEMENT,
                0x00,                // bmCapabilities
                self.data_if.into(), // bDataInterface
            ],
        )?;

        writer.endpoint(&self.comm_ep)?;

        writer.interface(self.data_if, USB_CLASS_CDC_DATA, 0x00, 0x00)?;

        writer.endpoint(&self.write_ep)?;
        writer.endpoint(&self.read_ep)?;

        Ok(())
    }

    fn reset(&mut self) {
        self.line_coding = LineCoding::default();
        self.dtr = false;
        self.rts = false;
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if !(req.request_type == RequestType::Class
            && req.recipient == Recipient::Interface
            && req.index == u8::from(self.comm_if) as u16)
        {
            return;
        }

        match req.request {
            REQ_GET_LINE_CODING if req.length == 7 => {
                let mut buf = [0; 7];
                self.line_coding.encode(&mut buf);
                xfer.accept_with(&buf).ok();
            }
            _ => {
                xfer.reject().ok();
            }
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if !(req.request_type == RequestType::Class
            && req.recipient == Recipient::Interface
            && req.index == u8::from(self.comm_if) as u16)
        {
            return;
        }

        match req.request {
            REQ_SET_LINE_CODING if req.length >= 7 => match LineCoding::parse(xfer.data()) {
                Ok(coding) => {
                    // The new coding takes effect before the status stage is
                    // acknowledged.
                    self.line_coding = coding;
                    usb_debug!("line coding set");
                    xfer.accept().ok();
                }
                Err(_) => {
                    xfer.reject().ok();
                }
            },
            REQ_SET_CONTROL_LINE_STATE => {
                self.dtr = (req.value & 0x0001) != 0;
                self.rts = (req.value & 0x0002) != 0;
                xfer.accept().ok();
            }
            _ => {
                xfer.reject().ok();
            }
        }
    }
}
