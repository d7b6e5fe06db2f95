//! USB control transfers and the SETUP packet.

use core::convert::TryFrom;

use num_enum::TryFromPrimitive;

use crate::{Result, UsbDirection, UsbError};

/// Control request type.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestType {
    /// Request is a USB standard request. Usually handled by
    /// [`UsbDevice`](crate::prelude::UsbDevice).
    Standard = 0,
    /// Request is intended for a USB class.
    Class = 1,
    /// Request is vendor-specific.
    Vendor = 2,
    /// Reserved.
    Reserved = 3,
}

/// Control request recipient.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Recipient {
    /// Request is intended for the entire device.
    Device = 0,
    /// Request is intended for an interface. Generally, the `index` field of
    /// the request specifies the interface number.
    Interface = 1,
    /// Request is intended for an endpoint. Generally, the `index` field of
    /// the request specifies the endpoint address.
    Endpoint = 2,
    /// None of the above.
    Other = 3,
    /// Reserved.
    Reserved = 4,
}

/// A control request read from a SETUP packet.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Request {
    /// Direction of the request.
    pub direction: UsbDirection,
    /// Type of the request.
    pub request_type: RequestType,
    /// Recipient of the request.
    pub recipient: Recipient,
    /// Request code. The meaning of the value depends on the previous fields.
    pub request: u8,
    /// Request value. The meaning of the value depends on the previous fields.
    pub value: u16,
    /// Request index. The meaning of the value depends on the previous fields.
    pub index: u16,
    /// Length of the DATA stage. For control OUT transfers this is the exact
    /// length of the data the host sent. For control IN transfers this is the
    /// maximum length of data the device should return.
    pub length: u16,
}

impl Request {
    /// Standard USB GET_STATUS request.
    pub const GET_STATUS: u8 = 0;
    /// Standard USB CLEAR_FEATURE request.
    pub const CLEAR_FEATURE: u8 = 1;
    /// Standard USB SET_FEATURE request.
    pub const SET_FEATURE: u8 = 3;
    /// Standard USB SET_ADDRESS request.
    pub const SET_ADDRESS: u8 = 5;
    /// Standard USB GET_DESCRIPTOR request.
    pub const GET_DESCRIPTOR: u8 = 6;
    /// Standard USB SET_DESCRIPTOR request.
    pub const SET_DESCRIPTOR: u8 = 7;
    /// Standard USB GET_CONFIGURATION request.
    pub const GET_CONFIGURATION: u8 = 8;
    /// Standard USB SET_CONFIGURATION request.
    pub const SET_CONFIGURATION: u8 = 9;
    /// Standard USB GET_INTERFACE request.
    pub const GET_INTERFACE: u8 = 10;
    /// Standard USB SET_INTERFACE request.
    pub const SET_INTERFACE: u8 = 11;
    /// Standard USB SYNCH_FRAME request.
    pub const SYNCH_FRAME: u8 = 12;

    /// Standard feature selector for endpoint halt.
    pub const FEATURE_ENDPOINT_HALT: u16 = 0;
    /// Standard feature selector for device remote wakeup.
    pub const FEATURE_DEVICE_REMOTE_WAKEUP: u16 = 1;

    /// Parses the eight bytes of a SETUP packet. Multi-byte fields arrive
    /// LSB-first on the wire and are composed accordingly.
    pub(crate) fn parse(buf: &[u8]) -> Result<Request> {
        if buf.len() != 8 {
            return Err(UsbError::ParseError);
        }

        let rt = buf[0];

        Ok(Request {
            direction: UsbDirection::from(rt),
            request_type: RequestType::try_from((rt >> 5) & 0b11)
                .map_err(|_| UsbError::ParseError)?,
            recipient: Recipient::try_from(rt & 0b11111).unwrap_or(Recipient::Reserved),
            request: buf[1],
            value: u16::from(buf[2]) | (u16::from(buf[3]) << 8),
            index: u16::from(buf[4]) | (u16::from(buf[5]) << 8),
            length: u16::from(buf[6]) | (u16::from(buf[7]) << 8),
        })
    }

    /// Gets the descriptor type and index from the value field of a
    /// GET_DESCRIPTOR request.
    pub fn descriptor_type_index(&self) -> (u8, u8) {
        ((self.value >> 8) as u8, self.value as u8)
    }
}
