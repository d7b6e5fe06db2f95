#![no_std]

//! Device-side USB control-endpoint stack for embedded devices.
//!
//! This crate implements the USB device side of control transfers on endpoint
//! 0: SETUP packet decode, the standard chapter 9 enumeration requests, and
//! the data/status stage sequencing, together with class-level request
//! handling for the CDC-ACM, HID, Audio 1.0 and Mass-Storage Bulk-Only
//! classes.
//!
//! Hardware access goes through the [`bus::UsbBus`] trait. The stack never
//! blocks: call [`poll`](prelude::UsbDevice::poll) from your main loop or USB
//! interrupt handler and the state machines advance one event at a time. A
//! software implementation of the bus lives in [`sim`] so that the whole
//! request path can be exercised without hardware.

#[macro_use]
mod macros;

mod control_pipe;
mod device;
mod device_builder;

pub mod audio;
pub mod bus;
pub mod cdc_acm;
pub mod class;
pub mod control;
pub mod descriptor;
pub mod endpoint;
pub mod hid;
pub mod msc;
pub mod sim;

/// Errors returned by the USB stack.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbError {
    /// An operation would block because the hardware is busy or a packet is
    /// not available yet. Try again later.
    WouldBlock,

    /// A malformed packet or payload could not be interpreted.
    ParseError,

    /// Data does not fit in the target buffer or endpoint.
    BufferOverflow,

    /// The hardware has run out of endpoints.
    EndpointOverflow,

    /// The hardware has run out of endpoint buffer memory.
    EndpointMemoryOverflow,

    /// The endpoint address is invalid or already taken.
    InvalidEndpoint,

    /// The operation is not supported by the hardware.
    Unsupported,

    /// The operation is not valid in the current state of the object.
    InvalidState,
}

/// Result type used by the USB stack.
pub type Result<T> = core::result::Result<T, UsbError>;

/// Direction of USB traffic. Note that in the USB standard the direction is
/// always defined from the host's perspective: OUT means host to device, IN
/// means device to host.
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsbDirection {
    /// Host to device (OUT)
    Out = 0x00,
    /// Device to host (IN)
    In = 0x80,
}

impl From<u8> for UsbDirection {
    #[inline]
    fn from(value: u8) -> Self {
        if value & 0x80 != 0 {
            UsbDirection::In
        } else {
            UsbDirection::Out
        }
    }
}

/// Convenience re-exports for application code.
pub mod prelude {
    pub use crate::bus::{UsbBus, UsbBusAllocator};
    pub use crate::device::{UsbDevice, UsbDeviceState};
    pub use crate::device_builder::{UsbDeviceBuilder, UsbVidPid};
    pub use crate::{Result, UsbDirection, UsbError};
}

/// Convenience re-exports for class implementations.
pub mod class_prelude {
    pub use crate::bus::{InterfaceNumber, PollResult, StringIndex, UsbBus, UsbBusAllocator};
    pub use crate::class::{ControlIn, ControlOut, UsbClass};
    pub use crate::control;
    pub use crate::descriptor::DescriptorWriter;
    pub use crate::endpoint::{EndpointAddress, EndpointIn, EndpointOut, EndpointType};
    pub use crate::{Result, UsbDirection, UsbError};
}
