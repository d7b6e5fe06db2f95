//! The [`UsbClass`] trait and the control transfer handles passed to it.

use crate::bus::{InterfaceNumber, StringIndex, UsbBus};
use crate::control::Request;
use crate::control_pipe::ControlPipe;
use crate::descriptor::DescriptorWriter;
use crate::endpoint::EndpointAddress;
use crate::{Result, UsbError};

/// A USB class implementation. All methods have a default implementation, so
/// classes only implement the events they care about.
pub trait UsbClass<B: UsbBus> {
    /// Called when a GET_DESCRIPTOR request is received for a configuration
    /// descriptor. When called, the implementation should write its interface
    /// descriptors and class-specific descriptors into `writer`. The
    /// configuration descriptor itself will be written by
    /// [`UsbDevice`](crate::prelude::UsbDevice) and shouldn't be written by
    /// classes.
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        let _ = writer;
        Ok(())
    }

    /// Gets a class-specific string descriptor.
    ///
    /// Note: All string descriptor requests are passed to all classes in
    /// turn, so implementations should return [`None`] if an unknown index is
    /// requested.
    ///
    /// # Arguments
    ///
    /// * `index` - A string index allocated earlier with
    ///   [`UsbBusAllocator`](crate::bus::UsbBusAllocator).
    /// * `lang_id` - The language ID for the string to retrieve.
    fn get_string(&self, index: StringIndex, lang_id: u16) -> Option<&str> {
        let _ = (index, lang_id);
        None
    }

    /// Called after a USB reset after the bus reset sequence is complete.
    fn reset(&mut self) {}

    /// Called when the host has set the active configuration. Classes with
    /// data endpoints re-initialize their streaming state here; this is the
    /// point from which class traffic may flow.
    fn configured(&mut self) {}

    /// Gets the current alternate setting of `interface`, or `None` if the
    /// interface does not belong to this class.
    fn get_alt_setting(&mut self, interface: InterfaceNumber) -> Option<u8> {
        let _ = interface;
        None
    }

    /// Activates `alt_setting` on `interface`. Returns true if the interface
    /// belongs to this class and supports the setting.
    fn set_alt_setting(&mut self, interface: InterfaceNumber, alt_setting: u8) -> bool {
        let _ = (interface, alt_setting);
        false
    }

    /// Called when a control request is received with direction HostToDevice.
    ///
    /// All requests are passed to classes in turn, which can choose to
    /// accept, ignore or report an error. Classes can even choose to override
    /// a standard request, but doing that is rarely necessary.
    ///
    /// See [`ControlOut`] for how to respond to the transfer.
    fn control_out(&mut self, xfer: ControlOut<B>) {
        let _ = xfer;
    }

    /// Called when a control request is received with direction DeviceToHost.
    ///
    /// All requests are passed to classes in turn, which can choose to
    /// accept, ignore or report an error. Classes can even choose to override
    /// a standard request, but doing that is rarely necessary.
    ///
    /// See [`ControlIn`] for how to respond to the transfer.
    fn control_in(&mut self, xfer: ControlIn<B>) {
        let _ = xfer;
    }

    /// Called when endpoint with address `addr` has received data (OUT
    /// packet).
    fn endpoint_out(&mut self, addr: EndpointAddress) {
        let _ = addr;
    }

    /// Called when endpoint with address `addr` has completed transmitting a
    /// packet (IN packet).
    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        let _ = addr;
    }

    /// Called whenever the device is polled, after any endpoint events have
    /// been dispatched.
    fn poll(&mut self) {}
}

/// Handle for a control IN transfer. When implementing a class, use the
/// methods of this object to respond to the transfer with either data or an
/// error (STALL condition). To ignore the request and pass it on to the next
/// class, simply don't call any method.
pub struct ControlIn<'a, 'p, B: UsbBus> {
    pipe: &'p mut ControlPipe<'a, B>,
    req: Request,
}

impl<'a, 'p, B: UsbBus> ControlIn<'a, 'p, B> {
    pub(crate) fn new(pipe: &'p mut ControlPipe<'a, B>, req: Request) -> Self {
        ControlIn { pipe, req }
    }

    /// Gets the request from the SETUP packet.
    pub fn request(&self) -> &Request {
        &self.req
    }

    /// Accepts the transfer with the supplied buffer.
    pub fn accept_with(self, data: &[u8]) -> Result<()> {
        self.pipe.accept_in(|buf| {
            if data.len() > buf.len() {
                return Err(UsbError::BufferOverflow);
            }

            buf[..data.len()].copy_from_slice(data);

            Ok(data.len())
        })
    }

    /// Accepts the transfer with the supplied static buffer. This method is
    /// useful when you have a large descriptor in flash and don't want to
    /// copy it into the control pipe's buffer.
    pub fn accept_with_static(self, data: &'static [u8]) -> Result<()> {
        self.pipe.accept_in_static(data)
    }

    /// Accepts the transfer with a callback that can write to the internal
    /// buffer of the control pipe. Can be used to avoid an extra copy.
    pub fn accept(self, f: impl FnOnce(&mut [u8]) -> Result<usize>) -> Result<()> {
        self.pipe.accept_in(f)
    }

    /// Rejects the transfer by stalling the pipe.
    pub fn reject(self) -> Result<()> {
        self.pipe.reject()
    }
}

/// Handle for a control OUT transfer. When implementing a class, use the
/// methods of this object to respond to the transfer with an ACK or an error
/// (STALL condition). To ignore the request and pass it on to the next class,
/// simply don't call any method.
pub struct ControlOut<'a, 'p, B: UsbBus> {
    pipe: &'p mut ControlPipe<'a, B>,
    req: Request,
}

impl<'a, 'p, B: UsbBus> ControlOut<'a, 'p, B> {
    pub(crate) fn new(pipe: &'p mut ControlPipe<'a, B>, req: Request) -> Self {
        ControlOut { pipe, req }
    }

    /// Gets the request from the SETUP packet.
    pub fn request(&self) -> &Request {
        &self.req
    }

    /// Gets the data from the data stage of the request. May be empty if
    /// there was no data stage.
    pub fn data(&self) -> &[u8] {
        self.pipe.data()
    }

    /// Accepts the transfer by succesfully responding to the status stage.
    pub fn accept(self) -> Result<()> {
        self.pipe.accept_out()
    }

    /// Rejects the transfer by stalling the pipe.
    pub fn reject(self) -> Result<()> {
        self.pipe.reject()
    }
}
