//! Mass Storage class Bulk-Only Transport: the control plane requests.

use core::mem;

use crate::class_prelude::*;
use crate::control::{Recipient, RequestType};

/// bInterfaceClass for mass storage.
const USB_CLASS_MSC: u8 = 0x08;
/// SCSI transparent command set.
const MSC_SUB_CLASS_SCSI: u8 = 0x06;
/// Bulk-Only Transport.
const MSC_PROTOCOL_BOT: u8 = 0x50;

// Class requests, Bulk-Only Transport section 3
const REQ_MASS_STORAGE_RESET: u8 = 0xff;
const REQ_GET_MAX_LUN: u8 = 0xfe;

/// A Mass Storage Bulk-Only Transport class.
///
/// The class handles the control plane of the transport: GET_MAX_LUN and
/// Bulk-Only Mass Storage Reset. The SCSI command traffic on the bulk
/// endpoints is left to the application.
pub struct MscClass<'a, B: UsbBus> {
    interface: InterfaceNumber,
    bulk_in: EndpointIn<'a, B>,
    bulk_out: EndpointOut<'a, B>,
    lun_count: u8,
    reset_requested: bool,
}

impl<'a, B: UsbBus> MscClass<'a, B> {
    /// Creates a new mass storage class. `lun_count` is the number of
    /// logical units behind the interface.
    ///
    /// # Panics
    ///
    /// Panics if `lun_count` is zero, as the transport requires at least one
    /// logical unit.
    pub fn new(
        alloc: &'a UsbBusAllocator<B>,
        max_packet_size: u16,
        lun_count: u8,
    ) -> MscClass<'a, B> {
        assert!(lun_count >= 1, "mass storage requires at least one LUN");

        MscClass {
            interface: alloc.interface(),
            bulk_in: alloc.bulk(max_packet_size),
            bulk_out: alloc.bulk(max_packet_size),
            lun_count,
            reset_requested: false,
        }
    }

    /// The highest logical unit number, i.e. `lun_count - 1`.
    pub fn max_lun(&self) -> u8 {
        self.lun_count - 1
    }

    /// Returns whether a Bulk-Only Mass Storage Reset has arrived since the
    /// last call, clearing the flag. The application must abandon any
    /// in-progress command/data/status protocol state when this returns
    /// true.
    pub fn take_reset(&mut self) -> bool {
        mem::replace(&mut self.reset_requested, false)
    }

    /// Writes a single packet into the bulk IN endpoint.
    pub fn write_packet(&self, data: &[u8]) -> Result<usize> {
        self.bulk_in.write(data)
    }

    /// Reads a single packet from the bulk OUT endpoint.
    pub fn read_packet(&self, data: &mut [u8]) -> Result<usize> {
        self.bulk_out.read(data)
    }
}

impl<B: UsbBus> UsbClass<B> for MscClass<'_, B> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        writer.interface(
            self.interface,
            USB_CLASS_MSC,
            MSC_SUB_CLASS_SCSI,
            MSC_PROTOCOL_BOT,
        )?;

        writer.endpoint(&self.bulk_in)?;
        writer.endpoint(&self.bulk_out)?;

        Ok(())
    }

    fn reset(&mut self) {
        self.reset_requested = false;
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if !(req.request_type == RequestType::Class
            && req.recipient == Recipient::Interface
            && req.index == u8::from(self.interface) as u16)
        {
            return;
        }

        match req.request {
            // The transport requires wValue to be zero and the data stage to
            // be exactly one byte. A violation is left unclaimed so that it
            // ends in a STALL, which is the error report the transport
            // defines.
            REQ_GET_MAX_LUN if req.value == 0 && req.length == 1 => {
                xfer.accept_with(&[self.lun_count - 1]).ok();
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
            REQ_MASS_STORAGE_RESET if req.value == 0 && req.length == 0 => {
                self.reset_requested = true;
                usb_debug!("bulk-only mass storage reset");
                xfer.accept().ok();
            }
            _ => {}
        }
    }
}
