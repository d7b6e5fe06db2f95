//! Host-side driver for the simulated bus: sequences whole control transfers
//! the way a host controller would, and a vendor test class for exercising
//! the data stage engine.

#![allow(dead_code)]

use usbd_ep0::bus::{StringIndex, UsbBus, UsbBusAllocator};
use usbd_ep0::class::{ControlIn, ControlOut, UsbClass};
use usbd_ep0::control::{Recipient, RequestType};
use usbd_ep0::prelude::UsbDevice;
use usbd_ep0::sim::SimShared;

pub const EP0: usize = 0;

// bmRequestType values used by the tests
pub const OUT_STANDARD_DEVICE: u8 = 0x00;
pub const OUT_STANDARD_INTERFACE: u8 = 0x01;
pub const OUT_STANDARD_ENDPOINT: u8 = 0x02;
pub const IN_STANDARD_DEVICE: u8 = 0x80;
pub const IN_STANDARD_INTERFACE: u8 = 0x81;
pub const IN_STANDARD_ENDPOINT: u8 = 0x82;
pub const OUT_CLASS_INTERFACE: u8 = 0x21;
pub const OUT_CLASS_ENDPOINT: u8 = 0x22;
pub const IN_CLASS_INTERFACE: u8 = 0xa1;
pub const OUT_VENDOR_DEVICE: u8 = 0x40;
pub const IN_VENDOR_DEVICE: u8 = 0xc0;

/// The device rejected the transfer; endpoint 0 is stalled.
#[derive(Debug, Eq, PartialEq)]
pub struct Stalled;

/// Outcome of a control read, with per-packet sizes so tests can assert
/// zero-length-packet behavior.
#[derive(Debug, PartialEq)]
pub struct ControlReply {
    pub data: Vec<u8>,
    pub packet_sizes: Vec<usize>,
}

pub fn setup_bytes(bm_request_type: u8, request: u8, value: u16, index: u16, length: u16) -> [u8; 8] {
    [
        bm_request_type,
        request,
        value as u8,
        (value >> 8) as u8,
        index as u8,
        (index >> 8) as u8,
        length as u8,
        (length >> 8) as u8,
    ]
}

/// Polls the device until it reports no more pending events.
pub fn pump<B: UsbBus>(dev: &mut UsbDevice<B>, classes: &mut [&mut dyn UsbClass<B>]) {
    for _ in 0..64 {
        if !dev.poll(classes) {
            return;
        }
    }

    panic!("device did not go idle");
}

/// A host controller for the simulated wire.
pub struct Host<'s> {
    pub shared: &'s SimShared,
    pub max_packet_size_0: usize,
}

impl<'s> Host<'s> {
    pub fn new(shared: &'s SimShared) -> Host<'s> {
        Host {
            shared,
            max_packet_size_0: 64,
        }
    }

    /// Performs a whole control IN transfer: SETUP, data stage, status
    /// stage. Returns the data and the individual data stage packet sizes.
    pub fn control_read<B: UsbBus>(
        &self,
        dev: &mut UsbDevice<B>,
        classes: &mut [&mut dyn UsbClass<B>],
        bm_request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        length: u16,
    ) -> Result<ControlReply, Stalled> {
        assert!(bm_request_type & 0x80 != 0, "control_read wants an IN request");

        self.shared
            .host_setup(setup_bytes(bm_request_type, request, value, index, length));
        pump(dev, classes);

        let mut data = Vec::new();
        let mut packet_sizes = Vec::new();

        loop {
            if self.shared.control_stalled() {
                return Err(Stalled);
            }

            let packet = match self.shared.host_read_in(EP0) {
                Some(packet) => packet,
                None => panic!("device produced no IN data and no stall"),
            };

            packet_sizes.push(packet.len());
            data.extend_from_slice(&packet);
            pump(dev, classes);

            // The transfer is complete on a short packet or once the
            // requested length has arrived.
            if packet.len() < self.max_packet_size_0 || data.len() >= length as usize {
                break;
            }
        }

        // Status stage: zero-length OUT packet
        assert!(self.shared.host_out(EP0, &[]));
        pump(dev, classes);

        Ok(ControlReply { data, packet_sizes })
    }

    /// Performs a whole control OUT transfer: SETUP, data stage (if any),
    /// status stage.
    pub fn control_write<B: UsbBus>(
        &self,
        dev: &mut UsbDevice<B>,
        classes: &mut [&mut dyn UsbClass<B>],
        bm_request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
    ) -> Result<(), Stalled> {
        assert!(bm_request_type & 0x80 == 0, "control_write wants an OUT request");

        self.shared.host_setup(setup_bytes(
            bm_request_type,
            request,
            value,
            index,
            data.len() as u16,
        ));
        pump(dev, classes);

        for chunk in data.chunks(self.max_packet_size_0) {
            if self.shared.control_stalled() {
                return Err(Stalled);
            }

            assert!(self.shared.host_out(EP0, chunk));
            pump(dev, classes);
        }

        if self.shared.control_stalled() {
            return Err(Stalled);
        }

        // Status stage: the device answers with a zero-length IN packet.
        match self.shared.host_read_in(EP0) {
            Some(packet) => assert_eq!(packet.len(), 0, "status packet must be empty"),
            None => return Err(Stalled),
        }
        pump(dev, classes);

        Ok(())
    }
}

pub const VID: u16 = 0x16c0;
pub const PID: u16 = 0x05dc;
pub const MANUFACTURER: &str = "TestClass Manufacturer";
pub const PRODUCT: &str = "TestClass Product";
pub const SERIAL_NUMBER: &str = "TestClass Serial";
pub const CUSTOM_STRING: &str = "TestClass Custom String";

pub const REQ_STORE_REQUEST: u8 = 1;
pub const REQ_READ_BUFFER: u8 = 2;
pub const REQ_WRITE_BUFFER: u8 = 3;
pub const REQ_SET_VALUE: u8 = 4;
pub const REQ_GET_VALUE: u8 = 5;
pub const REQ_READ_STATIC: u8 = 6;
pub const REQ_UNKNOWN: u8 = 42;

/// A flash-resident blob served through the static buffer path. 96 bytes:
/// an exact multiple of a 32 byte packet but not of a 64 byte one.
pub static STATIC_BLOB: [u8; 96] = {
    let mut buf = [0u8; 96];
    let mut i = 0;
    while i < 96 {
        buf[i] = (i as u8) ^ 0x5a;
        i += 1;
    }
    buf
};

/// Test class speaking vendor requests against the device recipient.
pub struct VendorClass {
    custom_string: StringIndex,
    buffer: [u8; 128],
    len: usize,
    value: u16,
}

impl VendorClass {
    pub fn new<B: UsbBus>(alloc: &UsbBusAllocator<B>) -> VendorClass {
        VendorClass {
            custom_string: alloc.string(),
            buffer: [0; 128],
            len: 0,
            value: 0,
        }
    }
}

impl<B: UsbBus> UsbClass<B> for VendorClass {
    fn get_string(&self, index: StringIndex, lang_id: u16) -> Option<&str> {
        if index == self.custom_string && lang_id == usbd_ep0::descriptor::lang_id::ENGLISH_US {
            Some(CUSTOM_STRING)
        } else {
            None
        }
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if !(req.request_type == RequestType::Vendor && req.recipient == Recipient::Device) {
            return;
        }

        match req.request {
            REQ_READ_BUFFER => {
                xfer.accept_with(&self.buffer[..self.len]).ok();
            }
            REQ_GET_VALUE => {
                xfer.accept_with(&self.value.to_le_bytes()).ok();
            }
            REQ_READ_STATIC => {
                xfer.accept_with_static(&STATIC_BLOB).ok();
            }
            _ => {}
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if !(req.request_type == RequestType::Vendor && req.recipient == Recipient::Device) {
            return;
        }

        match req.request {
            REQ_STORE_REQUEST => {
                self.buffer[0] =
                    (req.direction as u8) | (req.request_type as u8) << 5 | (req.recipient as u8);
                self.buffer[1] = req.request;
                self.buffer[2..4].copy_from_slice(&req.value.to_le_bytes());
                self.buffer[4..6].copy_from_slice(&req.index.to_le_bytes());
                self.buffer[6..8].copy_from_slice(&req.length.to_le_bytes());
                self.len = 8;

                xfer.accept().ok();
            }
            REQ_WRITE_BUFFER if xfer.data().len() <= self.buffer.len() => {
                let data = xfer.data();

                self.buffer[..data.len()].copy_from_slice(data);
                self.len = data.len();

                xfer.accept().ok();
            }
            REQ_SET_VALUE => {
                self.value = req.value;
                xfer.accept().ok();
            }
            _ => {}
        }
    }
}
