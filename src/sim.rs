//! Software simulation of a USB peripheral, for testing the control state
//! machine and class implementations without hardware.
//!
//! [`SimShared`] holds the simulated wire state and doubles as the host's
//! handle: tests inject SETUP and OUT packets and drain IN packets through
//! it, while the device side runs against the [`SimBus`] handed to
//! [`UsbBusAllocator`].

use core::cell::RefCell;

use heapless::{Deque, Vec};

use crate::bus::{PollResult, UsbBus, UsbBusAllocator};
use crate::endpoint::{EndpointAddress, EndpointType};
use crate::{Result, UsbDirection, UsbError};

/// Largest packet the simulated endpoints carry. Sized to host the largest
/// endpoint the crate allocates — the 192-byte audio isochronous stream.
pub const MAX_PACKET: usize = 192;

/// One packet on the simulated wire.
pub type Packet = Vec<u8, MAX_PACKET>;

const NUM_ENDPOINTS: usize = 16;
const QUEUE_DEPTH: usize = 8;

#[derive(Copy, Clone)]
struct EndpointConfig {
    #[allow(dead_code)]
    ep_type: EndpointType,
    max_packet_size: u16,
}

struct SimState {
    out_config: [Option<EndpointConfig>; NUM_ENDPOINTS],
    in_config: [Option<EndpointConfig>; NUM_ENDPOINTS],
    out_queues: [Deque<Packet, QUEUE_DEPTH>; NUM_ENDPOINTS],
    in_queues: [Deque<Packet, QUEUE_DEPTH>; NUM_ENDPOINTS],
    out_stalled: [bool; NUM_ENDPOINTS],
    in_stalled: [bool; NUM_ENDPOINTS],
    setup: Option<[u8; 8]>,
    in_complete: u16,
    address: u8,
    reset_pending: bool,
    suspend_pending: bool,
    resume_pending: bool,
    enabled: bool,
}

impl SimState {
    fn new() -> SimState {
        SimState {
            out_config: [None; NUM_ENDPOINTS],
            in_config: [None; NUM_ENDPOINTS],
            out_queues: core::array::from_fn(|_| Deque::new()),
            in_queues: core::array::from_fn(|_| Deque::new()),
            out_stalled: [false; NUM_ENDPOINTS],
            in_stalled: [false; NUM_ENDPOINTS],
            setup: None,
            in_complete: 0,
            address: 0,
            reset_pending: false,
            suspend_pending: false,
            resume_pending: false,
            enabled: false,
        }
    }
}

/// The shared wire state of a simulated bus, including the host-side
/// surface.
pub struct SimShared {
    state: RefCell<SimState>,
}

impl SimShared {
    /// Creates a new, empty wire state.
    pub fn new() -> SimShared {
        SimShared {
            state: RefCell::new(SimState::new()),
        }
    }

    /// Queues a SETUP packet on endpoint 0. Mirroring real hardware, a SETUP
    /// clears any stall condition on the control endpoint pair and flushes
    /// packets left over from an earlier transfer.
    pub fn host_setup(&self, packet: [u8; 8]) {
        let mut state = self.state.borrow_mut();

        state.out_stalled[0] = false;
        state.in_stalled[0] = false;
        state.out_queues[0].clear();
        state.in_queues[0].clear();
        state.in_complete &= !1;
        state.setup = Some(packet);
    }

    /// Queues an OUT data (or status) packet for the device. Returns false
    /// if the endpoint buffer is full.
    pub fn host_out(&self, ep: usize, data: &[u8]) -> bool {
        let mut state = self.state.borrow_mut();

        let mut packet = Packet::new();
        if packet.extend_from_slice(data).is_err() {
            return false;
        }

        state.out_queues[ep].push_back(packet).is_ok()
    }

    /// Takes the next IN packet the device has produced, completing its
    /// transmission from the device's point of view.
    pub fn host_read_in(&self, ep: usize) -> Option<Packet> {
        let mut state = self.state.borrow_mut();

        let packet = state.in_queues[ep].pop_front();

        if packet.is_some() {
            state.in_complete |= 1 << ep;
        }

        packet
    }

    /// Whether the control endpoint pair currently signals a STALL.
    pub fn control_stalled(&self) -> bool {
        let state = self.state.borrow();

        state.out_stalled[0] || state.in_stalled[0]
    }

    /// Whether the given endpoint currently signals a STALL.
    pub fn ep_stalled(&self, ep_addr: EndpointAddress) -> bool {
        let state = self.state.borrow();
        let index = ep_addr.number() as usize;

        match ep_addr.direction() {
            UsbDirection::Out => state.out_stalled[index],
            UsbDirection::In => state.in_stalled[index],
        }
    }

    /// The address the device has programmed, 0 until a SET_ADDRESS transfer
    /// completes.
    pub fn address(&self) -> u8 {
        self.state.borrow().address
    }

    /// Signals a bus reset on the next poll.
    pub fn host_reset(&self) {
        self.state.borrow_mut().reset_pending = true;
    }

    /// Signals a suspend condition on the next poll.
    pub fn host_suspend(&self) {
        self.state.borrow_mut().suspend_pending = true;
    }

    /// Signals a resume condition on the next poll.
    pub fn host_resume(&self) {
        self.state.borrow_mut().resume_pending = true;
    }
}

impl Default for SimShared {
    fn default() -> SimShared {
        SimShared::new()
    }
}

/// A [`UsbBus`] backed by [`SimShared`] instead of hardware.
pub struct SimBus<'a> {
    shared: &'a SimShared,
}

impl<'a> SimBus<'a> {
    /// Creates a simulated bus on the given wire state.
    pub fn new(shared: &'a SimShared) -> UsbBusAllocator<SimBus<'a>> {
        UsbBusAllocator::new(SimBus { shared })
    }
}

impl UsbBus for SimBus<'_> {
    fn alloc_ep(
        &mut self,
        ep_dir: UsbDirection,
        ep_addr: Option<EndpointAddress>,
        ep_type: EndpointType,
        max_packet_size: u16,
        _interval: u8,
    ) -> Result<EndpointAddress> {
        if max_packet_size as usize > MAX_PACKET {
            return Err(UsbError::EndpointMemoryOverflow);
        }

        let mut state = self.shared.state.borrow_mut();

        let configs = match ep_dir {
            UsbDirection::Out => &mut state.out_config,
            UsbDirection::In => &mut state.in_config,
        };

        let index = match ep_addr {
            Some(addr) => {
                if addr.direction() != ep_dir {
                    return Err(UsbError::InvalidEndpoint);
                }

                let index = addr.number() as usize;

                if index >= NUM_ENDPOINTS || configs[index].is_some() {
                    return Err(UsbError::InvalidEndpoint);
                }

                index
            }
            None => {
                // Endpoint 0 is reserved for the control pipe
                (1..NUM_ENDPOINTS)
                    .find(|&i| configs[i].is_none())
                    .ok_or(UsbError::EndpointOverflow)?
            }
        };

        configs[index] = Some(EndpointConfig {
            ep_type,
            max_packet_size,
        });

        Ok(EndpointAddress::from_parts(index as u8, ep_dir))
    }

    fn enable(&mut self) {
        self.shared.state.borrow_mut().enabled = true;
    }

    fn reset(&self) {
        let mut state = self.shared.state.borrow_mut();

        state.address = 0;
        state.setup = None;
        state.in_complete = 0;

        for i in 0..NUM_ENDPOINTS {
            state.out_queues[i].clear();
            state.in_queues[i].clear();
            state.out_stalled[i] = false;
            state.in_stalled[i] = false;
        }
    }

    fn set_device_address(&self, addr: u8) {
        self.shared.state.borrow_mut().address = addr;
    }

    fn write(&self, ep_addr: EndpointAddress, buf: &[u8]) -> Result<usize> {
        let mut state = self.shared.state.borrow_mut();
        let index = ep_addr.number() as usize;

        let config = state.in_config[index].ok_or(UsbError::InvalidEndpoint)?;

        if buf.len() > config.max_packet_size as usize {
            return Err(UsbError::BufferOverflow);
        }

        let mut packet = Packet::new();
        packet
            .extend_from_slice(buf)
            .map_err(|_| UsbError::BufferOverflow)?;

        state.in_queues[index]
            .push_back(packet)
            .map_err(|_| UsbError::WouldBlock)?;

        Ok(buf.len())
    }

    fn read(&self, ep_addr: EndpointAddress, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.shared.state.borrow_mut();
        let index = ep_addr.number() as usize;

        state.out_config[index].ok_or(UsbError::InvalidEndpoint)?;

        if index == 0 {
            // A pending SETUP packet takes precedence over data packets
            if let Some(setup) = state.setup.take() {
                if buf.len() < 8 {
                    state.setup = Some(setup);
                    return Err(UsbError::BufferOverflow);
                }

                buf[..8].copy_from_slice(&setup);
                return Ok(8);
            }
        }

        let packet = state.out_queues[index]
            .pop_front()
            .ok_or(UsbError::WouldBlock)?;

        if packet.len() > buf.len() {
            return Err(UsbError::BufferOverflow);
        }

        buf[..packet.len()].copy_from_slice(&packet);

        Ok(packet.len())
    }

    fn set_stalled(&self, ep_addr: EndpointAddress, stalled: bool) {
        let mut state = self.shared.state.borrow_mut();
        let index = ep_addr.number() as usize;

        match ep_addr.direction() {
            UsbDirection::Out => state.out_stalled[index] = stalled,
            UsbDirection::In => state.in_stalled[index] = stalled,
        }
    }

    fn is_stalled(&self, ep_addr: EndpointAddress) -> bool {
        self.shared.ep_stalled(ep_addr)
    }

    fn suspend(&self) {}

    fn resume(&self) {}

    fn poll(&self) -> PollResult {
        let mut state = self.shared.state.borrow_mut();

        if !state.enabled {
            return PollResult::None;
        }

        if core::mem::replace(&mut state.reset_pending, false) {
            return PollResult::Reset;
        }

        if core::mem::replace(&mut state.suspend_pending, false) {
            return PollResult::Suspend;
        }

        if core::mem::replace(&mut state.resume_pending, false) {
            return PollResult::Resume;
        }

        let mut ep_out = 0u16;
        for i in 0..NUM_ENDPOINTS {
            if !state.out_queues[i].is_empty() {
                ep_out |= 1 << i;
            }
        }

        let ep_setup = if state.setup.is_some() { 1 } else { 0 };
        let ep_in_complete = core::mem::take(&mut state.in_complete);

        if ep_out == 0 && ep_setup == 0 && ep_in_complete == 0 {
            return PollResult::None;
        }

        PollResult::Data {
            ep_out,
            ep_in_complete,
            ep_setup,
        }
    }
}
