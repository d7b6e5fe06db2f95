//! The control transfer state machine for endpoint 0.

use core::cmp::min;

use crate::bus::UsbBus;
use crate::control::Request;
use crate::endpoint::{EndpointIn, EndpointOut};
use crate::{Result, UsbDirection, UsbError};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum ControlState {
    /// No transfer in progress.
    Idle,

    /// IN data stage in progress, more data to send.
    DataIn,

    /// IN data stage complete apart from the trailing zero-length packet.
    DataInZlp,

    /// The last IN data packet has been handed to the hardware.
    DataInLast,

    /// An IN request has been received and the stack is waiting for a
    /// response from a handler.
    CompleteIn,

    /// Waiting for the host's zero-length status packet ending an IN
    /// transfer.
    StatusOut,

    /// OUT data stage in progress.
    DataOut,

    /// An OUT request with all of its data has been received and the stack
    /// is waiting for a response from a handler.
    CompleteOut,

    /// Status stage of an OUT transfer has been written, waiting for it to
    /// complete.
    StatusIn,

    /// The transfer failed and the endpoints are stalled until the next
    /// SETUP packet.
    Error,
}

// Maximum length of control transfer data stage in bytes. 128 bytes by
// default. You can define the feature "control-buffer-256" to make it 256
// bytes if you have larger control transfers.
#[cfg(not(feature = "control-buffer-256"))]
const CONTROL_BUF_LEN: usize = 128;
#[cfg(feature = "control-buffer-256")]
const CONTROL_BUF_LEN: usize = 256;

/// Buffers control transfers and sequences their data and status stages.
pub(crate) struct ControlPipe<'a, B: UsbBus> {
    ep_out: EndpointOut<'a, B>,
    ep_in: EndpointIn<'a, B>,
    state: ControlState,
    request: Option<Request>,
    buf: [u8; CONTROL_BUF_LEN],
    static_in_buf: Option<&'static [u8]>,
    i: usize,
    len: usize,
    zlp_due: bool,
}

impl<'a, B: UsbBus> ControlPipe<'a, B> {
    pub fn new(ep_out: EndpointOut<'a, B>, ep_in: EndpointIn<'a, B>) -> ControlPipe<'a, B> {
        ControlPipe {
            ep_out,
            ep_in,
            state: ControlState::Idle,
            request: None,
            buf: [0; CONTROL_BUF_LEN],
            static_in_buf: None,
            i: 0,
            len: 0,
            zlp_due: false,
        }
    }

    /// The request currently being serviced, if any.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub fn waiting_for_response(&self) -> bool {
        match self.state {
            ControlState::CompleteOut | ControlState::CompleteIn => true,
            _ => false,
        }
    }

    /// The data stage payload of the current OUT transfer.
    pub fn data(&self) -> &[u8] {
        &self.buf[0..self.len]
    }

    pub fn reset(&mut self) {
        usb_trace!("control pipe reset");
        self.state = ControlState::Idle;
        self.request = None;
        self.static_in_buf = None;
    }

    /// Starts a new control transfer from a received SETUP packet. Returns
    /// the direction of a transfer that is ready for a response.
    pub fn handle_setup(&mut self) -> Option<UsbDirection> {
        let mut packet = [0u8; 8];

        let count = match self.ep_out.read(&mut packet) {
            Ok(count) => count,
            Err(UsbError::WouldBlock) => return None,
            Err(_) => {
                self.set_error();
                return None;
            }
        };

        let req = match Request::parse(&packet[..count]) {
            Ok(req) => req,
            Err(_) => {
                // A SETUP packet of the wrong length cannot be interpreted
                // at all.
                self.set_error();
                return None;
            }
        };

        usb_trace!("SETUP: {:?}", req);

        // A new SETUP supersedes whatever transfer was in progress and
        // clears a previous error condition.
        self.ep_out.set_stalled(false);
        self.ep_in.set_stalled(false);
        self.static_in_buf = None;
        self.request = Some(req);

        if req.direction == UsbDirection::Out {
            if req.length > 0 {
                if req.length as usize > self.buf.len() {
                    // The data stage won't fit in the buffer.
                    self.set_error();
                    return None;
                }

                self.i = 0;
                self.len = req.length as usize;
                self.state = ControlState::DataOut;

                None
            } else {
                // No data stage; the request is complete as-is.
                self.len = 0;
                self.state = ControlState::CompleteOut;

                Some(UsbDirection::Out)
            }
        } else {
            self.state = ControlState::CompleteIn;

            Some(UsbDirection::In)
        }
    }

    /// Advances the state machine on a received OUT packet. Returns the
    /// direction of a transfer that is ready for a response.
    pub fn handle_out(&mut self) -> Option<UsbDirection> {
        match self.state {
            ControlState::DataOut => {
                let count = match self.ep_out.read(&mut self.buf[self.i..]) {
                    Ok(count) => count,
                    Err(UsbError::WouldBlock) => return None,
                    Err(_) => {
                        // Failed to read or buffer overflow (only possible if
                        // the host sends more data than it declared in the
                        // SETUP packet).
                        self.set_error();
                        return None;
                    }
                };

                self.i += count;

                if self.i >= self.len {
                    self.state = ControlState::CompleteOut;
                    return Some(UsbDirection::Out);
                }
            }
            ControlState::StatusOut => {
                // Normal status stage ending an IN transfer.
                self.ep_out.read(&mut []).ok();
                self.state = ControlState::Idle;
            }
            ControlState::DataIn | ControlState::DataInZlp | ControlState::DataInLast => {
                // The host has started the status stage before consuming the
                // whole data stage. The transfer is complete from its point
                // of view; abandon the remaining data so the endpoint is back
                // in sync for the next SETUP.
                usb_trace!("IN data stage aborted by host");
                self.ep_out.read(&mut []).ok();
                self.static_in_buf = None;
                self.state = ControlState::Idle;
            }
            _ => {
                // Unexpected OUT packet
                self.set_error();
            }
        }

        None
    }

    /// Advances the state machine when a written IN packet has been taken by
    /// the host. Returns true when a whole OUT transfer, including its status
    /// stage, has completed.
    pub fn handle_in_complete(&mut self) -> bool {
        match self.state {
            ControlState::DataIn => {
                self.write_in_chunk();
            }
            ControlState::DataInZlp => {
                if self.ep_in.write(&[]).is_err() {
                    // There isn't much we can do if the write fails, except
                    // to wait for another poll or for the host to resend the
                    // request.
                    return false;
                }

                self.state = ControlState::DataInLast;
            }
            ControlState::DataInLast => {
                self.ep_out.set_stalled(false);
                self.state = ControlState::StatusOut;
            }
            ControlState::StatusIn => {
                self.state = ControlState::Idle;
                return true;
            }
            _ => {
                // Unexpected IN packet completion
                self.set_error();
            }
        }

        false
    }

    fn write_in_chunk(&mut self) {
        let count = min(self.len - self.i, self.ep_in.max_packet_size() as usize);

        let buffer = self.static_in_buf.unwrap_or(&self.buf);
        if self.ep_in.write(&buffer[self.i..(self.i + count)]).is_err() {
            // Wait for another poll or for the host to resend the request.
            return;
        }

        self.i += count;

        if self.i >= self.len {
            self.static_in_buf = None;

            self.state = if self.zlp_due {
                ControlState::DataInZlp
            } else {
                ControlState::DataInLast
            };
        }
    }

    pub fn accept_out(&mut self) -> Result<()> {
        match self.state {
            ControlState::CompleteOut => {}
            _ => return Err(UsbError::InvalidState),
        };

        self.ep_in.write(&[]).ok();
        self.state = ControlState::StatusIn;
        Ok(())
    }

    pub fn accept_in(&mut self, f: impl FnOnce(&mut [u8]) -> Result<usize>) -> Result<()> {
        let req = match self.state {
            ControlState::CompleteIn => match self.request {
                Some(req) => req,
                None => return Err(UsbError::InvalidState),
            },
            _ => return Err(UsbError::InvalidState),
        };

        let len = f(&mut self.buf[..])?;

        if len > self.buf.len() {
            self.set_error();
            return Err(UsbError::BufferOverflow);
        }

        self.start_in_transfer(&req, len)
    }

    pub fn accept_in_static(&mut self, data: &'static [u8]) -> Result<()> {
        let req = match self.state {
            ControlState::CompleteIn => match self.request {
                Some(req) => req,
                None => return Err(UsbError::InvalidState),
            },
            _ => return Err(UsbError::InvalidState),
        };

        self.static_in_buf = Some(data);

        self.start_in_transfer(&req, data.len())
    }

    fn start_in_transfer(&mut self, req: &Request, data_len: usize) -> Result<()> {
        self.len = min(data_len, req.length as usize);
        self.i = 0;

        // A trailing zero-length packet tells the host the data ran out
        // early when the response is shorter than requested but the last
        // packet was full. An exact-length response never needs one.
        self.zlp_due = data_len < req.length as usize
            && data_len > 0
            && data_len % self.ep_in.max_packet_size() as usize == 0;

        self.state = ControlState::DataIn;
        self.write_in_chunk();

        Ok(())
    }

    pub fn reject(&mut self) -> Result<()> {
        if !self.waiting_for_response() {
            return Err(UsbError::InvalidState);
        }

        self.set_error();
        Ok(())
    }

    fn set_error(&mut self) {
        usb_debug!("control pipe error, stalling");
        self.state = ControlState::Error;
        self.ep_out.set_stalled(true);
        self.ep_in.set_stalled(true);
    }
}
