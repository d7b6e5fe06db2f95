//! USB Audio 1.0 class: a speaker path whose Feature Unit exposes master
//! channel mute and volume, plus the endpoint sampling frequency control.

use crate::class_prelude::*;
use crate::control::{Recipient, RequestType};

/// bInterfaceClass for audio.
const USB_CLASS_AUDIO: u8 = 0x01;

const AUDIO_SUB_CLASS_AUDIOCONTROL: u8 = 0x01;
const AUDIO_SUB_CLASS_AUDIOSTREAMING: u8 = 0x02;

// Class requests, Audio 1.0 section 5.2
mod audio_request {
    pub const SET_CUR: u8 = 0x01;
    pub const SET_MIN: u8 = 0x02;
    pub const SET_MAX: u8 = 0x03;
    pub const SET_RES: u8 = 0x04;
    pub const GET_CUR: u8 = 0x81;
    pub const GET_MIN: u8 = 0x82;
    pub const GET_MAX: u8 = 0x83;
    pub const GET_RES: u8 = 0x84;
}

// Feature Unit control selectors in the wValue high byte
mod feature_unit_control {
    pub const MUTE: u8 = 0x01;
    pub const VOLUME: u8 = 0x02;
}

// Endpoint control selector for the sampling frequency
const SAMPLING_FREQ_CONTROL: u8 = 0x01;

/// Entity ID of the input terminal (USB streaming).
pub const INPUT_TERMINAL_ID: u8 = 1;
/// Entity ID of the Feature Unit carrying the mute and volume controls.
pub const FEATURE_UNIT_ID: u8 = 2;
/// Entity ID of the output terminal (speaker).
pub const OUTPUT_TERMINAL_ID: u8 = 3;

/// Volume mapping between the USB wire range and the device's native gain
/// range. USB volumes are signed 16-bit values in 1/256 dB steps.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VolumeRange {
    /// Minimum volume reported for GET_MIN, in USB units.
    pub usb_min: i16,
    /// Maximum volume reported for GET_MAX, in USB units.
    pub usb_max: i16,
    /// Resolution reported for GET_RES, in USB units.
    pub usb_res: i16,
    /// Minimum volume in device units.
    pub device_min: i16,
    /// Maximum volume in device units.
    pub device_max: i16,
}

impl VolumeRange {
    /// Maps a USB volume to the device range, clamping values the host sends
    /// outside the advertised range.
    pub fn usb_to_device(&self, usb_volume: i16) -> i16 {
        // -32768 is reserved by the class specification for silence; map it
        // straight to the bottom of the device range so the linear math
        // below cannot overflow on it.
        if usb_volume == i16::min_value() {
            return self.device_min;
        }

        let usb_span = i32::from(self.usb_max) - i32::from(self.usb_min);
        let device_span = i32::from(self.device_max) - i32::from(self.device_min);

        let device = (i32::from(usb_volume) - i32::from(self.usb_min)) * device_span / usb_span
            + i32::from(self.device_min);

        device
            .max(i32::from(self.device_min))
            .min(i32::from(self.device_max)) as i16
    }
}

/// A USB Audio 1.0 speaker class: an AudioControl interface plus one
/// AudioStreaming interface with a zero-bandwidth default setting.
pub struct AudioClass<'a, B: UsbBus> {
    control_if: InterfaceNumber,
    streaming_if: InterfaceNumber,
    stream_ep: EndpointOut<'a, B>,
    volume_range: VolumeRange,
    alt_setting: u8,
    mute: bool,
    usb_volume: i16,
    device_volume: i16,
    sample_freq: u32,
}

impl<'a, B: UsbBus> AudioClass<'a, B> {
    /// Creates a new audio class with the given volume mapping.
    pub fn new(alloc: &'a UsbBusAllocator<B>, volume_range: VolumeRange) -> AudioClass<'a, B> {
        AudioClass {
            control_if: alloc.interface(),
            streaming_if: alloc.interface(),
            stream_ep: alloc.isochronous(192, 1),
            volume_range,
            alt_setting: 0,
            mute: false,
            usb_volume: 0,
            device_volume: volume_range.usb_to_device(0),
            sample_freq: 48_000,
        }
    }

    /// Whether the host has muted the speaker.
    pub fn mute(&self) -> bool {
        self.mute
    }

    /// The volume as last set by the host, in USB units. This is the value
    /// reported back on GET_CUR.
    pub fn usb_volume(&self) -> i16 {
        self.usb_volume
    }

    /// The volume mapped into the device range, clamped to its limits. This
    /// is the value to program into the DAC.
    pub fn device_volume(&self) -> i16 {
        self.device_volume
    }

    /// The sampling frequency in Hz as last set by the host.
    pub fn sample_freq(&self) -> u32 {
        self.sample_freq
    }

    /// The active alternate setting of the streaming interface. Setting 0 is
    /// zero-bandwidth; audio flows only in setting 1.
    pub fn alt_setting(&self) -> u8 {
        self.alt_setting
    }

    /// Reads a single packet of audio data from the streaming endpoint.
    pub fn read_packet(&self, data: &mut [u8]) -> Result<usize> {
        self.stream_ep.read(data)
    }

    fn is_feature_unit_request(&self, req: &control::Request) -> bool {
        // The wIndex low byte addresses the AudioControl interface and the
        // high byte the entity within it.
        req.recipient == Recipient::Interface
            && req.index & 0xff == u8::from(self.control_if) as u16
            && (req.index >> 8) as u8 == FEATURE_UNIT_ID
    }
}

impl<B: UsbBus> UsbClass<B> for AudioClass<'_, B> {
    fn get_configuration_descriptors(&self, writer: &mut DescriptorWriter) -> Result<()> {
        use crate::descriptor::descriptor_type::{CS_ENDPOINT, CS_INTERFACE};

        let streaming_if = u8::from(self.streaming_if);
        let freq = self.sample_freq;

        writer.interface(
            self.control_if,
            USB_CLASS_AUDIO,
            AUDIO_SUB_CLASS_AUDIOCONTROL,
            0,
        )?;

        // Class-specific AudioControl header; wTotalLength covers the
        // header, terminals and the feature unit (9 + 12 + 9 + 9 bytes).
        writer.write(
            CS_INTERFACE,
            &[
                0x01, // HEADER
                0x00,
                0x01, // bcdADC 1.00
                0x27,
                0x00, // wTotalLength
                0x01, // bInCollection
                streaming_if,
            ],
        )?;

        // Input terminal: USB streaming, stereo
        writer.write(
            CS_INTERFACE,
            &[
                0x02, // INPUT_TERMINAL
                INPUT_TERMINAL_ID,
                0x01,
                0x01, // wTerminalType: USB streaming
                0x00, // bAssocTerminal
                0x02, // bNrChannels
                0x03,
                0x00, // wChannelConfig: left front, right front
                0x00, // iChannelNames
                0x00, // iTerminal
            ],
        )?;

        // Feature unit: mute and volume on the master channel
        writer.write(
            CS_INTERFACE,
            &[
                0x06, // FEATURE_UNIT
                FEATURE_UNIT_ID,
                INPUT_TERMINAL_ID, // bSourceID
                0x01,              // bControlSize
                0x03,              // bmaControls(0): mute, volume
                0x00,              // bmaControls(1)
                0x00,              // iFeature
            ],
        )?;

        // Output terminal: speaker
        writer.write(
            CS_INTERFACE,
            &[
                0x03, // OUTPUT_TERMINAL
                OUTPUT_TERMINAL_ID,
                0x01,
                0x03, // wTerminalType: speaker
                0x00, // bAssocTerminal
                FEATURE_UNIT_ID, // bSourceID
                0x00, // iTerminal
            ],
        )?;

        // Streaming interface, alternate 0 carries no endpoints so the host
        // can release the bandwidth.
        writer.interface_alt(
            self.streaming_if,
            0,
            USB_CLASS_AUDIO,
            AUDIO_SUB_CLASS_AUDIOSTREAMING,
            0,
        )?;

        writer.interface_alt(
            self.streaming_if,
            1,
            USB_CLASS_AUDIO,
            AUDIO_SUB_CLASS_AUDIOSTREAMING,
            0,
        )?;

        // AS general: linked to the input terminal, PCM
        writer.write(
            CS_INTERFACE,
            &[
                0x01, // AS_GENERAL
                INPUT_TERMINAL_ID,
                0x01, // bDelay
                0x01,
                0x00, // wFormatTag: PCM
            ],
        )?;

        // Format type I: stereo, 16 bits, single sampling frequency
        writer.write(
            CS_INTERFACE,
            &[
                0x02, // FORMAT_TYPE
                0x01, // bFormatType: type I
                0x02, // bNrChannels
                0x02, // bSubframeSize
                0x10, // bBitResolution
                0x01, // bSamFreqType: one discrete frequency
                freq as u8,
                (freq >> 8) as u8,
                (freq >> 16) as u8,
            ],
        )?;

        writer.endpoint(&self.stream_ep)?;

        // Class-specific endpoint descriptor: sampling frequency control
        writer.write(
            CS_ENDPOINT,
            &[
                0x01, // EP_GENERAL
                0x01, // bmAttributes: sampling frequency control
                0x00, // bLockDelayUnits
                0x00,
                0x00, // wLockDelay
            ],
        )?;

        Ok(())
    }

    fn reset(&mut self) {
        self.alt_setting = 0;
        self.mute = false;
    }

    fn configured(&mut self) {
        self.alt_setting = 0;
    }

    fn get_alt_setting(&mut self, interface: InterfaceNumber) -> Option<u8> {
        if interface == self.streaming_if {
            Some(self.alt_setting)
        } else {
            None
        }
    }

    fn set_alt_setting(&mut self, interface: InterfaceNumber, alt_setting: u8) -> bool {
        if interface != self.streaming_if || alt_setting > 1 {
            return false;
        }

        self.alt_setting = alt_setting;
        true
    }

    fn control_in(&mut self, xfer: ControlIn<B>) {
        let req = *xfer.request();

        if req.request_type != RequestType::Class || !self.is_feature_unit_request(&req) {
            return;
        }

        let control_selector = (req.value >> 8) as u8;
        let channel = req.value as u8;

        // Only the master channel is exposed
        if channel != 0 {
            return;
        }

        let range = &self.volume_range;

        match (req.request, control_selector) {
            (audio_request::GET_CUR, feature_unit_control::MUTE) => {
                xfer.accept_with(&[self.mute as u8]).ok();
            }
            (
                audio_request::GET_MIN | audio_request::GET_MAX | audio_request::GET_RES,
                feature_unit_control::MUTE,
            ) => {
                // Mute has no meaningful range; the current value is
                // returned for all of them.
                xfer.accept_with(&[self.mute as u8]).ok();
            }
            (audio_request::GET_CUR, feature_unit_control::VOLUME) => {
                // Reports the value as set by the host, in USB units, not
                // the clamped device value.
                xfer.accept_with(&self.usb_volume.to_le_bytes()).ok();
            }
            (audio_request::GET_MIN, feature_unit_control::VOLUME) => {
                xfer.accept_with(&range.usb_min.to_le_bytes()).ok();
            }
            (audio_request::GET_MAX, feature_unit_control::VOLUME) => {
                xfer.accept_with(&range.usb_max.to_le_bytes()).ok();
            }
            (audio_request::GET_RES, feature_unit_control::VOLUME) => {
                xfer.accept_with(&range.usb_res.to_le_bytes()).ok();
            }
            _ => {}
        }
    }

    fn control_out(&mut self, xfer: ControlOut<B>) {
        let req = *xfer.request();

        if req.request_type != RequestType::Class {
            return;
        }

        match req.recipient {
            Recipient::Interface => {
                if !self.is_feature_unit_request(&req) {
                    return;
                }

                let control_selector = (req.value >> 8) as u8;
                let channel = req.value as u8;

                if channel != 0 {
                    return;
                }

                match (req.request, control_selector) {
                    (audio_request::SET_CUR, feature_unit_control::MUTE) if req.length == 1 => {
                        self.mute = xfer.data()[0] != 0;
                        usb_debug!("speaker mute set");
                        xfer.accept().ok();
                    }
                    (audio_request::SET_CUR, feature_unit_control::VOLUME)
                        if req.length == 2 =>
                    {
                        let data = xfer.data();
                        let usb_volume = i16::from_le_bytes([data[0], data[1]]);

                        self.usb_volume = usb_volume;
                        self.device_volume = self.volume_range.usb_to_device(usb_volume);

                        usb_debug!("speaker volume set");
                        xfer.accept().ok();
                    }
                    // The min/max/res values are fixed by the device
                    (
                        audio_request::SET_MIN | audio_request::SET_MAX | audio_request::SET_RES,
                        _,
                    ) => {}
                    _ => {}
                }
            }
            Recipient::Endpoint => {
                // Sampling frequency control on the streaming endpoint,
                // 3 byte little-endian frequency in Hz.
                if req.request == audio_request::SET_CUR
                    && (req.value >> 8) as u8 == SAMPLING_FREQ_CONTROL
                    && req.index & 0xff == u8::from(self.stream_ep.address()) as u16
                    && req.length == 3
                {
                    let data = xfer.data();

                    self.sample_freq = u32::from(data[0])
                        | (u32::from(data[1]) << 8)
                        | (u32::from(data[2]) << 16);

                    usb_debug!("sampling frequency set");
                    xfer.accept().ok();
                }
            }
            _ => {}
        }
    }
}
