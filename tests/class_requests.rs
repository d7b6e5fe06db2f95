//! Class-specific request handling for the CDC-ACM, HID, Audio and
//! Mass-Storage classes.

mod helpers;

use helpers::*;
use usbd_ep0::audio::{AudioClass, VolumeRange, FEATURE_UNIT_ID};
use usbd_ep0::cdc_acm::{CdcAcmClass, ParityType, StopBits};
use usbd_ep0::control::Request;
use usbd_ep0::hid::{hid_descriptor_type, HidClass, HidProtocol};
use usbd_ep0::msc::MscClass;
use usbd_ep0::prelude::*;
use usbd_ep0::sim::{SimBus, SimShared};

fn leak_shared() -> &'static SimShared {
    Box::leak(Box::new(SimShared::new()))
}

// CDC class requests

const REQ_SET_LINE_CODING: u8 = 0x20;
const REQ_GET_LINE_CODING: u8 = 0x21;
const REQ_SET_CONTROL_LINE_STATE: u8 = 0x22;

#[test]
fn cdc_line_coding_round_trips_byte_exact() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut serial = CdcAcmClass::new(&alloc, 64);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut serial]);

    // 115200 baud, 2 stop bits, even parity, 7 data bits
    let coding = [0x00, 0xc2, 0x01, 0x00, 0x02, 0x02, 0x07];

    host.control_write(
        &mut dev,
        &mut [&mut serial],
        OUT_CLASS_INTERFACE,
        REQ_SET_LINE_CODING,
        0,
        0,
        &coding,
    )
    .expect("set line coding");

    // The parsed coding is available to the application for reprogramming
    // the UART before the status stage was even acknowledged.
    assert_eq!(serial.line_coding().data_rate(), 115_200);
    assert_eq!(serial.line_coding().stop_bits(), StopBits::Two);
    assert_eq!(serial.line_coding().parity_type(), ParityType::Even);
    assert_eq!(serial.line_coding().data_bits(), 7);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut serial],
            IN_CLASS_INTERFACE,
            REQ_GET_LINE_CODING,
            0,
            0,
            7,
        )
        .expect("get line coding");

    assert_eq!(reply.data, coding);
}

#[test]
fn cdc_rejects_malformed_line_coding() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut serial = CdcAcmClass::new(&alloc, 64);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut serial]);

    // Stop bits value 3 does not exist
    assert_eq!(
        host.control_write(
            &mut dev,
            &mut [&mut serial],
            OUT_CLASS_INTERFACE,
            REQ_SET_LINE_CODING,
            0,
            0,
            &[0x80, 0x25, 0x00, 0x00, 0x03, 0x00, 0x08],
        ),
        Err(Stalled)
    );

    // The default coding is untouched
    assert_eq!(serial.line_coding().data_rate(), 9600);
}

#[test]
fn cdc_control_line_state_sets_dtr_and_rts() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut serial = CdcAcmClass::new(&alloc, 64);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut serial]);

    assert!(!serial.dtr());
    assert!(!serial.rts());

    host.control_write(
        &mut dev,
        &mut [&mut serial],
        OUT_CLASS_INTERFACE,
        REQ_SET_CONTROL_LINE_STATE,
        0x0003,
        0,
        &[],
    )
    .expect("set control line state");

    assert!(serial.dtr());
    assert!(serial.rts());

    host.control_write(
        &mut dev,
        &mut [&mut serial],
        OUT_CLASS_INTERFACE,
        REQ_SET_CONTROL_LINE_STATE,
        0x0000,
        0,
        &[],
    )
    .expect("clear control line state");

    assert!(!serial.dtr());
    assert!(!serial.rts());
}

// HID class requests

const HID_GET_REPORT: u8 = 0x01;
const HID_GET_IDLE: u8 = 0x02;
const HID_GET_PROTOCOL: u8 = 0x03;
const HID_SET_REPORT: u8 = 0x09;
const HID_SET_IDLE: u8 = 0x0a;
const HID_SET_PROTOCOL: u8 = 0x0b;

const REPORT_TYPE_OUTPUT: u16 = 2 << 8;
const REPORT_TYPE_FEATURE: u16 = 3 << 8;

/// A plain boot keyboard report descriptor.
static KEYBOARD_REPORT_DESCRIPTOR: [u8; 63] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xa1, 0x01, // Collection (Application)
    0x05, 0x07, //   Usage Page (Keyboard)
    0x19, 0xe0, //   Usage Minimum (224)
    0x29, 0xe7, //   Usage Maximum (231)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x05, //   Usage Maximum (5)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Keyboard)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data, Array)
    0xc0, // End Collection
];

#[test]
fn hid_serves_its_descriptors_via_interface_get_descriptor() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut hid = HidClass::new(&alloc, &KEYBOARD_REPORT_DESCRIPTOR);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut hid]);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut hid],
            IN_STANDARD_INTERFACE,
            Request::GET_DESCRIPTOR,
            (hid_descriptor_type::REPORT as u16) << 8,
            0,
            255,
        )
        .expect("get report descriptor");

    assert_eq!(reply.data, KEYBOARD_REPORT_DESCRIPTOR);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut hid],
            IN_STANDARD_INTERFACE,
            Request::GET_DESCRIPTOR,
            (hid_descriptor_type::HID as u16) << 8,
            0,
            9,
        )
        .expect("get hid descriptor");

    assert_eq!(reply.data[0], 9);
    assert_eq!(reply.data[1], hid_descriptor_type::HID);
    assert_eq!(reply.data[6], hid_descriptor_type::REPORT);
    assert_eq!(
        u16::from_le_bytes([reply.data[7], reply.data[8]]) as usize,
        KEYBOARD_REPORT_DESCRIPTOR.len()
    );

    // Physical descriptors are not supported
    assert_eq!(
        host.control_read(
            &mut dev,
            &mut [&mut hid],
            IN_STANDARD_INTERFACE,
            Request::GET_DESCRIPTOR,
            (hid_descriptor_type::PHYSICAL as u16) << 8,
            0,
            255,
        ),
        Err(Stalled)
    );
}

#[test]
fn hid_report_descriptor_is_clamped_to_wlength() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut hid = HidClass::new(&alloc, &KEYBOARD_REPORT_DESCRIPTOR);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut hid]);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut hid],
            IN_STANDARD_INTERFACE,
            Request::GET_DESCRIPTOR,
            (hid_descriptor_type::REPORT as u16) << 8,
            0,
            16,
        )
        .expect("get truncated report descriptor");

    assert_eq!(reply.data, &KEYBOARD_REPORT_DESCRIPTOR[..16]);
}

#[test]
fn hid_idle_rate_and_protocol_round_trip() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut hid = HidClass::new(&alloc, &KEYBOARD_REPORT_DESCRIPTOR);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut hid]);

    // Duration 125 (500 ms) in the high byte, all reports in the low byte
    host.control_write(
        &mut dev,
        &mut [&mut hid],
        OUT_CLASS_INTERFACE,
        HID_SET_IDLE,
        125 << 8,
        0,
        &[],
    )
    .expect("set idle");
    assert_eq!(hid.idle_rate(), 125);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut hid],
            IN_CLASS_INTERFACE,
            HID_GET_IDLE,
            0,
            0,
            1,
        )
        .expect("get idle");
    assert_eq!(reply.data, vec![125]);

    host.control_write(
        &mut dev,
        &mut [&mut hid],
        OUT_CLASS_INTERFACE,
        HID_SET_PROTOCOL,
        0,
        0,
        &[],
    )
    .expect("set boot protocol");
    assert_eq!(hid.protocol(), HidProtocol::Boot);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut hid],
            IN_CLASS_INTERFACE,
            HID_GET_PROTOCOL,
            0,
            0,
            1,
        )
        .expect("get protocol");
    assert_eq!(reply.data, vec![0]);

    // Protocol values above 1 are invalid
    assert_eq!(
        host.control_write(
            &mut dev,
            &mut [&mut hid],
            OUT_CLASS_INTERFACE,
            HID_SET_PROTOCOL,
            2,
            0,
            &[],
        ),
        Err(Stalled)
    );
}

#[test]
fn hid_output_report_is_stored_and_readable() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut hid = HidClass::new(&alloc, &KEYBOARD_REPORT_DESCRIPTOR);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut hid]);

    // Keyboard LED state: caps lock on
    host.control_write(
        &mut dev,
        &mut [&mut hid],
        OUT_CLASS_INTERFACE,
        HID_SET_REPORT,
        REPORT_TYPE_OUTPUT,
        0,
        &[0x02],
    )
    .expect("set output report");

    assert_eq!(hid.output_report(), &[0x02]);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut hid],
            IN_CLASS_INTERFACE,
            HID_GET_REPORT,
            REPORT_TYPE_OUTPUT,
            0,
            1,
        )
        .expect("get output report");
    assert_eq!(reply.data, vec![0x02]);
}

#[test]
fn hid_bootloader_key_arms_the_jump_flag() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut hid = HidClass::new(&alloc, &KEYBOARD_REPORT_DESCRIPTOR);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut hid]);

    // A different feature payload of the same length does nothing
    host.control_write(
        &mut dev,
        &mut [&mut hid],
        OUT_CLASS_INTERFACE,
        HID_SET_REPORT,
        REPORT_TYPE_FEATURE,
        0,
        &[0x55, 0xaa, 0x55, 0xab],
    )
    .expect("set unrelated feature report");
    assert!(!hid.bootloader_requested());

    // The magic sequence arms the flag
    host.control_write(
        &mut dev,
        &mut [&mut hid],
        OUT_CLASS_INTERFACE,
        HID_SET_REPORT,
        REPORT_TYPE_FEATURE,
        0,
        &[0x55, 0xaa, 0x55, 0xaa],
    )
    .expect("set bootloader feature report");
    assert!(hid.bootloader_requested());
}

// Audio class requests

const AUDIO_SET_CUR: u8 = 0x01;
const AUDIO_GET_CUR: u8 = 0x81;
const AUDIO_GET_MIN: u8 = 0x82;
const AUDIO_GET_MAX: u8 = 0x83;
const AUDIO_GET_RES: u8 = 0x84;

const MUTE_CONTROL: u16 = 1 << 8;
const VOLUME_CONTROL: u16 = 2 << 8;
const SAMPLING_FREQ_CONTROL: u16 = 1 << 8;

const VOLUME_RANGE: VolumeRange = VolumeRange {
    usb_min: -12288,
    usb_max: 0,
    usb_res: 256,
    device_min: 0,
    device_max: 63,
};

fn feature_unit_index() -> u16 {
    // Control interface 0, feature unit entity in the high byte
    (FEATURE_UNIT_ID as u16) << 8
}

#[test]
fn audio_mute_round_trips() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut audio = AudioClass::new(&alloc, VOLUME_RANGE);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut audio]);

    host.control_write(
        &mut dev,
        &mut [&mut audio],
        OUT_CLASS_INTERFACE,
        AUDIO_SET_CUR,
        MUTE_CONTROL,
        feature_unit_index(),
        &[0x01],
    )
    .expect("set mute");
    assert!(audio.mute());

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut audio],
            IN_CLASS_INTERFACE,
            AUDIO_GET_CUR,
            MUTE_CONTROL,
            feature_unit_index(),
            1,
        )
        .expect("get mute");
    assert_eq!(reply.data, vec![0x01]);
}

#[test]
fn audio_volume_reports_the_usb_value_and_clamps_the_device_value() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut audio = AudioClass::new(&alloc, VOLUME_RANGE);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut audio]);

    let volume: i16 = -6144;

    host.control_write(
        &mut dev,
        &mut [&mut audio],
        OUT_CLASS_INTERFACE,
        AUDIO_SET_CUR,
        VOLUME_CONTROL,
        feature_unit_index(),
        &volume.to_le_bytes(),
    )
    .expect("set volume");

    // GET_CUR reports the exact USB-space value back even though the device
    // volume was derived (and possibly clamped) from it.
    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut audio],
            IN_CLASS_INTERFACE,
            AUDIO_GET_CUR,
            VOLUME_CONTROL,
            feature_unit_index(),
            2,
        )
        .expect("get volume");
    assert_eq!(reply.data, volume.to_le_bytes());
    assert_eq!(audio.device_volume(), 31);

    // A value below the advertised minimum still round-trips while the
    // device volume is clamped to its floor.
    let low: i16 = -20000;

    host.control_write(
        &mut dev,
        &mut [&mut audio],
        OUT_CLASS_INTERFACE,
        AUDIO_SET_CUR,
        VOLUME_CONTROL,
        feature_unit_index(),
        &low.to_le_bytes(),
    )
    .expect("set out-of-range volume");

    assert_eq!(audio.usb_volume(), low);
    assert_eq!(audio.device_volume(), 0);
}

#[test]
fn audio_reports_the_volume_range() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut audio = AudioClass::new(&alloc, VOLUME_RANGE);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut audio]);

    let range = [
        (AUDIO_GET_MIN, VOLUME_RANGE.usb_min),
        (AUDIO_GET_MAX, VOLUME_RANGE.usb_max),
        (AUDIO_GET_RES, VOLUME_RANGE.usb_res),
    ];

    for (request, expected) in range.iter() {
        let reply = host
            .control_read(
                &mut dev,
                &mut [&mut audio],
                IN_CLASS_INTERFACE,
                *request,
                VOLUME_CONTROL,
                feature_unit_index(),
                2,
            )
            .expect("get volume range");
        assert_eq!(reply.data, expected.to_le_bytes());
    }
}

#[test]
fn audio_requests_for_other_units_or_channels_stall() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut audio = AudioClass::new(&alloc, VOLUME_RANGE);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut audio]);

    // Unknown entity ID
    assert_eq!(
        host.control_read(
            &mut dev,
            &mut [&mut audio],
            IN_CLASS_INTERFACE,
            AUDIO_GET_CUR,
            VOLUME_CONTROL,
            0x0900,
            2,
        ),
        Err(Stalled)
    );

    // Channel other than the master channel
    assert_eq!(
        host.control_read(
            &mut dev,
            &mut [&mut audio],
            IN_CLASS_INTERFACE,
            AUDIO_GET_CUR,
            VOLUME_CONTROL | 1,
            feature_unit_index(),
            2,
        ),
        Err(Stalled)
    );
}

#[test]
fn audio_sampling_frequency_is_set_through_the_endpoint() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut audio = AudioClass::new(&alloc, VOLUME_RANGE);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut audio]);

    assert_eq!(audio.sample_freq(), 48_000);

    // 44100 Hz as a 3 byte little-endian value, addressed to the streaming
    // endpoint
    host.control_write(
        &mut dev,
        &mut [&mut audio],
        OUT_CLASS_ENDPOINT,
        AUDIO_SET_CUR,
        SAMPLING_FREQ_CONTROL,
        0x0001,
        &[0x44, 0xac, 0x00],
    )
    .expect("set sampling frequency");

    assert_eq!(audio.sample_freq(), 44_100);
}

#[test]
fn audio_streaming_interface_alternate_settings() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut audio = AudioClass::new(&alloc, VOLUME_RANGE);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut audio]);

    // The streaming interface is number 1
    let streaming_if = 1;

    host.control_write(
        &mut dev,
        &mut [&mut audio],
        OUT_STANDARD_INTERFACE,
        Request::SET_INTERFACE,
        1,
        streaming_if,
        &[],
    )
    .expect("activate streaming alt setting");
    assert_eq!(audio.alt_setting(), 1);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut audio],
            IN_STANDARD_INTERFACE,
            Request::GET_INTERFACE,
            0,
            streaming_if,
            1,
        )
        .expect("get alt setting");
    assert_eq!(reply.data, vec![1]);

    // Alternate setting 2 does not exist
    assert_eq!(
        host.control_write(
            &mut dev,
            &mut [&mut audio],
            OUT_STANDARD_INTERFACE,
            Request::SET_INTERFACE,
            2,
            streaming_if,
            &[],
        ),
        Err(Stalled)
    );
}

// Mass storage class requests

const REQ_MASS_STORAGE_RESET: u8 = 0xff;
const REQ_GET_MAX_LUN: u8 = 0xfe;

#[test]
fn msc_get_max_lun_returns_count_minus_one() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut msc = MscClass::new(&alloc, 64, 1);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut msc]);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut msc],
            IN_CLASS_INTERFACE,
            REQ_GET_MAX_LUN,
            0,
            0,
            1,
        )
        .expect("get max lun");
    assert_eq!(reply.data, vec![0x00]);
}

#[test]
fn msc_get_max_lun_with_multiple_luns() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut msc = MscClass::new(&alloc, 64, 4);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut msc]);

    let reply = host
        .control_read(
            &mut dev,
            &mut [&mut msc],
            IN_CLASS_INTERFACE,
            REQ_GET_MAX_LUN,
            0,
            0,
            1,
        )
        .expect("get max lun");
    assert_eq!(reply.data, vec![0x03]);
}

#[test]
fn msc_reset_sets_the_flag_once() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut msc = MscClass::new(&alloc, 64, 1);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut msc]);

    host.control_write(
        &mut dev,
        &mut [&mut msc],
        OUT_CLASS_INTERFACE,
        REQ_MASS_STORAGE_RESET,
        0,
        0,
        &[],
    )
    .expect("mass storage reset");

    assert!(msc.take_reset());
    assert!(!msc.take_reset());
}

#[test]
fn msc_rejects_malformed_requests() {
    let shared = leak_shared();
    let alloc = SimBus::new(shared);
    let mut msc = MscClass::new(&alloc, 64, 1);
    let mut dev = UsbDeviceBuilder::new(&alloc, UsbVidPid(VID, PID))
        .max_packet_size_0(64)
        .build();
    let host = Host::new(shared);

    shared.host_reset();
    pump(&mut dev, &mut [&mut msc]);

    // Non-zero wValue
    assert_eq!(
        host.control_write(
            &mut dev,
            &mut [&mut msc],
            OUT_CLASS_INTERFACE,
            REQ_MASS_STORAGE_RESET,
            1,
            0,
            &[],
        ),
        Err(Stalled)
    );
    assert!(!msc.take_reset());

    // Wrong interface number
    assert_eq!(
        host.control_write(
            &mut dev,
            &mut [&mut msc],
            OUT_CLASS_INTERFACE,
            REQ_MASS_STORAGE_RESET,
            0,
            1,
            &[],
        ),
        Err(Stalled)
    );

    // GET_MAX_LUN with a non-zero wValue
    assert_eq!(
        host.control_read(
            &mut dev,
            &mut [&mut msc],
            IN_CLASS_INTERFACE,
            REQ_GET_MAX_LUN,
            1,
            0,
            1,
        ),
        Err(Stalled)
    );
}
