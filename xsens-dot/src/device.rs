//! Configuration service characteristics.

use crate::characteristic::CharacteristicId;
use crate::codec::{Codec, Reader};
use crate::error::Result;

/// Firmware build timestamp reported in [`DeviceInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BuildDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Top-level device information (read-only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceInfo {
    /// The device's Bluetooth address, as stored by the firmware.
    pub address: [u8; 6],
    pub version_major: u8,
    pub version_minor: u8,
    pub version_revision: u8,
    pub build: BuildDate,
    pub softdevice_version: u32,
    pub serial_number: u64,
    /// ASCII product code, e.g. `XS-T01`.
    pub short_product_code: [u8; 6],
}

impl DeviceInfo {
    /// The product code as text, with trailing NUL padding removed.
    pub fn product_code(&self) -> String {
        String::from_utf8_lossy(&self.short_product_code)
            .trim_end_matches('\0')
            .to_string()
    }
}

impl Codec for DeviceInfo {
    const CHARACTERISTIC: CharacteristicId = CharacteristicId::DeviceInfo;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(34);
        out.extend_from_slice(&self.address);
        out.extend_from_slice(&[self.version_major, self.version_minor, self.version_revision]);
        out.extend_from_slice(&self.build.year.to_le_bytes());
        out.extend_from_slice(&[
            self.build.month,
            self.build.day,
            self.build.hour,
            self.build.minute,
            self.build.second,
        ]);
        out.extend_from_slice(&self.softdevice_version.to_le_bytes());
        out.extend_from_slice(&self.serial_number.to_le_bytes());
        out.extend_from_slice(&self.short_product_code);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::fixed(bytes, Self::CHARACTERISTIC)?;
        Ok(DeviceInfo {
            address: r.array()?,
            version_major: r.u8()?,
            version_minor: r.u8()?,
            version_revision: r.u8()?,
            build: BuildDate {
                year: r.u16()?,
                month: r.u8()?,
                day: r.u8()?,
                hour: r.u8()?,
                minute: r.u8()?,
                second: r.u8()?,
            },
            softdevice_version: r.u32()?,
            serial_number: r.u64()?,
            short_product_code: r.array()?,
        })
    }
}

/// Selects which fields of a [`DeviceControl`] write the device should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VisitIndex(pub u8);

impl VisitIndex {
    pub const IDENTIFY: VisitIndex = VisitIndex(0x01);
    pub const POWER: VisitIndex = VisitIndex(0x02);
    pub const POWER_SAVING: VisitIndex = VisitIndex(0x04);
    pub const DEVICE_TAG: VisitIndex = VisitIndex(0x08);
    pub const OUTPUT_RATE: VisitIndex = VisitIndex(0x10);
    pub const FILTER_PROFILE: VisitIndex = VisitIndex(0x20);
}

/// Power option bits of [`DeviceControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PowerOptions(pub u8);

impl PowerOptions {
    pub const POWER_OFF: u8 = 0x01;
    pub const POWER_ON_BY_USB_PLUG_IN: u8 = 0x02;

    pub fn power_off(self) -> bool {
        self.0 & Self::POWER_OFF != 0
    }

    pub fn power_on_by_usb_plug_in(self) -> bool {
        self.0 & Self::POWER_ON_BY_USB_PLUG_IN != 0
    }

    pub fn with(self, bit: u8, enabled: bool) -> Self {
        if enabled {
            PowerOptions(self.0 | bit)
        } else {
            PowerOptions(self.0 & !bit)
        }
    }
}

/// The sensor fusion filter profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterProfile {
    /// Default for general human motions.
    #[default]
    General,
    /// For fast and jerky human motions like sprinting.
    Dynamic,
    /// A profile code outside the known set, kept so it can be written back unchanged.
    ///
    /// Only decoding produces this variant. Wrapping a known code encodes that code, which then
    /// decodes to its named variant: `Unrecognized(0)` comes back as `General`.
    Unrecognized(u8),
}

impl From<u8> for FilterProfile {
    fn from(code: u8) -> Self {
        match code {
            0 => FilterProfile::General,
            1 => FilterProfile::Dynamic,
            other => FilterProfile::Unrecognized(other),
        }
    }
}

impl From<FilterProfile> for u8 {
    fn from(profile: FilterProfile) -> Self {
        match profile {
            FilterProfile::General => 0,
            FilterProfile::Dynamic => 1,
            FilterProfile::Unrecognized(code) => code,
        }
    }
}

/// Output rates, in Hz, the device accepts.
pub const OUTPUT_RATES: [u16; 9] = [1, 4, 10, 12, 15, 20, 30, 60, 120];

/// The output rate the device starts with.
pub const DEFAULT_OUTPUT_RATE: u16 = 60;

/// Power-saving timeout, split into minutes and seconds as the device stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timeout {
    pub minutes: u8,
    pub seconds: u8,
}

/// Top-level control of the device (identify, power, output rate, filter profile).
///
/// Writes only take effect for the fields selected by [`visit_index`][Self::visit_index].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceControl {
    pub visit_index: VisitIndex,
    pub identifying: u8,
    pub power_options: PowerOptions,
    pub power_saving_timeout_x: Timeout,
    pub power_saving_timeout_y: Timeout,
    pub device_tag_len: u8,
    pub device_tag: [u8; 16],
    pub output_rate: u16,
    pub filter_profile: FilterProfile,
    pub reserved: [u8; 5],
}

impl DeviceControl {
    /// The device tag as text (default `Xsens DOT`).
    pub fn tag(&self) -> String {
        let len = usize::from(self.device_tag_len).min(self.device_tag.len());
        String::from_utf8_lossy(&self.device_tag[..len]).into_owned()
    }
}

impl Codec for DeviceControl {
    const CHARACTERISTIC: CharacteristicId = CharacteristicId::DeviceControl;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32);
        out.extend_from_slice(&[
            self.visit_index.0,
            self.identifying,
            self.power_options.0,
            self.power_saving_timeout_x.minutes,
            self.power_saving_timeout_x.seconds,
            self.power_saving_timeout_y.minutes,
            self.power_saving_timeout_y.seconds,
            self.device_tag_len,
        ]);
        out.extend_from_slice(&self.device_tag);
        out.extend_from_slice(&self.output_rate.to_le_bytes());
        out.push(self.filter_profile.into());
        out.extend_from_slice(&self.reserved);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::fixed(bytes, Self::CHARACTERISTIC)?;
        Ok(DeviceControl {
            visit_index: VisitIndex(r.u8()?),
            identifying: r.u8()?,
            power_options: PowerOptions(r.u8()?),
            power_saving_timeout_x: Timeout {
                minutes: r.u8()?,
                seconds: r.u8()?,
            },
            power_saving_timeout_y: Timeout {
                minutes: r.u8()?,
                seconds: r.u8()?,
            },
            device_tag_len: r.u8()?,
            device_tag: r.array()?,
            output_rate: r.u16()?,
            filter_profile: r.u8()?.into(),
            reserved: r.array()?,
        })
    }
}

/// The event carried by a [`DeviceReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    PowerOff,
    PowerSaving,
    ButtonPressed,
    /// A report type this crate does not know. Only produced by decoding.
    Unrecognized(u8),
}

impl From<u8> for ReportKind {
    fn from(code: u8) -> Self {
        match code {
            1 => ReportKind::PowerOff,
            4 => ReportKind::PowerSaving,
            5 => ReportKind::ButtonPressed,
            other => ReportKind::Unrecognized(other),
        }
    }
}

impl From<ReportKind> for u8 {
    fn from(kind: ReportKind) -> Self {
        match kind {
            ReportKind::PowerOff => 1,
            ReportKind::PowerSaving => 4,
            ReportKind::ButtonPressed => 5,
            ReportKind::Unrecognized(code) => code,
        }
    }
}

/// An event notification (power off, power saving, button press).
///
/// The body is kept verbatim so reports from newer firmware can still be inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceReport {
    pub kind: ReportKind,
    pub body: [u8; 35],
}

impl DeviceReport {
    /// The button press timestamp, for [`ReportKind::ButtonPressed`] reports.
    ///
    /// The body starts with a length byte (4 or 8) followed by the timestamp.
    pub fn button_timestamp(&self) -> Option<u64> {
        if self.kind != ReportKind::ButtonPressed {
            return None;
        }
        let mut r = Reader::new(&self.body, "device report");
        match r.u8().ok()? {
            4 => r.u32().ok().map(u64::from),
            8 => r.u64().ok(),
            _ => None,
        }
    }
}

impl Codec for DeviceReport {
    const CHARACTERISTIC: CharacteristicId = CharacteristicId::DeviceReport;

    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(36);
        out.push(self.kind.into());
        out.extend_from_slice(&self.body);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::fixed(bytes, Self::CHARACTERISTIC)?;
        Ok(DeviceReport {
            kind: r.u8()?.into(),
            body: r.array()?,
        })
    }
}
