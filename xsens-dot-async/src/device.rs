//! Device-level operations composed from characteristic reads and writes.

use xsens_dot::{
    Battery, DEFAULT_OUTPUT_RATE, DeviceControl, DeviceInfo, FilterProfile,
    MeasurementControl, OUTPUT_RATES, OrientationResetControl, OrientationResetStatus,
    PayloadMode, PowerOptions, VisitIndex,
};

use crate::error::{Error, ErrorKind, Result};
use crate::session::Session;
use crate::transport::Transport;

/// The longest device tag the firmware stores, in bytes.
pub const MAX_DEVICE_TAG_LEN: usize = 16;

impl<T: Transport> Session<T> {
    pub async fn device_info(&mut self) -> Result<DeviceInfo> {
        self.read().await
    }

    pub async fn device_control(&mut self) -> Result<DeviceControl> {
        self.read().await
    }

    pub async fn battery(&mut self) -> Result<Battery> {
        self.read().await
    }

    /// Makes the sensor LED blink so the device can be found.
    pub async fn identify(&mut self) -> Result<()> {
        self.update_control(VisitIndex::IDENTIFY, |control| control.identifying = 1)
            .await
    }

    pub async fn power_off(&mut self) -> Result<()> {
        self.update_control(VisitIndex::POWER, |control| {
            control.power_options = control.power_options.with(PowerOptions::POWER_OFF, true);
        })
        .await
    }

    /// Sets whether the device powers on when plugged into USB.
    pub async fn set_power_on_by_usb_plug_in(&mut self, enabled: bool) -> Result<()> {
        self.update_control(VisitIndex::POWER, |control| {
            control.power_options = control
                .power_options
                .with(PowerOptions::POWER_ON_BY_USB_PLUG_IN, enabled);
        })
        .await
    }

    /// Sets the measurement output rate in Hz.
    ///
    /// Only the rates in [`OUTPUT_RATES`] are accepted; anything else fails with
    /// [`ErrorKind::InvalidArgument`] without touching the device.
    pub async fn set_output_rate(&mut self, hz: u16) -> Result<()> {
        if !OUTPUT_RATES.contains(&hz) {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("unsupported output rate {hz} Hz"),
            ));
        }
        self.update_control(VisitIndex::OUTPUT_RATE, |control| control.output_rate = hz)
            .await
    }

    pub async fn reset_output_rate(&mut self) -> Result<()> {
        self.set_output_rate(DEFAULT_OUTPUT_RATE).await
    }

    pub async fn set_filter_profile(&mut self, profile: FilterProfile) -> Result<()> {
        self.update_control(VisitIndex::FILTER_PROFILE, |control| {
            control.filter_profile = profile
        })
        .await
    }

    /// Renames the device. The tag is at most [`MAX_DEVICE_TAG_LEN`] bytes of UTF-8.
    pub async fn set_device_tag(&mut self, tag: &str) -> Result<()> {
        let bytes = tag.as_bytes();
        if bytes.len() > MAX_DEVICE_TAG_LEN {
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("device tag is {} bytes, at most {MAX_DEVICE_TAG_LEN} allowed", bytes.len()),
            ));
        }
        self.update_control(VisitIndex::DEVICE_TAG, |control| {
            control.device_tag = [0; MAX_DEVICE_TAG_LEN];
            control.device_tag[..bytes.len()].copy_from_slice(bytes);
            control.device_tag_len = bytes.len() as u8;
        })
        .await
    }

    /// Starts streaming in `mode`.
    ///
    /// Frames arrive on [`mode.characteristic()`][PayloadMode::characteristic], which must be
    /// subscribed separately.
    pub async fn start_measurement(&mut self, mode: PayloadMode) -> Result<()> {
        self.write(&MeasurementControl::start(mode)).await
    }

    pub async fn stop_measurement(&mut self, mode: PayloadMode) -> Result<()> {
        self.write(&MeasurementControl::stop(mode)).await
    }

    /// Aligns the heading with the sensor's current orientation.
    pub async fn reset_heading(&mut self) -> Result<()> {
        self.write(&OrientationResetControl::HeadingReset).await
    }

    pub async fn revert_heading(&mut self) -> Result<()> {
        self.write(&OrientationResetControl::DefaultHeading).await
    }

    pub async fn heading_reset_status(&mut self) -> Result<OrientationResetStatus> {
        self.read().await
    }

    /// Reads the device control register, applies `update` and writes it back with only `visit`
    /// selected.
    async fn update_control(
        &mut self,
        visit: VisitIndex,
        update: impl FnOnce(&mut DeviceControl),
    ) -> Result<()> {
        let mut control: DeviceControl = self.read().await?;
        control.visit_index = visit;
        update(&mut control);
        self.write(&control).await
    }
}
