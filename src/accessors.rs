use crate::config::*;
use crate::consts::*;
use crate::utils::*;
use crate::{Error, Platform, Vl53l5cx};

impl<P: Platform> Vl53l5cx<P> {
    /// Gets the current resolution (4x4 or 8x8) from the sensor.
    ///
    /// # Return
    ///
    /// `resolution` : zone grid currently programmed in the firmware.
    pub fn get_resolution(&mut self) -> Result<Resolution, Error<P::Error>> {
        self.require_readable()?;
        self.dci_read_data(DCI_ZONE_CONFIG, 8)?;
        let zones = self.temp_buffer[0x00].wrapping_mul(self.temp_buffer[0x01]);
        Resolution::from_zones(zones).ok_or(Error::Other)
    }

    /// Sets a new resolution (4x4 or 8x8). The calibration data are uploaded
    /// again, downsampled for 4x4.
    ///
    /// The current frequency and integration time must suit the new grid:
    /// lower the frequency first when going from 4x4 to 8x8.
    ///
    /// # Arguments
    ///
    /// * `resolution` : new zone grid.
    pub fn set_resolution(&mut self, resolution: Resolution) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        self.config.with_resolution(resolution).validate()?;
        self.write_resolution(resolution)?;
        self.config.resolution = resolution;
        Ok(())
    }

    pub(crate) fn write_resolution(&mut self, resolution: Resolution) -> Result<(), Error<P::Error>> {
        let (dss, dss_zones, zone_side, zone_step) = match resolution {
            Resolution::R4x4 => (64, 4, 4, 8),
            Resolution::R8x8 => (16, 1, 8, 4),
        };
        self.dci_read_data(DCI_DSS_CONFIG, 16)?;
        self.temp_buffer[0x04] = dss;
        self.temp_buffer[0x06] = dss;
        self.temp_buffer[0x09] = dss_zones;
        self.dci_write_data(DCI_DSS_CONFIG, 16)?;

        self.dci_read_data(DCI_ZONE_CONFIG, 8)?;
        self.temp_buffer[0x00] = zone_side;
        self.temp_buffer[0x01] = zone_side;
        self.temp_buffer[0x04] = zone_step;
        self.temp_buffer[0x05] = zone_step;
        self.dci_write_data(DCI_ZONE_CONFIG, 8)?;

        self.send_offset_data(resolution)?;
        self.send_xtalk_data(resolution)
    }

    /// Gets the current ranging frequency in Hz.
    pub fn get_frequency_hz(&mut self) -> Result<u8, Error<P::Error>> {
        self.require_readable()?;
        self.dci_read_data(DCI_FREQ_HZ, 4)?;
        Ok(self.temp_buffer[0x01])
    }

    /// Sets a new ranging frequency in Hz. This setting depends on the
    /// resolution, so select the resolution first.
    ///
    /// # Arguments
    ///
    /// * `frequency_hz` : new ranging frequency.
    ///  - For 4x4, min and max allowed values are : 1 to 60
    ///  - For 8x8, min and max allowed values are : 1 to 15
    pub fn set_frequency_hz(&mut self, frequency_hz: u8) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        let cfg = self.config;
        check_frequency(cfg.resolution, frequency_hz)?;
        check_ranging_period(cfg.resolution, cfg.ranging_mode, frequency_hz, cfg.integration_time_ms)?;
        self.write_frequency_hz(frequency_hz)?;
        self.config.frequency_hz = frequency_hz;
        Ok(())
    }

    pub(crate) fn write_frequency_hz(&mut self, frequency_hz: u8) -> Result<(), Error<P::Error>> {
        self.dci_replace_data(DCI_FREQ_HZ, 4, &[frequency_hz], 0x01)
    }

    /// Gets the current integration time in ms.
    pub fn get_integration_time_ms(&mut self) -> Result<u32, Error<P::Error>> {
        self.require_readable()?;
        self.dci_read_data(DCI_INT_TIME, 20)?;
        Ok(read_u32(&self.temp_buffer, 0) / 1000)
    }

    /// Sets a new integration time in ms, between 2 and 1000. In autonomous
    /// mode every integration window of a ranging period must fit in it, so
    /// the value is checked against the current resolution and frequency.
    /// Continuous mode ignores it.
    pub fn set_integration_time_ms(&mut self, integration_time_ms: u32) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        let cfg = self.config;
        check_integration_time(integration_time_ms)?;
        check_ranging_period(cfg.resolution, cfg.ranging_mode, cfg.frequency_hz, integration_time_ms)?;
        self.write_integration_time_ms(integration_time_ms)?;
        self.config.integration_time_ms = integration_time_ms;
        Ok(())
    }

    pub(crate) fn write_integration_time_ms(&mut self, integration_time_ms: u32) -> Result<(), Error<P::Error>> {
        let mut buf = [0u8; 4];
        from_u32_to_u8(&[integration_time_ms * 1000], &mut buf);
        self.dci_replace_data(DCI_INT_TIME, 20, &buf, 0x00)
    }

    /// Gets the current sharpener in percent.
    pub fn get_sharpener_percent(&mut self) -> Result<u8, Error<P::Error>> {
        self.require_readable()?;
        self.dci_read_data(DCI_SHARPENER, 16)?;
        // rounded up so a value written with `set_sharpener_percent` reads back unchanged
        let raw = self.temp_buffer[0x0D] as u32;
        Ok(((raw * 100 + 254) / 255) as u8)
    }

    /// Sets a new sharpener value in percent. Sharpener can be changed to blur
    /// more or less zones depending on the application.
    ///
    /// # Arguments
    ///
    /// * `sharpener_percent` : Value between 0 (disabled) and 99%.
    pub fn set_sharpener_percent(&mut self, sharpener_percent: u8) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        check_sharpener(sharpener_percent)?;
        self.write_sharpener_percent(sharpener_percent)?;
        self.config.sharpener_percent = sharpener_percent;
        Ok(())
    }

    pub(crate) fn write_sharpener_percent(&mut self, sharpener_percent: u8) -> Result<(), Error<P::Error>> {
        let sharpener = (sharpener_percent as u32 * 255 / 100) as u8;
        self.dci_replace_data(DCI_SHARPENER, 16, &[sharpener], 0x0D)
    }

    /// Gets the current target order (closest or strongest).
    pub fn get_target_order(&mut self) -> Result<TargetOrder, Error<P::Error>> {
        self.require_readable()?;
        self.dci_read_data(DCI_TARGET_ORDER, 4)?;
        TargetOrder::from_raw(self.temp_buffer[0x00]).ok_or(Error::Other)
    }

    /// Sets a new target order. By default the sensor reports the strongest target first.
    pub fn set_target_order(&mut self, target_order: TargetOrder) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        self.write_target_order(target_order)?;
        self.config.target_order = target_order;
        Ok(())
    }

    pub(crate) fn write_target_order(&mut self, target_order: TargetOrder) -> Result<(), Error<P::Error>> {
        self.dci_replace_data(DCI_TARGET_ORDER, 4, &[target_order as u8], 0x00)
    }

    /// Gets the ranging mode. Two modes are available: continuous and
    /// autonomous. The default mode is autonomous.
    pub fn get_ranging_mode(&mut self) -> Result<RangingMode, Error<P::Error>> {
        self.require_readable()?;
        self.dci_read_data(DCI_RANGING_MODE, 8)?;
        if self.temp_buffer[0x01] == 0x01 {
            Ok(RangingMode::Continuous)
        } else {
            Ok(RangingMode::Autonomous)
        }
    }

    /// Sets the ranging mode. Switching to autonomous checks the integration
    /// time against the current frequency.
    pub fn set_ranging_mode(&mut self, ranging_mode: RangingMode) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        let cfg = self.config;
        check_ranging_period(cfg.resolution, ranging_mode, cfg.frequency_hz, cfg.integration_time_ms)?;
        self.write_ranging_mode(ranging_mode)?;
        self.config.ranging_mode = ranging_mode;
        Ok(())
    }

    pub(crate) fn write_ranging_mode(&mut self, ranging_mode: RangingMode) -> Result<(), Error<P::Error>> {
        let (mode, timing, single_range) = match ranging_mode {
            RangingMode::Continuous => (0x01, 0x03, 0x00),
            RangingMode::Autonomous => (0x03, 0x02, 0x01),
        };
        self.dci_read_data(DCI_RANGING_MODE, 8)?;
        self.temp_buffer[0x01] = mode;
        self.temp_buffer[0x03] = timing;
        self.dci_write_data(DCI_RANGING_MODE, 8)?;

        from_u32_to_u8(&[single_range], &mut self.temp_buffer[..4]);
        self.dci_write_data(self.model.output_indices().single_range, 4)
    }

    /// Gets the number of frames between 2 temperature compensations.
    ///
    /// # Return
    ///
    /// `repeat_count` : 0 when periodic compensation is disabled (default configuration).
    pub fn get_vhv_repeat_count(&mut self) -> Result<u32, Error<P::Error>> {
        self.require_readable()?;
        self.dci_read_data(DCI_VHV_CONFIG, 16)?;
        Ok(read_u32(&self.temp_buffer, 4))
    }

    /// Sets a periodic temperature compensation. With a repeat count different
    /// from 0 the firmware runs a temperature calibration every N frames.
    ///
    /// # Arguments
    ///
    /// * `repeat_count` : Number of frames between temperature compensations. Set to 0 to disable the feature.
    pub fn set_vhv_repeat_count(&mut self, repeat_count: u32) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        let mut buf = [0u8; 4];
        from_u32_to_u8(&[repeat_count], &mut buf);
        self.dci_replace_data(DCI_VHV_CONFIG, 16, &buf, 0x04)
    }

    /// Checks whether the synchronization pin is enabled. When it is, the
    /// sensor waits for a pulse on its sync input before each measurement.
    /// Only the VL53L8CX has one.
    pub fn get_external_sync_pin_enable(&mut self) -> Result<bool, Error<P::Error>> {
        self.require_readable()?;
        if !self.model.has_sync_pin() {
            return Err(Error::InvalidParam);
        }
        self.dci_read_data(DCI_SYNC_PIN, 4)?;
        Ok(self.temp_buffer[0x03] & 0x02 != 0)
    }

    /// Enables or disables the synchronization pin, used to synchronize
    /// several sensors. Disabled by default.
    pub fn set_external_sync_pin_enable(&mut self, enable: bool) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        if !self.model.has_sync_pin() {
            return Err(Error::InvalidParam);
        }
        self.dci_read_data(DCI_SYNC_PIN, 4)?;
        if enable {
            self.temp_buffer[0x03] |= 0x02;
        } else {
            self.temp_buffer[0x03] &= !0x02;
        }
        self.dci_write_data(DCI_SYNC_PIN, 4)
    }

    /// Read every setting back from the sensor into the cached [`Configuration`].
    pub fn refresh_configuration(&mut self) -> Result<&Configuration, Error<P::Error>> {
        self.require_readable()?;
        let power_mode = self.get_power_mode()?;
        let config = Configuration {
            resolution: self.get_resolution()?,
            target_order: self.get_target_order()?,
            ranging_mode: self.get_ranging_mode()?,
            power_mode,
            frequency_hz: self.get_frequency_hz()?,
            integration_time_ms: self.get_integration_time_ms()?,
            sharpener_percent: self.get_sharpener_percent()?,
        };
        self.config = config;
        Ok(&self.config)
    }
}
