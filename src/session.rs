use embedded_hal::i2c::SevenBitAddress;

use crate::config::{ConfigError, Configuration, PowerMode};
use crate::consts::*;
use crate::status::Status;
use crate::utils::*;
use crate::{BlockHeader, Error, Platform, Vl53l5cx};

/// Where a sensor session stands.
///
/// ```text
/// Uninitialized --init--> Idle --start_ranging--> Ranging
///                          ^                         |
///                          +------stop_ranging-------+
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    Uninitialized,
    Idle,
    Ranging,
}

const STOP_POLL_ATTEMPTS: u16 = 500;

impl<P: Platform> Vl53l5cx<P> {
    pub(crate) fn require(&self, expected: SessionState) -> Result<(), Error<P::Error>> {
        if self.state != expected {
            warn!("operation refused in state {}", self.state);
            return Err(Error::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Idle and awake: the only state where settings may change.
    pub(crate) fn require_configurable(&self) -> Result<(), Error<P::Error>> {
        self.require(SessionState::Idle)?;
        if self.config.power_mode == PowerMode::Sleep {
            return Err(Error::Asleep);
        }
        Ok(())
    }

    /// Initialized and awake, streaming or not.
    pub(crate) fn require_readable(&self) -> Result<(), Error<P::Error>> {
        if self.state == SessionState::Uninitialized {
            return Err(Error::InvalidState {
                expected: SessionState::Idle,
                actual: self.state,
            });
        }
        if self.config.power_mode == PowerMode::Sleep {
            return Err(Error::Asleep);
        }
        Ok(())
    }

    /// Start streaming with the current configuration. Settings cannot be
    /// changed until [`Vl53l5cx::stop_ranging`].
    pub fn start_ranging(&mut self) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        if let Err(e) = self.config.validate() {
            warn!("configuration rejected: {}", e);
            return Err(e.into());
        }

        let zones = self.config.resolution.zones() as u32;
        let targets = self.targets_per_zone.get() as u32;
        let indices = self.model.output_indices();
        let mut output = self.model.block_layout(self.targets_per_zone).as_array();
        let output_bh_enable: [u32; 4] = [output_enable_mask(), 0x00000000, 0x00000000, 0xC0000000];

        self.data_ready = false;
        self.streamcount = 255;
        let mut data_read_size: u32 = 0;

        for (i, entry) in output.iter_mut().enumerate() {
            if *entry == 0 || output_bh_enable[i / 32] & (1 << (i % 32)) == 0 {
                continue;
            }
            let mut bh = BlockHeader(*entry);
            if (0x01..0x0d).contains(&bh.bh_type()) {
                if (PER_ZONE_BLOCK_START..PER_ZONE_BLOCK_END).contains(&bh.bh_idx()) {
                    bh.set_bh_size(zones);
                } else {
                    bh.set_bh_size(zones * targets);
                }
                data_read_size += bh.bh_type() * bh.bh_size();
            } else {
                data_read_size += bh.bh_size();
            }
            data_read_size += 4;
            *entry = bh.bh_bytes();
        }
        data_read_size += 24;
        self.data_read_size = data_read_size as usize;

        from_u32_to_u8(&output, &mut self.temp_buffer[..48]);
        self.dci_write_data(indices.output_list, 48)?;

        from_u32_to_u8(&[data_read_size, 12 + 1], &mut self.temp_buffer[..8]);
        self.dci_write_data(indices.output_config, 8)?;

        from_u32_to_u8(&output_bh_enable, &mut self.temp_buffer[..16]);
        self.dci_write_data(indices.output_enables, 16)?;

        // xshut bypass (interrupt mode)
        self.write_to_register(REG_PAGE, 0x00)?;
        self.write_to_register(0x09, 0x05)?;
        self.write_to_register(REG_PAGE, 0x02)?;

        self.write_multi_to_register(UI_CMD_END - 3, &[0x00, 0x03, 0x00, 0x00])?;
        self.poll_for_answer(4, 1, UI_CMD_STATUS, 0xff, 0x03)?;

        // the firmware echoes the frame size it is going to stream
        self.dci_read_data(DCI_UI_RANGE_CONFIG, 12)?;
        let mut echoed = [0u16; 1];
        from_u8_to_u16(&self.temp_buffer[0x08..0x0A], &mut echoed);
        if echoed[0] as u32 != data_read_size {
            error!("frame size mismatch: {=u16} != {=u32}", echoed[0], data_read_size);
            return Err(Error::Other);
        }

        if self.model.has_laser_safety_check() {
            self.dci_read_data(DCI_LASER_SAFETY, 8)?;
            if self.temp_buffer[0x06] != 0 {
                error!("laser safety fault");
                return Err(Error::LaserSafety);
            }
        }

        self.state = SessionState::Ranging;
        debug!("ranging started, {=u32} bytes per frame", data_read_size);
        Ok(())
    }

    /// Stop streaming and return to [`SessionState::Idle`].
    ///
    /// Codes reported by the sensor while stopping are merged into
    /// [`Error::Status`]; the session is idle in that case too.
    pub fn stop_ranging(&mut self) -> Result<(), Error<P::Error>> {
        self.require(SessionState::Ranging)?;
        let mut status = Status::OK;

        self.read_from_register(UI_CHECKSUM, 4)?;
        let auto_stop_flag = read_u32(&self.temp_buffer, 0);

        if auto_stop_flag != 0x4FF {
            self.write_to_register(REG_PAGE, 0x00)?;

            // provoke MCU stop
            self.write_to_register(0x15, 0x16)?;
            self.write_to_register(0x14, 0x01)?;

            // wait for GO2 status 0
            let mut tmp = 0u8;
            let mut timeout = 0u16;
            while tmp & 0x80 == 0 {
                tmp = self.read_byte(0x06)?;
                self.delay(10)?;
                timeout += 1;
                if timeout > STOP_POLL_ATTEMPTS {
                    status = status.merge(Status(tmp));
                    break;
                }
            }
        }

        // GO2 status 1
        let tmp = self.read_byte(0x06)?;
        if tmp & 0x80 != 0 {
            let code = self.read_byte(0x07)?;
            if code != 0x84 && code != 0x85 {
                status = status.merge(Status(code));
            }
        }

        // undo MCU stop
        self.write_to_register(REG_PAGE, 0x00)?;
        self.write_to_register(0x14, 0x00)?;
        self.write_to_register(0x15, 0x00)?;

        // stop xshut bypass
        self.write_to_register(0x09, 0x04)?;
        self.write_to_register(REG_PAGE, 0x02)?;

        self.state = SessionState::Idle;
        self.data_ready = false;
        if status.is_err() {
            warn!("sensor reported {=u8:#x} while stopping", status.0);
            return Err(Error::Status(status));
        }
        debug!("ranging stopped");
        Ok(())
    }

    /// Read the power mode back from the sensor.
    pub fn get_power_mode(&mut self) -> Result<PowerMode, Error<P::Error>> {
        if self.state == SessionState::Uninitialized {
            return Err(Error::InvalidState {
                expected: SessionState::Idle,
                actual: self.state,
            });
        }
        self.write_to_register(REG_PAGE, 0x00)?;
        let raw = self.read_byte(0x09)?;
        self.write_to_register(REG_PAGE, 0x02)?;
        match raw {
            // 0x05 while the xshut bypass of a session is active
            0x04 | 0x05 => Ok(PowerMode::Wakeup),
            0x02 => Ok(PowerMode::Sleep),
            _ => Err(Error::Other),
        }
    }

    /// Put the sensor in low power or wake it up. Refused while ranging.
    pub fn set_power_mode(&mut self, power_mode: PowerMode) -> Result<(), Error<P::Error>> {
        self.require(SessionState::Idle)?;
        let current = self.get_power_mode()?;
        if current != power_mode {
            self.write_to_register(REG_PAGE, 0x00)?;
            match power_mode {
                PowerMode::Wakeup => {
                    self.write_to_register(0x09, 0x04)?;
                    self.poll_for_answer(1, 0, 0x06, 0x01, 1)?;
                }
                PowerMode::Sleep => {
                    self.write_to_register(0x09, 0x02)?;
                    self.poll_for_answer(1, 0, 0x06, 0x01, 0)?;
                }
            }
            self.write_to_register(REG_PAGE, 0x02)?;
        }
        self.config.power_mode = power_mode;
        Ok(())
    }

    /// Reprogram the sensor's I2C address. The platform is told through
    /// [`Platform::address_changed`] before the next transfer.
    pub fn set_i2c_address(&mut self, address: SevenBitAddress) -> Result<(), Error<P::Error>> {
        if address > 0x7F {
            return Err(ConfigError::I2cAddress(address).into());
        }
        self.write_to_register(REG_PAGE, 0x00)?;
        self.write_to_register(0x04, address)?;
        self.platform.address_changed(address);
        self.write_to_register(REG_PAGE, 0x02)?;
        debug!("i2c address is now {=u8:#x}", address);
        Ok(())
    }

    /// Write a whole configuration: resolution first, then integration time,
    /// frequency, ranging mode, sharpener and target order. Nothing is written
    /// if the record is invalid. `power_mode` is left alone, use
    /// [`Vl53l5cx::set_power_mode`] for that.
    pub fn apply(&mut self, config: &Configuration) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        if let Err(e) = config.validate() {
            warn!("configuration rejected: {}", e);
            return Err(e.into());
        }

        self.write_resolution(config.resolution)?;
        self.config.resolution = config.resolution;
        self.write_integration_time_ms(config.integration_time_ms)?;
        self.config.integration_time_ms = config.integration_time_ms;
        self.write_frequency_hz(config.frequency_hz)?;
        self.config.frequency_hz = config.frequency_hz;
        self.write_ranging_mode(config.ranging_mode)?;
        self.config.ranging_mode = config.ranging_mode;
        self.write_sharpener_percent(config.sharpener_percent)?;
        self.config.sharpener_percent = config.sharpener_percent;
        self.write_target_order(config.target_order)?;
        self.config.target_order = config.target_order;
        Ok(())
    }
}

pub(crate) fn output_enable_mask() -> u32 {
    let mut mask = OUTPUT_ALWAYS_ON | OUTPUT_NB_TARGET_DETECTED | OUTPUT_DISTANCE | OUTPUT_TARGET_STATUS;
    if !cfg!(feature = "disable-ambient-per-spad") { mask |= OUTPUT_AMBIENT_RATE; }
    if !cfg!(feature = "disable-nb-spads-enabled") { mask |= OUTPUT_SPAD_COUNT; }
    if !cfg!(feature = "disable-signal-per-spad") { mask |= OUTPUT_SIGNAL_RATE; }
    if !cfg!(feature = "disable-range-sigma-mm") { mask |= OUTPUT_RANGE_SIGMA_MM; }
    if !cfg!(feature = "disable-reflectance-percent") { mask |= OUTPUT_REFLECTANCE; }
    if !cfg!(feature = "disable-motion-indicator") { mask |= OUTPUT_MOTION_DETECT; }
    mask
}
