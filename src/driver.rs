use crate::config::{Model, Resolution};
use crate::consts::*;
use crate::utils::*;
use crate::{Configuration, Error, Platform, SessionState, Vl53l5cx};

const POLL_ATTEMPTS: u16 = 200;
const MCU_BOOT_ATTEMPTS: u16 = 500;

impl<P: Platform> Vl53l5cx<P> {
    pub(crate) fn read_from_register(&mut self, reg: u16, size: usize) -> Result<(), Error<P::Error>> {
        if size > TEMPORARY_BUFFER_SIZE {
            return Err(Error::Other);
        }
        self.platform
            .read_multi(reg, &mut self.temp_buffer[..size])
            .map_err(Error::Bus)
    }

    pub(crate) fn read_byte(&mut self, reg: u16) -> Result<u8, Error<P::Error>> {
        self.platform.read_byte(reg).map_err(Error::Bus)
    }

    pub(crate) fn write_to_register(&mut self, reg: u16, val: u8) -> Result<(), Error<P::Error>> {
        self.platform.write_byte(reg, val).map_err(Error::Bus)
    }

    pub(crate) fn write_multi_to_register(&mut self, reg: u16, wbuf: &[u8]) -> Result<(), Error<P::Error>> {
        self.platform.write_multi(reg, wbuf).map_err(Error::Bus)
    }

    pub(crate) fn write_multi_to_register_temp_buffer(&mut self, reg: u16, size: usize) -> Result<(), Error<P::Error>> {
        self.platform
            .write_multi(reg, &self.temp_buffer[..size])
            .map_err(Error::Bus)
    }

    pub(crate) fn swap_temp_buffer(&mut self, size: usize) {
        self.platform.swap_buffer(&mut self.temp_buffer[..size]);
    }

    pub(crate) fn delay(&mut self, ms: u32) -> Result<(), Error<P::Error>> {
        self.platform.wait_ms(ms).map_err(Error::Bus)
    }

    /// Poll `reg` until `temp_buffer[pos] & mask == expected_val`.
    pub(crate) fn poll_for_answer(
        &mut self,
        size: usize,
        pos: usize,
        reg: u16,
        mask: u8,
        expected_val: u8,
    ) -> Result<(), Error<P::Error>> {
        for _ in 0..POLL_ATTEMPTS {
            self.read_from_register(reg, size)?;
            self.delay(10)?;

            // the firmware flags MCU errors in the command status word
            if size >= 4 && self.temp_buffer[2] >= 0x7F {
                error!("mcu error {=u8:#x} while polling {=u16:#x}", self.temp_buffer[2], reg);
                return Err(Error::Mcu);
            }
            if self.temp_buffer[pos] & mask == expected_val {
                return Ok(());
            }
        }
        warn!("timeout polling {=u16:#x}", reg);
        Err(Error::Timeout)
    }

    /// Fails with [`Error::Timeout`] if the MCU never reports a boot.
    pub(crate) fn poll_for_mcu_boot(&mut self) -> Result<(), Error<P::Error>> {
        for _ in 0..MCU_BOOT_ATTEMPTS {
            self.read_from_register(0x06, 2)?;
            if self.temp_buffer[0] & 0x80 != 0 && self.temp_buffer[1] & 0x01 != 0 {
                return Ok(());
            }
            if self.temp_buffer[0] & 0x01 != 0 {
                return Ok(());
            }
            self.delay(1)?;
        }
        warn!("mcu did not boot");
        Err(Error::Timeout)
    }

    /// Read `data_size` bytes of firmware data at `index` into `temp_buffer[..data_size]`.
    /// The firmware only handles whole 32-bit words.
    pub(crate) fn dci_read_data(&mut self, index: u16, data_size: usize) -> Result<(), Error<P::Error>> {
        let read_size = data_size + 12;
        if read_size > TEMPORARY_BUFFER_SIZE || data_size % 4 != 0 {
            return Err(Error::InvalidParam);
        }
        let [idx_hi, idx_lo] = index.to_be_bytes();
        let cmd: [u8; 12] = [
            idx_hi,
            idx_lo,
            ((data_size & 0xff0) >> 4) as u8,
            ((data_size & 0xf) << 4) as u8,
            0x00, 0x00, 0x00, 0x0f,
            0x00, 0x02, 0x00, 0x08,
        ];

        self.write_multi_to_register(UI_CMD_END - 11, &cmd)?;
        self.poll_for_answer(4, 1, UI_CMD_STATUS, 0xff, 0x03)?;

        // 4 bytes header, data, 8 bytes footer
        self.read_from_register(UI_CMD_START, read_size)?;
        self.swap_temp_buffer(read_size);
        self.temp_buffer.copy_within(4..4 + data_size, 0);

        trace!("dci read {=u16:#x} ({=usize} bytes)", index, data_size);
        Ok(())
    }

    /// Write `temp_buffer[..data_size]` to firmware data at `index`. The buffer
    /// content is left as it was on success.
    pub(crate) fn dci_write_data(&mut self, index: u16, data_size: usize) -> Result<(), Error<P::Error>> {
        let write_size = data_size + 12;
        if write_size > TEMPORARY_BUFFER_SIZE || data_size % 4 != 0 {
            return Err(Error::InvalidParam);
        }
        let [idx_hi, idx_lo] = index.to_be_bytes();
        let header: [u8; 4] = [
            idx_hi,
            idx_lo,
            ((data_size & 0xff0) >> 4) as u8,
            ((data_size & 0xf) << 4) as u8,
        ];
        let footer: [u8; 8] = [
            0x00, 0x00, 0x00, 0x0f, 0x05, 0x01,
            ((data_size + 8) >> 8) as u8,
            ((data_size + 8) & 0xff) as u8,
        ];
        let address = UI_CMD_END - write_size as u16 + 1;

        self.swap_temp_buffer(data_size);
        self.temp_buffer.copy_within(0..data_size, 4);
        self.temp_buffer[..4].copy_from_slice(&header);
        self.temp_buffer[data_size + 4..write_size].copy_from_slice(&footer);

        self.write_multi_to_register_temp_buffer(address, write_size)?;
        self.poll_for_answer(4, 1, UI_CMD_STATUS, 0xff, 0x03)?;

        self.temp_buffer.copy_within(4..4 + data_size, 0);
        self.swap_temp_buffer(data_size);

        trace!("dci write {=u16:#x} ({=usize} bytes)", index, data_size);
        Ok(())
    }

    /// Read-modify-write of `new_data` at byte `new_data_pos` inside a firmware record.
    pub(crate) fn dci_replace_data(
        &mut self,
        index: u16,
        data_size: usize,
        new_data: &[u8],
        new_data_pos: usize,
    ) -> Result<(), Error<P::Error>> {
        if new_data_pos + new_data.len() > data_size {
            return Err(Error::InvalidParam);
        }
        self.dci_read_data(index, data_size)?;
        self.temp_buffer[new_data_pos..new_data_pos + new_data.len()].copy_from_slice(new_data);
        self.dci_write_data(index, data_size)
    }

    /// Upload the NVM offset calibration, downsampled to 4x4 when needed.
    pub(crate) fn send_offset_data(&mut self, resolution: Resolution) -> Result<(), Error<P::Error>> {
        const DSS_4X4: [u8; 8] = [0x0F, 0x04, 0x04, 0x00, 0x08, 0x10, 0x10, 0x07];
        const FOOTER: [u8; 8] = [0x00, 0x00, 0x00, 0x0F, 0x03, 0x01, 0x01, 0xE4];

        self.temp_buffer[..OFFSET_BUFFER_SIZE].copy_from_slice(&self.offset_data);

        if resolution == Resolution::R4x4 {
            let mut signal_grid = [0u32; 64];
            let mut range_grid = [0i16; 64];

            self.temp_buffer[0x10..0x10 + DSS_4X4.len()].copy_from_slice(&DSS_4X4);
            self.swap_temp_buffer(OFFSET_BUFFER_SIZE);
            from_u8_to_u32(&self.temp_buffer[0x3C..0x3C + 256], &mut signal_grid);
            from_u8_to_i16(&self.temp_buffer[0x140..0x140 + 128], &mut range_grid);

            downsample_u32(&mut signal_grid);
            downsample_i16(&mut range_grid);

            from_u32_to_u8(&signal_grid, &mut self.temp_buffer[0x3C..0x3C + 256]);
            from_i16_to_u8(&range_grid, &mut self.temp_buffer[0x140..0x140 + 128]);
            self.swap_temp_buffer(OFFSET_BUFFER_SIZE);
        }

        self.temp_buffer.copy_within(8..OFFSET_BUFFER_SIZE + 4, 0);
        self.temp_buffer[0x1E0..0x1E0 + FOOTER.len()].copy_from_slice(&FOOTER);
        self.write_multi_to_register_temp_buffer(UI_OFFSET, OFFSET_BUFFER_SIZE)?;
        self.poll_for_answer(4, 1, UI_CMD_STATUS, 0xff, 0x03)
    }

    /// Upload the crosstalk calibration, downsampled to 4x4 when needed.
    pub(crate) fn send_xtalk_data(&mut self, resolution: Resolution) -> Result<(), Error<P::Error>> {
        const RES_4X4: [u8; 8] = [0x0F, 0x04, 0x04, 0x17, 0x08, 0x10, 0x10, 0x07];
        const DSS_4X4: [u8; 8] = [0x00, 0x78, 0x00, 0x08, 0x00, 0x00, 0x00, 0x08];
        const PROFILE_4X4: [u8; 4] = [0xA0, 0xFC, 0x01, 0x00];

        self.temp_buffer[..XTALK_BUFFER_SIZE].copy_from_slice(&self.xtalk_data);

        if resolution == Resolution::R4x4 {
            let mut signal_grid = [0u32; 64];

            self.temp_buffer[0x08..0x08 + RES_4X4.len()].copy_from_slice(&RES_4X4);
            self.temp_buffer[0x20..0x20 + DSS_4X4.len()].copy_from_slice(&DSS_4X4);
            self.swap_temp_buffer(XTALK_BUFFER_SIZE);
            from_u8_to_u32(&self.temp_buffer[0x34..0x34 + 256], &mut signal_grid);

            downsample_u32(&mut signal_grid);

            from_u32_to_u8(&signal_grid, &mut self.temp_buffer[0x34..0x34 + 256]);
            self.swap_temp_buffer(XTALK_BUFFER_SIZE);
            self.temp_buffer[0x134..0x134 + PROFILE_4X4.len()].copy_from_slice(&PROFILE_4X4);
            self.temp_buffer[0x78..0x78 + 4].fill(0);
        }

        self.write_multi_to_register_temp_buffer(UI_XTALK, XTALK_BUFFER_SIZE)?;
        self.poll_for_answer(4, 1, UI_CMD_STATUS, 0xff, 0x03)
    }

    /// Read `(device_id, revision_id)`.
    pub fn read_ids(&mut self) -> Result<(u8, u8), Error<P::Error>> {
        self.write_to_register(REG_PAGE, 0x00)?;
        let device_id = self.read_byte(0x00)?;
        let revision_id = self.read_byte(0x01)?;
        self.write_to_register(REG_PAGE, 0x02)?;
        Ok((device_id, revision_id))
    }

    /// Check the sensor answers on the bus with the ids of the configured model.
    pub fn is_alive(&mut self) -> Result<bool, Error<P::Error>> {
        let ids = self.read_ids()?;
        Ok(ids == self.model.ids())
    }

    /// Pulse the platform reset line, if there is one. The firmware is lost,
    /// so the session goes back to [`SessionState::Uninitialized`].
    ///
    /// Returns `false` when the platform cannot reset the sensor.
    pub fn reset(&mut self) -> Result<bool, Error<P::Error>> {
        match self.platform.reset_sensor() {
            None => Ok(false),
            Some(res) => {
                self.state = SessionState::Uninitialized;
                self.data_ready = false;
                res.map_err(Error::Bus)?;
                Ok(true)
            }
        }
    }

    /// Load the firmware and calibration into the sensor. Must be called after
    /// a power on and takes a few hundred milliseconds.
    ///
    /// On failure the session stays [`SessionState::Uninitialized`].
    pub fn init(&mut self) -> Result<(), Error<P::Error>> {
        if self.state == SessionState::Ranging {
            return Err(Error::InvalidState {
                expected: SessionState::Idle,
                actual: self.state,
            });
        }
        self.state = SessionState::Uninitialized;
        self.data_ready = false;

        let ids = self.read_ids()?;
        if ids != self.model.ids() {
            error!("unexpected device {=u8:#x} rev {=u8:#x}", ids.0, ids.1);
            return Err(Error::Other);
        }

        self.boot_sequence()?;
        self.load_calibration()?;
        self.load_default_configuration()?;

        self.config = Configuration::default();
        self.streamcount = 255;
        self.state = SessionState::Idle;
        debug!("sensor initialized");
        Ok(())
    }

    fn boot_sequence(&mut self) -> Result<(), Error<P::Error>> {
        // SW reboot
        self.write_to_register(REG_PAGE, 0x00)?;
        self.write_to_register(0x0009, 0x04)?;
        self.write_to_register(0x000F, 0x40)?;
        self.write_to_register(0x000A, 0x03)?;
        self.read_byte(REG_PAGE)?;
        self.write_to_register(0x000C, 0x01)?;

        self.write_to_register(0x0101, 0x00)?;
        self.write_to_register(0x0102, 0x00)?;
        self.write_to_register(0x010A, 0x01)?;
        self.write_to_register(0x4002, 0x01)?;
        self.write_to_register(0x4002, 0x00)?;
        self.write_to_register(0x010A, 0x03)?;
        self.write_to_register(0x0103, 0x01)?;
        self.write_to_register(0x000C, 0x00)?;
        self.write_to_register(0x000F, 0x43)?;
        self.delay(1)?;

        self.write_to_register(0x000F, 0x40)?;
        self.write_to_register(0x000A, 0x01)?;
        self.delay(100)?;

        self.write_to_register(REG_PAGE, 0x00)?;
        self.poll_for_answer(1, 0, 0x06, 0xff, 1)?;

        self.write_to_register(0x000E, 0x01)?;
        self.write_to_register(REG_PAGE, 0x02)?;

        self.enable_fw_access()?;
        self.write_to_register(REG_PAGE, 0x00)?;

        // host access to GO1
        self.read_byte(REG_PAGE)?;
        self.write_to_register(0x0C, 0x01)?;

        // power on status
        self.write_to_register(REG_PAGE, 0x00)?;
        self.write_to_register(0x0101, 0x00)?;
        self.write_to_register(0x0102, 0x00)?;
        self.write_to_register(0x010A, 0x01)?;
        self.write_to_register(0x4002, 0x01)?;
        self.write_to_register(0x4002, 0x00)?;
        self.write_to_register(0x010A, 0x03)?;
        self.write_to_register(0x0103, 0x01)?;
        self.write_to_register(0x400F, 0x00)?;
        self.write_to_register(0x021A, 0x43)?;
        self.write_to_register(0x021A, 0x03)?;
        self.write_to_register(0x021A, 0x01)?;
        self.write_to_register(0x021A, 0x00)?;
        self.write_to_register(0x0219, 0x00)?;
        self.write_to_register(0x021B, 0x00)?;

        // wake up MCU
        self.write_to_register(REG_PAGE, 0x00)?;
        self.read_byte(REG_PAGE)?;
        self.write_to_register(0x0C, 0x00)?;
        self.write_to_register(REG_PAGE, 0x01)?;
        self.write_to_register(0x20, 0x07)?;
        self.write_to_register(0x20, 0x06)?;

        self.download_firmware()?;

        // reset MCU and wait boot
        self.write_to_register(REG_PAGE, 0x00)?;
        self.write_to_register(0x0114, 0x00)?;
        self.write_to_register(0x0115, 0x00)?;
        self.write_to_register(0x0116, 0x42)?;
        self.write_to_register(0x0117, 0x00)?;
        self.write_to_register(0x0B, 0x00)?;
        self.read_byte(REG_PAGE)?;
        self.write_to_register(0x0C, 0x00)?;
        self.write_to_register(0x0B, 0x01)?;
        self.poll_for_mcu_boot()?;

        self.write_to_register(REG_PAGE, 0x02)?;

        if let Some(expected) = self.firmware.checksum {
            self.read_from_register(UI_CHECKSUM, 4)?;
            self.swap_temp_buffer(4);
            let crc = read_u32(&self.temp_buffer, 0);
            if crc != expected {
                error!("firmware checksum {=u32:#x}, expected {=u32:#x}", crc, expected);
                return Err(Error::CheckSumFail);
            }
        }
        Ok(())
    }

    fn enable_fw_access(&mut self) -> Result<(), Error<P::Error>> {
        match self.model {
            Model::Vl53l5cx => {
                self.write_to_register(0x03, 0x0D)?;
                self.write_to_register(REG_PAGE, 0x01)?;
                self.poll_for_answer(1, 0, 0x21, 0x10, 0x10)
            }
            Model::Vl53l8cx => {
                self.write_to_register(REG_PAGE, 0x01)?;
                self.write_to_register(0x06, 0x01)?;
                self.poll_for_answer(1, 0, 0x21, 0xFF, 0x04)
            }
        }
    }

    fn download_firmware(&mut self) -> Result<(), Error<P::Error>> {
        let image = self.firmware.image;
        for (page, chunk) in (FIRMWARE_FIRST_PAGE..).zip(image.chunks(FIRMWARE_PAGE_SIZE)) {
            self.write_to_register(REG_PAGE, page)?;
            self.write_multi_to_register(0, chunk)?;
        }
        self.write_to_register(REG_PAGE, 0x01)?;
        debug!("firmware downloaded ({=usize} bytes)", image.len());

        // check the download went through
        match self.model {
            Model::Vl53l5cx => {
                self.write_to_register(REG_PAGE, 0x02)?;
                self.enable_fw_access()?;
            }
            Model::Vl53l8cx => {
                self.write_to_register(0x06, 0x03)?;
                self.delay(5)?;
            }
        }
        self.write_to_register(REG_PAGE, 0x00)?;
        self.read_byte(REG_PAGE)?;
        self.write_to_register(0x0C, 0x01)
    }

    fn load_calibration(&mut self) -> Result<(), Error<P::Error>> {
        let nvm_cmd = self.firmware.nvm_cmd;
        self.write_multi_to_register(UI_NVM_CMD, nvm_cmd)?;
        self.poll_for_answer(4, 0, UI_CMD_STATUS, 0xff, 2)?;

        self.read_from_register(UI_CMD_START, NVM_DATA_SIZE)?;
        self.offset_data.copy_from_slice(&self.temp_buffer[..OFFSET_BUFFER_SIZE]);
        self.send_offset_data(Resolution::R4x4)?;

        self.xtalk_data.copy_from_slice(self.firmware.default_xtalk);
        self.send_xtalk_data(Resolution::R4x4)
    }

    fn load_default_configuration(&mut self) -> Result<(), Error<P::Error>> {
        let default_configuration = self.firmware.default_configuration;
        self.write_multi_to_register(UI_DEFAULT_CONFIGURATION, default_configuration)?;
        self.poll_for_answer(4, 1, UI_CMD_STATUS, 0xff, 0x03)?;

        let indices = self.model.output_indices();
        let targets = self.targets_per_zone.get();
        self.temp_buffer[..4].copy_from_slice(&[targets, 0x00, 0x01, 0x00]);
        self.dci_write_data(indices.pipe_control, 4)?;

        if targets != 1 {
            self.dci_replace_data(DCI_FW_NB_TARGET, 16, &[targets], 0x0C)?;
        }

        from_u32_to_u8(&[1], &mut self.temp_buffer[..4]);
        self.dci_write_data(indices.single_range, 4)?;

        // glare filter on
        self.dci_replace_data(DCI_GLARE_FILTER, 40, &[0x01, 0x01], 0x25)
    }
}

/// Average each 2x2 block of an 8x8 grid into the first 16 cells; the rest is cleared.
fn downsample_u32(grid: &mut [u32; 64]) {
    for j in 0..4 {
        for i in 0..4 {
            let base = 2 * i + 16 * j;
            let sum = grid[base] as u64 + grid[base + 1] as u64 + grid[base + 8] as u64 + grid[base + 9] as u64;
            grid[i + 4 * j] = (sum / 4) as u32;
        }
    }
    grid[16..].fill(0);
}

fn downsample_i16(grid: &mut [i16; 64]) {
    for j in 0..4 {
        for i in 0..4 {
            let base = 2 * i + 16 * j;
            let sum = grid[base] as i32 + grid[base + 1] as i32 + grid[base + 8] as i32 + grid[base + 9] as i32;
            grid[i + 4 * j] = (sum / 4) as i16;
        }
    }
    grid[16..].fill(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{firmware, MockSensor};
    use crate::TargetsPerZone;

    #[test]
    fn downsample_averages_quads() {
        let mut grid = [0u32; 64];
        for (i, v) in grid.iter_mut().enumerate() {
            *v = i as u32;
        }
        downsample_u32(&mut grid);
        // zone 0 averages 0, 1, 8, 9
        assert_eq!(grid[0], 4);
        // zone 5 averages 18, 19, 26, 27
        assert_eq!(grid[5], 22);
        assert!(grid[16..].iter().all(|&v| v == 0));

        let mut grid = [-8i16; 64];
        downsample_i16(&mut grid);
        assert_eq!(grid[15], -8);
        assert_eq!(grid[16], 0);
    }

    #[test]
    fn dci_write_then_read_restores_buffer() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();

        sensor.temp_buffer[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        sensor.dci_write_data(DCI_ZONE_CONFIG, 8).unwrap();
        assert_eq!(&sensor.temp_buffer[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);

        sensor.temp_buffer[..8].fill(0);
        sensor.dci_read_data(DCI_ZONE_CONFIG, 8).unwrap();
        assert_eq!(&sensor.temp_buffer[..8], &[1, 2, 3, 4, 5, 6, 7, 8]);
        sensor.free();

        assert_eq!(mock.dci(DCI_ZONE_CONFIG), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn dci_request_layout() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        sensor.dci_read_data(DCI_SHARPENER, 16).unwrap();
        sensor.free();

        let (_, reg, bytes) = mock.writes().first().cloned().unwrap();
        assert_eq!(reg, UI_CMD_END - 11);
        assert_eq!(
            bytes,
            vec![0xAE, 0xD8, 0x01, 0x00, 0x00, 0x00, 0x00, 0x0f, 0x00, 0x02, 0x00, 0x08]
        );
    }

    #[test]
    fn dci_rejects_oversized_and_partial_words() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        assert_eq!(sensor.dci_read_data(DCI_ZONE_CONFIG, 6), Err(Error::InvalidParam));
        assert_eq!(
            sensor.dci_write_data(DCI_ZONE_CONFIG, TEMPORARY_BUFFER_SIZE),
            Err(Error::InvalidParam)
        );
        assert_eq!(
            sensor.dci_replace_data(DCI_ZONE_CONFIG, 8, &[1, 2], 7),
            Err(Error::InvalidParam)
        );
    }

    #[test]
    fn poll_times_out() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        assert_eq!(sensor.poll_for_answer(1, 0, 0x1234, 0xff, 0x42), Err(Error::Timeout));
        sensor.free();
        assert_eq!(mock.waited_ms(), 10 * POLL_ATTEMPTS as u32);
    }

    #[test]
    fn mcu_boot_poll_times_out() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        mock.poke(2, 0x06, 0x00);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        assert_eq!(sensor.poll_for_mcu_boot(), Err(Error::Timeout));
        sensor.free();
        assert_eq!(mock.waited_ms(), MCU_BOOT_ATTEMPTS as u32);
    }

    #[test]
    fn poll_reports_mcu_error() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        mock.poke(2, UI_CMD_STATUS + 2, 0x80);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        assert_eq!(sensor.poll_for_answer(4, 1, UI_CMD_STATUS, 0xff, 0x03), Err(Error::Mcu));
    }

    #[test]
    fn init_reaches_idle() {
        for model in [Model::Vl53l5cx, Model::Vl53l8cx] {
            let mut mock = MockSensor::new(model);
            let mut sensor = Vl53l5cx::new(&mut mock, model, TargetsPerZone::ONE, firmware()).unwrap();
            sensor.init().unwrap();
            assert_eq!(sensor.state(), SessionState::Idle);
            assert_eq!(sensor.configuration(), &Configuration::default());
            sensor.free();

            let indices = model.output_indices();
            assert_eq!(mock.dci(indices.pipe_control), vec![1, 0, 1, 0]);
            assert_eq!(mock.dci(indices.single_range), vec![1, 0, 0, 0]);
            let glare = mock.dci(DCI_GLARE_FILTER);
            assert_eq!(glare.len(), 40);
            assert_eq!(&glare[0x25..0x27], &[0x01, 0x01]);
            assert_eq!(mock.dci_writes().last(), Some(&DCI_GLARE_FILTER));
            // firmware pages start at 0x09
            assert!(mock.writes().iter().any(|(page, reg, bytes)| *page == 0x09 && *reg == 0 && bytes.len() == 16));
        }
    }

    #[test]
    fn init_tells_firmware_the_target_count() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        let targets = TargetsPerZone::new(3).unwrap();
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, targets, firmware()).unwrap();
        sensor.init().unwrap();
        sensor.free();
        assert_eq!(mock.dci(DCI_FW_NB_TARGET)[0x0C], 3);
        assert_eq!(mock.dci(L5CX_OUTPUT_INDICES.pipe_control), vec![3, 0, 1, 0]);
    }

    #[test]
    fn init_refuses_other_device() {
        let mut mock = MockSensor::new(Model::Vl53l8cx);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        assert_eq!(sensor.init(), Err(Error::Other));
        assert_eq!(sensor.state(), SessionState::Uninitialized);
        assert_eq!(sensor.is_alive(), Ok(false));
    }

    #[test]
    fn init_failure_leaves_uninitialized() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        mock.fail_after(40);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        assert!(matches!(sensor.init(), Err(Error::Bus(_))));
        assert_eq!(sensor.state(), SessionState::Uninitialized);
    }

    #[test]
    fn init_checks_firmware_crc() {
        let mut mock = MockSensor::new(Model::Vl53l8cx);
        mock.poke_bytes(2, UI_CHECKSUM, &0x0c0b_6c9e_u32.to_be_bytes());
        let fw = crate::Firmware { checksum: Some(0x0c0b_6c9e), ..firmware() };
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l8cx, TargetsPerZone::ONE, fw).unwrap();
        sensor.init().unwrap();
        sensor.free();

        let mut mock = MockSensor::new(Model::Vl53l8cx);
        let fw = crate::Firmware { checksum: Some(0xdead_beef), ..firmware() };
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l8cx, TargetsPerZone::ONE, fw).unwrap();
        assert_eq!(sensor.init(), Err(Error::CheckSumFail));
        assert_eq!(sensor.state(), SessionState::Uninitialized);
    }

    #[test]
    fn reset_without_line_is_not_an_error() {
        let mut mock = MockSensor::new(Model::Vl53l5cx);
        let mut sensor = Vl53l5cx::new(&mut mock, Model::Vl53l5cx, TargetsPerZone::ONE, firmware()).unwrap();
        sensor.init().unwrap();
        assert_eq!(sensor.reset(), Ok(false));
        assert_eq!(sensor.state(), SessionState::Idle);
        sensor.platform().set_resettable(true);
        assert_eq!(sensor.reset(), Ok(true));
        assert_eq!(sensor.state(), SessionState::Uninitialized);
    }
}
