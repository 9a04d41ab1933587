//! Register-level stand-in for a sensor, used by the unit tests.
//!
//! It keeps one byte map per register page, answers the DCI command window
//! from a table of host-order records and can stream hand-built frames.

use std::collections::HashMap;

use embedded_hal::i2c::SevenBitAddress;

use crate::config::{Firmware, Model, Resolution, TargetsPerZone};
use crate::consts::*;
use crate::session::output_enable_mask;
use crate::utils::{from_i16_to_u8, from_u32_to_u8, swap_buffer};
use crate::{BlockHeader, Platform};

static IMAGE: [u8; 16] = [0xA5; 16];
static DEFAULT_CONFIGURATION: [u8; 8] = [0x5A; 8];
static DEFAULT_XTALK: [u8; XTALK_BUFFER_SIZE] = [0; XTALK_BUFFER_SIZE];
static NVM_CMD: [u8; 8] = [0x00, 0x00, 0x00, 0x0F, 0x02, 0x01, 0x00, 0x08];

pub fn firmware() -> Firmware {
    Firmware {
        image: &IMAGE,
        default_configuration: &DEFAULT_CONFIGURATION,
        default_xtalk: &DEFAULT_XTALK,
        nvm_cmd: &NVM_CMD,
        checksum: None,
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MockError;

pub struct MockSensor {
    model: Model,
    page: u8,
    memory: HashMap<(u8, u16), u8>,
    dci: HashMap<u16, Vec<u8>>,
    writes: Vec<(u8, u16, Vec<u8>)>,
    dci_writes: Vec<u16>,
    reads: usize,
    ops: usize,
    fail_after: Option<usize>,
    waited_ms: u32,
    resettable: bool,
    stop_code: u8,
    echo_frame_size: bool,
    address: SevenBitAddress,
}

impl MockSensor {
    pub fn new(model: Model) -> Self {
        let mut mock = MockSensor {
            model,
            page: 0x02,
            memory: HashMap::new(),
            dci: HashMap::new(),
            writes: Vec::new(),
            dci_writes: Vec::new(),
            reads: 0,
            ops: 0,
            fail_after: None,
            waited_ms: 0,
            resettable: false,
            stop_code: 0x84,
            echo_frame_size: true,
            address: DEFAULT_I2C_ADDRESS,
        };
        let (device_id, revision_id) = model.ids();
        mock.poke(0, 0x00, device_id);
        mock.poke(0, 0x01, revision_id);
        mock.poke(0, 0x06, 0x01);
        mock.poke(0, 0x09, 0x04);
        let fw_access = match model {
            Model::Vl53l5cx => 0x10,
            Model::Vl53l8cx => 0x04,
        };
        mock.poke(1, 0x21, fw_access);
        // command status: NVM read done (byte 0) and command done (byte 1)
        mock.poke_bytes(2, UI_CMD_STATUS, &[0x02, 0x03, 0x00, 0x00]);

        // records as loaded by the default configuration table
        let mut int_time = vec![0u8; 20];
        from_u32_to_u8(&[5000], &mut int_time[..4]);
        let mut sharpener = vec![0u8; 16];
        sharpener[0x0D] = 12;
        mock.set_dci(DCI_ZONE_CONFIG, &[4, 4, 0, 0, 8, 8, 0, 0]);
        mock.set_dci(DCI_FREQ_HZ, &[0, 1, 0, 0]);
        mock.set_dci(DCI_INT_TIME, &int_time);
        mock.set_dci(DCI_RANGING_MODE, &[0, 3, 0, 2, 0, 0, 0, 0]);
        mock.set_dci(DCI_SHARPENER, &sharpener);
        mock.set_dci(DCI_TARGET_ORDER, &[2, 0, 0, 0]);
        mock
    }

    pub fn poke(&mut self, page: u8, reg: u16, val: u8) {
        self.memory.insert((page, reg), val);
    }

    pub fn poke_bytes(&mut self, page: u8, reg: u16, bytes: &[u8]) {
        for (k, b) in bytes.iter().enumerate() {
            self.poke(page, reg.wrapping_add(k as u16), *b);
        }
    }

    pub fn peek(&self, page: u8, reg: u16) -> u8 {
        self.memory.get(&(page, reg)).copied().unwrap_or(0)
    }

    /// Host-order content of a DCI record, empty if never written.
    pub fn dci(&self, index: u16) -> Vec<u8> {
        self.dci.get(&index).cloned().unwrap_or_default()
    }

    pub fn set_dci(&mut self, index: u16, host: &[u8]) {
        self.dci.insert(index, host.to_vec());
    }

    pub fn writes(&self) -> &[(u8, u16, Vec<u8>)] {
        &self.writes
    }

    /// Indices of DCI records written, in order.
    pub fn dci_writes(&self) -> Vec<u16> {
        self.dci_writes.clone()
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
        self.dci_writes.clear();
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    pub fn waited_ms(&self) -> u32 {
        self.waited_ms
    }

    pub fn address(&self) -> SevenBitAddress {
        self.address
    }

    /// Fail every bus transfer after the first `ops` ones.
    pub fn fail_after(&mut self, ops: usize) {
        self.fail_after = Some(ops);
    }

    pub fn set_resettable(&mut self, resettable: bool) {
        self.resettable = resettable;
    }

    /// GO2 code reported when the MCU is asked to stop.
    pub fn set_stop_code(&mut self, code: u8) {
        self.stop_code = code;
    }

    /// Whether the firmware echoes the frame size of a new output configuration.
    pub fn set_echo_frame_size(&mut self, echo: bool) {
        self.echo_frame_size = echo;
    }

    /// Publish a frame given in host order, flagged with stream count `stream`.
    pub fn push_frame(&mut self, stream: u8, host: &[u8]) {
        let mut raw = host.to_vec();
        swap_buffer(&mut raw);
        raw[..4].copy_from_slice(&[stream, 0x05, 0x05, 0x10]);
        self.poke_bytes(2, 0x0000, &raw);
    }

    fn transfer(&mut self) -> Result<(), MockError> {
        self.ops += 1;
        match self.fail_after {
            Some(limit) if self.ops > limit => Err(MockError),
            _ => Ok(()),
        }
    }

    fn on_register_write(&mut self, reg: u16, val: u8) {
        if self.page != 0 {
            return;
        }
        match (reg, val) {
            (0x09, 0x02) => self.poke(0, 0x06, 0x00),
            (0x09, 0x04) => self.poke(0, 0x06, 0x01),
            (0x14, 0x01) => {
                let go2 = self.peek(0, 0x06) | 0x80;
                self.poke(0, 0x06, go2);
                self.poke(0, 0x07, self.stop_code);
            }
            (0x14, 0x00) => {
                let go2 = self.peek(0, 0x06) & !0x80;
                self.poke(0, 0x06, go2);
            }
            _ => {}
        }
    }

    fn on_command(&mut self, data: &[u8]) {
        let len = data.len();
        if len < 12 {
            return;
        }
        let index = u16::from_be_bytes([data[0], data[1]]);
        let size = ((data[2] as usize) << 4) | ((data[3] as usize) >> 4);

        if len == 12 && data[8..] == [0x00, 0x02, 0x00, 0x08] {
            let mut host = vec![0u8; size + 12];
            host[..4].copy_from_slice(&data[..4]);
            let record = self.dci(index);
            let n = record.len().min(size);
            host[4..4 + n].copy_from_slice(&record[..n]);
            swap_buffer(&mut host);
            let page = self.page;
            self.poke_bytes(page, UI_CMD_START, &host);
        } else if data[len - 4] == 0x05 && data[len - 3] == 0x01 && len == size + 12 {
            let mut host = data[4..4 + size].to_vec();
            swap_buffer(&mut host);
            if index == self.model.output_indices().output_config && self.echo_frame_size {
                let mut range_config = self.dci(DCI_UI_RANGE_CONFIG);
                range_config.resize(12, 0);
                range_config[8..12].copy_from_slice(&host[..4]);
                self.dci.insert(DCI_UI_RANGE_CONFIG, range_config);
            }
            self.dci.insert(index, host);
            self.dci_writes.push(index);
        }
    }
}

impl Platform for MockSensor {
    type Error = MockError;

    fn read_multi(&mut self, reg: u16, rbuf: &mut [u8]) -> Result<(), MockError> {
        self.transfer()?;
        self.reads += 1;
        if reg == REG_PAGE {
            rbuf.fill(self.page);
            return Ok(());
        }
        for (k, b) in rbuf.iter_mut().enumerate() {
            *b = self.peek(self.page, reg.wrapping_add(k as u16));
        }
        Ok(())
    }

    fn write_multi(&mut self, reg: u16, wbuf: &[u8]) -> Result<(), MockError> {
        self.transfer()?;
        self.writes.push((self.page, reg, wbuf.to_vec()));
        if reg == REG_PAGE && wbuf.len() == 1 {
            self.page = wbuf[0];
            return Ok(());
        }
        let page = self.page;
        self.poke_bytes(page, reg, wbuf);
        if wbuf.len() == 1 {
            self.on_register_write(reg, wbuf[0]);
        }
        if reg as usize + wbuf.len() == UI_CMD_END as usize + 1 {
            self.on_command(wbuf);
        }
        Ok(())
    }

    fn wait_ms(&mut self, ms: u32) -> Result<(), MockError> {
        self.waited_ms += ms;
        Ok(())
    }

    fn reset_sensor(&mut self) -> Option<Result<(), MockError>> {
        if self.resettable {
            Some(Ok(()))
        } else {
            None
        }
    }

    fn address_changed(&mut self, address: SevenBitAddress) {
        self.address = address;
    }
}

/// Builds a frame in host order, laid out like the firmware streams it.
pub struct FrameBuilder {
    model: Model,
    resolution: Resolution,
    targets: usize,
    temperature: i8,
    frame_id: u16,
    footer_id: Option<u16>,
    oversize_distance: bool,
    nb_target_detected: [u8; MAX_ZONES],
    ambient: [u32; MAX_ZONES],
    distance: [i16; MAX_RESULTS],
    reflectance: [u8; MAX_RESULTS],
    status: [u8; MAX_RESULTS],
}

impl FrameBuilder {
    pub fn new(model: Model, resolution: Resolution, targets: u8) -> Self {
        FrameBuilder {
            model,
            resolution,
            targets: targets as usize,
            temperature: 25,
            frame_id: 0x0001,
            footer_id: None,
            oversize_distance: false,
            nb_target_detected: [0; MAX_ZONES],
            ambient: [0; MAX_ZONES],
            distance: [0; MAX_RESULTS],
            reflectance: [0; MAX_RESULTS],
            status: [0; MAX_RESULTS],
        }
    }

    pub fn temperature(&mut self, degc: i8) -> &mut Self {
        self.temperature = degc;
        self
    }

    pub fn frame_id(&mut self, id: u16) -> &mut Self {
        self.frame_id = id;
        self
    }

    pub fn footer_id(&mut self, id: u16) -> &mut Self {
        self.footer_id = Some(id);
        self
    }

    /// Report `targets` as `(raw distance, status)` pairs for `zone`.
    pub fn zone(&mut self, zone: usize, targets: &[(i16, u8)]) -> &mut Self {
        self.nb_target_detected[zone] = targets.len() as u8;
        self.ambient[zone] = (zone as u32 + 1) * 2048;
        for (j, &(distance, status)) in targets.iter().enumerate() {
            let idx = zone * self.targets + j;
            self.distance[idx] = distance;
            self.status[idx] = status;
            self.reflectance[idx] = 2 * (20 + zone as u8);
        }
        self
    }

    pub fn zone_without_target(&mut self, zone: usize) -> &mut Self {
        self.nb_target_detected[zone] = 0;
        self
    }

    /// Announce a distance block larger than the frame.
    pub fn oversize_distance_block(&mut self) -> &mut Self {
        self.oversize_distance = true;
        self
    }

    pub fn build(&self, size: usize) -> Vec<u8> {
        let zones = self.resolution.zones();
        let results = zones * self.targets;
        let layout = self
            .model
            .block_layout(TargetsPerZone::new(self.targets as u8).unwrap())
            .as_array();
        let enabled = output_enable_mask();

        let mut out = vec![0u8; size];
        out[8..10].copy_from_slice(&self.frame_id.to_be_bytes());

        let mut i = 16;
        // the start marker is not streamed
        for (n, &word) in layout.iter().enumerate().skip(1) {
            if enabled & (1 << n) == 0 {
                continue;
            }
            let mut bh = BlockHeader(word);
            if (0x01..0x0d).contains(&bh.bh_type()) {
                if (PER_ZONE_BLOCK_START..PER_ZONE_BLOCK_END).contains(&bh.bh_idx()) {
                    bh.set_bh_size(zones as u32);
                } else {
                    bh.set_bh_size(results as u32);
                }
            }
            let msize = if bh.bh_type() > 0x01 && bh.bh_type() < 0x0d {
                (bh.bh_type() * bh.bh_size()) as usize
            } else {
                bh.bh_size() as usize
            };

            if n == 8 && self.oversize_distance {
                bh.set_bh_size(0xFFF);
                out[i..i + 4].copy_from_slice(&bh.bh_bytes().to_le_bytes());
                break;
            }
            out[i..i + 4].copy_from_slice(&bh.bh_bytes().to_le_bytes());
            i += 4;

            let data = &mut out[i..i + msize];
            match n {
                1 => data[8] = self.temperature as u8,
                3 => from_u32_to_u8(&self.ambient[..zones], data),
                5 => data.copy_from_slice(&self.nb_target_detected[..zones]),
                8 => from_i16_to_u8(&self.distance[..results], data),
                9 => data.copy_from_slice(&self.reflectance[..results]),
                10 => data.copy_from_slice(&self.status[..results]),
                _ => {}
            }
            i += msize;
        }
        if !self.oversize_distance {
            assert_eq!(i + 12, size, "frame layout does not match the configured outputs");
        }

        let footer = self.footer_id.unwrap_or(self.frame_id);
        out[size - 4..size - 2].copy_from_slice(&footer.to_be_bytes());
        out
    }
}
