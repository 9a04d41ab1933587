use crate::config::Resolution;
use crate::consts::*;
use crate::session::SessionState;
use crate::utils::*;
use crate::{BlockHeader, Error, Platform, Vl53l5cx};

#[cfg(not(feature = "disable-motion-indicator"))]
use crate::motion_indicator::MotionIndicator;

const MAX_POLL_INTERVAL_MS: u32 = 100;
const STREAM_HEADER_SIZE: usize = 16;

/// One decoded ranging frame.
///
/// Per-zone arrays are indexed by zone, per-target arrays by
/// `zone * targets_per_zone + target`. Only the first `resolution.zones()`
/// zones carry data.
#[derive(Clone, Debug, PartialEq)]
pub struct RangingFrame {
    pub resolution: Resolution,
    pub targets_per_zone: u8,
    pub silicon_temp_degc: i8,
    #[cfg(not(feature = "disable-ambient-per-spad"))]
    pub ambient_per_spad: [u32; MAX_ZONES],
    pub nb_target_detected: [u8; MAX_ZONES],
    #[cfg(not(feature = "disable-nb-spads-enabled"))]
    pub nb_spads_enabled: [u32; MAX_ZONES],
    #[cfg(not(feature = "disable-signal-per-spad"))]
    pub signal_per_spad: [u32; MAX_RESULTS],
    #[cfg(not(feature = "disable-range-sigma-mm"))]
    pub range_sigma_mm: [u16; MAX_RESULTS],
    pub distance_mm: [i16; MAX_RESULTS],
    #[cfg(not(feature = "disable-reflectance-percent"))]
    pub reflectance: [u8; MAX_RESULTS],
    pub target_status: [u8; MAX_RESULTS],
    #[cfg(not(feature = "disable-motion-indicator"))]
    pub motion_indicator: MotionIndicator,
}

/// How far to trust one target of one zone.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Measurement {
    /// Target status 5, distance in mm.
    Valid(u16),
    /// Target status 6 or 9: usable with a lower confidence.
    SemiValid(u16, u8),
    Invalid(i16, u8),
    NoTarget,
}

impl RangingFrame {
    pub fn new() -> Self {
        RangingFrame {
            resolution: Resolution::R4x4,
            targets_per_zone: 1,
            silicon_temp_degc: 0,
            #[cfg(not(feature = "disable-ambient-per-spad"))]
            ambient_per_spad: [0; MAX_ZONES],
            nb_target_detected: [0; MAX_ZONES],
            #[cfg(not(feature = "disable-nb-spads-enabled"))]
            nb_spads_enabled: [0; MAX_ZONES],
            #[cfg(not(feature = "disable-signal-per-spad"))]
            signal_per_spad: [0; MAX_RESULTS],
            #[cfg(not(feature = "disable-range-sigma-mm"))]
            range_sigma_mm: [0; MAX_RESULTS],
            distance_mm: [0; MAX_RESULTS],
            #[cfg(not(feature = "disable-reflectance-percent"))]
            reflectance: [0; MAX_RESULTS],
            target_status: [0; MAX_RESULTS],
            #[cfg(not(feature = "disable-motion-indicator"))]
            motion_indicator: MotionIndicator::new(),
        }
    }

    pub fn zones(&self) -> usize {
        self.resolution.zones()
    }

    #[inline]
    pub fn index(&self, zone: usize, target: usize) -> usize {
        zone * self.targets_per_zone as usize + target
    }

    /// Classify one target of one zone. `None` when `zone` or `target` is
    /// outside the frame geometry.
    pub fn measurement(&self, zone: usize, target: usize) -> Option<Measurement> {
        if zone >= self.zones() || target >= self.targets_per_zone as usize {
            return None;
        }
        if target >= self.nb_target_detected[zone] as usize {
            return Some(Measurement::NoTarget);
        }
        let idx = self.index(zone, target);
        let distance = self.distance_mm[idx];
        let status = self.target_status[idx];
        Some(match status {
            5 => Measurement::Valid(distance.max(0) as u16),
            6 | 9 => Measurement::SemiValid(distance.max(0) as u16, status),
            _ => Measurement::Invalid(distance, status),
        })
    }

    /// Scale raw firmware fixed-point values to their units.
    fn convert(&mut self) {
        #[cfg(not(feature = "disable-ambient-per-spad"))]
        for v in self.ambient_per_spad.iter_mut() {
            *v /= 2048;
        }
        for d in self.distance_mm.iter_mut() {
            *d = (*d / 4).max(0);
        }
        #[cfg(not(feature = "disable-reflectance-percent"))]
        for r in self.reflectance.iter_mut() {
            *r /= 2;
        }
        #[cfg(not(feature = "disable-range-sigma-mm"))]
        for s in self.range_sigma_mm.iter_mut() {
            *s /= 128;
        }
        #[cfg(not(feature = "disable-signal-per-spad"))]
        for s in self.signal_per_spad.iter_mut() {
            *s /= 2048;
        }

        // zones without a target report status 255 on every target slot
        let targets = self.targets_per_zone as usize;
        for zone in 0..self.zones() {
            if self.nb_target_detected[zone] == 0 {
                self.target_status[zone * targets..(zone + 1) * targets].fill(255);
            }
        }

        #[cfg(not(feature = "disable-motion-indicator"))]
        for m in self.motion_indicator.motion.iter_mut() {
            *m /= 65535;
        }
    }
}

impl Default for RangingFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> Vl53l5cx<P> {
    /// Checks if a new frame is available. Each frame is reported once.
    ///
    /// # Return
    ///
    /// `true` when a frame can be read with [`Vl53l5cx::get_ranging_data`].
    /// A firmware error flag is reported as [`Error::Go2`].
    pub fn check_data_ready(&mut self) -> Result<bool, Error<P::Error>> {
        self.require(SessionState::Ranging)?;
        self.read_from_register(0x0000, 4)?;
        let b = [self.temp_buffer[0], self.temp_buffer[1], self.temp_buffer[2], self.temp_buffer[3]];

        if b[0] != self.streamcount && b[0] != 0xff && b[1] == 0x05 && b[2] & 0x05 == 0x05 && b[3] & 0x10 == 0x10 {
            self.streamcount = b[0];
            self.data_ready = true;
            return Ok(true);
        }
        // the error flag with a zero code carries no failure
        if b[3] & 0x80 != 0 && b[2] != 0 {
            error!("firmware error {=u8:#x}", b[2]);
            return Err(Error::Go2(b[2]));
        }
        Ok(false)
    }

    /// Poll [`Vl53l5cx::check_data_ready`] up to `max_polls` times,
    /// waiting `interval_ms` (at most 100) between polls.
    pub fn wait_for_data_ready(&mut self, max_polls: u32, interval_ms: u32) -> Result<(), Error<P::Error>> {
        let interval_ms = interval_ms.min(MAX_POLL_INTERVAL_MS);
        for _ in 0..max_polls {
            if self.check_data_ready()? {
                return Ok(());
            }
            self.delay(interval_ms)?;
        }
        Err(Error::Timeout)
    }

    /// Gets the frame flagged by [`Vl53l5cx::check_data_ready`].
    pub fn get_ranging_data(&mut self) -> Result<RangingFrame, Error<P::Error>> {
        let mut frame = RangingFrame::new();
        self.get_ranging_data_into(&mut frame)?;
        Ok(frame)
    }

    /// Same as [`Vl53l5cx::get_ranging_data`], decoding into a caller-owned frame.
    pub fn get_ranging_data_into(&mut self, frame: &mut RangingFrame) -> Result<(), Error<P::Error>> {
        self.require(SessionState::Ranging)?;
        if !self.data_ready {
            return Err(Error::NotReady);
        }
        self.data_ready = false;

        let size = self.data_read_size;
        self.read_from_register(0x0000, size)?;
        self.streamcount = self.temp_buffer[0];
        self.swap_temp_buffer(size);

        let layout = self.model.block_layout(self.targets_per_zone);
        let buf = &self.temp_buffer[..size];

        // a frame overwritten while being read has mismatching ids
        let header_id = u16::from_be_bytes([buf[0x08], buf[0x09]]);
        let footer_id = u16::from_be_bytes([buf[size - 4], buf[size - 3]]);
        if header_id != footer_id {
            warn!("frame id {=u16} vs footer {=u16}", header_id, footer_id);
            return Err(Error::CorruptedFrame);
        }

        // `frame` is only written once every block is known to be sound
        let mut i = STREAM_HEADER_SIZE;
        while i + 4 <= size {
            let (idx, msize) = read_block_header(buf, i);
            i += 4;
            if let Some(block) = Block::from_idx(&layout, idx) {
                if i + msize > size || !block.accepts(msize) {
                    error!("block {=u32:#x} of {=usize} bytes does not fit", idx, msize);
                    return Err(Error::CorruptedFrame);
                }
            }
            i += msize;
        }

        *frame = RangingFrame::new();
        frame.resolution = self.config.resolution;
        frame.targets_per_zone = self.targets_per_zone.get();

        let mut i = STREAM_HEADER_SIZE;
        while i + 4 <= size {
            let (idx, msize) = read_block_header(buf, i);
            i += 4;
            if let Some(block) = Block::from_idx(&layout, idx) {
                frame.read_block(block, &buf[i..i + msize]);
            }
            i += msize;
        }
        frame.convert();
        Ok(())
    }
}

/// Index and payload size of the block header at `pos`.
fn read_block_header(buf: &[u8], pos: usize) -> (u32, usize) {
    let bh = BlockHeader(read_u32(buf, pos));
    let msize = if bh.bh_type() > 0x01 && bh.bh_type() < 0x0d {
        bh.bh_type() * bh.bh_size()
    } else {
        bh.bh_size()
    };
    (bh.bh_idx(), msize as usize)
}

/// Blocks of a frame the driver decodes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Block {
    Metadata,
    AmbientRate,
    SpadCount,
    NbTargetDetected,
    SignalRate,
    RangeSigma,
    Distance,
    Reflectance,
    TargetStatus,
    MotionDetect,
}

impl Block {
    fn from_idx(layout: &BlockLayout, idx: u32) -> Option<Block> {
        [
            (layout.metadata, Block::Metadata),
            (layout.ambient_rate, Block::AmbientRate),
            (layout.spad_count, Block::SpadCount),
            (layout.nb_target_detected, Block::NbTargetDetected),
            (layout.signal_rate, Block::SignalRate),
            (layout.range_sigma_mm, Block::RangeSigma),
            (layout.distance, Block::Distance),
            (layout.reflectance, Block::Reflectance),
            (layout.target_status, Block::TargetStatus),
            (layout.motion_detect, Block::MotionDetect),
        ]
        .iter()
        .find(|(bh, _)| BlockHeader(*bh).bh_idx() == idx)
        .map(|&(_, block)| block)
    }

    /// Whether a payload of `msize` bytes can be decoded into a [`RangingFrame`].
    fn accepts(self, msize: usize) -> bool {
        match self {
            // temperature sits at byte 8
            Block::Metadata => msize >= 12,
            Block::MotionDetect => msize >= MOTION_INDICATOR_SIZE,
            Block::AmbientRate | Block::SpadCount => msize <= 4 * MAX_ZONES,
            Block::NbTargetDetected => msize <= MAX_ZONES,
            Block::SignalRate => msize <= 4 * MAX_RESULTS,
            Block::RangeSigma | Block::Distance => msize <= 2 * MAX_RESULTS,
            Block::Reflectance | Block::TargetStatus => msize <= MAX_RESULTS,
        }
    }
}

impl RangingFrame {
    /// `src` has been checked with [`Block::accepts`].
    fn read_block(&mut self, block: Block, src: &[u8]) {
        match block {
            Block::Metadata => self.silicon_temp_degc = src[8] as i8,
            #[cfg(not(feature = "disable-ambient-per-spad"))]
            Block::AmbientRate => from_u8_to_u32(src, &mut self.ambient_per_spad),
            #[cfg(not(feature = "disable-nb-spads-enabled"))]
            Block::SpadCount => from_u8_to_u32(src, &mut self.nb_spads_enabled),
            Block::NbTargetDetected => self.nb_target_detected[..src.len()].copy_from_slice(src),
            #[cfg(not(feature = "disable-signal-per-spad"))]
            Block::SignalRate => from_u8_to_u32(src, &mut self.signal_per_spad),
            #[cfg(not(feature = "disable-range-sigma-mm"))]
            Block::RangeSigma => from_u8_to_u16(src, &mut self.range_sigma_mm),
            Block::Distance => from_u8_to_i16(src, &mut self.distance_mm),
            #[cfg(not(feature = "disable-reflectance-percent"))]
            Block::Reflectance => self.reflectance[..src.len()].copy_from_slice(src),
            Block::TargetStatus => self.target_status[..src.len()].copy_from_slice(src),
            #[cfg(not(feature = "disable-motion-indicator"))]
            Block::MotionDetect => self.motion_indicator.read_from(src),
            #[allow(unreachable_patterns)]
            _ => {}
        }
    }
}
