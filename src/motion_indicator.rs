use crate::config::{ConfigError, Resolution};
use crate::consts::*;
use crate::utils::*;
use crate::{Error, Platform, Vl53l5cx};

const MIN_DISTANCE_MM: u16 = 400;
const MAX_DISTANCE_MM: u16 = 4000;
const MAX_DISTANCE_SPAN_MM: u16 = 1500;

/// Parameters of the firmware motion detector. Start from
/// [`Vl53l5cx::motion_indicator_init`], then tune the distance window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionConfiguration {
    pub ref_bin_offset: i32,
    pub detection_threshold: u32,
    pub extra_noise_sigma: u32,
    pub null_den_clip_value: u32,
    pub mem_update_mode: u8,
    pub mem_update_choice: u8,
    pub sum_span: u8,
    pub feature_length: u8,
    pub nb_of_aggregates: u8,
    pub nb_of_temporal_accumulations: u8,
    pub min_nb_for_global_detection: u8,
    pub global_indicator_format_1: u8,
    pub global_indicator_format_2: u8,
    pub spare_1: u8,
    pub spare_2: u8,
    pub spare_3: u8,
    /// Aggregate each zone contributes to, `-1` for unused zones.
    pub map_id: [i8; 64],
    pub indicator_format_1: [u8; 32],
    pub indicator_format_2: [u8; 32],
}

impl Default for MotionConfiguration {
    fn default() -> Self {
        let mut config = MotionConfiguration {
            ref_bin_offset: 13633,
            detection_threshold: 2883584,
            extra_noise_sigma: 0,
            null_den_clip_value: 0,
            mem_update_mode: 6,
            mem_update_choice: 2,
            sum_span: 4,
            feature_length: 9,
            nb_of_aggregates: 16,
            nb_of_temporal_accumulations: 16,
            min_nb_for_global_detection: 1,
            global_indicator_format_1: 8,
            global_indicator_format_2: 0,
            spare_1: 0,
            spare_2: 0,
            spare_3: 0,
            map_id: [-1; 64],
            indicator_format_1: [0; 32],
            indicator_format_2: [0; 32],
        };
        config.set_resolution(Resolution::R4x4);
        config
    }
}

impl MotionConfiguration {
    /// Map zones onto the 16 aggregates: one per zone in 4x4, one per 2x4
    /// block of zones in 8x8.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::R4x4 => {
                for (i, id) in self.map_id.iter_mut().enumerate() {
                    *id = if i < 16 { i as i8 } else { -1 };
                }
            }
            Resolution::R8x8 => {
                for (i, id) in self.map_id.iter_mut().enumerate() {
                    *id = ((i % 8) / 2 + 4 * (i / 16)) as i8;
                }
            }
        }
    }

    /// Restrict detection to `[min_mm, max_mm]`. The window must sit within
    /// 400..=4000 mm and span at most 1500 mm.
    pub fn set_distance(&mut self, min_mm: u16, max_mm: u16) -> Result<(), ConfigError> {
        if max_mm < min_mm
            || max_mm - min_mm > MAX_DISTANCE_SPAN_MM
            || min_mm < MIN_DISTANCE_MM
            || max_mm > MAX_DISTANCE_MM
        {
            return Err(ConfigError::MotionDistance { min_mm, max_mm });
        }
        self.ref_bin_offset = ((min_mm as f32 / 37.5348 - 4.0) * 2048.5) as i32;
        self.feature_length = (((max_mm - min_mm) as f32 / 10.0 + 30.02784) / 15.01392 + 0.5) as u8;
        Ok(())
    }

    /// Little-endian record as stored by the firmware.
    pub fn to_bytes(&self) -> [u8; MOTION_CONFIG_SIZE] {
        let mut buf = [0u8; MOTION_CONFIG_SIZE];
        buf[0..4].copy_from_slice(&self.ref_bin_offset.to_le_bytes());
        from_u32_to_u8(
            &[self.detection_threshold, self.extra_noise_sigma, self.null_den_clip_value],
            &mut buf[4..16],
        );
        buf[16..28].copy_from_slice(&[
            self.mem_update_mode,
            self.mem_update_choice,
            self.sum_span,
            self.feature_length,
            self.nb_of_aggregates,
            self.nb_of_temporal_accumulations,
            self.min_nb_for_global_detection,
            self.global_indicator_format_1,
            self.global_indicator_format_2,
            self.spare_1,
            self.spare_2,
            self.spare_3,
        ]);
        for (b, id) in buf[28..92].iter_mut().zip(self.map_id.iter()) {
            *b = *id as u8;
        }
        buf[92..124].copy_from_slice(&self.indicator_format_1);
        buf[124..156].copy_from_slice(&self.indicator_format_2);
        buf
    }
}

/// Motion block of a ranging frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotionIndicator {
    pub global_indicator_1: u32,
    pub global_indicator_2: u32,
    pub status: u8,
    pub nb_of_detected_aggregates: u8,
    pub nb_of_aggregates: u8,
    pub spare: u8,
    pub motion: [u32; 32],
}

impl MotionIndicator {
    pub const fn new() -> Self {
        MotionIndicator {
            global_indicator_1: 0,
            global_indicator_2: 0,
            status: 0,
            nb_of_detected_aggregates: 0,
            nb_of_aggregates: 0,
            spare: 0,
            motion: [0; 32],
        }
    }

    /// Decode the 140-byte block. `src` must hold at least that many bytes.
    pub(crate) fn read_from(&mut self, src: &[u8]) {
        self.global_indicator_1 = read_u32(src, 0);
        self.global_indicator_2 = read_u32(src, 4);
        self.status = src[8];
        self.nb_of_detected_aggregates = src[9];
        self.nb_of_aggregates = src[10];
        self.spare = src[11];
        from_u8_to_u32(&src[12..MOTION_INDICATOR_SIZE], &mut self.motion);
    }
}

impl Default for MotionIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Platform> Vl53l5cx<P> {
    /// Program the default motion detector for `resolution`.
    ///
    /// # Return
    ///
    /// The configuration written, to be tuned and written again with the
    /// other `motion_indicator_*` functions.
    pub fn motion_indicator_init(&mut self, resolution: Resolution) -> Result<MotionConfiguration, Error<P::Error>> {
        let mut config = MotionConfiguration::default();
        self.motion_indicator_set_resolution(&mut config, resolution)?;
        Ok(config)
    }

    /// Remap the motion aggregates after a resolution change. Must follow
    /// every call to [`Vl53l5cx::set_resolution`] when motion is in use.
    pub fn motion_indicator_set_resolution(
        &mut self,
        config: &mut MotionConfiguration,
        resolution: Resolution,
    ) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        config.set_resolution(resolution);
        self.write_motion_configuration(config)
    }

    /// Change the distance window where motion is detected.
    ///
    /// # Arguments
    ///
    /// * `min_mm` : lower bound, 400 mm at least.
    /// * `max_mm` : upper bound, 4000 mm at most and within 1500 mm of `min_mm`.
    pub fn motion_indicator_set_distance(
        &mut self,
        config: &mut MotionConfiguration,
        min_mm: u16,
        max_mm: u16,
    ) -> Result<(), Error<P::Error>> {
        self.require_configurable()?;
        let mut updated = *config;
        updated.set_distance(min_mm, max_mm)?;
        self.write_motion_configuration(&updated)?;
        *config = updated;
        Ok(())
    }

    fn write_motion_configuration(&mut self, config: &MotionConfiguration) -> Result<(), Error<P::Error>> {
        self.temp_buffer[..MOTION_CONFIG_SIZE].copy_from_slice(&config.to_bytes());
        self.dci_write_data(DCI_MOTION_DETECTOR_CFG, MOTION_CONFIG_SIZE)
    }
}
