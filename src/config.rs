use core::fmt;

use crate::consts::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Resolution {
    R4x4 = 16,
    R8x8 = 64,
}

impl Resolution {
    pub const fn zones(self) -> usize {
        self as usize
    }

    /// Number of zones on one side of the square grid.
    pub const fn side(self) -> usize {
        match self {
            Resolution::R4x4 => 4,
            Resolution::R8x8 => 8,
        }
    }

    pub const fn max_frequency_hz(self) -> u8 {
        match self {
            Resolution::R4x4 => 60,
            Resolution::R8x8 => 15,
        }
    }

    /// Integration windows making up one ranging period.
    pub const fn integration_slots(self) -> u32 {
        match self {
            Resolution::R4x4 => 1,
            Resolution::R8x8 => 4,
        }
    }

    pub const fn from_zones(zones: u8) -> Option<Self> {
        match zones {
            16 => Some(Resolution::R4x4),
            64 => Some(Resolution::R8x8),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TargetOrder {
    Closest = 1,
    Strongest = 2,
}

impl TargetOrder {
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(TargetOrder::Closest),
            2 => Some(TargetOrder::Strongest),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RangingMode {
    /// Back-to-back ranging at the highest rate. Integration time and frequency are ignored.
    Continuous = 1,
    Autonomous = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PowerMode {
    Sleep = 0,
    Wakeup = 1,
}

/// Supported product family.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Model {
    Vl53l5cx,
    Vl53l8cx,
}

impl Model {
    /// `(device_id, revision_id)` answered by a live sensor.
    pub const fn ids(self) -> (u8, u8) {
        match self {
            Model::Vl53l5cx => (0xF0, 0x02),
            Model::Vl53l8cx => (0xF0, 0x0C),
        }
    }

    pub const fn output_indices(self) -> DciOutputIndices {
        match self {
            Model::Vl53l5cx => L5CX_OUTPUT_INDICES,
            Model::Vl53l8cx => L8CX_OUTPUT_INDICES,
        }
    }

    pub const fn block_layout(self, targets: TargetsPerZone) -> BlockLayout {
        match (self, targets.get()) {
            (Model::Vl53l5cx, 1) => L5CX_SINGLE_TARGET_LAYOUT,
            (Model::Vl53l8cx, 1) => L8CX_SINGLE_TARGET_LAYOUT,
            _ => MULTI_TARGET_LAYOUT,
        }
    }

    pub const fn has_sync_pin(self) -> bool {
        matches!(self, Model::Vl53l8cx)
    }

    pub const fn has_laser_safety_check(self) -> bool {
        matches!(self, Model::Vl53l8cx)
    }
}

/// Targets reported per zone, `1..=4`. Must match what the firmware is told at init.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetsPerZone(u8);

impl TargetsPerZone {
    pub const ONE: TargetsPerZone = TargetsPerZone(1);

    pub const fn new(targets: u8) -> Result<Self, ConfigError> {
        if targets >= 1 && targets as usize <= MAX_TARGETS_PER_ZONE {
            Ok(TargetsPerZone(targets))
        } else {
            Err(ConfigError::TargetsPerZone(targets))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for TargetsPerZone {
    fn default() -> Self {
        TargetsPerZone::ONE
    }
}

/// Vendor tables uploaded by `init`. They are licensed separately and are not
/// shipped with this crate.
#[derive(Copy, Clone, Debug)]
pub struct Firmware {
    pub image: &'static [u8],
    pub default_configuration: &'static [u8],
    pub default_xtalk: &'static [u8],
    pub nvm_cmd: &'static [u8],
    /// CRC the sensor reports once the image booted, if the vendor release provides one.
    pub checksum: Option<u32>,
}

impl Firmware {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.is_empty() || self.image.len() > FIRMWARE_MAX_SIZE {
            return Err(ConfigError::FirmwareImage(self.image.len()));
        }
        if self.default_configuration.is_empty() || self.default_configuration.len() > CONFIGURATION_SIZE {
            return Err(ConfigError::DefaultConfiguration(self.default_configuration.len()));
        }
        if self.default_xtalk.len() != XTALK_BUFFER_SIZE {
            return Err(ConfigError::DefaultXtalk(self.default_xtalk.len()));
        }
        if self.nvm_cmd.is_empty() || self.nvm_cmd.len() > NVM_CMD_MAX_SIZE {
            return Err(ConfigError::NvmCommand(self.nvm_cmd.len()));
        }
        Ok(())
    }
}

/// Operating parameters of a session.
///
/// The driver keeps a snapshot of the last values written, so most checks can
/// run without a bus round-trip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Configuration {
    pub resolution: Resolution,
    pub target_order: TargetOrder,
    pub ranging_mode: RangingMode,
    pub power_mode: PowerMode,
    pub frequency_hz: u8,
    pub integration_time_ms: u32,
    pub sharpener_percent: u8,
}

impl Default for Configuration {
    /// Settings loaded by the vendor default configuration table.
    fn default() -> Self {
        Configuration {
            resolution: Resolution::R4x4,
            target_order: TargetOrder::Strongest,
            ranging_mode: RangingMode::Autonomous,
            power_mode: PowerMode::Wakeup,
            frequency_hz: 1,
            integration_time_ms: 5,
            sharpener_percent: 5,
        }
    }
}

impl Configuration {
    pub fn with_resolution(self, resolution: Resolution) -> Self {
        Configuration { resolution, ..self }
    }

    pub fn with_target_order(self, target_order: TargetOrder) -> Self {
        Configuration { target_order, ..self }
    }

    pub fn with_ranging_mode(self, ranging_mode: RangingMode) -> Self {
        Configuration { ranging_mode, ..self }
    }

    pub fn with_frequency_hz(self, frequency_hz: u8) -> Self {
        Configuration { frequency_hz, ..self }
    }

    pub fn with_integration_time_ms(self, integration_time_ms: u32) -> Self {
        Configuration { integration_time_ms, ..self }
    }

    pub fn with_sharpener_percent(self, sharpener_percent: u8) -> Self {
        Configuration { sharpener_percent, ..self }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_frequency(self.resolution, self.frequency_hz)?;
        check_integration_time(self.integration_time_ms)?;
        check_sharpener(self.sharpener_percent)?;
        check_ranging_period(self.resolution, self.ranging_mode, self.frequency_hz, self.integration_time_ms)
    }
}

pub(crate) fn check_frequency(resolution: Resolution, frequency_hz: u8) -> Result<(), ConfigError> {
    if frequency_hz == 0 || frequency_hz > resolution.max_frequency_hz() {
        return Err(ConfigError::Frequency { resolution, frequency_hz });
    }
    Ok(())
}

pub(crate) fn check_integration_time(integration_time_ms: u32) -> Result<(), ConfigError> {
    if !(2..=1000).contains(&integration_time_ms) {
        return Err(ConfigError::IntegrationTime(integration_time_ms));
    }
    Ok(())
}

pub(crate) fn check_sharpener(sharpener_percent: u8) -> Result<(), ConfigError> {
    if sharpener_percent > 99 {
        return Err(ConfigError::Sharpener(sharpener_percent));
    }
    Ok(())
}

/// All integration windows plus 1 ms of overhead must fit in one ranging period.
pub(crate) fn check_ranging_period(
    resolution: Resolution,
    ranging_mode: RangingMode,
    frequency_hz: u8,
    integration_time_ms: u32,
) -> Result<(), ConfigError> {
    if ranging_mode == RangingMode::Continuous {
        return Ok(());
    }
    let busy = (integration_time_ms + 1) * resolution.integration_slots() * frequency_hz as u32;
    if busy >= 1000 {
        return Err(ConfigError::RangingPeriod { integration_time_ms, frequency_hz });
    }
    Ok(())
}

/// Why a parameter was refused before reaching the bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    Frequency { resolution: Resolution, frequency_hz: u8 },
    IntegrationTime(u32),
    Sharpener(u8),
    RangingPeriod { integration_time_ms: u32, frequency_hz: u8 },
    TargetsPerZone(u8),
    I2cAddress(u8),
    MotionDistance { min_mm: u16, max_mm: u16 },
    FirmwareImage(usize),
    DefaultConfiguration(usize),
    DefaultXtalk(usize),
    NvmCommand(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Frequency { resolution, frequency_hz } => write!(
                f,
                "{} Hz is outside 1..={} Hz for {:?}",
                frequency_hz,
                resolution.max_frequency_hz(),
                resolution
            ),
            ConfigError::IntegrationTime(ms) => write!(f, "integration time {} ms is outside 2..=1000 ms", ms),
            ConfigError::Sharpener(pc) => write!(f, "sharpener {}% is above 99%", pc),
            ConfigError::RangingPeriod { integration_time_ms, frequency_hz } => write!(
                f,
                "integration time {} ms does not fit a {} Hz ranging period",
                integration_time_ms, frequency_hz
            ),
            ConfigError::TargetsPerZone(n) => write!(f, "{} targets per zone is outside 1..=4", n),
            ConfigError::I2cAddress(addr) => write!(f, "{:#04x} is not a 7-bit address", addr),
            ConfigError::MotionDistance { min_mm, max_mm } => {
                write!(f, "motion window {}..{} mm is not supported", min_mm, max_mm)
            }
            ConfigError::FirmwareImage(len) => write!(f, "firmware image of {} bytes", len),
            ConfigError::DefaultConfiguration(len) => write!(f, "default configuration of {} bytes", len),
            ConfigError::DefaultXtalk(len) => write!(f, "default xtalk of {} bytes, expected 776", len),
            ConfigError::NvmCommand(len) => write!(f, "NVM command of {} bytes", len),
        }
    }
}
