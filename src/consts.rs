use embedded_hal::i2c::SevenBitAddress;

pub const DEFAULT_I2C_ADDRESS: SevenBitAddress = 0x52 >> 1;

pub const DEFAULT_I2C_BUFFER_LEN: usize = 32;
pub const DEFAULT_SPI_BUFFER_LEN: usize = 128;
pub const MAX_CHUNK_SIZE: usize = 256;

pub const MAX_ZONES: usize = 64;
pub const MAX_TARGETS_PER_ZONE: usize = 4;
pub const MAX_RESULTS: usize = MAX_ZONES * MAX_TARGETS_PER_ZONE;

pub const NVM_DATA_SIZE: usize = 492;
pub const CONFIGURATION_SIZE: usize = 972;
pub const OFFSET_BUFFER_SIZE: usize = 488;
pub const XTALK_BUFFER_SIZE: usize = 776;
pub const FIRMWARE_PAGE_SIZE: usize = 0x8000;
pub const FIRMWARE_MAX_SIZE: usize = 3 * FIRMWARE_PAGE_SIZE;
pub const FIRMWARE_FIRST_PAGE: u8 = 0x09;
pub const NVM_CMD_MAX_SIZE: usize = 40;
pub const MOTION_CONFIG_SIZE: usize = 156;
pub const MOTION_INDICATOR_SIZE: usize = 140;

pub const DCI_FREQ_HZ: u16 = 0x5458;
pub const DCI_INT_TIME: u16 = 0x545C;
pub const DCI_RANGING_MODE: u16 = 0xAD30;
pub const DCI_DSS_CONFIG: u16 = 0xAD38;
pub const DCI_VHV_CONFIG: u16 = 0xAD60;
pub const DCI_TARGET_ORDER: u16 = 0xAE64;
pub const DCI_SHARPENER: u16 = 0xAED8;
pub const DCI_SYNC_PIN: u16 = 0xB5F0;
pub const DCI_MOTION_DETECTOR_CFG: u16 = 0xBFAC;
pub const DCI_ZONE_CONFIG: u16 = 0x5450;
pub const DCI_FW_NB_TARGET: u16 = 0x5478;
pub const DCI_UI_RANGE_CONFIG: u16 = 0x5440;
pub const DCI_LASER_SAFETY: u16 = 0xE0C4;
pub const DCI_GLARE_FILTER: u16 = 0xE108;

pub const UI_CMD_STATUS: u16 = 0x2C00;
pub const UI_CMD_START: u16 = 0x2C04;
pub const UI_CMD_END: u16 = 0x2FFF;
pub const UI_DEFAULT_CONFIGURATION: u16 = 0x2C34;
pub const UI_XTALK: u16 = 0x2CF8;
pub const UI_OFFSET: u16 = 0x2E18;
pub const UI_NVM_CMD: u16 = 0x2FD8;
pub const UI_CHECKSUM: u16 = 0x2FFC;

pub const REG_PAGE: u16 = 0x7FFF;

/// Output bookkeeping indices, which moved between the two product families.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DciOutputIndices {
    pub single_range: u16,
    pub output_config: u16,
    pub output_enables: u16,
    pub output_list: u16,
    pub pipe_control: u16,
}

pub const L5CX_OUTPUT_INDICES: DciOutputIndices = DciOutputIndices {
    single_range: 0xCD5C,
    output_config: 0xCD60,
    output_enables: 0xCD68,
    output_list: 0xCD78,
    pipe_control: 0xCF78,
};

pub const L8CX_OUTPUT_INDICES: DciOutputIndices = DciOutputIndices {
    single_range: 0xD964,
    output_config: 0xD968,
    output_enables: 0xD970,
    output_list: 0xD980,
    pipe_control: 0xDB80,
};

/// Block headers requested from the firmware, in output list order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockLayout {
    pub start: u32,
    pub metadata: u32,
    pub common_data: u32,
    pub ambient_rate: u32,
    pub spad_count: u32,
    pub nb_target_detected: u32,
    pub signal_rate: u32,
    pub range_sigma_mm: u32,
    pub distance: u32,
    pub reflectance: u32,
    pub target_status: u32,
    pub motion_detect: u32,
}

impl BlockLayout {
    pub const fn as_array(&self) -> [u32; 12] {
        [
            self.start,
            self.metadata,
            self.common_data,
            self.ambient_rate,
            self.spad_count,
            self.nb_target_detected,
            self.signal_rate,
            self.range_sigma_mm,
            self.distance,
            self.reflectance,
            self.target_status,
            self.motion_detect,
        ]
    }
}

const START_BH: u32 = 0x0000000D;
const METADATA_BH: u32 = 0x54B400C0;
const COMMONDATA_BH: u32 = 0x54C00040;
const AMBIENT_RATE_BH: u32 = 0x54D00104;
const SPAD_COUNT_BH: u32 = 0x55D00404;

pub const L5CX_SINGLE_TARGET_LAYOUT: BlockLayout = BlockLayout {
    start: START_BH,
    metadata: METADATA_BH,
    common_data: COMMONDATA_BH,
    ambient_rate: AMBIENT_RATE_BH,
    spad_count: SPAD_COUNT_BH,
    nb_target_detected: 0xCF7C0401,
    signal_rate: 0xCFBC0404,
    range_sigma_mm: 0xD2BC0402,
    distance: 0xD33C0402,
    reflectance: 0xD43C0401,
    target_status: 0xD47C0401,
    motion_detect: 0xCC5008C0,
};

pub const L8CX_SINGLE_TARGET_LAYOUT: BlockLayout = BlockLayout {
    start: START_BH,
    metadata: METADATA_BH,
    common_data: COMMONDATA_BH,
    ambient_rate: AMBIENT_RATE_BH,
    spad_count: SPAD_COUNT_BH,
    nb_target_detected: 0xDB840401,
    signal_rate: 0xDBC40404,
    range_sigma_mm: 0xDEC40402,
    distance: 0xDF440402,
    reflectance: 0xE0440401,
    target_status: 0xE0840401,
    motion_detect: 0xD85808C0,
};

/// Both families share this layout once more than one target per zone is reported.
pub const MULTI_TARGET_LAYOUT: BlockLayout = BlockLayout {
    start: START_BH,
    metadata: METADATA_BH,
    common_data: COMMONDATA_BH,
    ambient_rate: AMBIENT_RATE_BH,
    spad_count: SPAD_COUNT_BH,
    nb_target_detected: 0x57D00401,
    signal_rate: 0x58900404,
    range_sigma_mm: 0x64900402,
    distance: 0x66900402,
    reflectance: 0x6A900401,
    target_status: 0x6B900401,
    motion_detect: 0xCC5008C0,
};

/// Blocks in this index window carry one value per zone, whatever the target count.
pub const PER_ZONE_BLOCK_START: u32 = 0x54D0;
pub const PER_ZONE_BLOCK_END: u32 = 0x54D0 + 960;

// Bit positions in the first output enable word, matching `BlockLayout::as_array`.
pub const OUTPUT_ALWAYS_ON: u32 = 0x7;
pub const OUTPUT_AMBIENT_RATE: u32 = 1 << 3;
pub const OUTPUT_SPAD_COUNT: u32 = 1 << 4;
pub const OUTPUT_NB_TARGET_DETECTED: u32 = 1 << 5;
pub const OUTPUT_SIGNAL_RATE: u32 = 1 << 6;
pub const OUTPUT_RANGE_SIGMA_MM: u32 = 1 << 7;
pub const OUTPUT_DISTANCE: u32 = 1 << 8;
pub const OUTPUT_REFLECTANCE: u32 = 1 << 9;
pub const OUTPUT_TARGET_STATUS: u32 = 1 << 10;
pub const OUTPUT_MOTION_DETECT: u32 = 1 << 11;

const AMB_SIZE: usize = if cfg!(feature = "disable-ambient-per-spad") { 0 } else { 4 * MAX_ZONES + 4 };
const SPAD_SIZE: usize = if cfg!(feature = "disable-nb-spads-enabled") { 0 } else { 4 * MAX_ZONES + 4 };
const NTAR_SIZE: usize = MAX_ZONES + 4;
const SPS_SIZE: usize = if cfg!(feature = "disable-signal-per-spad") { 0 } else { 4 * MAX_RESULTS + 4 };
const SIGR_SIZE: usize = if cfg!(feature = "disable-range-sigma-mm") { 0 } else { 2 * MAX_RESULTS + 4 };
const DIST_SIZE: usize = 2 * MAX_RESULTS + 4;
const RFLEST_SIZE: usize = if cfg!(feature = "disable-reflectance-percent") { 0 } else { MAX_RESULTS + 4 };
const STA_SIZE: usize = MAX_RESULTS + 4;
const MOT_SIZE: usize = if cfg!(feature = "disable-motion-indicator") { 0 } else { MOTION_INDICATOR_SIZE + 4 };

pub const MAX_RESULTS_SIZE: usize = 40
    + AMB_SIZE + SPAD_SIZE + NTAR_SIZE + SPS_SIZE
    + SIGR_SIZE + DIST_SIZE + RFLEST_SIZE + STA_SIZE
    + MOT_SIZE + 20;

pub const TEMPORARY_BUFFER_SIZE: usize = if MAX_RESULTS_SIZE < 1024 { 1024 } else { MAX_RESULTS_SIZE };
