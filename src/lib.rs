//! Ultra-lite driver for the VL53L5CX and VL53L8CX multizone time-of-flight
//! sensors.
//!
//! The driver owns a [`Platform`] (bus, delay and optional reset line), uploads
//! the vendor firmware during [`Vl53l5cx::init`] and then streams ranging
//! frames:
//!
//! ```ignore
//! let mut sensor = Vl53l5cx::new(bus, Model::Vl53l5cx, TargetsPerZone::ONE, firmware)?;
//! sensor.init()?;
//! sensor.set_resolution(Resolution::R8x8)?;
//! sensor.set_frequency_hz(10)?;
//! sensor.start_ranging()?;
//! loop {
//!     sensor.wait_for_data_ready(100, 5)?;
//!     let frame = sensor.get_ranging_data()?;
//!     // frame.measurement(zone, 0) ...
//! }
//! ```
#![cfg_attr(not(test), no_std)]

// must stay first so the logging macros are visible to every module
mod fmt;

mod accessors;
pub mod bus_operation;
pub mod config;
pub mod consts;
mod driver;
pub mod motion_indicator;
pub mod platform;
pub mod results;
mod session;
pub mod status;
pub mod utils;

#[cfg(test)]
mod mock;

use core::fmt as core_fmt;

use bitfield::bitfield;

pub use bus_operation::{I2cBus, NoPin, PlatformError, SpiBus};
pub use config::{
    ConfigError, Configuration, Firmware, Model, PowerMode, RangingMode, Resolution, TargetOrder, TargetsPerZone,
};
pub use motion_indicator::{MotionConfiguration, MotionIndicator};
pub use platform::Platform;
pub use results::{Measurement, RangingFrame};
pub use session::SessionState;
pub use status::{Status, StatusKind};

use consts::*;

bitfield! {
    #[derive(Copy, Clone, PartialEq, Eq)]
    pub struct BlockHeader(u32);
    impl Debug;
    pub bh_bytes, _: 31, 0;
    pub bh_idx, set_bh_idx: 31, 16;
    pub bh_size, set_bh_size: 15, 4;
    pub bh_type, set_bh_type: 3, 0;
}

pub struct Vl53l5cx<P: Platform> {
    platform: P,
    model: Model,
    targets_per_zone: TargetsPerZone,
    firmware: Firmware,

    state: SessionState,
    config: Configuration,
    data_ready: bool,

    temp_buffer: [u8; TEMPORARY_BUFFER_SIZE],
    offset_data: [u8; OFFSET_BUFFER_SIZE],
    xtalk_data: [u8; XTALK_BUFFER_SIZE],
    streamcount: u8,
    data_read_size: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The platform failed a transfer or a wait.
    Bus(E),
    /// The sensor did not answer within the polling budget.
    Timeout,
    Mcu,
    /// Firmware error raised while streaming, raw code included.
    Go2(u8),
    CorruptedFrame,
    InvalidParam,
    CheckSumFail,
    LaserSafety,
    /// No new frame was flagged by [`Vl53l5cx::check_data_ready`].
    NotReady,
    InvalidState { expected: SessionState, actual: SessionState },
    /// The sensor is in [`PowerMode::Sleep`].
    Asleep,
    /// Opaque code accumulated from several failures.
    Status(Status),
    Other,
}

impl<E> Error<E> {
    /// Status code the vendor runtime would have reported for this failure.
    pub fn status(&self) -> Status {
        match self {
            Error::Bus(_) | Error::Other => Status::ERROR,
            Error::Timeout => Status::TIMEOUT,
            Error::Mcu => Status::MCU_ERROR,
            Error::Go2(0) => Status::ERROR,
            Error::Go2(code) => Status(*code),
            Error::CorruptedFrame => Status::CORRUPTED_FRAME,
            Error::CheckSumFail | Error::LaserSafety => Status::CRC_FAILED,
            Error::InvalidParam | Error::NotReady | Error::InvalidState { .. } | Error::Asleep => {
                Status::INVALID_PARAM
            }
            Error::Status(status) => *status,
        }
    }
}

impl<E> From<ConfigError> for Error<E> {
    fn from(_: ConfigError) -> Self {
        Error::InvalidParam
    }
}

impl<E: core_fmt::Debug> core_fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core_fmt::Formatter<'_>) -> core_fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::Timeout => f.write_str("sensor did not answer in time"),
            Error::Mcu => f.write_str("sensor MCU error"),
            Error::Go2(code) => write!(f, "firmware error {:#04x}", code),
            Error::CorruptedFrame => f.write_str("corrupted frame"),
            Error::InvalidParam => f.write_str("invalid parameter"),
            Error::CheckSumFail => f.write_str("firmware checksum mismatch"),
            Error::LaserSafety => f.write_str("laser safety fault"),
            Error::NotReady => f.write_str("no new ranging data"),
            Error::InvalidState { expected, actual } => {
                write!(f, "operation needs {:?} but session is {:?}", expected, actual)
            }
            Error::Asleep => f.write_str("sensor is asleep"),
            Error::Status(status) => write!(f, "{}", status),
            Error::Other => f.write_str("unexpected sensor answer"),
        }
    }
}

impl<P: Platform> Vl53l5cx<P> {
    /// Build a handle without touching the bus. Call [`Vl53l5cx::init`] next.
    pub fn new(
        platform: P,
        model: Model,
        targets_per_zone: TargetsPerZone,
        firmware: Firmware,
    ) -> Result<Self, Error<P::Error>> {
        if let Err(e) = firmware.validate() {
            error!("rejected firmware tables");
            return Err(e.into());
        }
        Ok(Vl53l5cx {
            platform,
            model,
            targets_per_zone,
            firmware,
            state: SessionState::Uninitialized,
            config: Configuration::default(),
            data_ready: false,
            temp_buffer: [0; TEMPORARY_BUFFER_SIZE],
            offset_data: [0; OFFSET_BUFFER_SIZE],
            xtalk_data: [0; XTALK_BUFFER_SIZE],
            streamcount: 255,
            data_read_size: 0,
        })
    }

    /// Give the platform back. A streaming sensor keeps streaming: stop it first.
    pub fn free(self) -> P {
        if self.state == SessionState::Ranging {
            warn!("releasing a sensor that is still ranging");
        }
        self.platform
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn targets_per_zone(&self) -> TargetsPerZone {
        self.targets_per_zone
    }

    /// Last configuration written through this handle.
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn platform(&mut self) -> &mut P {
        &mut self.platform
    }
}
