use core::fmt;

/// Raw 8-bit outcome reported by the sensor runtime.
///
/// Status bytes coming from the transport and from the firmware are OR-merged
/// by the vendor runtime, so only [`Status::OK`] has a guaranteed meaning. The
/// named constants follow the official convention, which is incomplete: any
/// other bit pattern is an opaque combination and is never decomposed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    pub const OK: Status = Status(0);
    pub const TIMEOUT: Status = Status(1);
    pub const CORRUPTED_FRAME: Status = Status(2);
    /// `CRC_CSUM_FAILED` on VL53L5CX, firmware checksum / laser safety on VL53L8CX.
    pub const CRC_FAILED: Status = Status(3);
    pub const XTALK_FAILED: Status = Status(4);
    pub const MCU_ERROR: Status = Status(66);
    pub const INVALID_PARAM: Status = Status(127);
    pub const ERROR: Status = Status(255);

    #[inline]
    pub const fn is_ok(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_err(self) -> bool {
        self.0 != 0
    }

    /// Advisory reading of the code. Unlisted values stay [`StatusKind::Unknown`].
    pub const fn kind(self) -> StatusKind {
        match self.0 {
            0 => StatusKind::Ok,
            1 => StatusKind::Timeout,
            2 => StatusKind::CorruptedFrame,
            3 => StatusKind::CrcFailed,
            4 => StatusKind::XtalkFailed,
            66 => StatusKind::McuError,
            127 => StatusKind::InvalidParam,
            255 => StatusKind::Error,
            other => StatusKind::Unknown(other),
        }
    }

    /// Merge another code into this one, the way the vendor runtime accumulates them.
    #[inline]
    pub const fn merge(self, other: Status) -> Status {
        Status(self.0 | other.0)
    }

    pub fn into_result(self) -> Result<(), Status> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<u8> for Status {
    fn from(raw: u8) -> Self {
        Status(raw)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            StatusKind::Unknown(raw) => write!(f, "combined failure ({:#04x})", raw),
            kind => write!(f, "{:?} ({})", kind, self.0),
        }
    }
}

/// Named reading of a [`Status`]. Not exhaustive by nature.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusKind {
    Ok,
    Timeout,
    CorruptedFrame,
    CrcFailed,
    XtalkFailed,
    McuError,
    InvalidParam,
    Error,
    /// Any other bit pattern: an unspecified mix of failures.
    Unknown(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_is_the_only_success() {
        for raw in 0..=u8::MAX {
            let status = Status(raw);
            assert_eq!(status.is_ok(), raw == 0);
            assert_eq!(status.is_err(), raw != 0);
            assert_eq!(status.into_result().is_ok(), raw == 0);
        }
    }

    #[test]
    fn named_values_are_advisory() {
        assert_eq!(Status::TIMEOUT.kind(), StatusKind::Timeout);
        assert_eq!(Status::MCU_ERROR.kind(), StatusKind::McuError);
        assert_eq!(Status::INVALID_PARAM.kind(), StatusKind::InvalidParam);
        assert_eq!(Status(0x83).kind(), StatusKind::Unknown(0x83));
    }

    #[test]
    fn merged_codes_are_not_decoded() {
        // timeout | corrupted frame
        let merged = Status::TIMEOUT.merge(Status::CORRUPTED_FRAME);
        assert_eq!(merged, Status::CRC_FAILED);
        let merged = Status::MCU_ERROR.merge(Status::TIMEOUT);
        assert_eq!(merged.kind(), StatusKind::Unknown(67));
    }

    proptest! {
        #[test]
        fn kind_round_trips_raw_value(raw in any::<u8>()) {
            let kind = Status(raw).kind();
            prop_assert_eq!(kind == StatusKind::Ok, raw == 0);
            if let StatusKind::Unknown(v) = kind {
                prop_assert_eq!(v, raw);
            }
        }
    }
}
