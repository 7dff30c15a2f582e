//! Machine state enumerations carried in TAG files, cell passes and event lists.
//!
//! Every enumeration is transmitted as a small unsigned code; codes outside the defined range are
//! rejected by the value matchers.

use serde::{Deserialize, Serialize};

macro_rules! coded_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn from_code(code: u64) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn code(self) -> u8 {
                match self {
                    $($name::$variant => $code,)+
                }
            }
        }
    };
}

coded_enum!(
    /// Quality of the GNSS fix
    GpsMode {
        Old = 0,
        Fixed = 1,
        Float = 2,
        Autonomous = 3,
        Differential = 4,
        Sbas = 5,
        LocationRtk = 6,
        Unknown = 7,
        NoGps = 8,
    }
);

coded_enum!(
    /// Accuracy class, stored in the top two bits of the GPS accuracy word
    GpsAccuracy {
        Fine = 0,
        Medium = 1,
        Coarse = 2,
        Unknown = 3,
    }
);

coded_enum!(
    /// Whether the working edge is reported as touching the ground
    OnGroundState {
        No = 0,
        YesLegacy = 1,
        YesMachineConfig = 2,
        YesMachineHardware = 3,
        YesMachineSoftware = 4,
        YesRemoteSwitch = 5,
        Unknown = 6,
    }
);

coded_enum!(
    MachineGear {
        Neutral = 0,
        Forward = 1,
        Reverse = 2,
        SensorFailed = 3,
        Forward2 = 4,
        Forward3 = 5,
        Forward4 = 6,
        Forward5 = 7,
        Reverse2 = 8,
        Reverse3 = 9,
        Reverse4 = 10,
        Reverse5 = 11,
    }
);

coded_enum!(
    VibrationState {
        Off = 0,
        On = 1,
        Invalid = 2,
    }
);

coded_enum!(
    ElevationMappingMode {
        LatestElevation = 0,
        MinimumElevation = 1,
    }
);

coded_enum!(
    PositioningTech {
        Gps = 0,
        Uts = 1,
    }
);

coded_enum!(
    CoordinateSystemType {
        NoSystem = 0,
        Automatic = 1,
        Project = 2,
    }
);

coded_enum!(
    /// Lifecycle markers that do not rasterize
    DiscreteEventKind {
        MachineStartup = 0,
        MachineShutdown = 1,
        MapReset = 2,
        UtsMode = 3,
        StartProofing = 4,
        EndProofing = 5,
    }
);

/// Start/end of recorded data markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordedData {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStartupShutdown {
    Startup,
    Shutdown,
}

/// Decode the GPS accuracy word: accuracy class in bits 15-14, error limit in mm in bits 13-0
pub fn split_gps_accuracy_word(word: u16) -> (GpsAccuracy, u16) {
    let accuracy = GpsAccuracy::from_code(u64::from(word >> 14)).unwrap_or(GpsAccuracy::Unknown);
    (accuracy, word & 0x3FFF)
}

pub fn gps_accuracy_word(accuracy: GpsAccuracy, error_limit_mm: u16) -> u16 {
    (u16::from(accuracy.code()) << 14) | (error_limit_mm & 0x3FFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_and_out_of_range() {
        assert_eq!(GpsMode::from_code(8), Some(GpsMode::NoGps));
        assert_eq!(GpsMode::from_code(9), None);
        assert_eq!(MachineGear::Reverse5.code(), 11);
        assert_eq!(OnGroundState::from_code(7), None);
        assert_eq!(DiscreteEventKind::from_code(5), Some(DiscreteEventKind::EndProofing));
        assert_eq!(DiscreteEventKind::from_code(6), None);
    }

    #[test]
    fn test_gps_accuracy_word() {
        let word = gps_accuracy_word(GpsAccuracy::Medium, 50);
        assert_eq!(word, 0x4032);
        assert_eq!(split_gps_accuracy_word(word), (GpsAccuracy::Medium, 50));
    }
}
