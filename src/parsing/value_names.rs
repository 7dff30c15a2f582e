//! Names of the tags the value matchers understand

// Time
pub const TIME: &str = "TIME";
pub const WEEK: &str = "WEEK";

// Position side selectors
pub const BLADE_LEFT: &str = "LEFT";
pub const BLADE_RIGHT: &str = "RGHT";
pub const TRACK_LEFT: &str = "LTRK";
pub const TRACK_RIGHT: &str = "RTRK";
pub const WHEEL_LEFT: &str = "LWHL";
pub const WHEEL_RIGHT: &str = "RWHL";
pub const REAR_LEFT: &str = "LRER";
pub const REAR_RIGHT: &str = "RRER";

// Ordinates of the selected side
pub const EASTING: &str = "EAST";
pub const NORTHING: &str = "NRTH";
pub const ELEVATION: &str = "ELEV";

// Geodetic seed position
pub const LATITUDE: &str = "LAT";
pub const LONGITUDE: &str = "LON";
pub const HEIGHT: &str = "HGHT";

// Machine identity
pub const MACHINE_ID: &str = "MID";
pub const MACHINE_TYPE: &str = "MTYP";
pub const DEVICE_TYPE: &str = "DTYP";
pub const APPLICATION_VERSION: &str = "APP";
pub const DESIGN: &str = "DES";

// Compaction attributes
pub const CCV: &str = "CCV";
pub const MDP: &str = "MDP";
pub const RMV: &str = "RMV";
pub const FREQUENCY: &str = "FREQ";
pub const AMPLITUDE: &str = "AMP";
pub const TEMPERATURE: &str = "TEMP";
pub const CCA: &str = "CCA";
pub const CCA_LEFT_FRONT: &str = "CCLF";
pub const CCA_RIGHT_FRONT: &str = "CCRF";
pub const CCA_LEFT_REAR: &str = "CCLR";
pub const CCA_RIGHT_REAR: &str = "CCRR";

// Machine targets
pub const TARGET_CCV: &str = "CCVT";
pub const TARGET_MDP: &str = "MDPT";
pub const TARGET_CCA: &str = "CCAT";
pub const TARGET_PASS_COUNT: &str = "TPAS";
pub const TEMPERATURE_WARNING_MIN: &str = "TMIN";
pub const TEMPERATURE_WARNING_MAX: &str = "TMAX";

// Machine state codes
pub const GEAR: &str = "GEAR";
pub const ON_GROUND: &str = "ONGR";
pub const GPS_MODE: &str = "GPSM";
pub const GPS_ACCURACY: &str = "GPSA";
pub const VIBRATION_STATE: &str = "VIBE";
pub const ELEVATION_MAPPING_MODE: &str = "EMAP";
pub const POSITIONING_TECH: &str = "PTEC";
pub const COORDINATE_SYSTEM: &str = "CSYS";
pub const UTM_ZONE: &str = "UTM";

// Discrete lifecycle markers
pub const DISCRETE_EVENT: &str = "EVNT";
pub const MACHINE_STARTUP: &str = "MSTR";
pub const MACHINE_SHUTDOWN: &str = "MSHD";
pub const MAP_RESET: &str = "MRST";
pub const UTS_MODE: &str = "UTSM";
pub const START_PROOFING: &str = "PRFN";
pub const START_PROOFING_TIME: &str = "PRFT";
pub const START_PROOFING_WEEK: &str = "PRFW";
pub const END_PROOFING: &str = "PRFE";
