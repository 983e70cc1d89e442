//! SUN2000 register map
//!
//! Every telemetry field is declared once as a [`RegisterSpec`]. Conversion
//! from raw 16-bit words to a physical value is driven entirely by the spec
//! (width, signedness, scale), so the table can be tested without a device.

use crate::error::DecodeError;

/// Register width in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWidth {
    Bits16,
    Bits32,
}

impl RegisterWidth {
    /// Number of consecutive 16-bit registers occupied
    pub const fn count(self) -> u16 {
        match self {
            RegisterWidth::Bits16 => 1,
            RegisterWidth::Bits32 => 2,
        }
    }
}

/// One entry of the fixed register catalogue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterSpec {
    pub name: &'static str,
    pub address: u16,
    pub width: RegisterWidth,
    pub signed: bool,
    pub scale: f64,
    pub unit: &'static str,
}

impl RegisterSpec {
    const fn new(
        name: &'static str,
        address: u16,
        width: RegisterWidth,
        signed: bool,
        scale: f64,
        unit: &'static str,
    ) -> Self {
        Self {
            name,
            address,
            width,
            signed,
            scale,
            unit,
        }
    }

    /// Registers to request for this field
    pub const fn count(&self) -> u16 {
        self.width.count()
    }

    /// Assemble the raw integer, high word first for 32-bit values
    ///
    /// Signed fields are reinterpreted as two's complement after assembly.
    pub fn raw(&self, words: &[u16]) -> Result<i64, DecodeError> {
        let expected = self.count() as usize;
        if words.len() < expected {
            return Err(DecodeError::ShortRead {
                address: self.address,
                expected,
                got: words.len(),
            });
        }

        let value = match (self.width, self.signed) {
            (RegisterWidth::Bits16, false) => i64::from(words[0]),
            (RegisterWidth::Bits16, true) => i64::from(words[0] as i16),
            (RegisterWidth::Bits32, signed) => {
                let assembled = (u32::from(words[0]) << 16) | u32::from(words[1]);
                if signed {
                    i64::from(assembled as i32)
                } else {
                    i64::from(assembled)
                }
            },
        };
        Ok(value)
    }

    /// Convert raw words to the scaled physical value
    pub fn convert(&self, words: &[u16]) -> Result<f64, DecodeError> {
        Ok(self.raw(words)? as f64 * self.scale)
    }
}

use RegisterWidth::{Bits16, Bits32};

// PV strings
pub const PV1_VOLTAGE: RegisterSpec = RegisterSpec::new("pv1_voltage", 32016, Bits16, true, 0.1, "V");
pub const PV1_CURRENT: RegisterSpec = RegisterSpec::new("pv1_current", 32017, Bits16, true, 0.01, "A");
pub const PV2_VOLTAGE: RegisterSpec = RegisterSpec::new("pv2_voltage", 32018, Bits16, true, 0.1, "V");
pub const PV2_CURRENT: RegisterSpec = RegisterSpec::new("pv2_current", 32019, Bits16, true, 0.01, "A");

// Power
pub const INPUT_POWER: RegisterSpec = RegisterSpec::new("input_power", 32064, Bits32, true, 1.0, "W");
pub const ACTIVE_POWER: RegisterSpec = RegisterSpec::new("active_power", 32080, Bits32, true, 1.0, "W");
/// Low word of 32080 alone, seen on firmware that truncates the value
pub const ACTIVE_POWER_LOW: RegisterSpec =
    RegisterSpec::new("active_power_low_word", 32081, Bits16, false, 1.0, "W");
pub const METER_ACTIVE_POWER: RegisterSpec =
    RegisterSpec::new("meter_active_power", 37113, Bits32, true, 1.0, "W");

// Grid side
pub const PHASE_A_VOLTAGE: RegisterSpec = RegisterSpec::new("phase_A_voltage", 32069, Bits16, false, 0.1, "V");
pub const PHASE_B_VOLTAGE: RegisterSpec = RegisterSpec::new("phase_B_voltage", 32070, Bits16, false, 0.1, "V");
pub const PHASE_C_VOLTAGE: RegisterSpec = RegisterSpec::new("phase_C_voltage", 32071, Bits16, false, 0.1, "V");
pub const PHASE_A_CURRENT: RegisterSpec = RegisterSpec::new("phase_A_current", 32072, Bits32, true, 0.001, "A");
pub const PHASE_B_CURRENT: RegisterSpec = RegisterSpec::new("phase_B_current", 32074, Bits32, true, 0.001, "A");
pub const PHASE_C_CURRENT: RegisterSpec = RegisterSpec::new("phase_C_current", 32076, Bits32, true, 0.001, "A");
pub const GRID_FREQUENCY: RegisterSpec = RegisterSpec::new("grid_frequency", 32085, Bits16, false, 0.01, "Hz");
pub const METER_FREQUENCY: RegisterSpec = RegisterSpec::new("meter_frequency", 37118, Bits16, false, 0.01, "Hz");

// Device
pub const EFFICIENCY: RegisterSpec = RegisterSpec::new("efficiency", 32086, Bits16, false, 0.01, "%");
pub const INTERNAL_TEMPERATURE: RegisterSpec =
    RegisterSpec::new("internal_temperature", 32087, Bits16, true, 0.1, "°C");
pub const DEVICE_STATUS: RegisterSpec = RegisterSpec::new("device_status", 32089, Bits16, false, 1.0, "");
pub const FAULT_CODE: RegisterSpec = RegisterSpec::new("fault_code", 32090, Bits16, false, 1.0, "");

// Energy counters
pub const ACCUMULATED_ENERGY: RegisterSpec =
    RegisterSpec::new("accumulated_energy_yield", 32106, Bits32, false, 0.01, "kWh");
pub const DAILY_ENERGY: RegisterSpec = RegisterSpec::new("daily_yield_energy", 32114, Bits32, false, 0.01, "kWh");

/// Per-phase voltage registers, A/B/C
pub const PHASE_VOLTAGES: [RegisterSpec; 3] = [PHASE_A_VOLTAGE, PHASE_B_VOLTAGE, PHASE_C_VOLTAGE];
/// Per-phase current registers, A/B/C
pub const PHASE_CURRENTS: [RegisterSpec; 3] = [PHASE_A_CURRENT, PHASE_B_CURRENT, PHASE_C_CURRENT];

/// Secondary efficiency scale, tried when the primary yields more than 100 %
pub const EFFICIENCY_ALT_SCALE: f64 = 0.001;

/// Status words 1-3
pub const STATUS_WORDS_ADDR: u16 = 32000;
/// Alarm words 1-3
pub const ALARM_WORDS_ADDR: u16 = 32008;
/// Number of words in each bitfield block
pub const BITFIELD_WORDS: u16 = 3;

/// ASCII identity strings: (address, register count)
pub const MODEL_ADDR: (u16, u16) = (30000, 15);
pub const SERIAL_NUMBER_ADDR: (u16, u16) = (30015, 10);
pub const FIRMWARE_ADDR: (u16, u16) = (31025, 15);

/// Every scalar field, for diagnostics and table tests
pub const ALL_FIELDS: &[RegisterSpec] = &[
    PV1_VOLTAGE,
    PV1_CURRENT,
    PV2_VOLTAGE,
    PV2_CURRENT,
    INPUT_POWER,
    PHASE_A_VOLTAGE,
    PHASE_B_VOLTAGE,
    PHASE_C_VOLTAGE,
    PHASE_A_CURRENT,
    PHASE_B_CURRENT,
    PHASE_C_CURRENT,
    ACTIVE_POWER,
    ACTIVE_POWER_LOW,
    GRID_FREQUENCY,
    EFFICIENCY,
    INTERNAL_TEMPERATURE,
    DEVICE_STATUS,
    FAULT_CODE,
    ACCUMULATED_ENERGY,
    DAILY_ENERGY,
    METER_ACTIVE_POWER,
    METER_FREQUENCY,
];

/// Decode a big-endian ASCII string packed two characters per register
///
/// Trailing NULs and surrounding whitespace are trimmed.
pub fn decode_ascii(words: &[u16]) -> String {
    let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
