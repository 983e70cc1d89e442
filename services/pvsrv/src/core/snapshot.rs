//! Decoded device state at one sampling instant

use chrono::{DateTime, Local};
use serde_json::{json, Map, Value};

use super::decoder::PowerSelection;
use super::status::{self, AlarmSummary, StatusLine};

/// Placeholder shown before the first successful poll
pub const PLACEHOLDER: &str = "N/A";

/// Electrical values of one PV input string
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PvString {
    pub voltage: f64,
    pub current: f64,
}

impl PvString {
    pub fn power(&self) -> f64 {
        self.voltage * self.current
    }
}

/// One fully decoded poll
///
/// Superseded wholesale by the next successful poll; never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// `None` only for the placeholder snapshot
    pub timestamp: Option<DateTime<Local>>,
    pub model: String,
    pub sn: String,
    pub firmware_version: String,
    pub device_status: u16,
    pub device_status_label: String,
    /// Selected output power (W)
    pub active_power: f64,
    /// DC input power (W), the reference for power selection
    pub input_power: f64,
    /// Percent, 0.0 when implausible
    pub efficiency: f64,
    /// °C
    pub internal_temperature: f64,
    /// kWh
    pub daily_energy: f64,
    /// kWh
    pub accumulated_energy: f64,
    /// Hz, 0.0 when outside the plausible band
    pub grid_frequency: f64,
    /// Phase A/B/C voltage (V)
    pub phase_voltages: [f64; 3],
    /// Phase A/B/C current (A)
    pub phase_currents: [f64; 3],
    pub pv_strings: [PvString; 2],
    pub status_words: [u16; 3],
    pub alarm_words: [u16; 3],
    pub fault_code: u16,
    /// Provenance of `active_power`
    pub power: PowerSelection,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            timestamp: None,
            model: PLACEHOLDER.to_string(),
            sn: PLACEHOLDER.to_string(),
            firmware_version: PLACEHOLDER.to_string(),
            device_status: 0,
            device_status_label: PLACEHOLDER.to_string(),
            active_power: 0.0,
            input_power: 0.0,
            efficiency: 0.0,
            internal_temperature: 0.0,
            daily_energy: 0.0,
            accumulated_energy: 0.0,
            grid_frequency: 0.0,
            phase_voltages: [0.0; 3],
            phase_currents: [0.0; 3],
            pv_strings: [PvString::default(); 2],
            status_words: [0; 3],
            alarm_words: [0; 3],
            fault_code: 0,
            power: PowerSelection::default(),
        }
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

const PHASES: [&str; 3] = ["A", "B", "C"];

impl Snapshot {
    /// Whether this is a real reading rather than the placeholder
    pub fn is_placeholder(&self) -> bool {
        self.timestamp.is_none()
    }

    /// Local time of the reading, or the placeholder
    pub fn timestamp_label(&self) -> String {
        self.timestamp
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }

    pub fn status_line(&self) -> StatusLine {
        status::status_line(&self.status_words)
    }

    pub fn alarm_summary(&self) -> AlarmSummary {
        status::alarm_summary(&self.alarm_words)
    }

    /// Flat metric-name → value map with stable keys
    ///
    /// `verbose` appends every active-power candidate under
    /// `power_candidate_<source>`.
    pub fn export(&self, verbose: bool) -> Map<String, Value> {
        let mut map = Map::new();
        let mut put = |key: &str, value: Value| {
            map.insert(key.to_string(), value);
        };

        put("timestamp", json!(self.timestamp_label()));
        put("model", json!(self.model));
        put("sn", json!(self.sn));
        put("firmware_version", json!(self.firmware_version));
        put("device_status", json!(self.device_status_label));
        put("device_status_code", json!(self.device_status));
        put("active_power", json!(round_to(self.active_power, 1)));
        put("active_power_source", json!(self.power.source.as_str()));
        put("input_power", json!(round_to(self.input_power, 1)));
        put("efficiency", json!(round_to(self.efficiency, 2)));
        put("internal_temperature", json!(round_to(self.internal_temperature, 1)));
        put("daily_yield_energy", json!(round_to(self.daily_energy, 2)));
        put("accumulated_energy_yield", json!(round_to(self.accumulated_energy, 2)));
        put("grid_frequency", json!(round_to(self.grid_frequency, 2)));

        for (i, phase) in PHASES.iter().enumerate() {
            put(
                &format!("phase_{}_voltage", phase),
                json!(round_to(self.phase_voltages[i], 1)),
            );
        }
        for (i, phase) in PHASES.iter().enumerate() {
            put(
                &format!("phase_{}_current", phase),
                json!(round_to(self.phase_currents[i], 2)),
            );
        }
        for (i, pv) in self.pv_strings.iter().enumerate() {
            put(&format!("pv{}_voltage", i + 1), json!(round_to(pv.voltage, 1)));
            put(&format!("pv{}_current", i + 1), json!(round_to(pv.current, 2)));
        }

        for (i, word) in self.status_words.iter().enumerate() {
            put(&format!("status_word_{}", i + 1), json!(word));
        }
        for (i, word) in self.alarm_words.iter().enumerate() {
            put(&format!("alarm_word_{}", i + 1), json!(word));
        }
        put("status_line", json!(self.status_line().to_string()));
        put("alarm_level", json!(self.alarm_summary().level.as_str()));
        put("fault_code", json!(self.fault_code));
        put(
            "fault_category",
            json!(status::fault_category(self.fault_code).label()),
        );

        if verbose {
            for candidate in &self.power.candidates {
                put(
                    &format!("power_candidate_{}", candidate.source.as_str()),
                    json!(round_to(candidate.value, 1)),
                );
            }
            if let Some(ratio) = self.power.ratio {
                put("power_ratio", json!(round_to(ratio, 3)));
            }
            put("power_in_band", json!(self.power.in_band));
        }

        map
    }
}
