//! Status and alarm classification
//!
//! Bit-to-meaning tables for the three status words (32000-32002) and the
//! three alarm words (32008-32010), plus the device running-state and
//! fault-code lookups. All tables are static data; the functions here only
//! walk them.

use std::fmt;

use serde::Serialize;

/// Severity tier of a single bit, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Info,
    Ok,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Meaning of one bit in a status or alarm word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitMeaning {
    pub bit: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
}

const fn bit(bit: u8, name: &'static str, description: &'static str, severity: Severity) -> BitMeaning {
    BitMeaning {
        bit,
        name,
        description,
        severity,
    }
}

use Severity::{Critical, Info, Ok as Good, Warning};

// ============================================================================
// Status words
// ============================================================================

const STATUS_WORD_1: &[BitMeaning] = &[
    bit(0, "standby", "Standby", Info),
    bit(1, "grid_connected", "Grid-connected", Good),
    bit(2, "producing", "Grid-connected normally", Good),
    bit(3, "derating_rationing", "Grid connection with derating due to power rationing", Warning),
    bit(4, "derating_internal", "Grid connection with derating due to internal causes", Warning),
    bit(5, "normal_stop", "Normal stop", Info),
    bit(6, "fault_stop", "Stop due to faults", Critical),
    bit(7, "rationing_stop", "Stop due to power rationing", Warning),
    bit(8, "shutdown", "Shutdown", Warning),
    bit(9, "spot_check", "Spot check", Info),
];

const STATUS_WORD_2: &[BitMeaning] = &[
    bit(0, "unlocked", "Locking status: unlocked", Info),
    bit(1, "pv_connected", "PV connection status: connected", Good),
    bit(2, "dsp_collection", "DSP data collection", Info),
];

const STATUS_WORD_3: &[BitMeaning] = &[
    bit(0, "off_grid", "On-grid/Off-grid: off-grid", Warning),
    bit(1, "off_grid_switch", "Off-grid switch: enabled", Info),
];

/// Bit tables for status words 1-3
pub const STATUS_WORD_BITS: [&[BitMeaning]; 3] = [STATUS_WORD_1, STATUS_WORD_2, STATUS_WORD_3];

// ============================================================================
// Alarm words
// ============================================================================

const ALARM_WORD_1: &[BitMeaning] = &[
    bit(0, "high_string_input_voltage", "High string input voltage (2001)", Critical),
    bit(1, "dc_arc_fault", "DC arc fault (2002)", Critical),
    bit(2, "string_reverse_connection", "String reverse connection (2011)", Critical),
    bit(3, "string_current_backfeed", "String current backfeed (2012)", Warning),
    bit(4, "abnormal_string_power", "Abnormal string power (2013)", Warning),
    bit(5, "afci_self_check_fail", "AFCI self-check failure (2021)", Critical),
    bit(6, "phase_short_to_pe", "Phase wire short-circuited to PE (2031)", Critical),
    bit(7, "grid_loss", "Grid loss (2032)", Warning),
    bit(8, "grid_undervoltage", "Grid undervoltage (2033)", Warning),
    bit(9, "grid_overvoltage", "Grid overvoltage (2034)", Warning),
    bit(10, "grid_voltage_imbalance", "Grid voltage imbalance (2035)", Warning),
    bit(11, "grid_overfrequency", "Grid overfrequency (2036)", Warning),
    bit(12, "grid_underfrequency", "Grid underfrequency (2037)", Warning),
    bit(13, "unstable_grid_frequency", "Unstable grid frequency (2038)", Warning),
    bit(14, "output_overcurrent", "Output overcurrent (2039)", Critical),
    bit(15, "output_dc_component_high", "Output DC component overhigh (2040)", Critical),
];

const ALARM_WORD_2: &[BitMeaning] = &[
    bit(0, "abnormal_residual_current", "Abnormal residual current (2051)", Critical),
    bit(1, "abnormal_grounding", "Abnormal grounding (2061)", Critical),
    bit(2, "low_insulation_resistance", "Low insulation resistance (2062)", Critical),
    bit(3, "overtemperature", "Overtemperature (2063)", Warning),
    bit(4, "device_fault", "Device fault (2064)", Critical),
    bit(5, "upgrade_failed", "Upgrade failed or version mismatch (2065)", Warning),
    bit(6, "license_expired", "License expired (2066)", Warning),
    bit(7, "faulty_monitoring_unit", "Faulty monitoring unit (61440)", Warning),
    bit(8, "faulty_power_collector", "Faulty power collector (2067)", Warning),
    bit(9, "battery_abnormal", "Battery abnormal (2068)", Warning),
    bit(10, "active_islanding", "Active islanding (2070)", Warning),
    bit(11, "passive_islanding", "Passive islanding (2071)", Warning),
    bit(12, "transient_ac_overvoltage", "Transient AC overvoltage (2072)", Warning),
    bit(13, "peripheral_port_short", "Peripheral port short circuit (2075)", Warning),
    bit(14, "output_overload", "Off-grid output overload (2077)", Critical),
    bit(15, "abnormal_pv_configuration", "Abnormal PV module configuration (2080)", Critical),
];

const ALARM_WORD_3: &[BitMeaning] = &[
    bit(0, "optimizer_fault", "Optimizer fault (2081)", Warning),
    bit(1, "pid_abnormal", "Built-in PID operation abnormal (2085)", Warning),
    bit(2, "high_string_voltage_to_ground", "High input string voltage to ground (2014)", Critical),
    bit(3, "external_fan_abnormal", "External fan abnormal (2086)", Warning),
    bit(4, "battery_reverse_connection", "Battery reverse connection (2069)", Critical),
    bit(5, "grid_controller_abnormal", "On-grid/off-grid controller abnormal (2082)", Warning),
    bit(6, "pv_string_loss", "PV string loss (2015)", Warning),
    bit(7, "internal_fan_abnormal", "Internal fan abnormal (2087)", Warning),
    bit(8, "dc_protection_unit_abnormal", "DC protection unit abnormal (2088)", Critical),
    bit(9, "el_unit_abnormal", "EL unit abnormal (2089)", Warning),
    bit(10, "active_adjustment_abnormal", "Active adjustment instruction abnormal (2090)", Warning),
    bit(11, "reactive_adjustment_abnormal", "Reactive adjustment instruction abnormal (2091)", Warning),
    bit(12, "ct_wiring_abnormal", "CT wiring abnormal (2092)", Warning),
    bit(13, "dc_arc_fault_admc", "DC arc fault, ADMC (2003)", Warning),
    bit(14, "dc_switch_abnormal", "DC switch abnormal (2093)", Warning),
    bit(15, "low_discharge_capacity", "Allowable battery discharge capacity low (2094)", Warning),
];

/// Bit tables for alarm words 1-3
pub const ALARM_WORD_BITS: [&[BitMeaning]; 3] = [ALARM_WORD_1, ALARM_WORD_2, ALARM_WORD_3];

/// Bits whose presence makes the aggregate critical, per alarm word
pub const ALARM_CRITICAL_MASKS: [u16; 3] = [0xC067, 0xC017, 0x0114];

/// Documented bits per alarm word
pub const ALARM_NOTABLE_MASKS: [u16; 3] = [0xFFFF, 0xFFFF, 0xFFFF];

/// Entries of `table` whose bit is set in `word`
pub fn active_bits(word: u16, table: &'static [BitMeaning]) -> impl Iterator<Item = &'static BitMeaning> {
    table.iter().filter(move |m| word & (1 << m.bit) != 0)
}

// ============================================================================
// Compact status line
// ============================================================================

/// Condensed view of the status words
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusLine {
    /// Set flags in priority order, most important first
    pub flags: Vec<&'static str>,
    /// Status word 2 or 3 is nonzero
    pub extended: bool,
}

impl StatusLine {
    /// Highest-priority flag, or `IDLE`
    pub fn headline(&self) -> &'static str {
        self.flags.first().copied().unwrap_or("IDLE")
    }

    /// Severity used to colour the headline
    pub fn severity(&self) -> Severity {
        match self.headline() {
            "EMERGENCY" => Severity::Critical,
            "OFFLINE" => Severity::Warning,
            "ON-GRID" | "PRODUCING" => Severity::Ok,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags.is_empty() {
            f.write_str("IDLE")?;
        } else {
            f.write_str(&self.flags.join(" | "))?;
        }
        if self.extended {
            f.write_str(" +EXT")?;
        }
        Ok(())
    }
}

/// Priority-ordered (label, mask over status word 1)
const STATUS_PRIORITY: [(&str, u16); 5] = [
    ("EMERGENCY", 1 << 6),
    ("OFFLINE", (1 << 5) | (1 << 8)),
    ("ON-GRID", 1 << 1),
    ("PRODUCING", 1 << 2),
    ("STANDBY", 1 << 0),
];

/// Build the compact status line from status words 1-3
///
/// Only the prioritised subset of word 1 is decoded; words 2 and 3 only
/// contribute a presence flag.
pub fn status_line(words: &[u16; 3]) -> StatusLine {
    StatusLine {
        flags: STATUS_PRIORITY
            .iter()
            .filter(|(_, mask)| words[0] & mask != 0)
            .map(|(label, _)| *label)
            .collect(),
        extended: words[1] != 0 || words[2] != 0,
    }
}

// ============================================================================
// Alarm summary and breakdown
// ============================================================================

/// Aggregate alarm state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum AlarmLevel {
    #[default]
    None,
    Warning,
    Critical,
}

impl AlarmLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmLevel::None => "none",
            AlarmLevel::Warning => "warning",
            AlarmLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for AlarmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying the three alarm words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmSummary {
    pub level: AlarmLevel,
    /// Set bits covered by a critical mask
    pub critical_count: u32,
    /// Set bits covered by a notable mask
    pub notable_count: u32,
}

/// Classify alarm words 1-3 as none, warning or critical
pub fn alarm_summary(words: &[u16; 3]) -> AlarmSummary {
    let mut summary = AlarmSummary::default();
    for (i, &word) in words.iter().enumerate() {
        summary.critical_count += (word & ALARM_CRITICAL_MASKS[i]).count_ones();
        summary.notable_count += (word & ALARM_NOTABLE_MASKS[i]).count_ones();
    }

    summary.level = if summary.critical_count > 0 {
        AlarmLevel::Critical
    } else if words.iter().any(|&w| w != 0) {
        AlarmLevel::Warning
    } else {
        AlarmLevel::None
    };
    summary
}

/// One active alarm bit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmEntry {
    /// Alarm word number, 1-based
    pub word: u8,
    pub bit: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub severity: Severity,
}

/// Every active alarm bit, most severe first
pub fn alarm_breakdown(words: &[u16; 3]) -> Vec<AlarmEntry> {
    let mut entries: Vec<AlarmEntry> = words
        .iter()
        .zip(ALARM_WORD_BITS)
        .enumerate()
        .flat_map(|(i, (&word, table))| {
            active_bits(word, table).map(move |m| AlarmEntry {
                word: i as u8 + 1,
                bit: m.bit,
                name: m.name,
                description: m.description,
                severity: m.severity,
            })
        })
        .collect();
    // Stable sort keeps word/bit order within a tier
    entries.sort_by(|a, b| b.severity.cmp(&a.severity));
    entries
}

// ============================================================================
// Fault codes and running state
// ============================================================================

/// Coarse fault-code family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultCategory {
    None,
    PvString,
    AcGrid,
    InsulationProtection,
    SystemPeripheral,
    MonitoringUnit,
    Unknown,
}

impl FaultCategory {
    pub fn label(&self) -> &'static str {
        match self {
            FaultCategory::None => "No fault",
            FaultCategory::PvString => "PV string / DC input",
            FaultCategory::AcGrid => "AC grid",
            FaultCategory::InsulationProtection => "Insulation & protection",
            FaultCategory::SystemPeripheral => "System & peripheral",
            FaultCategory::MonitoringUnit => "Monitoring unit",
            FaultCategory::Unknown => "Unknown",
        }
    }
}

/// Map a fault code to its category by numeric range
pub fn fault_category(code: u16) -> FaultCategory {
    match code {
        0 => FaultCategory::None,
        2001..=2030 => FaultCategory::PvString,
        2031..=2050 => FaultCategory::AcGrid,
        2051..=2070 => FaultCategory::InsulationProtection,
        2071..=2099 => FaultCategory::SystemPeripheral,
        61440 => FaultCategory::MonitoringUnit,
        _ => FaultCategory::Unknown,
    }
}

const DEVICE_STATUS_LABELS: &[(u16, &str)] = &[
    (0x0000, "Standby: initializing"),
    (0x0001, "Standby: detecting insulation resistance"),
    (0x0002, "Standby: detecting irradiation"),
    (0x0003, "Standby: grid detecting"),
    (0x0100, "Starting"),
    (0x0200, "On-grid"),
    (0x0201, "On-grid: power limited"),
    (0x0202, "On-grid: self-derating"),
    (0x0300, "Shutdown: fault"),
    (0x0301, "Shutdown: command"),
    (0x0302, "Shutdown: OVGR"),
    (0x0303, "Shutdown: communication disconnected"),
    (0x0304, "Shutdown: power limited"),
    (0x0305, "Shutdown: manual startup required"),
    (0x0306, "Shutdown: DC switches disconnected"),
    (0x0307, "Shutdown: rapid cutoff"),
    (0x0308, "Shutdown: input underpower"),
    (0x0401, "Grid scheduling: cosφ-P curve"),
    (0x0402, "Grid scheduling: Q-U curve"),
    (0x0500, "Spot-check ready"),
    (0x0501, "Spot-checking"),
    (0x0600, "Inspecting"),
    (0x0700, "AFCI self check"),
    (0x0800, "I-V scanning"),
    (0x0900, "DC input detection"),
    (0xA000, "Standby: no irradiation"),
];

/// Human label for the running-state register (32089)
pub fn device_status_label(code: u16) -> String {
    DEVICE_STATUS_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| format!("Unknown (0x{:04X})", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_table_severity_matches_critical_masks() {
        for (table, mask) in ALARM_WORD_BITS.iter().zip(ALARM_CRITICAL_MASKS) {
            for m in table.iter() {
                let in_mask = mask & (1 << m.bit) != 0;
                assert_eq!(in_mask, m.severity == Severity::Critical, "{}", m.name);
            }
        }
    }

    #[test]
    fn test_alarm_summary_levels() {
        assert_eq!(alarm_summary(&[0, 0, 0]).level, AlarmLevel::None);

        // Grid loss only: notable but not critical
        let summary = alarm_summary(&[1 << 7, 0, 0]);
        assert_eq!(summary.level, AlarmLevel::Warning);
        assert_eq!(summary.critical_count, 0);
        assert_eq!(summary.notable_count, 1);

        // Critical bit in word 3 alone is enough
        let summary = alarm_summary(&[0, 0, 1 << 8]);
        assert_eq!(summary.level, AlarmLevel::Critical);
        assert_eq!(summary.critical_count, 1);
    }

    #[test]
    fn test_status_line_priority() {
        let line = status_line(&[(1 << 1) | (1 << 2), 0, 0]);
        assert_eq!(line.headline(), "ON-GRID");
        assert_eq!(line.to_string(), "ON-GRID | PRODUCING");

        let line = status_line(&[(1 << 6) | (1 << 8) | (1 << 1), 0b10, 0]);
        assert_eq!(line.headline(), "EMERGENCY");
        assert_eq!(line.severity(), Severity::Critical);
        assert_eq!(line.to_string(), "EMERGENCY | OFFLINE | ON-GRID +EXT");

        // Bits outside the prioritised subset are not shown
        let line = status_line(&[1 << 3, 0, 0]);
        assert_eq!(line.to_string(), "IDLE");
    }

    #[test]
    fn test_alarm_breakdown_orders_by_severity() {
        let entries = alarm_breakdown(&[1 << 7, 1 << 2, 0]);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "low_insulation_resistance");
        assert_eq!(entries[0].word, 2);
        assert_eq!(entries[1].name, "grid_loss");
        assert_eq!(entries[1].severity, Severity::Warning);
    }

    #[test]
    fn test_fault_categories() {
        assert_eq!(fault_category(0), FaultCategory::None);
        assert_eq!(fault_category(2001), FaultCategory::PvString);
        assert_eq!(fault_category(2032), FaultCategory::AcGrid);
        assert_eq!(fault_category(2062), FaultCategory::InsulationProtection);
        assert_eq!(fault_category(2099), FaultCategory::SystemPeripheral);
        assert_eq!(fault_category(61440), FaultCategory::MonitoringUnit);
        assert_eq!(fault_category(1999), FaultCategory::Unknown);
    }

    #[test]
    fn test_device_status_label() {
        assert_eq!(device_status_label(0x0200), "On-grid");
        assert_eq!(device_status_label(0xA000), "Standby: no irradiation");
        assert_eq!(device_status_label(0x1234), "Unknown (0x1234)");
    }
}
