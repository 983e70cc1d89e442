//! Metric decoder
//!
//! Turns register reads into one complete [`Snapshot`]. Either every
//! required read succeeds and a full snapshot is returned, or the first
//! failure is returned and nothing partial escapes.

use chrono::Local;
use serde::Serialize;
use tracing::{debug, trace};

use super::client::RegisterClient;
use super::registers::{self as regs, RegisterSpec};
use super::snapshot::{PvString, Snapshot};
use super::status;
use crate::error::DecodeError;

/// Acceptable active/input power ratio, inclusive
pub const POWER_RATIO_BAND: (f64, f64) = (0.5, 1.2);

/// Plausible mains frequency, inclusive
pub const FREQUENCY_BAND_HZ: (f64, f64) = (45.0, 65.0);

// ============================================================================
// Active-power disambiguation
// ============================================================================

/// Where an active-power value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    /// 32080, 32-bit signed
    #[default]
    ActivePower,
    /// 32081 alone, on firmware that truncates to the low word
    ActivePowerLowWord,
    /// 37113, grid meter reading
    MeterActivePower,
    /// Sum of phase voltage × phase current
    PhaseEstimate,
}

impl PowerSource {
    /// Stable identifier used in exports
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerSource::ActivePower => "reg_32080",
            PowerSource::ActivePowerLowWord => "reg_32081",
            PowerSource::MeterActivePower => "reg_37113",
            PowerSource::PhaseEstimate => "phase_estimate",
        }
    }
}

/// One candidate value for the output power
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerCandidate {
    pub source: PowerSource,
    pub value: f64,
}

/// Chosen active power with its provenance
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PowerSelection {
    pub source: PowerSource,
    pub value: f64,
    /// Chosen value / reference, when the reference is positive
    pub ratio: Option<f64>,
    /// Whether the choice passed the band test or is the unconditional fallback
    pub in_band: bool,
    /// Every candidate considered, in priority order
    pub candidates: Vec<PowerCandidate>,
}

/// Pick the first candidate whose ratio to `reference` lies in the band
///
/// Falls back to the first-priority candidate when none qualifies, or when
/// `reference` is not positive.
pub fn select_active_power(reference: f64, candidates: Vec<PowerCandidate>) -> PowerSelection {
    let (lo, hi) = POWER_RATIO_BAND;
    let ratio_of = |value: f64| (reference > 0.0).then(|| value / reference);

    let in_band = candidates
        .iter()
        .find(|c| ratio_of(c.value).is_some_and(|r| (lo..=hi).contains(&r)));

    let (chosen, in_band) = match in_band.or(candidates.first()) {
        Some(c) => (*c, in_band.is_some()),
        None => return PowerSelection::default(),
    };

    PowerSelection {
        source: chosen.source,
        value: chosen.value,
        ratio: ratio_of(chosen.value),
        in_band,
        candidates,
    }
}

/// Physically derived output power: Σ V × I over the three phases
pub fn phase_power_estimate(voltages: &[f64; 3], currents: &[f64; 3]) -> f64 {
    voltages.iter().zip(currents).map(|(v, i)| v * i).sum()
}

// ============================================================================
// Data-integrity guards
// ============================================================================

/// Report implausible mains frequencies as 0.0
pub fn normalize_frequency(hz: f64) -> f64 {
    let (lo, hi) = FREQUENCY_BAND_HZ;
    if (lo..=hi).contains(&hz) {
        hz
    } else {
        0.0
    }
}

/// Efficiency in percent from its raw register value
///
/// Values above 100 % are rescaled once with the secondary scale, and
/// clamped to 0.0 if still implausible.
pub fn normalize_efficiency(raw: u32) -> f64 {
    let primary = f64::from(raw) * regs::EFFICIENCY.scale;
    if primary <= 100.0 {
        return primary;
    }
    let secondary = f64::from(raw) * regs::EFFICIENCY_ALT_SCALE;
    if secondary <= 100.0 {
        secondary
    } else {
        0.0
    }
}

// ============================================================================
// Register reads
// ============================================================================

async fn read_words<C: RegisterClient + ?Sized>(
    client: &mut C,
    address: u16,
    count: u16,
) -> Result<Vec<u16>, DecodeError> {
    let words = client
        .read_block(address, count)
        .await
        .map_err(|source| DecodeError::Transport { address, source })?;
    if words.len() < count as usize {
        return Err(DecodeError::ShortRead {
            address,
            expected: count as usize,
            got: words.len(),
        });
    }
    trace!("read {} x{} -> {:?}", address, count, words);
    Ok(words)
}

async fn read_field<C: RegisterClient + ?Sized>(
    client: &mut C,
    spec: &RegisterSpec,
) -> Result<f64, DecodeError> {
    let words = read_words(client, spec.address, spec.count()).await?;
    spec.convert(&words)
}

async fn read_raw_u16<C: RegisterClient + ?Sized>(
    client: &mut C,
    spec: &RegisterSpec,
) -> Result<u16, DecodeError> {
    Ok(read_words(client, spec.address, 1).await?[0])
}

async fn read_string<C: RegisterClient + ?Sized>(
    client: &mut C,
    (address, count): (u16, u16),
) -> Result<String, DecodeError> {
    let words = read_words(client, address, count).await?;
    Ok(regs::decode_ascii(&words))
}

async fn read_bitfield<C: RegisterClient + ?Sized>(
    client: &mut C,
    address: u16,
) -> Result<[u16; 3], DecodeError> {
    let words = read_words(client, address, regs::BITFIELD_WORDS).await?;
    Ok([words[0], words[1], words[2]])
}

/// Read a register the device may not implement
///
/// A Modbus exception yields `None`; link failures still abort the poll.
async fn read_optional<C: RegisterClient + ?Sized>(
    client: &mut C,
    spec: &RegisterSpec,
) -> Result<Option<f64>, DecodeError> {
    match read_field(client, spec).await {
        Ok(value) => Ok(Some(value)),
        Err(DecodeError::Transport { source, .. }) if source.is_exception() => {
            debug!("Optional register {} unavailable: {}", spec.address, source);
            Ok(None)
        },
        Err(e) => Err(e),
    }
}

/// Decode one complete snapshot from the device
pub async fn decode<C: RegisterClient + ?Sized>(client: &mut C) -> Result<Snapshot, DecodeError> {
    let model = read_string(client, regs::MODEL_ADDR).await?;
    let sn = read_string(client, regs::SERIAL_NUMBER_ADDR).await?;
    let firmware_version = read_string(client, regs::FIRMWARE_ADDR).await?;

    let device_status = read_raw_u16(client, &regs::DEVICE_STATUS).await?;
    let fault_code = read_raw_u16(client, &regs::FAULT_CODE).await?;
    let status_words = read_bitfield(client, regs::STATUS_WORDS_ADDR).await?;
    let alarm_words = read_bitfield(client, regs::ALARM_WORDS_ADDR).await?;

    let internal_temperature = read_field(client, &regs::INTERNAL_TEMPERATURE).await?;
    let daily_energy = read_field(client, &regs::DAILY_ENERGY).await?;
    let accumulated_energy = read_field(client, &regs::ACCUMULATED_ENERGY).await?;
    let input_power = read_field(client, &regs::INPUT_POWER).await?;
    let efficiency = normalize_efficiency(u32::from(read_raw_u16(client, &regs::EFFICIENCY).await?));

    // Primary register reads 0 on some firmware; the meter copy is the fallback
    let mut frequency = read_field(client, &regs::GRID_FREQUENCY).await?;
    if frequency == 0.0 {
        frequency = read_optional(client, &regs::METER_FREQUENCY)
            .await?
            .unwrap_or(0.0);
    }
    let grid_frequency = normalize_frequency(frequency);

    let mut phase_voltages = [0.0; 3];
    for (slot, spec) in phase_voltages.iter_mut().zip(&regs::PHASE_VOLTAGES) {
        *slot = read_field(client, spec).await?;
    }
    let mut phase_currents = [0.0; 3];
    for (slot, spec) in phase_currents.iter_mut().zip(&regs::PHASE_CURRENTS) {
        *slot = read_field(client, spec).await?;
    }

    let pv_strings = [
        PvString {
            voltage: read_field(client, &regs::PV1_VOLTAGE).await?,
            current: read_field(client, &regs::PV1_CURRENT).await?,
        },
        PvString {
            voltage: read_field(client, &regs::PV2_VOLTAGE).await?,
            current: read_field(client, &regs::PV2_CURRENT).await?,
        },
    ];

    // 32080 and its low word come from the same two-register read
    let power_words = read_words(client, regs::ACTIVE_POWER.address, regs::ACTIVE_POWER.count()).await?;
    let mut candidates = vec![
        PowerCandidate {
            source: PowerSource::ActivePower,
            value: regs::ACTIVE_POWER.convert(&power_words)?,
        },
        PowerCandidate {
            source: PowerSource::ActivePowerLowWord,
            value: regs::ACTIVE_POWER_LOW.convert(&power_words[1..])?,
        },
    ];
    if let Some(value) = read_optional(client, &regs::METER_ACTIVE_POWER).await? {
        candidates.push(PowerCandidate {
            source: PowerSource::MeterActivePower,
            value,
        });
    }
    candidates.push(PowerCandidate {
        source: PowerSource::PhaseEstimate,
        value: phase_power_estimate(&phase_voltages, &phase_currents),
    });

    let power = select_active_power(input_power, candidates);
    if !power.in_band && input_power > 0.0 {
        debug!(
            "No power candidate within {:?} of input {} W, using {}",
            POWER_RATIO_BAND,
            input_power,
            power.source.as_str()
        );
    }

    Ok(Snapshot {
        timestamp: Some(Local::now()),
        model,
        sn,
        firmware_version,
        device_status,
        device_status_label: status::device_status_label(device_status),
        active_power: power.value,
        input_power,
        efficiency,
        internal_temperature,
        daily_energy,
        accumulated_energy,
        grid_frequency,
        phase_voltages,
        phase_currents,
        pv_strings,
        status_words,
        alarm_words,
        fault_code,
        power,
    })
}
