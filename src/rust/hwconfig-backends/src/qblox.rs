// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Module and sequencer settings of Qblox clusters and pulsars.

use std::collections::BTreeMap;

use serde::Serialize;

use hwconfig_common::types::{ChannelPath, LoRef, PortClockId};
use hwconfig_log::warn;
use hwconfig_resolver::document::InputGain;
use hwconfig_resolver::{
    Backend, CodeGenerator, CompiledChannelConfig, CompiledHardwareMap, CompiledPortClock,
};

use crate::error::{Error, Result};
use crate::{LocalOscillatorSettings, local_oscillator_settings};

const MIXER_GAIN_RATIO_RANGE: (f64, f64) = (0.5, 2.0);
const MIXER_PHASE_OFFSET_RANGE: (f64, f64) = (-45.0, 45.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QbloxSettings {
    /// By module path, e.g. `cluster0.module1`.
    pub modules: BTreeMap<String, ModuleSettings>,
    pub local_oscillators: BTreeMap<String, LocalOscillatorSettings>,
}

/// Module wide settings. Unset values are left untouched on the instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleSettings {
    pub instrument_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lo0_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lo1_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out0_att: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out1_att: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in0_att: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in0_gain: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in1_gain: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_ch0_path0: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_ch0_path1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_ch1_path0: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_ch1_path1: Option<f64>,
    pub sequencers: Vec<SequencerSettings>,
}

impl ModuleSettings {
    fn new(instrument_type: &'static str) -> Self {
        ModuleSettings {
            instrument_type,
            lo0_freq: None,
            lo1_freq: None,
            out0_att: None,
            out1_att: None,
            in0_att: None,
            in0_gain: None,
            in1_gain: None,
            offset_ch0_path0: None,
            offset_ch0_path1: None,
            offset_ch1_path0: None,
            offset_ch1_path1: None,
            sequencers: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequencerSettings {
    pub index: usize,
    pub port_clock: PortClockId,
    /// Channel name the sequencer drives or reads, e.g. `complex_output_0`.
    pub io_name: String,
    pub nco_en: bool,
    pub modulation_freq: Option<f64>,
    pub mixer_corr_gain_ratio: f64,
    pub mixer_corr_phase_offset_degree: f64,
    pub init_offset_awg_path_0: f64,
    pub init_offset_awg_path_1: f64,
    pub init_gain_awg_path_0: f64,
    pub init_gain_awg_path_1: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_acq_threshold: Option<f64>,
}

impl SequencerSettings {
    fn new(index: usize, io_name: &str, entry: &CompiledPortClock) -> Result<Self> {
        let port_clock = &entry.port_clock;
        let modulation_freq = entry.frequencies.interm_freq;
        let mixer = entry.corrections.mixer_corrections.unwrap_or_default();
        let options = entry.corrections.sequencer_options.unwrap_or_default();
        Ok(SequencerSettings {
            index,
            port_clock: port_clock.clone(),
            io_name: io_name.to_string(),
            // `interm_freq: 0` keeps the NCO disabled
            nco_en: modulation_freq.is_some_and(|freq| freq != 0.0),
            modulation_freq,
            mixer_corr_gain_ratio: in_range(
                "mixer_corr_gain_ratio",
                port_clock,
                mixer.amp_ratio.unwrap_or(1.0),
                MIXER_GAIN_RATIO_RANGE,
            )?,
            mixer_corr_phase_offset_degree: in_range(
                "mixer_corr_phase_offset_degree",
                port_clock,
                mixer.phase_error.unwrap_or(0.0),
                MIXER_PHASE_OFFSET_RANGE,
            )?,
            init_offset_awg_path_0: options.init_offset_awg_path_0.unwrap_or(0.0),
            init_offset_awg_path_1: options.init_offset_awg_path_1.unwrap_or(0.0),
            init_gain_awg_path_0: options.init_gain_awg_path_0.unwrap_or(1.0),
            init_gain_awg_path_1: options.init_gain_awg_path_1.unwrap_or(1.0),
            ttl_acq_threshold: options.ttl_acq_threshold,
        })
    }
}

fn in_range(
    setting: &'static str,
    port_clock: &PortClockId,
    value: f64,
    (min, max): (f64, f64),
) -> Result<f64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(Error::OutOfRange {
            setting,
            port_clock: port_clock.clone(),
            value,
            min,
            max,
        })
    }
}

pub struct QbloxGenerator;

impl CodeGenerator for QbloxGenerator {
    type Output = QbloxSettings;
    type Error = Error;

    fn backend(&self) -> Backend {
        Backend::Qblox
    }

    fn generate(&self, map: &CompiledHardwareMap) -> Result<QbloxSettings> {
        if !self.accepts(map) {
            return Err(Error::BackendMismatch {
                expected: self.backend(),
                found: map.backend(),
            });
        }
        for unresolved in map.unresolved() {
            warn!("{}, the setting is left untouched", unresolved);
        }
        let mut modules: BTreeMap<String, ModuleSettings> = BTreeMap::new();
        for (path, channel) in map.channels() {
            let module_path = path
                .parent()
                .ok_or_else(|| Error::new(format!("Channel '{path}' has no module")))?;
            let module = modules
                .entry(module_path.to_string())
                .or_insert_with(|| ModuleSettings::new(channel.instrument_type));
            apply_channel(module, path, channel)?;
        }
        for (module_path, module) in &modules {
            let available = Backend::Qblox
                .instrument_traits(module.instrument_type)
                .and_then(|traits| traits.sequencers)
                .map_or(0, usize::from);
            if module.sequencers.len() > available {
                return Err(Error::TooManySequencers {
                    module: module_path.clone(),
                    required: module.sequencers.len(),
                    available,
                });
            }
        }
        Ok(QbloxSettings {
            modules,
            local_oscillators: local_oscillator_settings(map),
        })
    }
}

fn apply_channel(
    module: &mut ModuleSettings,
    path: &ChannelPath,
    channel: &CompiledChannelConfig,
) -> Result<()> {
    let io_name = path.name();
    let io_index = io_name
        .rsplit_once('_')
        .and_then(|(_, index)| index.parse::<u8>().ok())
        .ok_or_else(|| Error::new(format!("Invalid channel name '{io_name}'")))?;
    let is_output = io_name.contains("output");

    if let Some(lo) = &channel.local_oscillator
        && let LoRef::Integrated { index, .. } = lo.lo
    {
        match index {
            0 => module.lo0_freq = lo.frequency,
            _ => module.lo1_freq = lo.frequency,
        }
    }

    let entries = &channel.port_clocks;
    let attenuation = unique(path, "attenuation", entries, |entry| {
        if is_output {
            entry.corrections.output_att
        } else {
            entry.corrections.input_att
        }
    })?;
    if attenuation.is_some() {
        let is_rf = Backend::Qblox
            .instrument_traits(channel.instrument_type)
            .is_some_and(|traits| traits.has_integrated_lo());
        match (is_rf, is_output, io_index) {
            (true, true, 0) => module.out0_att = attenuation,
            (true, true, 1) => module.out1_att = attenuation,
            (true, false, 0) => module.in0_att = attenuation,
            _ => return Err(Error::new(format!("'{path}' has no attenuator"))),
        }
    }

    if !is_output {
        let gain = unique(path, "input_gain", entries, |entry| entry.corrections.input_gain)?;
        match (gain, io_index) {
            (None, _) => {}
            (Some(InputGain::Complex { gain_i, gain_q }), _) => {
                module.in0_gain = Some(gain_i);
                module.in1_gain = Some(gain_q);
            }
            (Some(InputGain::Real(gain)), 0) => module.in0_gain = Some(gain),
            (Some(InputGain::Real(gain)), _) => module.in1_gain = Some(gain),
        }
    }

    if is_output && io_name.starts_with("complex") {
        let dc_offset_i = unique(path, "dc_offset_i", entries, |entry| {
            entry.corrections.mixer_corrections.and_then(|c| c.dc_offset_i)
        })?;
        let dc_offset_q = unique(path, "dc_offset_q", entries, |entry| {
            entry.corrections.mixer_corrections.and_then(|c| c.dc_offset_q)
        })?;
        if io_index == 0 {
            module.offset_ch0_path0 = dc_offset_i;
            module.offset_ch0_path1 = dc_offset_q;
        } else {
            module.offset_ch1_path0 = dc_offset_i;
            module.offset_ch1_path1 = dc_offset_q;
        }
    }

    for entry in entries {
        let index = module.sequencers.len();
        module
            .sequencers
            .push(SequencerSettings::new(index, io_name, entry)?);
    }
    Ok(())
}

/// The single value all port-clocks on the channel agree on.
fn unique<T, F>(
    path: &ChannelPath,
    setting: &str,
    entries: &[CompiledPortClock],
    value: F,
) -> Result<Option<T>>
where
    T: PartialEq + std::fmt::Debug,
    F: Fn(&CompiledPortClock) -> Option<T>,
{
    let values = entries
        .iter()
        .filter_map(|entry| value(entry).map(|v| (&entry.port_clock, v)))
        .collect::<Vec<_>>();
    let Some((_, first)) = values.first() else {
        return Ok(None);
    };
    if values.iter().any(|(_, v)| v != first) {
        return Err(Error::ConflictingSetting {
            channel: path.clone(),
            setting: setting.to_string(),
            values: values
                .iter()
                .map(|(pc, v)| format!("'{pc}': {v:?}"))
                .collect::<Vec<_>>()
                .join(", "),
        });
    }
    Ok(values.into_iter().next().map(|(_, v)| v))
}
