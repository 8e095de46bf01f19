// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Entries;

/// Hardware options: per category, a table keyed by port-clock string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HardwareOptions {
    pub latency_corrections: Option<Entries<f64>>,
    pub distortion_corrections: Option<Entries<DistortionCorrection>>,
    pub modulation_frequencies: Option<Entries<ModulationFrequencies>>,
    pub mixer_corrections: Option<Entries<MixerCorrections>>,
    pub output_att: Option<Entries<u32>>,
    pub input_att: Option<Entries<u32>>,
    pub output_gain: Option<Entries<OutputGain>>,
    pub input_gain: Option<Entries<InputGain>>,
    pub sequencer_options: Option<Entries<SequencerOptions>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DistortionCorrection {
    pub filter_func: String,
    pub input_var_name: String,
    #[serde(default)]
    pub kwargs: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clipping_values: Option<[f64; 2]>,
}

/// Requested frequencies of a port-clock. Each may be left out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModulationFrequencies {
    pub interm_freq: Option<f64>,
    pub lo_freq: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MixerCorrections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amp_ratio: Option<f64>,
    /// Phase error in degrees.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_error: Option<f64>,
    #[serde(alias = "dc_offset_I", skip_serializing_if = "Option::is_none")]
    pub dc_offset_i: Option<f64>,
    #[serde(alias = "dc_offset_Q", skip_serializing_if = "Option::is_none")]
    pub dc_offset_q: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputGain {
    #[serde(rename = "gain_I")]
    pub gain_i: f64,
    #[serde(rename = "gain_Q")]
    pub gain_q: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputGain {
    Real(i64),
    Complex {
        #[serde(rename = "gain_I")]
        gain_i: i64,
        #[serde(rename = "gain_Q")]
        gain_q: i64,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SequencerOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_offset_awg_path_0: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_offset_awg_path_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_gain_awg_path_0: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_gain_awg_path_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_acq_threshold: Option<f64>,
}

impl SequencerOptions {
    /// Settings limited to [-1, 1], by name.
    pub fn bounded_settings(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("init_offset_awg_path_0", self.init_offset_awg_path_0),
            ("init_offset_awg_path_1", self.init_offset_awg_path_1),
            ("init_gain_awg_path_0", self.init_gain_awg_path_0),
            ("init_gain_awg_path_1", self.init_gain_awg_path_1),
        ]
    }
}
