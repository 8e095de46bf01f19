// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Instruments by name, in document order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct HardwareDescription(pub IndexMap<String, InstrumentDescription>);

#[derive(Debug, Clone, Deserialize)]
pub struct InstrumentDescription {
    pub instrument_type: String,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    /// Modules of a composite instrument, keyed by slot.
    pub modules: Option<IndexMap<String, ModuleDescription>>,
    /// Output power of a local oscillator in dBm.
    pub power: Option<f64>,
    pub instrument_name: Option<String>,
    pub generic_icc_name: Option<String>,
    pub frequency_param: Option<String>,
    pub power_param: Option<String>,
    /// Channel descriptions and instrument specific settings.
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModuleDescription {
    pub instrument_type: String,
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelDescription {
    /// `real` or `complex`; selects the kind of channels without a fixed kind.
    pub mode: Option<String>,
    pub marker_debug_mode_enable: Option<bool>,
    /// Whether IQ mixing with a local oscillator is enabled.
    pub mix_lo: Option<bool>,
    pub downconverter_freq: Option<f64>,
    #[serde(default)]
    pub markers: Vec<String>,
    pub trigger: Option<i64>,
}
