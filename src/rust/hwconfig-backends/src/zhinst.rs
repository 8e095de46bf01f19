// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::Serialize;

use hwconfig_common::types::{ChannelKind, LoRef};
use hwconfig_resolver::document::MixerCorrections;
use hwconfig_resolver::{Backend, CodeGenerator, CompiledHardwareMap};

use crate::error::{Error, Result};
use crate::{LocalOscillatorSettings, local_oscillator_settings};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZhinstSettings {
    /// Output settings by device name and channel name.
    pub devices: BTreeMap<String, BTreeMap<String, OutputSettings>>,
    pub local_oscillators: BTreeMap<String, LocalOscillatorSettings>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModulationType {
    /// Real-time modulation by the instrument.
    Modulate,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modulation {
    #[serde(rename = "type")]
    pub kind: ModulationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interm_freq: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSettings {
    pub port: String,
    pub clock: String,
    pub mode: ChannelKind,
    pub modulation: Modulation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_oscillator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gain2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixer_corrections: Option<MixerCorrections>,
}

pub struct ZhinstGenerator;

impl CodeGenerator for ZhinstGenerator {
    type Output = ZhinstSettings;
    type Error = Error;

    fn backend(&self) -> Backend {
        Backend::Zhinst
    }

    fn generate(&self, map: &CompiledHardwareMap) -> Result<ZhinstSettings> {
        if !self.accepts(map) {
            return Err(Error::BackendMismatch {
                expected: self.backend(),
                found: map.backend(),
            });
        }
        let mut devices: BTreeMap<String, BTreeMap<String, OutputSettings>> = BTreeMap::new();
        for (path, channel) in map.channels() {
            let [entry] = &channel.port_clocks[..] else {
                return Err(Error::new(format!(
                    "Channel '{path}' carries {} port-clocks, Zurich Instruments channels carry one",
                    channel.port_clocks.len()
                )));
            };
            let modulation = match entry.frequencies.interm_freq {
                Some(freq) => Modulation {
                    kind: ModulationType::Modulate,
                    interm_freq: Some(freq),
                },
                None => Modulation {
                    kind: ModulationType::None,
                    interm_freq: None,
                },
            };
            let local_oscillator = match channel.local_oscillator.as_ref().map(|lo| &lo.lo) {
                Some(LoRef::External { name }) => Some(name.clone()),
                Some(lo @ LoRef::Integrated { .. }) => {
                    return Err(Error::new(format!(
                        "Zurich Instruments channels have no integrated local oscillator, got '{lo}'"
                    )));
                }
                None => None,
            };
            let corrections = &entry.corrections;
            let output = OutputSettings {
                port: entry.port_clock.port().to_string(),
                clock: entry.port_clock.clock().to_string(),
                mode: channel.kind,
                modulation,
                local_oscillator,
                gain1: corrections.output_gain.map(|gain| gain.gain_i),
                gain2: corrections.output_gain.map(|gain| gain.gain_q),
                latency: corrections.latency_correction,
                mixer_corrections: corrections.mixer_corrections,
            };
            devices
                .entry(path.instrument().to_string())
                .or_default()
                .insert(path.name().to_string(), output);
        }
        Ok(ZhinstSettings {
            devices,
            local_oscillators: local_oscillator_settings(map),
        })
    }
}
