// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Index of the instruments, modules, channels and local oscillators of the
//! hardware description.

use indexmap::IndexMap;
use serde_json::Value;

use hwconfig_common::instrument_traits::{
    InstrumentTraits, LOCAL_OSCILLATOR_TYPE, is_channel_name,
};
use hwconfig_common::types::{ChannelKind, ChannelPath, Direction, LoRef};
use hwconfig_log::diagnostic;

use crate::backend::Backend;
use crate::document::{ChannelDescription, HardwareDescription, InstrumentDescription};
use crate::error::{Error, Report, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub path: ChannelPath,
    pub kind: ChannelKind,
    pub direction: Direction,
    /// Type of the instrument or module providing the channel.
    pub unit_type: &'static str,
    pub integrated_lo: Option<LoRef>,
    pub mix_lo: Option<bool>,
    pub downconverter_freq: Option<f64>,
    pub marker_debug_mode_enable: Option<bool>,
}

impl Channel {
    pub fn capacity(&self) -> Option<usize> {
        self.kind.capacity()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalOscillator {
    pub name: String,
    /// Output power in dBm.
    pub power: Option<f64>,
    pub instrument_name: Option<String>,
    pub generic_icc_name: Option<String>,
    pub frequency_param: Option<String>,
    pub power_param: Option<String>,
}

pub struct DescriptionGraph {
    backend: Backend,
    instrument_types: IndexMap<String, String>,
    /// Instruments and modules that provide channels, by path.
    units: IndexMap<String, &'static InstrumentTraits>,
    channels: IndexMap<ChannelPath, Channel>,
    local_oscillators: IndexMap<String, LocalOscillator>,
}

impl DescriptionGraph {
    /// Build the graph, collecting every schema problem of the description.
    pub fn build(description: &HardwareDescription, backend: Backend) -> Result<Self> {
        let mut builder = GraphBuilder {
            graph: DescriptionGraph {
                backend,
                instrument_types: IndexMap::new(),
                units: IndexMap::new(),
                channels: IndexMap::new(),
                local_oscillators: IndexMap::new(),
            },
            report: Report::new(),
        };
        for (name, instrument) in description.0.iter() {
            builder.add_instrument(name, instrument);
        }
        let GraphBuilder { graph, report } = builder;
        report.into_result(Error::Schema)?;
        diagnostic!(
            "Hardware description: {} instruments, {} channels, {} local oscillators",
            graph.instrument_types.len(),
            graph.channels.len(),
            graph.local_oscillators.len()
        );
        Ok(graph)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn lookup_channel(&self, path: &ChannelPath) -> Option<&Channel> {
        self.channels.get(path)
    }

    pub fn lookup_lo(&self, name: &str) -> Option<&LocalOscillator> {
        self.local_oscillators.get(name)
    }

    pub fn channel_kind(&self, path: &ChannelPath) -> Option<ChannelKind> {
        self.lookup_channel(path).map(|c| c.kind)
    }

    pub fn instrument_type(&self, name: &str) -> Option<&str> {
        self.instrument_types.get(name).map(String::as_str)
    }

    /// Traits of the instrument or module at `path`.
    pub fn unit_traits(&self, path: &str) -> Option<&'static InstrumentTraits> {
        self.units.get(path).copied()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn local_oscillators(&self) -> impl Iterator<Item = &LocalOscillator> {
        self.local_oscillators.values()
    }
}

struct GraphBuilder {
    graph: DescriptionGraph,
    report: Report,
}

impl GraphBuilder {
    fn add_instrument(&mut self, name: &str, instrument: &InstrumentDescription) {
        let location = format!("hardware_description.{name}");
        self.graph
            .instrument_types
            .insert(name.to_string(), instrument.instrument_type.clone());
        if instrument.instrument_type == LOCAL_OSCILLATOR_TYPE {
            self.add_local_oscillator(name, instrument, &location);
            return;
        }
        let backend = self.graph.backend;
        let Some(traits) = backend.instrument_traits(&instrument.instrument_type) else {
            self.report.push(
                &location,
                format!(
                    "Unknown instrument type '{}' for backend '{backend}'",
                    instrument.instrument_type
                ),
            );
            return;
        };
        if is_module_type(backend, traits.instrument_type) {
            self.report.push(
                &location,
                format!(
                    "'{}' is a module type and must be placed in a slot of a composite instrument",
                    traits.instrument_type
                ),
            );
            return;
        }
        if let Some(reference) = &instrument.reference {
            if traits.reference_sources.is_empty() {
                self.report
                    .push(&location, "Field 'ref' is not applicable to this instrument");
            } else if !traits.reference_sources.contains(&reference.as_str()) {
                self.report.push(
                    &location,
                    format!(
                        "Invalid reference source '{reference}', expected one of: {}",
                        traits.reference_sources.join(", ")
                    ),
                );
            }
        }
        if instrument.power.is_some() {
            self.report
                .push(&location, "Field 'power' only applies to local oscillators");
        }

        if traits.is_composite() {
            for key in instrument.fields.keys().filter(|k| is_channel_name(k)) {
                self.report.push(
                    format!("{location}.{key}"),
                    format!(
                        "Channels of '{}' must be described on its modules",
                        traits.instrument_type
                    ),
                );
            }
            let Some(modules) = &instrument.modules else {
                return;
            };
            for (slot, module) in modules {
                let module_location = format!("{location}.modules.{slot}");
                let Some(module_name) = module_name(slot) else {
                    self.report.push(
                        &module_location,
                        "Module slots must be integers, e.g. '1', or 'module<slot>'",
                    );
                    continue;
                };
                let module_traits = traits
                    .module_types
                    .contains(&module.instrument_type.as_str())
                    .then(|| backend.instrument_traits(&module.instrument_type))
                    .flatten();
                let Some(module_traits) = module_traits else {
                    self.report.push(
                        &module_location,
                        format!(
                            "Unrecognized module type '{}' for '{}', expected one of: {}",
                            module.instrument_type,
                            traits.instrument_type,
                            traits.module_types.join(", ")
                        ),
                    );
                    continue;
                };
                let path = format!("{name}.{module_name}");
                if self.graph.units.contains_key(&path) {
                    self.report
                        .push(&module_location, format!("Slot '{module_name}' is used twice"));
                    continue;
                }
                self.add_channels(&path, module_traits, &module.fields, &module_location);
            }
        } else {
            if instrument.modules.is_some() {
                self.report.push(
                    &location,
                    format!("'{}' does not have module slots", traits.instrument_type),
                );
            }
            self.add_channels(name, traits, &instrument.fields, &location);
        }
    }

    fn add_local_oscillator(
        &mut self,
        name: &str,
        instrument: &InstrumentDescription,
        location: &str,
    ) {
        if let Some(power) = instrument.power
            && !power.is_finite()
        {
            self.report
                .push(location, format!("Power must be finite, got {power}"));
        }
        if instrument.modules.is_some() || instrument.reference.is_some() {
            self.report.push(
                location,
                "Fields 'modules' and 'ref' are not applicable to local oscillators",
            );
        }
        for key in instrument.fields.keys() {
            self.report.push(
                location,
                format!("Unknown field '{key}' for a local oscillator"),
            );
        }
        self.graph.local_oscillators.insert(
            name.to_string(),
            LocalOscillator {
                name: name.to_string(),
                power: instrument.power,
                instrument_name: instrument.instrument_name.clone(),
                generic_icc_name: instrument.generic_icc_name.clone(),
                frequency_param: instrument.frequency_param.clone(),
                power_param: instrument.power_param.clone(),
            },
        );
    }

    fn add_channels(
        &mut self,
        unit_path: &str,
        traits: &'static InstrumentTraits,
        fields: &IndexMap<String, Value>,
        location: &str,
    ) {
        self.graph.units.insert(unit_path.to_string(), traits);

        let mut declared = IndexMap::new();
        for (key, value) in fields.iter().filter(|(k, _)| is_channel_name(k)) {
            let channel_location = format!("{location}.{key}");
            if traits.channel(key).is_none() {
                self.report.push(
                    &channel_location,
                    format!(
                        "'{}' has no channel '{key}', available: {}",
                        traits.instrument_type,
                        traits
                            .channels
                            .iter()
                            .map(|c| c.name)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                );
                continue;
            }
            match serde_json::from_value::<ChannelDescription>(value.clone()) {
                Ok(desc) => {
                    declared.insert(key.as_str(), desc);
                }
                Err(e) => self.report.push(&channel_location, e.to_string()),
            }
        }

        for channel_traits in traits.channels {
            let description = declared.get(channel_traits.name);
            let channel_location = format!("{location}.{}", channel_traits.name);
            let mode = match description.and_then(|d| d.mode.as_deref()) {
                Some(mode) => match mode.parse::<ChannelKind>() {
                    Ok(ChannelKind::Digital) | Err(_) => {
                        self.report.push(
                            &channel_location,
                            format!("Invalid mode '{mode}', expected 'complex' or 'real'"),
                        );
                        continue;
                    }
                    Ok(kind) => Some(kind),
                },
                None => None,
            };
            let kind = match (channel_traits.kind, mode) {
                (Some(fixed), Some(mode)) if fixed != mode => {
                    self.report.push(
                        &channel_location,
                        format!("Channel is of kind '{fixed}', but mode '{mode}' was given"),
                    );
                    continue;
                }
                (Some(fixed), _) => fixed,
                (None, Some(mode)) => mode,
                (None, None) => {
                    if description.is_some() {
                        self.report
                            .push(&channel_location, "Channel must declare its 'mode'");
                    }
                    continue;
                }
            };
            let description = description.cloned().unwrap_or_default();
            if kind != ChannelKind::Complex
                && (description.mix_lo.is_some() || description.downconverter_freq.is_some())
            {
                self.report.push(
                    &channel_location,
                    "Fields 'mix_lo' and 'downconverter_freq' only apply to complex channels",
                );
            }
            if let Some(freq) = description.downconverter_freq
                && !freq.is_finite()
            {
                self.report.push(
                    &channel_location,
                    format!("Downconverter frequency must be finite, got {freq}"),
                );
            }
            let path = ChannelPath::from_segments([unit_path, channel_traits.name]);
            let channel = Channel {
                path: path.clone(),
                kind,
                direction: channel_traits.direction,
                unit_type: traits.instrument_type,
                integrated_lo: channel_traits.integrated_lo.map(|index| LoRef::Integrated {
                    module: unit_path.to_string(),
                    index,
                }),
                mix_lo: description.mix_lo,
                downconverter_freq: description.downconverter_freq,
                marker_debug_mode_enable: description.marker_debug_mode_enable,
            };
            self.graph.channels.insert(path, channel);
        }
    }
}

fn is_module_type(backend: Backend, instrument_type: &str) -> bool {
    backend
        .instruments()
        .iter()
        .any(|traits| traits.module_types.contains(&instrument_type))
}

/// Path segment of a module slot: `1` and `module1` both give `module1`.
fn module_name(slot: &str) -> Option<String> {
    let index = slot.strip_prefix("module").unwrap_or(slot);
    (!index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
        .then(|| format!("module{}", index.trim_start_matches('0').max("0")))
}
