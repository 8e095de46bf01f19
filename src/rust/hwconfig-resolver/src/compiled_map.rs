// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::Serialize;

use hwconfig_common::types::{ChannelKind, ChannelPath, Direction, LoRef, PortClockId};
use hwconfig_log::diagnostic;

use crate::backend::Backend;
use crate::connectivity_graph::ConnectivityGraph;
use crate::description_graph::DescriptionGraph;
use crate::error::{ConstraintConflict, DuplicateAssignment, Error, Result};
use crate::frequency_resolver::{FrequencySplit, ResolvedFrequencies, UnresolvedFrequency};
use crate::options_table::{CorrectionSet, OptionsTable};
use crate::settings::CompilerSettings;

/// The fully resolved configuration of every connected channel.
///
/// Channels are ordered by path, so the serialized map is identical for
/// identical inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledHardwareMap {
    backend: Backend,
    channels: BTreeMap<ChannelPath, CompiledChannelConfig>,
    unresolved: Vec<UnresolvedFrequency>,
    warnings: Vec<String>,
}

impl CompiledHardwareMap {
    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn channels(&self) -> &BTreeMap<ChannelPath, CompiledChannelConfig> {
        &self.channels
    }

    pub fn channel(&self, path: &ChannelPath) -> Option<&CompiledChannelConfig> {
        self.channels.get(path)
    }

    /// Channel carrying `port_clock` and its compiled entry.
    pub fn find_port_clock(
        &self,
        port_clock: &PortClockId,
    ) -> Option<(&ChannelPath, &CompiledPortClock)> {
        self.channels.iter().find_map(|(path, config)| {
            config
                .port_clocks
                .iter()
                .find(|entry| &entry.port_clock == port_clock)
                .map(|entry| (path, entry))
        })
    }

    /// Frequencies left unresolved, in document order.
    pub fn unresolved(&self) -> &[UnresolvedFrequency] {
        &self.unresolved
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledChannelConfig {
    /// Type of the instrument or module providing the channel.
    pub instrument_type: &'static str,
    pub kind: ChannelKind,
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_oscillator: Option<CompiledLocalOscillator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mix_lo: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downconverter_freq: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker_debug_mode_enable: Option<bool>,
    /// Port-clocks in document order.
    pub port_clocks: Vec<CompiledPortClock>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledLocalOscillator {
    #[serde(flatten)]
    pub lo: LoRef,
    /// `None` while unresolved.
    pub frequency: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledPortClock {
    pub port_clock: PortClockId,
    pub frequencies: FrequencySplit,
    #[serde(skip_serializing_if = "CorrectionSet::is_empty")]
    pub corrections: CorrectionSet,
}

pub struct CompiledMapBuilder<'a> {
    description: &'a DescriptionGraph,
    options: &'a OptionsTable,
    connectivity: &'a ConnectivityGraph,
    settings: &'a CompilerSettings,
}

impl<'a> CompiledMapBuilder<'a> {
    pub fn new(
        description: &'a DescriptionGraph,
        options: &'a OptionsTable,
        connectivity: &'a ConnectivityGraph,
        settings: &'a CompilerSettings,
    ) -> Self {
        CompiledMapBuilder {
            description,
            options,
            connectivity,
            settings,
        }
    }

    pub fn build(
        &self,
        frequencies: ResolvedFrequencies,
        warnings: Vec<String>,
    ) -> Result<CompiledHardwareMap> {
        let mut channels = BTreeMap::new();
        for path in self.connectivity.channels() {
            let config = self.build_channel(path, &frequencies)?;
            channels.insert(path.clone(), config);
        }
        diagnostic!("Compiled {} channels", channels.len());
        Ok(CompiledHardwareMap {
            backend: self.description.backend(),
            channels,
            unresolved: frequencies.into_unresolved(),
            warnings,
        })
    }

    fn build_channel(
        &self,
        path: &ChannelPath,
        frequencies: &ResolvedFrequencies,
    ) -> Result<CompiledChannelConfig> {
        let channel = self
            .description
            .lookup_channel(path)
            .ok_or_else(|| Error::new(format!("Channel '{path}' is not described")))?;
        let port_clocks = self.connectivity.port_clocks_on(path);
        if let Some(capacity) = channel.capacity()
            && port_clocks.len() > capacity
        {
            return Err(DuplicateAssignment::ChannelCapacity {
                channel: path.clone(),
                kind: channel.kind,
                capacity,
                port_clocks: port_clocks.into_iter().cloned().collect(),
            }
            .into());
        }

        let entries = port_clocks
            .iter()
            .map(|&port_clock| CompiledPortClock {
                port_clock: port_clock.clone(),
                frequencies: frequencies.split_for(port_clock),
                corrections: self.options.corrections_for(port_clock),
            })
            .collect::<Vec<_>>();
        if self.settings.require_distinct_intermediate_frequencies {
            check_distinct_intermediate_frequencies(path, &entries)?;
        }

        let local_oscillator = port_clocks
            .first()
            .and_then(|pc| frequencies.lo_for(pc))
            .map(|lo| CompiledLocalOscillator {
                lo: lo.clone(),
                frequency: frequencies.lo_frequency(lo),
                power: match lo {
                    LoRef::External { name } => {
                        self.description.lookup_lo(name).and_then(|lo| lo.power)
                    }
                    LoRef::Integrated { .. } => None,
                },
            });

        Ok(CompiledChannelConfig {
            instrument_type: channel.unit_type,
            kind: channel.kind,
            direction: channel.direction,
            local_oscillator,
            mix_lo: channel.mix_lo,
            downconverter_freq: channel.downconverter_freq,
            marker_debug_mode_enable: channel.marker_debug_mode_enable,
            port_clocks: entries,
        })
    }
}

/// Port-clocks multiplexed on one channel need distinct intermediate frequencies.
fn check_distinct_intermediate_frequencies(
    path: &ChannelPath,
    entries: &[CompiledPortClock],
) -> Result<()> {
    for (index, entry) in entries.iter().enumerate() {
        let Some(frequency) = entry.frequencies.interm_freq else {
            continue;
        };
        let same = entries[index + 1..]
            .iter()
            .filter(|other| other.frequencies.interm_freq == Some(frequency))
            .map(|other| other.port_clock.clone())
            .collect::<Vec<_>>();
        if !same.is_empty() {
            let port_clocks = std::iter::once(entry.port_clock.clone())
                .chain(same)
                .collect();
            return Err(ConstraintConflict::IntermediateFrequency {
                channel: path.clone(),
                frequency,
                port_clocks,
            }
            .into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Connectivity, HardwareDescription, HardwareOptions};
    use crate::frequency_resolver::FrequencyResolver;
    use serde_json::{Value, json};

    fn build(
        options: Value,
        connectivity: Value,
        settings: &CompilerSettings,
    ) -> Result<CompiledHardwareMap> {
        let description: HardwareDescription = serde_json::from_value(json!({
            "cluster0": {
                "instrument_type": "Cluster",
                "modules": {
                    "1": {"instrument_type": "QCM"},
                    "2": {
                        "instrument_type": "QCM_RF",
                        "complex_output_0": {"marker_debug_mode_enable": true}
                    }
                }
            },
            "lo0": {"instrument_type": "LocalOscillator", "power": 6}
        }))
        .unwrap();
        let options: HardwareOptions = serde_json::from_value(options).unwrap();
        let connectivity: Connectivity = serde_json::from_value(connectivity).unwrap();
        let description = DescriptionGraph::build(&description, Backend::Qblox).unwrap();
        let options = OptionsTable::build(&options).unwrap();
        let connectivity = ConnectivityGraph::build(&connectivity).unwrap();
        let frequencies = FrequencyResolver::new(&description, &options, &connectivity)
            .resolve()
            .unwrap();
        CompiledMapBuilder::new(&description, &options, &connectivity, settings)
            .build(frequencies, vec![])
    }

    fn pc(port: &str, clock: &str) -> PortClockId {
        PortClockId::new(port, clock)
    }

    #[test]
    fn test_channel_configs() {
        let map = build(
            json!({
                "modulation_frequencies": {
                    "q0:mw-q0.01": {"interm_freq": 50e6, "lo_freq": 7.8e9},
                    "q1:mw-q1.01": {"interm_freq": -50e6},
                    "q2:mw-q2.01": {"lo_freq": 6e9}
                },
                "mixer_corrections": {"q1:mw-q1.01": {"amp_ratio": 0.95}}
            }),
            json!({
                "cluster0.module2.complex_output_0": {
                    "portclock_configs": [{"port": "q2:mw", "clock": "q2.01"}]
                },
                "cluster0.module1.complex_output_0": {
                    "lo_name": "lo0",
                    "portclock_configs": [
                        {"port": "q0:mw", "clock": "q0.01"},
                        {"port": "q1:mw", "clock": "q1.01"}
                    ]
                }
            }),
            &CompilerSettings::default(),
        )
        .unwrap();

        // Sorted by path
        assert_eq!(
            map.channels().keys().map(ChannelPath::as_str).collect::<Vec<_>>(),
            [
                "cluster0.module1.complex_output_0",
                "cluster0.module2.complex_output_0"
            ]
        );
        let baseband = map
            .channel(&"cluster0.module1.complex_output_0".into())
            .unwrap();
        assert_eq!(
            baseband.local_oscillator,
            Some(CompiledLocalOscillator {
                lo: LoRef::external("lo0"),
                frequency: Some(7.8e9),
                power: Some(6.0),
            })
        );
        assert_eq!(baseband.port_clocks.len(), 2);
        assert_eq!(
            baseband.port_clocks[1].frequencies,
            FrequencySplit {
                interm_freq: Some(-50e6),
                lo_freq: Some(7.8e9)
            }
        );
        assert_eq!(
            baseband.port_clocks[1]
                .corrections
                .mixer_corrections
                .and_then(|c| c.amp_ratio),
            Some(0.95)
        );

        let rf = map
            .channel(&"cluster0.module2.complex_output_0".into())
            .unwrap();
        assert_eq!(rf.marker_debug_mode_enable, Some(true));
        let lo = rf.local_oscillator.as_ref().unwrap();
        assert_eq!(lo.frequency, Some(6e9));
        assert_eq!(lo.power, None);

        let (path, entry) = map.find_port_clock(&pc("q2:mw", "q2.01")).unwrap();
        assert_eq!(path.as_str(), "cluster0.module2.complex_output_0");
        assert_eq!(entry.frequencies.interm_freq, None);
        assert_eq!(map.unresolved().len(), 1);
    }

    #[test]
    fn test_equal_intermediate_frequencies() {
        let options = json!({
            "modulation_frequencies": {
                "q0:mw-q0.01": {"interm_freq": 50e6},
                "q1:mw-q1.01": {"interm_freq": 20e6},
                "q2:mw-q2.01": {"interm_freq": 50e6}
            }
        });
        let connectivity = json!({
            "cluster0.module1.complex_output_0": {
                "lo_name": "lo0",
                "portclock_configs": [
                    {"port": "q0:mw", "clock": "q0.01"},
                    {"port": "q1:mw", "clock": "q1.01"},
                    {"port": "q2:mw", "clock": "q2.01"}
                ]
            }
        });
        let result = build(
            options.clone(),
            connectivity.clone(),
            &CompilerSettings::default(),
        );
        let Err(Error::ConstraintConflict(conflict)) = result else {
            panic!("Expected constraint conflict");
        };
        assert_eq!(
            conflict.port_clocks(),
            [&pc("q0:mw", "q0.01"), &pc("q2:mw", "q2.01")]
        );

        let settings = CompilerSettings {
            require_distinct_intermediate_frequencies: false,
            ..Default::default()
        };
        assert!(build(options, connectivity, &settings).is_ok());
    }

    #[test]
    fn test_serialized_form() {
        let map = build(
            json!({"latency_corrections": {"q0:fl-cl0.baseband": 4e-9}}),
            json!({
                "cluster0.module1.real_output_0": {
                    "portclock_configs": [{"port": "q0:fl", "clock": "cl0.baseband"}]
                }
            }),
            &CompilerSettings::default(),
        )
        .unwrap();
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(
            value,
            json!({
                "backend": "qblox",
                "channels": {
                    "cluster0.module1.real_output_0": {
                        "instrument_type": "QCM",
                        "kind": "real",
                        "direction": "output",
                        "port_clocks": [{
                            "port_clock": "q0:fl-cl0.baseband",
                            "frequencies": {"interm_freq": null, "lo_freq": null},
                            "corrections": {"latency_correction": 4e-9}
                        }]
                    }
                },
                "unresolved": [{
                    "port_clock": "q0:fl-cl0.baseband",
                    "slot": "intermediate_frequency"
                }],
                "warnings": []
            })
        );
    }
}
