// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! The compilation pipeline.
//!
//! `Parsed -> Validated -> FrequenciesResolved -> CompiledHardwareMap`. Every
//! transition consumes the compilation, the `Err` of a transition is the
//! failed state.

use hwconfig_log::warn;

use crate::backend::Backend;
use crate::compiled_map::{CompiledHardwareMap, CompiledMapBuilder};
use crate::connectivity_graph::ConnectivityGraph;
use crate::description_graph::DescriptionGraph;
use crate::document::{HardwareCompilationConfig, HardwareOptions};
use crate::error::{Error, Report, Result};
use crate::frequency_resolver::{FrequencyResolver, ResolvedFrequencies};
use crate::options_table::OptionsTable;
use crate::settings::CompilerSettings;
use crate::validation::ReferentialValidator;

pub struct Parsed;

pub struct Validated {
    warnings: Vec<String>,
}

pub struct FrequenciesResolved {
    warnings: Vec<String>,
    frequencies: ResolvedFrequencies,
}

pub struct Compilation<S> {
    settings: CompilerSettings,
    description: DescriptionGraph,
    options: OptionsTable,
    connectivity: ConnectivityGraph,
    state: S,
}

impl<S> Compilation<S> {
    pub fn backend(&self) -> Backend {
        self.description.backend()
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    pub fn description(&self) -> &DescriptionGraph {
        &self.description
    }

    pub fn options(&self) -> &OptionsTable {
        &self.options
    }

    pub fn connectivity(&self) -> &ConnectivityGraph {
        &self.connectivity
    }

    fn advance<T>(self, state: T) -> Compilation<T> {
        Compilation {
            settings: self.settings,
            description: self.description,
            options: self.options,
            connectivity: self.connectivity,
            state,
        }
    }
}

impl Compilation<Parsed> {
    /// Build the three graphs.
    ///
    /// Schema problems of all input documents are reported together.
    pub fn parse(config: &HardwareCompilationConfig, settings: CompilerSettings) -> Result<Self> {
        let mut report = Report::new();
        let backend = collect(Backend::from_identifier(&config.backend), &mut report)?;
        let description = match backend {
            Some(backend) => collect(
                DescriptionGraph::build(&config.hardware_description, backend),
                &mut report,
            )?,
            None => None,
        };
        let default_options = HardwareOptions::default();
        let options = collect(
            OptionsTable::build(config.hardware_options.as_ref().unwrap_or(&default_options)),
            &mut report,
        )?;
        let connectivity = collect(ConnectivityGraph::build(&config.connectivity), &mut report)?;
        match (description, options, connectivity) {
            (Some(description), Some(options), Some(connectivity)) if report.is_empty() => {
                Ok(Compilation {
                    settings,
                    description,
                    options,
                    connectivity,
                    state: Parsed,
                })
            }
            _ => Err(Error::Schema(report)),
        }
    }

    pub fn validate(self) -> Result<Compilation<Validated>> {
        let warnings = ReferentialValidator::new(
            &self.description,
            &self.options,
            &self.connectivity,
            &self.settings,
        )
        .validate()?;
        Ok(self.advance(Validated { warnings }))
    }
}

impl Compilation<Validated> {
    pub fn resolve_frequencies(mut self) -> Result<Compilation<FrequenciesResolved>> {
        let frequencies =
            FrequencyResolver::new(&self.description, &self.options, &self.connectivity)
                .resolve()?;
        let warnings = std::mem::take(&mut self.state.warnings);
        Ok(self.advance(FrequenciesResolved {
            warnings,
            frequencies,
        }))
    }
}

impl Compilation<FrequenciesResolved> {
    pub fn frequencies(&self) -> &ResolvedFrequencies {
        &self.state.frequencies
    }

    pub fn build(self) -> Result<CompiledHardwareMap> {
        let builder = CompiledMapBuilder::new(
            &self.description,
            &self.options,
            &self.connectivity,
            &self.settings,
        );
        builder.build(self.state.frequencies, self.state.warnings)
    }
}

/// Move schema problems into `report`, pass every other error on.
///
/// Duplicate assignments found while schema problems are pending are added to
/// the report.
fn collect<T>(result: Result<T>, report: &mut Report) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(Error::Schema(issues)) => {
            report.extend(issues);
            Ok(None)
        }
        Err(Error::DuplicateAssignment(violations)) if !report.is_empty() => {
            for violation in violations {
                report.push(violation.location(), violation.to_string());
            }
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Compile the hardware compilation config into the compiled hardware map.
///
/// [`CompilerSettings::diagnostics`] switches diagnostic logging on for the
/// process. It never switches it off.
pub fn compile(
    config: &HardwareCompilationConfig,
    mut settings: CompilerSettings,
) -> Result<CompiledHardwareMap> {
    for msg in settings.sanitize() {
        warn!(
            "Compiler setting `{}` is sanitized from {} to {}. Reason: {}",
            msg.field.to_uppercase(),
            msg.original,
            msg.sanitized,
            msg.reason
        );
    }
    if settings.diagnostics {
        hwconfig_log::init_logging(true);
    }
    Compilation::parse(config, settings)?
        .validate()?
        .resolve_frequencies()?
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConstraintConflict, DuplicateAssignment};
    use hwconfig_common::types::{ChannelPath, PortClockId};
    use proptest::prelude::*;
    use serde_json::{Value, json};

    fn config(value: Value) -> HardwareCompilationConfig {
        serde_json::from_value(value).unwrap()
    }

    fn qblox_config(options: Value, connectivity: Value) -> HardwareCompilationConfig {
        config(json!({
            "backend": "quantify_scheduler.backends.qblox_backend.hardware_compile",
            "hardware_description": {
                "cluster0": {
                    "instrument_type": "Cluster",
                    "ref": "internal",
                    "modules": {
                        "1": {"instrument_type": "QCM"},
                        "2": {"instrument_type": "QRM"}
                    }
                },
                "lo0": {"instrument_type": "LocalOscillator", "power": 1},
                "lo1": {"instrument_type": "LocalOscillator", "power": 1}
            },
            "hardware_options": options,
            "connectivity": connectivity
        }))
    }

    fn pc(port: &str, clock: &str) -> PortClockId {
        PortClockId::new(port, clock)
    }

    #[test]
    fn test_lo_only_member() {
        let map = compile(
            &qblox_config(
                json!({"modulation_frequencies": {"q0:mw-q0.01": {"lo_freq": 7.8e9, "interm_freq": null}}}),
                json!({
                    "cluster0.module1.complex_output_0": {
                        "lo_name": "lo0",
                        "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                    }
                }),
            ),
            CompilerSettings::default(),
        )
        .unwrap();
        let (_, entry) = map.find_port_clock(&pc("q0:mw", "q0.01")).unwrap();
        assert_eq!(entry.frequencies.lo_freq, Some(7.8e9));
        assert_eq!(entry.frequencies.interm_freq, None);
        let channel = map
            .channel(&"cluster0.module1.complex_output_0".into())
            .unwrap();
        assert_eq!(
            channel.local_oscillator.as_ref().unwrap().frequency,
            Some(7.8e9)
        );
    }

    #[test]
    fn test_lo_conflict() {
        let result = compile(
            &qblox_config(
                json!({"modulation_frequencies": {
                    "q0:mw-q0.01": {"lo_freq": 7.8e9},
                    "q1:mw-q1.01": {"lo_freq": 7.2e9}
                }}),
                json!({
                    "cluster0.module1.complex_output_0": {
                        "lo_name": "lo0",
                        "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                    },
                    "cluster0.module1.complex_output_1": {
                        "lo_name": "lo0",
                        "portclock_configs": [{"port": "q1:mw", "clock": "q1.01"}]
                    }
                }),
            ),
            CompilerSettings::default(),
        );
        let Err(Error::ConstraintConflict(conflict @ ConstraintConflict::LoFrequency { .. })) =
            result
        else {
            panic!("Expected LO frequency conflict");
        };
        assert_eq!(
            conflict.port_clocks(),
            [&pc("q0:mw", "q0.01"), &pc("q1:mw", "q1.01")]
        );
        let msg = conflict.to_string();
        assert!(msg.contains("q0:mw-q0.01") && msg.contains("q1:mw-q1.01"));
    }

    #[test]
    fn test_missing_los_reported_together() {
        let result = compile(
            &qblox_config(
                json!(null),
                json!({
                    "cluster0.module1.complex_output_0": {
                        "lo_name": "lo_a",
                        "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                    },
                    "cluster0.module2.complex_output_0": {
                        "lo_name": "lo_b",
                        "portclock_configs": [{"port": "q0:res", "clock": "q0.ro"}]
                    }
                }),
            ),
            CompilerSettings::default(),
        );
        let Err(Error::Referential(report)) = result else {
            panic!("Expected referential error");
        };
        assert_eq!(report.len(), 2);
        let msg = Error::Referential(report).to_string();
        assert!(msg.contains("lo_a") && msg.contains("lo_b"));
    }

    #[test]
    fn test_real_vs_complex_capacity() {
        let port_clocks = json!([
            {"port": "q0:fl", "clock": "cl0.baseband"},
            {"port": "q1:fl", "clock": "cl0.baseband"}
        ]);
        let result = compile(
            &qblox_config(
                json!({}),
                json!({"cluster0.module1.real_output_0": {"portclock_configs": port_clocks}}),
            ),
            CompilerSettings::default(),
        );
        assert!(matches!(
            result,
            Err(Error::DuplicateAssignment(ref violations)) if matches!(
                violations.as_slice(),
                [DuplicateAssignment::ChannelCapacity { .. }]
            )
        ));

        let map = compile(
            &qblox_config(
                json!({}),
                json!({"cluster0.module1.complex_output_0": {"portclock_configs": port_clocks}}),
            ),
            CompilerSettings::default(),
        )
        .unwrap();
        let channel = map
            .channel(&ChannelPath::from("cluster0.module1.complex_output_0"))
            .unwrap();
        let entries = channel
            .port_clocks
            .iter()
            .map(|e| &e.port_clock)
            .collect::<Vec<_>>();
        assert_eq!(
            entries,
            [&pc("q0:fl", "cl0.baseband"), &pc("q1:fl", "cl0.baseband")]
        );
    }

    #[test]
    fn test_schema_errors_of_all_documents() {
        let result = compile(
            &config(json!({
                "backend": "quantify_scheduler.backends.qblox_backend.hardware_compile",
                "hardware_description": {"cluster0": {"instrument_type": "Cluster9000"}},
                "hardware_options": {"latency_corrections": {"nonsense": 1e-9}},
                "connectivity": {"cluster0.module1.complex_output_0": {"portclock_configs": [{"port": "q0", "clock": "q0.01"}]}}
            })),
            CompilerSettings::default(),
        );
        let Err(Error::Schema(report)) = result else {
            panic!("Expected schema error");
        };
        assert_eq!(report.len(), 3);

        let result = compile(
            &config(json!({
                "backend": "quantify_scheduler.backends.keysight_backend.compile",
                "connectivity": {}
            })),
            CompilerSettings::default(),
        );
        assert!(matches!(result, Err(Error::Schema(r)) if r.len() == 1));
    }

    #[test]
    fn test_duplicates_join_pending_schema_errors() {
        let result = compile(
            &qblox_config(
                json!({"latency_corrections": {"nonsense": 1e-9}}),
                json!({
                    "cluster0.module1.complex_output_0": {
                        "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                    },
                    "cluster0.module1.complex_output_1": {
                        "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                    }
                }),
            ),
            CompilerSettings::default(),
        );
        let Err(Error::Schema(report)) = result else {
            panic!("Expected schema error");
        };
        let locations = report
            .issues()
            .iter()
            .map(|issue| issue.location.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            locations,
            [
                "hardware_options.latency_corrections.nonsense",
                "connectivity.q0:mw-q0.01"
            ]
        );
    }

    #[test]
    fn test_options_for_port_with_dash() {
        let map = compile(
            &qblox_config(
                json!({"modulation_frequencies": {"q0:mw-a-q0.01": {"lo_freq": 7.8e9}}}),
                json!({
                    "cluster0.module1.complex_output_0": {
                        "lo_name": "lo0",
                        "portclock_configs": [{"port": "q0:mw-a", "clock": "q0.01"}]
                    }
                }),
            ),
            CompilerSettings::default(),
        )
        .unwrap();
        assert!(map.warnings().is_empty());
        let (_, entry) = map.find_port_clock(&pc("q0:mw-a", "q0.01")).unwrap();
        assert_eq!(entry.frequencies.lo_freq, Some(7.8e9));
    }

    #[test]
    fn test_diagnostics_setting_enables_logging() {
        let settings = CompilerSettings {
            diagnostics: true,
            ..Default::default()
        };
        let config = qblox_config(
            json!({}),
            json!({
                "cluster0.module1.complex_output_0": {
                    "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                }
            }),
        );
        compile(&config, settings).unwrap();
        assert!(hwconfig_log::is_diagnostics_enabled());
    }

    #[test]
    fn test_zhinst_device_list() {
        let mut value = json!({
            "backend": "quantify_scheduler.backends.zhinst_backend.compile_backend",
            "hardware_description": {
                "hdawg0": {
                    "instrument_type": "HDAWG4",
                    "ref": "int",
                    "channel_0": {"mode": "complex"},
                    "channel_1": {"mode": "real"}
                },
                "mw_lo": {"instrument_type": "LocalOscillator", "power": 13}
            },
            "hardware_options": {
                "modulation_frequencies": {"q0:mw-q0.01": {"interm_freq": -100e6, "lo_freq": 6e9}}
            },
            "connectivity": [{
                "name": "hdawg0",
                "channel_0": {"port": "q0:mw", "clock": "q0.01", "mode": "complex", "local_oscillator": "mw_lo"},
                "channel_1": {"port": "q0:fl", "clock": "cl0.baseband", "mode": "real"}
            }]
        });
        let map = compile(&config(value.clone()), CompilerSettings::default()).unwrap();
        assert_eq!(map.backend(), Backend::Zhinst);
        let lo = map
            .channel(&"hdawg0.channel_0".into())
            .unwrap()
            .local_oscillator
            .clone()
            .unwrap();
        assert_eq!(lo.frequency, Some(6e9));
        assert_eq!(lo.power, Some(13.0));

        value["connectivity"][0]["channel_1"]["mode"] = json!("complex");
        let result = compile(&config(value), CompilerSettings::default());
        assert!(matches!(result, Err(Error::Referential(r)) if r.len() == 1));
    }

    #[test]
    fn test_staged_pipeline() {
        let config = qblox_config(
            json!({"modulation_frequencies": {"q0:mw-q0.01": {"interm_freq": 50e6}}}),
            json!({
                "cluster0.module1.complex_output_0": {
                    "lo_name": "lo1",
                    "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                }
            }),
        );
        let parsed = Compilation::parse(&config, CompilerSettings::default()).unwrap();
        assert_eq!(parsed.backend(), Backend::Qblox);
        let resolved = parsed.validate().unwrap().resolve_frequencies().unwrap();
        assert_eq!(resolved.frequencies().groups().len(), 1);
        let map = resolved.build().unwrap();
        // The LO frequency stays open
        assert_eq!(map.unresolved().len(), 1);
        assert_eq!(
            map.channel(&"cluster0.module1.complex_output_0".into())
                .unwrap()
                .local_oscillator
                .as_ref()
                .unwrap()
                .frequency,
            None
        );
    }

    /// Wire one port-clock per `(module, output)` pair onto the complex outputs
    /// of the cluster, each with a distinct intermediate frequency.
    fn generated_config(assignment: &[(u8, u8)]) -> HardwareCompilationConfig {
        let mut connectivity = serde_json::Map::new();
        let mut frequencies = serde_json::Map::new();
        for (index, (module, output)) in assignment.iter().enumerate() {
            let path = format!("cluster0.module{}.complex_output_{}", module, output);
            let entry = connectivity
                .entry(path)
                .or_insert_with(|| json!({"portclock_configs": []}));
            entry["portclock_configs"]
                .as_array_mut()
                .unwrap()
                .push(json!({"port": format!("q{index}:mw"), "clock": format!("q{index}.01")}));
            frequencies.insert(
                format!("q{index}:mw-q{index}.01"),
                json!({"interm_freq": 1e6 * index as f64}),
            );
        }
        qblox_config(
            json!({"modulation_frequencies": frequencies}),
            Value::Object(connectivity),
        )
    }

    proptest! {
        #[test]
        fn test_every_port_clock_compiled_once(
            assignment in prop::collection::vec((1u8..=2, 0u8..=1), 1..20)
        ) {
            // QRM has a single complex output
            let assignment = assignment
                .into_iter()
                .map(|(module, output)| (module, if module == 2 { 0 } else { output }))
                .collect::<Vec<_>>();
            let config = generated_config(&assignment);
            let map = compile(&config, CompilerSettings::default()).unwrap();
            for (index, (module, output)) in assignment.iter().enumerate() {
                let port_clock = pc(&format!("q{index}:mw"), &format!("q{index}.01"));
                let hits = map
                    .channels()
                    .iter()
                    .flat_map(|(path, config)| {
                        config.port_clocks.iter().map(move |e| (path, &e.port_clock))
                    })
                    .filter(|(_, id)| **id == port_clock)
                    .collect::<Vec<_>>();
                prop_assert_eq!(hits.len(), 1);
                let expected = format!("cluster0.module{module}.complex_output_{output}");
                prop_assert_eq!(hits[0].0.as_str(), expected.as_str());
            }

            // Compiling again gives the same output
            let again = compile(&config, CompilerSettings::default()).unwrap();
            prop_assert_eq!(map.to_json().unwrap(), again.to_json().unwrap());
        }
    }
}
