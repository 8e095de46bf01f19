// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Cross-document checks between the hardware description, the hardware
//! options and the connectivity.
//!
//! Every check runs to completion and all problems are reported together.

use std::collections::HashSet;

use hwconfig_common::types::{ChannelKind, ChannelPath};
use hwconfig_log::{diagnostic, warn};

use crate::connectivity_graph::{ConnectivityEdge, ConnectivityGraph};
use crate::description_graph::DescriptionGraph;
use crate::error::{DuplicateAssignment, Error, Report, Result};
use crate::options_table::OptionsTable;
use crate::settings::{CompilerSettings, UnusedOptionsPolicy};

pub struct ReferentialValidator<'a> {
    description: &'a DescriptionGraph,
    options: &'a OptionsTable,
    connectivity: &'a ConnectivityGraph,
    settings: &'a CompilerSettings,
}

impl<'a> ReferentialValidator<'a> {
    pub fn new(
        description: &'a DescriptionGraph,
        options: &'a OptionsTable,
        connectivity: &'a ConnectivityGraph,
        settings: &'a CompilerSettings,
    ) -> Self {
        ReferentialValidator {
            description,
            options,
            connectivity,
            settings,
        }
    }

    /// Run all checks.
    ///
    /// Returns the non-fatal warnings. Fails with [`Error::Referential`] if any
    /// reference is dangling, otherwise with [`Error::DuplicateAssignment`]
    /// listing every channel that carries more port-clocks than its kind allows.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut report = Report::new();
        let warnings = self.check_unused_options(&mut report);
        for edge in self.connectivity.edges() {
            self.check_edge(edge, &mut report);
        }
        let overloaded = self.check_capacity();
        if !report.is_empty() {
            for violation in overloaded {
                report.push(violation.location(), violation.to_string());
            }
            return Err(Error::Referential(report));
        }
        if !overloaded.is_empty() {
            return Err(Error::DuplicateAssignment(overloaded));
        }
        diagnostic!("Referential validation passed with {} warnings", warnings.len());
        Ok(warnings)
    }

    /// Options of port-clocks that are not connected.
    fn check_unused_options(&self, report: &mut Report) -> Vec<String> {
        let mut warnings = vec![];
        let connected = self
            .connectivity
            .edges()
            .iter()
            .map(|edge| edge.port_clock.to_string())
            .collect::<HashSet<_>>();
        for port_clock in self.options.port_clocks() {
            if connected.contains(port_clock) {
                continue;
            }
            let location = format!("hardware_options.{port_clock}");
            let message = "Port-clock has hardware options but is not connected";
            match self.settings.unused_options {
                UnusedOptionsPolicy::Ignore => {}
                UnusedOptionsPolicy::Warn => {
                    warn!("{}: {}", location, message);
                    warnings.push(format!("{location}: {message}"));
                }
                UnusedOptionsPolicy::Error => report.push(location, message),
            }
        }
        warnings
    }

    fn check_edge(&self, edge: &ConnectivityEdge, report: &mut Report) {
        let location = edge.location.as_str();
        let Some(channel) = self.description.lookup_channel(&edge.channel) else {
            report.push(location, self.missing_channel_message(&edge.channel));
            return;
        };
        if let Some(mode) = edge.mode
            && mode != channel.kind
        {
            report.push(
                location,
                format!(
                    "Mode '{mode}' of '{}' disagrees with the described kind '{}'",
                    edge.port_clock, channel.kind
                ),
            );
        }
        let Some(lo_name) = &edge.lo else {
            return;
        };
        if let Some(integrated) = &channel.integrated_lo {
            report.push(
                location,
                format!(
                    "Channel is fed by the integrated local oscillator '{integrated}', \
                     external local oscillator '{lo_name}' cannot be connected"
                ),
            );
        } else if channel.kind == ChannelKind::Digital {
            report.push(
                location,
                format!("Digital channels cannot be fed by local oscillator '{lo_name}'"),
            );
        }
        if self.description.lookup_lo(lo_name).is_none() {
            let message = match self.description.instrument_type(lo_name) {
                Some(instrument_type) => format!(
                    "'{lo_name}' is a '{instrument_type}', not a local oscillator"
                ),
                None => format!(
                    "Local oscillator '{lo_name}' is not in the hardware description"
                ),
            };
            report.push(location, message);
        }
    }

    fn missing_channel_message(&self, path: &ChannelPath) -> String {
        let unit = path.parent().unwrap_or_default();
        match self.description.unit_traits(unit) {
            Some(traits) => format!(
                "'{unit}' of type '{}' has no channel '{}'",
                traits.instrument_type,
                path.name()
            ),
            None if self.description.instrument_type(path.instrument()).is_some() => {
                format!("Channel '{path}' is not in the hardware description")
            }
            None => format!(
                "Instrument '{}' is not in the hardware description",
                path.instrument()
            ),
        }
    }

    /// Channels carrying more port-clocks than their kind allows.
    fn check_capacity(&self) -> Vec<DuplicateAssignment> {
        let mut violations = vec![];
        for path in self.connectivity.channels() {
            let Some(channel) = self.description.lookup_channel(path) else {
                continue;
            };
            let port_clocks = self.connectivity.port_clocks_on(path);
            if let Some(capacity) = channel.capacity()
                && port_clocks.len() > capacity
            {
                violations.push(DuplicateAssignment::ChannelCapacity {
                    channel: path.clone(),
                    kind: channel.kind,
                    capacity,
                    port_clocks: port_clocks.into_iter().cloned().collect(),
                });
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::document::{Connectivity, HardwareDescription, HardwareOptions};
    use serde_json::{Value, json};

    struct Fixture {
        description: DescriptionGraph,
        options: OptionsTable,
        connectivity: ConnectivityGraph,
    }

    impl Fixture {
        fn new(description: Value, options: Value, connectivity: Value) -> Self {
            let description: HardwareDescription = serde_json::from_value(description).unwrap();
            let options: HardwareOptions = serde_json::from_value(options).unwrap();
            let connectivity: Connectivity = serde_json::from_value(connectivity).unwrap();
            Fixture {
                description: DescriptionGraph::build(&description, Backend::Qblox).unwrap(),
                options: OptionsTable::build(&options).unwrap(),
                connectivity: ConnectivityGraph::build(&connectivity).unwrap(),
            }
        }

        fn validate(&self, settings: &CompilerSettings) -> Result<Vec<String>> {
            ReferentialValidator::new(
                &self.description,
                &self.options,
                &self.connectivity,
                settings,
            )
            .validate()
        }
    }

    fn description() -> Value {
        json!({
            "cluster0": {
                "instrument_type": "Cluster",
                "modules": {
                    "1": {"instrument_type": "QCM"},
                    "2": {"instrument_type": "QCM_RF"}
                }
            },
            "lo0": {"instrument_type": "LocalOscillator", "power": 1}
        })
    }

    #[test]
    fn test_valid() {
        let fixture = Fixture::new(
            description(),
            json!({"output_att": {"q0:mw-q0.01": 4}}),
            json!({
                "cluster0.module1.complex_output_0": {
                    "lo_name": "lo0",
                    "portclock_configs": [
                        {"port": "q0:mw", "clock": "q0.01"},
                        {"port": "q1:mw", "clock": "q1.01"}
                    ]
                },
                "cluster0.module2.complex_output_1": {
                    "portclock_configs": [{"port": "q2:mw", "clock": "q2.01"}]
                }
            }),
        );
        let warnings = fixture.validate(&CompilerSettings::default()).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_all_missing_references_reported() {
        let fixture = Fixture::new(
            description(),
            json!({}),
            json!({
                "cluster0.module1.complex_output_0": {
                    "lo_name": "lo_missing",
                    "portclock_configs": [{"port": "q0:mw", "clock": "q0.01"}]
                },
                "cluster0.module1.complex_output_1": {
                    "lo_name": "lo_also_missing",
                    "portclock_configs": [{"port": "q1:mw", "clock": "q1.01"}]
                },
                "cluster0.module2.complex_output_0": {
                    "lo_name": "lo0",
                    "portclock_configs": [{"port": "q2:mw", "clock": "q2.01"}]
                },
                "cluster0.module1.real_output_0": {
                    "lo_name": "cluster0",
                    "portclock_configs": [{"port": "q3:fl", "clock": "cl0.baseband"}]
                },
                "cluster0.module3.real_output_0": {
                    "portclock_configs": [{"port": "q4:fl", "clock": "cl0.baseband"}]
                },
                "cluster9.module1.real_output_0": {
                    "portclock_configs": [{"port": "q5:fl", "clock": "cl0.baseband"}]
                }
            }),
        );
        let Err(Error::Referential(report)) = fixture.validate(&CompilerSettings::default())
        else {
            panic!("Expected referential error");
        };
        let messages = report
            .issues()
            .iter()
            .map(|i| i.message.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            messages,
            [
                "Local oscillator 'lo_missing' is not in the hardware description",
                "Local oscillator 'lo_also_missing' is not in the hardware description",
                "Channel is fed by the integrated local oscillator 'cluster0.module2.lo0', \
                 external local oscillator 'lo0' cannot be connected",
                "'cluster0' is a 'Cluster', not a local oscillator",
                "Channel 'cluster0.module3.real_output_0' is not in the hardware description",
                "Instrument 'cluster9' is not in the hardware description",
            ]
        );
    }

    #[test]
    fn test_real_channel_capacity() {
        let connectivity = json!({
            "cluster0.module1.real_output_0": {
                "portclock_configs": [
                    {"port": "q0:fl", "clock": "cl0.baseband"},
                    {"port": "q1:fl", "clock": "cl0.baseband"}
                ]
            }
        });
        let fixture = Fixture::new(description(), json!({}), connectivity.clone());
        let result = fixture.validate(&CompilerSettings::default());
        assert!(matches!(
            &result,
            Err(Error::DuplicateAssignment(violations)) if matches!(
                violations.as_slice(),
                [DuplicateAssignment::ChannelCapacity { capacity: 1, port_clocks, .. }]
                    if port_clocks.len() == 2
            )
        ));

        // Reported together with dangling references
        let mut connectivity = connectivity;
        connectivity["cluster0.module1.complex_output_0"] = json!({
            "lo_name": "lo_missing",
            "portclock_configs": [{"port": "q2:mw", "clock": "q2.01"}]
        });
        let fixture = Fixture::new(description(), json!({}), connectivity);
        let Err(Error::Referential(report)) = fixture.validate(&CompilerSettings::default())
        else {
            panic!("Expected referential error");
        };
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.issues()[1].location,
            "connectivity.cluster0.module1.real_output_0"
        );
    }

    #[test]
    fn test_every_overloaded_channel_reported() {
        let fixture = Fixture::new(
            description(),
            json!({}),
            json!({
                "cluster0.module1.real_output_0": {
                    "portclock_configs": [
                        {"port": "q0:fl", "clock": "cl0.baseband"},
                        {"port": "q1:fl", "clock": "cl0.baseband"}
                    ]
                },
                "cluster0.module1.real_output_1": {
                    "portclock_configs": [
                        {"port": "q2:fl", "clock": "cl0.baseband"},
                        {"port": "q3:fl", "clock": "cl0.baseband"}
                    ]
                }
            }),
        );
        let err = fixture
            .validate(&CompilerSettings::default())
            .unwrap_err();
        let Error::DuplicateAssignment(violations) = &err else {
            panic!("Expected duplicate assignment");
        };
        let channels = violations
            .iter()
            .map(DuplicateAssignment::location)
            .collect::<Vec<_>>();
        assert_eq!(
            channels,
            [
                "connectivity.cluster0.module1.real_output_0",
                "connectivity.cluster0.module1.real_output_1",
            ]
        );
        let msg = err.to_string();
        assert!(msg.contains("real_output_0") && msg.contains("real_output_1"));
    }

    #[test]
    fn test_unused_options_policy() {
        let fixture = Fixture::new(
            description(),
            json!({"latency_corrections": {"q9:mw-q9.01": 1e-9}}),
            json!({}),
        );
        let mut settings = CompilerSettings::default();
        assert_eq!(fixture.validate(&settings).unwrap().len(), 1);

        settings.unused_options = UnusedOptionsPolicy::Ignore;
        assert!(fixture.validate(&settings).unwrap().is_empty());

        settings.unused_options = UnusedOptionsPolicy::Error;
        assert!(matches!(
            fixture.validate(&settings),
            Err(Error::Referential(r)) if r.len() == 1
        ));
    }
}
