// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::Serialize;

use hwconfig_common::types::PortClockId;
use hwconfig_log::diagnostic;

use crate::document::{
    DistortionCorrection, Entries, HardwareOptions, InputGain, MixerCorrections,
    ModulationFrequencies, OutputGain, SequencerOptions,
};
use crate::error::{Error, Report, Result};

/// All hardware options of one port-clock. Unset fields mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrectionSet {
    /// Latency correction in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_correction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distortion_correction: Option<DistortionCorrection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modulation_frequencies: Option<ModulationFrequencies>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixer_corrections: Option<MixerCorrections>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_att: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_att: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_gain: Option<OutputGain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_gain: Option<InputGain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequencer_options: Option<SequencerOptions>,
}

impl CorrectionSet {
    pub fn is_empty(&self) -> bool {
        *self == CorrectionSet::default()
    }
}

/// Hardware options indexed by port-clock, in order of first appearance.
///
/// Keys are kept as written. A port may itself contain '-', so a key only
/// matches a port-clock through its rendered `port-clock` form.
#[derive(Debug, Default)]
pub struct OptionsTable {
    entries: IndexMap<String, CorrectionSet>,
}

impl OptionsTable {
    /// Index the options, collecting every schema problem.
    pub fn build(options: &HardwareOptions) -> Result<Self> {
        let mut builder = TableBuilder::default();
        builder.add(
            "latency_corrections",
            options.latency_corrections.as_ref(),
            |set| &mut set.latency_correction,
            |latency, problems| check_finite("latency", Some(*latency), problems),
        );
        builder.add(
            "distortion_corrections",
            options.distortion_corrections.as_ref(),
            |set| &mut set.distortion_correction,
            |distortion, problems| {
                if let Some([low, high]) = distortion.clipping_values {
                    check_finite("clipping_values[0]", Some(low), problems);
                    check_finite("clipping_values[1]", Some(high), problems);
                }
            },
        );
        builder.add(
            "modulation_frequencies",
            options.modulation_frequencies.as_ref(),
            |set| &mut set.modulation_frequencies,
            |freqs, problems| {
                check_finite("interm_freq", freqs.interm_freq, problems);
                check_finite("lo_freq", freqs.lo_freq, problems);
            },
        );
        builder.add(
            "mixer_corrections",
            options.mixer_corrections.as_ref(),
            |set| &mut set.mixer_corrections,
            |mixer, problems| {
                check_finite("amp_ratio", mixer.amp_ratio, problems);
                check_finite("phase_error", mixer.phase_error, problems);
                check_finite("dc_offset_i", mixer.dc_offset_i, problems);
                check_finite("dc_offset_q", mixer.dc_offset_q, problems);
            },
        );
        builder.add(
            "output_att",
            options.output_att.as_ref(),
            |set| &mut set.output_att,
            |_, _| {},
        );
        builder.add(
            "input_att",
            options.input_att.as_ref(),
            |set| &mut set.input_att,
            |_, _| {},
        );
        builder.add(
            "output_gain",
            options.output_gain.as_ref(),
            |set| &mut set.output_gain,
            |gain, problems| {
                check_finite("gain_I", Some(gain.gain_i), problems);
                check_finite("gain_Q", Some(gain.gain_q), problems);
            },
        );
        builder.add(
            "input_gain",
            options.input_gain.as_ref(),
            |set| &mut set.input_gain,
            |_, _| {},
        );
        builder.add(
            "sequencer_options",
            options.sequencer_options.as_ref(),
            |set| &mut set.sequencer_options,
            |seq, problems| {
                for (name, value) in seq.bounded_settings() {
                    if let Some(value) = value
                        && !(-1.0..=1.0).contains(&value)
                    {
                        problems.push(format!("'{name}' must lie in [-1, 1], got {value}"));
                    }
                }
                check_finite("ttl_acq_threshold", seq.ttl_acq_threshold, problems);
            },
        );
        let TableBuilder { table, report } = builder;
        report.into_result(Error::Schema)?;
        diagnostic!("Hardware options for {} port-clocks", table.entries.len());
        Ok(table)
    }

    /// Options of `port_clock`, empty if none are given.
    pub fn corrections_for(&self, port_clock: &PortClockId) -> CorrectionSet {
        self.entry(port_clock).cloned().unwrap_or_default()
    }

    pub fn modulation_frequencies(&self, port_clock: &PortClockId) -> ModulationFrequencies {
        self.entry(port_clock)
            .and_then(|set| set.modulation_frequencies)
            .unwrap_or_default()
    }

    /// Rendered port-clocks with at least one option, in document order.
    pub fn port_clocks(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, port_clock: &PortClockId) -> Option<&CorrectionSet> {
        self.entries.get(port_clock.to_string().as_str())
    }
}

#[derive(Default)]
struct TableBuilder {
    table: OptionsTable,
    report: Report,
}

impl TableBuilder {
    fn add<T: Clone>(
        &mut self,
        category: &str,
        entries: Option<&Entries<T>>,
        slot: fn(&mut CorrectionSet) -> &mut Option<T>,
        check: impl Fn(&T, &mut Vec<String>),
    ) {
        let Some(entries) = entries else {
            return;
        };
        for (key, value) in entries.iter() {
            let location = format!("hardware_options.{category}.{key}");
            if let Err(e) = key.parse::<PortClockId>() {
                self.report.push(&location, e.to_string());
                continue;
            }
            let mut problems = vec![];
            check(value, &mut problems);
            if !problems.is_empty() {
                for problem in problems {
                    self.report.push(&location, problem);
                }
                continue;
            }
            let set = self.table.entries.entry(key.trim().to_string()).or_default();
            let target = slot(set);
            if target.is_some() {
                self.report
                    .push(&location, "Port-clock is given more than once in this category");
                continue;
            }
            *target = Some(value.clone());
        }
    }
}

fn check_finite(name: &str, value: Option<f64>, problems: &mut Vec<String>) {
    if let Some(value) = value
        && !value.is_finite()
    {
        problems.push(format!("'{name}' must be finite, got {value}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(json: &str) -> Result<OptionsTable> {
        let options: HardwareOptions = serde_json::from_str(json).unwrap();
        OptionsTable::build(&options)
    }

    #[test]
    fn test_corrections_for() {
        let table = build(
            r#"{
                "latency_corrections": {"q0:mw-q0.01": 8e-9},
                "modulation_frequencies": {
                    "q0:mw-q0.01": {"interm_freq": 50e6, "lo_freq": null},
                    "q1:res-q1.ro": {"lo_freq": 7.2e9}
                },
                "output_att": {"q1:res-q1.ro": 12}
            }"#,
        )
        .unwrap();
        let q0 = PortClockId::new("q0:mw", "q0.01");
        let q1 = PortClockId::new("q1:res", "q1.ro");
        let set = table.corrections_for(&q0);
        assert_eq!(set.latency_correction, Some(8e-9));
        assert_eq!(
            set.modulation_frequencies,
            Some(ModulationFrequencies {
                interm_freq: Some(50e6),
                lo_freq: None
            })
        );
        assert_eq!(set.output_att, None);
        assert_eq!(table.corrections_for(&q1).output_att, Some(12));
        assert_eq!(table.modulation_frequencies(&q1).lo_freq, Some(7.2e9));
        assert_eq!(
            table.port_clocks().collect::<Vec<_>>(),
            ["q0:mw-q0.01", "q1:res-q1.ro"]
        );

        // Absent port-clock gives an empty set
        let unknown = PortClockId::new("q2:mw", "q2.01");
        assert!(table.corrections_for(&unknown).is_empty());
        assert_eq!(table.modulation_frequencies(&unknown).interm_freq, None);
    }

    #[test]
    fn test_dash_in_port_line() {
        let table = build(r#"{"modulation_frequencies": {"q0:mw-a-q0.01": {"lo_freq": 7.8e9}}}"#)
            .unwrap();
        let port_clock = PortClockId::new("q0:mw-a", "q0.01");
        assert_eq!(table.modulation_frequencies(&port_clock).lo_freq, Some(7.8e9));
        assert_eq!(table.port_clocks().collect::<Vec<_>>(), ["q0:mw-a-q0.01"]);
    }

    #[test]
    fn test_duplicate_key_in_category() {
        let result = build(
            r#"{
                "modulation_frequencies": {
                    "q0:mw-q0.01": {"lo_freq": 7.8e9},
                    "q0:mw-q0.01": {"lo_freq": 7.2e9}
                },
                "latency_corrections": {"q0:mw-q0.01": 1e-9}
            }"#,
        );
        let Err(Error::Schema(report)) = result else {
            panic!("Expected schema error");
        };
        assert_eq!(report.len(), 1);
        assert_eq!(
            report.issues()[0].location,
            "hardware_options.modulation_frequencies.q0:mw-q0.01"
        );
    }

    #[test]
    fn test_invalid_values_collected() {
        let result = build(
            r#"{
                "latency_corrections": {"no_port_clock": 1e-9},
                "sequencer_options": {"q0:mw-q0.01": {"init_gain_awg_path_0": 1.5}},
                "mixer_corrections": {"q0:mw-q0.01": {"amp_ratio": 0.9}}
            }"#,
        );
        let Err(Error::Schema(report)) = result else {
            panic!("Expected schema error");
        };
        assert_eq!(report.len(), 2);
        assert!(report.issues()[1].message.contains("init_gain_awg_path_0"));
    }
}
