// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Frequency resolution per local oscillator group.
//!
//! All port-clocks fed by the same local oscillator form a group and must
//! agree on the LO frequency. A group adopts the single explicitly requested
//! LO frequency and hands it to the members that left it open. Intermediate
//! frequencies are never derived: a value that is not given stays unresolved
//! and is reported as such.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;

use hwconfig_common::types::{LoRef, PortClockId};
use hwconfig_log::{diagnostic, warn};

use crate::connectivity_graph::ConnectivityGraph;
use crate::description_graph::DescriptionGraph;
use crate::error::{ConstraintConflict, Error, Result};
use crate::options_table::OptionsTable;

/// Resolved frequencies of one port-clock in Hz; `None` if unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FrequencySplit {
    pub interm_freq: Option<f64>,
    pub lo_freq: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencySlot {
    IntermediateFrequency,
    LoFrequency,
}

impl Display for FrequencySlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrequencySlot::IntermediateFrequency => f.write_str("intermediate frequency"),
            FrequencySlot::LoFrequency => f.write_str("LO frequency"),
        }
    }
}

/// A frequency that could not be resolved. Not an error by itself, the
/// consumer of the compiled map decides how to handle it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnresolvedFrequency {
    pub port_clock: PortClockId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lo: Option<LoRef>,
    pub slot: FrequencySlot,
}

impl Display for UnresolvedFrequency {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.lo {
            Some(lo) => write!(
                f,
                "The {} of '{}' (local oscillator '{lo}') is unresolved",
                self.slot, self.port_clock
            ),
            None => write!(f, "The {} of '{}' is unresolved", self.slot, self.port_clock),
        }
    }
}

/// Port-clocks sharing one local oscillator, or a single port-clock without one.
#[derive(Debug, Clone, PartialEq)]
pub struct LoGroup {
    pub lo: Option<LoRef>,
    /// Members in document order.
    pub members: Vec<PortClockId>,
    pub frequency: Option<f64>,
}

#[derive(Debug, Default)]
pub struct ResolvedFrequencies {
    splits: IndexMap<PortClockId, (FrequencySplit, usize)>,
    groups: Vec<LoGroup>,
    unresolved: Vec<UnresolvedFrequency>,
}

impl ResolvedFrequencies {
    /// Frequencies of `port_clock`, all unresolved if the port-clock carries none.
    pub fn split_for(&self, port_clock: &PortClockId) -> FrequencySplit {
        self.splits
            .get(port_clock)
            .map(|(split, _)| *split)
            .unwrap_or_default()
    }

    /// The local oscillator feeding `port_clock`.
    pub fn lo_for(&self, port_clock: &PortClockId) -> Option<&LoRef> {
        self.splits
            .get(port_clock)
            .and_then(|&(_, group)| self.groups[group].lo.as_ref())
    }

    pub fn lo_frequency(&self, lo: &LoRef) -> Option<f64> {
        self.groups
            .iter()
            .find(|g| g.lo.as_ref() == Some(lo))
            .and_then(|g| g.frequency)
    }

    pub fn groups(&self) -> &[LoGroup] {
        &self.groups
    }

    pub fn unresolved(&self) -> &[UnresolvedFrequency] {
        &self.unresolved
    }

    pub(crate) fn into_unresolved(self) -> Vec<UnresolvedFrequency> {
        self.unresolved
    }
}

pub struct FrequencyResolver<'a> {
    description: &'a DescriptionGraph,
    options: &'a OptionsTable,
    connectivity: &'a ConnectivityGraph,
}

impl<'a> FrequencyResolver<'a> {
    pub fn new(
        description: &'a DescriptionGraph,
        options: &'a OptionsTable,
        connectivity: &'a ConnectivityGraph,
    ) -> Self {
        FrequencyResolver {
            description,
            options,
            connectivity,
        }
    }

    /// Resolve every LO group, failing on the first group, in document order,
    /// whose members request different LO frequencies.
    pub fn resolve(&self) -> Result<ResolvedFrequencies> {
        let groups = self.collect_groups()?;
        let mut resolved = ResolvedFrequencies::default();
        for group in groups {
            let explicit = group
                .members
                .iter()
                .filter_map(|pc| {
                    self.options
                        .modulation_frequencies(pc)
                        .lo_freq
                        .map(|freq| (pc.clone(), freq))
                })
                .collect::<Vec<_>>();
            let frequency = explicit.first().map(|(_, freq)| *freq);
            if explicit.iter().any(|(_, freq)| Some(*freq) != frequency) {
                return Err(ConstraintConflict::LoFrequency {
                    lo: group
                        .lo
                        .clone()
                        .ok_or_else(|| Error::new("Conflict in a group without LO"))?,
                    members: explicit,
                }
                .into());
            }
            resolved.add_group(LoGroup { frequency, ..group }, self.options);
        }
        for unresolved in &resolved.unresolved {
            warn!("{}", unresolved);
        }
        diagnostic!(
            "Resolved {} LO groups, {} frequencies left unresolved",
            resolved.groups.len(),
            resolved.unresolved.len()
        );
        Ok(resolved)
    }

    /// Group the connected port-clocks by local oscillator, in document order.
    ///
    /// Port-clocks on marker channels carry no frequencies and are left out.
    fn collect_groups(&self) -> Result<Vec<LoGroup>> {
        let mut groups: Vec<LoGroup> = vec![];
        let mut by_lo: IndexMap<LoRef, usize> = IndexMap::new();
        for edge in self.connectivity.edges() {
            let channel = self.description.lookup_channel(&edge.channel).ok_or_else(|| {
                Error::new(format!(
                    "Channel '{}' of '{}' is not described",
                    edge.channel, edge.port_clock
                ))
            })?;
            if !channel.kind.carries_frequencies() {
                continue;
            }
            let lo = channel
                .integrated_lo
                .clone()
                .or_else(|| edge.lo.as_ref().map(LoRef::external));
            match lo {
                Some(lo) => match by_lo.get(&lo) {
                    Some(&index) => groups[index].members.push(edge.port_clock.clone()),
                    None => {
                        by_lo.insert(lo.clone(), groups.len());
                        groups.push(LoGroup {
                            lo: Some(lo),
                            members: vec![edge.port_clock.clone()],
                            frequency: None,
                        });
                    }
                },
                None => groups.push(LoGroup {
                    lo: None,
                    members: vec![edge.port_clock.clone()],
                    frequency: None,
                }),
            }
        }
        Ok(groups)
    }
}

impl ResolvedFrequencies {
    fn add_group(&mut self, group: LoGroup, options: &OptionsTable) {
        let index = self.groups.len();
        for port_clock in &group.members {
            let requested = options.modulation_frequencies(port_clock);
            let split = FrequencySplit {
                interm_freq: requested.interm_freq,
                lo_freq: requested.lo_freq.or(group.frequency),
            };
            if group.lo.is_some() && split.lo_freq.is_none() {
                self.unresolved.push(UnresolvedFrequency {
                    port_clock: port_clock.clone(),
                    lo: group.lo.clone(),
                    slot: FrequencySlot::LoFrequency,
                });
            }
            if split.interm_freq.is_none() {
                self.unresolved.push(UnresolvedFrequency {
                    port_clock: port_clock.clone(),
                    lo: group.lo.clone(),
                    slot: FrequencySlot::IntermediateFrequency,
                });
            }
            self.splits.insert(port_clock.clone(), (split, index));
        }
        self.groups.push(group);
    }
}
