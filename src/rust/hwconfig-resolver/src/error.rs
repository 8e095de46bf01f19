// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Formatter};

use hwconfig_common::types::{ChannelKind, ChannelPath, LoRef, PortClockId};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed or internally inconsistent input document.
    #[error("Invalid hardware compilation config:\n{0}")]
    Schema(Report),
    /// Dangling references between the input documents.
    #[error("Inconsistent hardware compilation config:\n{0}")]
    Referential(Report),
    /// Port-clocks or channels assigned beyond what the hardware allows.
    #[error("{}", join_lines(.0))]
    DuplicateAssignment(Vec<DuplicateAssignment>),
    #[error(transparent)]
    ConstraintConflict(#[from] ConstraintConflict),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

impl From<DuplicateAssignment> for Error {
    fn from(value: DuplicateAssignment) -> Self {
        Error::DuplicateAssignment(vec![value])
    }
}

/// A single problem found in the input documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Where the problem was found, e.g. `connectivity.cluster0.module1.complex_output_0`.
    pub location: String,
    pub message: String,
}

/// All problems found by one validation stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    issues: Vec<Issue>,
}

impl Report {
    pub fn new() -> Self {
        Report::default()
    }

    pub fn push(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.issues.push(Issue {
            location: location.into(),
            message: message.into(),
        });
    }

    pub fn extend(&mut self, other: Report) {
        self.issues.extend(other.issues);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// `Ok` if no issue was recorded, otherwise the report wrapped by `into_error`.
    pub fn into_result(self, into_error: fn(Report) -> Error) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(into_error(self))
        }
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let lines = self
            .issues
            .iter()
            .map(|issue| format!("  - {}: {}", issue.location, issue.message))
            .collect::<Vec<_>>();
        f.write_str(&lines.join("\n"))
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DuplicateAssignment {
    #[error(
        "Port-clock '{port_clock}' is connected more than once: {}",
        join(.channels)
    )]
    PortClock {
        port_clock: PortClockId,
        channels: Vec<ChannelPath>,
    },
    #[error(
        "Channel '{channel}' of kind '{kind}' carries at most {capacity} port-clock(s), but {} are connected: {}",
        .port_clocks.len(),
        join(.port_clocks)
    )]
    ChannelCapacity {
        channel: ChannelPath,
        kind: ChannelKind,
        capacity: usize,
        port_clocks: Vec<PortClockId>,
    },
}

impl DuplicateAssignment {
    /// Connectivity entry the assignment is made in.
    pub fn location(&self) -> String {
        match self {
            DuplicateAssignment::PortClock { port_clock, .. } => {
                format!("connectivity.{port_clock}")
            }
            DuplicateAssignment::ChannelCapacity { channel, .. } => {
                format!("connectivity.{channel}")
            }
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConstraintConflict {
    #[error(
        "Local oscillator '{lo}' cannot take multiple frequencies: {}",
        format_members(.members)
    )]
    LoFrequency {
        lo: LoRef,
        /// Every member giving an explicit LO frequency, in document order.
        members: Vec<(PortClockId, f64)>,
    },
    #[error(
        "Port-clocks {} on channel '{channel}' share the LO and the intermediate frequency {frequency} Hz",
        join(.port_clocks)
    )]
    IntermediateFrequency {
        channel: ChannelPath,
        frequency: f64,
        port_clocks: Vec<PortClockId>,
    },
}

impl ConstraintConflict {
    /// Port-clocks involved in the conflict.
    pub fn port_clocks(&self) -> Vec<&PortClockId> {
        match self {
            ConstraintConflict::LoFrequency { members, .. } => {
                members.iter().map(|(pc, _)| pc).collect()
            }
            ConstraintConflict::IntermediateFrequency { port_clocks, .. } => {
                port_clocks.iter().collect()
            }
        }
    }
}

fn join<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| format!("'{item}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_lines<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_members(members: &[(PortClockId, f64)]) -> String {
    members
        .iter()
        .map(|(pc, freq)| format!("'{pc}' requests {freq} Hz"))
        .collect::<Vec<_>>()
        .join(", ")
}
