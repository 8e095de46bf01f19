// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

/// A logical signal path: the pairing of a port (`element:line`) and a
/// clock (`element.transition`), rendered as `port-clock`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortClockId {
    port: String,
    clock: String,
}

impl PortClockId {
    pub fn new(port: impl Into<String>, clock: impl Into<String>) -> Self {
        PortClockId {
            port: port.into(),
            clock: clock.into(),
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn clock(&self) -> &str {
        &self.clock
    }
}

impl Display for PortClockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.port, self.clock)
    }
}

impl Serialize for PortClockId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsePortClockError {
    #[error("'{0}' has no port; expected 'element:line-element.transition'")]
    MissingPort(String),
    #[error("'{0}' has no clock; expected 'element:line-element.transition'")]
    MissingClock(String),
}

impl FromStr for PortClockId {
    type Err = ParsePortClockError;

    /// Split `port-clock` at the first `-` following the port's `:`.
    ///
    /// Element names may contain `-`, so splitting at the first `-` of the
    /// whole string would cut element names like `qubit-1:mw`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let colon = s
            .find(':')
            .filter(|&idx| idx > 0)
            .ok_or_else(|| ParsePortClockError::MissingPort(s.to_string()))?;
        let dash = s[colon..]
            .find('-')
            .map(|idx| idx + colon)
            .ok_or_else(|| ParsePortClockError::MissingClock(s.to_string()))?;
        let (port, clock) = (&s[..dash], &s[dash + 1..]);
        if port.len() == colon + 1 {
            return Err(ParsePortClockError::MissingPort(s.to_string()));
        }
        if clock.is_empty() {
            return Err(ParsePortClockError::MissingClock(s.to_string()));
        }
        Ok(PortClockId::new(port, clock))
    }
}

/// Dotted path of a physical channel: `instrument[.module].channel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelPath(String);

impl ChannelPath {
    pub fn new(path: impl Into<String>) -> Self {
        ChannelPath(path.into())
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(".");
        ChannelPath(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The channel name, i.e. the last path segment.
    pub fn name(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(_, n)| n)
    }

    /// Path of the instrument or module owning the channel.
    pub fn parent(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(p, _)| p)
    }

    pub fn instrument(&self) -> &str {
        self.0.split_once('.').map_or(self.0.as_str(), |(i, _)| i)
    }
}

impl Display for ChannelPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelPath {
    fn from(s: &str) -> Self {
        ChannelPath(s.to_string())
    }
}

/// Signal kind of a physical channel.
///
/// The kind determines how many port-clocks a channel can multiplex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Complex,
    Real,
    Digital,
}

impl ChannelKind {
    /// Maximum number of port-clocks, `None` if unbounded.
    pub fn capacity(&self) -> Option<usize> {
        match self {
            ChannelKind::Complex => None,
            ChannelKind::Real | ChannelKind::Digital => Some(1),
        }
    }

    /// Marker channels carry no modulation or LO frequency.
    pub fn carries_frequencies(&self) -> bool {
        !matches!(self, ChannelKind::Digital)
    }
}

impl Display for ChannelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelKind::Complex => "complex",
            ChannelKind::Real => "real",
            ChannelKind::Digital => "digital",
        };
        f.write_str(s)
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "complex" => Ok(ChannelKind::Complex),
            "real" => Ok(ChannelKind::Real),
            "digital" => Ok(ChannelKind::Digital),
            other => Err(format!(
                "unknown channel mode '{other}', expected 'complex' or 'real'"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

/// Reference to a local oscillator feeding a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LoRef {
    /// A standalone LO instrument declared in the hardware description.
    External { name: String },
    /// An LO built into an RF module, identified by the module path and index.
    Integrated { module: String, index: u8 },
}

impl LoRef {
    pub fn external(name: impl Into<String>) -> Self {
        LoRef::External { name: name.into() }
    }
}

impl Display for LoRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LoRef::External { name } => f.write_str(name),
            LoRef::Integrated { module, index } => write!(f, "{module}.lo{index}"),
        }
    }
}
