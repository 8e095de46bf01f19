// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Display;

use hwconfig_common::types::{ChannelPath, PortClockId};
use hwconfig_resolver::Backend;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Resolver(#[from] hwconfig_resolver::Error),
    #[error("Compiled hardware map targets the '{found}' backend, expected '{expected}'")]
    BackendMismatch { expected: Backend, found: Backend },
    #[error(
        "Invalid value for '{setting}' of port-clock '{port_clock}': {value} is outside [{min}, {max}]"
    )]
    OutOfRange {
        setting: &'static str,
        port_clock: PortClockId,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("'{module}' needs {required} sequencers, but has only {available}")]
    TooManySequencers {
        module: String,
        required: usize,
        available: usize,
    },
    #[error("Port-clocks on '{channel}' request different values for '{setting}': {values}")]
    ConflictingSetting {
        channel: ChannelPath,
        setting: String,
        values: String,
    },
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
