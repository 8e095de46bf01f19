// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Formatter};

use hwconfig_common::instrument_traits::{InstrumentTraits, QBLOX_INSTRUMENTS, ZHINST_INSTRUMENTS};
use serde::Serialize;

use crate::compiled_map::CompiledHardwareMap;
use crate::error::{Error, Report, Result};

/// The vendor backend consuming a compiled hardware map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Qblox,
    Zhinst,
}

impl Backend {
    /// Select the backend from its dotted identifier, e.g.
    /// `quantify_scheduler.backends.qblox_backend.hardware_compile`.
    pub fn from_identifier(identifier: &str) -> Result<Self> {
        let backend = identifier.split('.').find_map(|segment| match segment {
            "qblox_backend" | "qblox" => Some(Backend::Qblox),
            "zhinst_backend" | "zhinst" => Some(Backend::Zhinst),
            _ => None,
        });
        backend.ok_or_else(|| {
            let mut report = Report::new();
            report.push(
                "backend",
                format!("'{identifier}' does not name a supported backend (qblox, zhinst)"),
            );
            Error::Schema(report)
        })
    }

    /// Instrument and module types known to this backend.
    pub fn instruments(&self) -> &'static [&'static InstrumentTraits] {
        match self {
            Backend::Qblox => &QBLOX_INSTRUMENTS,
            Backend::Zhinst => &ZHINST_INSTRUMENTS,
        }
    }

    pub fn instrument_traits(&self, instrument_type: &str) -> Option<&'static InstrumentTraits> {
        self.instruments()
            .iter()
            .find(|traits| traits.instrument_type == instrument_type)
            .copied()
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Qblox => f.write_str("qblox"),
            Backend::Zhinst => f.write_str("zhinst"),
        }
    }
}

/// Interface of the vendor specific consumers of a [`CompiledHardwareMap`].
pub trait CodeGenerator {
    type Output;
    type Error: std::error::Error;

    fn backend(&self) -> Backend;

    fn generate(&self, map: &CompiledHardwareMap) -> Result<Self::Output, Self::Error>;

    /// Whether the map was compiled for this generator's backend.
    fn accepts(&self, map: &CompiledHardwareMap) -> bool {
        map.backend() == self.backend()
    }
}
