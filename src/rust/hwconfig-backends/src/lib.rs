// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Vendor specific consumers of the compiled hardware map.
//!
//! Each backend turns the map into the instrument settings its instrument
//! coordinator applies before an experiment runs.

pub mod error;
pub mod qblox;
pub mod zhinst;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use hwconfig_common::types::LoRef;
use hwconfig_resolver::{
    Backend, CodeGenerator, CompiledHardwareMap, CompilerSettings, HardwareCompilationConfig,
};

pub use error::{Error, Result};
pub use qblox::QbloxGenerator;
pub use zhinst::ZhinstGenerator;

/// Settings of a standalone local oscillator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalOscillatorSettings {
    /// Output power in dBm.
    pub power: Option<f64>,
    pub frequency: Option<f64>,
}

/// Settings of the external local oscillators used by `map`, by name.
pub fn local_oscillator_settings(
    map: &CompiledHardwareMap,
) -> BTreeMap<String, LocalOscillatorSettings> {
    map.channels()
        .values()
        .filter_map(|channel| channel.local_oscillator.as_ref())
        .filter_map(|lo| match &lo.lo {
            LoRef::External { name } => Some((
                name.clone(),
                LocalOscillatorSettings {
                    power: lo.power,
                    frequency: lo.frequency,
                },
            )),
            LoRef::Integrated { .. } => None,
        })
        .collect()
}

/// Generate the instrument settings with the generator of the map's backend.
pub fn generate_settings(map: &CompiledHardwareMap) -> Result<Value> {
    let value = match map.backend() {
        Backend::Qblox => serde_json::to_value(QbloxGenerator.generate(map)?),
        Backend::Zhinst => serde_json::to_value(ZhinstGenerator.generate(map)?),
    };
    Ok(value.map_err(anyhow::Error::from)?)
}

/// Compile `config` and generate the instrument settings in one go.
pub fn compile_settings(
    config: &HardwareCompilationConfig,
    settings: CompilerSettings,
) -> Result<Value> {
    let map = hwconfig_resolver::compile(config, settings)?;
    generate_settings(&map)
}
