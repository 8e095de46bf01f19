// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! In-memory form of the three input documents.
//!
//! The types mirror the document structure closely; all semantic checks are
//! done when the graphs are built from them.

mod connectivity;
mod description;
mod entries;
mod options;

pub use connectivity::{
    ChannelConnection, Connectivity, DeviceChannelConnection, DeviceConnection, PortClockConfig,
};
pub use description::{
    ChannelDescription, HardwareDescription, InstrumentDescription, ModuleDescription,
};
pub use entries::Entries;
pub use options::{
    DistortionCorrection, HardwareOptions, InputGain, MixerCorrections, ModulationFrequencies,
    OutputGain, SequencerOptions,
};

use serde::Deserialize;

/// The complete input of one compilation.
#[derive(Debug, Clone, Deserialize)]
pub struct HardwareCompilationConfig {
    /// Dotted identifier of the backend consuming the compiled map.
    pub backend: String,
    #[serde(default)]
    pub hardware_description: HardwareDescription,
    pub hardware_options: Option<HardwareOptions>,
    pub connectivity: Connectivity,
}
