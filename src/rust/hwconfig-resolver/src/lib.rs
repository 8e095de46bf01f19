// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Resolution of a hardware compilation config into a compiled hardware map.
//!
//! The hardware description, the hardware options and the connectivity are
//! indexed into graphs, cross-checked, the frequencies of every local
//! oscillator group are resolved and the result is aggregated per channel.
//! See [`compile`] for the entry point.

pub mod backend;
pub mod compilation;
pub mod compiled_map;
pub mod connectivity_graph;
pub mod description_graph;
pub mod document;
pub mod error;
pub mod frequency_resolver;
pub mod options_table;
pub mod settings;
pub mod validation;

pub use backend::{Backend, CodeGenerator};
pub use compilation::{Compilation, compile};
pub use compiled_map::{
    CompiledChannelConfig, CompiledHardwareMap, CompiledLocalOscillator, CompiledPortClock,
};
pub use document::HardwareCompilationConfig;
pub use error::{Error, Result};
pub use frequency_resolver::{FrequencySlot, FrequencySplit, UnresolvedFrequency};
pub use options_table::CorrectionSet;
pub use settings::{CompilerSettings, UnusedOptionsPolicy};
