// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Module for defining settings for the hardware configuration compiler.
use serde::Deserialize;

/// What to do with hardware options for port-clocks that are not connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnusedOptionsPolicy {
    Ignore,
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationChange {
    pub field: &'static str,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSettings {
    pub unused_options: UnusedOptionsPolicy,
    /// Reject port-clocks on one complex channel that share the LO and the
    /// intermediate frequency.
    pub require_distinct_intermediate_frequencies: bool,
    pub diagnostics: bool,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        CompilerSettings {
            unused_options: UnusedOptionsPolicy::Warn,
            require_distinct_intermediate_frequencies: true,
            diagnostics: false,
        }
    }
}

impl CompilerSettings {
    /// Normalise contradicting settings and return what was changed.
    ///
    /// With diagnostics enabled, unused options are reported at least as warnings.
    pub fn sanitize(&mut self) -> Vec<SanitizationChange> {
        let mut changes = vec![];
        if self.diagnostics && self.unused_options == UnusedOptionsPolicy::Ignore {
            changes.push(SanitizationChange {
                field: "unused_options",
                original: "ignore".to_string(),
                sanitized: "warn".to_string(),
                reason: "Diagnostics requested.".to_string(),
            });
            self.unused_options = UnusedOptionsPolicy::Warn;
        }
        changes
    }
}
