// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Static properties of the supported instrument and module types.

use crate::types::ChannelKind::{self, Complex, Digital, Real};
use crate::types::Direction::{self, Input, Output};

pub const LOCAL_OSCILLATOR_TYPE: &str = "LocalOscillator";

/// A channel slot provided by an instrument or module type.
pub struct ChannelTraits {
    pub name: &'static str,
    /// Fixed kind, or `None` if the kind is selected by the channel description (`mode`).
    pub kind: Option<ChannelKind>,
    pub direction: Direction,
    /// Index of the integrated LO feeding this channel, if any.
    pub integrated_lo: Option<u8>,
}

/// Commonly used instrument traits
pub struct InstrumentTraits {
    pub instrument_type: &'static str,
    /// Module types accepted in the slots of a composite instrument.
    pub module_types: &'static [&'static str],
    pub channels: &'static [ChannelTraits],
    /// Accepted values of the `ref` field. Empty if the field is not applicable.
    pub reference_sources: &'static [&'static str],
    pub sequencers: Option<u8>,
}

impl InstrumentTraits {
    pub fn is_composite(&self) -> bool {
        !self.module_types.is_empty()
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelTraits> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn has_integrated_lo(&self) -> bool {
        self.channels.iter().any(|c| c.integrated_lo.is_some())
    }
}

/// Whether `name` follows one of the channel naming schemes, e.g.
/// `complex_output_0` or `channel_1`.
pub fn is_channel_name(name: &str) -> bool {
    const PREFIXES: [&str; 6] = [
        "complex_output_",
        "complex_input_",
        "real_output_",
        "real_input_",
        "digital_output_",
        "channel_",
    ];
    PREFIXES.iter().any(|prefix| {
        name.strip_prefix(prefix)
            .is_some_and(|idx| !idx.is_empty() && idx.bytes().all(|b| b.is_ascii_digit()))
    })
}

const fn fixed(name: &'static str, kind: ChannelKind, direction: Direction) -> ChannelTraits {
    ChannelTraits {
        name,
        kind: Some(kind),
        direction,
        integrated_lo: None,
    }
}

const fn with_lo(name: &'static str, direction: Direction, lo: u8) -> ChannelTraits {
    ChannelTraits {
        name,
        kind: Some(Complex),
        direction,
        integrated_lo: Some(lo),
    }
}

const fn by_mode(name: &'static str) -> ChannelTraits {
    ChannelTraits {
        name,
        kind: None,
        direction: Output,
        integrated_lo: None,
    }
}

const QCM_CHANNELS: [ChannelTraits; 10] = [
    fixed("complex_output_0", Complex, Output),
    fixed("complex_output_1", Complex, Output),
    fixed("real_output_0", Real, Output),
    fixed("real_output_1", Real, Output),
    fixed("real_output_2", Real, Output),
    fixed("real_output_3", Real, Output),
    fixed("digital_output_0", Digital, Output),
    fixed("digital_output_1", Digital, Output),
    fixed("digital_output_2", Digital, Output),
    fixed("digital_output_3", Digital, Output),
];

const QRM_CHANNELS: [ChannelTraits; 10] = [
    fixed("complex_output_0", Complex, Output),
    fixed("complex_input_0", Complex, Input),
    fixed("real_output_0", Real, Output),
    fixed("real_output_1", Real, Output),
    fixed("real_input_0", Real, Input),
    fixed("real_input_1", Real, Input),
    fixed("digital_output_0", Digital, Output),
    fixed("digital_output_1", Digital, Output),
    fixed("digital_output_2", Digital, Output),
    fixed("digital_output_3", Digital, Output),
];

const QBLOX_REFERENCE_SOURCES: &[&str] = &["internal", "external"];
const ZI_REFERENCE_SOURCES: &[&str] = &["int", "ext", "none"];
const QBLOX_SEQUENCERS: Option<u8> = Some(6);

pub const QCM_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "QCM",
    module_types: &[],
    channels: &QCM_CHANNELS,
    reference_sources: &[],
    sequencers: QBLOX_SEQUENCERS,
};

pub const QRM_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "QRM",
    module_types: &[],
    channels: &QRM_CHANNELS,
    reference_sources: &[],
    sequencers: QBLOX_SEQUENCERS,
};

pub const QCM_RF_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "QCM_RF",
    module_types: &[],
    channels: &[
        with_lo("complex_output_0", Output, 0),
        with_lo("complex_output_1", Output, 1),
        fixed("digital_output_0", Digital, Output),
        fixed("digital_output_1", Digital, Output),
    ],
    reference_sources: &[],
    sequencers: QBLOX_SEQUENCERS,
};

pub const QRM_RF_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "QRM_RF",
    module_types: &[],
    // Output and input are mixed by the same LO.
    channels: &[
        with_lo("complex_output_0", Output, 0),
        with_lo("complex_input_0", Input, 0),
        fixed("digital_output_0", Digital, Output),
        fixed("digital_output_1", Digital, Output),
    ],
    reference_sources: &[],
    sequencers: QBLOX_SEQUENCERS,
};

pub const CLUSTER_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "Cluster",
    module_types: &["QCM", "QRM", "QCM_RF", "QRM_RF"],
    channels: &[],
    reference_sources: QBLOX_REFERENCE_SOURCES,
    sequencers: None,
};

pub const PULSAR_QCM_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "Pulsar_QCM",
    module_types: &[],
    channels: &QCM_CHANNELS,
    reference_sources: QBLOX_REFERENCE_SOURCES,
    sequencers: QBLOX_SEQUENCERS,
};

pub const PULSAR_QRM_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "Pulsar_QRM",
    module_types: &[],
    channels: &QRM_CHANNELS,
    reference_sources: QBLOX_REFERENCE_SOURCES,
    sequencers: QBLOX_SEQUENCERS,
};

pub const HDAWG4_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "HDAWG4",
    module_types: &[],
    channels: &[by_mode("channel_0"), by_mode("channel_1")],
    reference_sources: ZI_REFERENCE_SOURCES,
    sequencers: None,
};

pub const HDAWG8_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "HDAWG8",
    module_types: &[],
    channels: &[
        by_mode("channel_0"),
        by_mode("channel_1"),
        by_mode("channel_2"),
        by_mode("channel_3"),
    ],
    reference_sources: ZI_REFERENCE_SOURCES,
    sequencers: None,
};

pub const UHFQA_TRAITS: InstrumentTraits = InstrumentTraits {
    instrument_type: "UHFQA",
    module_types: &[],
    channels: &[by_mode("channel_0")],
    reference_sources: ZI_REFERENCE_SOURCES,
    sequencers: None,
};

pub static QBLOX_INSTRUMENTS: [&InstrumentTraits; 7] = [
    &CLUSTER_TRAITS,
    &PULSAR_QCM_TRAITS,
    &PULSAR_QRM_TRAITS,
    &QCM_TRAITS,
    &QRM_TRAITS,
    &QCM_RF_TRAITS,
    &QRM_RF_TRAITS,
];

pub static ZHINST_INSTRUMENTS: [&InstrumentTraits; 3] =
    [&HDAWG4_TRAITS, &HDAWG8_TRAITS, &UHFQA_TRAITS];
