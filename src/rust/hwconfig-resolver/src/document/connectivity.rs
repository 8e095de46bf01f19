// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// Wiring of port-clocks to channels, in one of the two accepted shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Connectivity {
    /// `[{name, channel_N: {port, clock, mode?, local_oscillator?}}]`
    DeviceList(Vec<DeviceConnection>),
    /// Objects nested along the channel path, leaves holding `portclock_configs`.
    PathKeyed(IndexMap<String, Value>),
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity::PathKeyed(IndexMap::new())
    }
}

/// Leaf of the path keyed form.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConnection {
    pub portclock_configs: Vec<PortClockConfig>,
    pub lo_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortClockConfig {
    pub port: String,
    pub clock: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConnection {
    pub name: String,
    /// Channels (`channel_N`) and instrument settings, which are ignored here.
    #[serde(flatten)]
    pub fields: IndexMap<String, Value>,
}

/// Channel entry of the device list form.
///
/// Further per-channel instrument settings may be present and are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceChannelConnection {
    pub port: String,
    pub clock: String,
    pub mode: Option<String>,
    pub local_oscillator: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shapes() {
        let list: Connectivity = serde_json::from_value(json!([
            {"name": "hdawg0", "type": "HDAWG4", "channel_0": {"port": "q0:mw", "clock": "q0.01"}}
        ]))
        .unwrap();
        assert!(matches!(list, Connectivity::DeviceList(ref d) if d.len() == 1));

        let keyed: Connectivity = serde_json::from_value(json!({
            "cluster0": {"module1": {"complex_output_0": {"portclock_configs": []}}}
        }))
        .unwrap();
        assert!(matches!(keyed, Connectivity::PathKeyed(ref m) if m.contains_key("cluster0")));
    }
}
