// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Wiring of port-clocks to physical channels.
//!
//! Both accepted connectivity shapes are normalised into one list of
//! [`ConnectivityEdge`]s here, so later stages never see the input shape.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use hwconfig_common::instrument_traits::is_channel_name;
use hwconfig_common::types::{ChannelKind, ChannelPath, PortClockId};
use hwconfig_log::diagnostic;

use crate::document::{
    ChannelConnection, Connectivity, DeviceChannelConnection, DeviceConnection, PortClockConfig,
};
use crate::error::{DuplicateAssignment, Error, Report, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityEdge {
    pub port_clock: PortClockId,
    pub channel: ChannelPath,
    /// Name of the external local oscillator feeding the channel.
    pub lo: Option<String>,
    /// Channel mode declared next to the edge.
    pub mode: Option<ChannelKind>,
    /// Where the edge is declared.
    pub location: String,
}

#[derive(Debug)]
pub struct ConnectivityGraph {
    edges: Vec<ConnectivityEdge>,
    by_port_clock: IndexMap<PortClockId, usize>,
    by_channel: IndexMap<ChannelPath, Vec<usize>>,
}

impl ConnectivityGraph {
    pub fn build(connectivity: &Connectivity) -> Result<Self> {
        let mut report = Report::new();
        let mut edges = vec![];
        match connectivity {
            Connectivity::PathKeyed(root) => {
                let mut seen = HashSet::new();
                for (key, value) in root {
                    walk_path_keyed(
                        &[key.as_str()],
                        value,
                        &mut seen,
                        &mut edges,
                        &mut report,
                    );
                }
            }
            Connectivity::DeviceList(devices) => {
                let mut seen = HashSet::new();
                for (index, device) in devices.iter().enumerate() {
                    let location = format!("connectivity[{index}]");
                    if !seen.insert(device.name.as_str()) {
                        report.push(
                            &location,
                            format!("Device '{}' is listed more than once", device.name),
                        );
                        continue;
                    }
                    add_device(device, &location, &mut edges, &mut report);
                }
            }
        }
        report.into_result(Error::Schema)?;
        let graph = Self::from_edges(edges)?;
        diagnostic!(
            "Connectivity: {} port-clocks on {} channels",
            graph.by_port_clock.len(),
            graph.by_channel.len()
        );
        Ok(graph)
    }

    /// Index `edges`; every port-clock must appear in exactly one edge.
    ///
    /// All port-clocks connected more than once are reported together.
    pub fn from_edges(edges: Vec<ConnectivityEdge>) -> Result<Self> {
        let mut by_port_clock = IndexMap::new();
        let mut by_channel: IndexMap<ChannelPath, Vec<usize>> = IndexMap::new();
        let mut duplicates: IndexMap<PortClockId, Vec<ChannelPath>> = IndexMap::new();
        for (index, edge) in edges.iter().enumerate() {
            if let Some(&first) = by_port_clock.get(&edge.port_clock) {
                let first_edge: &ConnectivityEdge = &edges[first];
                duplicates
                    .entry(edge.port_clock.clone())
                    .or_insert_with(|| vec![first_edge.channel.clone()])
                    .push(edge.channel.clone());
                continue;
            }
            by_port_clock.insert(edge.port_clock.clone(), index);
            by_channel
                .entry(edge.channel.clone())
                .or_default()
                .push(index);
        }
        if !duplicates.is_empty() {
            let violations = duplicates
                .into_iter()
                .map(|(port_clock, channels)| DuplicateAssignment::PortClock {
                    port_clock,
                    channels,
                })
                .collect();
            return Err(Error::DuplicateAssignment(violations));
        }
        Ok(ConnectivityGraph {
            edges,
            by_port_clock,
            by_channel,
        })
    }

    pub fn channel_for(&self, port_clock: &PortClockId) -> Option<&ChannelPath> {
        self.edge(port_clock).map(|e| &e.channel)
    }

    pub fn lo_for(&self, port_clock: &PortClockId) -> Option<&str> {
        self.edge(port_clock).and_then(|e| e.lo.as_deref())
    }

    /// Port-clocks wired to `channel`, in document order.
    pub fn port_clocks_on(&self, channel: &ChannelPath) -> Vec<&PortClockId> {
        self.by_channel
            .get(channel)
            .map(|indices| indices.iter().map(|&i| &self.edges[i].port_clock).collect())
            .unwrap_or_default()
    }

    pub fn edge(&self, port_clock: &PortClockId) -> Option<&ConnectivityEdge> {
        self.by_port_clock.get(port_clock).map(|&i| &self.edges[i])
    }

    /// All edges in document order.
    pub fn edges(&self) -> &[ConnectivityEdge] {
        &self.edges
    }

    /// Connected channels, in order of first appearance.
    pub fn channels(&self) -> impl Iterator<Item = &ChannelPath> {
        self.by_channel.keys()
    }
}

fn walk_path_keyed<'a>(
    segments: &[&'a str],
    value: &'a Value,
    seen: &mut HashSet<ChannelPath>,
    edges: &mut Vec<ConnectivityEdge>,
    report: &mut Report,
) {
    let path = ChannelPath::from_segments(segments);
    let location = format!("connectivity.{path}");
    let Value::Object(object) = value else {
        report.push(&location, "Expected an object");
        return;
    };
    if !object.contains_key("portclock_configs") {
        for (key, child) in object {
            let mut child_segments = segments.to_vec();
            child_segments.extend(key.split('.'));
            walk_path_keyed(&child_segments, child, seen, edges, report);
        }
        return;
    }
    let connection = match serde_json::from_value::<ChannelConnection>(value.clone()) {
        Ok(connection) => connection,
        Err(e) => {
            report.push(&location, e.to_string());
            return;
        }
    };
    if !seen.insert(path.clone()) {
        report.push(&location, "Channel is listed more than once");
        return;
    }
    for config in &connection.portclock_configs {
        match port_clock(config) {
            Ok(port_clock) => edges.push(ConnectivityEdge {
                port_clock,
                channel: path.clone(),
                lo: connection.lo_name.clone(),
                mode: None,
                location: location.clone(),
            }),
            Err(msg) => report.push(&location, msg),
        }
    }
}

fn add_device(
    device: &DeviceConnection,
    location: &str,
    edges: &mut Vec<ConnectivityEdge>,
    report: &mut Report,
) {
    for (key, value) in &device.fields {
        if !key.starts_with("channel_") || !is_channel_name(key) {
            continue;
        }
        let location = format!("{location}.{key}");
        let channel = match serde_json::from_value::<DeviceChannelConnection>(value.clone()) {
            Ok(channel) => channel,
            Err(e) => {
                report.push(&location, e.to_string());
                continue;
            }
        };
        let mode = match channel.mode.as_deref().map(str::parse::<ChannelKind>) {
            Some(Ok(ChannelKind::Digital)) | Some(Err(_)) => {
                report.push(
                    &location,
                    format!(
                        "Invalid mode '{}', expected 'complex' or 'real'",
                        channel.mode.as_deref().unwrap_or_default()
                    ),
                );
                continue;
            }
            Some(Ok(mode)) => Some(mode),
            None => None,
        };
        let config = PortClockConfig {
            port: channel.port,
            clock: channel.clock,
        };
        match port_clock(&config) {
            Ok(port_clock) => edges.push(ConnectivityEdge {
                port_clock,
                channel: ChannelPath::from_segments([device.name.as_str(), key.as_str()]),
                lo: channel.local_oscillator,
                mode,
                location,
            }),
            Err(msg) => report.push(&location, msg),
        }
    }
}

fn port_clock(config: &PortClockConfig) -> Result<PortClockId, String> {
    let valid_port = config
        .port
        .split_once(':')
        .is_some_and(|(element, line)| !element.is_empty() && !line.is_empty());
    if !valid_port {
        return Err(format!(
            "Port '{}' must have the form 'element:line'",
            config.port
        ));
    }
    if config.clock.is_empty() {
        return Err(format!("Port '{}' has an empty clock", config.port));
    }
    Ok(PortClockId::new(&config.port, &config.clock))
}
