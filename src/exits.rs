//! Best paths of a start table regrouped by their first hop.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::{SchemaGraph, TableId};
use crate::paths::{Path, PathView, PathsIndex, compare_paths};

#[derive(Debug, Clone, PartialEq)]
pub struct ExitGroup {
    pub exit_to: TableId,
    pub paths: Vec<Path>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitPayload {
    pub start: TableId,
    pub exits: Vec<ExitGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitGroupView {
    pub exit_to: String,
    pub paths: Vec<PathView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitPayloadView {
    pub start: String,
    pub exits: Vec<ExitGroupView>,
}

/// Group `start`'s indexed paths by first hop, keeping only maximal routes.
pub fn exit_payload(graph: &SchemaGraph, index: &PathsIndex, start: TableId) -> ExitPayload {
    let mut buckets: BTreeMap<&str, (TableId, Vec<&Path>)> = BTreeMap::new();
    for (_, paths) in index.targets(start) {
        for path in paths {
            let Some(exit) = path.first_hop() else { continue };
            buckets
                .entry(graph.table_name(exit))
                .or_insert_with(|| (exit, Vec::new()))
                .1
                .push(path);
        }
    }

    let exits = buckets
        .into_values()
        .map(|(exit_to, mut paths)| {
            paths.sort_by(|a, b| {
                Reverse(a.nodes.len())
                    .cmp(&Reverse(b.nodes.len()))
                    .then_with(|| compare_paths(a, b))
            });
            let mut kept: Vec<Path> = Vec::new();
            for path in paths {
                if !kept.iter().any(|k| path.is_strict_prefix_of(k)) {
                    kept.push(path.clone());
                }
            }
            ExitGroup { exit_to, paths: kept }
        })
        .collect();

    ExitPayload { start, exits }
}

/// Exit payloads for every start table in the index.
pub fn exit_payloads(graph: &SchemaGraph, index: &PathsIndex) -> Vec<ExitPayload> {
    index
        .starts()
        .map(|start| exit_payload(graph, index, start))
        .collect()
}

impl ExitPayload {
    pub fn view(&self, graph: &SchemaGraph) -> ExitPayloadView {
        ExitPayloadView {
            start: graph.table_name(self.start).to_string(),
            exits: self
                .exits
                .iter()
                .map(|group| ExitGroupView {
                    exit_to: graph.table_name(group.exit_to).to_string(),
                    paths: group.paths.iter().map(|p| p.view(graph)).collect(),
                })
                .collect(),
        }
    }
}
