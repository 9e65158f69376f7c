//! Plain-text rendering for the command line.

use crate::exits::ExitPayload;
use crate::graph::SchemaGraph;
use crate::measure::TextMetrics;
use crate::paths::PathsIndex;
use crate::resolve::{JoinRefsResolution, JoinResolution, ResolutionStatus};

pub struct TextReport {
    metrics: TextMetrics,
}

impl Default for TextReport {
    fn default() -> Self {
        Self {
            metrics: TextMetrics::default(),
        }
    }
}

fn status_word(status: ResolutionStatus) -> &'static str {
    match status {
        ResolutionStatus::Ok => "ok",
        ResolutionStatus::Disconnected => "disconnected",
        ResolutionStatus::Ambiguous => "ambiguous",
    }
}

impl TextReport {
    /// One row per edge, forward edges before their reverse.
    pub fn graph(&self, graph: &SchemaGraph) -> String {
        let mut rows = vec![vec![
            "from".to_string(),
            "to".to_string(),
            "card".to_string(),
            "constraint".to_string(),
        ]];
        for (_, edge) in graph.edges() {
            let mut constraint = edge.constraint_name.clone();
            if edge.reversed {
                constraint.push_str(" (reverse)");
            }
            if edge.is_custom {
                constraint.push_str(" [custom]");
            }
            rows.push(vec![
                graph.table_name(edge.from).to_string(),
                graph.table_name(edge.to).to_string(),
                edge.cardinality.to_string(),
                constraint,
            ]);
        }

        let mut out = format!("{} tables, {} edges\n", graph.table_count(), graph.edge_count());
        if graph.edge_count() > 0 {
            out.push('\n');
            out.push_str(&self.metrics.render_rows(&rows));
        }
        out
    }

    /// Ranked paths per indexed pair.
    pub fn paths(&self, graph: &SchemaGraph, index: &PathsIndex) -> String {
        let mut rows = vec![vec![
            "start".to_string(),
            "target".to_string(),
            "#".to_string(),
            "cost".to_string(),
            "path".to_string(),
        ]];
        for start in index.starts() {
            for (target, paths) in index.targets(start) {
                for (rank, path) in paths.iter().enumerate() {
                    rows.push(vec![
                        graph.table_name(start).to_string(),
                        graph.table_name(target).to_string(),
                        (rank + 1).to_string(),
                        format!("{:.1}", path.cost),
                        path.label.clone(),
                    ]);
                }
            }
        }

        if rows.len() == 1 {
            return "no paths\n".to_string();
        }
        self.metrics.render_rows(&rows)
    }

    pub fn exits(&self, graph: &SchemaGraph, payloads: &[ExitPayload]) -> String {
        let mut out = String::new();
        for payload in payloads {
            out.push_str(&format!("{}\n", graph.table_name(payload.start)));
            for group in &payload.exits {
                out.push_str(&format!("  via {}\n", graph.table_name(group.exit_to)));
                for path in &group.paths {
                    out.push_str(&format!("    {:.1}  {}\n", path.cost, path.label));
                }
            }
        }
        out
    }

    pub fn resolution(&self, resolution: &JoinResolution) -> String {
        let mut out = String::new();
        out.push_str(&format!("status: {}\n", status_word(resolution.status)));
        out.push_str(&format!("message: {}\n", resolution.message));
        if !resolution.sql.is_empty() {
            out.push_str(&format!("\n{}\n", resolution.sql));
        }
        out
    }

    pub fn join_refs(&self, resolution: &JoinRefsResolution) -> String {
        let mut out = String::new();
        out.push_str(&format!("status: {}\n", status_word(resolution.status)));
        out.push_str(&format!("message: {}\n", resolution.message));
        if resolution.joins.is_empty() {
            return out;
        }

        let mut rows = vec![vec![
            "source".to_string(),
            "target".to_string(),
            "join".to_string(),
            "card".to_string(),
            "on".to_string(),
        ]];
        for join in &resolution.joins {
            let on: Vec<String> = join
                .column_pairs
                .iter()
                .map(|c| format!("{} = {}", c.from_column, c.to_column))
                .collect();
            rows.push(vec![
                join.source_table.clone(),
                join.target_table.clone(),
                join.join_type.keyword().to_string(),
                join.cardinality.to_string(),
                on.join(" AND "),
            ]);
        }
        out.push('\n');
        out.push_str(&self.metrics.render_rows(&rows));
        out
    }
}
