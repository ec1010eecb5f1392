//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, CellAlignment, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::vector::{BuildReport, IndexStats, SearchHit, round_4dp};

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        // Apply rounded corners
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Right-align a column (0-based), typically a numeric one.
    pub fn align_right(mut self, column: usize) -> Self {
        if let Some(col) = self.table.column_mut(column) {
            col.set_cell_alignment(CellAlignment::Right);
        }
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

/// Create a table of ranked search hits.
pub fn create_results_table(hits: &[SearchHit]) -> String {
    let mut builder = TableBuilder::new().set_headers(vec!["Rank", "Chunk", "Distance", "Similarity"]);
    for hit in hits {
        builder = builder.add_row(vec![
            hit.rank.to_string(),
            hit.chunk_id.to_string(),
            format!("{:.4}", round_4dp(hit.distance)),
            format!("{:.4}", round_4dp(hit.similarity_score)),
        ]);
    }
    builder.align_right(0).align_right(2).align_right(3).build()
}

/// Create a two-column table describing a built index.
pub fn create_stats_table(stats: &IndexStats) -> String {
    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec!["Vectors".to_string(), stats.vectors.to_string()])
        .add_row(vec!["Dimension".to_string(), stats.dimension.to_string()])
        .add_row(vec!["Index type".to_string(), stats.index_type.to_string()])
        .add_row(vec![
            "Memory".to_string(),
            format!("{:.2} MB", stats.memory_mb()),
        ])
        .build()
}

/// Create a summary table for a finished build.
pub fn create_build_table(report: &BuildReport) -> String {
    TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(vec![
            "Vectors loaded".to_string(),
            report.vectors_loaded.to_string(),
        ])
        .add_row(vec!["Rows skipped".to_string(), report.skipped_rows.to_string()])
        .add_row(vec!["Dimension".to_string(), report.dimension.to_string()])
        .add_row(vec!["Index type".to_string(), report.index_type.to_string()])
        .build()
}
