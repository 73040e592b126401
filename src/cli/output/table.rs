//! Table output formatting for CLI commands
//!
//! Renders the monitor's sample trace using comfy-table. Phases are
//! color-coded unless `NO_COLOR` is set or the terminal is dumb.

use comfy_table::{presets, Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use std::env;

use crate::domain::models::{MonitorPhase, UtilitySample};

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<usize>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<usize>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format the sample trace, marking the sample the decision was frozen from.
    pub fn format_trace(&self, trace: &[UtilitySample], decided_poll: Option<u32>) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            Cell::new("Poll").add_attribute(Attribute::Bold),
            Cell::new("Elapsed (s)").add_attribute(Attribute::Bold),
            Cell::new("Quality").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
            Cell::new("Cost").add_attribute(Attribute::Bold),
            Cell::new("Utility").add_attribute(Attribute::Bold),
            Cell::new("Projected").add_attribute(Attribute::Bold),
            Cell::new("Phase").add_attribute(Attribute::Bold),
        ]);

        for sample in trace {
            let phase = if decided_poll == Some(sample.poll) {
                MonitorPhase::Decided
            } else {
                sample.phase
            };
            let phase_cell = if self.use_colors {
                Cell::new(phase.as_str()).fg(phase_color(phase))
            } else {
                Cell::new(format!("{} {}", phase_icon(phase), phase))
            };

            table.add_row(vec![
                Cell::new(sample.poll).set_alignment(CellAlignment::Right),
                number(sample.elapsed_time, 2),
                number(sample.quality, 2),
                number(sample.intrinsic_value, 2),
                number(sample.time_cost, 4),
                number(sample.utility, 4),
                sample
                    .projected_utility
                    .map_or_else(|| Cell::new("-"), |u| number(u, 4)),
                phase_cell,
            ]);
        }

        table.to_string()
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();

        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(u16::try_from(width).unwrap_or(u16::MAX));
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn number(value: f64, precision: usize) -> Cell {
    Cell::new(format!("{value:.precision$}")).set_alignment(CellAlignment::Right)
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

const fn phase_color(phase: MonitorPhase) -> Color {
    match phase {
        MonitorPhase::Warmup => Color::DarkGrey,
        MonitorPhase::Observing => Color::Cyan,
        MonitorPhase::Decided => Color::Green,
    }
}

const fn phase_icon(phase: MonitorPhase) -> &'static str {
    match phase {
        MonitorPhase::Warmup => "○",
        MonitorPhase::Observing => "⟳",
        MonitorPhase::Decided => "✓",
    }
}
