//! Terminal output for replay reports and classifications.

use std::fmt::Write as _;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use nv_model::{FileCategory, Provenance};

use crate::replay::{FileRow, ReplayReport, StepRecord};

pub fn print_report(report: &ReplayReport) {
    println!("{}", steps_table(&report.steps));
    println!("{}", files_table(&report.files));
    println!("Draw order: {}", draw_order(report));
    println!(
        "Backend: {} stored, {} unsynced changes",
        report.stored, report.unsynced
    );
}

pub fn print_classification(results: &[(String, Option<FileCategory>)]) {
    let mut table = Table::new();
    table.set_header(vec![header_cell("File"), header_cell("Category")]);
    apply_table_style(&mut table);
    for (name, category) in results {
        let category_cell = match category {
            Some(category) => Cell::new(category.label()).fg(Color::Green),
            None => Cell::new("unsupported").fg(Color::Red),
        };
        table.add_row(vec![Cell::new(name), category_cell]);
    }
    println!("{table}");
}

/// Render a report as plain text without colors or box drawing.
pub fn render_plain(report: &ReplayReport) -> String {
    let mut out = String::new();
    for step in &report.steps {
        let failed = if step.failed { "error: " } else { "" };
        let _ = writeln!(
            out,
            "{:02} {:<16} {failed}{}",
            step.index, step.action, step.result
        );
    }

    out.push('\n');
    for file in &report.files {
        let _ = writeln!(
            out,
            "{:<10} {:<16} {:<6} {} {} order={} render={}",
            file.category.label(),
            file.name,
            file.provenance.label(),
            if file.visible { "visible" } else { "hidden " },
            if file.active { "*" } else { " " },
            optional(file.order),
            optional(file.render_index),
        );
    }

    let _ = writeln!(out, "\ndraw order: {}", draw_order(report));
    let _ = writeln!(
        out,
        "stored: {}, unsynced: {}",
        report.stored, report.unsynced
    );
    out
}

fn steps_table(steps: &[StepRecord]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("#"),
        header_cell("Step"),
        header_cell("Result"),
        header_cell("Events"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);

    for step in steps {
        let result = if step.failed {
            Cell::new(&step.result).fg(Color::Red)
        } else {
            Cell::new(&step.result)
        };
        table.add_row(vec![
            dim_cell(step.index),
            Cell::new(step.action).fg(Color::Blue),
            result,
            count_cell(step.events),
        ]);
    }
    table
}

fn files_table(files: &[FileRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Category"),
        header_cell("File"),
        header_cell("Source"),
        header_cell("Visible"),
        header_cell("Active"),
        header_cell("Order"),
        header_cell("Render"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Center);
    align_column(&mut table, 4, CellAlignment::Center);
    align_column(&mut table, 5, CellAlignment::Right);
    align_column(&mut table, 6, CellAlignment::Right);

    for file in files {
        table.add_row(vec![
            Cell::new(file.category.label()),
            name_cell(file),
            provenance_cell(file.provenance),
            flag_cell(file.visible),
            flag_cell(file.active),
            optional_cell(file.order),
            optional_cell(file.render_index),
        ]);
    }
    table
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn name_cell(file: &FileRow) -> Cell {
    if file.active {
        Cell::new(&file.name).add_attribute(Attribute::Bold)
    } else {
        Cell::new(&file.name)
    }
}

fn provenance_cell(provenance: Provenance) -> Cell {
    let color = match provenance {
        Provenance::Cloud => Color::Green,
        Provenance::Local => Color::Yellow,
        Provenance::Cached => Color::Magenta,
    };
    Cell::new(provenance.label()).fg(color)
}

fn flag_cell(value: bool) -> Cell {
    if value {
        Cell::new("✓").fg(Color::Green)
    } else {
        dim_cell("-")
    }
}

fn count_cell(count: usize) -> Cell {
    if count == 0 {
        dim_cell(count)
    } else {
        Cell::new(count)
    }
}

fn optional_cell<T: ToString>(value: Option<T>) -> Cell {
    match value {
        Some(value) => Cell::new(value.to_string()),
        None => dim_cell("-"),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).fg(Color::DarkGrey)
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

fn draw_order(report: &ReplayReport) -> String {
    if report.draw_order.is_empty() {
        "(empty)".to_string()
    } else {
        report.draw_order.join(" < ")
    }
}
