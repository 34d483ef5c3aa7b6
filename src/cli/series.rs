use super::ui;
use crate::context::DashboardContext;
use crate::core::series::{NormalizeOptions, Series};
use crate::core::stats::Distribution;
use anyhow::{Context, Result};
use comfy_table::{Cell, CellAlignment};

/// Selection applied to the price series before display.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesView {
    pub year: Option<i32>,
    pub month: Option<u32>,
    /// Number of most recent rows to list.
    pub last: usize,
}

pub fn run(context: &DashboardContext, options: &NormalizeOptions, view: SeriesView) -> Result<()> {
    let series = context
        .price_series(options)
        .context("Failed to build the price series")?;
    let selected = series.filter_period(view.year, view.month);

    println!(
        "Price series: {}",
        ui::style_text(&period_label(view), ui::StyleType::Title)
    );
    if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
        let years = series.years();
        println!(
            "{}",
            ui::style_text(
                &format!("Data from {first} to {last} ({} years)", years.len()),
                ui::StyleType::Subtle
            )
        );
    }

    if selected.is_empty() {
        println!("\nNo observations for the selected period.");
        return Ok(());
    }

    println!("\n{}", display_rows(&selected, view.last));
    ui::print_separator();
    println!("\n{}", display_distribution(Distribution::of(&selected), &selected));
    Ok(())
}

fn period_label(view: SeriesView) -> String {
    match (view.year, view.month) {
        (None, None) => "all years, all months".to_string(),
        (Some(y), None) => format!("{y}, all months"),
        (None, Some(m)) => format!("all years, month {m}"),
        (Some(y), Some(m)) => format!("{y}-{m:02}"),
    }
}

fn display_rows(series: &Series, last: usize) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Date"),
        ui::header_cell("Price (USD)"),
    ]);

    let skip = series.len().saturating_sub(last);
    for point in &series.points()[skip..] {
        table.add_row(vec![
            Cell::new(point.id).set_alignment(CellAlignment::Right),
            Cell::new(point.date),
            ui::format_optional_cell(point.value, |v| format!("{v:.2}")),
        ]);
    }
    table.to_string()
}

fn display_distribution(distribution: Option<Distribution>, series: &Series) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Statistic"), ui::header_cell("Value")]);

    let rows: [(&str, Option<f64>); 6] = [
        ("Mean", distribution.map(|d| d.mean)),
        ("Min", distribution.map(|d| d.min)),
        ("Q1", distribution.map(|d| d.q1)),
        ("Median", distribution.map(|d| d.median)),
        ("Q3", distribution.map(|d| d.q3)),
        ("Max", distribution.map(|d| d.max)),
    ];
    for (label, value) in rows {
        table.add_row(vec![
            Cell::new(label),
            ui::format_optional_cell(value, |v| format!("{v:.2}")),
        ]);
    }
    table.add_row(vec![
        Cell::new("Days"),
        Cell::new(series.len()).set_alignment(CellAlignment::Right),
    ]);
    table.add_row(vec![
        Cell::new("Missing"),
        Cell::new(series.null_count()).set_alignment(CellAlignment::Right),
    ]);
    table.to_string()
}
