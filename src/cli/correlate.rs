use super::ui;
use crate::context::DashboardContext;
use crate::core::correlation::{CorrelationMatrix, CorrelationResult};
use crate::core::series::NormalizeOptions;
use crate::feeds::weather::{Region, WeatherVariable};
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use comfy_table::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CorrelateTarget {
    /// Price against a weather variable
    Weather,
    /// Price against each currency's exchange rate
    Forex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrelateRequest {
    pub target: CorrelateTarget,
    pub variable: WeatherVariable,
    pub region: Option<Region>,
    /// Show price, temperature and wind speed pairwise for `region`.
    pub matrix: bool,
}

pub fn run(
    context: &DashboardContext,
    options: &NormalizeOptions,
    request: CorrelateRequest,
) -> Result<()> {
    if request.matrix {
        let Some(region) = request.region else {
            bail!("A region is required to show the correlation matrix");
        };
        let matrix = context
            .weather_matrix(region, options)
            .context("Failed to build the price series")?;
        let regions = context.regions();
        if !regions.contains(&region) {
            let available: Vec<&str> = regions.iter().map(|r| r.name()).collect();
            let available = if available.is_empty() {
                "none".to_string()
            } else {
                available.join(", ")
            };
            let note = format!("No weather rows for {region}; available: {available}");
            println!("{}", ui::style_text(&note, ui::StyleType::Subtle));
        }
        println!(
            "Correlation matrix: {}\n\n{}",
            ui::style_text(region.name(), ui::StyleType::Title),
            display_matrix(&matrix)
        );
        return Ok(());
    }

    let (title, group_label, result) = match request.target {
        CorrelateTarget::Weather => (
            format!("Price vs {}", request.variable),
            "Region",
            context.price_vs_weather(request.variable, request.region, options),
        ),
        CorrelateTarget::Forex => (
            "Price vs exchange rate".to_string(),
            "Currency",
            context.price_vs_forex(options),
        ),
    };
    let result = result.context("Failed to build the price series")?;

    println!(
        "{}\n\n{}",
        ui::style_text(&title, ui::StyleType::Title),
        display_result(&result, group_label, request.region)
    );
    Ok(())
}

fn display_result(result: &CorrelationResult, group_label: &str, region: Option<Region>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(group_label),
        ui::header_cell("Pearson r"),
    ]);

    match result {
        CorrelationResult::Single(coefficient) => {
            let label = region.map_or("All", |r| r.name());
            table.add_row(vec![Cell::new(label), ui::coefficient_cell(*coefficient)]);
        }
        CorrelationResult::Grouped(groups) => {
            if groups.is_empty() {
                return ui::style_text("No overlapping data to correlate.", ui::StyleType::Subtle);
            }
            for (group, coefficient) in groups {
                table.add_row(vec![Cell::new(group), ui::coefficient_cell(*coefficient)]);
            }
            let defined = groups.values().filter(|c| c.is_defined()).count();
            return format!(
                "{table}\n\n{}",
                ui::style_text(
                    &format!("{defined} of {} groups have enough overlapping data", groups.len()),
                    ui::StyleType::Subtle
                )
            );
        }
    }
    table.to_string()
}

fn display_matrix(matrix: &CorrelationMatrix) -> String {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("")];
    header.extend(matrix.labels.iter().map(|l| ui::header_cell(l)));
    table.set_header(header);

    for (label, row) in matrix.labels.iter().zip(&matrix.cells) {
        let mut cells = vec![ui::header_cell(label)];
        cells.extend(row.iter().map(|c| ui::coefficient_cell(*c)));
        table.add_row(cells);
    }
    table.to_string()
}
