use super::ui;
use crate::context::DashboardContext;
use crate::core::observation::parse_timestamp;
use crate::feeds::forex::ExchangeQuote;
use anyhow::Result;
use comfy_table::Cell;

pub fn run(context: &DashboardContext) -> Result<()> {
    let rates = context.latest_rates();
    if rates.is_empty() {
        println!("No exchange rates stored yet.");
        return Ok(());
    }
    println!("{}", display_rates(rates));
    Ok(())
}

fn format_refreshed(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|ts| ts.format("%d-%m-%Y %H:%M").to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn display_rates(rates: &[ExchangeQuote]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell("Exchange Rate"),
        ui::header_cell("Last Refreshed"),
    ]);

    for quote in rates {
        table.add_row(vec![
            Cell::new(&quote.device),
            ui::format_optional_cell(quote.rate(), |r| format!("{r:.4}")),
            Cell::new(format_refreshed(&quote.last_refreshed)),
        ]);
    }

    let newest = rates
        .iter()
        .map(|q| q.last_refreshed.as_str())
        .max()
        .map_or_else(|| "N/A".to_string(), format_refreshed);

    format!(
        "{}\n\n{}\n\n{} {}",
        ui::style_text("Exchange rates", ui::StyleType::Title),
        table,
        ui::style_text("Last Refreshed:", ui::StyleType::Label),
        ui::style_text(&newest, ui::StyleType::Value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_format_refreshed() {
        assert_eq!(format_refreshed("2024-11-20 14:05:01"), "20-11-2024 14:05");
        assert_eq!(format_refreshed("yesterday"), "yesterday");
    }

    #[test]
    fn test_display_rates() {
        let quote = |device: &str, rate: &str, refreshed: &str| ExchangeQuote {
            device: device.to_string(),
            exchange_rate: Value::String(rate.to_string()),
            last_refreshed: refreshed.to_string(),
        };
        let text = display_rates(&[
            quote("CAD", "1.3912", "2024-11-20 14:05:02"),
            quote("EUR", "n/a", "2024-11-21 09:00:00"),
        ]);
        assert!(text.contains("1.3912"));
        assert!(text.contains("N/A"));
        assert!(text.contains("21-11-2024 09:00"));
    }
}
