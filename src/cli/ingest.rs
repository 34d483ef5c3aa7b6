use super::ui;
use crate::core::config::Collections;
use crate::core::store::DocumentStore;
use crate::feeds::FeedKind;
use crate::feeds::ingest::{IngestReport, ingest_dir, list_feed_files};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, Color};
use std::path::Path;

pub async fn run(
    store: &dyn DocumentStore,
    collections: &Collections,
    kind: FeedKind,
    dir: &Path,
    remove_processed: bool,
    today: NaiveDate,
) -> Result<()> {
    let file_count = list_feed_files(dir)?.len();
    if file_count == 0 {
        println!("No {kind} feed files found in {}.", dir.display());
        return Ok(());
    }

    let pb = ui::new_progress_bar(file_count as u64, true);
    pb.set_message(format!("Ingesting {kind} files..."));
    let report = ingest_dir(store, collections, kind, dir, remove_processed, today, |_| {
        pb.inc(1)
    })
    .await;
    pb.finish_and_clear();

    println!("{}", display_report(kind, &report?));
    Ok(())
}

fn display_report(kind: FeedKind, report: &IngestReport) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("File"),
        ui::header_cell("Inserted"),
        ui::header_cell("Skipped"),
        ui::header_cell("Status"),
    ]);

    for file in &report.files {
        let name = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.path.display().to_string());
        let status = match &file.error {
            None => Cell::new("ok").fg(Color::Green),
            Some(e) => Cell::new(e).fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(file.inserted),
            Cell::new(file.skipped),
            status,
        ]);
    }

    let mut output = format!(
        "Ingestion: {}\n\n",
        ui::style_text(&kind.to_string(), ui::StyleType::Title)
    );
    output.push_str(&table.to_string());

    if kind == FeedKind::Weather {
        output.push_str(&format!("\n\nDaily rows written: {}", report.daily_rows));
    }

    let failed_style = if report.files_failed() > 0 {
        ui::StyleType::Error
    } else {
        ui::StyleType::Subtle
    };
    output.push_str(&format!(
        "\n\n{} {} ok, {} failed; {} inserted, {} skipped",
        ui::style_text("Files:", ui::StyleType::Label),
        ui::style_text(&report.files_ok().to_string(), ui::StyleType::Value),
        ui::style_text(&report.files_failed().to_string(), failed_style),
        report.inserted(),
        report.skipped(),
    ));
    output
}
