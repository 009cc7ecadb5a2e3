use analytics::PerformancePoint;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::Workbook;
use std::io::Write;
use std::path::Path;

const HEADER: [&str; 4] = ["Date", "daily_return", "Cumulative Return", "Daily Change (%)"];

/// Writes the performance series as CSV to `path`, replacing any existing file.
pub fn write_performance_csv(path: &Path, points: &[PerformancePoint]) -> anyhow::Result<()> {
    create_parent(path)?;
    let file = std::fs::File::create(path)?;
    write_rows(file, points)
}

/// Writes the performance series as an Excel workbook with one sheet.
///
/// Returns are stored as numbers so the sheet can chart them directly.
pub fn write_performance_xlsx(path: &Path, points: &[PerformancePoint]) -> anyhow::Result<()> {
    create_parent(path)?;
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, title) in HEADER.iter().enumerate() {
        worksheet.write_string(0, col as u16, *title)?;
    }
    for (i, point) in points.iter().enumerate() {
        let row = i as u32 + 1;
        worksheet.write_string(row, 0, point.date.to_string())?;
        worksheet.write_number(row, 1, as_f64(point.daily_return))?;
        worksheet.write_number(row, 2, as_f64(point.cumulative_return))?;
        worksheet.write_number(row, 3, as_f64(point.daily_change_pct))?;
    }

    workbook.save(path)?;
    Ok(())
}

fn as_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

fn create_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_rows<W: Write>(writer: W, points: &[PerformancePoint]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;
    for point in points {
        wtr.write_record([
            point.date.to_string(),
            point.daily_return.to_string(),
            point.cumulative_return.to_string(),
            point.daily_change_pct.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
