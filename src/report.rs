// Reporting Sink - list exports in CSV, XLSX, and PDF
//
// All three writers share one 12-column projection so the exports can never
// drift apart. The XLSX layout mirrors the registry's original workbook:
// a bold title cell, a bold header row, the money number format on the
// capital column, fitted column widths, and a protected sheet.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::entities::BusinessRow;

// ============================================================================
// ROW PROJECTION
// ============================================================================

pub const REPORT_TITLE: &str = "LIST OF BUSINESSES";

/// The fixed export columns, identical across CSV, XLSX, and PDF.
pub const REPORT_COLUMNS: [&str; 12] = [
    "Taxpayer's Name",
    "Business Name",
    "Telephone Number",
    "Business Address",
    "Barangay",
    "Type of Business",
    "Type of Business Ownership",
    "Capital",
    "Year Issued",
    "Status",
    "Sector From DTI Files",
    "Sector From DTI-NCCP",
];

/// Index of the capital column, the only one with special formatting.
const CAPITAL_COLUMN: usize = 7;

/// Currency rendering used by the CSV and PDF writers: "Php 1,234,567.89".
pub fn format_money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let frac = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, ch) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!(
        "{}Php {}.{:02}",
        if negative { "-" } else { "" },
        grouped,
        frac
    )
}

/// Project one joined business row onto the 12 export columns.
pub fn report_cells(row: &BusinessRow) -> [String; 12] {
    let b = &row.business;
    [
        b.taxpayer_name.clone(),
        b.business_name.clone().unwrap_or_default(),
        b.tel_number.clone().unwrap_or_default(),
        b.address.clone().unwrap_or_default(),
        b.barangay.clone().unwrap_or_default(),
        b.business_type.map(|t| t.label().to_string()).unwrap_or_default(),
        b.ownership_type.map(|t| t.label().to_string()).unwrap_or_default(),
        b.capital.map(format_money).unwrap_or_default(),
        b.year.to_string(),
        row.status_name.clone().unwrap_or_default(),
        row.sector_dti_files_name.clone().unwrap_or_default(),
        row.sector_dti_nccp_name.clone().unwrap_or_default(),
    ]
}

/// Download filename stem plus the given extension.
pub fn export_file_name(extension: &str) -> String {
    format!(
        "dti-sordas-list-of-businesses-{}.{}",
        Utc::now().format("%Y-%m-%d"),
        extension
    )
}

// ============================================================================
// CSV
// ============================================================================

/// Write the filtered list as CSV. Returns the number of data rows written.
pub fn export_csv<W: Write>(rows: &[BusinessRow], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer
        .write_record(REPORT_COLUMNS)
        .context("Failed to write CSV header")?;

    for row in rows {
        csv_writer
            .write_record(report_cells(row))
            .with_context(|| {
                format!("Failed to write CSV row for '{}'", row.business.taxpayer_name)
            })?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    info!(rows = rows.len(), "Exported list to CSV");
    Ok(rows.len())
}

// ============================================================================
// XLSX
// ============================================================================

/// Build the XLSX workbook in memory. Returns the file bytes.
pub fn export_xlsx_bytes(rows: &[BusinessRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(REPORT_TITLE)
        .context("Failed to name worksheet")?;

    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("\"Php\" #,##0.00");

    worksheet.write_string_with_format(0, 0, REPORT_TITLE, &bold)?;
    for (column, header) in REPORT_COLUMNS.into_iter().enumerate() {
        worksheet.write_string_with_format(2, column as u16, header, &bold)?;
    }

    // Track the widest content per column for the width pass below
    let mut column_width: Vec<usize> = REPORT_COLUMNS.iter().map(|h| h.len()).collect();

    for (index, row) in rows.iter().enumerate() {
        let excel_row = index as u32 + 3;
        let cells = report_cells(row);

        for (column, cell) in cells.iter().enumerate() {
            if column == CAPITAL_COLUMN {
                match row.business.capital {
                    Some(capital) => {
                        worksheet.write_number_with_format(
                            excel_row,
                            column as u16,
                            capital,
                            &money,
                        )?;
                    }
                    None => {
                        worksheet.write_string(excel_row, column as u16, "")?;
                    }
                }
            } else {
                worksheet.write_string(excel_row, column as u16, cell.as_str())?;
            }
            if cell.len() > column_width[column] {
                column_width[column] = cell.len();
            }
        }
    }

    for (column, width) in column_width.iter().enumerate() {
        worksheet.set_column_width(column as u16, *width as f64)?;
    }
    worksheet.protect();

    let bytes = workbook
        .save_to_buffer()
        .context("Failed to serialize XLSX workbook")?;
    info!(rows = rows.len(), "Exported list to XLSX");
    Ok(bytes)
}

pub fn export_xlsx(rows: &[BusinessRow], path: &Path) -> Result<usize> {
    let bytes = export_xlsx_bytes(rows)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(rows.len())
}

// ============================================================================
// PDF
// ============================================================================

// Column x offsets and truncation widths for the landscape A4 listing
const PDF_COLUMN_X: [f32; 12] = [
    10.0, 44.0, 74.0, 92.0, 126.0, 146.0, 166.0, 188.0, 210.0, 220.0, 234.0, 261.0,
];
const PDF_MAX_CHARS: [usize; 12] = [25, 22, 13, 25, 15, 15, 16, 16, 7, 10, 20, 19];

const PDF_PAGE_WIDTH: f32 = 297.0;
const PDF_PAGE_HEIGHT: f32 = 210.0;
const PDF_TOP_Y: f32 = 192.0;
const PDF_BOTTOM_Y: f32 = 12.0;
const PDF_ROW_STEP: f32 = 5.0;

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars.saturating_sub(3)).collect::<String>() + "..."
    }
}

/// Render the filtered list as a paginated read-only PDF. Returns the file
/// bytes.
pub fn export_pdf_bytes(rows: &[BusinessRow]) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        REPORT_TITLE,
        Mm(PDF_PAGE_WIDTH),
        Mm(PDF_PAGE_HEIGHT),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("Failed to load PDF font")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("Failed to load PDF font")?;

    let mut layer = doc.get_page(first_page).get_layer(first_layer);

    layer.use_text(REPORT_TITLE, 12.0, Mm(10.0), Mm(200.0), &bold);
    for (column, header) in REPORT_COLUMNS.iter().enumerate() {
        layer.use_text(
            truncate(header, PDF_MAX_CHARS[column]),
            6.0,
            Mm(PDF_COLUMN_X[column]),
            Mm(PDF_TOP_Y),
            &bold,
        );
    }

    let mut y = PDF_TOP_Y - PDF_ROW_STEP;
    for row in rows {
        if y < PDF_BOTTOM_Y {
            let (page, page_layer) =
                doc.add_page(Mm(PDF_PAGE_WIDTH), Mm(PDF_PAGE_HEIGHT), "Layer 1");
            layer = doc.get_page(page).get_layer(page_layer);
            y = PDF_TOP_Y;
        }

        let cells = report_cells(row);
        for (column, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            layer.use_text(
                truncate(cell, PDF_MAX_CHARS[column]),
                6.0,
                Mm(PDF_COLUMN_X[column]),
                Mm(y),
                &regular,
            );
        }
        y -= PDF_ROW_STEP;
    }

    let bytes = doc
        .save_to_bytes()
        .context("Failed to serialize PDF document")?;
    info!(rows = rows.len(), "Exported list to PDF");
    Ok(bytes)
}

pub fn export_pdf(rows: &[BusinessRow], path: &Path) -> Result<usize> {
    let bytes = export_pdf_bytes(rows)?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(rows.len())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Business, BusinessType, OwnershipType};

    fn sample_row() -> BusinessRow {
        BusinessRow {
            business: Business {
                id: 1,
                taxpayer_name: "Dela Cruz, Juan".to_string(),
                business_name: Some("JDC Store".to_string()),
                business_type: Some(BusinessType::Single),
                ownership_type: Some(OwnershipType::Filipino),
                address: Some("123 Rizal St".to_string()),
                tel_number: Some("046-4163".to_string()),
                barangay: Some("Poblacion".to_string()),
                capital: Some(50_000.0),
                status_id: Some(1),
                sector_dti_files_id: Some(1),
                sector_dti_nccp_id: None,
                division_id: None,
                year: 2016,
                is_verified: false,
            },
            status_name: Some("New".to_string()),
            sector_dti_files_name: Some("General Merchandise".to_string()),
            sector_dti_nccp_name: None,
        }
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(50_000.0), "Php 50,000.00");
        assert_eq!(format_money(1_234_567.891), "Php 1,234,567.89");
        assert_eq!(format_money(0.5), "Php 0.50");
        assert_eq!(format_money(999.0), "Php 999.00");
    }

    #[test]
    fn test_report_cells_follow_column_order() {
        let cells = report_cells(&sample_row());
        assert_eq!(cells.len(), REPORT_COLUMNS.len());
        assert_eq!(cells[0], "Dela Cruz, Juan");
        assert_eq!(cells[5], "Single");
        assert_eq!(cells[6], "Filipino");
        assert_eq!(cells[CAPITAL_COLUMN], "Php 50,000.00");
        assert_eq!(cells[8], "2016");
        assert_eq!(cells[9], "New");
        assert_eq!(cells[11], "");
    }

    #[test]
    fn test_csv_export_contains_headers_and_rows() {
        let mut buf = Vec::new();
        let count = export_csv(&[sample_row()], &mut buf).unwrap();
        assert_eq!(count, 1);

        let output = String::from_utf8(buf).unwrap();
        assert!(output.starts_with("Taxpayer's Name,Business Name"));
        assert!(output.contains("Dela Cruz, Juan"));
        assert!(output.contains("Php 50,000.00"));
        assert!(output.contains("Sector From DTI-NCCP"));
    }

    #[test]
    fn test_xlsx_export_produces_workbook_bytes() {
        let bytes = export_xlsx_bytes(&[sample_row()]).unwrap();
        // XLSX files are zip archives
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_pdf_export_produces_document_bytes() {
        let bytes = export_pdf_bytes(&[sample_row()]).unwrap();
        assert_eq!(&bytes[..5], b"%PDF-");
    }

    #[test]
    fn test_pdf_export_paginates_long_lists() {
        let rows: Vec<BusinessRow> = (0..120).map(|_| sample_row()).collect();
        let bytes = export_pdf_bytes(&rows).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        // More rows than fit one page: the page tree must hold several pages
        assert!(text.contains("/Count 4") || text.contains("/Count 3"));
    }

    #[test]
    fn test_export_writers_share_one_header_set() {
        let mut buf = Vec::new();
        export_csv(&[], &mut buf).unwrap();
        let csv_headers = String::from_utf8(buf).unwrap();
        for header in REPORT_COLUMNS {
            assert!(csv_headers.contains(header));
        }
    }

    #[test]
    fn test_export_to_files() {
        let dir = tempfile::tempdir().unwrap();

        let xlsx_path = dir.path().join(export_file_name("xlsx"));
        export_xlsx(&[sample_row()], &xlsx_path).unwrap();
        assert!(xlsx_path.exists());

        let pdf_path = dir.path().join(export_file_name("pdf"));
        export_pdf(&[sample_row()], &pdf_path).unwrap();
        assert!(pdf_path.exists());
    }
}
