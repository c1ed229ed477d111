// Spreadsheet Ingestor - filings to Business/Amenity rows
//
// An upload is decoded in three layers:
//   1. the FILENAME carries the sector code and the filing status
//      ("...renewal..." selects Renewal, anything else New);
//   2. leading BANNER rows ("List of ... in ...") carry the filing year and,
//      when the filename gave no sector, the sector name;
//   3. a row whose second cell reads "taxpayers name" marks the start of the
//      data rows: numbered rows are businesses, "*" rows are amenities of
//      the business immediately above.
//
// The scan is an explicit state machine (AwaitingHeader -> AwaitingDataRow
// -> Done) so each transition is testable on its own. The whole file runs
// inside one transaction; a malformed row is logged and skipped without
// aborting the batch, and a failed business row clears the current
// establishment so trailing amenity rows cannot attach to the wrong one.

use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Datelike, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info};

use crate::db;
use crate::entities::{Business, STATUS_NEW, STATUS_RENEWAL};

// ============================================================================
// FILENAME DECODING
// ============================================================================

/// Filing kind selected by the upload's filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilingKind {
    New,
    Renewal,
}

impl FilingKind {
    pub fn status_name(&self) -> &'static str {
        match self {
            FilingKind::New => STATUS_NEW,
            FilingKind::Renewal => STATUS_RENEWAL,
        }
    }
}

/// What the filename alone tells us about an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameMeta {
    /// Sector code preceding the earliest "completed"/"renewal" marker;
    /// None when neither marker is present.
    pub sector_code: Option<String>,
    pub filing: FilingKind,
}

/// Decode sector code and filing status from an upload filename.
///
/// The prefix before the earliest marker, with separators and one trailing
/// 4-digit year token trimmed, is the sector code:
/// `SEC12020renewalcompleted.xls` -> code `SEC1`, Renewal.
pub fn decode_filename(file_name: &str) -> FilenameMeta {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let lower = stem.to_lowercase();

    let marker = [lower.find("completed"), lower.find("renewal")]
        .into_iter()
        .flatten()
        .min();

    let sector_code = marker.and_then(|index| {
        // Preserve the original casing when the lowercased copy is
        // byte-compatible; some Unicode lowercasings change lengths.
        let prefix = if stem.len() == lower.len() && stem.is_char_boundary(index) {
            &stem[..index]
        } else {
            &lower[..index]
        };
        let code = trim_sector_code(prefix);
        (!code.is_empty()).then_some(code)
    });

    let filing = if lower.contains("renewal") {
        FilingKind::Renewal
    } else {
        FilingKind::New
    };

    FilenameMeta {
        sector_code,
        filing,
    }
}

const CODE_SEPARATORS: &[char] = &[' ', '-', '_'];

/// The filing year is often glued straight onto the code ("SEC12020..."),
/// so one trailing 4-digit year token is not part of the code.
fn trim_sector_code(prefix: &str) -> String {
    let mut code = prefix.trim_matches(CODE_SEPARATORS);

    if code.len() >= 4 && code.is_char_boundary(code.len() - 4) {
        let (head, tail) = code.split_at(code.len() - 4);
        let is_year = tail.chars().all(|c| c.is_ascii_digit())
            && tail
                .parse::<i32>()
                .map(|year| year > 1000 && year < 9999)
                .unwrap_or(false);
        if is_year && !head.is_empty() {
            code = head;
        }
    }

    code.trim_matches(CODE_SEPARATORS).to_string()
}

// ============================================================================
// ROW SCANNER (state machine)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanState {
    #[default]
    AwaitingHeader,
    AwaitingDataRow,
    Done,
}

/// A business row as parsed from the sheet, before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessDraft {
    pub taxpayer_name: String,
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub tel_number: Option<String>,
    pub barangay: Option<String>,
    pub capital: f64,
}

/// What one scanned row turned out to be.
#[derive(Debug, PartialEq)]
pub enum RowEvent {
    /// A "List of ..." banner row; year/sector captured on the scanner.
    Banner,
    /// The "taxpayers name" column-header row; data rows follow.
    HeaderMarker,
    Business(BusinessDraft),
    Amenity(String),
    /// A business row that failed to parse, with the reason.
    Malformed(String),
    Ignored,
}

/// Scans sheet rows in order, tracking header facts until the data marker.
#[derive(Debug, Default)]
pub struct SheetScanner {
    state: ScanState,
    year_issued: Option<i32>,
    sector_phrase: Option<String>,
}

impl SheetScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Filing year found on a banner row, if any.
    pub fn year_issued(&self) -> Option<i32> {
        self.year_issued
    }

    /// Title-cased sector name found on a banner row, if any.
    pub fn sector_phrase(&self) -> Option<&str> {
        self.sector_phrase.as_deref()
    }

    pub fn step(&mut self, cells: &[String]) -> RowEvent {
        match self.state {
            ScanState::AwaitingHeader => self.scan_header(cells),
            ScanState::AwaitingDataRow => classify_data_row(cells),
            ScanState::Done => RowEvent::Ignored,
        }
    }

    /// End of sheet.
    pub fn finish(&mut self) {
        self.state = ScanState::Done;
    }

    fn scan_header(&mut self, cells: &[String]) -> RowEvent {
        let first = cells.first().map(String::as_str).unwrap_or("");
        let tokens = banner_tokens(first);
        let is_banner = tokens.len() >= 2 && tokens[0] == "list" && tokens[1] == "of";

        if is_banner {
            if self.year_issued.is_none() {
                self.year_issued = tokens
                    .iter()
                    .find_map(|token| token.parse::<i32>().ok())
                    .filter(|year| *year > 1000 && *year < 9999);
            }
            if self.sector_phrase.is_none() {
                self.sector_phrase = banner_sector_phrase(&tokens);
            }
        }

        let second = cells.get(1).map(String::as_str).unwrap_or("");
        if strip_punctuation_lower(second) == "taxpayers name" {
            self.state = ScanState::AwaitingDataRow;
            return RowEvent::HeaderMarker;
        }

        if is_banner {
            RowEvent::Banner
        } else {
            RowEvent::Ignored
        }
    }
}

/// Lowercase the banner cell and split on whitespace and parentheses.
fn banner_tokens(cell: &str) -> Vec<String> {
    cell.to_lowercase()
        .replace(['(', ')'], " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

fn strip_punctuation_lower(cell: &str) -> String {
    cell.to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect()
}

/// Sector name between the start pointer (token 2, or 3 when token 2 is
/// "registered") and the token "in", title-cased.
fn banner_sector_phrase(tokens: &[String]) -> Option<String> {
    let start = if tokens.get(2).map(String::as_str) == Some("registered") {
        3
    } else {
        2
    };

    let words: Vec<&str> = tokens[start.min(tokens.len())..]
        .iter()
        .take_while(|word| word.as_str() != "in")
        .map(String::as_str)
        .collect();

    if words.is_empty() {
        return None;
    }

    let phrase = words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    Some(phrase)
}

fn classify_data_row(cells: &[String]) -> RowEvent {
    let first = cells.first().map(|s| s.trim()).unwrap_or("");

    if !first.is_empty() && first.chars().all(|c| c.is_ascii_digit()) {
        match parse_business_row(cells) {
            Ok(draft) => RowEvent::Business(draft),
            Err(reason) => RowEvent::Malformed(reason),
        }
    } else if first == "*" {
        RowEvent::Amenity(cells.get(1).map(|s| s.trim().to_string()).unwrap_or_default())
    } else {
        RowEvent::Ignored
    }
}

fn parse_business_row(cells: &[String]) -> Result<BusinessDraft, String> {
    let cell = |index: usize| {
        cells
            .get(index)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let taxpayer_name = cell(1);
    let business_name = non_empty(cell(2));
    let (address, tel_number) = split_address_and_phone(&cell(3).replace(',', ""));
    let barangay = non_empty(cell(4));

    let capital_raw = cell(5).replace(',', "");
    let capital = capital_raw.parse::<f64>().map_err(|_| {
        format!(
            "non-numeric capital value '{}' for '{}'",
            capital_raw, taxpayer_name
        )
    })?;
    if capital < 0.0 {
        return Err(format!(
            "negative capital value '{}' for '{}'",
            capital_raw, taxpayer_name
        ));
    }

    Ok(BusinessDraft {
        taxpayer_name,
        business_name,
        address,
        tel_number,
        barangay,
        capital,
    })
}

/// Split the combined address cell. The last whitespace token is the
/// telephone number only when, hyphens removed, it is all digits and at
/// least 7 long; anything else stays part of the address.
pub fn split_address_and_phone(address_cell: &str) -> (Option<String>, Option<String>) {
    let tokens: Vec<&str> = address_cell.split_whitespace().collect();
    let Some((last, rest)) = tokens.split_last() else {
        return (None, None);
    };

    let digits = last.replace('-', "");
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) && digits.len() >= 7 {
        (non_empty(rest.join(" ")), Some((*last).to_string()))
    } else {
        (non_empty(tokens.join(" ")), None)
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

// ============================================================================
// INGESTION DRIVER
// ============================================================================

/// Outcome of one spreadsheet ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub businesses: usize,
    pub amenities: usize,
    pub skipped: usize,
    pub year_issued: Option<i32>,
    pub sector_id: Option<i64>,
    pub status_id: i64,
}

/// Reject uploads that are not spreadsheets before any parsing happens.
pub fn validate_extension(file_name: &str) -> Result<()> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase());
    match extension.as_deref() {
        Some("xls") | Some("xlsx") => Ok(()),
        _ => bail!(
            "unsupported upload '{}': expected an .xls or .xlsx spreadsheet",
            file_name
        ),
    }
}

/// Read the first worksheet into rows of cell text.
pub fn read_sheet(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open spreadsheet {}", path.display()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow::anyhow!("spreadsheet {} has no worksheets", path.display()))?
        .context("Failed to read first worksheet")?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Cell to text. Whole numbers lose the trailing ".0" so sequence-number
/// cells pass the digit check and capital cells parse cleanly.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Validate, read, and ingest one uploaded spreadsheet.
pub fn ingest_file(conn: &mut Connection, path: &Path) -> Result<IngestReport> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_string();
    validate_extension(&file_name)?;

    let rows = read_sheet(path)?;
    ingest_rows(conn, &rows, &file_name)
}

/// Ingest pre-decoded sheet rows inside one transaction. Readers never see
/// a partially written file; malformed rows are logged and skipped.
pub fn ingest_rows(
    conn: &mut Connection,
    rows: &[Vec<String>],
    file_name: &str,
) -> Result<IngestReport> {
    let meta = decode_filename(file_name);
    info!(file = file_name, "Uploading and parsing spreadsheet");

    let tx = conn.transaction()?;

    let status_id = db::ensure_status(&tx, meta.filing.status_name())?;
    let mut sector_id = match meta.sector_code.as_deref() {
        Some(code) => db::sector_files_by_code(&tx, code)?.map(|sector| sector.id),
        None => None,
    };

    let mut scanner = SheetScanner::new();
    let mut current_establishment: Option<i64> = None;
    let mut report = IngestReport {
        businesses: 0,
        amenities: 0,
        skipped: 0,
        year_issued: None,
        sector_id: None,
        status_id,
    };

    for (index, cells) in rows.iter().enumerate() {
        match scanner.step(cells) {
            RowEvent::Banner => {
                if sector_id.is_none() {
                    if let Some(phrase) = scanner.sector_phrase() {
                        let phrase = phrase.to_string();
                        let id = match db::sector_files_by_name(&tx, &phrase)? {
                            Some(sector) => sector.id,
                            None => db::insert_sector_files(
                                &tx,
                                &phrase,
                                meta.sector_code.as_deref().unwrap_or(""),
                            )?,
                        };
                        sector_id = Some(id);
                    }
                }
            }
            RowEvent::HeaderMarker => {
                info!(file = file_name, "Processing data rows");
            }
            RowEvent::Business(draft) => {
                let business = Business {
                    id: 0,
                    taxpayer_name: draft.taxpayer_name,
                    business_name: draft.business_name,
                    business_type: None,
                    ownership_type: None,
                    address: draft.address,
                    tel_number: draft.tel_number,
                    barangay: draft.barangay,
                    capital: Some(draft.capital),
                    status_id: Some(status_id),
                    sector_dti_files_id: sector_id,
                    sector_dti_nccp_id: None,
                    division_id: None,
                    year: scanner.year_issued().unwrap_or_else(current_filing_year),
                    is_verified: false,
                };
                match db::insert_business(&tx, &business) {
                    Ok(id) => {
                        info!("Creating Business '{}'", business.display_name());
                        current_establishment = Some(id);
                        report.businesses += 1;
                    }
                    Err(e) => {
                        error!(row = index + 1, error = %e, "Failed to store business row");
                        current_establishment = None;
                        report.skipped += 1;
                    }
                }
            }
            RowEvent::Amenity(name) => match current_establishment {
                Some(business_id) => {
                    db::insert_amenity(&tx, business_id, &name)?;
                    info!("Creating Amenity '{}'", name);
                    report.amenities += 1;
                }
                None => {
                    error!(
                        row = index + 1,
                        "Amenity row has no current establishment; skipping"
                    );
                    report.skipped += 1;
                }
            },
            RowEvent::Malformed(reason) => {
                error!(row = index + 1, %reason, "Skipping malformed row");
                current_establishment = None;
                report.skipped += 1;
            }
            RowEvent::Ignored => {}
        }
    }

    scanner.finish();
    report.year_issued = scanner.year_issued();
    report.sector_id = sector_id;

    tx.commit()?;

    info!(
        file = file_name,
        businesses = report.businesses,
        amenities = report.amenities,
        skipped = report.skipped,
        "Finished ingesting spreadsheet"
    );

    Ok(report)
}

fn current_filing_year() -> i32 {
    Utc::now().year()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        conn
    }

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_decode_filename_code_and_renewal() {
        let meta = decode_filename("SEC12020renewalcompleted.xls");
        assert_eq!(meta.sector_code.as_deref(), Some("SEC1"));
        assert_eq!(meta.filing, FilingKind::Renewal);
    }

    #[test]
    fn test_decode_filename_completed_only() {
        let meta = decode_filename("GM completed.xls");
        assert_eq!(meta.sector_code.as_deref(), Some("GM"));
        assert_eq!(meta.filing, FilingKind::New);
    }

    #[test]
    fn test_decode_filename_no_marker() {
        let meta = decode_filename("businesses-2016.xls");
        assert_eq!(meta.sector_code, None);
        assert_eq!(meta.filing, FilingKind::New);
    }

    #[test]
    fn test_decode_filename_keeps_code_without_year() {
        let meta = decode_filename("AGRI-renewal.xls");
        assert_eq!(meta.sector_code.as_deref(), Some("AGRI"));
        assert_eq!(meta.filing, FilingKind::Renewal);
    }

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("list.xls").is_ok());
        assert!(validate_extension("list.XLSX").is_ok());
        assert!(validate_extension("list.csv").is_err());
        assert!(validate_extension("list").is_err());
    }

    #[test]
    fn test_split_address_and_phone() {
        let (address, phone) = split_address_and_phone("123 Rizal St 046-4163");
        assert_eq!(address.as_deref(), Some("123 Rizal St"));
        assert_eq!(phone.as_deref(), Some("046-4163"));

        // Too few digits: stays part of the address
        let (address, phone) = split_address_and_phone("123 Rizal St 12345");
        assert_eq!(address.as_deref(), Some("123 Rizal St 12345"));
        assert_eq!(phone, None);

        // Not numeric at all
        let (address, phone) = split_address_and_phone("123 Rizal St Annex");
        assert_eq!(address.as_deref(), Some("123 Rizal St Annex"));
        assert_eq!(phone, None);

        let (address, phone) = split_address_and_phone("");
        assert_eq!(address, None);
        assert_eq!(phone, None);
    }

    #[test]
    fn test_scanner_banner_year_and_sector() {
        let mut scanner = SheetScanner::new();

        let event = scanner.step(&cells(&[
            "List of Registered General Merchandise in the Municipality (2016)",
        ]));
        assert_eq!(event, RowEvent::Banner);
        assert_eq!(scanner.year_issued(), Some(2016));
        assert_eq!(scanner.sector_phrase(), Some("General Merchandise"));
        assert_eq!(scanner.state(), ScanState::AwaitingHeader);
    }

    #[test]
    fn test_scanner_banner_without_registered_pointer() {
        let mut scanner = SheetScanner::new();

        scanner.step(&cells(&["LIST OF FOOD ESTABLISHMENTS IN POBLACION 2017"]));
        assert_eq!(scanner.year_issued(), Some(2017));
        assert_eq!(scanner.sector_phrase(), Some("Food Establishments"));
    }

    #[test]
    fn test_scanner_header_marker_transition() {
        let mut scanner = SheetScanner::new();

        let event = scanner.step(&cells(&["No.", "Taxpayer's Name", "Business Name"]));
        assert_eq!(event, RowEvent::HeaderMarker);
        assert_eq!(scanner.state(), ScanState::AwaitingDataRow);

        // Data rows classify now
        let event = scanner.step(&cells(&[
            "1",
            "Dela Cruz, Juan",
            "JDC Store",
            "123 Rizal St 046-4163",
            "Poblacion",
            "50,000",
        ]));
        match event {
            RowEvent::Business(draft) => {
                assert_eq!(draft.taxpayer_name, "Dela Cruz, Juan");
                assert_eq!(draft.business_name.as_deref(), Some("JDC Store"));
                assert_eq!(draft.address.as_deref(), Some("123 Rizal St"));
                assert_eq!(draft.tel_number.as_deref(), Some("046-4163"));
                assert_eq!(draft.barangay.as_deref(), Some("Poblacion"));
                assert_eq!(draft.capital, 50_000.0);
            }
            other => panic!("expected business row, got {:?}", other),
        }

        assert_eq!(
            scanner.step(&cells(&["*", "Sari-sari store"])),
            RowEvent::Amenity("Sari-sari store".to_string())
        );

        scanner.finish();
        assert_eq!(scanner.state(), ScanState::Done);
        assert_eq!(scanner.step(&cells(&["1", "x"])), RowEvent::Ignored);
    }

    #[test]
    fn test_rows_before_marker_produce_no_records() {
        let mut scanner = SheetScanner::new();

        // Looks like a business row but the data marker has not been seen
        let event = scanner.step(&cells(&["1", "Too Early", "Nope", "", "", "100"]));
        assert_eq!(event, RowEvent::Ignored);
    }

    #[test]
    fn test_malformed_capital_reported() {
        let mut scanner = SheetScanner::new();
        scanner.step(&cells(&["", "Taxpayer's Name"]));

        let event = scanner.step(&cells(&[
            "1",
            "Bad Row",
            "Store",
            "Somewhere",
            "Poblacion",
            "fifty thousand",
        ]));
        assert!(matches!(event, RowEvent::Malformed(_)));
    }

    fn sample_sheet() -> Vec<Vec<String>> {
        vec![
            cells(&["List of General Merchandise in the Municipality (2016)"]),
            cells(&["No.", "Taxpayer's Name", "Business Name", "Address", "Barangay", "Capital"]),
            cells(&[
                "1",
                "Dela Cruz, Juan",
                "JDC Store",
                "123 Rizal St 046-4163",
                "Poblacion",
                "50,000",
            ]),
            cells(&["*", "Sari-sari store"]),
            cells(&["*", "Bakery"]),
            cells(&[
                "2",
                "Reyes, Ana",
                "Ana Salon",
                "7 Mabini St",
                "San Roque",
                "120000.50",
            ]),
            cells(&[""]),
        ]
    }

    #[test]
    fn test_ingest_rows_counts_and_attachment() {
        let mut conn = test_conn();

        let report = ingest_rows(&mut conn, &sample_sheet(), "upload.xls").unwrap();
        assert_eq!(report.businesses, 2);
        assert_eq!(report.amenities, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.year_issued, Some(2016));

        let rows = db::load_business_rows(&conn).unwrap();
        assert_eq!(rows.len(), 2);

        // Both amenities attach to the business row immediately above them
        let first_id = rows[0].business.id;
        let names = db::amenity_names_for_business(&conn, first_id).unwrap();
        assert_eq!(names, vec!["Sari-sari store", "Bakery"]);
        let second_id = rows[1].business.id;
        assert!(db::amenity_names_for_business(&conn, second_id)
            .unwrap()
            .is_empty());

        // Banner sector was created and applied; filename gave no code
        assert_eq!(
            rows[0].sector_dti_files_name.as_deref(),
            Some("General Merchandise")
        );
        // Filename without "renewal" selects the New status
        assert_eq!(rows[0].status_name.as_deref(), Some("New"));
        assert_eq!(rows[0].business.year, 2016);
        assert_eq!(rows[1].business.tel_number, None);
        assert_eq!(rows[1].business.capital, Some(120_000.50));
    }

    #[test]
    fn test_ingest_renewal_filename_resolves_existing_sector() {
        let mut conn = test_conn();
        let sector_id = db::insert_sector_files(&conn, "Agriculture", "AGRI").unwrap();

        let sheet = vec![
            cells(&["No.", "Taxpayer's Name", "Business Name", "Address", "Barangay", "Capital"]),
            cells(&["1", "Santos, Pedro", "Farm Supply", "Purok 4", "Bukal", "75000"]),
        ];
        let report = ingest_rows(&mut conn, &sheet, "AGRI2020renewal.xls").unwrap();
        assert_eq!(report.businesses, 1);
        assert_eq!(report.sector_id, Some(sector_id));

        let rows = db::load_business_rows(&conn).unwrap();
        assert_eq!(rows[0].status_name.as_deref(), Some("Renewal"));
        assert_eq!(rows[0].sector_dti_files_name.as_deref(), Some("Agriculture"));
    }

    #[test]
    fn test_bad_row_skips_and_clears_establishment() {
        let mut conn = test_conn();

        let sheet = vec![
            cells(&["No.", "Taxpayer's Name", "Business Name", "Address", "Barangay", "Capital"]),
            cells(&["1", "Good Owner", "Good Store", "Main St", "Poblacion", "1000"]),
            cells(&["2", "Bad Owner", "Bad Store", "Main St", "Poblacion", "not-a-number"]),
            // Attaches to nothing: the failed row above cleared the pointer
            cells(&["*", "Orphan amenity"]),
            cells(&["3", "Next Owner", "Next Store", "Main St", "Poblacion", "2000"]),
            cells(&["*", "Attached amenity"]),
        ];
        let report = ingest_rows(&mut conn, &sheet, "upload.xls").unwrap();
        assert_eq!(report.businesses, 2);
        assert_eq!(report.amenities, 1);
        assert_eq!(report.skipped, 2);

        let rows = db::load_business_rows(&conn).unwrap();
        let last_id = rows.last().unwrap().business.id;
        assert_eq!(
            db::amenity_names_for_business(&conn, last_id).unwrap(),
            vec!["Attached amenity"]
        );
    }

    #[test]
    fn test_ingest_commits_good_rows_despite_bad_ones() {
        let mut conn = test_conn();

        let sheet = vec![
            cells(&["No.", "Taxpayer's Name", "Business Name", "Address", "Barangay", "Capital"]),
            cells(&["1", "Only Owner", "Only Store", "Main St", "Poblacion", "oops"]),
        ];
        let report = ingest_rows(&mut conn, &sheet, "upload.xls").unwrap();
        assert_eq!(report.businesses, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(db::count_businesses(&conn).unwrap(), 0);
    }
}
