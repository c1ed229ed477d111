// SORDAS Business Registry - Core Library
// Exposes all modules for use in the CLI, the API server, and tests

pub mod analytics;
pub mod classify;
pub mod db;
pub mod entities;
pub mod filter;
pub mod ingest;
pub mod report;

// Re-export commonly used types
pub use analytics::{
    distinct_years, year_analytics, BarangayShare, CapitalBucket, CountEntry, YearAnalytics,
};
pub use classify::{classify_unverified, Assignment, ClassifierConfig, SectorClassifier};
pub use entities::{
    Amenity, Business, BusinessRow, BusinessType, Location, OwnershipType, SectorDatasetEntry,
    SectorDtiFiles, SectorDtiNccp, Status, STATUS_NEW, STATUS_RENEWAL,
};
pub use filter::{CapitalBracket, FilterSpec, Predicate, SortField, SortKey};
pub use ingest::{
    decode_filename, ingest_file, ingest_rows, FilenameMeta, FilingKind, IngestReport,
    RowEvent, ScanState, SheetScanner,
};
pub use report::{
    export_csv, export_pdf, export_pdf_bytes, export_xlsx, export_xlsx_bytes, format_money,
    REPORT_COLUMNS, REPORT_TITLE,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
