// Query Filter Builder - typed predicate/sort descriptor
//
// The admin list, both exports, and the classifier all receive the same
// opaque `&`-joined `key=value` token string. It is parsed ONCE into a
// `FilterSpec` (ordered predicates plus sort keys) and then applied
// mechanically, so token-processing order can never mean different things
// to different consumers.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::entities::{BusinessRow, BusinessType, OwnershipType};

// ============================================================================
// CAPITAL BRACKETS
// ============================================================================

/// The four capital brackets. This type is the single canonical definition
/// of the thresholds, shared by the list filter and the dashboard bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapitalBracket {
    Micro,
    Small,
    Medium,
    Large,
}

impl CapitalBracket {
    pub const ALL: [CapitalBracket; 4] = [
        CapitalBracket::Micro,
        CapitalBracket::Small,
        CapitalBracket::Medium,
        CapitalBracket::Large,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CapitalBracket::Micro => "Micro",
            CapitalBracket::Small => "Small",
            CapitalBracket::Medium => "Medium",
            CapitalBracket::Large => "Large",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "micro" => Some(CapitalBracket::Micro),
            "small" => Some(CapitalBracket::Small),
            "medium" => Some(CapitalBracket::Medium),
            "large" => Some(CapitalBracket::Large),
            _ => None,
        }
    }

    /// micro < 3M; small in [3M, 15M]; medium in (15M, 100M]; large > 100M.
    /// The brackets partition the non-negative axis with no overlaps.
    pub fn contains(&self, capital: f64) -> bool {
        match self {
            CapitalBracket::Micro => capital < 3_000_000.0,
            CapitalBracket::Small => (3_000_000.0..=15_000_000.0).contains(&capital),
            CapitalBracket::Medium => capital > 15_000_000.0 && capital <= 100_000_000.0,
            CapitalBracket::Large => capital > 100_000_000.0,
        }
    }
}

// ============================================================================
// SORT FIELDS
// ============================================================================

/// The fixed ordered field list behind the `o=` key; index 1 is
/// taxpayer_name. Reference fields sort by the referenced row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    TaxpayerName,
    BusinessName,
    TelNumber,
    Address,
    Barangay,
    BusinessType,
    OwnershipType,
    Capital,
    Year,
    Status,
    SectorDtiFiles,
    SectorDtiNccp,
    IsVerified,
}

impl SortField {
    /// 1-based position in the `o=` field list.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            1 => Some(SortField::TaxpayerName),
            2 => Some(SortField::BusinessName),
            3 => Some(SortField::TelNumber),
            4 => Some(SortField::Address),
            5 => Some(SortField::Barangay),
            6 => Some(SortField::BusinessType),
            7 => Some(SortField::OwnershipType),
            8 => Some(SortField::Capital),
            9 => Some(SortField::Year),
            10 => Some(SortField::Status),
            11 => Some(SortField::SectorDtiFiles),
            12 => Some(SortField::SectorDtiNccp),
            13 => Some(SortField::IsVerified),
            _ => None,
        }
    }

    /// Field name as it appears in `<field>__exact` tokens.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "taxpayer_name" => Some(SortField::TaxpayerName),
            "business_name" => Some(SortField::BusinessName),
            "tel_number" => Some(SortField::TelNumber),
            "address" => Some(SortField::Address),
            "barangay" => Some(SortField::Barangay),
            "business_type" => Some(SortField::BusinessType),
            "ownership_type" => Some(SortField::OwnershipType),
            "capital" => Some(SortField::Capital),
            "year" => Some(SortField::Year),
            "status" => Some(SortField::Status),
            "sector_dti_files" => Some(SortField::SectorDtiFiles),
            "sector_dti_nccp" => Some(SortField::SectorDtiNccp),
            "is_verified" => Some(SortField::IsVerified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

// ============================================================================
// PREDICATES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `q=`: every term must match at least one searchable field.
    Search(Vec<String>),
    /// `<field>__exact=` / `<field>__id__exact=`.
    Exact { field: SortField, value: String },
    /// `year=`.
    Year(i32),
    /// `barangay=` with `+` decoded to space.
    Barangay(String),
    /// `capital=micro|small|medium|large`.
    Capital(CapitalBracket),
}

impl Predicate {
    pub fn matches(&self, row: &BusinessRow) -> bool {
        match self {
            Predicate::Search(terms) => terms.iter().all(|term| term_matches(row, term)),
            Predicate::Exact { field, value } => exact_matches(*field, value, row),
            Predicate::Year(year) => row.business.year == *year,
            Predicate::Barangay(value) => {
                row.business.barangay.as_deref().unwrap_or("") == value
            }
            Predicate::Capital(bracket) => row
                .business
                .capital
                .map(|capital| bracket.contains(capital))
                .unwrap_or(false),
        }
    }
}

/// Case-insensitive substring match of one search term against the fixed
/// searchable field set. Fields are ORed within a term.
fn term_matches(row: &BusinessRow, term: &str) -> bool {
    let needle = term.to_lowercase();
    let b = &row.business;

    let haystacks: [Option<String>; 12] = [
        Some(b.taxpayer_name.clone()),
        b.business_name.clone(),
        b.tel_number.clone(),
        b.address.clone(),
        b.barangay.clone(),
        b.business_type.map(|t| t.label().to_string()),
        b.ownership_type.map(|t| t.label().to_string()),
        b.capital.map(capital_search_text),
        Some(b.year.to_string()),
        row.status_name.clone(),
        row.sector_dti_files_name.clone(),
        row.sector_dti_nccp_name.clone(),
    ];

    haystacks
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Textual rendering of a capital amount for search purposes: whole amounts
/// print without a decimal point so "3000000" matches 3,000,000.00.
fn capital_search_text(capital: f64) -> String {
    if capital.fract() == 0.0 && capital.abs() < 1e15 {
        format!("{}", capital as i64)
    } else {
        format!("{}", capital)
    }
}

fn exact_matches(field: SortField, value: &str, row: &BusinessRow) -> bool {
    let b = &row.business;
    match field {
        SortField::TaxpayerName => b.taxpayer_name == value,
        SortField::BusinessName => b.business_name.as_deref() == Some(value),
        SortField::TelNumber => b.tel_number.as_deref() == Some(value),
        SortField::Address => b.address.as_deref() == Some(value),
        SortField::Barangay => b.barangay.as_deref() == Some(value),
        SortField::BusinessType => value
            .parse::<i64>()
            .ok()
            .and_then(BusinessType::from_code)
            .map(|ty| b.business_type == Some(ty))
            .unwrap_or(false),
        SortField::OwnershipType => value
            .parse::<i64>()
            .ok()
            .and_then(OwnershipType::from_code)
            .map(|ty| b.ownership_type == Some(ty))
            .unwrap_or(false),
        SortField::Capital => value
            .parse::<f64>()
            .map(|v| b.capital == Some(v))
            .unwrap_or(false),
        SortField::Year => value.parse::<i32>().map(|v| b.year == v).unwrap_or(false),
        SortField::Status => value
            .parse::<i64>()
            .map(|v| b.status_id == Some(v))
            .unwrap_or(false),
        SortField::SectorDtiFiles => value
            .parse::<i64>()
            .map(|v| b.sector_dti_files_id == Some(v))
            .unwrap_or(false),
        SortField::SectorDtiNccp => value
            .parse::<i64>()
            .map(|v| b.sector_dti_nccp_id == Some(v))
            .unwrap_or(false),
        SortField::IsVerified => match value {
            "1" | "true" | "True" => b.is_verified,
            "0" | "false" | "False" => !b.is_verified,
            _ => false,
        },
    }
}

// ============================================================================
// SEARCH TOKENIZER
// ============================================================================

static FIND_TERMS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"|(\S+)"#).expect("valid term pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid whitespace pattern"));

/// Split a raw `q=` value into search terms. Double-quoted phrases are
/// single terms; internal whitespace runs collapse to one space.
pub fn normalize_query(query: &str) -> Vec<String> {
    FIND_TERMS
        .captures_iter(query)
        .filter_map(|caps| {
            let term = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim())?;
            if term.is_empty() {
                return None;
            }
            Some(WHITESPACE_RUN.replace_all(term, " ").into_owned())
        })
        .collect()
}

// ============================================================================
// FILTER SPEC
// ============================================================================

/// The parsed form of one filter token string: predicates in input order
/// (intersected) plus the sort keys of the last `o=` token.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterSpec {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
}

impl FilterSpec {
    /// Parse an opaque token string. Total over junk input: unknown keys,
    /// unknown fields, and unparseable values are ignored with a log line.
    pub fn parse(raw: &str) -> FilterSpec {
        let mut spec = FilterSpec::default();
        let raw = raw.trim().trim_start_matches('?');

        for token in raw.split('&') {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };
            if key.is_empty() {
                continue;
            }

            if key == "q" {
                if !value.is_empty() {
                    spec.predicates.push(Predicate::Search(normalize_query(value)));
                }
            } else if let Some(field_name) = key
                .strip_suffix("__id__exact")
                .or_else(|| key.strip_suffix("__exact"))
            {
                match SortField::from_name(field_name) {
                    Some(field) => spec.predicates.push(Predicate::Exact {
                        field,
                        value: value.to_string(),
                    }),
                    None => warn!(field = field_name, "ignoring exact filter on unknown field"),
                }
            } else if key == "year" {
                match value.parse::<i32>() {
                    Ok(year) => spec.predicates.push(Predicate::Year(year)),
                    Err(_) => warn!(value, "ignoring non-numeric year filter"),
                }
            } else if key == "barangay" {
                spec.predicates
                    .push(Predicate::Barangay(value.replace('+', " ")));
            } else if key == "capital" {
                match CapitalBracket::parse(value) {
                    Some(bracket) => spec.predicates.push(Predicate::Capital(bracket)),
                    None => warn!(value, "ignoring unknown capital bracket"),
                }
            } else if key == "o" {
                let keys = parse_sort_token(value);
                if !keys.is_empty() {
                    // A later o= token replaces an earlier one
                    spec.sort = keys;
                }
            } else {
                debug!(key, "ignoring unknown filter key");
            }
        }

        spec
    }

    /// Filter then sort. With no sort keys the result falls back to
    /// ascending taxpayer_name order.
    pub fn apply(&self, mut rows: Vec<BusinessRow>) -> Vec<BusinessRow> {
        for predicate in &self.predicates {
            rows.retain(|row| predicate.matches(row));
        }

        let default_sort = [SortKey {
            field: SortField::TaxpayerName,
            descending: false,
        }];
        let keys: &[SortKey] = if self.sort.is_empty() {
            &default_sort
        } else {
            &self.sort
        };

        rows.sort_by(|a, b| compare_rows(a, b, keys));
        rows
    }
}

/// Parse one `o=` value: dot-separated 1-based indices, negative for
/// descending. Empty and unrecognized segments are skipped.
fn parse_sort_token(value: &str) -> Vec<SortKey> {
    let mut keys = Vec::new();
    for segment in value.split('.') {
        if segment.is_empty() {
            continue;
        }
        let Ok(index) = segment.parse::<i64>() else {
            warn!(segment, "ignoring unparseable sort index");
            continue;
        };
        match SortField::from_index(index.unsigned_abs() as usize) {
            Some(field) => keys.push(SortKey {
                field,
                descending: index < 0,
            }),
            None => warn!(index, "ignoring out-of-range sort index"),
        }
    }
    keys
}

/// Multi-key comparison, keys applied left to right.
fn compare_rows(a: &BusinessRow, b: &BusinessRow, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let mut ordering = compare_field(a, b, key.field);
        if key.descending {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_field(a: &BusinessRow, b: &BusinessRow, field: SortField) -> Ordering {
    let (a, b) = (&a.business, &b.business);
    match field {
        SortField::TaxpayerName => a.taxpayer_name.cmp(&b.taxpayer_name),
        SortField::BusinessName => a.business_name.cmp(&b.business_name),
        SortField::TelNumber => a.tel_number.cmp(&b.tel_number),
        SortField::Address => a.address.cmp(&b.address),
        SortField::Barangay => a.barangay.cmp(&b.barangay),
        SortField::BusinessType => a
            .business_type
            .map(|t| t.code())
            .cmp(&b.business_type.map(|t| t.code())),
        SortField::OwnershipType => a
            .ownership_type
            .map(|t| t.code())
            .cmp(&b.ownership_type.map(|t| t.code())),
        SortField::Capital => compare_capital(a.capital, b.capital),
        SortField::Year => a.year.cmp(&b.year),
        SortField::Status => a.status_id.cmp(&b.status_id),
        SortField::SectorDtiFiles => a.sector_dti_files_id.cmp(&b.sector_dti_files_id),
        SortField::SectorDtiNccp => a.sector_dti_nccp_id.cmp(&b.sector_dti_nccp_id),
        SortField::IsVerified => a.is_verified.cmp(&b.is_verified),
    }
}

fn compare_capital(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(&b),
    }
}

// ============================================================================
// TESTS
// ============================================================================
