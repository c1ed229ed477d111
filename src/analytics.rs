// Aggregation - per-year dashboard counts and bucketing
//
// Counts are grouped per dimension (both sector taxonomies, status,
// capital bracket) for one filing year. Capital bucketing reuses the
// CapitalBracket thresholds from the filter builder so the list filter and
// the dashboard can never disagree. The barangay chart is capped by the
// upper-bound-of-median selection: the smallest descending prefix whose
// running count strictly exceeds half the year's total.

use anyhow::{bail, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::filter::CapitalBracket;

// ============================================================================
// PAYLOAD TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarangayShare {
    pub name: String,
    pub count: i64,
    /// Percentage of the year's total business count.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapitalBucket {
    pub bracket: CapitalBracket,
    pub count: i64,
}

/// Everything the dashboard renders for one filing year.
#[derive(Debug, Clone, Serialize)]
pub struct YearAnalytics {
    pub year: i32,
    /// All filing years on record, newest first.
    pub years: Vec<i32>,
    pub total: i64,
    pub sector_dti_files: Vec<CountEntry>,
    pub sector_dti_nccp: Vec<CountEntry>,
    pub status: Vec<CountEntry>,
    pub capital: Vec<CapitalBucket>,
    pub top_barangays: Vec<BarangayShare>,
}

// ============================================================================
// QUERIES
// ============================================================================

/// Distinct filing years, newest first.
pub fn distinct_years(conn: &Connection) -> Result<Vec<i32>> {
    let mut stmt = conn.prepare("SELECT DISTINCT year FROM businesses ORDER BY year DESC")?;
    let years = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(years)
}

fn count_by(conn: &Connection, sql: &str, year: i32) -> Result<Vec<CountEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map(params![year], |row| {
            Ok(CountEntry {
                name: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Assemble the dashboard payload for `year`, or for the latest filing year
/// when none is given. A year with no businesses on record is an error.
pub fn year_analytics(conn: &Connection, year: Option<i32>) -> Result<YearAnalytics> {
    let years = distinct_years(conn)?;

    let year = match year {
        Some(year) => year,
        None => match years.first() {
            Some(&latest) => latest,
            None => bail!("no businesses on record"),
        },
    };
    if !years.contains(&year) {
        bail!("no businesses recorded for year {}", year);
    }

    // Inner joins keep zero-count groups out; ties break on row id so the
    // ordering is deterministic
    let sector_dti_files = count_by(
        conn,
        "SELECT s.name, COUNT(b.id) AS n FROM sectors_dti_files s
         JOIN businesses b ON b.sector_dti_files_id = s.id
         WHERE b.year = ?1
         GROUP BY s.id, s.name
         ORDER BY n DESC, s.id",
        year,
    )?;
    let sector_dti_nccp = count_by(
        conn,
        "SELECT s.name, COUNT(b.id) AS n FROM sectors_dti_nccp s
         JOIN businesses b ON b.sector_dti_nccp_id = s.id
         WHERE b.year = ?1
         GROUP BY s.id, s.name
         ORDER BY n DESC, s.id",
        year,
    )?;
    let status = count_by(
        conn,
        "SELECT s.name, COUNT(b.id) AS n FROM statuses s
         JOIN businesses b ON b.status_id = s.id
         WHERE b.year = ?1
         GROUP BY s.id, s.name
         ORDER BY n DESC, s.id",
        year,
    )?;

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM businesses WHERE year = ?1",
        params![year],
        |row| row.get(0),
    )?;

    let barangay_counts = count_by(
        conn,
        "SELECT barangay, COUNT(*) AS n FROM businesses
         WHERE year = ?1 AND barangay IS NOT NULL
         GROUP BY barangay
         ORDER BY n DESC, barangay",
        year,
    )?;
    let top_barangays = upper_bound_of_median(barangay_counts, total);

    let capital = capital_buckets(conn, year)?;

    Ok(YearAnalytics {
        year,
        years,
        total,
        sector_dti_files,
        sector_dti_nccp,
        status,
        capital,
        top_barangays,
    })
}

/// Bracket counts for the year's declared capitals, zero brackets dropped.
/// Uses `CapitalBracket::contains`, the same predicate the list filter runs.
pub fn capital_buckets(conn: &Connection, year: i32) -> Result<Vec<CapitalBucket>> {
    let mut stmt =
        conn.prepare("SELECT capital FROM businesses WHERE year = ?1 AND capital IS NOT NULL")?;
    let capitals: Vec<f64> = stmt
        .query_map(params![year], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let buckets = CapitalBracket::ALL
        .into_iter()
        .map(|bracket| CapitalBucket {
            bracket,
            count: capitals
                .iter()
                .filter(|&&capital| bracket.contains(capital))
                .count() as i64,
        })
        .filter(|bucket| bucket.count > 0)
        .collect();
    Ok(buckets)
}

// ============================================================================
// UPPER BOUND OF MEDIAN
// ============================================================================

/// Select the top barangays that account for more than half of the year's
/// businesses: sort descending by count and accumulate, keeping each entry
/// (annotated with its percentage of the total) until the running sum first
/// strictly exceeds half the total. The crossing entry is included.
pub fn upper_bound_of_median(counts: Vec<CountEntry>, total: i64) -> Vec<BarangayShare> {
    if total <= 0 {
        return Vec::new();
    }

    let mut sorted = counts;
    sorted.sort_by(|a, b| b.count.cmp(&a.count));

    let half = total / 2;
    let mut running = 0;
    let mut selected = Vec::new();

    for entry in sorted {
        running += entry.count;
        selected.push(BarangayShare {
            percent: entry.count as f64 / total as f64 * 100.0,
            name: entry.name,
            count: entry.count,
        });
        if running > half {
            break;
        }
    }

    selected
}

// ============================================================================
// TESTS
// ============================================================================
