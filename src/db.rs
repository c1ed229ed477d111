// Record Store - SQLite persistence for the business registry
//
// Free functions over `&Connection` so callers can run any group of writes
// inside one `Connection::transaction()` boundary: ingestion and classifier
// updates each commit as a single unit and readers never observe a
// partially written file.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use crate::entities::{
    Amenity, Business, BusinessRow, BusinessType, Location, OwnershipType, SectorDtiFiles,
    SectorDtiNccp, STATUS_NEW, STATUS_RENEWAL,
};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; foreign keys drive the amenity cascade
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS statuses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS sectors_dti_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            code TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sectors_dti_nccp (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            code TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sector_nccp_dataset (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sector_dti_nccp_id INTEGER NOT NULL
                REFERENCES sectors_dti_nccp(id) ON DELETE CASCADE,
            text TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS businesses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            taxpayer_name TEXT NOT NULL,
            business_name TEXT,
            business_type INTEGER,
            ownership_type INTEGER,
            address TEXT,
            tel_number TEXT,
            barangay TEXT,
            capital REAL CHECK (capital IS NULL OR capital >= 0),
            status_id INTEGER REFERENCES statuses(id),
            sector_dti_files_id INTEGER REFERENCES sectors_dti_files(id),
            sector_dti_nccp_id INTEGER REFERENCES sectors_dti_nccp(id),
            division_id INTEGER,
            year INTEGER NOT NULL,
            is_verified INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS amenities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            business_id INTEGER NOT NULL
                REFERENCES businesses(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            business_id INTEGER NOT NULL
                REFERENCES businesses(id) ON DELETE CASCADE,
            latitude REAL,
            longitude REAL
        );

        CREATE INDEX IF NOT EXISTS idx_businesses_year ON businesses(year);
        CREATE INDEX IF NOT EXISTS idx_businesses_barangay ON businesses(barangay);
        CREATE INDEX IF NOT EXISTS idx_businesses_sector_files
            ON businesses(sector_dti_files_id);
        CREATE INDEX IF NOT EXISTS idx_businesses_sector_nccp
            ON businesses(sector_dti_nccp_id);
        CREATE INDEX IF NOT EXISTS idx_amenities_business ON amenities(business_id);
        CREATE INDEX IF NOT EXISTS idx_dataset_sector
            ON sector_nccp_dataset(sector_dti_nccp_id);",
    )
    .context("Failed to create registry schema")?;

    // Seed the two fixed fallback statuses on a fresh database
    let status_count: i64 = conn.query_row("SELECT COUNT(*) FROM statuses", [], |row| row.get(0))?;
    if status_count == 0 {
        conn.execute(
            "INSERT INTO statuses (name) VALUES (?1), (?2)",
            params![STATUS_NEW, STATUS_RENEWAL],
        )?;
    }

    Ok(())
}

// ============================================================================
// STATUSES
// ============================================================================

/// Look up a status by name, creating it when missing.
pub fn ensure_status(conn: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM statuses WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => Ok(id),
        None => {
            conn.execute("INSERT INTO statuses (name) VALUES (?1)", params![name])?;
            Ok(conn.last_insert_rowid())
        }
    }
}

// ============================================================================
// SECTORS
// ============================================================================

fn sector_files_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SectorDtiFiles> {
    Ok(SectorDtiFiles {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        code: row.get(3)?,
    })
}

pub fn sector_files_by_code(conn: &Connection, code: &str) -> Result<Option<SectorDtiFiles>> {
    let sector = conn
        .query_row(
            "SELECT id, name, description, code FROM sectors_dti_files
             WHERE code = ?1 ORDER BY id LIMIT 1",
            params![code],
            sector_files_from_row,
        )
        .optional()?;
    Ok(sector)
}

pub fn sector_files_by_name(conn: &Connection, name: &str) -> Result<Option<SectorDtiFiles>> {
    let sector = conn
        .query_row(
            "SELECT id, name, description, code FROM sectors_dti_files
             WHERE name = ?1 ORDER BY id LIMIT 1",
            params![name],
            sector_files_from_row,
        )
        .optional()?;
    Ok(sector)
}

pub fn insert_sector_files(conn: &Connection, name: &str, code: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO sectors_dti_files (name, code) VALUES (?1, ?2)",
        params![name, code],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All DTI-NCCP sectors in id order. The classifier relies on this order:
/// a training target is the sector's position in this enumeration.
pub fn sectors_nccp(conn: &Connection) -> Result<Vec<SectorDtiNccp>> {
    let mut stmt =
        conn.prepare("SELECT id, name, description, code FROM sectors_dti_nccp ORDER BY id")?;
    let sectors = stmt
        .query_map([], |row| {
            Ok(SectorDtiNccp {
                id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                code: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sectors)
}

pub fn insert_sector_nccp(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    code: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO sectors_dti_nccp (name, description, code) VALUES (?1, ?2, ?3)",
        params![name, description, code],
    )?;
    Ok(conn.last_insert_rowid())
}

// ============================================================================
// CLASSIFIER CORPUS
// ============================================================================

pub fn insert_dataset_text(conn: &Connection, sector_nccp_id: i64, text: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO sector_nccp_dataset (sector_dti_nccp_id, text) VALUES (?1, ?2)",
        params![sector_nccp_id, text],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Curated training texts for one DTI-NCCP sector, in insertion order.
pub fn dataset_texts(conn: &Connection, sector_nccp_id: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT text FROM sector_nccp_dataset WHERE sector_dti_nccp_id = ?1 ORDER BY id",
    )?;
    let texts = stmt
        .query_map(params![sector_nccp_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(texts)
}

// ============================================================================
// BUSINESSES
// ============================================================================

/// Insert a business; the `id` field of the argument is ignored.
pub fn insert_business(conn: &Connection, business: &Business) -> Result<i64> {
    conn.execute(
        "INSERT INTO businesses (
            taxpayer_name, business_name, business_type, ownership_type,
            address, tel_number, barangay, capital, status_id,
            sector_dti_files_id, sector_dti_nccp_id, division_id, year, is_verified
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            business.taxpayer_name,
            business.business_name,
            business.business_type.map(|t| t.code()),
            business.ownership_type.map(|t| t.code()),
            business.address,
            business.tel_number,
            business.barangay,
            business.capital,
            business.status_id,
            business.sector_dti_files_id,
            business.sector_dti_nccp_id,
            business.division_id,
            business.year,
            business.is_verified,
        ],
    )
    .with_context(|| format!("Failed to insert business '{}'", business.taxpayer_name))?;
    Ok(conn.last_insert_rowid())
}

pub fn update_business_year(conn: &Connection, business_id: i64, year: i32) -> Result<()> {
    conn.execute(
        "UPDATE businesses SET year = ?1 WHERE id = ?2",
        params![year, business_id],
    )?;
    Ok(())
}

pub fn update_business_sector_nccp(
    conn: &Connection,
    business_id: i64,
    sector_nccp_id: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE businesses SET sector_dti_nccp_id = ?1 WHERE id = ?2",
        params![sector_nccp_id, business_id],
    )?;
    Ok(())
}

pub fn set_business_verified(conn: &Connection, business_id: i64, verified: bool) -> Result<()> {
    conn.execute(
        "UPDATE businesses SET is_verified = ?1 WHERE id = ?2",
        params![verified, business_id],
    )?;
    Ok(())
}

pub fn count_businesses(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM businesses", [], |row| row.get(0))?;
    Ok(count)
}

/// Every business joined with the names of its status and sector rows, in
/// id order. The filter builder takes it from here.
pub fn load_business_rows(conn: &Connection) -> Result<Vec<BusinessRow>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.taxpayer_name, b.business_name, b.business_type,
                b.ownership_type, b.address, b.tel_number, b.barangay, b.capital,
                b.status_id, b.sector_dti_files_id, b.sector_dti_nccp_id,
                b.division_id, b.year, b.is_verified,
                st.name, sf.name, sn.name
         FROM businesses b
         LEFT JOIN statuses st ON st.id = b.status_id
         LEFT JOIN sectors_dti_files sf ON sf.id = b.sector_dti_files_id
         LEFT JOIN sectors_dti_nccp sn ON sn.id = b.sector_dti_nccp_id
         ORDER BY b.id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            let business_type: Option<i64> = row.get(3)?;
            let ownership_type: Option<i64> = row.get(4)?;

            Ok(BusinessRow {
                business: Business {
                    id: row.get(0)?,
                    taxpayer_name: row.get(1)?,
                    business_name: row.get(2)?,
                    business_type: business_type.and_then(BusinessType::from_code),
                    ownership_type: ownership_type.and_then(OwnershipType::from_code),
                    address: row.get(5)?,
                    tel_number: row.get(6)?,
                    barangay: row.get(7)?,
                    capital: row.get(8)?,
                    status_id: row.get(9)?,
                    sector_dti_files_id: row.get(10)?,
                    sector_dti_nccp_id: row.get(11)?,
                    division_id: row.get(12)?,
                    year: row.get(13)?,
                    is_verified: row.get(14)?,
                },
                status_name: row.get(15)?,
                sector_dti_files_name: row.get(16)?,
                sector_dti_nccp_name: row.get(17)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

// ============================================================================
// AMENITIES
// ============================================================================

pub fn insert_amenity(conn: &Connection, business_id: i64, name: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO amenities (name, business_id) VALUES (?1, ?2)",
        params![name, business_id],
    )
    .with_context(|| format!("Failed to insert amenity '{}'", name))?;
    Ok(conn.last_insert_rowid())
}

pub fn amenities_for_business(conn: &Connection, business_id: i64) -> Result<Vec<Amenity>> {
    let mut stmt =
        conn.prepare("SELECT id, name, business_id FROM amenities WHERE business_id = ?1 ORDER BY id")?;
    let amenities = stmt
        .query_map(params![business_id], |row| {
            Ok(Amenity {
                id: row.get(0)?,
                name: row.get(1)?,
                business_id: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(amenities)
}

pub fn amenity_names_for_business(conn: &Connection, business_id: i64) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM amenities WHERE business_id = ?1 ORDER BY id")?;
    let names = stmt
        .query_map(params![business_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Amenity names of verified businesses already labeled with the given
/// DTI-NCCP sector. Joined into one synthetic training document per sector.
pub fn amenity_names_for_verified_sector(
    conn: &Connection,
    sector_nccp_id: i64,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT a.name FROM amenities a
         JOIN businesses b ON b.id = a.business_id
         WHERE b.is_verified = 1 AND b.sector_dti_nccp_id = ?1
         ORDER BY a.id",
    )?;
    let names = stmt
        .query_map(params![sector_nccp_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

// ============================================================================
// LOCATIONS
// ============================================================================

pub fn insert_location(
    conn: &Connection,
    business_id: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO locations (business_id, latitude, longitude) VALUES (?1, ?2, ?3)",
        params![business_id, latitude, longitude],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn location_for_business(conn: &Connection, business_id: i64) -> Result<Option<Location>> {
    let location = conn
        .query_row(
            "SELECT id, business_id, latitude, longitude FROM locations
             WHERE business_id = ?1 ORDER BY id LIMIT 1",
            params![business_id],
            |row| {
                Ok(Location {
                    id: row.get(0)?,
                    business_id: row.get(1)?,
                    latitude: row.get(2)?,
                    longitude: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(location)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    pub fn test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn sample_business(taxpayer: &str) -> Business {
        Business {
            id: 0,
            taxpayer_name: taxpayer.to_string(),
            business_name: Some("Sample Store".to_string()),
            business_type: Some(BusinessType::Single),
            ownership_type: Some(OwnershipType::Filipino),
            address: Some("123 Rizal St".to_string()),
            tel_number: Some("046-4163".to_string()),
            barangay: Some("Poblacion".to_string()),
            capital: Some(50_000.0),
            status_id: None,
            sector_dti_files_id: None,
            sector_dti_nccp_id: None,
            division_id: None,
            year: 2016,
            is_verified: false,
        }
    }

    #[test]
    fn test_setup_seeds_fallback_statuses() {
        let conn = test_connection();

        let new_id = ensure_status(&conn, STATUS_NEW).unwrap();
        let renewal_id = ensure_status(&conn, STATUS_RENEWAL).unwrap();
        assert_eq!(new_id, 1);
        assert_eq!(renewal_id, 2);

        // Setup twice must not duplicate the seed rows
        setup_database(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM statuses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_ensure_status_creates_once() {
        let conn = test_connection();

        let first = ensure_status(&conn, "Amended").unwrap();
        let second = ensure_status(&conn, "Amended").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_insert_and_load_joined_rows() {
        let conn = test_connection();

        let status_id = ensure_status(&conn, STATUS_NEW).unwrap();
        let sector_id = insert_sector_files(&conn, "General Merchandise", "GM").unwrap();

        let mut business = sample_business("Dela Cruz, Juan");
        business.status_id = Some(status_id);
        business.sector_dti_files_id = Some(sector_id);
        let business_id = insert_business(&conn, &business).unwrap();
        assert!(business_id > 0);

        let rows = load_business_rows(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].business.taxpayer_name, "Dela Cruz, Juan");
        assert_eq!(rows[0].status_name.as_deref(), Some("New"));
        assert_eq!(
            rows[0].sector_dti_files_name.as_deref(),
            Some("General Merchandise")
        );
        assert_eq!(rows[0].sector_dti_nccp_name, None);
        assert_eq!(rows[0].business.business_type, Some(BusinessType::Single));
    }

    #[test]
    fn test_negative_capital_rejected() {
        let conn = test_connection();

        let mut business = sample_business("Bad Capital");
        business.capital = Some(-1.0);
        assert!(insert_business(&conn, &business).is_err());
    }

    #[test]
    fn test_amenities_cascade_on_business_delete() {
        let conn = test_connection();

        let business_id = insert_business(&conn, &sample_business("Cascade Test")).unwrap();
        insert_amenity(&conn, business_id, "Sari-sari store").unwrap();
        insert_amenity(&conn, business_id, "Bakery").unwrap();

        let names = amenity_names_for_business(&conn, business_id).unwrap();
        assert_eq!(names, vec!["Sari-sari store", "Bakery"]);

        conn.execute("DELETE FROM businesses WHERE id = ?1", params![business_id])
            .unwrap();
        let orphaned: i64 = conn
            .query_row("SELECT COUNT(*) FROM amenities", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphaned, 0);
    }

    #[test]
    fn test_verified_sector_amenity_corpus() {
        let conn = test_connection();

        let sector_id = insert_sector_nccp(&conn, "Food Manufacturing", None, "C10").unwrap();

        let mut verified = sample_business("Verified Owner");
        verified.sector_dti_nccp_id = Some(sector_id);
        verified.is_verified = true;
        let verified_id = insert_business(&conn, &verified).unwrap();
        insert_amenity(&conn, verified_id, "Bakery").unwrap();

        let mut unverified = sample_business("Unverified Owner");
        unverified.sector_dti_nccp_id = Some(sector_id);
        let unverified_id = insert_business(&conn, &unverified).unwrap();
        insert_amenity(&conn, unverified_id, "Noodle stand").unwrap();

        let names = amenity_names_for_verified_sector(&conn, sector_id).unwrap();
        assert_eq!(names, vec!["Bakery"]);
    }

    #[test]
    fn test_location_one_to_one() {
        let conn = test_connection();

        let business_id = insert_business(&conn, &sample_business("Located")).unwrap();
        assert!(location_for_business(&conn, business_id).unwrap().is_none());

        insert_location(&conn, business_id, Some(14.5995), Some(120.9842)).unwrap();
        let location = location_for_business(&conn, business_id).unwrap().unwrap();
        assert_eq!(location.latitude, Some(14.5995));
        assert_eq!(location.longitude, Some(120.9842));
    }
}
