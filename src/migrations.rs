use std::fmt::Write;

use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use tracing::{debug, info};

/// Schema version written to fresh databases and targeted by migration.
pub const CURRENT_VERSION: i32 = 3;

/// One step of the schema ladder: adds nutrient columns to `Product`, each
/// `REAL NOT NULL DEFAULT 0` so existing rows stay valid without backfill.
pub struct Migration {
    pub from_version: i32,
    pub to_version: i32,
    pub add_columns: &'static [&'static str],
}

/// Macro-nutrient columns added in schema v2.
pub const MACRO_NUTRIENT_COLUMNS: [&str; 5] = ["carbs", "sugar", "protein", "fat", "satFat"];

/// Micro-nutrient and mineral columns added in schema v3.
pub const MICRO_NUTRIENT_COLUMNS: [&str; 31] = [
    "salt",
    "fiber",
    "vitaminA_retinol",
    "betaCarotin",
    "vitaminD",
    "vitaminE",
    "vitaminK",
    "thiamin_B1",
    "riboflavin_B2",
    "niacin",
    "vitaminB6",
    "folat",
    "pantothenacid",
    "biotin",
    "cobalamin_B12",
    "vitaminC",
    "natrium",
    "chlorid",
    "kalium",
    "calcium",
    "phosphor",
    "magnesium",
    "eisen",
    "jod",
    "fluorid",
    "zink",
    "selen",
    "kupfer",
    "mangan",
    "chrom",
    "molybdaen",
];

/// Ordered migration table. Opening a database at version N replays every
/// entry with `from_version >= N`, in order.
pub static MIGRATIONS: [Migration; 2] = [
    Migration {
        from_version: 1,
        to_version: 2,
        add_columns: &MACRO_NUTRIENT_COLUMNS,
    },
    Migration {
        from_version: 2,
        to_version: 3,
        add_columns: &MICRO_NUTRIENT_COLUMNS,
    },
];

/// Brings the connection's schema up to [`CURRENT_VERSION`].
///
/// A brand-new database (`user_version == 0`) gets the full current schema
/// directly and no migrations run. Returns `true` iff the database was newly
/// created by this call. A version newer than [`CURRENT_VERSION`] is fatal:
/// the file was written by a newer release.
pub fn migrate(conn: &Connection) -> Result<bool> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version == 0 {
        create_current_schema(conn).context("Failed to create database schema")?;
        info!(version = CURRENT_VERSION, "created new database");
        return Ok(true);
    }

    if version > CURRENT_VERSION {
        bail!("Database schema version {version} is newer than supported version {CURRENT_VERSION}");
    }

    for migration in &MIGRATIONS {
        if migration.from_version >= version {
            apply(conn, migration).with_context(|| {
                format!(
                    "Failed to migrate schema from version {} to {}",
                    migration.from_version, migration.to_version
                )
            })?;
        }
    }

    Ok(false)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    debug!(
        from = migration.from_version,
        to = migration.to_version,
        columns = migration.add_columns.len(),
        "applying schema migration"
    );
    for column in migration.add_columns {
        conn.execute_batch(&format!(
            "ALTER TABLE Product ADD COLUMN {column} REAL NOT NULL DEFAULT 0;"
        ))?;
    }
    conn.pragma_update(None, "user_version", migration.to_version)?;
    Ok(())
}

fn create_current_schema(conn: &Connection) -> Result<()> {
    let mut product_ddl = String::from(
        "CREATE TABLE Product (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            energy REAL NOT NULL,
            barcode TEXT",
    );
    for column in MACRO_NUTRIENT_COLUMNS.iter().chain(&MICRO_NUTRIENT_COLUMNS) {
        let _ = write!(product_ddl, ",\n            {column} REAL NOT NULL DEFAULT 0");
    }
    product_ddl.push_str("\n        );");

    conn.execute_batch(&format!(
        "{product_ddl}

        CREATE TABLE ConsumedEntries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            amount REAL NOT NULL,
            productId INTEGER NOT NULL REFERENCES Product(id)
        );

        CREATE INDEX idx_consumed_entries_date ON ConsumedEntries(date);
        CREATE INDEX idx_consumed_entries_product ON ConsumedEntries(productId);
        CREATE INDEX idx_product_name ON Product(name);

        PRAGMA user_version = {CURRENT_VERSION};"
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The v1 schema as shipped before nutrient columns existed.
    const SCHEMA_V1: &str = "CREATE TABLE Product (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            energy REAL NOT NULL,
            barcode TEXT
        );

        CREATE TABLE ConsumedEntries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            amount REAL NOT NULL,
            productId INTEGER NOT NULL REFERENCES Product(id)
        );

        CREATE INDEX idx_consumed_entries_date ON ConsumedEntries(date);
        CREATE INDEX idx_consumed_entries_product ON ConsumedEntries(productId);
        CREATE INDEX idx_product_name ON Product(name);

        PRAGMA user_version = 1;";

    fn product_columns(conn: &Connection) -> Vec<String> {
        let mut stmt = conn.prepare("PRAGMA table_info(Product)").unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn schema_version(conn: &Connection) -> i32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_created_at_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        let created = migrate(&conn).unwrap();

        assert!(created);
        assert_eq!(schema_version(&conn), CURRENT_VERSION);

        let columns = product_columns(&conn);
        for column in MACRO_NUTRIENT_COLUMNS.iter().chain(&MICRO_NUTRIENT_COLUMNS) {
            assert!(columns.iter().any(|c| c == column), "missing column {column}");
        }
    }

    #[test]
    fn test_migrate_from_v1_applies_both_steps() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_V1).unwrap();
        conn.execute(
            "INSERT INTO Product (name, energy) VALUES ('Oats', 372.0)",
            [],
        )
        .unwrap();

        let created = migrate(&conn).unwrap();
        assert!(!created);
        assert_eq!(schema_version(&conn), 3);

        let columns = product_columns(&conn);
        // 4 base columns + 5 macro + 31 micro
        assert_eq!(columns.len(), 40);

        // Pre-existing rows read zero for every added column.
        let (carbs, molybdaen): (f64, f64) = conn
            .query_row(
                "SELECT carbs, molybdaen FROM Product WHERE name = 'Oats'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(carbs, 0.0);
        assert_eq!(molybdaen, 0.0);
    }

    #[test]
    fn test_migrate_from_v2_leaves_macro_values_untouched() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_V1).unwrap();
        for column in MACRO_NUTRIENT_COLUMNS {
            conn.execute_batch(&format!(
                "ALTER TABLE Product ADD COLUMN {column} REAL NOT NULL DEFAULT 0;"
            ))
            .unwrap();
        }
        conn.execute_batch("PRAGMA user_version = 2;").unwrap();
        conn.execute(
            "INSERT INTO Product (name, energy, carbs, protein) VALUES ('Rice', 349.0, 77.2, 7.5)",
            [],
        )
        .unwrap();

        let created = migrate(&conn).unwrap();
        assert!(!created);
        assert_eq!(schema_version(&conn), 3);

        let (carbs, protein, salt): (f64, f64, f64) = conn
            .query_row(
                "SELECT carbs, protein, salt FROM Product WHERE name = 'Rice'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(carbs, 77.2);
        assert_eq!(protein, 7.5);
        assert_eq!(salt, 0.0);
    }

    #[test]
    fn test_migrate_is_noop_at_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let created = migrate(&conn).unwrap();
        assert!(!created);
        assert_eq!(schema_version(&conn), CURRENT_VERSION);
    }

    #[test]
    fn test_migrate_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn.execute_batch("PRAGMA user_version = 4;").unwrap();

        let err = migrate(&conn).unwrap_err();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn test_migration_table_is_ordered_and_contiguous() {
        let mut expected = 1;
        for migration in &MIGRATIONS {
            assert_eq!(migration.from_version, expected);
            assert_eq!(migration.to_version, expected + 1);
            expected += 1;
        }
        assert_eq!(expected, CURRENT_VERSION);
    }
}
