use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{Connection, params};

use crate::migrations;
use crate::models::{
    ConsumedEntry, ConsumedEntryWithProduct, NewConsumedEntry, NewProduct, Nutrients, Product,
};

/// Handle to the encrypted tracker database.
///
/// Opening keys the connection, then migrates the schema to the current
/// version. The single connection is guarded by a mutex so one handle can be
/// shared across threads; every operation runs synchronously on the calling
/// thread, callers that cannot block are expected to dispatch themselves.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    created: bool,
}

impl Database {
    /// Opens (or creates) the encrypted database file with the given
    /// SQLCipher passphrase and migrates it to the current schema version.
    pub fn open(path: &Path, key: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        apply_key(&conn, key)?;
        let created = migrations::migrate(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
            created,
        })
    }

    /// Unencrypted in-memory database, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let created = migrations::migrate(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
            created,
        })
    }

    /// True iff this open created the database file (as opposed to opening a
    /// pre-existing one).
    #[must_use]
    pub fn was_created(&self) -> bool {
        self.created
    }

    /// Schema version as tracked by the storage engine.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.conn.lock();
        let version = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    // --- Row mapping helpers ---

    // Expects columns: 0: id, 1: name, 2: energy, 3: barcode, 4..40: nutrients
    fn product_from_row(row: &rusqlite::Row) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            energy: row.get(2)?,
            barcode: row.get(3)?,
            nutrients: Nutrients::from_row_at(row, 4)?,
        })
    }

    fn consumed_entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<ConsumedEntry> {
        Ok(ConsumedEntry {
            id: row.get(0)?,
            name: row.get(1)?,
            date: row.get(2)?,
            amount: row.get(3)?,
            product_id: row.get(4)?,
        })
    }

    // Expects columns:
    // 0: ce.id, 1: ce.name, 2: ce.date, 3: ce.amount, 4: ce.productId,
    // 5: p.id, 6: p.name, 7: p.energy, 8: p.barcode, 9..45: nutrients
    fn entry_with_product_from_row(
        row: &rusqlite::Row,
    ) -> rusqlite::Result<ConsumedEntryWithProduct> {
        let amount: f64 = row.get(3)?;
        let energy: f64 = row.get(7)?;
        Ok(ConsumedEntryWithProduct {
            id: row.get(0)?,
            name: row.get(1)?,
            date: row.get(2)?,
            amount,
            product_id: row.get(4)?,
            product_name: row.get(6)?,
            energy_per_100g: energy,
            calories: energy * amount / 100.0,
            nutrients: Nutrients::from_row_at(row, 9)?,
        })
    }

    // --- Products ---

    pub fn insert_product(&self, product: &NewProduct) -> Result<Product> {
        let n = &product.nutrients;
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO Product (name, energy, barcode,
                    carbs, sugar, protein, fat, satFat,
                    salt, fiber, vitaminA_retinol, betaCarotin, vitaminD, vitaminE, vitaminK,
                    thiamin_B1, riboflavin_B2, niacin, vitaminB6, folat, pantothenacid, biotin,
                    cobalamin_B12, vitaminC, natrium, chlorid, kalium, calcium, phosphor,
                    magnesium, eisen, jod, fluorid, zink, selen, kupfer, mangan, chrom, molybdaen)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                    ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29,
                    ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39)",
                params![
                    product.name,
                    product.energy,
                    product.barcode,
                    n.carbs,
                    n.sugar,
                    n.protein,
                    n.fat,
                    n.sat_fat,
                    n.salt,
                    n.fiber,
                    n.vitamin_a_retinol,
                    n.beta_carotin,
                    n.vitamin_d,
                    n.vitamin_e,
                    n.vitamin_k,
                    n.thiamin_b1,
                    n.riboflavin_b2,
                    n.niacin,
                    n.vitamin_b6,
                    n.folat,
                    n.pantothenacid,
                    n.biotin,
                    n.cobalamin_b12,
                    n.vitamin_c,
                    n.natrium,
                    n.chlorid,
                    n.kalium,
                    n.calcium,
                    n.phosphor,
                    n.magnesium,
                    n.eisen,
                    n.jod,
                    n.fluorid,
                    n.zink,
                    n.selen,
                    n.kupfer,
                    n.mangan,
                    n.chrom,
                    n.molybdaen,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.get_product_by_id(id)
    }

    pub fn get_product_by_id(&self, id: i64) -> Result<Product> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM Product WHERE id = ?1",
            params![id],
            Self::product_from_row,
        )
        .context("Product not found")
    }

    pub fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM Product WHERE barcode = ?1")?;
        let mut rows = stmt.query(params![barcode])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::product_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn find_products_by_name(&self, query: &str) -> Result<Vec<Product>> {
        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{escaped}%");
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM Product WHERE name LIKE ?1 ESCAPE '\\' ORDER BY name LIMIT 50")?;
        let products = stmt
            .query_map(params![pattern], Self::product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    // --- Consumed entries ---

    pub fn insert_consumed_entry(&self, entry: &NewConsumedEntry) -> Result<ConsumedEntry> {
        let date_str = entry.date.format("%Y-%m-%d").to_string();
        let id = {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO ConsumedEntries (name, date, amount, productId)
                 VALUES (?1, ?2, ?3, ?4)",
                params![entry.name, date_str, entry.amount, entry.product_id],
            )?;
            conn.last_insert_rowid()
        };
        self.get_consumed_entry(id)
    }

    pub fn get_consumed_entry(&self, id: i64) -> Result<ConsumedEntry> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, date, amount, productId FROM ConsumedEntries WHERE id = ?1",
            params![id],
            Self::consumed_entry_from_row,
        )
        .context("Consumed entry not found")
    }

    pub fn update_consumed_entry_amount(&self, id: i64, amount: f64) -> Result<ConsumedEntry> {
        // Verify existence
        self.get_consumed_entry(id)?;
        {
            let conn = self.conn.lock();
            conn.execute(
                "UPDATE ConsumedEntries SET amount = ?1 WHERE id = ?2",
                params![amount, id],
            )?;
        }
        self.get_consumed_entry(id)
    }

    pub fn delete_consumed_entry(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM ConsumedEntries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    pub fn entries_with_product_for_date(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<ConsumedEntryWithProduct>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT ce.id, ce.name, ce.date, ce.amount, ce.productId, p.*
             FROM ConsumedEntries ce
             JOIN Product p ON ce.productId = p.id
             WHERE ce.date = ?1
             ORDER BY ce.id",
        )?;
        let entries = stmt
            .query_map(params![date_str], Self::entry_with_product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Total kcal logged for a day, scaled by entry amounts.
    pub fn total_energy_for_date(&self, date: NaiveDate) -> Result<f64> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let conn = self.conn.lock();
        let total = conn.query_row(
            "SELECT COALESCE(SUM(p.energy * ce.amount / 100.0), 0)
             FROM ConsumedEntries ce
             JOIN Product p ON ce.productId = p.id
             WHERE ce.date = ?1",
            params![date_str],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

/// Keys the connection and verifies the key by reading the schema table.
///
/// The compatibility pragma pins the cipher file format the original release
/// wrote, so databases created by older builds stay readable.
fn apply_key(conn: &Connection, key: &str) -> Result<()> {
    conn.pragma_update(None, "key", key)
        .context("Failed to key database")?;
    conn.pragma_update(None, "cipher_compatibility", 3)
        .context("Failed to set cipher compatibility")?;
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .context("Failed to unlock database: invalid key or corrupted file")?;
    Ok(())
}
