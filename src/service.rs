use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;

use crate::db::Database;
use crate::models::{
    ConsumedEntry, ConsumedEntryWithProduct, NewConsumedEntry, NewProduct, Product,
    validate_amount,
};

/// Facade over [`Database`] for the UI layer.
///
/// Takes the shared handle as an explicit dependency; the host application
/// obtains it once at startup (typically through
/// [`LazyDatabase`](crate::shared::LazyDatabase)) and threads the service to
/// its screens. Dates cross this boundary as `YYYY-MM-DD` strings.
pub struct TrackerService {
    db: Arc<Database>,
}

impl TrackerService {
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn new_in_memory() -> Result<Self> {
        Ok(Self {
            db: Arc::new(Database::open_in_memory()?),
        })
    }

    // --- Products ---

    pub fn add_product(&self, product: &NewProduct) -> Result<Product> {
        self.db.insert_product(product)
    }

    pub fn get_product(&self, id: i64) -> Result<Product> {
        self.db.get_product_by_id(id)
    }

    pub fn find_products(&self, query: &str) -> Result<Vec<Product>> {
        self.db.find_products_by_name(query)
    }

    pub fn find_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        self.db.find_product_by_barcode(barcode)
    }

    // --- Consumption log ---

    /// Logs `amount` grams of a product for a day. The entry records the
    /// product name as it was at logging time.
    pub fn log_consumption(&self, date: &str, product_id: i64, amount: f64) -> Result<ConsumedEntry> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
        let amount = validate_amount(amount)?;
        let product = self.db.get_product_by_id(product_id)?;
        self.db.insert_consumed_entry(&NewConsumedEntry {
            name: product.name,
            date,
            amount,
            product_id,
        })
    }

    pub fn update_consumption(&self, id: i64, amount: f64) -> Result<ConsumedEntry> {
        let amount = validate_amount(amount)?;
        self.db.update_consumed_entry_amount(id, amount)
    }

    pub fn delete_consumption(&self, id: i64) -> Result<bool> {
        self.db.delete_consumed_entry(id)
    }

    pub fn consumptions_for_day(&self, date: &str) -> Result<Vec<ConsumedEntryWithProduct>> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
        self.db.entries_with_product_for_date(date)
    }

    pub fn day_energy(&self, date: &str) -> Result<f64> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
        self.db.total_energy_for_date(date)
    }
}
