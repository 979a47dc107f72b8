use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-100g nutrient values of a product.
///
/// Field order matches the column order of the `Product` table: the five
/// macro-nutrients added in schema v2, then the micro-nutrients and minerals
/// added in schema v3. Every column is `REAL NOT NULL DEFAULT 0`, so a
/// product imported before a migration simply reads as zero for the newer
/// fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrients {
    pub carbs: f64,
    pub sugar: f64,
    pub protein: f64,
    pub fat: f64,
    pub sat_fat: f64,
    pub salt: f64,
    pub fiber: f64,
    pub vitamin_a_retinol: f64,
    pub beta_carotin: f64,
    pub vitamin_d: f64,
    pub vitamin_e: f64,
    pub vitamin_k: f64,
    pub thiamin_b1: f64,
    pub riboflavin_b2: f64,
    pub niacin: f64,
    pub vitamin_b6: f64,
    pub folat: f64,
    pub pantothenacid: f64,
    pub biotin: f64,
    pub cobalamin_b12: f64,
    pub vitamin_c: f64,
    pub natrium: f64,
    pub chlorid: f64,
    pub kalium: f64,
    pub calcium: f64,
    pub phosphor: f64,
    pub magnesium: f64,
    pub eisen: f64,
    pub jod: f64,
    pub fluorid: f64,
    pub zink: f64,
    pub selen: f64,
    pub kupfer: f64,
    pub mangan: f64,
    pub chrom: f64,
    pub molybdaen: f64,
}

impl Nutrients {
    /// Values in table column order, for binding inserts.
    pub(crate) fn values(&self) -> [f64; 36] {
        [
            self.carbs,
            self.sugar,
            self.protein,
            self.fat,
            self.sat_fat,
            self.salt,
            self.fiber,
            self.vitamin_a_retinol,
            self.beta_carotin,
            self.vitamin_d,
            self.vitamin_e,
            self.vitamin_k,
            self.thiamin_b1,
            self.riboflavin_b2,
            self.niacin,
            self.vitamin_b6,
            self.folat,
            self.pantothenacid,
            self.biotin,
            self.cobalamin_b12,
            self.vitamin_c,
            self.natrium,
            self.chlorid,
            self.kalium,
            self.calcium,
            self.phosphor,
            self.magnesium,
            self.eisen,
            self.jod,
            self.fluorid,
            self.zink,
            self.selen,
            self.kupfer,
            self.mangan,
            self.chrom,
            self.molybdaen,
        ]
    }

    /// Reads the 36 nutrient columns starting at `offset` in a result row.
    pub(crate) fn from_row_at(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            carbs: row.get(offset)?,
            sugar: row.get(offset + 1)?,
            protein: row.get(offset + 2)?,
            fat: row.get(offset + 3)?,
            sat_fat: row.get(offset + 4)?,
            salt: row.get(offset + 5)?,
            fiber: row.get(offset + 6)?,
            vitamin_a_retinol: row.get(offset + 7)?,
            beta_carotin: row.get(offset + 8)?,
            vitamin_d: row.get(offset + 9)?,
            vitamin_e: row.get(offset + 10)?,
            vitamin_k: row.get(offset + 11)?,
            thiamin_b1: row.get(offset + 12)?,
            riboflavin_b2: row.get(offset + 13)?,
            niacin: row.get(offset + 14)?,
            vitamin_b6: row.get(offset + 15)?,
            folat: row.get(offset + 16)?,
            pantothenacid: row.get(offset + 17)?,
            biotin: row.get(offset + 18)?,
            cobalamin_b12: row.get(offset + 19)?,
            vitamin_c: row.get(offset + 20)?,
            natrium: row.get(offset + 21)?,
            chlorid: row.get(offset + 22)?,
            kalium: row.get(offset + 23)?,
            calcium: row.get(offset + 24)?,
            phosphor: row.get(offset + 25)?,
            magnesium: row.get(offset + 26)?,
            eisen: row.get(offset + 27)?,
            jod: row.get(offset + 28)?,
            fluorid: row.get(offset + 29)?,
            zink: row.get(offset + 30)?,
            selen: row.get(offset + 31)?,
            kupfer: row.get(offset + 32)?,
            mangan: row.get(offset + 33)?,
            chrom: row.get(offset + 34)?,
            molybdaen: row.get(offset + 35)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// kcal per 100g.
    pub energy: f64,
    pub barcode: Option<String>,
    pub nutrients: Nutrients,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub energy: f64,
    pub barcode: Option<String>,
    #[serde(default)]
    pub nutrients: Nutrients,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsumedEntry {
    pub id: i64,
    /// Snapshot of the product name at logging time.
    pub name: String,
    pub date: String,
    /// Grams consumed.
    pub amount: f64,
    pub product_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewConsumedEntry {
    pub name: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub product_id: i64,
}

/// A consumed entry joined with its product, for display.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumedEntryWithProduct {
    pub id: i64,
    pub name: String,
    pub date: String,
    pub amount: f64,
    pub product_id: i64,
    pub product_name: String,
    pub energy_per_100g: f64,
    /// kcal for this entry's amount.
    pub calories: f64,
    /// Per-100g values of the product, not scaled to the amount.
    pub nutrients: Nutrients,
}

pub fn validate_amount(amount: f64) -> Result<f64> {
    if !amount.is_finite() || amount <= 0.0 {
        bail!("Amount must be a positive number of grams, got {amount}");
    }
    Ok(amount)
}
