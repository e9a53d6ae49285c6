// Data structures for scraped products and persisted snapshots

use chrono::NaiveDateTime;
use std::collections::HashMap;

/// Column headers of the persisted snapshot, in file order.
pub const NAME_COLUMN: &str = "نام محصول";
pub const PRICE_COLUMN: &str = "قیمت";
pub const UPDATED_COLUMN: &str = "تاریخ بروزرسانی";
pub const COLUMNS: [&str; 3] = [NAME_COLUMN, PRICE_COLUMN, UPDATED_COLUMN];

/// Substituted when no title element matches any page template.
pub const TITLE_SENTINEL: &str = "N/A";
/// Substituted when no price element matches, or the price is blank.
pub const PRICE_SENTINEL: &str = "بدون قیمت";

/// Timestamp layout used on disk and in logs.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// One observed product at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub name: String,
    pub price: String, // Raw observed price text, or PRICE_SENTINEL
    pub observed_at: NaiveDateTime,
}

impl ProductRecord {
    pub fn new(
        name: impl Into<String>,
        price: impl Into<String>,
        observed_at: NaiveDateTime,
    ) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
            observed_at,
        }
    }

    pub fn observed_at_text(&self) -> String {
        self.observed_at.format(TIMESTAMP_FORMAT).to_string()
    }

    // Row as written to disk, in COLUMNS order
    pub fn to_row(&self) -> [String; 3] {
        [self.name.clone(), self.price.clone(), self.observed_at_text()]
    }
}

/// Parses a `YYYY-MM-DD HH:MM:SS` timestamp cell.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
}

/// Ordered product table, unique by name when built through `from_batch`.
///
/// Snapshots loaded from disk are kept as-is (`from_rows`) so that a
/// hand-edited file with blank or repeated names can be detected later
/// instead of being silently repaired.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: Vec<ProductRecord>,
}

impl Snapshot {
    /// Builds a snapshot from a batch: one record per distinct name,
    /// positioned at the name's first appearance, carrying the values of
    /// its last appearance.
    pub fn from_batch<I>(batch: I) -> Self
    where
        I: IntoIterator<Item = ProductRecord>,
    {
        let mut position: HashMap<String, usize> = HashMap::new();
        let mut records: Vec<ProductRecord> = Vec::new();

        for record in batch {
            match position.get(&record.name) {
                Some(&idx) => records[idx] = record,
                None => {
                    position.insert(record.name.clone(), records.len());
                    records.push(record);
                }
            }
        }

        Self { records }
    }

    // Rows exactly as read from storage, no deduplication
    pub fn from_rows(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&ProductRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }
}
