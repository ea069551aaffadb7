use std::convert::TryFrom;

use crate::error::ScanError;
use crate::extract::{format_timestamp, ScanRecord};

/// Feature columns of the `parts` table, as `feature_<name>`.
pub const FEATURE_NAMES: [&str; 8] = [
    "bullet",
    "explosion",
    "fire",
    "cold",
    "contact",
    "electric",
    "passthru",
    "ram",
];

/// A record in the exact shape of one `parts` row.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredRow {
    pub timestamp: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub powerscore: Option<i64>,
    pub vehicle_durability: Option<i64>,
    pub durability: Option<i64>,
    pub mass: Option<i64>,
    /// Same order as `FEATURE_NAMES`
    pub features: [Option<i64>; 8],
}

fn to_i64(field: &str, value: Option<u64>) -> Result<Option<i64>, ScanError> {
    value
        .map(|v| {
            i64::try_from(v).map_err(|_| {
                ScanError::Persistence(format!(
                    "{field} value {v} exceeds SQLite INTEGER range"
                ))
            })
        })
        .transpose()
}

impl TryFrom<&ScanRecord> for StoredRow {
    type Error = ScanError;

    /// Features without a column are dropped here.
    fn try_from(record: &ScanRecord) -> Result<Self, Self::Error> {
        let mut features = [None; 8];
        for (slot, name) in features.iter_mut().zip(FEATURE_NAMES) {
            *slot = to_i64(name, record.feature(name))?;
        }

        Ok(Self {
            timestamp: format_timestamp(&record.timestamp),
            name: record.name.clone(),
            category: record.category.clone(),
            powerscore: to_i64("powerscore", record.powerscore)?,
            vehicle_durability: to_i64("vehicle_durability", record.vehicle_durability)?,
            durability: to_i64("durability", record.durability)?,
            mass: to_i64("mass", record.mass)?,
            features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_features_land_in_their_columns() {
        let mut record = ScanRecord::new(Utc::now());
        record.features.insert("cold".into(), 3);
        record.features.insert("ram".into(), 8);
        record.features.insert("plasma".into(), 1);

        let row = StoredRow::try_from(&record).unwrap();
        assert_eq!(row.features[3], Some(3));
        assert_eq!(row.features[7], Some(8));
        assert_eq!(row.features.iter().flatten().count(), 2);
        assert!(row.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_absent_values_stay_null() {
        let row = StoredRow::try_from(&ScanRecord::new(Utc::now())).unwrap();
        assert_eq!(row.powerscore, None);
        assert_eq!(row.name, None);
        assert!(row.features.iter().all(Option::is_none));
    }

    #[test]
    fn test_oversized_value_is_rejected() {
        let mut record = ScanRecord::new(Utc::now());
        record.powerscore = Some(i64::MAX as u64 + 1);
        assert!(matches!(
            StoredRow::try_from(&record),
            Err(ScanError::Persistence(_))
        ));
    }
}
