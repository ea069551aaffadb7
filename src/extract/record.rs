//! Scan records and the partial records parsers produce.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

/// UTC ISO-8601 with a trailing `Z`, e.g. `2024-05-01T12:30:00.123456Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// One scanned part. Fields that could not be read stay `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScanRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub powerscore: Option<u64>,
    pub durability: Option<u64>,
    pub vehicle_durability: Option<u64>,
    pub mass: Option<u64>,
    /// Keyed by icon name (without the `feature_` prefix)
    pub features: BTreeMap<String, u64>,
}

impl ScanRecord {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            name: None,
            category: None,
            powerscore: None,
            durability: None,
            vehicle_durability: None,
            mass: None,
            features: BTreeMap::new(),
        }
    }

    /// Merges a parser result. Only values present in `patch` are written.
    pub fn merge(&mut self, patch: ScanPatch) {
        fn set<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        set(&mut self.name, patch.name);
        set(&mut self.category, patch.category);
        set(&mut self.powerscore, patch.powerscore);
        set(&mut self.durability, patch.durability);
        set(&mut self.vehicle_durability, patch.vehicle_durability);
        set(&mut self.mass, patch.mass);
        self.features.extend(patch.features);
    }

    pub fn feature(&self, name: &str) -> Option<u64> {
        self.features.get(name).copied()
    }
}

/// Numeric fields a parser can target by key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericField {
    Powerscore,
    Durability,
    VehicleDurability,
    Mass,
}

impl NumericField {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "powerscore" => Some(NumericField::Powerscore),
            "durability" => Some(NumericField::Durability),
            "vehicle_durability" => Some(NumericField::VehicleDurability),
            "mass" => Some(NumericField::Mass),
            _ => None,
        }
    }
}

/// Partial record returned by a field parser.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScanPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub powerscore: Option<u64>,
    pub durability: Option<u64>,
    pub vehicle_durability: Option<u64>,
    pub mass: Option<u64>,
    pub features: BTreeMap<String, u64>,
}

impl ScanPatch {
    /// Patch setting a single numeric field.
    pub fn number(field: NumericField, value: Option<u64>) -> Self {
        let mut patch = Self::default();
        match field {
            NumericField::Powerscore => patch.powerscore = value,
            NumericField::Durability => patch.durability = value,
            NumericField::VehicleDurability => patch.vehicle_durability = value,
            NumericField::Mass => patch.mass = value,
        }
        patch
    }
}
