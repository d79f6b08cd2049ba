use crate::error::{ModelError, Result};
use crate::schema::{Amount, StatementSection, StatementsByYear};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CALCULATED_PREFIX: &str = "CALCULATED";

/// Builds the opaque keys adjustments are stored under.
pub struct AdjustmentKey;

impl AdjustmentKey {
    /// `{section}_{label}_{year}`, e.g. `bs_Inventories_2023`.
    pub fn raw(section: StatementSection, label: &str, year: i32) -> String {
        format!("{}_{}_{}", section.code(), label, year)
    }

    /// `CALCULATED_{label}_{year}`, e.g. `CALCULATED_Net Income_2023`.
    pub fn calculated(row_id: &str, year: i32) -> String {
        format!("{}_{}_{}", CALCULATED_PREFIX, row_id, year)
    }
}

/// A user-authored override for a single cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Adjustment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Replacement value for the cell. Absent means no numeric override.")]
    pub value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Free-text note. Never affects numbers.")]
    pub comment: Option<String>,
}

impl Adjustment {
    pub fn value(value: f64) -> Self {
        Self {
            value: Some(value),
            comment: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.comment.is_none()
    }
}

/// A partial change to one stored adjustment.
///
/// A field left as `None` keeps what is stored; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdjustmentUpdate {
    pub value: Option<Option<f64>>,
    pub comment: Option<Option<String>>,
}

impl AdjustmentUpdate {
    pub fn value(value: Option<f64>) -> Self {
        Self {
            value: Some(value),
            comment: None,
        }
    }

    pub fn comment(comment: Option<String>) -> Self {
        Self {
            value: None,
            comment: Some(comment),
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = Some(comment);
        self
    }

    /// Clears both fields, which removes the key.
    pub fn clear() -> Self {
        Self::value(None).with_comment(None)
    }
}

/// Keyed store of adjustments. Serializes as a flat `{key: {value, comment}}` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AdjustmentStore {
    entries: BTreeMap<String, Adjustment>,
}

impl AdjustmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Adjustment> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Adjustment)> {
        self.entries.iter()
    }

    /// Stores an adjustment, dropping the key entirely if it carries neither value nor comment.
    pub fn insert(&mut self, key: impl Into<String>, adjustment: Adjustment) {
        let key = key.into();
        if adjustment.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, adjustment);
        }
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: Option<f64>) {
        let key = key.into();
        let mut adjustment = self.entries.get(&key).cloned().unwrap_or_default();
        adjustment.value = value;
        self.insert(key, adjustment);
    }

    pub fn set_comment(&mut self, key: impl Into<String>, comment: Option<String>) {
        let key = key.into();
        let mut adjustment = self.entries.get(&key).cloned().unwrap_or_default();
        adjustment.comment = comment.filter(|c| !c.trim().is_empty());
        self.insert(key, adjustment);
    }

    pub fn update(&mut self, key: impl Into<String>, update: AdjustmentUpdate) {
        let key = key.into();
        let mut adjustment = self.entries.get(&key).cloned().unwrap_or_default();
        if let Some(value) = update.value {
            adjustment.value = value;
        }
        if let Some(comment) = update.comment {
            adjustment.comment = comment.filter(|c| !c.trim().is_empty());
        }
        self.insert(key, adjustment);
    }

    pub fn clear(&mut self, key: &str) -> Option<Adjustment> {
        self.entries.remove(key)
    }

    /// Returns the override for `key` when one carries a value, otherwise `value` unchanged.
    pub fn apply(&self, value: f64, key: &str) -> f64 {
        self.entries
            .get(key)
            .and_then(|a| a.value)
            .unwrap_or(value)
    }

    /// Rejects values no consolidation could render (NaN, infinities).
    pub fn validate(&self) -> Result<()> {
        for (key, adjustment) in &self.entries {
            if let Some(v) = adjustment.value {
                if !v.is_finite() {
                    return Err(ModelError::InvalidAdjustment {
                        key: key.clone(),
                        details: format!("value {} is not a finite number", v),
                    });
                }
            }
        }
        Ok(())
    }

    /// First overlay pass: returns a copy of the statements with every raw override applied.
    ///
    /// The input is left untouched. A label that occurs more than once in a section shares one
    /// key, so an override replaces every occurrence.
    pub fn apply_to_statements(&self, statements: &StatementsByYear) -> StatementsByYear {
        let mut adjusted = statements.clone();
        if self.is_empty() {
            return adjusted;
        }

        for (year, year_statements) in adjusted.iter_mut() {
            for section in StatementSection::ALL {
                for item in year_statements.section_mut(section).iter_mut() {
                    let key = AdjustmentKey::raw(section, &item.label, *year);
                    if let Some(value) = self.get(&key).and_then(|a| a.value) {
                        item.value = Amount::Number(value);
                    }
                }
            }
        }

        adjusted
    }
}

impl FromIterator<(String, Adjustment)> for AdjustmentStore {
    fn from_iter<I: IntoIterator<Item = (String, Adjustment)>>(iter: I) -> Self {
        let mut store = AdjustmentStore::new();
        for (key, adjustment) in iter {
            store.insert(key, adjustment);
        }
        store
    }
}
