//! Result Enricher
//!
//! Adds human-readable labels next to coded columns in a result set. For a
//! row `{ "TimesheetId": 7, "StatusId": 5 }` from the Timesheets entity the
//! enriched row gains `"Status": "Submitted"`; existing fields are never
//! touched.
//!
//! The entity is guessed from column names, which is fragile. Callers that
//! know the entity should use [`ResultEnricher::enrich_as`].

use crate::enum_cache::EnumCache;
use crate::error::Result;
use crate::execution::Row;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Anything that can turn a coded value into a label.
#[async_trait]
pub trait LabelSource: Send + Sync {
    async fn label(&self, entity: &str, field: &str, value: i64) -> Result<Option<String>>;
}

#[async_trait]
impl LabelSource for EnumCache {
    async fn label(&self, entity: &str, field: &str, value: i64) -> Result<Option<String>> {
        Ok(self.get_display_label(entity, field, value).await)
    }
}

lazy_static! {
    static ref LEADING_WORD: Regex = Regex::new(r"^[A-Z][a-z]+").unwrap();
}

/// Guess the (plural) entity name from a result set's column names.
///
/// The first column that yields a leading capitalized word wins, after any
/// trailing `Id` is dropped: `TimesheetId` → `Timesheets`,
/// `BookingStartDate` → `Bookings`. A bare `Id` column is skipped.
pub fn infer_entity<'a, I>(columns: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    columns.into_iter().find_map(|column| {
        let stem = column.strip_suffix("Id").unwrap_or(column);
        LEADING_WORD
            .find(stem)
            .map(|word| format!("{}s", word.as_str()))
    })
}

/// Name of the label column added for a coded column, if it qualifies.
pub fn label_field_name(field: &str) -> Option<&str> {
    field.strip_suffix("Id").filter(|stem| !stem.is_empty())
}

pub struct ResultEnricher {
    labels: Arc<dyn LabelSource>,
}

impl ResultEnricher {
    pub fn new(labels: Arc<dyn LabelSource>) -> Self {
        Self { labels }
    }

    /// Enrich rows using an inferred entity. Any failure returns the input unchanged.
    pub async fn enrich(&self, rows: Vec<Row>) -> Vec<Row> {
        let entity = rows
            .first()
            .and_then(|row| infer_entity(row.keys().map(String::as_str)));
        match entity {
            Some(entity) => self.enrich_as(&entity, rows).await,
            None => rows,
        }
    }

    /// Enrich rows for a known entity. Any failure returns the input unchanged.
    pub async fn enrich_as(&self, entity: &str, rows: Vec<Row>) -> Vec<Row> {
        match self.try_enrich(entity, &rows).await {
            Ok(enriched) => enriched,
            Err(e) => {
                warn!(entity, error = %e, "Result enrichment failed, returning raw rows");
                rows
            }
        }
    }

    pub async fn try_enrich(&self, entity: &str, rows: &[Row]) -> Result<Vec<Row>> {
        let mut enriched = Vec::with_capacity(rows.len());
        let mut added = 0usize;

        for row in rows {
            let mut out = row.clone();
            for (field, value) in row {
                let Some(label_field) = label_field_name(field) else {
                    continue;
                };
                if row.contains_key(label_field) {
                    continue;
                }
                let Some(code) = value.as_i64() else {
                    continue;
                };
                if let Some(label) = self.labels.label(entity, field, code).await? {
                    out.insert(label_field.to_string(), serde_json::Value::String(label));
                    added += 1;
                }
            }
            enriched.push(out);
        }

        debug!(entity, rows = rows.len(), labels = added, "Enriched result rows");
        Ok(enriched)
    }
}
