//! Status Term Recognizer
//!
//! Maps status phrases in a natural-language query ("submitted", "on hold",
//! "offer made") to coded-value predicates for the entity they describe. The
//! output is context for the SQL converter; nothing here touches SQL text.
//!
//! Timesheets are the primary entity family and match on the phrase alone.
//! Every other family only matches when its entity keyword sits within a few
//! characters of the phrase, so "active bookings for archived clients" does
//! not mark bookings as archived.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Coded value(s) a phrase stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Single(i32),
    /// Deliberately ambiguous phrase covering several states.
    AnyOf(&'static [i32]),
}

impl StatusCode {
    /// SQL predicate over `field` for this code.
    pub fn condition(&self, field: &str) -> String {
        match self {
            StatusCode::Single(value) => format!("{} = {}", field, value),
            StatusCode::AnyOf(values) => {
                let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("{} IN ({})", field, list.join(", "))
            }
        }
    }
}

/// Keyword proximity required before a phrase counts for a family.
#[derive(Debug, Clone, Copy)]
pub struct Proximity {
    pub keywords: &'static [&'static str],
    pub window: usize,
}

/// One entity family's phrase table.
#[derive(Debug)]
pub struct StatusTermMap {
    pub entity: &'static str,
    pub field: &'static str,
    pub terms: &'static [(&'static str, StatusCode)],
    pub proximity: Option<Proximity>,
}

use StatusCode::{AnyOf, Single};

pub static TIMESHEET_STATUS_TERMS: StatusTermMap = StatusTermMap {
    entity: "Timesheets",
    field: "StatusId",
    terms: &[
        ("incomplete", Single(1)),
        ("partially complete", Single(2)),
        ("partially incomplete", Single(2)),
        ("complete", Single(3)),
        ("approved", Single(4)),
        ("submitted", Single(5)),
        ("processed", Single(5)),
        ("rejected", Single(6)),
        ("waiting for adjust approval", Single(7)),
        ("awaiting adjust approval", Single(7)),
        ("awaiting pacs processing", Single(8)),
        ("awaiting pacs", Single(8)),
        ("template payroll timesheets", Single(10)),
        ("template", Single(10)),
        ("payroll template", Single(10)),
        ("candidate sds notification awaiting review", Single(11)),
        ("awaiting sds", Single(11)),
        ("awaiting ir35", Single(11)),
        ("awaiting review", Single(11)),
        ("sent for authorization", Single(12)),
        ("sent for approval", Single(12)),
        ("awaiting approval", AnyOf(&[1, 2, 3, 6])),
    ],
    proximity: None,
};

pub static BOOKING_STATUS_TERMS: StatusTermMap = StatusTermMap {
    entity: "Bookings",
    field: "WorkStatusId",
    terms: &[
        ("inactive", Single(1)),
        ("active", Single(2)),
        ("archived", Single(3)),
        ("on hold", Single(4)),
    ],
    proximity: Some(Proximity {
        keywords: &["booking", "bookings"],
        window: 20,
    }),
};

pub static CLIENT_STATUS_TERMS: StatusTermMap = StatusTermMap {
    entity: "Clients",
    field: "ClientStatusId",
    terms: &[
        ("inactive", Single(1)),
        ("active", Single(2)),
        ("archived", Single(3)),
        ("on hold", Single(4)),
    ],
    proximity: Some(Proximity {
        keywords: &["client", "clients"],
        window: 20,
    }),
};

pub static REQUIREMENT_CV_STATUS_TERMS: StatusTermMap = StatusTermMap {
    entity: "Requirements",
    field: "CVWorkflowStatusId",
    terms: &[
        ("shortlisted", Single(1)),
        ("cv shortlisted", Single(1)),
        ("reviewing", Single(3)),
        ("client reviewing", Single(3)),
        ("interview requested", Single(4)),
        ("interview arranged", Single(5)),
        ("considering", Single(6)),
        ("candidate considering", Single(6)),
        ("interview conducted", Single(6)),
        ("offer made", Single(7)),
        ("offer accepted", Single(8)),
        ("successful", Single(8)),
        ("rejected", Single(9)),
        ("filled", Single(10)),
        ("no show", Single(11)),
        ("unsuccessful", Single(12)),
    ],
    proximity: Some(Proximity {
        keywords: &["requirement", "requirements", "cv"],
        window: 25,
    }),
};

pub static STATUS_TERM_MAPS: [&StatusTermMap; 4] = [
    &TIMESHEET_STATUS_TERMS,
    &BOOKING_STATUS_TERMS,
    &CLIENT_STATUS_TERMS,
    &REQUIREMENT_CV_STATUS_TERMS,
];

lazy_static! {
    /// Per family, per term: the proximity pattern (None for the primary family).
    static ref PROXIMITY_PATTERNS: Vec<Vec<Option<Regex>>> = STATUS_TERM_MAPS
        .iter()
        .map(|map| {
            map.terms
                .iter()
                .map(|(term, _)| map.proximity.map(|p| proximity_pattern(term, &p)))
                .collect()
        })
        .collect();
}

fn proximity_pattern(term: &str, proximity: &Proximity) -> Regex {
    let keywords = proximity.keywords.join("|");
    let term = regex::escape(term);
    let pattern = format!(
        "(?i)(?:{kw}).{{0,{w}}}{term}|{term}.{{0,{w}}}(?:{kw})",
        kw = keywords,
        w = proximity.window,
        term = term
    );
    Regex::new(&pattern).expect("status term patterns are built from static tables")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognizedStatusTerm {
    pub entity: String,
    pub field: String,
    pub sql_condition: String,
    pub original_term: String,
}

/// Every status phrase found in `query`, across all entity families.
pub fn recognize(query: &str) -> Vec<RecognizedStatusTerm> {
    let lower = query.to_lowercase();
    let mut recognized = Vec::new();

    for (map, patterns) in STATUS_TERM_MAPS.iter().zip(PROXIMITY_PATTERNS.iter()) {
        for ((term, code), pattern) in map.terms.iter().zip(patterns) {
            let hit = match pattern {
                Some(re) => re.is_match(&lower),
                None => lower.contains(term),
            };
            if hit {
                recognized.push(RecognizedStatusTerm {
                    entity: map.entity.to_string(),
                    field: map.field.to_string(),
                    sql_condition: code.condition(map.field),
                    original_term: term.to_string(),
                });
            }
        }
    }

    if !recognized.is_empty() {
        info!(query, count = recognized.len(), "Recognized status terms");
    }

    recognized
}

/// Converter prompt context describing the recognized status terms, if any.
pub fn status_context(query: &str) -> Option<String> {
    let recognized = recognize(query);
    if recognized.is_empty() {
        return None;
    }

    let mut context = String::from("The following status terms were detected in the query:\n\n");
    for status in &recognized {
        context.push_str(&format!(
            "- Term \"{}\" maps to {}.{} with condition: {}\n",
            status.original_term, status.entity, status.field, status.sql_condition
        ));
    }
    context.push_str("\nUse these mappings so the SQL uses the correct status values.");
    Some(context)
}
