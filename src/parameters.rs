//! Positional placeholder handling (`@p0`, `@p1`, ...).

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"@p(\d+)\b").unwrap();
}

/// Number of positional parameters `sql` needs: the highest index plus one.
pub fn count_placeholders(sql: &str) -> usize {
    PLACEHOLDER
        .captures_iter(sql)
        .filter_map(|caps| caps[1].parse::<usize>().ok())
        .map(|index| index + 1)
        .max()
        .unwrap_or(0)
}

/// Replace every placeholder with an empty string literal.
pub fn strip_placeholders(sql: &str) -> String {
    PLACEHOLDER.replace_all(sql, "''").into_owned()
}

/// Outcome of comparing placeholders against supplied parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Sufficient,
    Insufficient { expected: usize, supplied: usize },
}

pub fn reconcile(sql: &str, supplied: usize) -> Reconciliation {
    let expected = count_placeholders(sql);
    if expected > supplied {
        Reconciliation::Insufficient { expected, supplied }
    } else {
        Reconciliation::Sufficient
    }
}
