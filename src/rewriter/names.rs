//! Name fuzzing
//!
//! When the user is looking for a person by name, widen each
//! `column LIKE '%name%'` condition to cover common variants of that name.

use super::SqlTransform;
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use tracing::info;

/// Base name and its known variants. Lookup works in both directions.
pub const NAME_VARIATIONS: &[(&str, &[&str])] = &[
    ("john", &["jon", "johnny", "jonathan"]),
    ("bob", &["robert", "rob", "bobby"]),
    ("will", &["william", "bill", "billy"]),
    ("mike", &["michael", "mick", "mikey"]),
    ("jim", &["james", "jimmy", "jamie"]),
    ("dave", &["david", "davey"]),
    ("tom", &["thomas", "tommy"]),
    ("steve", &["steven", "stephen"]),
    ("dan", &["daniel", "danny"]),
    ("alex", &["alexander", "alexandra", "alexis"]),
    ("kate", &["katherine", "catherine", "kathy", "katie"]),
    ("liz", &["elizabeth", "eliza", "beth", "lizzy"]),
    ("jen", &["jennifer", "jenny"]),
    ("chris", &["christopher", "christine"]),
    ("smith", &["smyth"]),
];

lazy_static! {
    static ref NAME_SEARCH_CUE: Regex =
        Regex::new(r"(?i)\b(find|search|show|get)\b.+\b(named|name|called|surname|firstname)\b").unwrap();
    static ref LIKE_CONDITION: Regex =
        Regex::new(r#"(?i)((?:\w+\.)*\w+)\s+LIKE\s+['"]%([^%'"]+)%['"]"#).unwrap();
}

/// Other spellings of `name` (lowercase), excluding `name` itself.
/// Empty when the name belongs to no known cluster.
pub fn variations_of(name: &str) -> Vec<&'static str> {
    for (base, variants) in NAME_VARIATIONS {
        if name == *base {
            return variants.to_vec();
        }
        if variants.contains(&name) {
            let mut out = vec![*base];
            out.extend(variants.iter().copied().filter(|v| *v != name));
            return out;
        }
    }
    Vec::new()
}

pub fn is_name_search(user_query: &str) -> bool {
    NAME_SEARCH_CUE.is_match(user_query)
}

/// One `column LIKE '%value%'` occurrence.
struct LikeCondition<'a> {
    start: usize,
    end: usize,
    column: &'a str,
    value: String,
}

fn like_conditions(sql: &str) -> Vec<LikeCondition<'_>> {
    LIKE_CONDITION
        .captures_iter(sql)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(LikeCondition {
                start: whole.start(),
                end: whole.end(),
                column: caps.get(1)?.as_str(),
                value: caps.get(2)?.as_str().to_lowercase(),
            })
        })
        .collect()
}

/// If `conditions[0]` opens a parenthesized OR group over one column whose
/// values are exactly one name cluster, the number of conditions in it.
fn expanded_group_len(sql: &str, conditions: &[LikeCondition<'_>]) -> Option<usize> {
    let first = conditions.first()?;
    if !sql[..first.start].trim_end().ends_with('(') {
        return None;
    }

    let variations = variations_of(&first.value);
    if variations.is_empty() {
        return None;
    }
    let cluster: BTreeSet<&str> = std::iter::once(first.value.as_str())
        .chain(variations)
        .collect();

    let mut len = 1;
    while let Some(next) = conditions.get(len) {
        let joiner = sql[conditions[len - 1].end..next.start].trim();
        if !joiner.eq_ignore_ascii_case("OR") || next.column != first.column {
            break;
        }
        len += 1;
    }

    let last = &conditions[len - 1];
    if !sql[last.end..].trim_start().starts_with(')') {
        return None;
    }
    let values: BTreeSet<&str> = conditions[..len].iter().map(|c| c.value.as_str()).collect();
    (len == cluster.len() && values == cluster).then_some(len)
}

pub struct NameFuzzing;

impl SqlTransform for NameFuzzing {
    fn name(&self) -> &'static str {
        "name_fuzzing"
    }

    fn apply(&self, sql: &str, user_query: &str) -> Result<String> {
        if !is_name_search(user_query) {
            return Ok(sql.to_string());
        }

        let conditions = like_conditions(sql);
        let mut out = String::with_capacity(sql.len());
        let mut cursor = 0;
        let mut i = 0;

        while i < conditions.len() {
            if let Some(len) = expanded_group_len(sql, &conditions[i..]) {
                i += len;
                continue;
            }

            let condition = &conditions[i];
            i += 1;

            let variations = variations_of(&condition.value);
            if variations.is_empty() {
                continue;
            }

            let branches: Vec<String> = std::iter::once(condition.value.as_str())
                .chain(variations.iter().copied())
                .map(|name| format!("{} LIKE '%{}%'", condition.column, name))
                .collect();
            let replacement = format!("({})", branches.join(" OR "));

            info!(original = %condition.value, ?variations, enhanced = %replacement, "Enhanced name search with variations");

            out.push_str(&sql[cursor..condition.start]);
            out.push_str(&replacement);
            cursor = condition.end;
        }

        out.push_str(&sql[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fuzz(sql: &str, query: &str) -> String {
        NameFuzzing.apply(sql, query).unwrap()
    }

    #[test]
    fn test_expands_base_name() {
        let out = fuzz(
            "SELECT * FROM dbo.Candidates WHERE FirstName LIKE '%john%'",
            "find candidates named John",
        );
        assert_eq!(
            out,
            "SELECT * FROM dbo.Candidates WHERE (FirstName LIKE '%john%' OR FirstName LIKE '%jon%' \
             OR FirstName LIKE '%johnny%' OR FirstName LIKE '%jonathan%')"
        );
    }

    #[test]
    fn test_expands_variant_to_base_and_siblings() {
        assert_eq!(variations_of("bill"), vec!["will", "william", "billy"]);
        let out = fuzz(
            "SELECT Id FROM dbo.Candidates WHERE c.FirstName LIKE '%Bill%'",
            "show me people called bill",
        );
        assert_eq!(
            out,
            "SELECT Id FROM dbo.Candidates WHERE (c.FirstName LIKE '%bill%' OR c.FirstName LIKE '%will%' \
             OR c.FirstName LIKE '%william%' OR c.FirstName LIKE '%billy%')"
        );
    }

    #[test]
    fn test_requires_name_search_cue() {
        let sql = "SELECT * FROM dbo.Candidates WHERE FirstName LIKE '%john%'";
        assert_eq!(fuzz(sql, "candidates like john"), sql);
    }

    #[test]
    fn test_unknown_names_untouched() {
        let sql = "SELECT * FROM dbo.Candidates WHERE Surname LIKE '%okafor%'";
        assert_eq!(fuzz(sql, "find surname okafor"), sql);
        assert!(variations_of("okafor").is_empty());
    }

    #[test]
    fn test_multiple_conditions() {
        let out = fuzz(
            "SELECT * FROM dbo.Candidates WHERE FirstName LIKE '%tom%' AND Surname LIKE '%smith%'",
            "find candidates named tom smith",
        );
        assert_eq!(
            out,
            "SELECT * FROM dbo.Candidates WHERE (FirstName LIKE '%tom%' OR FirstName LIKE '%thomas%' \
             OR FirstName LIKE '%tommy%') AND (Surname LIKE '%smith%' OR Surname LIKE '%smyth%')"
        );
    }

    #[test]
    fn test_previous_expansion_left_alone() {
        let sql = "SELECT * FROM dbo.Candidates WHERE (FirstName LIKE '%john%' OR FirstName LIKE '%jon%' \
                   OR FirstName LIKE '%johnny%' OR FirstName LIKE '%jonathan%') AND Surname LIKE '%okafor%'";
        assert_eq!(fuzz(sql, "find candidates named john"), sql);

        // Same cluster reached from a variant, in a different order.
        let sql = "SELECT * FROM dbo.Candidates WHERE (FirstName LIKE '%bill%' OR FirstName LIKE '%will%' \
                   OR FirstName LIKE '%william%' OR FirstName LIKE '%billy%')";
        assert_eq!(fuzz(sql, "find candidates named bill"), sql);
    }

    #[test]
    fn test_user_written_disjunction_is_expanded() {
        let out = fuzz(
            "SELECT * FROM dbo.Candidates WHERE FirstName LIKE '%john%' OR Surname LIKE '%smith%'",
            "find candidates named john or smith",
        );
        assert_eq!(
            out,
            "SELECT * FROM dbo.Candidates WHERE (FirstName LIKE '%john%' OR FirstName LIKE '%jon%' \
             OR FirstName LIKE '%johnny%' OR FirstName LIKE '%jonathan%') \
             OR (Surname LIKE '%smith%' OR Surname LIKE '%smyth%')"
        );
        assert_eq!(fuzz(&out, "find candidates named john or smith"), out);
    }

    #[test]
    fn test_partial_cluster_group_is_expanded() {
        let out = fuzz(
            "SELECT * FROM dbo.Candidates WHERE (FirstName LIKE '%tom%' OR FirstName LIKE '%thomas%')",
            "find candidates named tom",
        );
        assert_eq!(
            out,
            "SELECT * FROM dbo.Candidates WHERE ((FirstName LIKE '%tom%' OR FirstName LIKE '%thomas%' \
             OR FirstName LIKE '%tommy%') OR (FirstName LIKE '%thomas%' OR FirstName LIKE '%tom%' \
             OR FirstName LIKE '%tommy%'))"
        );
    }
}
