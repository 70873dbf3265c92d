//! Configured find/replace rules applied to source values.
//!
//! Per-column rules run first and only touch the value under the matching
//! header. Global rules then run over every value in the row, including
//! values beyond the header width. Within each list, rules apply in order and
//! each sees the output of the previous one.

use std::{borrow::Cow, collections::BTreeMap};

use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, RawRow},
    error::{ImportError, Result},
    transform::string_ops::replace_literal,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValueReplacement {
    pub from: String,
    pub to: String,
}

impl ValueReplacement {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TextAlterations {
    global: Vec<ValueReplacement>,
    per_column: BTreeMap<String, Vec<ValueReplacement>>,
}

impl TextAlterations {
    /// Rejects rules with an empty search string.
    pub fn new(
        global: Vec<ValueReplacement>,
        per_column: BTreeMap<String, Vec<ValueReplacement>>,
    ) -> Result<Self> {
        if global.iter().any(|rule| rule.from.is_empty()) {
            return Err(ImportError::Config(
                "global text alteration has an empty search string".to_string(),
            ));
        }
        for (column, rules) in &per_column {
            if rules.iter().any(|rule| rule.from.is_empty()) {
                return Err(ImportError::Config(format!(
                    "text alteration for column '{column}' has an empty search string"
                )));
            }
        }
        Ok(Self { global, per_column })
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.per_column.values().all(Vec::is_empty)
    }

    pub fn rule_count(&self) -> usize {
        self.global.len() + self.per_column.values().map(Vec::len).sum::<usize>()
    }

    pub fn apply(&self, headers: &[String], mut row: RawRow) -> RawRow {
        if self.is_empty() {
            return row;
        }
        for (cell, header) in row.iter_mut().zip(headers) {
            if let Some(rules) = self.per_column.get(header) {
                apply_rules(cell, rules);
            }
        }
        if !self.global.is_empty() {
            for cell in row.iter_mut() {
                apply_rules(cell, &self.global);
            }
        }
        row
    }
}

fn apply_rules(cell: &mut Cell, rules: &[ValueReplacement]) {
    if rules.is_empty() || matches!(cell, Cell::Empty) {
        return;
    }
    let original = cell.as_display();
    let mut current = original.clone();
    for rule in rules {
        let replaced = match replace_literal(&current, &rule.from, &rule.to) {
            Cow::Owned(replaced) => replaced,
            Cow::Borrowed(_) => continue,
        };
        current = replaced;
    }
    if current != original {
        *cell = Cell::text(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn row(values: &[&str]) -> RawRow {
        values.iter().map(|value| Cell::text(*value)).collect()
    }

    #[test]
    fn per_column_rules_chain_in_order() {
        let mut per_column = BTreeMap::new();
        per_column.insert(
            "status".to_string(),
            vec![
                ValueReplacement::new("open", "pending"),
                ValueReplacement::new("pending", "queued"),
            ],
        );
        let alterations = TextAlterations::new(Vec::new(), per_column).unwrap();
        let result = alterations.apply(&headers(&["id", "status"]), row(&["open", "open"]));
        assert_eq!(result, row(&["open", "queued"]));
    }

    #[test]
    fn global_rules_run_after_per_column_and_cover_extra_values() {
        let mut per_column = BTreeMap::new();
        per_column.insert("a".to_string(), vec![ValueReplacement::new("x", "y")]);
        let global = vec![ValueReplacement::new("y", "z")];
        let alterations = TextAlterations::new(global, per_column).unwrap();
        let result = alterations.apply(&headers(&["a", "b"]), row(&["x", "y", "yy"]));
        assert_eq!(result, row(&["z", "z", "zz"]));
    }

    #[test]
    fn numeric_cells_become_text_only_when_altered() {
        let global = vec![ValueReplacement::new("99", "")];
        let alterations = TextAlterations::new(global, BTreeMap::new()).unwrap();
        let result = alterations.apply(
            &headers(&["a", "b"]),
            vec![Cell::Number(12.0), Cell::Number(99.0)],
        );
        assert_eq!(result, vec![Cell::Number(12.0), Cell::Empty]);
    }

    #[test]
    fn empty_search_string_is_rejected() {
        let err = TextAlterations::new(vec![ValueReplacement::new("", "x")], BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, ImportError::Config(_)));
    }

    #[test]
    fn empty_rule_set_is_identity() {
        let alterations = TextAlterations::default();
        let input = vec![Cell::text("a"), Cell::Number(2.5), Cell::Empty];
        assert_eq!(alterations.apply(&headers(&["x"]), input.clone()), input);
    }
}
