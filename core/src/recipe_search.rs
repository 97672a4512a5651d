//! Recipe search query language.
//!
//! A query is a comma-separated list of criteria, all of which must match:
//!
//! ```text
//! title:poulet,category:Vegetarian,area:French,calories<700,calories>200
//! ```
//!
//! `title:` is a case-insensitive substring match, `category:` and `area:`
//! are exact matches, and the calorie bounds are strict. Unknown tokens are
//! skipped so clients can send criteria this version does not understand.

use rusqlite::types::Value;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    TitleContains(String),
    CategoryIs(String),
    AreaIs(String),
    CaloriesBelow(i64),
    CaloriesAbove(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub criteria: Vec<Criterion>,
}

impl RecipeFilter {
    pub fn parse(query: &str) -> Result<Self> {
        let mut criteria = Vec::new();
        for token in query.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(value) = token.strip_prefix("title:") {
                criteria.push(Criterion::TitleContains(value.to_string()));
            } else if let Some(value) = token.strip_prefix("category:") {
                criteria.push(Criterion::CategoryIs(value.to_string()));
            } else if let Some(value) = token.strip_prefix("area:") {
                criteria.push(Criterion::AreaIs(value.to_string()));
            } else if let Some(value) = token.strip_prefix("calories<") {
                criteria.push(Criterion::CaloriesBelow(parse_bound(token, value)?));
            } else if let Some(value) = token.strip_prefix("calories>") {
                criteria.push(Criterion::CaloriesAbove(parse_bound(token, value)?));
            } else {
                tracing::debug!(token, "ignoring unknown recipe search token");
            }
        }
        Ok(Self { criteria })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Render as a `WHERE` clause (empty when there is nothing to filter)
    /// plus its positional parameters.
    pub(crate) fn to_sql(&self) -> (String, Vec<Value>) {
        let mut clauses = Vec::with_capacity(self.criteria.len());
        let mut values = Vec::with_capacity(self.criteria.len());
        for criterion in &self.criteria {
            let n = values.len() + 1;
            match criterion {
                Criterion::TitleContains(text) => {
                    clauses.push(format!("title_folded LIKE ?{n} ESCAPE '\\'"));
                    values.push(Value::Text(format!("%{}%", escape_like(&fold(text)))));
                }
                Criterion::CategoryIs(category) => {
                    clauses.push(format!("category = ?{n}"));
                    values.push(Value::Text(category.clone()));
                }
                Criterion::AreaIs(area) => {
                    clauses.push(format!("area = ?{n}"));
                    values.push(Value::Text(area.clone()));
                }
                Criterion::CaloriesBelow(limit) => {
                    clauses.push(format!("calories < ?{n}"));
                    values.push(Value::Integer(*limit));
                }
                Criterion::CaloriesAbove(limit) => {
                    clauses.push(format!("calories > ?{n}"));
                    values.push(Value::Integer(*limit));
                }
            }
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }
}

fn parse_bound(token: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::invalid(format!("Invalid calorie bound in '{token}'")))
}

/// Lower-case form used for title matching. SQLite's own `LIKE` and
/// `lower()` only fold ASCII, so titles are folded here and stored
/// alongside the original.
pub(crate) fn fold(text: &str) -> String {
    text.to_lowercase()
}

fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
