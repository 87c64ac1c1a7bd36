// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query descriptors: the immutable parameters of a repeatable read.
//!
//! Filters are held in a `BTreeSet`, so the order in which a caller adds them
//! never affects descriptor equality or hashing.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::types::EntityKind;
use crate::value::{Fields, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterOp {
    Eq,
    Ne,
    Gte,
    Lte,
    /// List field contains the value.
    Contains,
    /// Field value is one of the listed values.
    In,
    /// Case-insensitive substring match on text.
    TextSearch,
}

/// A single predicate on one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Gte, value)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Contains, value)
    }

    pub fn one_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOp::In, Value::List(values))
    }

    pub fn text_search(field: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::new(field, FilterOp::TextSearch, Value::Text(needle.into()))
    }

    /// Evaluate against a field map. A missing field reads as `Null`.
    pub fn matches(&self, fields: &Fields) -> bool {
        let actual = fields.get(&self.field).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => *actual == self.value,
            FilterOp::Ne => *actual != self.value,
            FilterOp::Gte => same_variant(actual, &self.value) && *actual >= self.value,
            FilterOp::Lte => same_variant(actual, &self.value) && *actual <= self.value,
            FilterOp::Contains => actual
                .as_list()
                .is_some_and(|items| items.contains(&self.value)),
            FilterOp::In => self
                .value
                .as_list()
                .is_some_and(|items| items.contains(actual)),
            FilterOp::TextSearch => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                _ => false,
            },
        }
    }
}

fn same_variant(a: &Value, b: &Value) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    pub fn compare(&self, a: &Fields, b: &Fields) -> Ordering {
        let left = a.get(&self.field).unwrap_or(&Value::Null);
        let right = b.get(&self.field).unwrap_or(&Value::Null);
        match self.direction {
            SortDirection::Asc => left.cmp(right),
            SortDirection::Desc => right.cmp(left),
        }
    }
}

/// Kind + filters + sort + limit. Equal descriptors resolve to the same
/// cached result until invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryDescriptor {
    pub kind: EntityKind,
    pub filters: BTreeSet<Filter>,
    pub sort: Option<SortKey>,
    pub limit: Option<usize>,
}

impl QueryDescriptor {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            filters: BTreeSet::new(),
            sort: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.insert(filter);
        self
    }

    pub fn sort(mut self, sort: SortKey) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }

    /// Filter, stable-sort, and truncate a set of rows. Used by platforms
    /// that evaluate descriptors in process.
    pub fn apply<T, F>(&self, rows: impl IntoIterator<Item = T>, fields_of: F) -> Vec<T>
    where
        F: Fn(&T) -> &Fields,
    {
        let mut out: Vec<T> = rows
            .into_iter()
            .filter(|row| self.matches(fields_of(row)))
            .collect();
        if let Some(sort) = &self.sort {
            out.sort_by(|a, b| sort.compare(fields_of(a), fields_of(b)));
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.filters.is_empty() {
            let parts: Vec<String> = self
                .filters
                .iter()
                .map(|flt| format!("{} {:?} {:?}", flt.field, flt.op, flt.value))
                .collect();
            write!(f, " where {}", parts.join(" and "))?;
        }
        if let Some(sort) = &self.sort {
            write!(f, " order by {} {:?}", sort.field, sort.direction)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }
        Ok(())
    }
}
