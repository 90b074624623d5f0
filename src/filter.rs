use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};

/// Request input handed to filters, keyed by parameter name.
pub type FilterInput = Map<String, Value>;

/// A reusable query filter.
///
/// Filters receive a query builder, the shared [`WhereClause`] state and the
/// request input, append whatever conditions the input calls for, and hand
/// the builder back.
pub trait QueryFilter: Send + Sync {
    fn handle<'a>(
        &self,
        builder: QueryBuilder<'a, Postgres>,
        clause: &mut WhereClause,
        input: &FilterInput,
    ) -> QueryBuilder<'a, Postgres>;
}

/// Threads `builder` through `filters` in order.
///
/// `clause` describes the base query: [`WhereClause::new`] when it has no
/// top-level `WHERE` yet, [`WhereClause::continuing`] when it does. The same
/// state is shared by every filter, so only the first condition gets `WHERE`.
pub fn apply_filters<'a>(
    builder: QueryBuilder<'a, Postgres>,
    mut clause: WhereClause,
    filters: &[&dyn QueryFilter],
    input: &FilterInput,
) -> QueryBuilder<'a, Postgres> {
    filters
        .iter()
        .fold(builder, |builder, filter| filter.handle(builder, &mut clause, input))
}

/// Joins successive conditions with `WHERE` and then `AND`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WhereClause {
    has_where: bool,
}

impl WhereClause {
    /// State for a base query without a top-level `WHERE`.
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a base query that already ends in a `WHERE` condition.
    pub fn continuing() -> Self {
        Self { has_where: true }
    }

    pub fn has_where(&self) -> bool {
        self.has_where
    }

    /// Pushes the right joiner for the next condition.
    pub fn push_joiner(&mut self, builder: &mut QueryBuilder<'_, Postgres>) {
        if self.has_where {
            builder.push(" AND ");
        } else {
            builder.push(" WHERE ");
            self.has_where = true;
        }
    }
}

/// Equality filter binding `input[param]` against `column` when present.
///
/// String, number and bool inputs are bound as text; null, empty and
/// missing inputs are skipped.
#[derive(Debug, Clone)]
pub struct EqualsFilter {
    column: String,
    param: String,
}

impl EqualsFilter {
    pub fn new(column: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            param: param.into(),
        }
    }
}

impl QueryFilter for EqualsFilter {
    fn handle<'a>(
        &self,
        mut builder: QueryBuilder<'a, Postgres>,
        clause: &mut WhereClause,
        input: &FilterInput,
    ) -> QueryBuilder<'a, Postgres> {
        let value = match input.get(&self.param) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => return builder,
        };

        clause.push_joiner(&mut builder);
        builder.push(&self.column);
        builder.push("::text = ");
        builder.push_bind(value);
        builder
    }
}
