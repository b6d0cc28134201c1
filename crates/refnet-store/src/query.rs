//! Collections, filters and the query builder.
//!
//! A [`Query`] describes one read (or the row set an update applies to):
//! a collection, a column projection, equality/range predicates, an
//! optional ordering and an optional limit. [`Query::to_params`] renders it
//! as PostgREST query parameters.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Named collections of the remote store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Profiles,
    PoolProgress,
    ReferralBonuses,
    Withdrawals,
    Deposits,
    FundWalletTransactions,
    P2pTransfers,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::PoolProgress => "pool_progress",
            Self::ReferralBonuses => "referral_bonuses",
            Self::Withdrawals => "withdrawals",
            Self::Deposits => "deposits",
            Self::FundWalletTransactions => "fund_wallet_transactions",
            Self::P2pTransfers => "p2p_transfers",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar a filter compares against.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
}

impl FilterValue {
    /// Compare a JSON cell against this value.
    ///
    /// Returns `None` when the two are not comparable (type mismatch, null).
    pub fn compare(&self, cell: &Value) -> Option<Ordering> {
        match (self, cell) {
            (Self::Text(expected), Value::String(actual)) => Some(actual.as_str().cmp(expected)),
            (Self::Int(expected), Value::Number(actual)) => {
                if let Some(actual) = actual.as_i64() {
                    Some(actual.cmp(expected))
                } else {
                    actual.as_f64()?.partial_cmp(&(*expected as f64))
                }
            }
            (Self::Int(expected), Value::String(actual)) => {
                actual.parse::<i64>().ok().map(|a| a.cmp(expected))
            }
            (Self::Bool(expected), Value::Bool(actual)) => Some(actual.cmp(expected)),
            (Self::Time(expected), Value::String(actual)) => DateTime::parse_from_rfc3339(actual)
                .ok()
                .map(|a| a.with_timezone(&Utc).cmp(expected)),
            _ => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(v) => f.write_str(v),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Time(v) => f.write_str(&v.to_rfc3339()),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for FilterValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Time(v)
    }
}

/// A row predicate.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, FilterValue),
    In(String, Vec<FilterValue>),
    Gte(String, FilterValue),
    Lt(String, FilterValue),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Self::Eq(c, _) | Self::In(c, _) | Self::Gte(c, _) | Self::Lt(c, _) => c,
        }
    }

    /// Whether a row satisfies this predicate. Missing columns never match.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(cell) = row.get(self.column()) else {
            return false;
        };
        match self {
            Self::Eq(_, v) => v.compare(cell) == Some(Ordering::Equal),
            Self::In(_, vs) => vs.iter().any(|v| v.compare(cell) == Some(Ordering::Equal)),
            Self::Gte(_, v) => matches!(
                v.compare(cell),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Self::Lt(_, v) => v.compare(cell) == Some(Ordering::Less),
        }
    }

    /// PostgREST `(column, operator.value)` pair.
    fn to_param(&self) -> (String, String) {
        match self {
            Self::Eq(c, v) => (c.clone(), format!("eq.{v}")),
            Self::Gte(c, v) => (c.clone(), format!("gte.{v}")),
            Self::Lt(c, v) => (c.clone(), format!("lt.{v}")),
            Self::In(c, vs) => {
                let items: Vec<String> = vs.iter().map(|v| quote_list_item(&v.to_string())).collect();
                (c.clone(), format!("in.({})", items.join(",")))
            }
        }
    }
}

/// Quote an `in.(...)` list item when it contains reserved characters.
fn quote_list_item(raw: &str) -> String {
    if raw.contains([',', '(', ')', '"', ' ']) {
        format!("\"{}\"", raw.replace('"', "\\\""))
    } else {
        raw.to_string()
    }
}

/// Sort order on one column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A read against one collection.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub collection: Collection,
    /// Comma-separated projection, `*` for all columns.
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<u32>,
}

impl Query {
    /// Start a query selecting every column of `collection`.
    pub fn from(collection: Collection) -> Self {
        Self {
            collection,
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<FilterValue>) -> Self {
        self.filters.push(Filter::Eq(column.to_string(), value.into()));
        self
    }

    pub fn is_in<V: Into<FilterValue>>(
        mut self,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(column.to_string(), values));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<FilterValue>) -> Self {
        self.filters.push(Filter::Gte(column.to_string(), value.into()));
        self
    }

    pub fn lt(mut self, column: &str, value: impl Into<FilterValue>) -> Self {
        self.filters.push(Filter::Lt(column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a row satisfies every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Render as PostgREST query parameters, `select` first.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(self.filters.iter().map(Filter::to_param));
        if let Some(order) = &self.order {
            let dir = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{dir}", order.column)));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Render only the filters, for writes that must not carry `select`.
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.iter().map(Filter::to_param).collect()
    }
}

/// Compare two JSON cells for ordering.
///
/// Timestamps compare chronologically, numbers numerically, everything else
/// lexically. Nulls and missing cells sort first.
pub fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
