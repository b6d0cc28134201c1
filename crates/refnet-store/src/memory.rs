//! In-process store.
//!
//! Holds collections as JSON rows and procedures as closures over those
//! rows. Used by tests and offline runs; failures and latency can be
//! injected per collection or procedure.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::query::{compare_cells, Collection, Query};
use crate::{Result, Store, StoreError};

/// Rows keyed by collection.
pub type Tables = HashMap<Collection, Vec<Value>>;

/// A remote procedure: receives the tables and the named arguments.
pub type Procedure = Arc<dyn Fn(&mut Tables, &Value) -> Result<Value> + Send + Sync>;

#[derive(Default)]
struct Inner {
    tables: Tables,
    procedures: HashMap<String, Procedure>,
    collection_failures: HashMap<Collection, StoreError>,
    procedure_failures: HashMap<String, StoreError>,
    offline: bool,
    latency: Option<Duration>,
    reads: u64,
    writes: u64,
    calls: Vec<(String, Value)>,
    access_token: Option<String>,
}

/// [`Store`] backed by in-memory tables.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Append a row to a collection.
    pub fn insert(&self, collection: Collection, row: Value) {
        self.lock().tables.entry(collection).or_default().push(row);
    }

    /// Replace a collection's rows.
    pub fn replace(&self, collection: Collection, rows: Vec<Value>) {
        self.lock().tables.insert(collection, rows);
    }

    /// Snapshot of a collection's rows.
    pub fn rows(&self, collection: Collection) -> Vec<Value> {
        self.lock().tables.get(&collection).cloned().unwrap_or_default()
    }

    /// Register a procedure under `name`.
    pub fn register_procedure<F>(&self, name: &str, procedure: F)
    where
        F: Fn(&mut Tables, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.lock()
            .procedures
            .insert(name.to_string(), Arc::new(procedure));
    }

    /// Make every operation on `collection` fail with `error`.
    pub fn fail_collection(&self, collection: Collection, error: StoreError) {
        self.lock().collection_failures.insert(collection, error);
    }

    /// Make calls to `name` fail with `error`.
    pub fn fail_procedure(&self, name: &str, error: StoreError) {
        self.lock()
            .procedure_failures
            .insert(name.to_string(), error);
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        let mut inner = self.lock();
        inner.collection_failures.clear();
        inner.procedure_failures.clear();
        inner.offline = false;
    }

    /// Simulate a network outage: every operation fails with a connectivity error.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Number of `select`/`count` operations served.
    pub fn reads(&self) -> u64 {
        self.lock().reads
    }

    /// Number of `update` operations served.
    pub fn writes(&self) -> u64 {
        self.lock().writes
    }

    /// Procedure names and arguments, in call order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.lock().calls.clone()
    }

    /// The bearer token last set through [`Store::set_access_token`].
    pub fn access_token(&self) -> Option<String> {
        self.lock().access_token.clone()
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_collection(inner: &Inner, collection: Collection) -> Result<()> {
        if inner.offline {
            return Err(offline_error());
        }
        match inner.collection_failures.get(&collection) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn offline_error() -> StoreError {
    StoreError::Connectivity {
        message: "network unreachable".to_string(),
    }
}

fn matching<'a>(rows: &'a [Value], query: &Query) -> Vec<&'a Value> {
    let mut hits: Vec<&Value> = rows.iter().filter(|r| query.matches(r)).collect();
    if let Some(order) = &query.order {
        hits.sort_by(|a, b| {
            let ord = compare_cells(a.get(&order.column), b.get(&order.column));
            if order.ascending {
                ord
            } else {
                ord.reverse()
            }
        });
    }
    if let Some(limit) = query.limit {
        hits.truncate(limit as usize);
    }
    hits
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let Some(object) = row.as_object() else {
        return row.clone();
    };
    let projected: Map<String, Value> = columns
        .split(',')
        .map(str::trim)
        .filter_map(|c| object.get(c).map(|v| (c.to_string(), v.clone())))
        .collect();
    Value::Object(projected)
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        self.delay().await;
        let mut inner = self.lock();
        Self::check_collection(&inner, query.collection)?;
        inner.reads += 1;
        let rows = inner
            .tables
            .get(&query.collection)
            .map(|rows| {
                matching(rows, query)
                    .into_iter()
                    .map(|r| project(r, &query.columns))
                    .collect()
            })
            .unwrap_or_default();
        Ok(rows)
    }

    async fn count(&self, query: &Query) -> Result<u64> {
        self.delay().await;
        let mut inner = self.lock();
        Self::check_collection(&inner, query.collection)?;
        inner.reads += 1;
        let n = inner
            .tables
            .get(&query.collection)
            .map(|rows| matching(rows, query).len())
            .unwrap_or(0);
        Ok(n as u64)
    }

    async fn update(&self, query: &Query, patch: &Value) -> Result<Vec<Value>> {
        self.delay().await;
        let Some(patch) = patch.as_object() else {
            return Err(StoreError::Query {
                status: 0,
                message: "update patch must be an object".to_string(),
            });
        };
        let mut inner = self.lock();
        Self::check_collection(&inner, query.collection)?;
        inner.writes += 1;
        let mut updated = Vec::new();
        if let Some(rows) = inner.tables.get_mut(&query.collection) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Some(object) = row.as_object_mut() {
                    for (k, v) in patch {
                        object.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn call(&self, procedure: &str, args: &Value) -> Result<Value> {
        self.delay().await;
        let mut inner = self.lock();
        if inner.offline {
            return Err(offline_error());
        }
        inner.calls.push((procedure.to_string(), args.clone()));
        if let Some(err) = inner.procedure_failures.get(procedure) {
            return Err(err.clone());
        }
        let handler = inner
            .procedures
            .get(procedure)
            .cloned()
            .ok_or_else(|| StoreError::UnknownProcedure(procedure.to_string()))?;
        handler(&mut inner.tables, args)
    }

    fn set_access_token(&self, token: Option<String>) {
        self.lock().access_token = token;
    }
}
