//! Strategy algebra applied to a `(client, server)` document pair.
//!
//! All reducers are pure: the caller supplies `now` so outcomes are
//! reproducible in tests. Strategy availability depends on the entity
//! descriptor (`update_data` needs an identity-defining subset, the
//! quantity strategies need a stock field).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::debug;

use crate::domain::document::{self, Document};
use crate::domain::entity::EntityDescriptor;
use crate::domain::timestamp;

/// Marker inserted between the two halves of a text-append merge.
const APPEND_MARKER: &str = "\n\n[SYNC MERGE] Client update:\n";

/// A client-selectable resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    ClientWins,
    ServerWins,
    Merge,
    UpdateData,
    SumQuantities,
    AverageQuantities,
}

impl Strategy {
    /// Wire name of the strategy.
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::ClientWins => "client_wins",
            Strategy::ServerWins => "server_wins",
            Strategy::Merge => "merge",
            Strategy::UpdateData => "update_data",
            Strategy::SumQuantities => "sum_quantities",
            Strategy::AverageQuantities => "average_quantities",
        }
    }

    /// Parse a wire name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "client_wins" => Some(Strategy::ClientWins),
            "server_wins" => Some(Strategy::ServerWins),
            "merge" => Some(Strategy::Merge),
            "update_data" => Some(Strategy::UpdateData),
            "sum_quantities" => Some(Strategy::SumQuantities),
            "average_quantities" => Some(Strategy::AverageQuantities),
            _ => None,
        }
    }
}

/// Strategies offered when a sync is rejected with a conflict.
pub fn conflict_strategies(descriptor: &EntityDescriptor) -> Vec<Strategy> {
    let mut strategies = vec![Strategy::ClientWins, Strategy::ServerWins, Strategy::Merge];
    if descriptor.offers_update_data() {
        strategies.push(Strategy::UpdateData);
    }
    strategies
}

/// Strategies accepted by an explicit resolve against an existing record.
pub fn resolve_strategies(descriptor: &EntityDescriptor) -> Vec<Strategy> {
    let mut strategies = conflict_strategies(descriptor);
    if descriptor.quantity_field.is_some() {
        strategies.push(Strategy::SumQuantities);
        strategies.push(Strategy::AverageQuantities);
    }
    strategies
}

/// Apply a strategy to a `(client, server)` pair, producing the resolved
/// record.
pub fn apply(
    descriptor: &EntityDescriptor,
    strategy: Strategy,
    client: &Document,
    server: &Document,
    now: DateTime<Utc>,
) -> Document {
    match strategy {
        Strategy::ClientWins => client.clone(),
        Strategy::ServerWins => server.clone(),
        Strategy::UpdateData => update_data(descriptor, client, server, now),
        Strategy::Merge => merge(descriptor, client, server, now),
        Strategy::SumQuantities => combine_quantities(descriptor, client, server, now, |a, b| a + b),
        Strategy::AverageQuantities => {
            combine_quantities(descriptor, client, server, now, |a, b| ((a + b) / 2.0).round())
        }
    }
}

/// Client fields overlay the server record, but the identity-defining
/// subset keeps the server's values and `updated_at` is stamped with `now`.
fn update_data(
    descriptor: &EntityDescriptor,
    client: &Document,
    server: &Document,
    now: DateTime<Utc>,
) -> Document {
    let mut merged = document::overlay(server, client);
    for field in descriptor.identity_fields {
        match server.get(*field) {
            Some(value) => {
                merged.insert((*field).to_string(), value.clone());
            }
            None => {
                merged.remove(*field);
            }
        }
    }
    keep_server_key_fields(descriptor, server, &mut merged);
    merged.insert("updated_at".to_string(), timestamp::to_value(now));
    merged
}

/// Field-wise merge: the client overwrites a key only when its record is
/// newer and the values differ, then type-aware overrides run (text-append
/// fields, the status lattice, the conservative quantity minimum) and
/// `updated_at` becomes the newer of the two instants.
pub fn merge(
    descriptor: &EntityDescriptor,
    client: &Document,
    server: &Document,
    now: DateTime<Utc>,
) -> Document {
    let client_t = timestamp::instant_or_now(timestamp::field_instant(client, "updated_at"), now);
    let server_t = timestamp::instant_or_now(timestamp::field_instant(server, "updated_at"), now);
    let client_newer = client_t > server_t;

    let mut merged = server.clone();
    if client_newer {
        for (key, value) in client {
            if document::value_equals(Some(value), server.get(key)) {
                continue;
            }
            if descriptor.critical_fields.contains(&key.as_str()) {
                debug!(field = %key, "newer client value adopted for critical field");
            }
            merged.insert(key.clone(), value.clone());
        }
    }

    for field in descriptor.append_fields {
        let combined = append_merge(
            document::get_str(server, field),
            document::get_str(client, field),
        );
        match combined {
            Some(text) => {
                merged.insert((*field).to_string(), Value::String(text));
            }
            None => {
                merged.remove(*field);
            }
        }
    }

    if let Some(lattice) = &descriptor.status_lattice {
        let joined = lattice
            .join(
                document::get_str(client, lattice.field),
                document::get_str(server, lattice.field),
            )
            .map(str::to_owned);
        if let Some(status) = joined {
            merged.insert(lattice.field.to_string(), Value::String(status));
        }
    }

    if let Some(field) = descriptor.quantity_field {
        if let (Some(a), Some(b)) = (
            document::get_f64(client, field),
            document::get_f64(server, field),
        ) {
            merged.insert(field.to_string(), number(a.min(b)));
        }
    }

    keep_server_key_fields(descriptor, server, &mut merged);
    merged.insert(
        "updated_at".to_string(),
        timestamp::to_value(client_t.max(server_t)),
    );
    merged
}

/// Union of both sides with the stock field combined by `combine` and a
/// fresh `updated_at`.
fn combine_quantities(
    descriptor: &EntityDescriptor,
    client: &Document,
    server: &Document,
    now: DateTime<Utc>,
    combine: fn(f64, f64) -> f64,
) -> Document {
    let mut merged = document::overlay(server, client);
    if let Some(field) = descriptor.quantity_field {
        let a = document::get_f64(client, field).unwrap_or(0.0);
        let b = document::get_f64(server, field).unwrap_or(0.0);
        merged.insert(field.to_string(), number(combine(a, b)));
    }
    keep_server_key_fields(descriptor, server, &mut merged);
    merged.insert("updated_at".to_string(), timestamp::to_value(now));
    merged
}

/// Combine two free-text values.
///
/// One side blank yields the other; identical values collapse; containment
/// keeps the longer text, so re-running the merge on its own output is a
/// no-op. Divergent texts concatenate under the sync marker.
fn append_merge(server: Option<&str>, client: Option<&str>) -> Option<String> {
    let server = server.filter(|s| !s.is_empty());
    let client = client.filter(|s| !s.is_empty());
    match (server, client) {
        (None, None) => None,
        (Some(s), None) => Some(s.to_string()),
        (None, Some(c)) => Some(c.to_string()),
        (Some(s), Some(c)) if s == c => Some(s.to_string()),
        (Some(s), Some(c)) if s.contains(c) => Some(s.to_string()),
        (Some(s), Some(c)) if c.contains(s) => Some(c.to_string()),
        (Some(s), Some(c)) => Some(format!("{s}{APPEND_MARKER}{c}")),
    }
}

/// The resolved record always keeps the server's primary key and creation
/// instant; a resolution never re-keys or re-creates the document.
fn keep_server_key_fields(
    descriptor: &EntityDescriptor,
    server: &Document,
    merged: &mut Document,
) {
    for field in [descriptor.primary_key, "created_at"] {
        if let Some(value) = server.get(field) {
            merged.insert(field.to_string(), value.clone());
        }
    }
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::Number(Number::from(value as i64))
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}
