//! Per-entity sync driver.
//!
//! `sync` applies a client-originated write against the authoritative
//! store: validation, staleness check against the server's `updated_at`,
//! secondary-uniqueness probes with heuristic auto-resolution, then a
//! create-or-update write. `resolve_conflict` applies a client-chosen
//! strategy to a previously reported conflict.
//!
//! Writes that touch a secondary-unique value are serialized through a
//! process-local keyed lock (`<collection>:<field>:<value>`), which
//! collapses the probe-then-write window to a single process. Cross-process
//! uniqueness remains the store's concern.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use crate::domain::conflict::algebra::{self, Strategy};
use crate::domain::conflict::identity::HeuristicContext;
use crate::domain::document::{self, Document};
use crate::domain::entity::{EntityDescriptor, EntityKind};
use crate::domain::error::Error;
use crate::domain::ports::{AuthStore, DocStore};
use crate::domain::timestamp;
use crate::domain::validate;

/// Result of applying a client write.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// The write was applied under the client's primary key.
    Written {
        id: String,
        created: bool,
        record: Document,
    },
    /// A uniqueness collision was classified as the same entity and folded
    /// into the existing record.
    AutoMerged {
        server_id: String,
        resolved_as: String,
        record: Document,
    },
    /// The write was rejected; the client must pick a strategy.
    Conflict(ConflictReport),
}

/// Everything a client needs to choose and resend a resolution strategy.
#[derive(Debug, Clone)]
pub struct ConflictReport {
    pub message: &'static str,
    pub conflict_field: String,
    pub conflict_type: Option<String>,
    pub latest_data: Document,
    pub allowed_strategies: Vec<Strategy>,
    pub client_id: String,
    pub server_id: String,
}

/// Result of an explicit conflict resolution.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    Resolved(Resolution),
    /// The re-checked uniqueness constraint still collides.
    Conflict(ConflictReport),
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub id: String,
    pub record: Document,
    pub is_new: bool,
    pub strategy: Strategy,
    pub allowed_strategies: Vec<Strategy>,
}

struct Collision {
    field: &'static str,
    hit: Document,
}

/// Process-local keyed mutex set guarding unique-value writes.
#[derive(Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    /// Acquire every key in sorted order so concurrent writers touching the
    /// same value set cannot deadlock.
    async fn acquire(&self, mut keys: Vec<String>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let lock = {
                let mut locks = self.locks.lock();
                locks
                    .entry(key)
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                    .clone()
            };
            guards.push(lock.lock_owned().await);
        }
        guards
    }
}

/// Drives `sync` and `resolve-conflict` for every entity kind.
pub struct SyncEngine {
    store: Arc<dyn DocStore>,
    auth: Arc<dyn AuthStore>,
    unique_locks: KeyedLocks,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn DocStore>, auth: Arc<dyn AuthStore>) -> Self {
        Self {
            store,
            auth,
            unique_locks: KeyedLocks::default(),
        }
    }

    /// Apply a client write.
    pub async fn sync(&self, kind: EntityKind, mut client: Document) -> Result<SyncOutcome, Error> {
        let descriptor = kind.descriptor();
        normalize_emails(kind, &mut client);
        validate::validate(kind, &client)?;
        let id = document::get_str(&client, descriptor.primary_key)
            .map(str::to_owned)
            .ok_or_else(|| Error::invalid_request("missing primary key"))?;

        let now = Utc::now();
        let existing = self.store.get(descriptor.collection, &id).await?;

        if let Some(server) = &existing {
            let client_t =
                timestamp::instant_or_now(timestamp::field_instant(&client, "updated_at"), now);
            let server_t =
                timestamp::instant_or_now(timestamp::field_instant(server, "updated_at"), now);
            if client_t < server_t {
                debug!(entity = kind.label(), id = %id, "stale client write rejected");
                return Ok(SyncOutcome::Conflict(ConflictReport {
                    message: "sync conflict: client data is stale",
                    conflict_field: "updated_at".to_string(),
                    conflict_type: None,
                    latest_data: server.clone(),
                    allowed_strategies: algebra::conflict_strategies(descriptor),
                    client_id: id.clone(),
                    server_id: id,
                }));
            }
        }

        let _guards = self
            .unique_locks
            .acquire(lock_keys(descriptor, &client))
            .await;

        if let Some(collision) = self
            .probe_unique(descriptor, &client, existing.as_ref(), &id)
            .await?
        {
            return self
                .classify_collision(kind, collision, client, existing.is_some(), id, now)
                .await;
        }

        let created = existing.is_none();
        let record = if created {
            self.store.set(descriptor.collection, &id, client).await?
        } else {
            self.store.update(descriptor.collection, &id, client).await?
        };
        Ok(SyncOutcome::Written {
            id,
            created,
            record,
        })
    }

    /// Apply a client-chosen strategy to a previously reported conflict.
    pub async fn resolve_conflict(
        &self,
        kind: EntityKind,
        id: &str,
        strategy_name: &str,
        mut client: Document,
    ) -> Result<ResolveOutcome, Error> {
        let descriptor = kind.descriptor();
        if id.trim().is_empty() {
            return Err(Error::invalid_request("missing primary key"));
        }
        normalize_emails(kind, &mut client);
        let strategy = Strategy::parse(strategy_name).ok_or_else(|| {
            Error::invalid_request(format!("unknown resolution strategy: {strategy_name}"))
                .with_details(json!({
                    "allowed_strategies": algebra::resolve_strategies(descriptor),
                }))
        })?;

        let now = Utc::now();
        let _guards = self
            .unique_locks
            .acquire(lock_keys(descriptor, &client))
            .await;
        let existing = self.store.get(descriptor.collection, id).await?;

        let Some(server) = existing else {
            let allowed = vec![Strategy::ClientWins];
            if strategy != Strategy::ClientWins {
                return Err(Error::invalid_request(
                    "record no longer exists; only client_wins can recreate it",
                )
                .with_details(json!({ "allowed_strategies": allowed })));
            }
            // Another device may have claimed the unique value since the
            // conflict was reported.
            if let Some(collision) = self.probe_unique(descriptor, &client, None, id).await? {
                return Ok(ResolveOutcome::Conflict(unique_conflict_report(
                    descriptor, collision, id, allowed,
                )));
            }
            let mut record = client;
            record.insert(
                descriptor.primary_key.to_string(),
                json!(id),
            );
            let record = self.store.set(descriptor.collection, id, record).await?;
            info!(entity = kind.label(), id = %id, "conflict resolved by recreate");
            return Ok(ResolveOutcome::Resolved(Resolution {
                id: id.to_string(),
                record,
                is_new: true,
                strategy,
                allowed_strategies: allowed,
            }));
        };

        let allowed = algebra::resolve_strategies(descriptor);
        if !allowed.contains(&strategy) {
            return Err(Error::invalid_request(format!(
                "strategy {} is not available for {}",
                strategy.as_str(),
                kind.label()
            ))
            .with_details(json!({ "allowed_strategies": allowed })));
        }

        if strategy == Strategy::UpdateData {
            if let Some(collision) = self
                .probe_unique(descriptor, &client, Some(&server), id)
                .await?
            {
                return Ok(ResolveOutcome::Conflict(unique_conflict_report(
                    descriptor, collision, id, allowed,
                )));
            }
        }

        let resolved = algebra::apply(descriptor, strategy, &client, &server, now);
        let record = self
            .store
            .update(descriptor.collection, id, resolved)
            .await?;
        info!(
            entity = kind.label(),
            id = %id,
            strategy = strategy.as_str(),
            "conflict resolved"
        );
        Ok(ResolveOutcome::Resolved(Resolution {
            id: id.to_string(),
            record,
            is_new: false,
            strategy,
            allowed_strategies: allowed,
        }))
    }

    /// Every document in the kind's collection, for bulk down-sync reads.
    pub async fn down_sync(&self, kind: EntityKind) -> Result<Vec<Document>, Error> {
        Ok(self.store.list(kind.descriptor().collection).await?)
    }

    async fn classify_collision(
        &self,
        kind: EntityKind,
        collision: Collision,
        client: Document,
        updating: bool,
        id: String,
        now: chrono::DateTime<Utc>,
    ) -> Result<SyncOutcome, Error> {
        let descriptor = kind.descriptor();
        let ctx = self.heuristic_context(kind, &client, &collision.hit).await;
        let same = descriptor
            .heuristic
            .as_ref()
            .is_some_and(|heuristic| heuristic.is_same_entity(&client, &collision.hit, &ctx));
        let hit_id = document::get_str(&collision.hit, descriptor.primary_key)
            .map(str::to_owned)
            .unwrap_or_default();

        if same {
            if !updating {
                // Two devices registered the same entity under different
                // keys: fold the new write into the existing record.
                let mut merged = document::overlay(&collision.hit, &client);
                for field in [descriptor.primary_key, "created_at"] {
                    match collision.hit.get(field) {
                        Some(value) => {
                            merged.insert(field.to_string(), value.clone());
                        }
                        None => {
                            merged.remove(field);
                        }
                    }
                }
                merged.insert("updated_at".to_string(), timestamp::to_value(now));
                let record = self
                    .store
                    .set(descriptor.collection, &hit_id, merged)
                    .await?;
                info!(
                    entity = kind.label(),
                    client_id = %id,
                    server_id = %hit_id,
                    "duplicate auto-merged into existing record"
                );
                return Ok(SyncOutcome::AutoMerged {
                    server_id: hit_id,
                    resolved_as: format!("same_{}_detected", kind.label()),
                    record,
                });
            }
            return Ok(SyncOutcome::Conflict(ConflictReport {
                message: "potential duplicate detected",
                conflict_field: collision.field.to_string(),
                conflict_type: Some(format!("potential_duplicate_{}", kind.label())),
                latest_data: collision.hit,
                allowed_strategies: vec![
                    Strategy::ClientWins,
                    Strategy::ServerWins,
                    Strategy::Merge,
                ],
                client_id: id,
                server_id: hit_id,
            }));
        }

        let allowed = if updating {
            algebra::conflict_strategies(descriptor)
        } else {
            vec![Strategy::ClientWins]
        };
        Ok(SyncOutcome::Conflict(ConflictReport {
            message: "unique constraint violated",
            conflict_field: collision.field.to_string(),
            conflict_type: Some("unique_constraint".to_string()),
            latest_data: collision.hit,
            allowed_strategies: allowed,
            client_id: id,
            server_id: hit_id,
        }))
    }

    /// Find the first colliding document for any of the entity's secondary
    /// uniqueness constraints.
    ///
    /// On the update path a constraint is only probed when the client
    /// changes one of its fields; on the create path every constraint with
    /// a value is probed. Hits keyed by the write's own primary key are
    /// ignored.
    async fn probe_unique(
        &self,
        descriptor: &EntityDescriptor,
        client: &Document,
        server: Option<&Document>,
        id: &str,
    ) -> Result<Option<Collision>, Error> {
        for constraint in descriptor.unique_constraints {
            if document::is_blank(client, constraint.probe_field) {
                continue;
            }
            if let Some(server) = server {
                let unchanged = constraint.fields().all(|field| {
                    document::value_equals(client.get(field), server.get(field))
                });
                if unchanged {
                    continue;
                }
            }
            let probe_value = client
                .get(constraint.probe_field)
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            let hits = self
                .store
                .where_equals(descriptor.collection, constraint.probe_field, &probe_value)
                .await?;
            for hit in hits {
                if document::get_str(&hit, descriptor.primary_key) == Some(id) {
                    continue;
                }
                let tuple_matches = constraint
                    .tuple_fields
                    .iter()
                    .all(|field| document::value_equals(hit.get(*field), client.get(*field)));
                if tuple_matches {
                    return Ok(Some(Collision {
                        field: constraint.probe_field,
                        hit,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Precompute the signals the pure heuristics cannot derive themselves.
    ///
    /// The password match goes through the auth store's hash-verify; the
    /// outcome only ever decides whether two profile rows are folded
    /// together, never whether a request is authorized.
    async fn heuristic_context(
        &self,
        kind: EntityKind,
        client: &Document,
        server: &Document,
    ) -> HeuristicContext {
        let mut ctx = HeuristicContext::default();
        if kind == EntityKind::User {
            if let (Some(password), Some(email)) = (
                document::get_str(client, "password"),
                document::get_str(server, "email"),
            ) {
                if !password.is_empty() {
                    ctx.password_match = self.auth.verify_password(email, password).await.is_ok();
                }
            }
        }
        ctx
    }
}

fn unique_conflict_report(
    descriptor: &EntityDescriptor,
    collision: Collision,
    id: &str,
    allowed: Vec<Strategy>,
) -> ConflictReport {
    let hit_id = document::get_str(&collision.hit, descriptor.primary_key)
        .map(str::to_owned)
        .unwrap_or_default();
    ConflictReport {
        message: "unique constraint violated",
        conflict_field: collision.field.to_string(),
        conflict_type: Some("unique_constraint".to_string()),
        latest_data: collision.hit,
        allowed_strategies: allowed,
        client_id: id.to_string(),
        server_id: hit_id,
    }
}

/// Lock keys for every unique value this write touches.
fn lock_keys(descriptor: &EntityDescriptor, client: &Document) -> Vec<String> {
    let mut keys = Vec::new();
    for constraint in descriptor.unique_constraints {
        for field in constraint.fields() {
            if let Some(value) = client.get(field).filter(|v| !v.is_null()) {
                keys.push(format!("{}:{}:{}", descriptor.collection, field, value));
            }
        }
    }
    keys
}

/// Emails are stored lowercase and trimmed; normalize before validation,
/// probes, and writes so lookups by email are stable.
fn normalize_emails(kind: EntityKind, doc: &mut Document) {
    if kind != EntityKind::User {
        return;
    }
    if let Some(email) = document::get_str(doc, "email").map(validate::normalize_email) {
        doc.insert("email".to_string(), json!(email));
    }
}
