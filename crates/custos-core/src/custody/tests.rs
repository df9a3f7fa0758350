//! Tests for the custody ledger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use serde_json::Value as JsonValue;

use super::*;
use crate::identity::{ActingUser, Role};
use crate::store::{
    BoxFuture, Document, EntityStore, QueryOp, SqliteEntityStore, StoreError, collections,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn actor() -> ActingUser {
    ActingUser::named("Test Operator", Role::Manager)
}

fn engine_with_store() -> (CustodyEngine, Arc<SqliteEntityStore>) {
    let store = Arc::new(SqliteEntityStore::in_memory().expect("in-memory store"));
    (CustodyEngine::new(store.clone(), TIMEOUT), store)
}

fn transfer(
    key_name: &str,
    action: TransferAction,
    person: &str,
    lockbox: &str,
    quantity: u32,
) -> TransferRequest {
    TransferRequest {
        key_name: key_name.to_string(),
        action,
        person: person.to_string(),
        lockbox: lockbox.to_string(),
        quantity,
    }
}

/// Fetches the single pooled key document for a name, if any.
fn stored_key(store: &SqliteEntityStore, key_name: &str) -> Option<(String, Key)> {
    store
        .list_sync(collections::KEYS)
        .expect("list keys")
        .into_iter()
        .filter_map(|doc| {
            let key: Key = doc.decode().ok()?;
            (crate::names::eq_normalized(&key.key_name, key_name)).then_some((doc.id, key))
        })
        .next()
}

// =============================================================================
// register_or_top_up
// =============================================================================

#[tokio::test]
async fn test_register_creates_key() {
    let (engine, store) = engine_with_store();

    let outcome = engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");

    assert_eq!(outcome.key_name, "C5");
    assert_eq!(outcome.total_quantity, 3);

    let (_, key) = stored_key(&store, "C5").expect("key stored");
    assert!(!key.is_restricted);
    assert_eq!(key.holders, vec![Holder::lockbox("Maintenance Box", 3)]);
}

#[tokio::test]
async fn test_register_tops_up_existing_lockbox_case_insensitively() {
    let (engine, store) = engine_with_store();

    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");
    let outcome = engine
        .register_or_top_up(" c5 ", "maintenance box", 2, &actor())
        .await
        .expect("top up");

    assert_eq!(outcome.total_quantity, 5);

    let (_, key) = stored_key(&store, "C5").expect("key stored");
    // Merged into the existing entry, not duplicated; display casing kept.
    assert_eq!(key.holders, vec![Holder::lockbox("Maintenance Box", 5)]);
}

#[tokio::test]
async fn test_register_appends_new_lockbox() {
    let (engine, store) = engine_with_store();

    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");
    engine
        .register_or_top_up("C5", "Front Desk", 1, &actor())
        .await
        .expect("register second lockbox");

    let (_, key) = stored_key(&store, "C5").expect("key stored");
    assert_eq!(key.holders.len(), 2);
    assert_eq!(key.total_quantity(), 4);
}

#[tokio::test]
async fn test_register_validation_performs_no_write() {
    let (engine, store) = engine_with_store();

    assert!(matches!(
        engine.register_or_top_up("  ", "Box", 1, &actor()).await,
        Err(CustodyError::MissingField { field: "keyName" })
    ));
    assert!(matches!(
        engine.register_or_top_up("C5", "", 1, &actor()).await,
        Err(CustodyError::MissingField { field: "lockbox" })
    ));
    assert!(matches!(
        engine.register_or_top_up("C5", "Box", 0, &actor()).await,
        Err(CustodyError::NonPositiveQuantity)
    ));

    assert!(store.list_sync(collections::KEYS).expect("list").is_empty());
}

// =============================================================================
// transfer_custody
// =============================================================================

#[tokio::test]
async fn test_sign_out_moves_units_and_logs() {
    let (engine, store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 9, 30, 0).unwrap();
    let outcome = engine
        .transfer_custody_at(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 2),
            &actor(),
            now,
        )
        .await
        .expect("sign out");

    assert!(outcome.log_recorded);
    assert_eq!(
        outcome.holders,
        vec![
            Holder::lockbox("Maintenance Box", 1),
            Holder::person("Alice", 2),
        ]
    );

    let logs = store.list_sync(collections::KEY_LOGS).expect("list logs");
    assert_eq!(logs.len(), 1);
    let entry: KeyLogEntry = logs[0].decode().expect("decode log");
    assert_eq!(entry.key_name, "C5");
    assert_eq!(entry.action, TransferAction::SigningOut);
    assert_eq!(entry.person, "Alice");
    assert_eq!(entry.lockbox, "Maintenance Box");
    assert_eq!(entry.timestamp, now);
    assert_eq!(entry.submitted_by, "Test Operator");
    // Wire form of the action is the display phrase.
    assert_eq!(logs[0].body["action"], "Signing Out");
}

#[tokio::test]
async fn test_drained_source_holder_is_removed() {
    let (engine, store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 2, &actor())
        .await
        .expect("register");

    engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 2),
            &actor(),
        )
        .await
        .expect("sign out all");

    let (_, key) = stored_key(&store, "C5").expect("key stored");
    // No zero-quantity holders persist.
    assert_eq!(key.holders, vec![Holder::person("Alice", 2)]);
}

#[tokio::test]
async fn test_transfer_unknown_key_rejected() {
    let (engine, _store) = engine_with_store();

    let result = engine
        .transfer_custody(
            &transfer("C9", TransferAction::SigningOut, "Alice", "Box", 1),
            &actor(),
        )
        .await;
    assert!(matches!(result, Err(CustodyError::KeyNotFound { .. })));
}

#[tokio::test]
async fn test_restricted_key_is_not_transferable() {
    let (engine, store) = engine_with_store();
    store
        .create_sync(
            collections::KEYS,
            &serde_json::json!({
                "keyName": "Server Room",
                "isRestricted": true,
                "currentHolder": {"type": "person", "name": "Alice", "quantity": 1}
            }),
        )
        .expect("seed restricted key");

    let result = engine
        .transfer_custody(
            &transfer("Server Room", TransferAction::SigningIn, "Alice", "Box", 1),
            &actor(),
        )
        .await;
    assert!(matches!(result, Err(CustodyError::KeyNotFound { .. })));
}

#[tokio::test]
async fn test_insufficient_quantity_leaves_holders_unchanged() {
    let (engine, store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");
    engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 2),
            &actor(),
        )
        .await
        .expect("sign out");

    let (id, _) = stored_key(&store, "C5").expect("key stored");
    let before = store
        .get_sync(collections::KEYS, &id)
        .expect("get")
        .expect("present")
        .body;

    // Only 1 unit remains in the box; asking for 2 must fail.
    let result = engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Bob", "Maintenance Box", 2),
            &actor(),
        )
        .await;
    match result {
        Err(CustodyError::InsufficientQuantity {
            holder,
            available,
            requested,
        }) => {
            assert_eq!(holder, "Maintenance Box");
            assert_eq!(available, 1);
            assert_eq!(requested, 2);
        },
        other => panic!("expected InsufficientQuantity, got {other:?}"),
    }

    let after = store
        .get_sync(collections::KEYS, &id)
        .expect("get")
        .expect("present")
        .body;
    assert_eq!(before, after);

    // The rejected attempt also leaves no log entry.
    let logs = store.list_sync(collections::KEY_LOGS).expect("list logs");
    assert_eq!(logs.len(), 1);
}

#[tokio::test]
async fn test_missing_source_holder_reports_zero_available() {
    let (engine, _store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");

    // Bob holds nothing, so signing in from him must fail.
    let result = engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningIn, "Bob", "Maintenance Box", 1),
            &actor(),
        )
        .await;
    match result {
        Err(CustodyError::InsufficientQuantity {
            holder, available, ..
        }) => {
            assert_eq!(holder, "Bob");
            assert_eq!(available, 0);
        },
        other => panic!("expected InsufficientQuantity, got {other:?}"),
    }
}

#[tokio::test]
async fn test_sign_in_merges_into_existing_lockbox() {
    let (engine, store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");
    engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 2),
            &actor(),
        )
        .await
        .expect("sign out");

    // Case difference on both sides still matches the stored holders.
    engine
        .transfer_custody(
            &transfer("c5", TransferAction::SigningIn, "ALICE", "maintenance box", 2),
            &actor(),
        )
        .await
        .expect("sign in");

    let (_, key) = stored_key(&store, "C5").expect("key stored");
    assert_eq!(key.holders, vec![Holder::lockbox("Maintenance Box", 3)]);
    assert_eq!(key.total_quantity(), 3);
}

#[tokio::test]
async fn test_transfer_validation_errors() {
    let (engine, _store) = engine_with_store();

    let result = engine
        .transfer_custody(
            &transfer("", TransferAction::SigningOut, "Alice", "Box", 1),
            &actor(),
        )
        .await;
    assert!(matches!(
        result,
        Err(CustodyError::MissingField { field: "keyName" })
    ));

    let result = engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, " ", "Box", 1),
            &actor(),
        )
        .await;
    assert!(matches!(
        result,
        Err(CustodyError::MissingField { field: "person" })
    ));

    let result = engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Box", 0),
            &actor(),
        )
        .await;
    assert!(matches!(result, Err(CustodyError::NonPositiveQuantity)));
}

#[tokio::test]
async fn test_anonymous_actor_logged_as_unknown() {
    let (engine, store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 1, &actor())
        .await
        .expect("register");

    engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 1),
            &ActingUser::with_role(Role::User),
        )
        .await
        .expect("sign out");

    let logs = store.list_sync(collections::KEY_LOGS).expect("list logs");
    let entry: KeyLogEntry = logs[0].decode().expect("decode log");
    assert_eq!(entry.submitted_by, "Unknown");
}

// =============================================================================
// Audit-write partial failure
// =============================================================================

/// Store wrapper that fails every `create` into one collection but
/// delegates everything else. Used to exercise the
/// state-written-but-log-lost path.
struct FailingStore {
    inner: SqliteEntityStore,
    fail_collection: &'static str,
}

impl EntityStore for FailingStore {
    fn create<'a>(
        &'a self,
        collection: &'a str,
        body: &'a JsonValue,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        if collection == self.fail_collection {
            return Box::pin(async {
                Err(StoreError::Io(std::io::Error::other(
                    "injected write failure",
                )))
            });
        }
        self.inner.create(collection, body)
    }

    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Document>, StoreError>> {
        self.inner.get(collection, id)
    }

    fn query<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        op: QueryOp,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        self.inner.query(collection, field, op, value)
    }

    fn update_merge<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        partial: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.update_merge(collection, id, partial)
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        self.inner.delete(collection, id)
    }

    fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        self.inner.list(collection)
    }
}

#[tokio::test]
async fn test_log_write_failure_does_not_roll_back_transfer() {
    let failing = Arc::new(FailingStore {
        inner: SqliteEntityStore::in_memory().expect("in-memory store"),
        fail_collection: collections::KEY_LOGS,
    });
    let engine = CustodyEngine::new(failing.clone(), TIMEOUT);

    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");

    let outcome = engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 2),
            &actor(),
        )
        .await
        .expect("transfer must complete despite the log failure");

    assert!(!outcome.log_recorded);

    // The holder update stuck; the log collection stayed empty.
    let (_, key) = stored_key(&failing.inner, "C5").expect("key stored");
    assert_eq!(
        key.holders,
        vec![
            Holder::lockbox("Maintenance Box", 1),
            Holder::person("Alice", 2),
        ]
    );
    assert!(
        failing
            .inner
            .list_sync(collections::KEY_LOGS)
            .expect("list logs")
            .is_empty()
    );
}

// =============================================================================
// consolidate_legacy_holders
// =============================================================================

#[tokio::test]
async fn test_consolidation_merges_per_unit_documents() {
    let (engine, store) = engine_with_store();

    // Legacy layout: one document per physical unit, names unevenly cased.
    for (name, holder) in [
        ("C5", Holder::lockbox("Maintenance Box", 1)),
        (" c5", Holder::lockbox("maintenance box", 1)),
        ("C5 ", Holder::person("Alice", 1)),
        ("D1", Holder::lockbox("Front Desk", 1)),
    ] {
        store
            .create_sync(
                collections::KEYS,
                &crate::store::encode(&Key::pooled(name, vec![holder])).expect("encode"),
            )
            .expect("seed legacy doc");
    }

    let summary = engine
        .consolidate_legacy_holders(&actor())
        .await
        .expect("consolidate");

    assert_eq!(summary.scanned, 4);
    assert_eq!(summary.deleted_documents, 4);
    assert_eq!(summary.consolidated_keys, 2);

    let docs = store.list_sync(collections::KEYS).expect("list");
    assert_eq!(docs.len(), 2);

    let (_, c5) = stored_key(&store, "C5").expect("C5 present");
    assert_eq!(c5.key_name, "C5");
    assert_eq!(c5.total_quantity(), 3);
    assert_eq!(
        c5.holders,
        vec![
            Holder::lockbox("Maintenance Box", 2),
            Holder::person("Alice", 1),
        ]
    );

    let (_, d1) = stored_key(&store, "D1").expect("D1 present");
    assert_eq!(d1.total_quantity(), 1);
}

#[tokio::test]
async fn test_consolidation_skips_restricted_keys() {
    let (engine, store) = engine_with_store();

    store
        .create_sync(
            collections::KEYS,
            &serde_json::json!({
                "keyName": "Server Room",
                "isRestricted": true,
                "currentHolder": {"type": "person", "name": "Alice", "quantity": 1}
            }),
        )
        .expect("seed restricted");
    engine
        .register_or_top_up("C5", "Maintenance Box", 2, &actor())
        .await
        .expect("register");

    let summary = engine
        .consolidate_legacy_holders(&actor())
        .await
        .expect("consolidate");

    assert_eq!(summary.scanned, 1);
    // Restricted document untouched.
    let docs = store.list_sync(collections::KEYS).expect("list");
    assert_eq!(docs.len(), 2);
}

#[tokio::test]
async fn test_consolidation_on_clean_input_is_stable() {
    let (engine, store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");

    engine
        .consolidate_legacy_holders(&actor())
        .await
        .expect("first run");
    let after_first = store.list_sync(collections::KEYS).expect("list");

    engine
        .consolidate_legacy_holders(&actor())
        .await
        .expect("second run");
    let after_second = store.list_sync(collections::KEYS).expect("list");

    assert_eq!(after_first.len(), 1);
    assert_eq!(after_second.len(), 1);
    assert_eq!(after_first[0].body, after_second[0].body);
}

// =============================================================================
// search
// =============================================================================

#[tokio::test]
async fn test_search_facets() {
    let (engine, _store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");
    engine
        .register_or_top_up("D1", "Front Desk", 1, &actor())
        .await
        .expect("register");
    engine
        .transfer_custody(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 2),
            &actor(),
        )
        .await
        .expect("sign out");

    let results = engine.search("alice").await.expect("search");
    assert_eq!(results.assigned.len(), 1);
    assert_eq!(results.assigned[0].person, "Alice");
    assert_eq!(results.assigned[0].quantity, 2);
    assert!(results.lockboxes.is_empty());
    assert_eq!(results.logs.len(), 1);
    assert_eq!(results.history.len(), 1);

    // Key-name match pulls in every facet for that key.
    let results = engine.search("c5").await.expect("search");
    assert_eq!(results.assigned.len(), 1);
    assert_eq!(results.lockboxes.len(), 1);
    assert_eq!(results.lockboxes[0].lockbox, "Maintenance Box");
    assert_eq!(results.logs.len(), 1);

    // Lockbox-name match reaches the lockbox facet and history only.
    let results = engine.search("front desk").await.expect("search");
    assert!(results.assigned.is_empty());
    assert_eq!(results.lockboxes.len(), 1);
    assert!(results.logs.is_empty());
}

#[tokio::test]
async fn test_search_history_is_reverse_chronological() {
    let (engine, _store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");

    let t1 = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let t2 = Utc.with_ymd_and_hms(2024, 6, 2, 9, 0, 0).unwrap();
    engine
        .transfer_custody_at(
            &transfer("C5", TransferAction::SigningOut, "Alice", "Maintenance Box", 2),
            &actor(),
            t1,
        )
        .await
        .expect("first transfer");
    engine
        .transfer_custody_at(
            &transfer("C5", TransferAction::SigningIn, "Alice", "Maintenance Box", 1),
            &actor(),
            t2,
        )
        .await
        .expect("second transfer");

    let results = engine.search("c5").await.expect("search");
    assert_eq!(results.history.len(), 2);
    assert_eq!(results.history[0].timestamp, t2);
    assert_eq!(results.history[1].timestamp, t1);
}

#[tokio::test]
async fn test_search_empty_query_matches_nothing() {
    let (engine, _store) = engine_with_store();
    engine
        .register_or_top_up("C5", "Maintenance Box", 3, &actor())
        .await
        .expect("register");

    let results = engine.search("   ").await.expect("search");
    assert!(results.assigned.is_empty());
    assert!(results.lockboxes.is_empty());
    assert!(results.logs.is_empty());
    assert!(results.history.is_empty());
}

// =============================================================================
// Conservation property
// =============================================================================

/// One step of a random custody workload.
#[derive(Debug, Clone)]
enum Op {
    Register { lockbox: usize, quantity: u32 },
    Transfer {
        action: TransferAction,
        person: usize,
        lockbox: usize,
        quantity: u32,
    },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..3usize, 1..5u32).prop_map(|(lockbox, quantity)| Op::Register { lockbox, quantity }),
        (
            prop::bool::ANY,
            0..3usize,
            0..3usize,
            1..5u32
        )
            .prop_map(|(out, person, lockbox, quantity)| Op::Transfer {
                action: if out {
                    TransferAction::SigningOut
                } else {
                    TransferAction::SigningIn
                },
                person,
                lockbox,
                quantity,
            }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Transfers move units but never create or destroy them: after any
    /// workload, the holder quantities sum to exactly the registered
    /// total, and no holder sits at zero.
    #[test]
    fn prop_quantity_is_conserved(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime");
        rt.block_on(async move {
            let lockboxes = ["Maintenance Box", "Front Desk", "Night Box"];
            let people = ["Alice", "Bob", "Carol"];
            let (engine, store) = engine_with_store();
            let user = actor();

            let mut registered: u64 = 0;
            for op in ops {
                match op {
                    Op::Register { lockbox, quantity } => {
                        engine
                            .register_or_top_up("C5", lockboxes[lockbox], quantity, &user)
                            .await
                            .expect("register cannot fail with valid inputs");
                        registered += u64::from(quantity);
                    },
                    Op::Transfer { action, person, lockbox, quantity } => {
                        let request = transfer(
                            "C5",
                            action,
                            people[person],
                            lockboxes[lockbox],
                            quantity,
                        );
                        match engine.transfer_custody(&request, &user).await {
                            Ok(_) => {},
                            Err(
                                CustodyError::KeyNotFound { .. }
                                | CustodyError::InsufficientQuantity { .. },
                            ) => {},
                            Err(other) => panic!("unexpected transfer error: {other}"),
                        }
                    },
                }
            }

            match stored_key(&store, "C5") {
                Some((_, key)) => {
                    prop_assert_eq!(key.total_quantity(), registered);
                    prop_assert!(key.holders.iter().all(|h| h.quantity() >= 1));
                },
                None => prop_assert_eq!(registered, 0),
            }
            Ok(())
        })?;
    }
}
