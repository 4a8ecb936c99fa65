//! Concurrency Control Tests
//!
//! If-Match gating, the conditional-update race, and the primary/shadow
//! write gap.

mod common;

use std::sync::Arc;

use common::{
    collection, collection_on, content, doc, read_one, version_of, FaultyStore, RacingStore,
};
use serde_json::json;

use versadoc::config::{ResourceConfig, RetentionPolicy, VersioningSettings};
use versadoc::store::{DocumentStore, InMemoryStore};
use versadoc::versioning::{
    ShadowRecord, ShadowWrite, ShadowWriter, VersionSelector, VersioningError,
};

// =============================================================================
// If-Match
// =============================================================================

/// A stale token changes nothing and writes no history
#[test]
fn test_stale_token_rejected_without_side_effects() {
    let people = collection(ResourceConfig::versioned("people"));
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();
    let stale = created.fingerprint.clone();

    people
        .patch("p1", doc(json!({"name": "Grace"})), Some(stale.as_str()))
        .unwrap();

    let err = people
        .patch("p1", doc(json!({"name": "Hedy"})), Some(stale.as_str()))
        .unwrap_err();
    assert_eq!(err, VersioningError::PreconditionFailed);
    assert_eq!(err.status_code(), 412);

    let live = read_one(&people, "p1", VersionSelector::Latest);
    assert_eq!(version_of(&live), json!(2));
    assert_eq!(content(&live), json!({"name": "Grace"}));
    assert_eq!(people.shadow_records("p1").unwrap().len(), 2);
    assert_eq!(people.metrics().snapshot().precondition_rejections, 1);
}

/// Writes without a token are refused while enforcement is on
#[test]
fn test_missing_token_required() {
    let people = collection(ResourceConfig::versioned("people"));
    people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    let err = people
        .replace("p1", doc(json!({"name": "Grace"})), None)
        .unwrap_err();
    assert_eq!(err, VersioningError::PreconditionRequired);
    assert_eq!(err.status_code(), 428);
    assert_eq!(people.shadow_records("p1").unwrap().len(), 1);
}

/// Lenient settings accept a missing token but still check a present one
#[test]
fn test_lenient_settings() {
    let people = collection_on(
        Arc::new(InMemoryStore::new()),
        ResourceConfig::versioned("people"),
        &VersioningSettings::lenient(),
    );
    people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    let outcome = people.patch("p1", doc(json!({"name": "Grace"})), None).unwrap();
    assert_eq!(outcome.version, Some(2));

    let err = people
        .patch("p1", doc(json!({"name": "Hedy"})), Some("\"nope\""))
        .unwrap_err();
    assert_eq!(err, VersioningError::PreconditionFailed);
}

/// With concurrency control off any token, or none, is admitted
#[test]
fn test_if_match_disabled() {
    let settings = VersioningSettings {
        if_match: false,
        ..VersioningSettings::default()
    };
    let people = collection_on(
        Arc::new(InMemoryStore::new()),
        ResourceConfig::versioned("people"),
        &settings,
    );
    people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    people.patch("p1", doc(json!({"age": 1})), None).unwrap();
    let outcome = people.patch("p1", doc(json!({"age": 2})), Some("junk")).unwrap();
    assert_eq!(outcome.version, Some(3));
}

/// Quoted and weak forms of a token are accepted
#[test]
fn test_header_token_forms() {
    let people = collection(ResourceConfig::versioned("people"));
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    let quoted = format!("\"{}\"", created.fingerprint);
    let second = people
        .patch("p1", doc(json!({"age": 1})), Some(quoted.as_str()))
        .unwrap();

    let weak = format!("W/\"{}\"", second.fingerprint);
    let third = people
        .patch("p1", doc(json!({"age": 2})), Some(weak.as_str()))
        .unwrap();
    assert_eq!(third.version, Some(3));
}

/// Fields on the ignore list do not affect the token
#[test]
fn test_ignored_fields_do_not_invalidate_tokens() {
    let settings = VersioningSettings {
        etag_ignore_fields: vec!["views".to_string()],
        ..VersioningSettings::default()
    };
    let store = Arc::new(InMemoryStore::new());
    let people = collection_on(store.clone(), ResourceConfig::versioned("people"), &settings);
    let created = people
        .create(doc(json!({"_id": "p1", "name": "Ada", "views": 1})))
        .unwrap();

    // an out-of-band counter bump
    let mut stored = store.find_one("people", "p1").unwrap().unwrap();
    stored.insert("views", json!(2));
    store.put_raw("people", "p1", stored).unwrap();

    let outcome = people
        .patch("p1", doc(json!({"name": "Grace"})), Some(created.fingerprint.as_str()))
        .unwrap();
    assert_eq!(outcome.version, Some(2));
}

// =============================================================================
// Conditional update race
// =============================================================================

/// A writer that lands between the check and the update wins; the loser
/// gets PreconditionFailed and writes no history
#[test]
fn test_concurrent_writer_wins() {
    let store = Arc::new(RacingStore::new());
    let people = collection_on(
        store.clone(),
        ResourceConfig::versioned("people"),
        &VersioningSettings::default(),
    );
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    store.intrude_once();
    let err = people
        .patch("p1", doc(json!({"name": "Grace"})), Some(created.fingerprint.as_str()))
        .unwrap_err();
    assert_eq!(err, VersioningError::PreconditionFailed);

    let snapshot = people.metrics().snapshot();
    assert_eq!(snapshot.conflict_rejections, 1);
    assert_eq!(snapshot.precondition_rejections, 0);

    let stored = store.inner.find_one("people", "p1").unwrap().unwrap();
    assert_eq!(stored.get("intruder"), Some(&json!(true)));
    assert_eq!(stored.get("name"), Some(&json!("Ada")));
    assert_eq!(people.shadow_records("p1").unwrap().len(), 1);
}

/// The same race on delete leaves the document in place
#[test]
fn test_concurrent_writer_blocks_delete() {
    let store = Arc::new(RacingStore::new());
    let people = collection_on(
        store.clone(),
        ResourceConfig::versioned("people"),
        &VersioningSettings::default(),
    );
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    store.intrude_once();
    let err = people.delete("p1", Some(created.fingerprint.as_str())).unwrap_err();
    assert_eq!(err, VersioningError::PreconditionFailed);
    assert!(store.inner.find_one("people", "p1").unwrap().is_some());
}

// =============================================================================
// Shadow write gap
// =============================================================================

/// A failed history append after the primary update is reported, counted,
/// and left in place
#[test]
fn test_shadow_failure_is_inconsistent() {
    let store = Arc::new(FaultyStore::new());
    let people = collection_on(
        store.clone(),
        ResourceConfig::versioned("people"),
        &VersioningSettings::default(),
    );
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    store.fail_shadow_inserts(true);
    let err = people
        .patch("p1", doc(json!({"name": "Grace"})), Some(created.fingerprint.as_str()))
        .unwrap_err();
    assert!(matches!(err, VersioningError::Inconsistent(_)));
    assert_eq!(err.status_code(), 500);
    store.fail_shadow_inserts(false);

    // primary update is not rolled back
    let live = read_one(&people, "p1", VersionSelector::Latest);
    assert_eq!(version_of(&live), json!(2));
    assert_eq!(content(&live), json!({"name": "Grace"}));
    assert_eq!(people.metrics().snapshot().shadow_write_failures, 1);

    // the gap shows on history reads
    assert!(matches!(
        people.read("p1", VersionSelector::All, None),
        Err(VersioningError::Inconsistent(_))
    ));
    assert!(matches!(
        people.read("p1", VersionSelector::Specific(2), None),
        Err(VersioningError::Inconsistent(_))
    ));
    let first = read_one(&people, "p1", VersionSelector::Specific(1));
    assert_eq!(content(&first), json!({"name": "Ada"}));
}

/// Re-appending an identical record is an idempotent retry; a different
/// record for the same version is not
#[test]
fn test_shadow_retry_deduplicated() {
    let people = collection(ResourceConfig::versioned("people"));
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();
    let record = created.shadow.unwrap();

    let writer = ShadowWriter::new(people.store(), people.config());
    assert_eq!(writer.append(&record).unwrap(), ShadowWrite::Deduplicated);

    let mut conflicting: ShadowRecord = record.clone();
    conflicting.changed.insert("name", json!("Grace"));
    assert!(matches!(
        writer.append(&conflicting),
        Err(VersioningError::Inconsistent(_))
    ));
    assert_eq!(people.shadow_records("p1").unwrap(), vec![record]);
}

// =============================================================================
// Delete
// =============================================================================

/// Deletes are gated like updates
#[test]
fn test_delete_requires_current_token() {
    let people = collection(ResourceConfig::versioned("people"));
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    assert_eq!(
        people.delete("p1", None).unwrap_err(),
        VersioningError::PreconditionRequired
    );
    assert_eq!(
        people.delete("p1", Some("stale")).unwrap_err(),
        VersioningError::PreconditionFailed
    );

    let outcome = people.delete("p1", Some(created.fingerprint.as_str())).unwrap();
    assert_eq!(outcome.version, Some(1));
    assert_eq!(outcome.purged, 0);
    assert!(matches!(
        people.read("p1", VersionSelector::Latest, None),
        Err(VersioningError::DocumentNotFound { .. })
    ));
    // history is kept by default
    assert_eq!(people.shadow_records("p1").unwrap().len(), 1);
}

/// Re-creating a deleted id continues after its kept history instead of
/// colliding with it
#[test]
fn test_recreate_after_delete_continues_numbering() {
    let people = collection(ResourceConfig::versioned("people"));
    let first = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();
    people.delete("p1", Some(first.fingerprint.as_str())).unwrap();

    let again = people.create(doc(json!({"_id": "p1", "name": "Grace"}))).unwrap();
    assert_eq!(again.version, Some(2));
    let anchor = again.shadow.unwrap();
    assert_eq!(anchor.changed.into_value(), json!({"name": "Grace"}));
    assert!(anchor.carried.is_empty());
    assert_eq!(people.metrics().snapshot().shadow_write_failures, 0);

    let earlier = read_one(&people, "p1", VersionSelector::Specific(1));
    assert_eq!(content(&earlier), json!({"name": "Ada"}));
    let current = read_one(&people, "p1", VersionSelector::Specific(2));
    assert_eq!(content(&current), json!({"name": "Grace"}));
    assert_eq!(version_of(&current), json!(2));
}

/// Re-creating with the deleted document's exact content still writes a
/// fresh record rather than reusing the old one
#[test]
fn test_recreate_with_same_content_writes_new_record() {
    let people = collection(ResourceConfig::versioned("people"));
    let first = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();
    people.delete("p1", Some(first.fingerprint.as_str())).unwrap();

    let again = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();
    assert_eq!(again.version, Some(2));

    let versions: Vec<u64> = people
        .shadow_records("p1")
        .unwrap()
        .iter()
        .map(|r| r.version)
        .collect();
    assert_eq!(versions, vec![1, 2]);
}

/// Creating over a live document is refused before anything is written
#[test]
fn test_create_over_live_document_rejected() {
    let people = collection(ResourceConfig::versioned("people"));
    people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();

    let err = people
        .create(doc(json!({"_id": "p1", "name": "Grace"})))
        .unwrap_err();
    assert!(matches!(err, VersioningError::AlreadyExists { .. }));
    assert_eq!(err.status_code(), 409);
    assert_eq!(people.shadow_records("p1").unwrap().len(), 1);
}

/// The purge policy drops history with the document
#[test]
fn test_delete_with_purge() {
    let people = collection(ResourceConfig::versioned("people").with_retention(RetentionPolicy::Purge));
    let created = people.create(doc(json!({"_id": "p1", "name": "Ada"}))).unwrap();
    let updated = people
        .patch("p1", doc(json!({"name": "Grace"})), Some(created.fingerprint.as_str()))
        .unwrap();

    let outcome = people.delete("p1", Some(updated.fingerprint.as_str())).unwrap();
    assert_eq!(outcome.version, Some(2));
    assert_eq!(outcome.purged, 2);
    assert!(people.shadow_records("p1").unwrap().is_empty());
    assert_eq!(people.metrics().snapshot().documents_deleted, 1);
}
