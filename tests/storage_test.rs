//! Storage integration tests
//! Run with: cargo test --test storage_test

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use common::{ensure_init, open_json, user, FaultyStore};
use hawk_storage::{
    CacheConfig, CachedStore, CombinedStore, Diagnostics, ErrorKind, Group, GroupMessage, MessageRange, Sex,
    Store, User, UserFilter,
};

async fn combined_over(durable: Arc<dyn Store>) -> CombinedStore {
    let store = CombinedStore::new(durable, &CacheConfig::default(), Diagnostics::current());
    store.open().await.expect("combined store should open");
    store
}

async fn cached_over(inner: Arc<dyn Store>, config: &CacheConfig) -> CachedStore {
    let store = CachedStore::new(inner, config, Diagnostics::current());
    store.open().await.expect("cached store should open");
    store
}

/// Created users read back equal until they are updated or removed
#[tokio::test]
async fn test_created_user_reads_back_equal() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = combined_over(open_json(dir.path()).await).await;

    let alice = user("alice")
        .with_name("Alice")
        .with_sex(Sex::Female)
        .with_birthday(NaiveDate::from_ymd_opt(1991, 2, 3).unwrap());
    store.add_user(&alice).await.unwrap();
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), alice);
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), alice);

    let renamed = alice.clone().with_name("Alice L.");
    store.update_user(&renamed).await.unwrap();
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), renamed);

    store.remove_user(alice.uuid).await.unwrap();
    let err = store.get_user(alice.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Removing the same uuid twice reports NotFound the second time
#[tokio::test]
async fn test_double_remove_reports_not_found() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let json = open_json(dir.path()).await;
    let store = combined_over(json.clone()).await;

    let alice = user("alice");
    store.add_user(&alice).await.unwrap();
    store.remove_user(alice.uuid).await.unwrap();
    let err = store.remove_user(alice.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let group = Group::new(Uuid::new_v4(), "team");
    store.add_group(&group).await.unwrap();
    store.remove_group(group.uuid).await.unwrap();
    let err = store.remove_group(group.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = json.remove_user(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Creates never overwrite
#[tokio::test]
async fn test_duplicate_create_rejected_through_every_layer() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = combined_over(open_json(dir.path()).await).await;

    let alice = user("alice");
    store.add_user(&alice).await.unwrap();
    let overwrite = alice.clone().with_name("Mallory");
    let err = store.add_user(&overwrite).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), alice);
}

/// Groups survive the document encoding unchanged
#[tokio::test]
async fn test_group_document_round_trip() {
    let members: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    let groups = vec![
        Group::new(Uuid::new_v4(), ""),
        Group::new(Uuid::new_v4(), "team").with_members(members.clone()),
        Group::new(Uuid::new_v4(), "ünïcödé 🦅").with_members(members[..1].to_vec()),
    ];

    for group in groups {
        let encoded = serde_json::to_string(&group).unwrap();
        let decoded: Group = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, group);
    }
}

/// A failed durable write is reported and never shows up in the cache
#[tokio::test]
async fn test_write_through_failure_not_cached() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let faulty = Arc::new(FaultyStore::new(open_json(dir.path()).await));
    let cached = cached_over(faulty.clone(), &CacheConfig::default()).await;

    let alice = user("alice");
    cached.add_user(&alice).await.unwrap();
    assert_eq!(cached.get_user(alice.uuid).await.unwrap(), alice);

    faulty.fail_writes(true);
    let attempted = alice.clone().with_name("never stored");
    let err = cached.update_user(&attempted).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert_eq!(cached.get_user(alice.uuid).await.unwrap(), alice);
    faulty.fail_writes(false);

    let updated = alice.clone().with_name("stored");
    cached.update_user(&updated).await.unwrap();

    // The wrapped store is gone, the cache still answers with the new value.
    faulty.fail_reads(true);
    assert_eq!(cached.get_user(alice.uuid).await.unwrap(), updated);
}

/// Cache hits do not reach the wrapped store
#[tokio::test]
async fn test_read_through_hits_inner_once() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let json = open_json(dir.path()).await;
    let alice = user("alice");
    json.add_user(&alice).await.unwrap();

    let faulty = Arc::new(FaultyStore::new(json));
    let cached = cached_over(faulty.clone(), &CacheConfig::default()).await;

    for _ in 0..5 {
        assert_eq!(cached.get_user(alice.uuid).await.unwrap(), alice);
    }
    assert_eq!(faulty.reads(), 1);

    // Misses are not cached.
    let ghost = Uuid::new_v4();
    assert!(cached.get_user(ghost).await.is_err());
    assert!(cached.get_user(ghost).await.is_err());
    assert_eq!(faulty.reads(), 3);
}

/// Durable failures surface unchanged from the combined store
#[tokio::test]
async fn test_combined_forwards_durable_failures() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let faulty = Arc::new(FaultyStore::new(open_json(dir.path()).await));
    let store = combined_over(faulty.clone()).await;

    let alice = user("alice");
    faulty.fail_writes(true);
    let err = store.add_user(&alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    faulty.fail_writes(false);
    let err = store.get_user(alice.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    store.add_user(&alice).await.unwrap();
    faulty.fail_writes(true);
    let err = store.update_user(&alice.clone().with_name("lost")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    faulty.fail_writes(false);
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), alice);

    let group = Group::new(Uuid::new_v4(), "team");
    faulty.fail_writes(true);
    let err = store.add_group(&group).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    faulty.fail_writes(false);
    let err = store.get_group(group.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Flush failures in the real durable store also reach the caller
#[tokio::test]
async fn test_combined_reports_flush_failure() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let store = combined_over(open_json(&data).await).await;

    std::fs::remove_dir_all(&data).unwrap();
    let alice = user("alice");
    let err = store.add_user(&alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    let err = store.get_user(alice.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Reads after a failed flush show the state from before the write
#[tokio::test]
async fn test_combined_hides_failed_durable_writes() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    let store = combined_over(open_json(&data).await).await;

    let alice = user("alice").with_name("Alice");
    store.add_user(&alice).await.unwrap();
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), alice);

    std::fs::remove_dir_all(&data).unwrap();

    let bob = user("bob");
    let err = store.add_user(&bob).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    let err = store.get_user(bob.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let renamed = alice.clone().with_name("Renamed");
    let err = store.update_user(&renamed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), alice);

    assert_eq!(store.get_user_list(None).await.unwrap().uuids(), vec![alice.uuid]);
    let err = store.find_user_by_authentication("bob", "bob-hash").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Removing a member leaves the group consistent and updatable
#[tokio::test]
async fn test_removed_member_leaves_group_updatable() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = combined_over(open_json(dir.path()).await).await;

    let alice = user("alice");
    let bob = user("bob");
    store.add_user(&alice).await.unwrap();
    store.add_user(&bob).await.unwrap();
    let group = Group::new(Uuid::new_v4(), "team").with_members([alice.uuid, bob.uuid]);
    store.add_group(&group).await.unwrap();
    assert_eq!(store.get_group(group.uuid).await.unwrap(), group);

    store.remove_user(bob.uuid).await.unwrap();
    assert_eq!(
        store.get_group_user_list(group.uuid).await.unwrap(),
        BTreeSet::from([alice.uuid])
    );

    let mut renamed = store.get_group(group.uuid).await.unwrap();
    renamed.name = "renamed".to_string();
    store.update_group(&renamed).await.unwrap();
    assert_eq!(store.get_group(group.uuid).await.unwrap(), renamed);
    assert_eq!(
        store.get_user_groups(alice.uuid).await.unwrap(),
        BTreeSet::from([group.uuid])
    );
}

/// Updates to distinct uuids never interfere
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_to_distinct_users() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(combined_over(open_json(dir.path()).await).await);

    let users: Vec<User> = (0..32).map(|i| user(&format!("user{}", i))).collect();
    for u in &users {
        store.add_user(u).await.unwrap();
    }

    let mut handles = Vec::new();
    for u in users.clone() {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let updated = u.clone().with_name(format!("{} updated", u.login));
            store.update_user(&updated).await.map(|_| updated)
        }));
    }

    let mut expected = Vec::new();
    for handle in handles {
        expected.push(handle.await.unwrap().unwrap());
    }
    for u in expected {
        assert_eq!(store.get_user(u.uuid).await.unwrap(), u);
    }
}

/// Concurrent updates to one uuid end in one of the written values, the
/// same in cache and on the durable side
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_to_same_user() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let json = open_json(dir.path()).await;
    let store = Arc::new(combined_over(json.clone()).await);

    let alice = user("alice");
    store.add_user(&alice).await.unwrap();

    let versions: Vec<User> = (0..16)
        .map(|i| alice.clone().with_name(format!("version {}", i)))
        .collect();

    let mut handles = Vec::new();
    for version in versions.clone() {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.update_user(&version).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let cached = store.get_user(alice.uuid).await.unwrap();
    let durable = json.get_user(alice.uuid).await.unwrap();
    assert!(versions.contains(&cached));
    assert_eq!(cached, durable);
}

/// Readers racing a writer see either the old or the new record
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_racing_writes_are_never_torn() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(combined_over(open_json(dir.path()).await).await);

    let before = user("alice").with_name("before").with_sex(Sex::Male);
    let after = before.clone().with_name("after").with_sex(Sex::Female);
    store.add_user(&before).await.unwrap();

    let writer = {
        let store = Arc::clone(&store);
        let after = after.clone();
        tokio::spawn(async move { store.update_user(&after).await })
    };

    let mut readers = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        let uuid = before.uuid;
        readers.push(tokio::spawn(async move { store.get_user(uuid).await }));
    }

    writer.await.unwrap().unwrap();
    for reader in readers {
        let seen = reader.await.unwrap().unwrap();
        assert!(seen == before || seen == after, "torn read: {:?}", seen);
    }
}

/// The cache never grows past its configured bound
#[tokio::test]
async fn test_cache_is_bounded() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let config = CacheConfig {
        max_capacity: 10,
        time_to_idle: None,
    };
    let cached = cached_over(open_json(dir.path()).await, &config).await;

    let users: Vec<User> = (0..200).map(|i| user(&format!("user{}", i))).collect();
    for u in &users {
        cached.add_user(u).await.unwrap();
    }
    assert!(cached.entry_count().await <= 50);

    // Evicted entries are read through again.
    for u in &users {
        assert_eq!(&cached.get_user(u.uuid).await.unwrap(), u);
    }
}

/// Membership changes show up in both directions of the relation
#[tokio::test]
async fn test_membership_views_stay_consistent() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = combined_over(open_json(dir.path()).await).await;

    let alice = user("alice");
    let bob = user("bob");
    store.add_user(&alice).await.unwrap();
    store.add_user(&bob).await.unwrap();
    let group = Group::new(Uuid::new_v4(), "team").with_members([alice.uuid]);
    store.add_group(&group).await.unwrap();

    assert_eq!(store.get_user_groups(alice.uuid).await.unwrap(), BTreeSet::from([group.uuid]));
    assert!(store.get_user_groups(bob.uuid).await.unwrap().is_empty());

    store.set_group_users(group.uuid, &BTreeSet::from([bob.uuid])).await.unwrap();
    assert!(store.get_user_groups(alice.uuid).await.unwrap().is_empty());
    assert_eq!(store.get_user_groups(bob.uuid).await.unwrap(), BTreeSet::from([group.uuid]));
    assert_eq!(store.get_group_user_list(group.uuid).await.unwrap(), BTreeSet::from([bob.uuid]));

    let renamed = Group::new(group.uuid, "renamed")
        .with_registration_date(group.registration_date)
        .with_members([alice.uuid, bob.uuid]);
    store.update_group(&renamed).await.unwrap();
    assert_eq!(store.get_group(group.uuid).await.unwrap(), renamed);
    assert_eq!(store.get_user_groups(alice.uuid).await.unwrap(), BTreeSet::from([group.uuid]));

    store.clear_group_users(group.uuid).await.unwrap();
    assert!(store.get_user_groups(alice.uuid).await.unwrap().is_empty());
    assert!(store.get_user_groups(bob.uuid).await.unwrap().is_empty());

    let err = store.add_group_user(group.uuid, Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReference);
}

/// User listing with and without a filter
#[tokio::test]
async fn test_user_list_and_authentication() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = combined_over(open_json(dir.path()).await).await;

    let alice = user("alice").with_sex(Sex::Female);
    let bob = user("bob").with_sex(Sex::Male);
    store.add_user(&alice).await.unwrap();
    store.add_user(&bob).await.unwrap();

    let everyone = store.get_user_list(None).await.unwrap();
    assert_eq!(everyone.len(), 2);
    assert!(everyone.contains(&alice.uuid));

    let women = store.get_user_list(Some(&UserFilter::new().sex(Sex::Female))).await.unwrap();
    assert_eq!(women.uuids(), vec![alice.uuid]);

    let found = store.find_user_by_authentication("bob", "bob-hash").await.unwrap();
    assert_eq!(found, bob);
    let err = store.find_user_by_authentication("bob", "wrong").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PasswordIncorrect);
}

/// Full flow: group removal keeps the group's messages
#[tokio::test]
async fn test_end_to_end_tombstone_scenario() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let store = combined_over(open_json(dir.path()).await).await;

    let u1 = user("alice");
    store.add_user(&u1).await.unwrap();

    let g1 = Group::new(Uuid::new_v4(), "team");
    store.add_group(&g1).await.unwrap();
    store.add_group_user(g1.uuid, u1.uuid).await.unwrap();
    assert_eq!(store.get_group_user_list(g1.uuid).await.unwrap(), BTreeSet::from([u1.uuid]));

    let m1 = GroupMessage::text(Uuid::new_v4(), u1.uuid, g1.uuid, "hi");
    store.add_group_message(&m1).await.unwrap();

    store.remove_group(g1.uuid).await.unwrap();
    let err = store.get_group_user_list(g1.uuid).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.get_group_message(m1.uuid).await.unwrap(), m1);
    assert_eq!(
        store.get_group_messages(g1.uuid, &MessageRange::all()).await.unwrap(),
        vec![m1.clone()]
    );
    assert!(store.get_user_groups(u1.uuid).await.unwrap().is_empty());

    // New writes against the removed group are refused.
    let m2 = GroupMessage::text(Uuid::new_v4(), u1.uuid, g1.uuid, "anyone?");
    let err = store.add_group_message(&m2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidReference);
}

/// Everything written through the combined store is there after a restart
#[tokio::test]
async fn test_combined_state_survives_restart() {
    ensure_init();
    let dir = tempfile::tempdir().unwrap();
    let alice = user("alice");
    let bob = user("bob");
    let group = Group::new(Uuid::new_v4(), "team").with_members([alice.uuid, bob.uuid]);
    let message = GroupMessage::text(Uuid::new_v4(), bob.uuid, group.uuid, "hello");
    {
        let store = combined_over(open_json(dir.path()).await).await;
        store.add_user(&alice).await.unwrap();
        store.add_user(&bob).await.unwrap();
        store.add_user_contact(alice.uuid, bob.uuid).await.unwrap();
        store.add_group(&group).await.unwrap();
        store.add_group_message(&message).await.unwrap();
        let edited = message.clone().with_body(hawk_storage::MessageKind::Text, "hello!");
        store.update_group_message(&edited).await.unwrap();
        store.close().await;
    }

    let store = combined_over(open_json(dir.path()).await).await;
    assert_eq!(store.get_user(alice.uuid).await.unwrap(), alice);
    assert_eq!(store.get_user_contact_list(alice.uuid).await.unwrap(), BTreeSet::from([bob.uuid]));
    assert_eq!(store.get_group(group.uuid).await.unwrap(), group);
    assert_eq!(store.get_group_message(message.uuid).await.unwrap().body, "hello!");
}
