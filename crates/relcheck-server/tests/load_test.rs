use std::sync::Arc;
use std::time::Instant;

use relcheck_core::engine::EngineConfig;
use relcheck_core::model::ModelLimits;
use relcheck_core::tuple::{ObjectRef, SubjectRef, Tuple};
use relcheck_server::cache::DecisionCache;
use relcheck_server::config::CacheConfig;
use relcheck_server::service::{AuthzService, CheckInput, Consistency, ListObjectsInput};
use relcheck_storage::InMemoryStore;

const MODEL: &str = r#"
type user
type group {
    define member: [user]
}
type folder {
    define viewer: [user, group#member]
    define can_view: viewer
}
type document {
    define parent: [folder]
    define viewer: [user, group#member]
    define can_view: viewer or can_view from parent
}
"#;

fn make_service() -> AuthzService<InMemoryStore> {
    AuthzService::new(
        Arc::new(InMemoryStore::new()),
        EngineConfig::default(),
        ModelLimits::default(),
    )
    .with_cache(DecisionCache::new(&CacheConfig::default()))
}

fn tuple(object: &str, relation: &str, user: &str) -> Tuple {
    Tuple::new(
        object.parse::<ObjectRef>().unwrap(),
        relation,
        user.parse::<SubjectRef>().unwrap(),
    )
}

fn check_input(object: &str, consistency: Consistency) -> CheckInput {
    CheckInput {
        user: "user:alice".parse().unwrap(),
        relation: "can_view".to_string(),
        object: object.parse().unwrap(),
        model_id: None,
        consistency,
    }
}

#[tokio::test]
#[ignore]
async fn load_test_1000_tuples_hierarchical_check() {
    let service = make_service();
    service.write_model(MODEL).await.unwrap();

    let mut tuples = Vec::new();
    for folder_idx in 0..10 {
        let folder = format!("folder:f{folder_idx}");
        tuples.push(tuple(&folder, "viewer", "user:alice"));
        for doc_idx in 0..100 {
            let doc = format!("document:d_{folder_idx}_{doc_idx}");
            tuples.push(tuple(&doc, "parent", &folder));
        }
    }
    assert_eq!(tuples.len(), 1010);

    let revision = service.write_tuples(tuples, false, None).await.unwrap();

    let start = Instant::now();
    for i in 0..100 {
        let doc = format!("document:d_{}_{}", i % 10, i % 100);
        let output = service
            .check(check_input(&doc, Consistency::AtRevision(revision)))
            .await
            .unwrap();
        assert!(output.decision.allowed, "alice should view {doc}");
    }

    let elapsed = start.elapsed();
    eprintln!(
        "load_test_1000_tuples: 100 hierarchical checks in {:.2?} ({:.2?}/check)",
        elapsed,
        elapsed / 100,
    );
}

#[tokio::test]
#[ignore]
async fn load_test_10000_tuples_list_objects() {
    let service = make_service();
    service.write_model(MODEL).await.unwrap();

    let tuples: Vec<Tuple> = (0..10_000)
        .map(|i| tuple(&format!("document:d{i}"), "viewer", "user:alice"))
        .collect();
    for chunk in tuples.chunks(1000) {
        service
            .write_tuples(chunk.to_vec(), false, None)
            .await
            .unwrap();
    }

    let start = Instant::now();
    let objects = service
        .list_objects(ListObjectsInput {
            user: "user:alice".parse().unwrap(),
            relation: "can_view".to_string(),
            object_type: "document".to_string(),
            model_id: None,
        })
        .await
        .unwrap();

    let elapsed = start.elapsed();
    eprintln!(
        "load_test_10000_tuples: list_objects found {} objects in {:.2?}",
        objects.len(),
        elapsed,
    );
    assert_eq!(objects.len(), 10_000);
}

#[tokio::test]
#[ignore]
async fn load_test_cache_warm_vs_cold() {
    let service = make_service();
    service.write_model(MODEL).await.unwrap();

    let revision = service
        .write_tuples(
            vec![
                tuple("folder:f1", "viewer", "user:alice"),
                tuple("document:d1", "parent", "folder:f1"),
            ],
            false,
            None,
        )
        .await
        .unwrap();

    let cold_start = Instant::now();
    service
        .check(check_input("document:d1", Consistency::AtRevision(revision)))
        .await
        .unwrap();
    let cold_elapsed = cold_start.elapsed();

    let warm_start = Instant::now();
    for _ in 0..100 {
        service
            .check(check_input("document:d1", Consistency::AtRevision(revision)))
            .await
            .unwrap();
    }
    let warm_elapsed = warm_start.elapsed();

    eprintln!(
        "load_test_cache: 1 cold check in {:.2?}, 100 warm checks in {:.2?} ({:.2?}/check)",
        cold_elapsed,
        warm_elapsed,
        warm_elapsed / 100,
    );
}
