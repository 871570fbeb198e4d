//! Organization use cases against a real SQLite file

use rulesync_storage::{
    CreateOrganization, Database, ErrorKind, FixedSession, Organization, OrganizationService,
    SqliteOrganizationStore,
};
use tempfile::TempDir;

fn setup() -> (TempDir, SqliteOrganizationStore, OrganizationService) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path().join("orgs.db")).unwrap();
    let store = SqliteOrganizationStore::new(db);
    let service = OrganizationService::new(store.clone());
    (temp_dir, store, service)
}

fn insert(store: &SqliteOrganizationStore, uuid: &str, key: &str, created_at: i64) {
    store
        .insert(&Organization {
            uuid: uuid.to_string(),
            key: key.to_string(),
            name: "the name".to_string(),
            description: Some("the description".to_string()),
            url: Some("the url".to_string()),
            avatar_url: Some("the avatar url".to_string()),
            created_at,
            updated_at: created_at,
        })
        .unwrap();
}

fn search_uuids(service: &OrganizationService, page: usize, page_size: usize) -> Vec<String> {
    service
        .search(Some(page), Some(page_size))
        .unwrap()
        .organizations
        .into_iter()
        .map(|o| o.uuid)
        .collect()
}

#[test]
fn test_delete_fails_without_system_admin_permission() {
    let (_dir, store, service) = setup();
    insert(&store, "uuid-1", "key-1", 1);

    let anonymous = FixedSession::anonymous();
    let err = service.delete(&anonymous, Some("uuid-1"), None).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
    let err = service.delete(&anonymous, None, Some("key-1")).unwrap_err();
    assert_eq!(err.message, "Insufficient privileges");

    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_delete_on_empty_table_succeeds() {
    let (_dir, _store, service) = setup();
    let admin = FixedSession::administrator();

    service.delete(&admin, Some("another uuid"), None).unwrap();
    service.delete(&admin, None, Some("another key")).unwrap();
}

#[test]
fn test_delete_missing_row_leaves_others() {
    let (_dir, store, service) = setup();
    let admin = FixedSession::administrator();
    insert(&store, "uuid-1", "key-1", 1);

    service.delete(&admin, Some("another uuid"), None).unwrap();
    service.delete(&admin, None, Some("another key")).unwrap();

    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_delete_existing_by_uuid_and_by_key() {
    let (_dir, store, service) = setup();
    let admin = FixedSession::administrator();
    insert(&store, "uuid-1", "key-1", 1);
    insert(&store, "uuid-2", "key-2", 2);
    insert(&store, "uuid-3", "key-3", 3);

    service.delete(&admin, Some("uuid-1"), None).unwrap();
    assert_eq!(store.count().unwrap(), 2);

    service.delete(&admin, None, Some("key-2")).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert!(store.select_by_uuid("uuid-3").unwrap().is_some());
}

#[test]
fn test_search_on_empty_db_returns_empty_pages() {
    let (_dir, _store, service) = setup();

    for (page, page_size) in [(None, None), (None, Some(1)), (Some(1), None), (Some(2), Some(1))] {
        let result = service.search(page, page_size).unwrap();
        assert!(result.organizations.is_empty());
        assert_eq!(result.total, 0);
    }
}

#[test]
fn test_search_defaults() {
    let (_dir, store, service) = setup();
    insert(&store, "uuid-1", "key-1", 1);

    let result = service.search(None, None).unwrap();
    assert_eq!(result.page, 1);
    assert_eq!(result.page_size, 25);
    assert_eq!(result.total, 1);
    assert_eq!(result.organizations.len(), 1);

    assert!(service.search(Some(2), None).unwrap().organizations.is_empty());
}

#[test]
fn test_search_orders_by_created_at_desc_with_paging() {
    let (_dir, store, service) = setup();
    let time = 1_000_000;
    insert(&store, "uuid3", "key-3", time);
    insert(&store, "uuid1", "key-1", time + 1_000);
    insert(&store, "uuid2", "key-2", time + 2_000);
    insert(&store, "uuid5", "key-5", time + 3_000);
    insert(&store, "uuid4", "key-4", time + 5_000);

    assert_eq!(search_uuids(&service, 1, 1), vec!["uuid4"]);
    assert_eq!(search_uuids(&service, 2, 1), vec!["uuid5"]);
    assert_eq!(search_uuids(&service, 3, 1), vec!["uuid2"]);
    assert_eq!(search_uuids(&service, 4, 1), vec!["uuid1"]);
    assert_eq!(search_uuids(&service, 5, 1), vec!["uuid3"]);
    assert!(search_uuids(&service, 6, 1).is_empty());

    assert_eq!(
        search_uuids(&service, 1, 5),
        vec!["uuid4", "uuid5", "uuid2", "uuid1", "uuid3"]
    );
    assert!(search_uuids(&service, 2, 5).is_empty());
    assert_eq!(search_uuids(&service, 1, 3), vec!["uuid4", "uuid5", "uuid2"]);
    assert_eq!(search_uuids(&service, 2, 3), vec!["uuid1", "uuid3"]);
}

#[test]
fn test_create_persists_organization() {
    let (_dir, store, service) = setup();
    let admin = FixedSession::administrator();

    let mut request = CreateOrganization::named("Foo Company");
    request.description = Some("Foo's desc".to_string());
    request.url = Some("https://foo.example".to_string());
    let created = service.create(&admin, request).unwrap();

    let loaded = store.select_by_key("foo-company").unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.description.as_deref(), Some("Foo's desc"));
}

#[test]
fn test_search_far_past_the_end_returns_empty_page() {
    let (_dir, store, service) = setup();
    insert(&store, "uuid1", "key-1", 1_000);

    let page = service.search(Some(400_000_000_000_000_000), Some(25)).unwrap();
    assert_eq!(page.page, 400_000_000_000_000_000);
    assert_eq!(page.total, 1);
    assert!(page.organizations.is_empty());

    // Offset overflows usize
    assert!(service
        .search(Some(usize::MAX), Some(usize::MAX))
        .unwrap()
        .organizations
        .is_empty());
    assert!(search_uuids(&service, usize::MAX, 1).is_empty());
}
