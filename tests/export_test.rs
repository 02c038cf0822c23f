use std::sync::Arc;

use mlarchive::config::ArchiveConfig;
use mlarchive::models::NewEmailList;
use mlarchive::service::ListService;
use mlarchive::Database;
use tempfile::TempDir;

fn archive_config(root: &std::path::Path) -> ArchiveConfig {
    ArchiveConfig {
        root_dir: root.join("archive").display().to_string(),
        export_dir: root.join("export").display().to_string(),
        cache_dir: root.join("cache").display().to_string(),
        notify_command: None,
    }
}

fn setup() -> (TempDir, Arc<Database>, ListService) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = dir.path().join("archive.db");
    let db = Arc::new(
        Database::new(db_path.to_str().expect("utf-8 path")).expect("Failed to create database"),
    );
    let service =
        ListService::new(&archive_config(dir.path()), db.clone()).expect("Failed to create service");
    (dir, db, service)
}

#[test]
fn test_list_creation_writes_export_file() {
    let (dir, _db, service) = setup();
    service
        .create_list(&NewEmailList::public("eng"))
        .expect("create list");

    let export_path = dir.path().join("export").join("email_lists.xml");
    let xml = std::fs::read_to_string(&export_path).expect("export file written");
    assert!(xml.contains("<shared_root name='eng' path='/var/isode/ms/shared/eng'>"));
    assert!(xml.contains("<group name='anyone' access='read,write'/>"));
}

#[test]
fn test_members_appear_in_export() {
    let (dir, _db, service) = setup();
    let list = service
        .create_list(&NewEmailList::private("board"))
        .expect("create list");
    service.add_member(&list, "alice").expect("add member");
    service.add_member(&list, "bob").expect("add member");

    let export_path = dir.path().join("export").join("email_lists.xml");
    let xml = std::fs::read_to_string(&export_path).expect("export file written");
    assert!(xml.contains("<user name='anonymous' access='none'/>"));
    assert!(xml.contains("<user name='alice' access='read,write'/>"));
    assert!(xml.contains("<user name='bob' access='read,write'/>"));
}

#[test]
fn test_snapshot_is_ordered_by_list_name() {
    let (_dir, _db, service) = setup();
    service
        .create_list(&NewEmailList::public("zeta"))
        .expect("create list");
    service
        .create_list(&NewEmailList::public("alpha"))
        .expect("create list");

    let info = service.list_info().expect("list info");
    let names: Vec<&str> = info.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn test_cache_is_invalidated_on_list_mutation() {
    let (_dir, _db, service) = setup();
    service
        .create_list(&NewEmailList::public("eng"))
        .expect("create list");

    // First read populates the cache
    let before = service.list_info().expect("list info");
    assert_eq!(before.len(), 1);

    // A mutation must invalidate synchronously; the next read sees the
    // new list rather than the cached snapshot
    service
        .create_list(&NewEmailList::public("ops"))
        .expect("create list");
    let after = service.list_info().expect("list info");
    assert_eq!(after.len(), 2);
}

#[test]
fn test_member_change_refreshes_snapshot() {
    let (_dir, _db, service) = setup();
    let list = service
        .create_list(&NewEmailList::private("board"))
        .expect("create list");

    assert!(service.list_info().expect("info")[0].members.is_empty());

    service.add_member(&list, "alice").expect("add member");
    assert_eq!(
        service.list_info().expect("info")[0].members,
        vec!["alice".to_string()]
    );

    service.remove_member(&list, "alice").expect("remove member");
    assert!(service.list_info().expect("info")[0].members.is_empty());
}

#[test]
fn test_failing_notify_command_does_not_fail_mutation() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let mut config = archive_config(dir.path());
    config.notify_command = Some("/no/such/command-xyz".to_string());

    let db_path = dir.path().join("archive.db");
    let db = Arc::new(
        Database::new(db_path.to_str().expect("utf-8 path")).expect("Failed to create database"),
    );
    let service = ListService::new(&config, db).expect("Failed to create service");

    // Export/notify failures are logged and swallowed
    let list = service
        .create_list(&NewEmailList::public("eng"))
        .expect("create list succeeds despite notify failure");
    assert_eq!(list.name, "eng");
}

#[test]
fn test_update_and_delete_refresh_snapshot() {
    let (dir, _db, service) = setup();
    let mut list = service
        .create_list(&NewEmailList::public("eng"))
        .expect("create list");
    service
        .create_list(&NewEmailList::public("ops"))
        .expect("create list");

    list.private = true;
    service.update_list(&list).expect("update list");

    service.delete_list(&list).expect("delete list");
    let info = service.list_info().expect("list info");
    let names: Vec<&str> = info.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["ops"]);

    let export_path = dir.path().join("export").join("email_lists.xml");
    let xml = std::fs::read_to_string(&export_path).expect("export file written");
    assert!(!xml.contains("name='eng'"));
    assert!(xml.contains("name='ops'"));
}

#[test]
fn test_legacy_lookup() {
    let (_dir, db, _service) = setup();
    db.insert_legacy("eng", "old-message@x", 1042)
        .expect("insert legacy");

    assert_eq!(
        db.lookup_legacy("eng", 1042).expect("lookup"),
        Some("old-message@x".to_string())
    );
    assert_eq!(db.lookup_legacy("eng", 9999).expect("lookup"), None);
    assert_eq!(db.lookup_legacy("ops", 1042).expect("lookup"), None);
}
