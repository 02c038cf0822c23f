use mlarchive::store::{compute_hashcode, MessageStore, FAILED_DIR, REMOVED_DIR};
use tempfile::TempDir;

fn store() -> (TempDir, MessageStore) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let store = MessageStore::new(dir.path().join("archive"));
    (dir, store)
}

#[test]
fn test_write_read_roundtrip() {
    let (_dir, store) = store();
    let raw = b"From: a@x\n\nbody\n";
    let hash = compute_hashcode(raw);

    let path = store.write("eng", &hash, raw).expect("write");
    assert_eq!(path, store.message_path("eng", &hash));
    assert!(store.exists("eng", &hash));
    assert_eq!(store.read("eng", &hash).expect("read"), raw.to_vec());
}

#[test]
fn test_layout_is_root_list_hash() {
    let (dir, store) = store();
    let raw = b"content";
    let hash = compute_hashcode(raw);
    let path = store.write("eng", &hash, raw).expect("write");

    assert_eq!(path, dir.path().join("archive").join("eng").join(&hash));
}

#[test]
fn test_relocate_moves_file() {
    let (_dir, store) = store();
    let raw = b"to be removed";
    let hash = compute_hashcode(raw);
    store.write("eng", &hash, raw).expect("write");

    let moved = store.relocate("eng", &hash, REMOVED_DIR).expect("relocate");
    assert!(moved);
    assert!(!store.exists("eng", &hash));

    let target = store.subdir("eng", REMOVED_DIR).join(&hash);
    assert!(target.exists());
    assert_eq!(std::fs::read(&target).expect("read"), raw.to_vec());
}

#[test]
fn test_relocate_missing_file_is_skipped() {
    let (_dir, store) = store();
    let moved = store
        .relocate("eng", "no-such-hash", REMOVED_DIR)
        .expect("relocate");
    assert!(!moved);
}

#[test]
fn test_read_or_placeholder_on_missing_file() {
    let (_dir, store) = store();
    let body = store.read_or_placeholder("eng", "no-such-hash");
    assert!(body.contains("Error reading message file"));
    assert!(body.contains("no-such-hash"));
}

#[test]
fn test_write_failed_preserves_bytes() {
    let (_dir, store) = store();
    let raw = b"not an email";
    let path = store.write_failed("eng", raw).expect("write failed");

    assert!(path.starts_with(store.subdir("eng", FAILED_DIR)));
    assert_eq!(std::fs::read(&path).expect("read"), raw.to_vec());

    // Re-delivery of the same junk lands on the same file
    let again = store.write_failed("eng", raw).expect("write failed again");
    assert_eq!(path, again);
}

#[cfg(unix)]
#[test]
fn test_directories_are_shared_writable() {
    use std::os::unix::fs::PermissionsExt;

    let (_dir, store) = store();
    let raw = b"perm check";
    let hash = compute_hashcode(raw);
    store.write("eng", &hash, raw).expect("write");

    let mode = std::fs::metadata(store.list_dir("eng"))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o7777, 0o2777);
}

#[test]
fn test_concurrent_directory_creation_tolerated() {
    let (_dir, store) = store();
    // Same list dir created from many threads at once; none may fail
    std::thread::scope(|scope| {
        for i in 0..8 {
            let store = store.clone();
            scope.spawn(move || {
                let raw = format!("message {i}").into_bytes();
                let hash = compute_hashcode(&raw);
                store.write("eng", &hash, &raw).expect("concurrent write");
            });
        }
    });

    let entries = std::fs::read_dir(store.list_dir("eng"))
        .expect("read dir")
        .count();
    assert_eq!(entries, 8);
}
