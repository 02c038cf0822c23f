use std::sync::Arc;

use mlarchive::config::ArchiveConfig;
use mlarchive::models::NewEmailList;
use mlarchive::service::{ArchiveService, Visibility};
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

fn setup() -> (TempDir, Arc<Database>, ArchiveService) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = dir.path().join("archive.db");
    let db = Arc::new(
        Database::new(db_path.to_str().expect("utf-8 path")).expect("Failed to create database"),
    );
    let service = ArchiveService::new(&archive_config(dir.path()), db.clone());
    (dir, db, service)
}

fn raw_message(msgid: &str, date: &str, extra_headers: &[(&str, &str)], body: &str) -> Vec<u8> {
    let mut raw = String::new();
    raw.push_str(&format!("Message-ID: <{msgid}>\n"));
    raw.push_str(&format!("Date: {date}\n"));
    raw.push_str("From: Bob Example <bob@example.com>\n");
    for (name, value) in extra_headers {
        raw.push_str(&format!("{name}: {value}\n"));
    }
    raw.push_str(&format!("Subject: thread test {msgid}\n"));
    raw.push('\n');
    raw.push_str(body);
    raw.into_bytes()
}

// A reply joins its parent's thread, an earlier-dated reference takes over
// as first, and removing it restores the previous first.
#[test]
fn test_thread_first_follows_minimum_date() {
    let (_dir, db, service) = setup();
    db.create_list(&NewEmailList::public("eng")).expect("create list");

    // M1 at T0, no reply headers: singleton thread
    let m1 = service
        .archive(
            &raw_message("m1@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "first"),
            "eng",
            Visibility::Public,
        )
        .expect("archive m1");
    let thread = db.get_thread(m1.thread_id).expect("get").expect("thread");
    assert_eq!(thread.first_id, Some(m1.id));

    // M2 at T0+1 replying to M1: joins the thread at depth 1, first unchanged
    let m2 = service
        .archive(
            &raw_message(
                "m2@x",
                "Mon, 01 Jan 2024 12:00:01 +0000",
                &[("In-Reply-To", "<m1@x>")],
                "reply",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive m2");
    assert_eq!(m2.thread_id, m1.thread_id);
    assert_eq!(m2.thread_depth, 1);
    assert_eq!(m2.in_reply_to_id, Some(m1.id));
    let thread = db.get_thread(m1.thread_id).expect("get").expect("thread");
    assert_eq!(thread.first_id, Some(m1.id));

    // M0 at T0-1 referencing M1: joins the thread and becomes first
    let m0 = service
        .archive(
            &raw_message(
                "m0@x",
                "Mon, 01 Jan 2024 11:59:59 +0000",
                &[("References", "<m1@x>")],
                "early",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive m0");
    assert_eq!(m0.thread_id, m1.thread_id);
    let thread = db.get_thread(m1.thread_id).expect("get").expect("thread");
    assert_eq!(thread.first_id, Some(m0.id));
    assert_eq!(thread.date, m0.date);

    // Removing M0 restores M1 as first
    service.remove(&m0).expect("remove m0");
    let thread = db.get_thread(m1.thread_id).expect("get").expect("thread");
    assert_eq!(thread.first_id, Some(m1.id));
    assert_eq!(thread.date, m1.date);
}

#[test]
fn test_detach_of_non_first_keeps_invariant() {
    let (_dir, db, service) = setup();
    db.create_list(&NewEmailList::public("eng")).expect("create list");

    let m1 = service
        .archive(
            &raw_message("a@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "root"),
            "eng",
            Visibility::Public,
        )
        .expect("archive");
    let m2 = service
        .archive(
            &raw_message(
                "b@x",
                "Mon, 01 Jan 2024 12:00:05 +0000",
                &[("In-Reply-To", "<a@x>")],
                "reply",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive");

    service.remove(&m2).expect("remove reply");
    let thread = db.get_thread(m1.thread_id).expect("get").expect("thread");
    assert_eq!(thread.first_id, Some(m1.id));
    assert_eq!(db.thread_members(m1.thread_id).expect("members").len(), 1);
}

#[test]
fn test_removing_sole_member_empties_thread() {
    let (_dir, db, service) = setup();
    db.create_list(&NewEmailList::public("eng")).expect("create list");

    let message = service
        .archive(
            &raw_message("solo@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "alone"),
            "eng",
            Visibility::Public,
        )
        .expect("archive");

    service.remove(&message).expect("remove");

    // The orphaned row stays but is unset and has no members
    let thread = db
        .get_thread(message.thread_id)
        .expect("get")
        .expect("row kept");
    assert_eq!(thread.first_id, None);
    assert!(!thread.is_established());
    assert!(db.thread_members(message.thread_id).expect("members").is_empty());
}

#[test]
fn test_thread_order_is_depth_first_with_date_tiebreak() {
    let (_dir, db, service) = setup();
    db.create_list(&NewEmailList::public("eng")).expect("create list");

    // root -> (early reply, late reply); the late reply arrives first
    let root = service
        .archive(
            &raw_message("root@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "root"),
            "eng",
            Visibility::Public,
        )
        .expect("archive root");
    let _late = service
        .archive(
            &raw_message(
                "late@x",
                "Mon, 01 Jan 2024 12:10:00 +0000",
                &[("In-Reply-To", "<root@x>")],
                "late",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive late");
    let _early = service
        .archive(
            &raw_message(
                "early@x",
                "Mon, 01 Jan 2024 12:05:00 +0000",
                &[("In-Reply-To", "<root@x>")],
                "early",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive early");
    let _nested = service
        .archive(
            &raw_message(
                "nested@x",
                "Mon, 01 Jan 2024 12:06:00 +0000",
                &[("In-Reply-To", "<early@x>")],
                "nested",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive nested");

    let ordered = db.thread_members_by_order(root.thread_id).expect("ordered");
    let msgids: Vec<&str> = ordered.iter().map(|m| m.msgid.as_str()).collect();
    // Preorder: root, then the earlier sibling subtree (with its nested
    // reply) before the later sibling
    assert_eq!(msgids, vec!["root@x", "early@x", "nested@x", "late@x"]);

    let depths: Vec<i64> = ordered.iter().map(|m| m.thread_depth).collect();
    assert_eq!(depths, vec![0, 1, 2, 1]);

    let orders: Vec<i64> = ordered.iter().map(|m| m.thread_order).collect();
    assert_eq!(orders, vec![0, 1, 2, 3]);
}

#[test]
fn test_parent_resolution_prefers_same_list() {
    let (_dir, db, service) = setup();
    db.create_list(&NewEmailList::public("eng")).expect("create list");
    db.create_list(&NewEmailList::public("ops")).expect("create list");

    // The same msgid archived in both lists; the same-list copy must win
    let eng_parent = service
        .archive(
            &raw_message("shared@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "eng copy"),
            "eng",
            Visibility::Public,
        )
        .expect("archive eng parent");
    let ops_parent = service
        .archive(
            &raw_message("shared@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "ops copy"),
            "ops",
            Visibility::Public,
        )
        .expect("archive ops parent");
    assert_ne!(eng_parent.thread_id, ops_parent.thread_id);

    let reply = service
        .archive(
            &raw_message(
                "reply@x",
                "Mon, 01 Jan 2024 12:01:00 +0000",
                &[("In-Reply-To", "<shared@x>")],
                "reply",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive reply");
    assert_eq!(reply.in_reply_to_id, Some(eng_parent.id));
    assert_eq!(reply.thread_id, eng_parent.thread_id);
}

#[test]
fn test_parent_resolution_falls_back_cross_list() {
    let (_dir, db, service) = setup();
    db.create_list(&NewEmailList::public("eng")).expect("create list");
    db.create_list(&NewEmailList::public("ops")).expect("create list");

    let parent = service
        .archive(
            &raw_message("origin@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "origin"),
            "eng",
            Visibility::Public,
        )
        .expect("archive parent");

    // A reply delivered to a different list still joins the thread
    let reply = service
        .archive(
            &raw_message(
                "crossreply@x",
                "Mon, 01 Jan 2024 12:01:00 +0000",
                &[("In-Reply-To", "<origin@x>")],
                "cross",
            ),
            "ops",
            Visibility::Public,
        )
        .expect("archive reply");
    assert_eq!(reply.in_reply_to_id, Some(parent.id));
    assert_eq!(reply.thread_id, parent.thread_id);
}

#[test]
fn test_references_fallback_when_in_reply_to_unresolvable() {
    let (_dir, db, service) = setup();
    db.create_list(&NewEmailList::public("eng")).expect("create list");

    let parent = service
        .archive(
            &raw_message("known@x", "Mon, 01 Jan 2024 12:00:00 +0000", &[], "known"),
            "eng",
            Visibility::Public,
        )
        .expect("archive parent");

    // In-Reply-To names an unknown message; References still resolves
    let reply = service
        .archive(
            &raw_message(
                "fallback@x",
                "Mon, 01 Jan 2024 12:01:00 +0000",
                &[
                    ("In-Reply-To", "<unknown@nowhere>"),
                    ("References", "<also-unknown@nowhere> <known@x>"),
                ],
                "fallback",
            ),
            "eng",
            Visibility::Public,
        )
        .expect("archive reply");
    assert_eq!(reply.in_reply_to_id, Some(parent.id));
    assert_eq!(reply.thread_id, parent.thread_id);
}
