#![cfg(feature = "inmem-store")]

use chrono::{Duration, Utc};
use uuid::Uuid;

use anonboard::models::{Reply, Thread};
use anonboard::repo::{inmem::InMemRepo, RepoError};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use anonboard::repo::{ReplyRepo, ThreadRepo};

fn thread(board: &str, text: &str) -> Thread {
    let now = Utc::now();
    Thread {
        id: Uuid::new_v4(),
        board: board.into(),
        text: text.into(),
        created_on: now,
        bumped_on: now,
        reported: false,
        delete_password_hash: "hash".into(),
        replies: Vec::new(),
    }
}

fn reply(text: &str) -> Reply {
    let now = Utc::now();
    Reply {
        id: Uuid::new_v4(),
        text: text.into(),
        created_on: now,
        bumped_on: now,
        reported: false,
        delete_password_hash: "hash".into(),
    }
}

#[tokio::test]
async fn thread_and_reply_flow() {
    let r = InMemRepo::new();

    // starts empty
    assert!(r.list_threads("a", 10).await.unwrap().is_empty());

    let t = r.insert_thread(thread("a", "OP body")).await.unwrap();
    assert_eq!(r.get_thread(t.id).await.unwrap().text, "OP body");

    let first = reply("Hi");
    let updated = r.push_reply(t.id, first.clone()).await.unwrap();
    assert_eq!(updated.replies.len(), 1);
    assert_eq!(updated.bumped_on, first.created_on);

    r.push_reply(t.id, reply("again")).await.unwrap();
    let stored = r.get_thread(t.id).await.unwrap();
    let texts: Vec<_> = stored.replies.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, ["Hi", "again"]);
}

#[tokio::test]
async fn list_orders_by_bump_and_limits() {
    let r = InMemRepo::new();
    let base = Utc::now();
    for n in 0..5 {
        let mut t = thread("b", &format!("t{n}"));
        t.bumped_on = base + Duration::seconds(n);
        r.insert_thread(t).await.unwrap();
    }
    // an older thread on the same board bumped into the future
    let mut late = thread("b", "late");
    late.bumped_on = base - Duration::seconds(60);
    let late = r.insert_thread(late).await.unwrap();
    let mut bump = reply("bump");
    bump.created_on = base + Duration::seconds(100);
    r.push_reply(late.id, bump).await.unwrap();

    let listed = r.list_threads("b", 3).await.unwrap();
    let texts: Vec<_> = listed.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, ["late", "t4", "t3"]);
}

#[tokio::test]
async fn equal_bump_times_favour_newer_insert() {
    let r = InMemRepo::new();
    let at = Utc::now();
    for text in ["first", "second"] {
        let mut t = thread("c", text);
        t.created_on = at;
        t.bumped_on = at;
        r.insert_thread(t).await.unwrap();
    }
    assert_eq!(r.list_threads("c", 10).await.unwrap()[0].text, "second");
}

#[tokio::test]
async fn report_and_soft_delete_flags() {
    let r = InMemRepo::new();
    let t = r.insert_thread(thread("a", "op")).await.unwrap();
    let rep = reply("content");
    r.push_reply(t.id, rep.clone()).await.unwrap();

    r.report_thread(t.id).await.unwrap();
    r.report_reply(t.id, rep.id).await.unwrap();
    let later = Utc::now() + Duration::seconds(5);
    r.set_reply_text(t.id, rep.id, "[deleted]", later).await.unwrap();

    let stored = r.get_thread(t.id).await.unwrap();
    assert!(stored.reported);
    assert_eq!(stored.bumped_on, rep.created_on);
    let stored_reply = &stored.replies[0];
    assert!(stored_reply.reported);
    assert_eq!(stored_reply.text, "[deleted]");
    assert_eq!(stored_reply.bumped_on, later);
    assert_eq!(stored_reply.created_on, rep.created_on);
    assert_eq!(stored_reply.delete_password_hash, rep.delete_password_hash);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let r = InMemRepo::new();
    let t = r.insert_thread(thread("a", "op")).await.unwrap();
    let ghost = Uuid::new_v4();

    assert!(matches!(r.get_thread(ghost).await.unwrap_err(), RepoError::NotFound));
    assert!(matches!(r.report_thread(ghost).await.unwrap_err(), RepoError::NotFound));
    assert!(matches!(r.delete_thread(ghost).await.unwrap_err(), RepoError::NotFound));
    assert!(matches!(r.push_reply(ghost, reply("x")).await.unwrap_err(), RepoError::NotFound));
    assert!(matches!(r.report_reply(t.id, ghost).await.unwrap_err(), RepoError::NotFound));
    assert!(matches!(r.set_reply_text(t.id, ghost, "x", Utc::now()).await.unwrap_err(), RepoError::NotFound));
    // a failed push never creates a thread
    assert!(matches!(r.get_thread(ghost).await.unwrap_err(), RepoError::NotFound));
}

#[tokio::test]
async fn delete_removes_thread_with_replies() {
    let r = InMemRepo::new();
    let keep = r.insert_thread(thread("a", "keep")).await.unwrap();
    let gone = r.insert_thread(thread("a", "gone")).await.unwrap();
    r.push_reply(gone.id, reply("child")).await.unwrap();

    r.delete_thread(gone.id).await.unwrap();
    assert!(matches!(r.get_thread(gone.id).await.unwrap_err(), RepoError::NotFound));
    let listed = r.list_threads("a", 10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, keep.id);
}

#[tokio::test]
async fn snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let t = {
        let r = InMemRepo::with_snapshot_dir(dir.path());
        let t = r.insert_thread(thread("a", "persisted")).await.unwrap();
        r.push_reply(t.id, reply("kept")).await.unwrap();
        r.report_thread(t.id).await.unwrap();
        t
    };
    assert!(dir.path().join("state.json").exists());

    let reopened = InMemRepo::with_snapshot_dir(dir.path());
    let stored = reopened.get_thread(t.id).await.unwrap();
    assert_eq!(stored.text, "persisted");
    assert!(stored.reported);
    assert_eq!(stored.replies[0].text, "kept");
}

#[tokio::test]
async fn corrupt_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("state.json"), b"{not json").unwrap();
    let r = InMemRepo::with_snapshot_dir(dir.path());
    assert!(r.list_threads("a", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_snapshot_write_is_not_applied() {
    let dir = tempfile::tempdir().unwrap();
    // a regular file where the snapshot directory should be
    let blocked = dir.path().join("not-a-dir");
    std::fs::write(&blocked, b"").unwrap();
    let r = InMemRepo::with_snapshot_dir(&blocked);

    let err = r.insert_thread(thread("a", "lost")).await.unwrap_err();
    assert!(matches!(err, RepoError::Internal(_)));
    assert!(r.list_threads("a", 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_write_keeps_previous_state() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("boards");
    let r = InMemRepo::with_snapshot_dir(&dir);
    let t = r.insert_thread(thread("a", "kept")).await.unwrap();

    // snapshot directory becomes unwritable
    std::fs::remove_dir_all(&dir).unwrap();
    std::fs::write(&dir, b"").unwrap();

    assert!(matches!(r.report_thread(t.id).await.unwrap_err(), RepoError::Internal(_)));
    assert!(matches!(r.push_reply(t.id, reply("x")).await.unwrap_err(), RepoError::Internal(_)));
    assert!(matches!(r.delete_thread(t.id).await.unwrap_err(), RepoError::Internal(_)));

    let stored = r.get_thread(t.id).await.unwrap();
    assert!(!stored.reported);
    assert!(stored.replies.is_empty());
    assert_eq!(stored.bumped_on, t.bumped_on);
}

#[tokio::test]
async fn snapshot_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let r = InMemRepo::with_snapshot_dir(dir.path());
    let t = r.insert_thread(thread("a", "op")).await.unwrap();
    r.push_reply(t.id, reply("r")).await.unwrap();

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, ["state.json"]);
    let reopened = InMemRepo::with_snapshot_dir(dir.path());
    assert_eq!(reopened.get_thread(t.id).await.unwrap().replies.len(), 1);
}
