use super::*;

use std::{
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use shared::domain::UserId;

fn temp_root(label: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    env::temp_dir().join(format!("proto_social_{label}_{suffix}"))
}

fn session() -> Session {
    Session {
        token: "tok-123".into(),
        user_id: UserId(42),
    }
}

#[test]
fn missing_file_loads_as_signed_out() {
    let store = FileSessionStore::new(temp_root("missing").join("session.json"));
    assert_eq!(store.load().expect("load"), None);
    store.clear().expect("clear of missing file is fine");
}

#[test]
fn save_creates_parent_dirs_and_round_trips() {
    let root = temp_root("save");
    let store = FileSessionStore::new(root.join("nested").join("session.json"));

    store.save(&session()).expect("save");
    assert!(root.join("nested").exists());
    assert_eq!(store.load().expect("load"), Some(session()));

    let raw = fs::read_to_string(store.path()).expect("read");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(json["token"], "tok-123");
    assert_eq!(json["user_id"], 42);

    store.clear().expect("clear");
    assert_eq!(store.load().expect("load"), None);
    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn corrupt_file_is_a_session_error() {
    let root = temp_root("corrupt");
    fs::create_dir_all(&root).expect("mkdir");
    let path = root.join("session.json");
    fs::write(&path, "not json").expect("write");

    let err = FileSessionStore::new(&path).load().expect_err("must fail");
    assert!(matches!(err, ClientError::Session(_)));
    fs::remove_dir_all(root).expect("cleanup");
}

#[test]
fn memory_store_save_and_clear() {
    let store = MemorySessionStore::new();
    assert_eq!(store.load().expect("load"), None);
    store.save(&session()).expect("save");
    assert_eq!(store.load().expect("load"), Some(session()));
    store.clear().expect("clear");
    assert_eq!(store.load().expect("load"), None);
}
