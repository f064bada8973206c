#![no_main]

//! Random sequences of store operations against a real SQLite file. The
//! token and project readers must never panic on whatever was written.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tempfile::tempdir;

use timepulse::auth::{selected_project, SessionContext, TokenStore};
use timepulse::db::{Database, SELECTED_PROJECT_KEY, TOKEN_KEY};

#[derive(Arbitrary, Debug)]
enum Op {
    SetToken(String),
    ClearToken,
    SetRawProject(String),
    RemoveProject,
    SetItem(String, String),
}

fuzz_target!(|ops: Vec<Op>| {
    let dir = match tempdir() {
        Ok(d) => d,
        Err(_) => return,
    };
    let db = match Database::open(&dir.path().join("storage.db")) {
        Ok(d) => d,
        Err(_) => return,
    };

    for op in ops.into_iter().take(64) {
        let _ = match op {
            Op::SetToken(t) => TokenStore::new(&db).write(&t),
            Op::ClearToken => TokenStore::new(&db).clear().map(|_| ()),
            Op::SetRawProject(v) => db.set_item(SELECTED_PROJECT_KEY, &v),
            Op::RemoveProject => db.remove_item(SELECTED_PROJECT_KEY).map(|_| ()),
            Op::SetItem(k, v) => db.set_item(&k, &v),
        };

        if let Ok(Some(project)) = selected_project(&db) {
            assert!(project > 0);
        }
        if let Ok(Some(token)) = TokenStore::new(&db).read() {
            assert!(!token.trim().is_empty());
        }
        let _ = db.get_item(TOKEN_KEY);
        if let Ok(ctx) = SessionContext::load(&db) {
            let _ = ctx.readiness();
        }
    }
});
