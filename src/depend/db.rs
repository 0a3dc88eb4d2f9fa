//! Persistent header dependency database.
//!
//! Two tables of `header path -> mtime tick` are kept per build:
//!
//! - the *reference* table, loaded once from the JSON snapshot: what the
//!   database saw last build. Read-only until the next snapshot.
//! - the *observed* table, filled lazily as `.d` files are parsed during this
//!   build, guarded by a mutex. The first observation of a header wins.
//!
//! A source is considered outdated when any header its `.d` file lists is
//! unknown to the reference table or carries a different tick there.

use crate::depend::parse;
use crate::util;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

const DEFAULT_HEADER_EXTS: &[&str] = &["h", "hh", "hpp"];

#[derive(Debug, Serialize, Deserialize)]
struct DependEntry {
    fpath: String,
    ts: i64,
}

pub struct DependDb {
    /// Snapshot from the previous build. Never mutated.
    reference: HashMap<String, i64>,
    /// Headers seen during this build, first observation wins.
    observed: Mutex<HashMap<String, i64>>,
    header_exts: Vec<String>,
}

impl DependDb {
    /// Load the snapshot at `db_path` into the reference table.
    ///
    /// A missing, unparseable or internally inconsistent snapshot (empty
    /// path, zero tick, duplicate key) yields an empty reference table, so a
    /// corrupt database can only cause rebuilds, never a false "up to date".
    pub fn new(db_path: &Path, header_exts: Option<Vec<String>>) -> Self {
        Self {
            reference: load_reference(db_path),
            observed: Mutex::new(HashMap::new()),
            header_exts: header_exts
                .unwrap_or_else(|| DEFAULT_HEADER_EXTS.iter().map(|s| s.to_string()).collect()),
        }
    }

    /// Parse `dep_file` and record every header it lists into the observed
    /// table with its current on-disk tick, unless already recorded.
    ///
    /// Safe to call from multiple threads; a missing `.d` file is a no-op.
    pub fn update_depends(&self, dep_file: &Path) {
        let _ = self.observe_depends(dep_file);
    }

    /// Record the headers of `dep_file` (as [`update_depends`] does), then
    /// report whether any of them has changed since the last build.
    ///
    /// A header counts as changed when it is absent from the reference table
    /// or its reference tick differs from the observed one. The comparison is
    /// exact inequality, so an mtime that moved backwards (a restored file)
    /// still triggers a rebuild.
    ///
    /// `_source_ts` is accepted for symmetry with the caller, which has
    /// already compared source, object and dep-file mtimes; it is not
    /// consulted here.
    ///
    /// [`update_depends`]: DependDb::update_depends
    pub fn are_depends_outdated(&self, dep_file: &Path, _source_ts: i64) -> bool {
        self.observe_depends(dep_file)
            .iter()
            .any(|(header, tick)| match self.reference.get(header) {
                Some(reference_tick) => reference_tick != tick,
                None => true,
            })
    }

    /// Serialize the observed table to `db_path` as a pretty-printed JSON
    /// array, sorted by path. The file is only touched when its bytes differ.
    pub fn save(&self, db_path: &Path) -> Result<()> {
        let observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries: Vec<DependEntry> = observed
            .iter()
            .map(|(fpath, &ts)| DependEntry {
                fpath: fpath.clone(),
                ts,
            })
            .collect();
        drop(observed);

        entries.sort_by(|a, b| a.fpath.cmp(&b.fpath));
        let json = serde_json::to_string_pretty(&entries)?;
        util::write_if_changed(db_path, json.as_bytes())?;
        Ok(())
    }

    /// Parse `dep_file` and return each discovered header with the tick now
    /// recorded for it in the observed table.
    fn observe_depends(&self, dep_file: &Path) -> Vec<(String, i64)> {
        let content = match fs::read_to_string(dep_file) {
            Ok(content) => content,
            // No dependency file yet: no headers known. The caller's own
            // mtime comparison still drives recompilation.
            Err(_) => return Vec::new(),
        };

        let headers = parse::parse_headers(&content, &self.header_exts);

        // Stat outside the lock; the critical section is insertions only.
        let ticks: Vec<(String, i64)> = headers
            .into_iter()
            .map(|header| {
                let tick = util::mtime_tick(Path::new(&header));
                (header, tick)
            })
            .collect();

        let mut observed = self.observed.lock().unwrap_or_else(|e| e.into_inner());
        ticks
            .into_iter()
            .map(|(header, tick)| {
                let effective = *observed.entry(header.clone()).or_insert(tick);
                (header, effective)
            })
            .collect()
    }
}

fn load_reference(db_path: &Path) -> HashMap<String, i64> {
    let content = match fs::read_to_string(db_path) {
        Ok(content) => content,
        Err(_) => return HashMap::new(),
    };

    let entries: Vec<DependEntry> = match serde_json::from_str(&content) {
        Ok(entries) => entries,
        Err(_) => return HashMap::new(),
    };

    let mut reference = HashMap::with_capacity(entries.len());
    for entry in entries {
        // A malformed or duplicate entry invalidates the whole snapshot
        // rather than leaving a partially trusted table behind.
        if entry.fpath.is_empty() || entry.ts == 0 {
            return HashMap::new();
        }
        if reference.insert(entry.fpath, entry.ts).is_some() {
            return HashMap::new();
        }
    }
    reference
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::MISSING_TICK;
    use std::path::PathBuf;

    fn write_dep_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_empty_reference_on_missing_db() {
        let dir = tempfile::tempdir().unwrap();
        let db = DependDb::new(&dir.path().join("absent.json"), None);
        assert!(db.reference.is_empty());
    }

    #[test]
    fn test_corrupt_db_yields_empty_reference() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = write_dep_file(dir.path(), "db.json", "{ not json !");
        let db = DependDb::new(&db_path, None);
        assert!(db.reference.is_empty());
    }

    #[test]
    fn test_zero_tick_invalidates_whole_db() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = write_dep_file(
            dir.path(),
            "db.json",
            r#"[{"fpath": "a.h", "ts": 5}, {"fpath": "b.h", "ts": 0}]"#,
        );
        let db = DependDb::new(&db_path, None);
        assert!(db.reference.is_empty());
    }

    #[test]
    fn test_duplicate_key_invalidates_whole_db() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = write_dep_file(
            dir.path(),
            "db.json",
            r#"[{"fpath": "a.h", "ts": 5}, {"fpath": "a.h", "ts": 7}]"#,
        );
        let db = DependDb::new(&db_path, None);
        assert!(db.reference.is_empty());
    }

    #[test]
    fn test_empty_fpath_invalidates_whole_db() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = write_dep_file(dir.path(), "db.json", r#"[{"fpath": "", "ts": 5}]"#);
        let db = DependDb::new(&db_path, None);
        assert!(db.reference.is_empty());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = write_dep_file(
            dir.path(),
            "db.json",
            r#"[{"fpath": "a.h", "ts": 5, "extra": true}]"#,
        );
        let db = DependDb::new(&db_path, None);
        assert_eq!(db.reference.get("a.h"), Some(&5));
    }

    #[test]
    fn test_missing_dep_file_reports_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let db = DependDb::new(&dir.path().join("db.json"), None);
        assert!(!db.are_depends_outdated(&dir.path().join("absent.d"), 0));
    }

    #[test]
    fn test_unknown_header_is_outdated() {
        let dir = tempfile::tempdir().unwrap();
        let header = write_dep_file(dir.path(), "board.h", "#pragma once\n");
        let dep = write_dep_file(
            dir.path(),
            "main.d",
            &format!("main.o: main.c {}\n", header.display()),
        );

        let db = DependDb::new(&dir.path().join("db.json"), None);
        assert!(db.are_depends_outdated(&dep, 0));
    }

    #[test]
    fn test_save_then_reload_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let header = write_dep_file(dir.path(), "board.h", "#pragma once\n");
        let dep = write_dep_file(
            dir.path(),
            "main.d",
            &format!("main.o: main.c {}\n", header.display()),
        );
        let db_path = dir.path().join("db.json");

        let first = DependDb::new(&db_path, None);
        assert!(first.are_depends_outdated(&dep, 0));
        first.save(&db_path).unwrap();

        let second = DependDb::new(&db_path, None);
        assert!(!second.are_depends_outdated(&dep, 0));
    }

    #[test]
    fn test_touched_header_is_outdated_after_reload() {
        let dir = tempfile::tempdir().unwrap();
        let header = write_dep_file(dir.path(), "board.h", "#pragma once\n");
        let dep = write_dep_file(
            dir.path(),
            "main.d",
            &format!("main.o: main.c {}\n", header.display()),
        );
        let db_path = dir.path().join("db.json");

        let first = DependDb::new(&db_path, None);
        first.update_depends(&dep);
        first.save(&db_path).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(&header, "#pragma once\n// touched\n").unwrap();

        let second = DependDb::new(&db_path, None);
        assert!(second.are_depends_outdated(&dep, 0));
    }

    #[test]
    fn test_first_observation_wins() {
        let dir = tempfile::tempdir().unwrap();
        let header = write_dep_file(dir.path(), "board.h", "#pragma once\n");
        let dep = write_dep_file(
            dir.path(),
            "main.d",
            &format!("main.o: main.c {}\n", header.display()),
        );

        let db = DependDb::new(&dir.path().join("db.json"), None);
        db.update_depends(&dep);
        let before = db.observed.lock().unwrap()[&header.display().to_string()];

        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(&header, "#pragma once\n// touched mid-build\n").unwrap();
        db.update_depends(&dep);
        let after = db.observed.lock().unwrap()[&header.display().to_string()];

        assert_eq!(before, after);
    }

    #[test]
    fn test_missing_header_records_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let dep = write_dep_file(dir.path(), "main.d", "main.o: main.c ghost.h\n");

        let db = DependDb::new(&dir.path().join("db.json"), None);
        db.update_depends(&dep);
        assert_eq!(db.observed.lock().unwrap()["ghost.h"], MISSING_TICK);
    }

    #[test]
    fn test_concurrent_updates_disjoint_headers() {
        let dir = tempfile::tempdir().unwrap();
        let mut deps = Vec::new();
        for i in 0..8 {
            let header = write_dep_file(dir.path(), &format!("h{i}.h"), "#pragma once\n");
            deps.push(write_dep_file(
                dir.path(),
                &format!("s{i}.d"),
                &format!("s{i}.o: s{i}.c {}\n", header.display()),
            ));
        }

        let db = DependDb::new(&dir.path().join("db.json"), None);
        std::thread::scope(|scope| {
            for dep in &deps {
                scope.spawn(|| db.update_depends(dep));
            }
        });

        assert_eq!(db.observed.lock().unwrap().len(), 8);
    }
}
