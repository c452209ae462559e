//! Test helpers for building import documents and scratch databases.

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::json;
use tempfile::TempDir;

/// Scratch directory holding an import document and a database path.
pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .unwrap_or_else(|path| panic!("non UTF-8 temp path {path:?}"));
        Self { _dir: dir, root }
    }

    pub(super) fn database(&self) -> Utf8PathBuf {
        self.root.join("data").join("homescore.db")
    }

    pub(super) fn import_path(&self) -> Utf8PathBuf {
        self.root.join("import.json")
    }

    pub(super) fn write(&self, path: &Utf8Path, contents: &str) {
        std::fs::write(path, contents).unwrap_or_else(|err| panic!("write {path}: {err}"));
    }

    /// Three listings around Seoul Plaza: one beside it, one 300 m north
    /// and one well beyond walking distance.
    pub(super) fn write_seoul_document(&self) -> Utf8PathBuf {
        let document = json!({
            "listings": [
                listing(1, 37.5665),
                listing(2, 37.5692),
                listing(3, 37.6200),
            ],
            "amenities": [{
                "id": 10,
                "name": "Seoul Plaza",
                "category": "park",
                "location": { "latitude": 37.5665, "longitude": 126.9780 },
                "area_sq_m": 60000.0,
            }],
            "score_types": [{
                "id": 1,
                "name": "park",
                "description": "Green space within walking distance",
            }],
        });
        let path = self.import_path();
        self.write(&path, &document.to_string());
        path
    }
}

fn listing(id: u64, latitude: f64) -> serde_json::Value {
    json!({
        "id": id,
        "location": { "latitude": latitude, "longitude": 126.9780 },
        "source": "naver",
    })
}
