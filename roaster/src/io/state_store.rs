//! Persistent storage for the singleton roaster record.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use jsonschema::Draft;
use serde_json::Value;
use tracing::debug;

use crate::core::types::RoasterState;
use crate::io::lock::StateLock;

const STATE_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/roaster_state/v1.schema.json"
));

/// Durable home of the roaster record.
pub trait StateStore {
    /// Return the record, or `None` if it was never created.
    fn load(&mut self) -> Result<Option<RoasterState>>;

    /// Persist the full record. Readers never observe a partial write.
    fn save(&mut self, state: &RoasterState) -> Result<()>;

    /// Create the record from `default` unless one already exists.
    ///
    /// An existing record is returned unchanged.
    fn initialize(&mut self, default: RoasterState) -> Result<RoasterState> {
        if let Some(existing) = self.load()? {
            return Ok(existing);
        }
        debug!(name = %default.name, "creating roaster record");
        self.save(&default)?;
        Ok(default)
    }
}

/// JSON file store, locked for the lifetime of the value.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    _lock: StateLock,
}

impl FileStateStore {
    /// Open the store at `path`, waiting for any other invocation to finish.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock = StateLock::acquire(&path)?;
        Ok(Self { path, _lock: lock })
    }
}

impl StateStore for FileStateStore {
    fn load(&mut self) -> Result<Option<RoasterState>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no roaster record yet");
            return Ok(None);
        }
        let state = read_state(&self.path)?;
        debug!(
            path = %self.path.display(),
            heat_level = state.heat_level,
            fan_level = state.fan_level,
            "roaster record loaded"
        );
        Ok(Some(state))
    }

    fn save(&mut self, state: &RoasterState) -> Result<()> {
        debug!(
            path = %self.path.display(),
            heat_level = state.heat_level,
            fan_level = state.fan_level,
            "writing roaster record"
        );
        let mut buf = serde_json::to_string_pretty(state).context("serialize roaster record")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

/// Parse and schema-check a roaster record file.
pub fn read_state(path: &Path) -> Result<RoasterState> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read roaster record {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse roaster record {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("validate {}", path.display()))?;
    serde_json::from_value(value)
        .with_context(|| format!("deserialize roaster record {}", path.display()))
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(STATE_SCHEMA).context("parse state schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile state schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "roaster record schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let mut tmp = File::create(&tmp_path)
        .with_context(|| format!("create temp roaster record {}", tmp_path.display()))?;
    tmp.write_all(contents.as_bytes())
        .with_context(|| format!("write temp roaster record {}", tmp_path.display()))?;
    tmp.sync_all()
        .with_context(|| format!("sync temp roaster record {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("replace roaster record {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::state;
    use std::fs::TryLockError;

    #[test]
    fn load_returns_none_before_first_save() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = FileStateStore::open(temp.path().join("roaster.json")).expect("open");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn initialize_creates_once_and_never_overwrites() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = FileStateStore::open(temp.path().join("roaster.json")).expect("open");

        let created = store.initialize(RoasterState::default()).expect("init");
        assert_eq!(created, RoasterState::default());

        store.save(&state(80, 5)).expect("save");
        let again = store
            .initialize(RoasterState::new("Other"))
            .expect("init again");
        assert_eq!(again, state(80, 5));
    }

    #[test]
    fn saved_record_has_stable_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("roaster.json");
        let mut store = FileStateStore::open(&path).expect("open");
        store.save(&RoasterState::default()).expect("save");

        let contents = fs::read_to_string(&path).expect("read");
        let expected =
            "{\n  \"id\": 1,\n  \"name\": \"Beast\",\n  \"heat_level\": 0,\n  \"fan_level\": 0\n}\n";
        assert_eq!(contents, expected);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn out_of_range_record_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("roaster.json");
        fs::write(
            &path,
            r#"{"id": 1, "name": "Beast", "heat_level": 120, "fan_level": 3}"#,
        )
        .expect("write");
        let mut store = FileStateStore::open(&path).expect("open");
        let err = store.load().unwrap_err();
        assert!(format!("{:#}", err).contains("schema validation failed"));
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("roaster.json");
        fs::write(&path, "{\"id\": 1, \"name\": ").expect("write");
        let mut store = FileStateStore::open(&path).expect("open");
        let err = store.load().unwrap_err();
        assert!(format!("{:#}", err).contains("parse roaster record"));
    }

    #[test]
    fn open_store_keeps_other_openers_out() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = FileStateStore::open(temp.path().join("roaster.json")).expect("open");
        let other = File::open(temp.path().join("roaster.json.lock")).expect("open lock file");

        assert!(matches!(other.try_lock(), Err(TryLockError::WouldBlock)));

        drop(store);
        other.try_lock().expect("lock free once the store is closed");
    }
}
