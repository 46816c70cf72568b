use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::error::Result;

const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");
const FOLDERS: TableDefinition<&str, u64> = TableDefinition::new("folders");

/// Persistent key/value settings plus the list of folders indexed so far.
pub struct ConfigDb {
    db: Database,
}

impl ConfigDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(SETTINGS)?;
        txn.open_table(FOLDERS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }

    // -- Folders --

    /// Remember that `folder` was indexed at `indexed_at` (Unix seconds).
    pub fn record_folder(&self, folder: &str, indexed_at: u64) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FOLDERS)?;
            table.insert(folder, indexed_at)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn list_folders(&self) -> Result<Vec<(String, u64)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FOLDERS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value()));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (ConfigDb, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let db = ConfigDb::open(&tmp.path().join("config.redb")).unwrap();
        (db, tmp)
    }

    #[test]
    fn settings_round_trip() {
        let (db, _tmp) = open_temp();
        assert_eq!(db.get_setting("player_command").unwrap(), None);

        db.set_setting("player_command", "vlc").unwrap();
        assert_eq!(
            db.get_setting("player_command").unwrap().as_deref(),
            Some("vlc")
        );

        db.set_setting("player_command", "mpv").unwrap();
        assert_eq!(db.get_setting_or("player_command", "x").unwrap(), "mpv");
    }

    #[test]
    fn get_setting_or_falls_back() {
        let (db, _tmp) = open_temp();
        assert_eq!(db.get_setting_or("whisper_model", "base").unwrap(), "base");
    }

    #[test]
    fn remove_setting_reports_presence() {
        let (db, _tmp) = open_temp();
        db.set_setting("k", "v").unwrap();
        assert!(db.remove_setting("k").unwrap());
        assert!(!db.remove_setting("k").unwrap());
        assert!(db.get_setting("k").unwrap().is_none());
    }

    #[test]
    fn settings_are_listed_sorted() {
        let (db, _tmp) = open_temp();
        db.set_setting("b", "2").unwrap();
        db.set_setting("a", "1").unwrap();
        assert_eq!(
            db.list_settings().unwrap(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn folders_are_recorded() {
        let (db, _tmp) = open_temp();
        db.record_folder("/videos/talks", 100).unwrap();
        db.record_folder("/videos/talks", 200).unwrap();
        db.record_folder("/videos/lectures", 150).unwrap();

        assert_eq!(
            db.list_folders().unwrap(),
            vec![
                ("/videos/lectures".to_string(), 150),
                ("/videos/talks".to_string(), 200),
            ]
        );
    }

    #[test]
    fn reopen_keeps_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.redb");
        {
            let db = ConfigDb::open(&path).unwrap();
            db.set_setting("active_folder", "/v").unwrap();
        }
        let db = ConfigDb::open(&path).unwrap();
        assert_eq!(db.get_setting("active_folder").unwrap().as_deref(), Some("/v"));
    }
}
