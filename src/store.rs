use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An entry file: the entry's string fields, in their original order.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct EntryFile {
    pub version: u32,
    pub fields: IndexMap<String, String>,
}

/// Load an entry file. A missing file is an empty entry.
pub fn load_entry(path: &Path) -> anyhow::Result<EntryFile> {
    if !path.exists() {
        return Ok(EntryFile {
            version: 1,
            fields: IndexMap::new(),
        });
    }
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read entry file {}", path.display()))?;
    let entry: EntryFile = serde_json::from_str(&data)
        .with_context(|| format!("cannot parse entry file {}", path.display()))?;
    Ok(entry)
}

/// Save an entry file.
pub fn save_entry(path: &Path, entry: &EntryFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let s = serde_json::to_string_pretty(entry)?;
    std::fs::write(path, s)
        .with_context(|| format!("cannot write entry file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let entry = load_entry(&dir.path().join("none.json")).unwrap();
        assert!(entry.fields.is_empty());
    }

    #[test]
    fn field_order_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("work").join("github.json");
        let mut entry = EntryFile {
            version: 1,
            fields: IndexMap::new(),
        };
        entry.fields.insert("Title".into(), "GitHub".into());
        entry.fields.insert("otp".into(), "key=JBSWY3DPEHPK3PXP".into());
        entry.fields.insert("Notes".into(), "".into());
        save_entry(&path, &entry).unwrap();

        let back = load_entry(&path).unwrap();
        let keys: Vec<&str> = back.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, ["Title", "otp", "Notes"]);
    }
}
