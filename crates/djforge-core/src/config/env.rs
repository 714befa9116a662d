//! `.env` file entries

use super::write_atomic;
use std::path::Path;

fn needs_quotes(value: &str) -> bool {
    value.is_empty()
        || !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@<>".contains(c))
}

fn format_entry(key: &str, value: &str) -> String {
    if needs_quotes(value) {
        format!("{}=\"{}\"", key, value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        format!("{}={}", key, value)
    }
}

/// Set `entries` in `contents`, replacing existing keys in place and appending
/// new ones in the given order.
pub fn upsert(contents: &str, entries: &[(String, String)]) -> String {
    let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();

    for (key, value) in entries {
        let entry = format_entry(key, value);
        let existing = lines.iter().position(|line| {
            line.trim_start()
                .strip_prefix(key.as_str())
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        });
        match existing {
            Some(i) => lines[i] = entry,
            None => lines.push(entry),
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Apply [`upsert`] to the file at `path`, creating it if needed
pub fn set_entries(path: &Path, entries: &[(String, String)]) -> std::io::Result<()> {
    let current = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };
    let updated = upsert(&current, entries);
    if updated != current {
        write_atomic(path, updated.as_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_upsert_appends_in_order() {
        let out = upsert("", &entries(&[("SECRET_KEY", "abc"), ("DB_NAME", "app")]));
        assert_eq!(out, "SECRET_KEY=abc\nDB_NAME=app\n");
    }

    #[test]
    fn test_upsert_replaces_existing_key() {
        let out = upsert(
            "# comment\nSECRET_KEY = old\nSECRET_KEY_FALLBACKS=x\n",
            &entries(&[("SECRET_KEY", "new")]),
        );
        assert_eq!(out, "# comment\nSECRET_KEY=new\nSECRET_KEY_FALLBACKS=x\n");
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let e = entries(&[("SECRET_KEY", "abc"), ("DB_PASSWORD", "p@ss word")]);
        let once = upsert("", &e);
        assert_eq!(upsert(&once, &e), once);
        assert!(once.contains("DB_PASSWORD=\"p@ss word\""));
    }

    #[test]
    fn test_set_entries_creates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        set_entries(&path, &entries(&[("SECRET_KEY", "abc")])).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "SECRET_KEY=abc\n");
    }
}
