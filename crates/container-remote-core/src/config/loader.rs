//! Environment loading helpers.
//!
//! Keeps the primary-key / alias fallback chain in one place so callers never
//! reach for `std::env::var` directly.

use std::env;
use std::path::Path;

/// Load `.env` from the current directory into the process environment.
/// Existing variables are never overwritten. Runs at most once.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let dir = env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
        load_dotenv_from_dir(&dir);
    });
}

/// Load `<dir>/.env`, skipping keys that are already set.
pub fn load_dotenv_from_dir(dir: &Path) {
    let Ok(content) = std::fs::read_to_string(dir.join(".env")) else {
        return;
    };
    for (key, value) in parse_dotenv(&content) {
        if env::var(&key).is_err() {
            set_env_var(&key, &value);
        }
    }
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped, a
/// trailing unquoted `# comment` is stripped and surrounding quotes removed.
pub fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().trim_start_matches("export ").trim();
        let mut value = value.trim();
        if let Some(hash_pos) = value.find('#') {
            let before_hash = value[..hash_pos].trim_end();
            if !before_hash.contains('"') && !before_hash.contains('\'') {
                value = before_hash;
            }
        }
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        if !key.is_empty() {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

/// Read the primary key or the first alias that is set, else the default.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Like [`env_or`] but returns `None` when unset; empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

// All `set_var` / `remove_var` calls go through these two wrappers.
// Callers must invoke them before spawning threads.

#[allow(unsafe_code)]
pub fn set_env_var(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

#[allow(unsafe_code)]
pub fn remove_env_var(key: &str) {
    unsafe { env::remove_var(key) };
}

/// RAII guard that removes the variable on drop.
pub struct ScopedEnvGuard(pub &'static str);

impl ScopedEnvGuard {
    pub fn set(key: &'static str, value: &str) -> Self {
        set_env_var(key, value);
        Self(key)
    }
}

impl Drop for ScopedEnvGuard {
    fn drop(&mut self) {
        remove_env_var(self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dotenv_strips_quotes_and_comments() {
        let pairs = parse_dotenv(
            "# comment\n\nA=1\nB = \"two words\"\nC=three # trailing\nexport D='four'\nbroken line\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "three".to_string()),
                ("D".to_string(), "four".to_string()),
            ]
        );
    }

    #[test]
    fn test_env_bool_and_aliases() {
        let _a = ScopedEnvGuard::set("CR_TEST_LOADER_ALIAS", "off");
        assert!(!env_bool("CR_TEST_LOADER_PRIMARY", &["CR_TEST_LOADER_ALIAS"], true));
        assert!(env_bool("CR_TEST_LOADER_MISSING", &[], true));

        let _p = ScopedEnvGuard::set("CR_TEST_LOADER_PRIMARY", "  ");
        assert_eq!(
            env_optional("CR_TEST_LOADER_PRIMARY", &[]),
            None,
            "blank values count as unset"
        );
        assert_eq!(
            env_or("CR_TEST_LOADER_NOPE", &[], || "fallback".to_string()),
            "fallback"
        );
    }
}
