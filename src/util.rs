//! Small pure helpers shared across the engine.

use std::io::Write;
use std::path::Path;

/// Lowercase a value and strip everything but ASCII alphanumerics.
///
/// Used wherever loosely-typed keys from different sources must compare
/// equal: prospect ids ("12345" vs 12345), instruction refs with stray
/// whitespace, email matching in the compliance grouper.
pub fn normalize_match_key(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Uppercase the first character of a string.
pub fn capitalize_first(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().to_string() + c.as_str(),
    }
}

/// Derive a display name from an email address (best-effort, last resort).
///
/// Splits the local part on `.`/`_`/`-`, strips digits, capitalizes each
/// token. Example: "jane.doe42@example.com" → ("Jane", "Doe").
pub fn name_from_email(email: &str) -> (String, String) {
    let local = email.split('@').next().unwrap_or(email);
    let tokens: Vec<String> = local
        .split(|c: char| c == '.' || c == '_' || c == '-')
        .map(|s| s.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
        .filter(|s| !s.is_empty())
        .map(|s| capitalize_first(&s))
        .collect();

    match tokens.len() {
        0 => (String::new(), String::new()),
        1 => (tokens[0].clone(), String::new()),
        _ => (tokens[0].clone(), tokens[1..].join(" ")),
    }
}

/// Parse a timestamp leniently: RFC3339 first, then a bare `YYYY-MM-DD` date.
///
/// Source records carry timestamps in both shapes depending on which upstream
/// system wrote them. Returns `None` for anything unparseable.
pub fn parse_timestamp(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| chrono::DateTime::from_naive_utc_and_offset(ndt, chrono::Utc))
}

/// Write a string to a file atomically (temp file in the same directory,
/// then rename). Readers never observe a half-written cache.
pub fn atomic_write_str(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "cache".to_string())
    ));
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
