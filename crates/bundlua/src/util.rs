use std::{fs, path::Path};

use cow_utils::CowUtils;

use crate::error::{BundleError, BundleResult};

/// Normalize line endings to LF so bundles are identical across platforms
pub fn normalize_line_endings(content: &str) -> String {
    content
        .cow_replace("\r\n", "\n")
        .cow_replace('\r', "\n")
        .into_owned()
}

/// Read a Lua source file, dropping a UTF-8 byte order mark and normalizing line endings
pub fn read_source(path: &Path) -> BundleResult<String> {
    let content = fs::read_to_string(path).map_err(|source| BundleError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    Ok(normalize_line_endings(content))
}

/// Quote a string as a Lua double-quoted literal
pub fn lua_string_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_ascii_control() => quoted.push_str(&format!("\\{:03}", u32::from(c))),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
