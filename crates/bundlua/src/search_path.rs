//! Search-path templates in Lua's `package.path` format

use std::{
    fmt,
    path::{MAIN_SEPARATOR_STR, Path, PathBuf},
};

use cow_utils::CowUtils;

use crate::error::{BundleError, BundleResult};

/// Placeholder substituted with the module's path fragment
pub const PLACEHOLDER: char = '?';

/// One search-path pattern such as `src/?.lua` or `src/?/init.lua`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchPathTemplate {
    pattern: String,
    root: PathBuf,
}

impl SearchPathTemplate {
    pub fn new(pattern: impl Into<String>) -> BundleResult<Self> {
        let pattern = pattern.into();
        let Some(placeholder_at) = pattern.find(PLACEHOLDER) else {
            return Err(BundleError::InvalidTemplate {
                template: pattern,
                reason: format!("missing '{PLACEHOLDER}' placeholder"),
            });
        };

        let prefix = &pattern[..placeholder_at];
        let root = match prefix.rfind(['/', '\\']) {
            Some(separator_at) => PathBuf::from(&prefix[..=separator_at]),
            None => PathBuf::new(),
        };

        Ok(Self { pattern, root })
    }

    /// Join a relative template onto `base`. Absolute templates are returned unchanged.
    pub fn relative_to(&self, base: &Path) -> Self {
        if Path::new(&self.pattern).is_absolute() || base.as_os_str().is_empty() {
            return self.clone();
        }
        let joined = base.join(&self.pattern).to_string_lossy().into_owned();
        Self {
            root: base.join(&self.root),
            pattern: joined,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Directory that canonical module names are computed relative to
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Substitute `fragment` for every placeholder
    pub fn expand(&self, fragment: &str) -> PathBuf {
        PathBuf::from(self.pattern.cow_replace(PLACEHOLDER, fragment).into_owned())
    }
}

impl fmt::Display for SearchPathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// Ordered list of templates, tried first to last
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    templates: Vec<SearchPathTemplate>,
}

impl SearchPath {
    pub fn new(templates: Vec<SearchPathTemplate>) -> Self {
        Self { templates }
    }

    /// Parse a list of pattern strings
    pub fn from_patterns<I, S>(patterns: I) -> BundleResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let templates = patterns
            .into_iter()
            .map(SearchPathTemplate::new)
            .collect::<BundleResult<Vec<_>>>()?;
        Ok(Self { templates })
    }

    /// Parse a `;`-separated list as found in `LUA_PATH`. Empty entries,
    /// including Lua's `;;` default marker, are skipped.
    pub fn parse_lua_path(value: &str) -> BundleResult<Self> {
        Self::from_patterns(value.split(';').map(str::trim).filter(|p| !p.is_empty()))
    }

    /// The `?.lua` / `?/init.lua` pair for one directory
    pub fn for_directory(dir: &Path) -> Self {
        let base = if dir.as_os_str().is_empty() {
            String::new()
        } else {
            let mut base = dir.to_string_lossy().into_owned();
            if !base.ends_with(['/', '\\']) {
                base.push_str(MAIN_SEPARATOR_STR);
            }
            base
        };
        Self {
            templates: vec![
                SearchPathTemplate {
                    pattern: format!("{base}?.lua"),
                    root: dir.to_path_buf(),
                },
                SearchPathTemplate {
                    pattern: format!("{base}?{MAIN_SEPARATOR_STR}init.lua"),
                    root: dir.to_path_buf(),
                },
            ],
        }
    }

    pub fn extend(&mut self, other: Self) {
        for template in other.templates {
            if !self.templates.contains(&template) {
                self.templates.push(template);
            }
        }
    }

    pub fn templates(&self) -> &[SearchPathTemplate] {
        &self.templates
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Resolve relative templates against `base`
    pub fn relative_to(&self, base: &Path) -> Self {
        Self {
            templates: self.templates.iter().map(|t| t.relative_to(base)).collect(),
        }
    }
}
