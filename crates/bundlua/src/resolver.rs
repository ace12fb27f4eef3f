use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;
use log::{debug, warn};

use crate::{
    error::{BundleError, BundleResult},
    search_path::{SearchPath, SearchPathTemplate},
};

pub const LUA_PATH_VAR: &str = "LUA_PATH";

/// A scoped guard for safely setting and cleaning up the LUA_PATH environment variable.
///
/// This guard ensures that the LUA_PATH environment variable is properly restored
/// to its original value when the guard is dropped, even if a panic occurs during testing.
///
/// # Example
///
/// ```rust
/// use bundlua::resolver::LuaPathGuard;
/// let _guard = LuaPathGuard::new("/tmp/test/?.lua");
/// // LUA_PATH is now set to "/tmp/test/?.lua"
/// // When _guard goes out of scope, LUA_PATH is restored to its original value
/// ```
#[must_use = "LuaPathGuard must be held in scope to ensure cleanup"]
#[derive(Debug)]
pub struct LuaPathGuard {
    /// The original value of LUA_PATH, if it was set
    original_value: Option<String>,
}

impl LuaPathGuard {
    /// Create a new LUA_PATH guard with the given value.
    pub fn new(new_value: &str) -> Self {
        let original_value = std::env::var(LUA_PATH_VAR).ok();

        // SAFETY: This is safe in test contexts where we control the environment
        // and ensure proper cleanup via the Drop trait.
        unsafe {
            std::env::set_var(LUA_PATH_VAR, new_value);
        }

        Self { original_value }
    }

    /// Create a new LUA_PATH guard that ensures LUA_PATH is unset.
    pub fn unset() -> Self {
        let original_value = std::env::var(LUA_PATH_VAR).ok();

        // SAFETY: This is safe in test contexts where we control the environment
        // and ensure proper cleanup via the Drop trait.
        unsafe {
            std::env::remove_var(LUA_PATH_VAR);
        }

        Self { original_value }
    }
}

impl Drop for LuaPathGuard {
    fn drop(&mut self) {
        // Restore even while unwinding; swallow secondary panics
        #[allow(clippy::disallowed_methods)]
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            // SAFETY: restores the environment to its original state
            unsafe {
                match self.original_value.take() {
                    Some(original) => std::env::set_var(LUA_PATH_VAR, original),
                    None => std::env::remove_var(LUA_PATH_VAR),
                }
            }
        }));
    }
}

/// Module descriptor for require resolution
#[derive(Debug, Clone, PartialEq, Eq)]
struct ModuleDescriptor {
    /// Name parts (e.g., ["net", "http"] for "net.http" or "net/http")
    name_parts: Vec<String>,
}

impl ModuleDescriptor {
    fn from_module_name(name: &str) -> Self {
        let name_parts = name
            .split(['.', '/', '\\'])
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Self { name_parts }
    }

    /// Normalized dotted name used as the cache key
    fn dotted(&self) -> String {
        self.name_parts.join(".")
    }

    /// Path fragment substituted into templates
    fn fragment(&self) -> String {
        self.name_parts.join(std::path::MAIN_SEPARATOR_STR)
    }
}

/// A module located on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Canonical module name derived from the file's location under its search root
    pub canonical_name: String,
    /// Canonicalized path of the source file
    pub path: PathBuf,
    /// Path relative to the search root, `/`-separated
    pub display_path: String,
}

#[derive(Debug, Clone)]
enum CachedResolution {
    Found(ResolvedModule),
    Missing(Vec<PathBuf>),
}

#[derive(Debug)]
pub struct ModuleResolver {
    search_path: SearchPath,
    /// Cache of resolutions keyed by normalized module name
    module_cache: IndexMap<String, CachedResolution>,
}

impl ModuleResolver {
    /// Canonicalize a path, handling errors gracefully
    fn canonicalize_path(&self, path: PathBuf) -> PathBuf {
        match path.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) => {
                // Log warning but don't fail - return the original path
                warn!("Failed to canonicalize path {}: {}", path.display(), e);
                path
            }
        }
    }

    pub fn new(search_path: SearchPath) -> Self {
        Self {
            search_path,
            module_cache: IndexMap::new(),
        }
    }

    /// Create a resolver whose templates are followed by those of LUA_PATH.
    /// `lua_path_override` replaces the environment variable, for testing.
    pub fn new_with_lua_path(
        search_path: SearchPath,
        lua_path_override: Option<&str>,
    ) -> BundleResult<Self> {
        let mut search_path = search_path;
        let lua_path = lua_path_override
            .map(ToOwned::to_owned)
            .or_else(|| std::env::var(LUA_PATH_VAR).ok());

        if let Some(lua_path) = lua_path {
            let extra = SearchPath::parse_lua_path(&lua_path)?;
            debug!("Appending {} template(s) from {LUA_PATH_VAR}", extra.len());
            search_path.extend(extra);
        }

        Ok(Self::new(search_path))
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// Resolve a module name against the templates, first existing file wins
    pub fn resolve(&mut self, module_name: &str) -> BundleResult<ResolvedModule> {
        let descriptor = ModuleDescriptor::from_module_name(module_name);
        let key = descriptor.dotted();

        let resolution = match self.module_cache.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                let resolution = self.resolve_uncached(&descriptor);
                self.module_cache.insert(key, resolution.clone());
                resolution
            }
        };

        match resolution {
            CachedResolution::Found(resolved) => Ok(resolved),
            CachedResolution::Missing(attempted) => Err(BundleError::ModuleNotFound {
                module: module_name.to_string(),
                attempted,
            }),
        }
    }

    fn resolve_uncached(&self, descriptor: &ModuleDescriptor) -> CachedResolution {
        if descriptor.name_parts.is_empty() {
            return CachedResolution::Missing(Vec::new());
        }

        let fragment = descriptor.fragment();
        let mut attempted = Vec::with_capacity(self.search_path.len());

        for template in self.search_path.templates() {
            let candidate = template.expand(&fragment);
            if candidate.is_file() {
                debug!(
                    "Resolved '{}' to {} via '{template}'",
                    descriptor.dotted(),
                    candidate.display()
                );
                let relative = relative_components(&candidate, template.root());
                let resolved = ResolvedModule {
                    canonical_name: canonical_name_from_components(&relative),
                    display_path: relative.join("/"),
                    path: self.canonicalize_path(candidate),
                };
                return CachedResolution::Found(resolved);
            }
            attempted.push(candidate);
        }

        debug!(
            "Module '{}' not found after {} attempt(s)",
            descriptor.dotted(),
            attempted.len()
        );
        CachedResolution::Missing(attempted)
    }

    /// Describe a file that is not reached through `require`, such as the entry.
    ///
    /// The name is computed under the first template whose root contains the
    /// file; files outside every root are named after their file stem.
    pub fn describe_file(&self, path: &Path) -> ResolvedModule {
        let canonical = self.canonicalize_path(path.to_path_buf());

        for template in self.search_path.templates() {
            let Some(root) = canonical_root(template) else {
                continue;
            };
            if let Ok(relative) = canonical.strip_prefix(&root)
                && relative.components().next().is_some()
            {
                let relative = relative_components(relative, Path::new(""));
                return ResolvedModule {
                    canonical_name: canonical_name_from_components(&relative),
                    display_path: relative.join("/"),
                    path: canonical,
                };
            }
        }

        let file_name = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = vec![file_name];
        ResolvedModule {
            canonical_name: canonical_name_from_components(&relative),
            display_path: relative.join("/"),
            path: canonical,
        }
    }
}

fn canonical_root(template: &SearchPathTemplate) -> Option<PathBuf> {
    let root = template.root();
    if root.as_os_str().is_empty() {
        Path::new(".").canonicalize().ok()
    } else {
        root.canonicalize().ok()
    }
}

/// Components of `path` below `root`, as strings
fn relative_components(path: &Path, root: &Path) -> Vec<String> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// `a/b.lua` becomes `a.b` and `pkg/init.lua` becomes `pkg`
fn canonical_name_from_components(components: &[String]) -> String {
    let mut parts: Vec<&str> = components.iter().map(String::as_str).collect();
    if let Some(last) = parts.last_mut() {
        let file_name: &str = *last;
        *last = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file_name);
    }
    if parts.len() > 1 && parts.last() == Some(&"init") {
        parts.pop();
    }
    parts.join(".")
}
