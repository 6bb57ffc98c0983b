//! Shared library loading.
//!
//! Every library is mapped at most once per process: the registry memoizes
//! handles by resolved path and keeps each mapping alive until exit, so
//! addresses resolved from a handle stay valid for the process lifetime.
//! A linker search name that turns out to resolve to an already mapped
//! library is recorded as an alias of that mapping.

use crate::error::LoadError;
use libloading::Library;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString, c_void};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, OnceLock};
use tracing::debug;

/// Environment variable consulted when no explicit path is given.
pub const LIBRARY_ENV: &str = "LJBIND_LIBRARY";

/// Default library names, tried in order.
#[cfg(all(unix, not(target_os = "macos")))]
pub const DEFAULT_CANDIDATES: &[&str] = &["libluajit.so", "libluajit-5.1.so", "libluajit-5.1.so.2"];

#[cfg(target_os = "macos")]
pub const DEFAULT_CANDIDATES: &[&str] = &[
    "libluajit.dylib",
    "libluajit-5.1.dylib",
    "libluajit-5.1.2.dylib",
];

#[cfg(windows)]
pub const DEFAULT_CANDIDATES: &[&str] = &["libluajit.dll", "lua51.dll"];

#[cfg(not(any(unix, windows)))]
pub const DEFAULT_CANDIDATES: &[&str] = &[];

/// Process-wide registry: resolved key -> loaded library.
/// Entries are never removed.
static LOADED: LazyLock<Mutex<HashMap<OsString, LibraryHandle>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Symbols of the running executable and everything it already links.
static THIS_PROCESS: OnceLock<LibraryHandle> = OnceLock::new();

struct LoadedLibrary {
    key: OsString,
    lib: Library,
    /// Platform handle; the linker returns the same one for every name
    /// that resolves to the same object.
    raw: Option<usize>,
}

/// Opaque token for a loaded library.
///
/// Cloning yields the same mapping; it never maps the library again.
#[derive(Clone)]
pub struct LibraryHandle {
    inner: Arc<LoadedLibrary>,
}

impl LibraryHandle {
    /// Handle over the symbols already present in this process.
    pub fn this_process() -> Result<LibraryHandle, LoadError> {
        if let Some(handle) = THIS_PROCESS.get() {
            return Ok(handle.clone());
        }
        let lib = this_process_library().map_err(|err| LoadError::LoadFailed {
            path: PathBuf::from("<process>"),
            reason: err.to_string(),
        })?;
        let handle = THIS_PROCESS.get_or_init(|| LibraryHandle {
            inner: Arc::new(LoadedLibrary {
                key: OsString::from("<process>"),
                lib,
                raw: None,
            }),
        });
        Ok(handle.clone())
    }

    /// The path or name the library was resolved from.
    pub fn key(&self) -> &OsStr {
        &self.inner.key
    }

    pub fn same_library(a: &LibraryHandle, b: &LibraryHandle) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Look up an exported symbol's address.
    ///
    /// Returns `None` when the symbol is absent or resolves to null.
    pub fn symbol_address(&self, name: &str) -> Option<*const c_void> {
        // SAFETY: the symbol is read as an address only; nothing is called here.
        let symbol = unsafe { self.inner.lib.get::<*const c_void>(name.as_bytes()) }.ok()?;
        let ptr = *symbol;
        if ptr.is_null() { None } else { Some(ptr) }
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("key", &self.inner.key)
            .finish()
    }
}

/// Where the loader looks for the library when no path is given.
#[derive(Clone, Debug)]
pub struct LoaderConfig {
    pub candidates: Vec<String>,
    /// Checked before the candidates; `None` disables the override.
    pub env_var: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            candidates: DEFAULT_CANDIDATES.iter().map(|s| s.to_string()).collect(),
            env_var: Some(LIBRARY_ENV.to_string()),
        }
    }
}

impl LoaderConfig {
    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = candidates.into_iter().map(Into::into).collect();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.env_var = None;
        self
    }

    /// Load from `path_hint`, or from the env override, or from the candidates.
    pub fn load(&self, path_hint: Option<&Path>) -> Result<LibraryHandle, LoadError> {
        if let Some(path) = path_hint {
            return load_path(path);
        }

        if let Some(var) = &self.env_var
            && let Some(value) = std::env::var_os(var)
            && !value.is_empty()
        {
            debug!(env = %var, path = ?value, "library path taken from environment");
            return load_path(Path::new(&value));
        }

        let mut tried = Vec::new();
        for candidate in &self.candidates {
            match load_path(Path::new(candidate)) {
                Ok(handle) => return Ok(handle),
                Err(LoadError::NotFound { .. }) => tried.push(candidate.clone()),
                Err(err) => return Err(err),
            }
        }
        Err(LoadError::NotFound { tried })
    }
}

/// Load the VM library with the default configuration.
pub fn load(path_hint: Option<&Path>) -> Result<LibraryHandle, LoadError> {
    LoaderConfig::default().load(path_hint)
}

/// Load one library, reusing an existing mapping for the same resolved path.
pub fn load_path(path: &Path) -> Result<LibraryHandle, LoadError> {
    let is_search_name = path.components().count() == 1 && !path.exists();
    let key: OsString = if is_search_name {
        path.as_os_str().to_owned()
    } else {
        path.canonicalize()
            .map_err(|_| LoadError::NotFound {
                tried: vec![path.display().to_string()],
            })?
            .into_os_string()
    };

    let mut loaded = LOADED.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(handle) = loaded.get(&key) {
        debug!(library = ?key, "reusing loaded library");
        return Ok(handle.clone());
    }

    let (lib, raw) =
        open_library(Path::new(&key)).map_err(|err| classify(path, err, !is_search_name))?;

    let existing = raw.and_then(|raw| loaded.values().find(|h| h.inner.raw == Some(raw)).cloned());
    if let Some(existing) = existing {
        debug!(library = ?key, alias_of = ?existing.key(), "library already mapped under another name");
        // Balances the reference count taken by the second open.
        drop(lib);
        loaded.insert(key, existing.clone());
        return Ok(existing);
    }
    debug!(library = ?key, "loaded native library");

    let handle = LibraryHandle {
        inner: Arc::new(LoadedLibrary {
            key: key.clone(),
            lib,
            raw,
        }),
    };
    loaded.insert(key, handle.clone());
    Ok(handle)
}

#[cfg(unix)]
fn open_library(path: &Path) -> Result<(Library, Option<usize>), libloading::Error> {
    use libloading::os::unix;
    // Global visibility lets C modules loaded later by the VM see its symbols.
    let flags = unix::RTLD_NOW | unix::RTLD_GLOBAL;
    // SAFETY: library initializers run here; the VM library has none with
    // preconditions we could violate.
    let lib = unsafe { unix::Library::open(Some(path), flags) }?;
    let raw = lib.into_raw();
    // SAFETY: `raw` was produced by `into_raw` just above.
    let lib = unsafe { unix::Library::from_raw(raw) };
    Ok((Library::from(lib), Some(raw as usize)))
}

#[cfg(windows)]
fn open_library(path: &Path) -> Result<(Library, Option<usize>), libloading::Error> {
    use libloading::os::windows;
    // SAFETY: see the unix variant.
    let lib = unsafe { windows::Library::new(path) }?;
    let raw = lib.into_raw();
    // SAFETY: `raw` was produced by `into_raw` just above.
    let lib = unsafe { windows::Library::from_raw(raw) };
    Ok((Library::from(lib), Some(raw as usize)))
}

#[cfg(not(any(unix, windows)))]
fn open_library(path: &Path) -> Result<(Library, Option<usize>), libloading::Error> {
    // SAFETY: see the unix variant.
    unsafe { Library::new(path) }.map(|lib| (lib, None))
}

#[cfg(unix)]
fn this_process_library() -> Result<Library, libloading::Error> {
    Ok(Library::from(libloading::os::unix::Library::this()))
}

#[cfg(windows)]
fn this_process_library() -> Result<Library, libloading::Error> {
    libloading::os::windows::Library::this().map(Library::from)
}

/// Separate "could not find it" from every other linker failure.
///
/// A file that exists on disk but fails to load (bad format, missing
/// dependency, unresolved symbol) is always `LoadFailed`. For a search name,
/// only a report about the requested file itself means it is absent.
fn classify(path: &Path, err: libloading::Error, on_disk: bool) -> LoadError {
    let reason = err.to_string();
    if !on_disk && reports_missing_file(&reason, path) {
        LoadError::NotFound {
            tried: vec![path.display().to_string()],
        }
    } else {
        LoadError::LoadFailed {
            path: path.to_path_buf(),
            reason,
        }
    }
}

/// Whether a linker message says `requested` could not be found, as opposed
/// to one of its dependencies.
pub(crate) fn reports_missing_file(reason: &str, requested: &Path) -> bool {
    let lowered = reason.to_ascii_lowercase();
    let missing = ["no such file", "not found", "cannot find", "could not be found"]
        .iter()
        .any(|phrase| lowered.contains(phrase));
    // dyld: "Library not loaded: <dependency>"
    if !missing || lowered.contains("library not loaded") {
        return false;
    }
    // Windows does not name the module in either case.
    if cfg!(windows) {
        return true;
    }
    let Some(name) = requested.file_name() else {
        return false;
    };
    let name = name.to_string_lossy().to_ascii_lowercase();
    // glibc: "<name>: cannot open shared object file"; dyld: "dlopen(<name>, ...)"
    lowered.starts_with(&format!("{name}:")) || lowered.contains(&format!("dlopen({name},"))
}
