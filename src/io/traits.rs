//! I/O trait definitions for fixer write paths.
//!
//! Fixers never touch `std::fs` directly when mutating project files. They go
//! through [`FileSystem`] so that write failures can be injected in tests and
//! the restore-on-failure path exercised without fiddling with permissions.

use std::io;
use std::path::Path;

/// File system operations used by fixers and the backup store.
///
/// # Implementation Notes
///
/// Implementations must leave the target untouched when `write` returns an
/// error before any bytes were written. The restore path relies on it.
pub trait FileSystem {
    /// Read a file's contents as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, permission is denied, or
    /// the file isn't valid UTF-8.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Write content to a file, creating it if it doesn't exist.
    fn write(&self, path: &Path, content: &str) -> io::Result<()>;

    /// Create a directory and all of its parents.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Check if a path is a file.
    fn is_file(&self, path: &Path) -> bool;
}
