//! Input discovery.
//!
//! Files named on the command line are checked as given, whatever their
//! name. Directories (an unpacked APK's `lib/`, an NDK build output, ...)
//! are walked for shared objects.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use walkdir::WalkDir;

use crate::verbose::{dprintln, vprintln};

/// Returns `true` for `libfoo.so` and versioned `libfoo.so.1.2` names.
pub fn is_shared_object_name(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".so") || name.contains(".so.")
}

/// Walks `dir` in file-name order and returns the shared objects under it,
/// along with the entries that could not be read.
fn walk_shared_objects(dir: &Path) -> (Vec<PathBuf>, Vec<walkdir::Error>) {
    let mut found = Vec::new();
    let mut errors = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_shared_object_name(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            Err(err) => errors.push(err),
        }
    }
    (found, errors)
}

/// Expands the command-line paths into the list of files to check.
///
/// Paths that do not exist are kept so the per-file report can say so.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();

    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }

        let (found, errors) = walk_shared_objects(path);
        for err in &errors {
            dprintln!("warning: skipping unreadable entry: {err}");
        }

        if found.is_empty() {
            dprintln!("warning: no shared objects found under {}", path.display());
        } else {
            vprintln!("  {}: {} shared object(s)", path.display(), found.len());
        }
        inputs.extend(found);
    }

    if inputs.is_empty() {
        bail!("no shared objects to check");
    }
    Ok(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("pagecheck-scan-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn shared_object_names() {
        assert!(is_shared_object_name(Path::new("lib/arm64-v8a/libc++_shared.so")));
        assert!(is_shared_object_name(Path::new("libz.so.1.3")));
        assert!(!is_shared_object_name(Path::new("libfoo.a")));
        assert!(!is_shared_object_name(Path::new("notes.sorted")));
        assert!(!is_shared_object_name(Path::new("/")));
    }

    #[test]
    fn files_are_kept_even_if_missing() {
        let inputs = collect_inputs(&[PathBuf::from("/nonexistent/libx.so")]).unwrap();
        assert_eq!(inputs, [PathBuf::from("/nonexistent/libx.so")]);
    }

    #[test]
    fn directories_are_walked_in_name_order() {
        let dir = scratch_dir("walk");
        std::fs::create_dir_all(dir.join("arm64-v8a")).unwrap();
        std::fs::write(dir.join("arm64-v8a/libb.so"), b"").unwrap();
        std::fs::write(dir.join("arm64-v8a/liba.so"), b"").unwrap();
        std::fs::write(dir.join("arm64-v8a/readme.txt"), b"").unwrap();

        let inputs = collect_inputs(&[dir.clone()]).unwrap();
        let names: Vec<_> = inputs
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["liba.so", "libb.so"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unreadable_entries_are_reported_not_dropped() {
        let (found, errors) = walk_shared_objects(Path::new("/nonexistent/pagecheck/lib"));
        assert!(found.is_empty());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path(), Some(Path::new("/nonexistent/pagecheck/lib")));
        assert!(errors[0].io_error().is_some());
    }

    #[test]
    fn walk_keeps_readable_entries() {
        let dir = scratch_dir("readable");
        std::fs::write(dir.join("libc.so"), b"").unwrap();
        let (found, errors) = walk_shared_objects(&dir);
        assert_eq!(found, [dir.join("libc.so")]);
        assert!(errors.is_empty());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = scratch_dir("empty");
        assert!(collect_inputs(&[dir.clone()]).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
