//! Containment guard for the indexing boundary.

use std::path::{Component, Path, PathBuf};

use sealdex_core::{SealdexError, SealdexResult};

/// Relativizes `target` against `base`, requiring `target` to lie
/// strictly beneath `base`.
///
/// `..` segments are resolved lexically before the containment check, so
/// `base/../base/x` is accepted while `base/../y` and sibling directories
/// sharing a name prefix with `base` are rejected. `base` itself is not
/// beneath `base`.
pub fn rel_path_strict(base: &Path, target: &Path) -> SealdexResult<PathBuf> {
    let base_abs = clean_absolute(base)?;
    let target_abs = clean_absolute(target)?;

    match target_abs.strip_prefix(&base_abs) {
        Ok(rest) if !rest.as_os_str().is_empty() => Ok(rest.to_path_buf()),
        _ => Err(SealdexError::PathEscape(target.to_path_buf())),
    }
}

/// Absolutizes `path` against the working directory and resolves `.` and
/// `..` components lexically.
fn clean_absolute(path: &Path) -> SealdexResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::Prefix(prefix) => cleaned.push(prefix.as_os_str()),
            Component::RootDir => cleaned.push(std::path::MAIN_SEPARATOR_STR),
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            Component::Normal(part) => cleaned.push(part),
        }
    }
    Ok(cleaned)
}
