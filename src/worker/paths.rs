use std::path::{Path, PathBuf};

/// Where a manifest-declared path landed after canonicalization.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Canonical absolute path, strictly inside the checkout.
    Inside(PathBuf),
    /// Resolves outside the checkout via `..` or symlink traversal.
    Outside,
    /// Does not exist.
    Missing,
}

/// Resolves `relative` against the checkout root using real-path
/// canonicalization, so symlinks cannot smuggle a path out of the checkout.
/// `root` must exist and already be canonical.
pub fn resolve_within(root: &Path, relative: &str) -> Resolution {
    let joined = root.join(relative);
    match joined.canonicalize() {
        Err(_) => Resolution::Missing,
        Ok(canonical) => {
            if canonical.starts_with(root) {
                Resolution::Inside(canonical)
            } else {
                Resolution::Outside
            }
        }
    }
}

/// Containment check for an already-existing candidate path (asset glob
/// matches). Returns the canonical path when it stays inside `root`.
pub fn contain(root: &Path, candidate: &Path) -> Option<PathBuf> {
    let canonical = candidate.canonicalize().ok()?;
    canonical.starts_with(root).then_some(canonical)
}
