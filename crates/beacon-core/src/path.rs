//! File spec resolution and path normalization.
//!
//! Callers address files three ways: a bare relative/absolute path, a
//! `pkg:/`-prefixed package path, or a [`FileSpec::SrcDest`] pair
//! (`pkgPath`/`srcPath` take precedence over `dest`/`src`). Resolution is
//! pure path algebra against the configured root directory: no filesystem
//! access, deterministic output.
//!
//! The target runtime's filesystem is case-insensitive, so every internal
//! lookup keys on lowercased paths while the stored paths preserve the
//! original casing for display.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The package-path prefix understood on input.
pub const PKG_PREFIX: &str = "pkg:/";

/// How a caller addresses a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileSpec {
    /// A bare path: absolute, root-relative, or `pkg:/`-prefixed.
    Path(String),
    /// An explicit source/destination pair.
    #[serde(rename_all = "camelCase")]
    SrcDest {
        #[serde(default)]
        src: Option<String>,
        #[serde(default)]
        src_path: Option<String>,
        #[serde(default)]
        dest: Option<String>,
        #[serde(default)]
        pkg_path: Option<String>,
    },
}

impl From<&str> for FileSpec {
    fn from(path: &str) -> Self {
        FileSpec::Path(path.to_string())
    }
}

impl From<String> for FileSpec {
    fn from(path: String) -> Self {
        FileSpec::Path(path)
    }
}

/// The two canonical identities of a resolved file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute source path, original casing.
    pub src_path: PathBuf,
    /// Root-relative package path, `/`-separated, no leading slash,
    /// original casing.
    pub pkg_path: String,
}

/// Strips a leading `pkg:/` (any case), if present.
pub fn strip_pkg_prefix(path: &str) -> Option<&str> {
    if path.len() >= PKG_PREFIX.len() && path[..PKG_PREFIX.len()].eq_ignore_ascii_case(PKG_PREFIX) {
        Some(&path[PKG_PREFIX.len()..])
    } else {
        None
    }
}

/// Normalizes a package-relative path: forward slashes, no leading `./` or
/// `/`, no `pkg:/` prefix.
pub fn normalize_pkg_path(path: &str) -> String {
    let path = strip_pkg_prefix(path).unwrap_or(path);
    let mut path = path.replace('\\', "/");
    while let Some(rest) = path.strip_prefix("./") {
        path = rest.to_string();
    }
    path.trim_start_matches('/').to_string()
}

/// Lowercased lookup key for a package path.
pub fn pkg_key(path: &str) -> String {
    normalize_pkg_path(path).to_lowercase()
}

/// Lowercased, separator-normalized lookup key for a source path.
pub fn src_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn pkg_path_from_src(src: &Path, root: &Path) -> Result<String, CoreError> {
    match src.strip_prefix(root) {
        Ok(relative) => Ok(normalize_pkg_path(&relative.to_string_lossy())),
        Err(_) => Err(CoreError::PathOutsideRoot {
            path: src.to_string_lossy().to_string(),
            root: root.to_string_lossy().to_string(),
        }),
    }
}

/// Resolves a [`FileSpec`] against the configured root directory.
pub fn resolve_file_spec(spec: &FileSpec, root_dir: &Path) -> Result<ResolvedPath, CoreError> {
    match spec {
        FileSpec::Path(path) => {
            if path.trim().is_empty() {
                return Err(CoreError::InvalidFileSpec {
                    reason: "empty path".to_string(),
                });
            }
            if let Some(rest) = strip_pkg_prefix(path) {
                let pkg_path = normalize_pkg_path(rest);
                return Ok(ResolvedPath {
                    src_path: root_dir.join(&pkg_path),
                    pkg_path,
                });
            }
            let candidate = Path::new(path);
            if candidate.is_absolute() {
                let pkg_path = pkg_path_from_src(candidate, root_dir)?;
                Ok(ResolvedPath {
                    src_path: candidate.to_path_buf(),
                    pkg_path,
                })
            } else {
                let pkg_path = normalize_pkg_path(path);
                Ok(ResolvedPath {
                    src_path: root_dir.join(&pkg_path),
                    pkg_path,
                })
            }
        }
        FileSpec::SrcDest {
            src,
            src_path,
            dest,
            pkg_path,
        } => {
            // pkgPath/srcPath take precedence over dest/src.
            let dest = pkg_path.as_deref().or(dest.as_deref());
            let src = src_path.as_deref().or(src.as_deref());

            match (src, dest) {
                (_, Some(dest)) if !dest.trim().is_empty() => {
                    let pkg_path = normalize_pkg_path(dest);
                    let src_path = match src {
                        Some(src) if !src.trim().is_empty() => {
                            let candidate = Path::new(src);
                            if candidate.is_absolute() {
                                candidate.to_path_buf()
                            } else {
                                root_dir.join(normalize_pkg_path(src))
                            }
                        }
                        _ => root_dir.join(&pkg_path),
                    };
                    Ok(ResolvedPath { src_path, pkg_path })
                }
                (Some(src), _) if !src.trim().is_empty() => {
                    resolve_file_spec(&FileSpec::Path(src.to_string()), root_dir)
                }
                _ => Err(CoreError::InvalidFileSpec {
                    reason: "file spec has neither a usable src nor dest".to_string(),
                }),
            }
        }
    }
}
