//! # engine-locate
//!
//! Find the external conversion engines docforge drives (LibreOffice,
//! Ghostscript and ImageMagick) without asking users to wire up absolute
//! paths by hand.
//!
//! ## How it works
//!
//! On first call to [`locate`] for a [`Tool`]:
//!
//! 1. Checks the tool's override variables (e.g. `IMAGEMAGICK_BIN`). A value
//!    may name an executable file, a directory containing the tool, or a bare
//!    command name that is looked up on `PATH`.
//! 2. Otherwise searches `PATH` for the tool's candidate names in order
//!    (`magick` before the ImageMagick 6 `convert`, `soffice` before
//!    `libreoffice`, …).
//! 3. Caches the answer for the rest of the process.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use engine_locate::{locate, Tool};
//!
//! let magick = locate(Tool::ImageMagick).expect("ImageMagick not installed");
//! println!("using {} (found via {})", magick.program.display(), magick.source);
//! ```
//!
//! ## Environment variable overrides
//!
//! | Tool        | Variables                            |
//! |-------------|--------------------------------------|
//! | Office      | `DOCFORGE_OFFICE_BIN`, `SOFFICE_BIN` |
//! | Ghostscript | `DOCFORGE_GS_BIN`, `GS_BIN`          |
//! | ImageMagick | `IMAGEMAGICK_BIN`, `MAGICK_BIN`      |

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use thiserror::Error;

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by engine-locate lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// No override was set and none of the candidate names is on `PATH`.
    #[error("{tool} not found: tried {candidates:?} on PATH.\nSet {hint} to the binary or its directory.")]
    NotFound {
        tool: Tool,
        candidates: Vec<&'static str>,
        hint: &'static str,
    },

    /// An override variable points at a directory with no candidate inside.
    #[error("{var}='{}' is a directory but contains none of {candidates:?}", .dir.display())]
    EmptyOverrideDir {
        var: &'static str,
        dir: PathBuf,
        candidates: Vec<&'static str>,
    },
}

// ── Tools ────────────────────────────────────────────────────────────────────

/// An external engine docforge knows how to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// LibreOffice in headless mode.
    Office,
    /// Ghostscript, the PostScript/PDF interpreter.
    Ghostscript,
    /// ImageMagick (`magick` 7, or `convert` 6).
    ImageMagick,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Office, Tool::Ghostscript, Tool::ImageMagick];

    /// Environment variables consulted before the `PATH` search, in order.
    pub fn env_vars(self) -> &'static [&'static str] {
        match self {
            Tool::Office => &["DOCFORGE_OFFICE_BIN", "SOFFICE_BIN"],
            Tool::Ghostscript => &["DOCFORGE_GS_BIN", "GS_BIN"],
            Tool::ImageMagick => &["IMAGEMAGICK_BIN", "MAGICK_BIN"],
        }
    }

    /// Executable names searched for, most preferred first.
    pub fn candidates(self) -> &'static [&'static str] {
        if cfg!(windows) {
            match self {
                Tool::Office => &["soffice.exe", "soffice.com"],
                Tool::Ghostscript => &["gswin64c.exe", "gswin32c.exe", "gs.exe"],
                // `convert.exe` on Windows is the filesystem tool, not ImageMagick.
                Tool::ImageMagick => &["magick.exe"],
            }
        } else {
            match self {
                Tool::Office => &["soffice", "libreoffice"],
                Tool::Ghostscript => &["gs"],
                Tool::ImageMagick => &["magick", "convert"],
            }
        }
    }

    /// Argument that makes the tool print its version and exit.
    pub fn version_arg(self) -> &'static str {
        match self {
            Tool::Office => "--version",
            Tool::Ghostscript => "--version",
            Tool::ImageMagick => "-version",
        }
    }

    /// Name used when nothing could be found; spawning it yields a clear
    /// "not found" error at invocation time.
    pub fn fallback_name(self) -> &'static str {
        self.candidates()[0]
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Office => f.write_str("LibreOffice"),
            Tool::Ghostscript => f.write_str("Ghostscript"),
            Tool::ImageMagick => f.write_str("ImageMagick"),
        }
    }
}

// ── Lookup results ───────────────────────────────────────────────────────────

/// Where a located binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Override variable naming an executable file.
    EnvFile,
    /// Override variable naming a directory that contains the tool.
    EnvDir,
    /// Override variable naming a command resolved on `PATH`.
    EnvCommand,
    /// Plain `PATH` search.
    Path,
    /// Nothing found; the bare fallback name is used.
    Fallback,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Source::EnvFile => "env:file",
            Source::EnvDir => "env:dir",
            Source::EnvCommand => "env:command",
            Source::Path => "path",
            Source::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// A resolved engine binary plus the environment it should run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub tool: Tool,
    pub program: PathBuf,
    pub source: Source,
    /// Extra environment for child processes (tool home, `PATH` prefix).
    pub env: Vec<(OsString, OsString)>,
}

// ── Per-process cache ────────────────────────────────────────────────────────

static OFFICE: OnceLock<Result<Located, LocateError>> = OnceLock::new();
static GHOSTSCRIPT: OnceLock<Result<Located, LocateError>> = OnceLock::new();
static IMAGEMAGICK: OnceLock<Result<Located, LocateError>> = OnceLock::new();

fn cache_for(tool: Tool) -> &'static OnceLock<Result<Located, LocateError>> {
    match tool {
        Tool::Office => &OFFICE,
        Tool::Ghostscript => &GHOSTSCRIPT,
        Tool::ImageMagick => &IMAGEMAGICK,
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Locate `tool`, consulting the process environment. Cached after the first
/// call.
pub fn locate(tool: Tool) -> Result<Located, LocateError> {
    cache_for(tool)
        .get_or_init(|| locate_with(tool, &|var| std::env::var_os(var)))
        .clone()
}

/// Like [`locate`], but never fails: when nothing is found the bare
/// candidate name is returned with [`Source::Fallback`].
pub fn locate_or_fallback(tool: Tool) -> Located {
    locate(tool).unwrap_or_else(|_| Located {
        tool,
        program: PathBuf::from(tool.fallback_name()),
        source: Source::Fallback,
        env: Vec::new(),
    })
}

/// Wrap an explicitly configured binary path. A directory is searched for
/// the tool's candidates the same way an override variable would be.
pub fn from_explicit(tool: Tool, path: &Path) -> Result<Located, LocateError> {
    if path.is_dir() {
        return locate_in_dir(tool, "explicit path", path);
    }
    Ok(Located {
        tool,
        program: path.to_path_buf(),
        source: Source::EnvFile,
        env: path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| tool_env(tool, dir))
            .unwrap_or_default(),
    })
}

/// Uncached lookup with an injectable environment reader.
pub fn locate_with(
    tool: Tool,
    env: &dyn Fn(&str) -> Option<OsString>,
) -> Result<Located, LocateError> {
    // 1. Override variables.
    for &var in tool.env_vars() {
        let Some(raw) = env(var).filter(|v| !v.is_empty()) else {
            continue;
        };
        let value = PathBuf::from(&raw);

        if looks_like_path(&value) {
            if value.is_dir() {
                return locate_in_dir(tool, var, &value);
            }
            if value.is_file() {
                return Ok(Located {
                    tool,
                    env: value.parent().map(|dir| tool_env(tool, dir)).unwrap_or_default(),
                    program: value,
                    source: Source::EnvFile,
                });
            }
            // Set but missing: fall through to the PATH search.
            continue;
        }

        if let Some(found) = find_in_path(&raw, env("PATH")) {
            return Ok(Located {
                tool,
                program: found,
                source: Source::EnvCommand,
                env: Vec::new(),
            });
        }
    }

    // 2. PATH search over the candidates.
    let path_var = env("PATH");
    for name in tool.candidates() {
        if let Some(found) = find_in_path(std::ffi::OsStr::new(name), path_var.clone()) {
            return Ok(Located {
                tool,
                program: found,
                source: Source::Path,
                env: Vec::new(),
            });
        }
    }

    Err(LocateError::NotFound {
        tool,
        candidates: tool.candidates().to_vec(),
        hint: tool.env_vars()[0],
    })
}

/// Search the directories of `path_var` for an executable called `name`.
pub fn find_in_path(name: &std::ffi::OsStr, path_var: Option<OsString>) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

// ── Internal helpers ─────────────────────────────────────────────────────────

fn locate_in_dir(tool: Tool, var: &'static str, dir: &Path) -> Result<Located, LocateError> {
    for name in tool.candidates() {
        let exe = dir.join(name);
        if is_executable(&exe) {
            return Ok(Located {
                tool,
                program: exe,
                source: Source::EnvDir,
                env: tool_env(tool, dir),
            });
        }
    }
    Err(LocateError::EmptyOverrideDir {
        var,
        dir: dir.to_path_buf(),
        candidates: tool.candidates().to_vec(),
    })
}

/// Environment a tool living in `dir` needs: ImageMagick looks for its
/// delegates and config next to the binary; everything gets `dir` on `PATH`
/// so helper executables resolve.
fn tool_env(tool: Tool, dir: &Path) -> Vec<(OsString, OsString)> {
    let mut env = Vec::new();
    if tool == Tool::ImageMagick {
        env.push(("MAGICK_HOME".into(), dir.as_os_str().to_owned()));
        env.push(("MAGICK_CONFIGURE_PATH".into(), dir.as_os_str().to_owned()));
    }
    let mut paths = vec![dir.to_path_buf()];
    if let Some(existing) = std::env::var_os("PATH") {
        paths.extend(std::env::split_paths(&existing));
    }
    if let Ok(joined) = std::env::join_paths(paths) {
        env.push(("PATH".into(), joined));
    }
    env
}

fn looks_like_path(value: &Path) -> bool {
    value.components().count() > 1
        || value.is_absolute()
        || value
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("exe"))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, OsString)]) -> impl Fn(&str) -> Option<OsString> {
        let map: HashMap<String, OsString> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[cfg(unix)]
    fn fake_exe(dir: &Path, name: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let p = dir.join(name);
        std::fs::write(&p, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
        p
    }

    #[test]
    fn every_tool_has_candidates_and_vars() {
        for tool in Tool::ALL {
            assert!(!tool.candidates().is_empty());
            assert!(!tool.env_vars().is_empty());
            assert!(!tool.version_arg().is_empty());
        }
    }

    #[cfg(unix)]
    #[test]
    fn path_search_prefers_first_candidate() {
        let dir = tempfile::tempdir().unwrap();
        fake_exe(dir.path(), "convert");
        let magick = fake_exe(dir.path(), "magick");

        let env = env_from(&[("PATH", dir.path().as_os_str().to_owned())]);
        let found = locate_with(Tool::ImageMagick, &env).unwrap();
        assert_eq!(found.program, magick);
        assert_eq!(found.source, Source::Path);
    }

    #[cfg(unix)]
    #[test]
    fn falls_back_to_imagemagick6_convert() {
        let dir = tempfile::tempdir().unwrap();
        let convert = fake_exe(dir.path(), "convert");

        let env = env_from(&[("PATH", dir.path().as_os_str().to_owned())]);
        let found = locate_with(Tool::ImageMagick, &env).unwrap();
        assert_eq!(found.program, convert);
    }

    #[cfg(unix)]
    #[test]
    fn env_file_override_wins_over_path() {
        let on_path = tempfile::tempdir().unwrap();
        fake_exe(on_path.path(), "gs");
        let custom = tempfile::tempdir().unwrap();
        let gs = fake_exe(custom.path(), "my-gs");

        let env = env_from(&[
            ("PATH", on_path.path().as_os_str().to_owned()),
            ("GS_BIN", gs.as_os_str().to_owned()),
        ]);
        let found = locate_with(Tool::Ghostscript, &env).unwrap();
        assert_eq!(found.program, gs);
        assert_eq!(found.source, Source::EnvFile);
    }

    #[cfg(unix)]
    #[test]
    fn env_dir_override_sets_magick_home() {
        let dir = tempfile::tempdir().unwrap();
        let magick = fake_exe(dir.path(), "magick");

        let env = env_from(&[("IMAGEMAGICK_BIN", dir.path().as_os_str().to_owned())]);
        let found = locate_with(Tool::ImageMagick, &env).unwrap();
        assert_eq!(found.program, magick);
        assert_eq!(found.source, Source::EnvDir);
        assert!(found
            .env
            .iter()
            .any(|(k, v)| k == "MAGICK_HOME" && v == dir.path().as_os_str()));
    }

    #[cfg(unix)]
    #[test]
    fn empty_override_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let env = env_from(&[("SOFFICE_BIN", dir.path().as_os_str().to_owned())]);
        let err = locate_with(Tool::Office, &env).unwrap_err();
        assert!(matches!(err, LocateError::EmptyOverrideDir { var: "SOFFICE_BIN", .. }));
    }

    #[test]
    fn nothing_found_reports_hint() {
        let env = env_from(&[("PATH", OsString::from("/definitely/not/here"))]);
        let err = locate_with(Tool::Office, &env).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("LibreOffice"), "got: {msg}");
        assert!(msg.contains("DOCFORGE_OFFICE_BIN"), "got: {msg}");
    }

    #[test]
    fn source_display_is_stable() {
        assert_eq!(Source::EnvDir.to_string(), "env:dir");
        assert_eq!(Source::Path.to_string(), "path");
    }
}
