//! Shell resolution.
//!
//! Determines which shell executable and which I/O strategy apply to the
//! running host. Resolution happens once per process lifetime and never
//! fails: when no preferred shell is found the profile falls back to bash,
//! and a genuinely missing executable surfaces at spawn time instead.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use portable_pty::{native_pty_system, PtySize};
use serde::Serialize;

/// I/O strategy used to bridge a shell process to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Full pseudo-terminal (Unix). Interactive programs, colour, job
    /// control all behave as on a real terminal.
    Pty,
    /// Anonymous pipes with no TTY semantics. Unix fallback for hosts where
    /// PTY allocation is unavailable.
    Pipe,
    /// Piped cmd.exe subprocess with stderr merged into the output stream.
    WindowsPipe,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Pty => "pty",
            Strategy::Pipe => "pipe",
            Strategy::WindowsPipe => "windows-pipe",
        };
        write!(f, "{}", name)
    }
}

/// Immutable description of the shell new sessions spawn.
#[derive(Debug, Clone, Serialize)]
pub struct ShellProfile {
    /// Executable path or name.
    pub program: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Display name used in the banner and logs.
    pub name: String,
    /// Selected I/O strategy.
    pub strategy: Strategy,
}

static RESOLVED: OnceLock<ShellProfile> = OnceLock::new();

impl ShellProfile {
    /// Resolves the shell profile for this host.
    ///
    /// Computed once and cached for the process lifetime; deterministic for
    /// a given host.
    pub fn resolve() -> &'static ShellProfile {
        RESOLVED.get_or_init(detect)
    }

    /// Builds a profile for an explicit program, keeping the host's strategy
    /// selection. Used for the config shell override and for tests.
    pub fn with_program(program: impl Into<String>) -> ShellProfile {
        let program = program.into();
        let name = display_name(&program);
        ShellProfile {
            program,
            args: Vec::new(),
            name,
            strategy: detect_strategy(),
        }
    }
}

/// Detects the shell and strategy for the running host.
///
/// - Windows: `cmd.exe` over piped stdio.
/// - Elsewhere: `/bin/zsh` if present on disk, else `/bin/bash`; PTY when
///   the host can allocate one, anonymous pipes otherwise.
fn detect() -> ShellProfile {
    if cfg!(windows) {
        return ShellProfile {
            program: "cmd.exe".to_string(),
            args: Vec::new(),
            name: "cmd.exe".to_string(),
            strategy: Strategy::WindowsPipe,
        };
    }

    let program = if Path::new("/bin/zsh").exists() {
        "/bin/zsh"
    } else {
        "/bin/bash"
    };

    ShellProfile {
        program: program.to_string(),
        args: Vec::new(),
        name: display_name(program),
        strategy: detect_strategy(),
    }
}

/// Picks the I/O strategy available on this host.
fn detect_strategy() -> Strategy {
    if cfg!(windows) {
        Strategy::WindowsPipe
    } else if pty_available() {
        Strategy::Pty
    } else {
        Strategy::Pipe
    }
}

/// Probes whether a PTY pair can actually be allocated. Minimal container
/// images may lack /dev/ptmx, in which case sessions fall back to pipes.
fn pty_available() -> bool {
    native_pty_system()
        .openpty(PtySize {
            rows: 24,
            cols: 80,
            pixel_width: 0,
            pixel_height: 0,
        })
        .is_ok()
}

fn display_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_memoized() {
        let first = ShellProfile::resolve();
        let second = ShellProfile::resolve();
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_resolve_picks_an_existing_shell_on_unix() {
        if cfg!(windows) {
            return;
        }
        let profile = ShellProfile::resolve();
        assert!(
            profile.program == "/bin/zsh" || profile.program == "/bin/bash",
            "unexpected shell: {}",
            profile.program
        );
        assert_ne!(profile.strategy, Strategy::WindowsPipe);
    }

    #[test]
    fn test_resolve_prefers_zsh_when_present() {
        if cfg!(windows) {
            return;
        }
        let profile = ShellProfile::resolve();
        if Path::new("/bin/zsh").exists() {
            assert_eq!(profile.program, "/bin/zsh");
        } else {
            assert_eq!(profile.program, "/bin/bash");
        }
    }

    #[test]
    fn test_with_program_uses_basename_as_display_name() {
        let profile = ShellProfile::with_program("/usr/local/bin/fish");
        assert_eq!(profile.program, "/usr/local/bin/fish");
        assert_eq!(profile.name, "fish");
    }

    #[test]
    fn test_with_program_keeps_nonexistent_path() {
        // Resolution must not validate the executable; spawn does.
        let profile = ShellProfile::with_program("/definitely/not/a/shell");
        assert_eq!(profile.program, "/definitely/not/a/shell");
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(Strategy::Pty.to_string(), "pty");
        assert_eq!(Strategy::Pipe.to_string(), "pipe");
        assert_eq!(Strategy::WindowsPipe.to_string(), "windows-pipe");
    }

    #[test]
    fn test_profile_serializes_strategy_kebab_case() {
        let profile = ShellProfile::with_program("/bin/sh");
        let json = serde_json::to_value(&profile).unwrap();
        let strategy = json.get("strategy").and_then(|v| v.as_str()).unwrap();
        assert!(["pty", "pipe", "windows-pipe"].contains(&strategy));
    }
}
