//! Small process-related helpers shared across the workspace.
//!
//! Covers the three things every external-tool call site needs: building a
//! command that does not flash a console window on Windows, draining a child
//! process's output pipes line by line, and a best-effort version probe for
//! reporting which tool build is installed.

use std::ffi::OsStr;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `std::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn std_command(program: impl AsRef<OsStr>) -> std::process::Command {
    let mut cmd = std::process::Command::new(program);
    cmd.no_window();
    cmd
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Read a child output pipe to EOF, invoking `on_line` for each complete line.
///
/// Lines are delivered without their trailing newline. Read errors end the
/// drain and are returned so the caller can log them; the child's exit status
/// is unaffected either way.
#[cfg(feature = "tokio")]
pub async fn forward_lines<R, F>(reader: R, mut on_line: F) -> std::io::Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    F: FnMut(String),
{
    use tokio::io::{AsyncBufReadExt, BufReader};

    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        on_line(line);
    }
    Ok(())
}

/// Probe `program --version` and return the first line of its stdout.
///
/// Returns `None` when the program is missing, not executable, or prints
/// nothing. Intended for startup diagnostics, never for gating behavior.
pub fn probe_version(program: impl AsRef<OsStr>) -> Option<String> {
    let mut cmd = std_command(program);
    cmd.arg("--version");
    cmd.output().ok().and_then(|output| {
        let stdout = String::from_utf8(output.stdout).ok()?;
        let first = stdout.lines().next()?.trim();
        (!first.is_empty()).then(|| first.to_string())
    })
}
