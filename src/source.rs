//! Line sources - live remote tail-of-file streams
//!
//! A [`LineSource`] is a lazy, pull-based, non-restartable sequence of raw
//! text lines. EOF and transport errors both end the stream; reconnecting
//! (or not) is the worker's restart policy, never this layer's.

use crate::config::HostConfig;
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};

/// Abstraction over a live line-oriented stream from one remote host.
///
/// `Ok(Some(line))` yields the next line, `Ok(None)` is a clean EOF, and
/// `Err` is a transport failure. Both terminal outcomes end ingestion for
/// the host identically.
#[async_trait]
pub trait LineSource: Send {
    async fn next_line(&mut self) -> io::Result<Option<String>>;
}

/// Follows the tail of a remote file over ssh.
///
/// Spawns `ssh [-i key] host "tail -f file"` and reads its stdout line by
/// line. The child is killed when the source is dropped, so a stopped
/// worker never leaves an orphaned remote tail behind.
pub struct SshTail {
    // Held so the child's lifetime is tied to the source's.
    _child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

impl SshTail {
    /// Spawn the remote tail for one configured host.
    pub fn connect(host: &HostConfig) -> io::Result<Self> {
        let mut command = Command::new("ssh");
        command
            .args(ssh_args(host))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("ssh child has no captured stdout"))?;

        Ok(Self {
            _child: child,
            lines: BufReader::new(stdout).lines(),
        })
    }
}

#[async_trait]
impl LineSource for SshTail {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}

fn ssh_args(host: &HostConfig) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(key) = &host.key {
        args.push("-i".to_string());
        args.push(key.clone());
    }
    args.push(host.host.clone());
    args.push(format!("tail -f {}", host.file));
    args
}
