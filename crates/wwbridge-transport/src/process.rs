use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::link::Link;

/// Environment variable a host sets on the worker process it spawns.
pub const ROLE_ENV: &str = "WWBRIDGE_ROLE";

/// Value of [`ROLE_ENV`] inside a worker process.
pub const WORKER_ROLE: &str = "worker";

/// Returns true if this process was spawned as a wwbridge worker.
pub fn is_worker_process() -> bool {
    std::env::var(ROLE_ENV).is_ok_and(|role| role == WORKER_ROLE)
}

/// A worker process owned by the host.
///
/// The child's stdin/stdout form the link; stderr is inherited so worker
/// logs reach the host's terminal. The child is killed when this handle drops.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
    program: PathBuf,
}

impl WorkerProcess {
    /// Spawn `program` as a worker and return its handle and link.
    pub fn spawn<I, S>(program: impl AsRef<Path>, args: I) -> Result<(Self, Link)>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let program = program.as_ref().to_path_buf();
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

        let mut child = Command::new(&program)
            .args(&args)
            .env(ROLE_ENV, WORKER_ROLE)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TransportError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(TransportError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TransportError::MissingPipe("stdout"))?;

        info!(program = ?program, pid = child.id(), "spawned worker process");

        let link = Link::new("process", stdout, stdin);
        Ok((Self { child, program }, link))
    }

    /// OS process id, if the child is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Path of the spawned program.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Wait for the worker to exit on its own.
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        Ok(self.child.wait().await?)
    }

    /// Terminate the worker and reap it.
    pub async fn kill(&mut self) -> Result<()> {
        debug!(program = ?self.program, "killing worker process");
        self.child.kill().await?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use super::*;

    #[tokio::test]
    async fn spawn_links_child_stdio() {
        let (mut worker, link) = WorkerProcess::spawn("cat", Vec::<String>::new())
            .expect("cat should spawn");
        let (mut reader, mut writer) = link.into_split();

        writer.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(writer);
        let status = worker.wait().await.expect("cat should exit after stdin closes");
        assert!(status.success());
    }

    #[tokio::test]
    async fn spawn_sets_worker_role() {
        let (mut worker, link) = WorkerProcess::spawn("sh", ["-c", "printf %s \"$WWBRIDGE_ROLE\""])
            .expect("sh should spawn");
        let (mut reader, _writer) = link.into_split();

        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, WORKER_ROLE);
        worker.wait().await.unwrap();
    }

    #[test]
    fn spawn_missing_program_reports_path() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = runtime.enter();
        let err = WorkerProcess::spawn("/nonexistent/wwbridge-worker", Vec::<String>::new())
            .expect_err("spawn should fail");
        assert!(matches!(err, TransportError::Spawn { .. }));
        assert!(err.to_string().contains("/nonexistent/wwbridge-worker"));
    }
}
