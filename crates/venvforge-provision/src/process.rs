//! Child-process runner shared by the builder and the installer.
//!
//! Output is forwarded chunk-by-chunk to the sink while the child runs; the
//! runner returns only after the child exits (or the token fires, in which
//! case the child is killed).

use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::error::{ProvisionError, Result};
use crate::pipeline::Stage;
use crate::sink::{OutputStream, ProvisionSink};

const READ_CHUNK: usize = 8 * 1024;

/// Exit code reported when the child was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -1;

/// Spawn `cmd`, stream its output to `sink`, and return its exit code.
pub async fn run_streaming(
    mut cmd: Command,
    stage: Stage,
    sink: &dyn ProvisionSink,
    cancel: &CancellationToken,
) -> Result<i32> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    tracing::debug!(
        %program,
        args = ?cmd.as_std().get_args().collect::<Vec<_>>(),
        cwd = ?cmd.as_std().get_current_dir(),
        "spawning"
    );

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProvisionError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let status = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            return Err(ProvisionError::Cancelled { stage });
        }
        status = async {
            tokio::join!(
                pump(stdout, OutputStream::Stdout, sink),
                pump(stderr, OutputStream::Stderr, sink),
            );
            child.wait().await
        } => status,
    }
    .map_err(|source| ProvisionError::Spawn { program, source })?;

    Ok(status.code().unwrap_or(SIGNAL_EXIT_CODE))
}

async fn pump<R: AsyncRead + Unpin>(
    reader: Option<R>,
    stream: OutputStream,
    sink: &dyn ProvisionSink,
) {
    let Some(mut reader) = reader else {
        return;
    };
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => sink.on_output(stream, &buf[..n]),
            Err(e) => {
                tracing::debug!(?stream, error = %e, "child output closed");
                break;
            }
        }
    }
}
