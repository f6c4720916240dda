//! Engine B: bulk-copy pipe.
//!
//! Same pipe and consumer as the segmented engine, but the producer hands the
//! whole read loop to [`futures_util::io::copy`] with the pipe writer as its
//! sink. Segment sizing and backpressure still come from the pipe.

use std::time::Instant;

use futures_io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::segmented::drain_pipe;
use super::{CopyEngine, Strategy, pipe_report, record_fault, run_session};
use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::pipe::{PipeOptions, PipeStats, PipeWriter, pipe};
use crate::report::CopyReport;
use crate::session::{CopySession, Side};

/// Engine B: one bulk stream copy into the pipe.
#[derive(Debug, Clone, Copy)]
pub struct BulkPipeEngine {
    config: CopyConfig,
}

impl BulkPipeEngine {
    /// Creates the engine.
    pub fn new(config: CopyConfig) -> Self {
        Self { config }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }
}

impl Default for BulkPipeEngine {
    fn default() -> Self {
        Self::new(CopyConfig::default())
    }
}

impl CopyEngine for BulkPipeEngine {
    fn strategy(&self) -> Strategy {
        Strategy::BulkPipe
    }

    async fn copy<R, W>(&self, mut source: R, destination: W) -> Result<CopyReport, CopyError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        self.config.validate()?;
        let started = Instant::now();
        let session = CopySession::new();
        let (writer, reader) = pipe(PipeOptions::from_config(&self.config));

        let producer = copy_into_pipe(&mut source, writer, &session);
        let consumer = drain_pipe(reader, destination, &session);
        let (stats, drained) = run_session(&session, producer, consumer).await?;

        Ok(pipe_report(self.strategy(), started, stats, drained))
    }
}

async fn copy_into_pipe<R>(
    source: &mut R,
    mut writer: PipeWriter,
    session: &CopySession,
) -> Result<PipeStats, CopyError>
where
    R: AsyncRead + Unpin,
{
    // The pipe writer only fails once the reader has completed, so any other
    // error came from the source.
    let outcome = match futures_util::io::copy(&mut *source, &mut writer).await {
        Ok(total) => {
            debug!(total, "producer finished");
            Ok(())
        }
        Err(_) if writer.is_reader_completed() => {
            debug!("consumer completed early, producer stopping");
            Ok(())
        }
        Err(e) => Err(CopyError::SourceUnreadable(e)),
    };
    if let Err(e) = &outcome {
        record_fault(session, Side::Producer, e);
    }

    if outcome.is_ok() {
        // Publishes the tail; returns at once if the reader is gone.
        writer.flush().await;
    }
    let stats = writer.stats();
    writer.complete();
    outcome.map(|()| stats)
}
