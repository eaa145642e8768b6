//! Fan-out/fan-in over a frame stream.
//!
//! Frames are pulled in rounds of up to `concurrency`. Each frame of a round
//! is classified on its own task with a shared snapshot of the rule set, and
//! every task reports back over one channel that only the dispatcher reads.
//! A round is fully merged before the next one is pulled, so at most
//! `concurrency` frames are alive at once.

use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use vrec_media::FrameStream;
use vrec_models::{RecognitionResult, RuleSet};

use crate::classifier::FrameClassifier;
use crate::error::PipelineResult;
use crate::guard::CancelGuard;
use crate::metrics::record_round;

/// Counters for one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Frames pulled from the stream.
    pub frames: u64,
    /// Fan-out rounds, each at most `concurrency` frames wide.
    pub rounds: u64,
    /// Frames that contributed an empty partial because classification failed.
    pub failed_frames: u64,
}

/// Drives a [`FrameClassifier`] over a frame stream with bounded parallelism.
pub struct RecognitionDispatcher {
    classifier: FrameClassifier,
    concurrency: usize,
}

impl RecognitionDispatcher {
    /// `concurrency` defaults to the number of logical cores and is never
    /// below one.
    pub fn new(classifier: FrameClassifier, concurrency: Option<usize>) -> Self {
        let concurrency = concurrency
            .unwrap_or_else(default_concurrency)
            .max(1);
        Self {
            classifier,
            concurrency,
        }
    }

    /// Upper bound on frames classified at once.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Classify every frame of `stream` and merge the partial results.
    ///
    /// Per-frame failures are logged and counted, never returned. Stream
    /// errors, the deadline, and cancellation abort the run; outstanding
    /// workers are aborted when the round's task set is dropped.
    pub async fn run(
        &self,
        stream: &mut dyn FrameStream,
        rules: Arc<RuleSet>,
        guard: &mut CancelGuard,
    ) -> PipelineResult<(RecognitionResult, DispatchStats)> {
        let mut total = RecognitionResult::empty_for(&rules);
        let mut stats = DispatchStats::default();

        loop {
            let mut batch = Vec::with_capacity(self.concurrency);
            while batch.len() < self.concurrency {
                match guard.run(stream.next_frame()).await?? {
                    Some(frame) => batch.push(frame),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }

            let submitted = batch.len();
            stats.rounds += 1;
            stats.frames += submitted as u64;

            let (tx, mut rx) = mpsc::channel(submitted);
            let mut workers = JoinSet::new();
            for frame in batch {
                let tx = tx.clone();
                let classifier = self.classifier.clone();
                let rules = Arc::clone(&rules);
                workers.spawn(async move {
                    let index = frame.index;
                    let outcome = classifier.classify(frame, &rules).await;
                    // The receiver only goes away when the run is abandoned.
                    let _ = tx.send((index, outcome)).await;
                });
            }
            drop(tx);

            let mut received = 0usize;
            let mut failed = 0usize;
            while let Some((index, outcome)) = guard.run(rx.recv()).await? {
                received += 1;
                match outcome {
                    Ok(partial) => total.absorb(partial),
                    Err(e) => {
                        failed += 1;
                        warn!(frame = index, error = %e, "Frame classification failed; skipping frame");
                    }
                }
            }

            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Classification task did not complete");
                }
            }
            failed += submitted - received;

            stats.failed_frames += failed as u64;
            record_round(submitted, failed);
            debug!(
                round = stats.rounds,
                frames = submitted,
                failed,
                "Recognition round merged"
            );
        }

        Ok((total, stats))
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
