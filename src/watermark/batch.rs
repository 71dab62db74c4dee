use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::WatermarkError;
use super::render::{Stamp, WatermarkRenderer};
use super::sources::SourceList;
use super::types::{RenderResult, WatermarkSpec};

/// Sent after each item starts. `index` counts from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub index: usize,
    pub total: usize,
    pub file: String,
}

#[derive(Debug, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Running {
        index: usize,
        total: usize,
    },
    Completed {
        results: Vec<RenderResult>,
    },
    Failed {
        results: Vec<RenderResult>,
        error: WatermarkError,
    },
}

impl BatchState {
    /// Results finished so far; on failure, those completed before the failing item.
    pub fn results(&self) -> &[RenderResult] {
        match self {
            BatchState::Completed { results } | BatchState::Failed { results, .. } => results,
            BatchState::Idle | BatchState::Running { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&WatermarkError> {
        match self {
            BatchState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, BatchState::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, BatchState::Failed { .. })
    }
}

/// Runs one batch at a time, one picture at a time.
pub struct BatchCoordinator {
    renderer: Arc<WatermarkRenderer>,
    state: BatchState,
    progress: Option<mpsc::UnboundedSender<BatchProgress>>,
    cancel: CancellationToken,
}

impl BatchCoordinator {
    pub fn new(renderer: Arc<WatermarkRenderer>) -> Self {
        Self {
            renderer,
            state: BatchState::Idle,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    /// Progress for subsequent runs. Replaces any earlier subscriber.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<BatchProgress> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.progress = Some(tx);
        rx
    }

    /// Cancelling stops the batch before its next item; the current item still finishes.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watermarks every source in order.
    ///
    /// Returns `Err` only for input that is rejected before anything runs; per-item
    /// failures end the batch in [`BatchState::Failed`].
    pub async fn run(
        &mut self,
        sources: &SourceList,
        spec: Arc<WatermarkSpec>,
    ) -> Result<&BatchState, WatermarkError> {
        self.state = BatchState::Idle;
        if sources.is_empty() {
            return Err(WatermarkError::validation("no images selected"));
        }

        let total = sources.len();
        info!("Starting watermark batch of {} image(s)", total);
        self.state = BatchState::Running { index: 0, total };

        let mut results = Vec::with_capacity(total);
        let outcome = self.process(sources, spec, &mut results).await;

        self.state = match outcome {
            Ok(()) => {
                info!("Watermark batch completed: {} image(s)", results.len());
                BatchState::Completed { results }
            }
            Err(error) => {
                warn!(
                    "Watermark batch failed after {} of {} image(s): {}",
                    results.len(),
                    total,
                    error
                );
                BatchState::Failed { results, error }
            }
        };

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        Ok(&self.state)
    }

    async fn process(
        &mut self,
        sources: &SourceList,
        spec: Arc<WatermarkSpec>,
        results: &mut Vec<RenderResult>,
    ) -> Result<(), WatermarkError> {
        let total = sources.len();

        let renderer = self.renderer.clone();
        let stamp_spec = spec.clone();
        let stamp: Arc<Stamp> = Arc::new(
            tokio::task::spawn_blocking(move || renderer.prepare_stamp(&stamp_spec))
                .await
                .map_err(|e| WatermarkError::Task {
                    file: "watermark".to_string(),
                    message: e.to_string(),
                })??,
        );

        for (position, source) in sources.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(WatermarkError::Cancelled {
                    file: source.name.clone(),
                });
            }

            let index = position + 1;
            self.state = BatchState::Running { index, total };
            if let Some(progress) = &self.progress {
                // A dropped receiver just means nobody is watching.
                let _ = progress.send(BatchProgress {
                    index,
                    total,
                    file: source.name.clone(),
                });
            }
            info!("Processing {} ({}/{})", source.name, index, total);

            let renderer = self.renderer.clone();
            let stamp = stamp.clone();
            let spec = spec.clone();
            let item = source.clone();
            let result = tokio::task::spawn_blocking(move || renderer.render(&item, &stamp, &spec))
                .await
                .map_err(|e| WatermarkError::Task {
                    file: source.name.clone(),
                    message: e.to_string(),
                })??;

            results.push(result);
        }

        Ok(())
    }
}
