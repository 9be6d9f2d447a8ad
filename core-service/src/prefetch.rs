//! Background chapter prefetch wiring.

use core_library::prefetch::{ChapterPrefetcher, PrefetchOutcome};
use core_runtime::events::{ContentEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tracing::debug;

/// Task id the prefetch runs under on every background executor.
pub const PREFETCH_TASK_ID: &str = "chapter_prefetch";

/// One prefetch step plus its event reporting, cheap to hand to an executor.
#[derive(Clone)]
pub struct PrefetchRunner {
    prefetcher: Arc<ChapterPrefetcher>,
    events: EventBus,
}

impl PrefetchRunner {
    pub fn new(prefetcher: Arc<ChapterPrefetcher>, events: EventBus) -> Self {
        Self { prefetcher, events }
    }

    pub async fn run(&self) -> core_library::Result<PrefetchOutcome> {
        let outcome = self.prefetcher.step().await?;

        let event = match outcome {
            PrefetchOutcome::Cached(chapter_id) => Some(ContentEvent::PrefetchAdvanced { chapter_id }),
            PrefetchOutcome::Failed(chapter_id) => Some(ContentEvent::PrefetchFailed {
                chapter_id,
                message: format!("Chapter {} could not be cached", chapter_id),
            }),
            PrefetchOutcome::Complete => {
                debug!("All chapters prefetched");
                None
            }
        };

        if let Some(event) = event {
            let _ = self.events.emit(CoreEvent::Content(event));
        }
        Ok(outcome)
    }
}
