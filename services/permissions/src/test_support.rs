// Scripted snapshot source and fixtures shared by the unit tests.
use crate::fetcher::{FetchError, SnapshotFetcher};
use async_trait::async_trait;
use parking_lot::Mutex;
use rendering_authz::{CollectionPermission, RenderingId, RenderingPermissionSnapshot, Segment};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) const BOOKS_QUERY: &str = "SELECT * FROM books";
pub(crate) const AUTHORS_QUERY: &str = "SELECT * FROM authors";

#[derive(Clone)]
pub(crate) enum Step {
    Ok(RenderingPermissionSnapshot),
    Delayed(Duration, RenderingPermissionSnapshot),
    Fail,
    Hang,
}

pub(crate) struct ScriptedFetcher {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn always(snapshot: RenderingPermissionSnapshot) -> Self {
        Self::with_fallback(Step::Ok(snapshot))
    }

    pub(crate) fn failing() -> Self {
        Self::with_fallback(Step::Fail)
    }

    pub(crate) fn with_fallback(fallback: Step) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    // Queue a step consumed before the fallback applies.
    pub(crate) fn then(self, step: Step) -> Self {
        self.script.lock().push_back(step);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _rendering: RenderingId,
    ) -> Result<RenderingPermissionSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut script = self.script.lock();
            script.pop_front().unwrap_or_else(|| self.fallback.clone())
        };
        match step {
            Step::Ok(snapshot) => Ok(snapshot),
            Step::Delayed(delay, snapshot) => {
                tokio::time::sleep(delay).await;
                Ok(snapshot)
            }
            Step::Fail => Err(FetchError::Request("scripted failure".to_string())),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// `books` is browsable with two manual segments and one smart segment.
pub(crate) fn books_snapshot() -> RenderingPermissionSnapshot {
    RenderingPermissionSnapshot::default().with_collection(
        "books",
        CollectionPermission {
            browse_enabled: true,
            read_enabled: true,
            segments: vec![
                Segment::manual("1", "All books", BOOKS_QUERY),
                Segment::manual("2", "Authors", format!("{AUTHORS_QUERY};")),
                Segment::smart("3", "Bestsellers"),
            ],
            ..Default::default()
        },
    )
}

// Let spawned background tasks run on the current-thread test runtime.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
