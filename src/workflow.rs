//! Observable generation workflow: load the source, generate, cache.
//!
//! ```text
//! Idle -> Loading -> Generating -> Complete
//!            \            \-----> Error
//!             \-----------------> Error
//! ```
//!
//! Every run takes a fresh [`GenerationEpoch`] value. A run commits its
//! result only if that value is still current when generation finishes, so
//! [`FaviconWorkflow::retry`] (or a newer run) discards in-flight work.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::{ResultCache, Slot};
use crate::error::{CacheError, GenerateError};
use crate::generator::{FaviconGenerator, GenerationRequest, GenerationResult};
use crate::icon::{SourceImage, Tier};
use crate::manifest::ManifestOptions;

// ============================================================================
// WorkflowState
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    /// Fetching the source image from the cache.
    Loading,
    Generating,
    Complete,
    Error {
        /// Stable kind, see [`GenerateError::code`].
        code: &'static str,
        message: String,
    },
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error { .. })
    }
}

// ============================================================================
// GenerationEpoch
// ============================================================================

/// Shared counter identifying the newest generation run.
///
/// Clones observe the same counter.
#[derive(Debug, Clone, Default)]
pub struct GenerationEpoch(Arc<AtomicU64>);

impl GenerationEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Invalidates every earlier value and returns the new one.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.current() == epoch
    }
}

// ============================================================================
// PreviewRegistry
// ============================================================================

/// Identifies one live preview of a generated asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreviewHandle(u64);

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Tracks preview handles so they can be released when superseded.
#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: u64,
    live: BTreeMap<PreviewHandle, String>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a handle for the named asset.
    pub fn register(&mut self, asset_name: impl Into<String>) -> PreviewHandle {
        self.next_id += 1;
        let handle = PreviewHandle(self.next_id);
        self.live.insert(handle, asset_name.into());
        handle
    }

    /// Returns `false` if the handle was already released.
    pub fn release(&mut self, handle: PreviewHandle) -> bool {
        self.live.remove(&handle).is_some()
    }

    /// Releases every live handle, returning how many there were.
    pub fn release_all(&mut self) -> usize {
        let released = self.live.len();
        self.live.clear();
        released
    }

    pub fn is_live(&self, handle: PreviewHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live handles with their asset names, oldest first.
    pub fn handles(&self) -> Vec<(PreviewHandle, String)> {
        self.live
            .iter()
            .map(|(handle, name)| (*handle, name.clone()))
            .collect()
    }
}

// ============================================================================
// FaviconWorkflow
// ============================================================================

#[derive(Debug, Default)]
struct WorkflowInner {
    state: WorkflowState,
    result: Option<GenerationResult>,
    previews: PreviewRegistry,
    cache_error: Option<CacheError>,
}

/// Drives one session's generation against a shared [`ResultCache`].
pub struct FaviconWorkflow {
    generator: FaviconGenerator,
    cache: Arc<ResultCache>,
    epoch: GenerationEpoch,
    inner: Mutex<WorkflowInner>,
}

impl FaviconWorkflow {
    pub fn new(generator: FaviconGenerator, cache: Arc<ResultCache>) -> Self {
        Self::with_epoch(generator, cache, GenerationEpoch::new())
    }

    /// Shares `epoch` with the caller, who can then cancel runs by
    /// advancing it.
    pub fn with_epoch(
        generator: FaviconGenerator,
        cache: Arc<ResultCache>,
        epoch: GenerationEpoch,
    ) -> Self {
        Self {
            generator,
            cache,
            epoch,
            inner: Mutex::default(),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.inner().state.clone()
    }

    pub fn result(&self) -> Option<GenerationResult> {
        self.inner().result.clone()
    }

    /// Live preview handles for the committed result.
    pub fn previews(&self) -> Vec<(PreviewHandle, String)> {
        self.inner().previews.handles()
    }

    /// Releases one preview handle.
    pub fn release_preview(&self, handle: PreviewHandle) -> bool {
        self.inner().previews.release(handle)
    }

    /// The cache write failure of the last committed run, if any.
    pub fn cache_error(&self) -> Option<CacheError> {
        self.inner().cache_error.clone()
    }

    pub fn epoch(&self) -> &GenerationEpoch {
        &self.epoch
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Stores a validated upload as the session's source image.
    pub fn set_source(&self, source: &SourceImage) -> Result<(), CacheError> {
        self.cache.store_source(source)
    }

    /// Loads the cached source and generates for `tier`.
    ///
    /// On success the result is cached and previews are registered. A cache
    /// write failure does not fail the run; see [`cache_error`](Self::cache_error).
    /// Returns [`GenerateError::Cancelled`] if the run was superseded, in
    /// which case nothing is committed.
    pub async fn run(
        &self,
        tier: Tier,
        manifest_options: Option<ManifestOptions>,
    ) -> Result<GenerationResult, GenerateError> {
        let epoch = {
            let mut inner = self.inner();
            let epoch = self.epoch.advance();
            let released = inner.previews.release_all();
            if released > 0 {
                tracing::debug!(released, "released superseded previews");
            }
            inner.result = None;
            inner.cache_error = None;
            inner.state = WorkflowState::Loading;
            epoch
        };

        let source = match self.cache.source_image() {
            Ok(Some(source)) => source,
            Ok(None) => return Err(self.fail(epoch, GenerateError::NoSourceImage)),
            Err(err) => return Err(self.fail(epoch, GenerateError::Cache(err))),
        };

        if !self.set_state_if_current(epoch, WorkflowState::Generating) {
            return Err(GenerateError::Cancelled);
        }

        let mut request = GenerationRequest::new(source.clone(), tier);
        request.manifest_options = manifest_options;
        let result = match self.generator.generate(&request).await {
            Ok(result) => result,
            Err(err) => return Err(self.fail(epoch, err)),
        };

        // Held until commit so retry() cannot slip between the check and the write.
        let mut inner = self.inner();
        if !self.epoch.is_current(epoch) {
            tracing::info!(epoch, "generation superseded, discarding result");
            return Err(GenerateError::Cancelled);
        }

        let cache_error = match self.cache.store_result(&result, &source) {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "failed to cache generation result");
                Some(err)
            }
        };

        if !self.epoch.is_current(epoch) {
            tracing::info!(epoch, "generation superseded during cache write, discarding result");
            if cache_error.is_none() {
                if let Err(err) = self.cache.clear(Slot::FaviconCache) {
                    tracing::warn!(code = err.code(), error = %err, "failed to discard superseded result");
                }
            }
            return Err(GenerateError::Cancelled);
        }
        for asset in &result.assets {
            inner.previews.register(asset.name.clone());
        }
        inner.result = Some(result.clone());
        inner.cache_error = cache_error;
        inner.state = WorkflowState::Complete;
        Ok(result)
    }

    /// Abandons the current run and returns to `Idle`.
    ///
    /// Previews are released before the result is discarded.
    pub fn retry(&self) {
        let mut inner = self.inner();
        self.epoch.advance();
        let released = inner.previews.release_all();
        inner.result = None;
        inner.cache_error = None;
        inner.state = WorkflowState::Idle;
        tracing::debug!(released, "workflow reset");
    }

    fn fail(&self, epoch: u64, err: GenerateError) -> GenerateError {
        let state = WorkflowState::Error {
            code: err.code(),
            message: err.to_string(),
        };
        if self.set_state_if_current(epoch, state) {
            tracing::warn!(code = err.code(), error = %err, "generation failed");
            err
        } else {
            GenerateError::Cancelled
        }
    }

    fn set_state_if_current(&self, epoch: u64, state: WorkflowState) -> bool {
        let mut inner = self.inner();
        if !self.epoch.is_current(epoch) {
            return false;
        }
        inner.state = state;
        true
    }

    fn inner(&self) -> MutexGuard<'_, WorkflowInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
