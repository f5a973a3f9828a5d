//! The create/dispose state machine shared by strategies and managers.
//!
//! Every lifecycle-bearing object owns exactly one [`LifecycleCell`] and only
//! its own `create`/`dispose` operations move it. Both operations are
//! idempotent, come in a blocking and an async form, and run an overridable
//! hook the first time they take effect.

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::error::{DependencyError, DependencyResult};

const UNINITIALIZED: u8 = 0;
const CREATING: u8 = 1;
const CREATED: u8 = 2;
const DISPOSED: u8 = 3;

const MODE_UNSET: u8 = 0;
const MODE_BLOCKING: u8 = 1;
const MODE_ASYNC: u8 = 2;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Uninitialized,
    Created,
    Disposed,
}

/// Which form of the lifecycle API an object has been driven with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Blocking,
    Async,
}

/// State holder embedded in every [`Lifecycle`] implementor.
///
/// The cell holds an internal `Creating` phase while a create hook runs;
/// it is reported as [`LifecycleState::Uninitialized`].
#[derive(Debug)]
pub struct LifecycleCell {
    state: AtomicU8,
    mode: AtomicU8,
}

impl LifecycleCell {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(UNINITIALIZED),
            mode: AtomicU8::new(MODE_UNSET),
        }
    }

    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::Acquire) {
            CREATED => LifecycleState::Created,
            DISPOSED => LifecycleState::Disposed,
            _ => LifecycleState::Uninitialized,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.state.load(Ordering::Acquire) == DISPOSED
    }

    /// Mode the object was first driven in, if any.
    pub fn mode(&self) -> Option<ExecutionMode> {
        match self.mode.load(Ordering::Acquire) {
            MODE_BLOCKING => Some(ExecutionMode::Blocking),
            MODE_ASYNC => Some(ExecutionMode::Async),
            _ => None,
        }
    }

    /// Records the execution mode; a switch is reported but tolerated.
    pub(crate) fn enter_mode(&self, mode: ExecutionMode, owner: &'static str) {
        let wanted = match mode {
            ExecutionMode::Blocking => MODE_BLOCKING,
            ExecutionMode::Async => MODE_ASYNC,
        };
        if let Err(existing) =
            self.mode
                .compare_exchange(MODE_UNSET, wanted, Ordering::AcqRel, Ordering::Acquire)
        {
            if existing != wanted {
                tracing::warn!(
                    owner,
                    ?mode,
                    "lifecycle driven in both blocking and async mode"
                );
            }
        }
    }

    /// Claims the create transition. `Ok(false)` means nothing to do.
    pub(crate) fn begin_create(&self, owner: &'static str) -> DependencyResult<bool> {
        match self
            .state
            .compare_exchange(UNINITIALIZED, CREATING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(true),
            Err(DISPOSED) => Err(DependencyError::state(format!(
                "{} cannot be created after it was disposed",
                owner
            ))),
            Err(_) => Ok(false),
        }
    }

    pub(crate) fn commit_create(&self) {
        // A dispose that raced the hook wins.
        let _ = self
            .state
            .compare_exchange(CREATING, CREATED, Ordering::AcqRel, Ordering::Acquire);
    }

    pub(crate) fn abort_create(&self) {
        let _ = self
            .state
            .compare_exchange(CREATING, UNINITIALIZED, Ordering::AcqRel, Ordering::Acquire);
    }

    /// Commits `Disposed`. Returns whether this call made the transition.
    pub(crate) fn begin_dispose(&self) -> bool {
        self.state.swap(DISPOSED, Ordering::AcqRel) != DISPOSED
    }
}

impl Default for LifecycleCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Create/dispose contract with blocking and async twins.
///
/// Implementors provide [`lifecycle`](Lifecycle::lifecycle) and override the
/// `on_*` hooks they need; the provided `create`/`dispose` methods enforce
/// idempotency and ordering.
///
/// - `create` runs `on_create(true)` once, then commits `Created`. A failing
///   hook leaves the object uninitialized and its error is returned as-is.
/// - `dispose` commits `Disposed` first, then runs `on_dispose`. A failing
///   hook still leaves the object disposed, so a second dispose is a no-op.
/// - `dispose` without a prior `create` is legal; hooks must cope with a
///   never-initialized object.
///
/// # Examples
///
/// ```rust
/// use lifewire::{Lifecycle, LifecycleCell, LifecycleState, DependencyResult};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct Pool {
///     lifecycle: LifecycleCell,
///     opened: AtomicUsize,
/// }
///
/// impl Lifecycle for Pool {
///     fn lifecycle(&self) -> &LifecycleCell {
///         &self.lifecycle
///     }
///
///     fn on_create(&self, _creating: bool) -> DependencyResult<()> {
///         self.opened.fetch_add(1, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let pool = Pool::default();
/// pool.create().unwrap();
/// pool.create().unwrap();
/// assert_eq!(pool.opened.load(Ordering::SeqCst), 1);
///
/// pool.dispose().unwrap();
/// pool.dispose().unwrap();
/// assert_eq!(pool.state(), LifecycleState::Disposed);
/// ```
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// The state cell owned by this object.
    fn lifecycle(&self) -> &LifecycleCell;

    /// Creation hook. `creating` is `true` when called by the state machine
    /// for the real transition out of `Uninitialized`.
    fn on_create(&self, _creating: bool) -> DependencyResult<()> {
        Ok(())
    }

    /// Teardown hook; may run on a never-created object.
    fn on_dispose(&self) -> DependencyResult<()> {
        Ok(())
    }

    async fn on_create_async(&self, creating: bool) -> DependencyResult<()> {
        self.on_create(creating)
    }

    async fn on_dispose_async(&self) -> DependencyResult<()> {
        self.on_dispose()
    }

    /// Name used in diagnostics.
    fn lifecycle_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn state(&self) -> LifecycleState {
        self.lifecycle().state()
    }

    fn create(&self) -> DependencyResult<()> {
        let cell = self.lifecycle();
        let owner = self.lifecycle_name();
        cell.enter_mode(ExecutionMode::Blocking, owner);
        if !cell.begin_create(owner)? {
            return Ok(());
        }
        match self.on_create(true) {
            Ok(()) => {
                cell.commit_create();
                tracing::trace!(owner, "created");
                Ok(())
            }
            Err(err) => {
                cell.abort_create();
                Err(err)
            }
        }
    }

    fn dispose(&self) -> DependencyResult<()> {
        let cell = self.lifecycle();
        let owner = self.lifecycle_name();
        cell.enter_mode(ExecutionMode::Blocking, owner);
        if !cell.begin_dispose() {
            return Ok(());
        }
        tracing::trace!(owner, "disposed");
        self.on_dispose()
    }

    async fn create_async(&self) -> DependencyResult<()> {
        let cell = self.lifecycle();
        let owner = self.lifecycle_name();
        cell.enter_mode(ExecutionMode::Async, owner);
        if !cell.begin_create(owner)? {
            return Ok(());
        }
        match self.on_create_async(true).await {
            Ok(()) => {
                cell.commit_create();
                tracing::trace!(owner, "created");
                Ok(())
            }
            Err(err) => {
                cell.abort_create();
                Err(err)
            }
        }
    }

    async fn dispose_async(&self) -> DependencyResult<()> {
        let cell = self.lifecycle();
        let owner = self.lifecycle_name();
        cell.enter_mode(ExecutionMode::Async, owner);
        if !cell.begin_dispose() {
            return Ok(());
        }
        tracing::trace!(owner, "disposed");
        self.on_dispose_async().await
    }
}
