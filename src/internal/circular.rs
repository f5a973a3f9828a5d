//! Circular dependency and depth detection.
//!
//! Blocking resolutions track the keys in flight on a thread-local stack.
//! Async resolutions cannot rely on the thread, so the outermost async call
//! installs a task-local stack that nested calls of the same task share.
//! A blocking call made while that task is being polled joins the task's
//! stack, so a blocking factory re-entering an async resolution is caught.

use std::cell::RefCell;
use std::future::Future;

use crate::config::ContainerOptions;
use crate::error::{DependencyError, DependencyResult};
use crate::key::ResolutionKey;

thread_local! {
    static THREAD_STACK: RefCell<Vec<ResolutionKey>> = RefCell::new(Vec::new());
}

tokio::task_local! {
    static TASK_STACK: RefCell<Vec<ResolutionKey>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Track {
    Thread,
    Task,
}

/// Pops the key pushed by [`enter_blocking`] or [`enter_async`] on drop.
pub(crate) struct StackGuard {
    track: Track,
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        match self.track {
            Track::Thread => {
                let _ = THREAD_STACK.try_with(|stack| stack.borrow_mut().pop());
            }
            Track::Task => {
                let _ = TASK_STACK.try_with(|stack| stack.borrow_mut().pop());
            }
        }
    }
}

fn push(stack: &mut Vec<ResolutionKey>, key: &ResolutionKey, options: &ContainerOptions) -> DependencyResult<()> {
    if options.detect_cycles && stack.iter().any(|k| k == key) {
        let mut path: Vec<String> = stack.iter().map(ToString::to_string).collect();
        path.push(key.to_string());
        tracing::debug!(path = %path.join(" -> "), "circular dependency detected");
        return Err(DependencyError::circular(&path).with_key(key));
    }
    if stack.len() >= options.max_depth {
        return Err(DependencyError::depth_exceeded(options.max_depth).with_key(key));
    }
    stack.push(key.clone());
    Ok(())
}

/// Registers `key` on the current thread's resolution stack, or on the
/// enclosing task's stack when called from inside an async resolution.
pub(crate) fn enter_blocking(key: &ResolutionKey, options: &ContainerOptions) -> DependencyResult<StackGuard> {
    if let Ok(pushed) = TASK_STACK.try_with(|stack| push(&mut stack.borrow_mut(), key, options)) {
        pushed?;
        return Ok(StackGuard { track: Track::Task });
    }
    THREAD_STACK.with(|stack| push(&mut stack.borrow_mut(), key, options))?;
    Ok(StackGuard { track: Track::Thread })
}

/// Registers `key` on the current task's resolution stack.
///
/// Must run inside [`with_task_stack`].
pub(crate) fn enter_async(key: &ResolutionKey, options: &ContainerOptions) -> DependencyResult<StackGuard> {
    TASK_STACK
        .try_with(|stack| push(&mut stack.borrow_mut(), key, options))
        .map_err(|_| DependencyError::state("async resolution stack is not installed"))??;
    Ok(StackGuard { track: Track::Task })
}

/// Runs `fut` with a task-local resolution stack, installing a fresh one
/// unless an enclosing call already did.
pub(crate) async fn with_task_stack<F: Future>(fut: F) -> F::Output {
    if TASK_STACK.try_with(|_| ()).is_ok() {
        fut.await
    } else {
        TASK_STACK.scope(RefCell::new(Vec::new()), fut).await
    }
}
