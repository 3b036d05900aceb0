//! Call context.
//!
//! A [`Context`] is an immutable, append-only association carried through
//! one logical call chain. Deriving a child (`with_value`, `with_deadline`,
//! `with_cancel`) never mutates the parent: the child links back to it and
//! inherits everything the parent carries.
//!
//! Values are keyed by a Rust type. A module that keeps its key type private
//! is the only code able to attach or read that value, which is how the
//! ambient transaction is protected from counterfeit injection.
//!
//! ```rust
//! use txscope_driver::Context;
//!
//! struct RequestId;
//!
//! let root = Context::background();
//! let cx = root.with_value::<RequestId, _>(42u64);
//! assert_eq!(cx.value::<RequestId, u64>(), Some(&42));
//! assert!(root.value::<RequestId, u64>().is_none());
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Why a context stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A [`CancelHandle`] of this context or an ancestor was triggered.
    #[error("context cancelled")]
    Cancelled,
    /// The context deadline has passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

struct ValueNode {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<ValueNode>>,
}

struct CancelNode {
    cancelled: AtomicBool,
    parent: Option<Arc<CancelNode>>,
}

impl CancelNode {
    fn is_cancelled(&self) -> bool {
        let mut node = Some(self);
        while let Some(n) = node {
            if n.cancelled.load(Ordering::Acquire) {
                return true;
            }
            node = n.parent.as_deref();
        }
        false
    }
}

/// An immutable per-call-chain context.
///
/// Cloning is cheap (a few `Arc` bumps). `Context` is `Send + Sync`; it can
/// be handed to another thread, though anything stored in it keeps its own
/// sharing rules.
#[derive(Clone, Default)]
pub struct Context {
    values: Option<Arc<ValueNode>>,
    cancel: Option<Arc<CancelNode>>,
    deadline: Option<Instant>,
}

impl Context {
    /// Returns an empty root context with no deadline and no cancellation.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// Derives a context carrying `value` under the key type `K`.
    ///
    /// The new value shadows any value an ancestor holds for `K`.
    #[must_use]
    pub fn with_value<K, V>(&self, value: V) -> Self
    where
        K: 'static,
        V: Any + Send + Sync,
    {
        Self {
            values: Some(Arc::new(ValueNode {
                key: TypeId::of::<K>(),
                value: Arc::new(value),
                parent: self.values.clone(),
            })),
            cancel: self.cancel.clone(),
            deadline: self.deadline,
        }
    }

    /// Returns the nearest value stored under `K`, if it has type `V`.
    pub fn value<K, V>(&self) -> Option<&V>
    where
        K: 'static,
        V: Any,
    {
        let key = TypeId::of::<K>();
        let mut node = self.values.as_deref();
        while let Some(n) = node {
            if n.key == key {
                return n.value.downcast_ref::<V>();
            }
            node = n.parent.as_deref();
        }
        None
    }

    /// Derives a context that expires at `deadline`.
    ///
    /// A child can only tighten an inherited deadline, never extend it.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            values: self.values.clone(),
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    /// Derives a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a cancellable context.
    ///
    /// Cancelling the returned handle cancels the derived context and every
    /// context derived from it; the parent is unaffected.
    #[must_use]
    pub fn with_cancel(&self) -> (Self, CancelHandle) {
        let node = Arc::new(CancelNode {
            cancelled: AtomicBool::new(false),
            parent: self.cancel.clone(),
        });
        let cx = Self {
            values: self.values.clone(),
            cancel: Some(Arc::clone(&node)),
            deadline: self.deadline,
        };
        (cx, CancelHandle { node })
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the time left before the deadline.
    ///
    /// `None` means no deadline; `Some(Duration::ZERO)` means it has passed.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns true if this context or an ancestor was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_deref().is_some_and(CancelNode::is_cancelled)
    }

    /// Fails if the context was cancelled or its deadline has passed.
    ///
    /// Drivers call this before every round-trip.
    pub fn check(&self) -> Result<(), ContextError> {
        if self.is_cancelled() {
            return Err(ContextError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(ContextError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        let mut node = self.values.as_deref();
        while let Some(n) = node {
            depth += 1;
            node = n.parent.as_deref();
        }
        f.debug_struct("Context")
            .field("values", &depth)
            .field("deadline", &self.deadline)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Cancels the context it was created with.
#[derive(Clone)]
pub struct CancelHandle {
    node: Arc<CancelNode>,
}

impl CancelHandle {
    /// Cancels the associated context and all of its descendants.
    pub fn cancel(&self) {
        self.node.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.node.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct KeyA;
    struct KeyB;

    #[test]
    fn background_has_nothing() {
        let cx = Context::background();
        assert!(cx.value::<KeyA, u32>().is_none());
        assert!(cx.deadline().is_none());
        assert!(!cx.is_cancelled());
        assert!(cx.check().is_ok());
    }

    #[test]
    fn child_shadows_parent_value() {
        let parent = Context::background().with_value::<KeyA, _>(1u32);
        let child = parent.with_value::<KeyA, _>(2u32);

        assert_eq!(parent.value::<KeyA, u32>(), Some(&1));
        assert_eq!(child.value::<KeyA, u32>(), Some(&2));
    }

    #[test]
    fn child_inherits_other_keys() {
        let cx = Context::background()
            .with_value::<KeyA, _>("a")
            .with_value::<KeyB, _>("b");

        assert_eq!(cx.value::<KeyA, &str>(), Some(&"a"));
        assert_eq!(cx.value::<KeyB, &str>(), Some(&"b"));
    }

    #[test]
    fn wrong_value_type_is_none() {
        let cx = Context::background().with_value::<KeyA, _>(1u32);
        assert!(cx.value::<KeyA, u64>().is_none());
    }

    #[test]
    fn cancel_propagates_to_children_only() {
        let root = Context::background();
        let (cx, handle) = root.with_cancel();
        let child = cx.with_value::<KeyA, _>(());

        handle.cancel();

        assert!(handle.is_cancelled());
        assert!(cx.is_cancelled());
        assert!(child.is_cancelled());
        assert!(!root.is_cancelled());
        assert_eq!(child.check(), Err(ContextError::Cancelled));
    }

    #[test]
    fn cancelling_ancestor_cancels_nested_cancel_scope() {
        let (outer, outer_handle) = Context::background().with_cancel();
        let (inner, inner_handle) = outer.with_cancel();

        outer_handle.cancel();

        assert!(inner.is_cancelled());
        assert!(!inner_handle.is_cancelled());
    }

    #[test]
    fn expired_deadline_fails_check() {
        let cx = Context::background().with_deadline(Instant::now() - Duration::from_millis(1));
        assert_eq!(cx.check(), Err(ContextError::DeadlineExceeded));
        assert_eq!(cx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn child_cannot_extend_deadline() {
        let parent = Context::background().with_timeout(Duration::from_secs(1));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn child_can_tighten_deadline() {
        let parent = Context::background().with_timeout(Duration::from_secs(60));
        let child = parent.with_timeout(Duration::from_secs(1));
        assert!(child.deadline() < parent.deadline());
    }

    #[test]
    fn context_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Context>();
        assert_send_sync::<CancelHandle>();
    }
}
