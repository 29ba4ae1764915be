//! Stage results and failure causes.
//!
//! Stage handlers produce an [`Eventual`]: either a ready context (the common
//! synchronous case, no future allocated) or a boxed future that resolves to
//! one. Failures travel as a [`Cause`], a cheaply-cloneable type-tagged error
//! that lets downstream `error` handlers decide whether they can handle it.

use std::any::TypeId;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use futures::future::BoxFuture;

use crate::context::Context;

/// The underlying failure carried by a [`StageError`](crate::chain::StageError).
///
/// Wraps any `std::error::Error` behind an `Arc` and records the concrete
/// type at construction, so handlers can test it with [`Cause::is`] or
/// inspect it with [`Cause::downcast_ref`] even after the error has been
/// type-erased.
#[derive(Clone)]
pub struct Cause {
    inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
    type_id: TypeId,
}

impl Cause {
    /// Wrap a concrete error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(error),
            type_id: TypeId::of::<E>(),
        }
    }

    /// Create an ad-hoc cause from a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::new(Message(message.to_string()))
    }

    /// Whether the wrapped error is of type `E`.
    pub fn is<E>(&self) -> bool
    where
        E: std::error::Error + 'static,
    {
        self.type_id == TypeId::of::<E>()
    }

    /// Borrow the wrapped error as `E`, if that is its concrete type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Whether two causes wrap the same concrete error type.
    pub fn same_type(&self, other: &Cause) -> bool {
        self.type_id == other.type_id
    }

    /// Borrow the wrapped error.
    pub fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.inner.as_ref()
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

impl fmt::Debug for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

// Deliberately no `std::error::Error` impl: that would collide with the
// blanket conversion below, which is what makes `?` ergonomic in handlers.
impl<E> From<E> for Cause
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Cause::new(error)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

/// The result of a stage handler: a ready context or a deferred one.
///
/// `Eventual` implements [`Future`], so the executor simply awaits it; the
/// ready arm resolves on the first poll without ever allocating a future.
pub struct Eventual {
    inner: Inner,
}

enum Inner {
    Ready(Option<Result<Context, Cause>>),
    Pending(BoxFuture<'static, Result<Context, Cause>>),
}

impl Eventual {
    /// An already-resolved successful context.
    pub fn ready(context: Context) -> Self {
        Self {
            inner: Inner::Ready(Some(Ok(context))),
        }
    }

    /// An already-resolved failure.
    pub fn fail(cause: impl Into<Cause>) -> Self {
        Self {
            inner: Inner::Ready(Some(Err(cause.into()))),
        }
    }

    /// A deferred completion.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<Context, Cause>> + Send + 'static,
    {
        Self {
            inner: Inner::Pending(Box::pin(future)),
        }
    }
}

impl Future for Eventual {
    type Output = Result<Context, Cause>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Ready(slot) => match slot.take() {
                Some(result) => Poll::Ready(result),
                None => panic!("Eventual polled after completion"),
            },
            Inner::Pending(future) => future.as_mut().poll(cx),
        }
    }
}

impl From<Context> for Eventual {
    fn from(context: Context) -> Self {
        Eventual::ready(context)
    }
}

impl From<Result<Context, Cause>> for Eventual {
    fn from(result: Result<Context, Cause>) -> Self {
        Self {
            inner: Inner::Ready(Some(result)),
        }
    }
}
