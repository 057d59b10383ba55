//! Deferred call results
//!
//! A `Deferred` resolves exactly once with the converted return value of a
//! call. Suspended calls carry their conversion and frame release inside the
//! future; calls that completed synchronously are already resolved.

use crate::interop::CallError;
use crate::value::Value;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use futures::future::{self, BoxFuture, FutureExt};

/// Result of a call not yet (or already) available
pub struct Deferred {
    inner: BoxFuture<'static, Result<Value, CallError>>,
}

impl Deferred {
    /// Deferred that is already resolved
    pub fn resolved(value: Value) -> Self {
        Self {
            inner: future::ready(Ok(value)).boxed(),
        }
    }

    pub(crate) fn new<F>(completion: F) -> Self
    where
        F: Future<Output = Result<Value, CallError>> + Send + 'static,
    {
        Self {
            inner: completion.boxed(),
        }
    }
}

impl Future for Deferred {
    type Output = Result<Value, CallError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deferred {{ ... }}")
    }
}

/// What a call hands back: a value now, or a deferred one
#[derive(Debug)]
pub enum Outcome {
    Ready(Value),
    Deferred(Deferred),
}

impl Outcome {
    /// Immediate value, if the call was not deferred
    pub fn ready(self) -> Option<Value> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Deferred(_) => None,
        }
    }

    #[inline]
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Treat every outcome as deferred
    pub fn into_deferred(self) -> Deferred {
        match self {
            Self::Ready(value) => Deferred::resolved(value),
            Self::Deferred(deferred) => deferred,
        }
    }

    /// Wait for the value
    pub async fn resolve(self) -> Result<Value, CallError> {
        self.into_deferred().await
    }
}
