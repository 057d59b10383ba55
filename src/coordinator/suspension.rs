//! A suspended call's completion and the resources it pins
//!
//! The argument frame and the keepalive belong to the foreign call, not to
//! the host's deferred. If the deferred is dropped early they are parked on
//! the coordinator and released only once the engine delivers completion.

use super::engine::{Completion, OperationId};
use super::{AsyncCoordinator, KeepAlive, ProtocolViolation};
use crate::allocator::StackFrame;
use crate::value::Value;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use futures::FutureExt;
use std::sync::Arc;
use tracing::warn;

/// Resources held until the suspended call completes
#[derive(Debug)]
pub(crate) struct Pinned {
    pub completion: Completion,
    pub frame: StackFrame,
    pub keepalive: KeepAlive,
}

/// Future of a suspended call's raw return value
///
/// Resolves to the raw value and the still-live frame; the coordinator has
/// already returned to `Idle` by then.
pub(crate) struct Suspension {
    coordinator: Arc<AsyncCoordinator>,
    operation: OperationId,
    ident: String,
    pinned: Option<Pinned>,
}

impl Suspension {
    pub(crate) fn new(
        coordinator: Arc<AsyncCoordinator>,
        operation: OperationId,
        ident: String,
        pinned: Pinned,
    ) -> Self {
        Self {
            coordinator,
            operation,
            ident,
            pinned: Some(pinned),
        }
    }
}

impl Future for Suspension {
    type Output = Result<(Value, StackFrame), ProtocolViolation>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(mut pinned) = this.pinned.take() else {
            return Poll::Ready(Err(ProtocolViolation::CompletionLost {
                ident: this.ident.clone(),
            }));
        };

        let delivered = match pinned.completion.poll_unpin(cx) {
            Poll::Ready(delivered) => delivered,
            Poll::Pending => {
                this.pinned = Some(pinned);
                return Poll::Pending;
            }
        };

        let Pinned { frame, keepalive, .. } = pinned;
        drop(keepalive);

        Poll::Ready(match delivered {
            Ok(raw) => this.coordinator.complete(this.operation).map(|()| (raw, frame)),
            Err(_) => Err(ProtocolViolation::CompletionLost {
                ident: this.ident.clone(),
            }),
        })
    }
}

impl Drop for Suspension {
    fn drop(&mut self) {
        if let Some(pinned) = self.pinned.take() {
            warn!(
                target: "coordinator",
                ident = %self.ident,
                operation = %self.operation,
                "deferred dropped while suspended; frame parked until completion"
            );
            self.coordinator
                .park(self.operation, core::mem::take(&mut self.ident), pinned);
        }
    }
}
