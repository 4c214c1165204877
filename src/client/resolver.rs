use crate::attributes::Attributes;
use futures_channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Resolves once with the resource attributes the agent should report.
///
/// This is either what the server sent in its SDK configuration or, when bootstrap gave up,
/// the fallback built from the device id. It never stays pending past the life of the client.
pub struct ResourceAttributes {
    receiver: oneshot::Receiver<Attributes>,
}

impl Future for ResourceAttributes {
    type Output = Attributes;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(attributes)) => Poll::Ready(attributes),
            // The resolver always sends before going away
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Attributes::new()),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Write side of [`ResourceAttributes`]. Consumed by the first resolution; dropping it
/// unresolved delivers the fallback.
pub(crate) struct AttributeResolver {
    sender: Option<oneshot::Sender<Attributes>>,
    fallback: Attributes,
}

impl AttributeResolver {
    pub(crate) fn channel(fallback: Attributes) -> (AttributeResolver, ResourceAttributes) {
        let (sender, receiver) = oneshot::channel();
        (
            AttributeResolver {
                sender: Some(sender),
                fallback,
            },
            ResourceAttributes { receiver },
        )
    }

    pub(crate) fn fallback(&self) -> &Attributes {
        &self.fallback
    }

    pub(crate) fn resolve(mut self, attributes: Attributes) {
        if let Some(sender) = self.sender.take() {
            // Nobody listening is fine
            let _ = sender.send(attributes);
        }
    }

    pub(crate) fn resolve_fallback(mut self) {
        let fallback = std::mem::take(&mut self.fallback);
        self.resolve(fallback);
    }
}

impl Drop for AttributeResolver {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(std::mem::take(&mut self.fallback));
        }
    }
}
