use crate::events::DomainEvent;

/// Destination for decoded events. Implemented by the broadcaster.
///
/// `publish` must not block on downstream viewers: it hands the event off and
/// returns. Delivery is best-effort.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn publish(&self, event: DomainEvent) {
        (**self).publish(event)
    }
}
