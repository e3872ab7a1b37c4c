pub mod channel;
pub mod errors;
pub mod events;
pub mod normalize;
pub mod sink;
pub mod wire;

pub use channel::ChannelKind;
pub use errors::{DecodeError, DecodeFailure};
pub use events::{Agent, AgentSetEvent, DomainEvent, GeoOverlayEvent, OverlayKind, PositionEvent, PositionKind};
pub use normalize::GeoPoint;
pub use sink::EventSink;
pub use wire::{BroadcastTopic, Topic};
