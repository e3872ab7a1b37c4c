pub mod monitor;
pub mod policy;
pub mod slot;
pub mod state;
pub mod subscription;

pub use monitor::{ChannelReport, StatusMonitor};
pub use policy::ReconnectPolicy;
pub use slot::{ConnectionHandle, ConnectionSlot};
pub use state::{StatusChange, SubscriptionState, SubscriptionStatus};
pub use subscription::SubscriptionLoop;
