pub mod decode;
pub mod error;
pub mod mock;
pub mod proto;
pub mod registration;
pub mod tcp;
pub mod transport;

pub use decode::{ChannelDecoder, Decoded, Decoder};
pub use error::{RegistrationError, UpstreamError};
pub use registration::{NodeRegistrar, NodeRegistration};
pub use tcp::{TcpConnector, TcpConnectorConfig};
pub use transport::{Connector, FrameStream, UpstreamConnection};
