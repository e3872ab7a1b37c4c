use std::fmt;

use serde::{Deserialize, Serialize};

/// One category of upstream publish/subscribe feed.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Fleet,
    PeopleAgent,
    Geographic,
    MqttGateway,
}

impl ChannelKind {
    /// Every channel the bridge subscribes to, in startup order.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Fleet,
        ChannelKind::PeopleAgent,
        ChannelKind::Geographic,
        ChannelKind::MqttGateway,
    ];

    /// Numeric channel type used on the upstream wire.
    pub fn type_code(self) -> u32 {
        match self {
            Self::Fleet => 1,
            Self::MqttGateway => 11,
            Self::PeopleAgent => 13,
            Self::Geographic => 14,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fleet => "fleet",
            Self::PeopleAgent => "people_agent",
            Self::Geographic => "geographic",
            Self::MqttGateway => "mqtt_gateway",
        }
    }

    /// Client descriptor sent with each subscription request.
    pub fn client_info(self) -> &'static str {
        match self {
            Self::Fleet => "{Client:Map:RIDE}",
            Self::PeopleAgent => "{Client:Map:PAGENT}",
            Self::Geographic => "{Client:Map:Geo}",
            Self::MqttGateway => "{Client:MQTT}",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
