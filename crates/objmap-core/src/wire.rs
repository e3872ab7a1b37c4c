//! Wire JSON sent to viewers.
//!
//! Each broadcast is a `(topic, payload)` pair. The payload is itself JSON text
//! in the per-topic layout viewers already understand; on the socket the pair
//! travels as a `{"topic": ..., "payload": ...}` text frame.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{AgentSetEvent, DomainEvent, GeoOverlayEvent, OverlayKind, PositionEvent};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Topic {
    Event,
    GeoJson,
    Lines,
    ViewState,
    ClearMoves,
    Pitch,
    Bearing,
    Agents,
    MapboxToken,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::GeoJson => "geojson",
            Self::Lines => "lines",
            Self::ViewState => "viewstate",
            Self::ClearMoves => "clearMoves",
            Self::Pitch => "pitch",
            Self::Bearing => "bearing",
            Self::Agents => "agents",
            Self::MapboxToken => "mapbox_token",
        }
    }
}

impl From<OverlayKind> for Topic {
    fn from(kind: OverlayKind) -> Self {
        match kind {
            OverlayKind::GeoJson => Self::GeoJson,
            OverlayKind::Lines => Self::Lines,
            OverlayKind::ViewState => Self::ViewState,
            OverlayKind::ClearMoves => Self::ClearMoves,
            OverlayKind::Pitch => Self::Pitch,
            OverlayKind::Bearing => Self::Bearing,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable topic/payload pair ready for fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BroadcastTopic {
    topic: Topic,
    payload: String,
}

impl BroadcastTopic {
    pub fn new(topic: Topic, payload: impl Into<String>) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Serialize a domain event into its per-topic payload.
    pub fn from_event(event: &DomainEvent) -> Result<Self, serde_json::Error> {
        match event {
            DomainEvent::Position(e) => position_payload(e).map(|p| Self::new(Topic::Event, p)),
            DomainEvent::GeoOverlay(e) => Ok(overlay_payload(e)),
            DomainEvent::AgentSet(e) => agents_payload(e).map(|p| Self::new(Topic::Agents, p)),
        }
    }

    /// The socket text frame for this broadcast.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&ViewerFrame {
            topic: self.topic.as_str().to_string(),
            payload: Some(self.payload.clone()),
        })
    }
}

/// Text frame exchanged with viewers in both directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewerFrame {
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

#[derive(Serialize)]
struct WireMarker {
    mtype: i32,
    id: i32,
    time: i64,
    lat: f64,
    lon: f64,
    angle: f64,
    speed: i32,
}

#[derive(Serialize)]
struct WireAgent {
    id: i32,
    point: [f64; 2],
}

#[derive(Serialize)]
struct WireAgents {
    agents: Vec<WireAgent>,
}

fn position_payload(e: &PositionEvent) -> Result<String, serde_json::Error> {
    serde_json::to_string(&WireMarker {
        mtype: e.kind.marker_type(),
        id: e.subject_id,
        time: e.timestamp,
        lat: e.position.lat,
        lon: e.position.lon,
        angle: e.heading,
        speed: e.speed,
    })
}

fn overlay_payload(e: &GeoOverlayEvent) -> BroadcastTopic {
    BroadcastTopic::new(e.kind.into(), e.payload.clone())
}

fn agents_payload(e: &AgentSetEvent) -> Result<String, serde_json::Error> {
    let dt = serde_json::to_string(&WireAgents {
        agents: e
            .agents
            .iter()
            .map(|a| WireAgent {
                id: a.id,
                point: [a.lon, a.lat],
            })
            .collect(),
    })?;
    // ts is rendered as seconds.millis with exactly three fractional digits
    Ok(format!(
        "{{\"ts\":{}.{:03},\"dt\":{}}}",
        e.timestamp_seconds,
        e.millis(),
        dt
    ))
}
