use serde::{Deserialize, Serialize};

use crate::normalize::GeoPoint;

/// Normalized events produced by the decoders, one variant per upstream shape.
#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Position(PositionEvent),
    GeoOverlay(GeoOverlayEvent),
    AgentSet(AgentSetEvent),
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Position(_) => "position",
            Self::GeoOverlay(_) => "geo_overlay",
            Self::AgentSet(_) => "agent_set",
        }
    }
}

impl From<PositionEvent> for DomainEvent {
    fn from(e: PositionEvent) -> Self {
        Self::Position(e)
    }
}

impl From<GeoOverlayEvent> for DomainEvent {
    fn from(e: GeoOverlayEvent) -> Self {
        Self::GeoOverlay(e)
    }
}

impl From<AgentSetEvent> for DomainEvent {
    fn from(e: AgentSetEvent) -> Self {
        Self::AgentSet(e)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionKind {
    Vehicle,
    Robot,
}

impl PositionKind {
    /// Marker type sent to viewers. Both kinds render with the same marker.
    pub fn marker_type(self) -> i32 {
        match self {
            Self::Vehicle | Self::Robot => 0,
        }
    }
}

/// A single moving subject at a geographic position.
#[derive(Clone, Debug, PartialEq)]
pub struct PositionEvent {
    pub subject_id: i32,
    pub kind: PositionKind,
    pub position: GeoPoint,
    pub heading: f64,
    pub speed: i32,
    /// Unix seconds.
    pub timestamp: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OverlayKind {
    GeoJson,
    Lines,
    ViewState,
    ClearMoves,
    Pitch,
    Bearing,
}

impl OverlayKind {
    /// Sub-type tag carried by geographic upstream records.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "GeoJson" => Some(Self::GeoJson),
            "Lines" => Some(Self::Lines),
            "ViewState" => Some(Self::ViewState),
            "ClearMoves" => Some(Self::ClearMoves),
            "Pitch" => Some(Self::Pitch),
            "Bearing" => Some(Self::Bearing),
            _ => None,
        }
    }
}

/// A map overlay update. `payload` is already JSON text and is forwarded verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct GeoOverlayEvent {
    pub kind: OverlayKind,
    pub payload: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Agent {
    pub id: i32,
    pub lon: f64,
    pub lat: f64,
}

/// A batch of pedestrian/agent positions. Order is upstream order; ids may repeat.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentSetEvent {
    pub agents: Vec<Agent>,
    pub timestamp_seconds: i64,
    pub timestamp_nanos: i32,
}

impl AgentSetEvent {
    pub fn millis(&self) -> i32 {
        self.timestamp_nanos.clamp(0, 999_999_999) / 1_000_000
    }
}
