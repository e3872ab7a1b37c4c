//! Upstream protobuf layouts.
//!
//! Declared with `prost` derives rather than generated, since the set is small
//! and stable. Geographic sub-messages also derive `Serialize` because their
//! JSON form is what viewers receive; zero-valued fields are left out of it,
//! as protobuf JSON does.

use serde::Serialize;

#[derive(Clone, PartialEq, prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// Envelope around every record published on a channel.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Supply {
    #[prost(string, tag = "1")]
    pub supply_name: String,
    #[prost(message, optional, tag = "2")]
    pub ts: Option<Timestamp>,
    #[prost(bytes = "vec", tag = "3")]
    pub entity: Vec<u8>,
    #[prost(uint32, tag = "4")]
    pub channel_type: u32,
}

/// First frame sent on a subscription stream.
#[derive(Clone, PartialEq, prost::Message)]
pub struct SubscribeRequest {
    #[prost(uint32, tag = "1")]
    pub channel_type: u32,
    #[prost(string, tag = "2")]
    pub client_info: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum NodeAction {
    Register = 0,
    Unregister = 1,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NodeRequest {
    #[prost(string, tag = "1")]
    pub node_name: String,
    #[prost(uint32, repeated, tag = "2")]
    pub channel_types: Vec<u32>,
    #[prost(enumeration = "NodeAction", tag = "3")]
    pub action: i32,
    #[prost(int32, tag = "4")]
    pub node_id: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct NodeResponse {
    #[prost(int32, tag = "1")]
    pub node_id: i32,
    #[prost(string, tag = "2")]
    pub server_address: String,
    #[prost(bool, tag = "3")]
    pub ok: bool,
    #[prost(string, tag = "4")]
    pub message: String,
}

// ── Fleet ────────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct Coord {
    #[prost(float, tag = "1")]
    pub lat: f32,
    #[prost(float, tag = "2")]
    pub lon: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Fleet {
    #[prost(int32, tag = "1")]
    pub vehicle_id: i32,
    #[prost(message, optional, tag = "2")]
    pub coord: Option<Coord>,
    #[prost(float, tag = "3")]
    pub angle: f32,
    #[prost(int32, tag = "4")]
    pub speed: i32,
}

// ── People agents ────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct PAgent {
    #[prost(int32, tag = "1")]
    pub id: i32,
    /// `[lon, lat]`
    #[prost(double, repeated, tag = "2")]
    pub point: Vec<f64>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct PAgents {
    #[prost(message, repeated, tag = "1")]
    pub agents: Vec<PAgent>,
}

// ── MQTT gateway ─────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct MqttRecord {
    #[prost(string, tag = "1")]
    pub topic: String,
    /// JSON document published on `topic`.
    #[prost(bytes = "vec", tag = "2")]
    pub record: Vec<u8>,
}

// ── Geographic ───────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, prost::Message)]
pub struct Geo {
    #[prost(string, tag = "1")]
    pub r#type: String,
    #[prost(int32, tag = "2")]
    pub id: i32,
    #[prost(string, tag = "3")]
    pub label: String,
    /// GeoJSON text.
    #[prost(bytes = "vec", tag = "4")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Line {
    #[prost(double, repeated, tag = "1")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<f64>,
    #[prost(double, repeated, tag = "2")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<f64>,
    #[prost(int32, repeated, tag = "3")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub color: Vec<i32>,
    #[prost(double, tag = "4")]
    #[serde(skip_serializing_if = "is_zero")]
    pub width: f64,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Lines {
    #[prost(message, repeated, tag = "1")]
    pub lines: Vec<Line>,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ViewState {
    #[prost(double, tag = "1")]
    #[serde(skip_serializing_if = "is_zero")]
    pub lat: f64,
    #[prost(double, tag = "2")]
    #[serde(skip_serializing_if = "is_zero")]
    pub lon: f64,
    #[prost(double, tag = "3")]
    #[serde(skip_serializing_if = "is_zero")]
    pub zoom: f64,
    #[prost(double, tag = "4")]
    #[serde(skip_serializing_if = "is_zero")]
    pub pitch: f64,
    #[prost(double, tag = "5")]
    #[serde(skip_serializing_if = "is_zero")]
    pub bearing: f64,
    #[prost(double, tag = "6")]
    #[serde(skip_serializing_if = "is_zero")]
    pub duration: f64,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct ClearMoves {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target: String,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Pitch {
    #[prost(double, tag = "1")]
    #[serde(skip_serializing_if = "is_zero")]
    pub pitch: f64,
}

#[derive(Clone, PartialEq, Serialize, prost::Message)]
pub struct Bearing {
    #[prost(double, tag = "1")]
    #[serde(skip_serializing_if = "is_zero")]
    pub bearing: f64,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}
