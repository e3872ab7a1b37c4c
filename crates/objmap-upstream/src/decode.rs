//! Per-channel decoders: raw upstream frame to [`DomainEvent`].
//!
//! Decoders are pure. Receipt time is passed in so that records without an
//! upstream timestamp are stamped deterministically.

use chrono::{DateTime, Utc};
use prost::Message;
use serde::Deserialize;

use objmap_core::normalize::{normalize, GeoPoint};
use objmap_core::{
    Agent, AgentSetEvent, ChannelKind, DecodeError, DomainEvent, GeoOverlayEvent, OverlayKind,
    PositionEvent, PositionKind,
};

use crate::proto;

const ROBOT_TOPIC_PREFIX: &str = "pos/robot/";
const ROBOT_TOPIC_SUFFIX: &str = "/pose";
const HUMAN_TOPIC: &str = "pos/human/all";
const AGENTS_SUPPLY: &str = "Agents";
const ROBOT_SPEED: i32 = 1;

/// Outcome of decoding one well-formed record.
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    Event(DomainEvent),
    /// Well-formed but not something viewers display.
    Ignored(String),
}

pub trait Decoder: Send + Sync {
    fn channel(&self) -> ChannelKind;
    fn decode(&self, raw: &[u8], received_at: DateTime<Utc>) -> Result<Decoded, DecodeError>;
}

/// The stock decoder for a channel kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelDecoder(pub ChannelKind);

impl Decoder for ChannelDecoder {
    fn channel(&self) -> ChannelKind {
        self.0
    }

    fn decode(&self, raw: &[u8], received_at: DateTime<Utc>) -> Result<Decoded, DecodeError> {
        let supply = decode_envelope(self.0, raw)?;
        decode_supply(self.0, &supply, received_at)
    }
}

pub fn decode_envelope(channel: ChannelKind, raw: &[u8]) -> Result<proto::Supply, DecodeError> {
    let supply = proto::Supply::decode(raw).map_err(|e| DecodeError::Envelope(e.to_string()))?;
    if supply.channel_type != 0 && supply.channel_type != channel.type_code() {
        return Err(DecodeError::ChannelMismatch {
            expected: channel,
            actual: supply.channel_type,
        });
    }
    Ok(supply)
}

pub fn decode_supply(
    channel: ChannelKind,
    supply: &proto::Supply,
    received_at: DateTime<Utc>,
) -> Result<Decoded, DecodeError> {
    match channel {
        ChannelKind::Fleet => decode_fleet(supply, received_at),
        ChannelKind::PeopleAgent => decode_people_agents(supply, received_at),
        ChannelKind::Geographic => decode_geographic(supply),
        ChannelKind::MqttGateway => decode_mqtt(supply, received_at),
    }
}

fn envelope_seconds(supply: &proto::Supply) -> Option<(i64, i32)> {
    supply
        .ts
        .as_ref()
        .filter(|ts| ts.seconds != 0 || ts.nanos != 0)
        .map(|ts| (ts.seconds, ts.nanos))
}

// ── Fleet ────────────────────────────────────────────────────────────────

fn decode_fleet(supply: &proto::Supply, received_at: DateTime<Utc>) -> Result<Decoded, DecodeError> {
    let fleet = proto::Fleet::decode(supply.entity.as_slice())
        .map_err(|e| DecodeError::malformed("Fleet", e))?;
    let coord = fleet.coord.ok_or(DecodeError::MissingField("coord"))?;
    let position = GeoPoint::checked(f64::from(coord.lat), f64::from(coord.lon)).ok_or_else(|| {
        DecodeError::invalid("coord", format!("({}, {}) out of range", coord.lat, coord.lon))
    })?;
    let timestamp = envelope_seconds(supply)
        .map(|(s, _)| s)
        .unwrap_or_else(|| received_at.timestamp());

    Ok(Decoded::Event(
        PositionEvent {
            subject_id: fleet.vehicle_id,
            kind: PositionKind::Vehicle,
            position,
            heading: f64::from(fleet.angle),
            speed: fleet.speed,
            timestamp,
        }
        .into(),
    ))
}

// ── People agents ────────────────────────────────────────────────────────

fn decode_people_agents(
    supply: &proto::Supply,
    received_at: DateTime<Utc>,
) -> Result<Decoded, DecodeError> {
    if supply.supply_name != AGENTS_SUPPLY {
        return Ok(Decoded::Ignored(format!("supply name {:?}", supply.supply_name)));
    }
    let batch = proto::PAgents::decode(supply.entity.as_slice())
        .map_err(|e| DecodeError::malformed("PAgents", e))?;

    let agents = batch
        .agents
        .iter()
        .map(|a| match a.point.as_slice() {
            [lon, lat, ..] => Ok(Agent {
                id: a.id,
                lon: *lon,
                lat: *lat,
            }),
            _ => Err(DecodeError::invalid(
                "point",
                format!("agent {} has {} components", a.id, a.point.len()),
            )),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (timestamp_seconds, timestamp_nanos) = envelope_seconds(supply)
        .unwrap_or_else(|| receipt_stamp(received_at));

    Ok(Decoded::Event(
        AgentSetEvent {
            agents,
            timestamp_seconds,
            timestamp_nanos,
        }
        .into(),
    ))
}

fn receipt_stamp(received_at: DateTime<Utc>) -> (i64, i32) {
    let nanos = i32::try_from(received_at.timestamp_subsec_nanos()).unwrap_or(0);
    (received_at.timestamp(), nanos)
}

// ── Geographic ───────────────────────────────────────────────────────────

fn decode_geographic(supply: &proto::Supply) -> Result<Decoded, DecodeError> {
    let Some(kind) = OverlayKind::from_tag(&supply.supply_name) else {
        return Ok(Decoded::Ignored(format!("geographic tag {:?}", supply.supply_name)));
    };
    let entity = supply.entity.as_slice();

    let payload = match kind {
        OverlayKind::GeoJson => {
            let geo = proto::Geo::decode(entity).map_err(|e| DecodeError::malformed("Geo", e))?;
            tracing::debug!(
                geo_type = %geo.r#type,
                geo_id = geo.id,
                label = %geo.label,
                len = geo.data.len(),
                "geojson overlay"
            );
            String::from_utf8(geo.data).map_err(|e| DecodeError::invalid("data", e))?
        }
        OverlayKind::Lines => {
            let lines =
                proto::Lines::decode(entity).map_err(|e| DecodeError::malformed("Lines", e))?;
            to_json("Lines", &lines.lines)?
        }
        OverlayKind::ViewState => {
            let vs = proto::ViewState::decode(entity)
                .map_err(|e| DecodeError::malformed("ViewState", e))?;
            to_json("ViewState", &vs)?
        }
        OverlayKind::ClearMoves => {
            let cm = proto::ClearMoves::decode(entity)
                .map_err(|e| DecodeError::malformed("ClearMoves", e))?;
            to_json("ClearMoves", &cm)?
        }
        OverlayKind::Pitch => {
            let p = proto::Pitch::decode(entity).map_err(|e| DecodeError::malformed("Pitch", e))?;
            to_json("Pitch", &p)?
        }
        OverlayKind::Bearing => {
            let b =
                proto::Bearing::decode(entity).map_err(|e| DecodeError::malformed("Bearing", e))?;
            to_json("Bearing", &b)?
        }
    };

    Ok(Decoded::Event(GeoOverlayEvent { kind, payload }.into()))
}

fn to_json<T: serde::Serialize>(message: &'static str, value: &T) -> Result<String, DecodeError> {
    serde_json::to_string(value).map_err(|e| DecodeError::malformed(message, e))
}

// ── MQTT gateway ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct Stamp {
    #[serde(default)]
    secs: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Header {
    #[serde(default)]
    stamp: Stamp,
    #[serde(default)]
    frame_id: String,
}

#[derive(Debug, Deserialize)]
struct Vec3 {
    x: f64,
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
struct Orientation {
    #[serde(default)]
    z: f64,
}

#[derive(Debug, Deserialize)]
struct PoseBody {
    position: Vec3,
    #[serde(default)]
    orientation: Orientation,
}

/// A stamped pose as published by the robots' MQTT bridge.
#[derive(Debug, Deserialize)]
struct PoseStamped {
    #[serde(default)]
    header: Header,
    pose: PoseBody,
}

fn decode_mqtt(supply: &proto::Supply, received_at: DateTime<Utc>) -> Result<Decoded, DecodeError> {
    let record = proto::MqttRecord::decode(supply.entity.as_slice())
        .map_err(|e| DecodeError::malformed("MQTTRecord", e))?;
    let topic = record.topic.as_str();

    if let Some(robot_id) = robot_id(topic) {
        let pose: PoseStamped = serde_json::from_slice(&record.record)
            .map_err(|e| DecodeError::malformed("robot pose", e))?;
        let timestamp = if pose.header.stamp.secs != 0 {
            pose.header.stamp.secs
        } else {
            received_at.timestamp()
        };
        return Ok(Decoded::Event(
            PositionEvent {
                subject_id: robot_id,
                kind: PositionKind::Robot,
                position: normalize(pose.pose.position.x, pose.pose.position.y),
                heading: pose.pose.orientation.z,
                speed: ROBOT_SPEED,
                timestamp,
            }
            .into(),
        ));
    }

    if topic.starts_with(HUMAN_TOPIC) {
        let poses: Vec<PoseStamped> = serde_json::from_slice(&record.record)
            .map_err(|e| DecodeError::malformed("human poses", e))?;
        let agents = poses
            .iter()
            .map(|p| {
                let id = p
                    .header
                    .frame_id
                    .trim()
                    .parse::<i32>()
                    .map_err(|e| DecodeError::invalid("frame_id", format!("{:?}: {e}", p.header.frame_id)))?;
                let point = normalize(p.pose.position.x, p.pose.position.y);
                Ok(Agent {
                    id,
                    lon: point.lon,
                    lat: point.lat,
                })
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;
        let (timestamp_seconds, timestamp_nanos) = receipt_stamp(received_at);
        return Ok(Decoded::Event(
            AgentSetEvent {
                agents,
                timestamp_seconds,
                timestamp_nanos,
            }
            .into(),
        ));
    }

    Ok(Decoded::Ignored(format!("mqtt topic {topic:?}")))
}

/// Parse `pos/robot/<id>/pose`.
fn robot_id(topic: &str) -> Option<i32> {
    topic
        .strip_prefix(ROBOT_TOPIC_PREFIX)?
        .strip_suffix(ROBOT_TOPIC_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use objmap_core::normalize::{LAT_BASE, LON_BASE};
    use objmap_core::BroadcastTopic;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 250_000_000).unwrap()
    }

    fn frame(channel: ChannelKind, name: &str, entity: Vec<u8>, ts: Option<(i64, i32)>) -> Vec<u8> {
        proto::Supply {
            supply_name: name.into(),
            ts: ts.map(|(seconds, nanos)| proto::Timestamp { seconds, nanos }),
            entity,
            channel_type: channel.type_code(),
        }
        .encode_to_vec()
    }

    fn mqtt_frame(topic: &str, json: &str) -> Vec<u8> {
        let record = proto::MqttRecord {
            topic: topic.into(),
            record: json.as_bytes().to_vec(),
        };
        frame(ChannelKind::MqttGateway, "", record.encode_to_vec(), None)
    }

    fn event(decoded: Decoded) -> DomainEvent {
        match decoded {
            Decoded::Event(e) => e,
            Decoded::Ignored(why) => panic!("unexpectedly ignored: {why}"),
        }
    }

    #[test]
    fn fleet_record_maps_to_event_payload() {
        let fleet = proto::Fleet {
            vehicle_id: 17,
            coord: Some(proto::Coord { lat: 35.5, lon: 136.25 }),
            angle: 45.0,
            speed: 12,
        };
        let raw = frame(ChannelKind::Fleet, "", fleet.encode_to_vec(), None);
        let e = event(ChannelDecoder(ChannelKind::Fleet).decode(&raw, now()).unwrap());

        let wire = BroadcastTopic::from_event(&e).unwrap();
        assert_eq!(wire.topic().as_str(), "event");
        let v: serde_json::Value = serde_json::from_str(wire.payload()).unwrap();
        assert_eq!(v["id"], 17);
        assert_eq!(v["lat"].as_f64().unwrap(), 35.5);
        assert_eq!(v["lon"].as_f64().unwrap(), 136.25);
        assert_eq!(v["angle"].as_f64().unwrap(), 45.0);
        assert_eq!(v["speed"], 12);
        assert_eq!(v["time"], 1_700_000_000_i64);
    }

    #[test]
    fn fleet_prefers_envelope_timestamp() {
        let fleet = proto::Fleet {
            vehicle_id: 1,
            coord: Some(proto::Coord { lat: 1.0, lon: 2.0 }),
            ..Default::default()
        };
        let raw = frame(ChannelKind::Fleet, "", fleet.encode_to_vec(), Some((1234, 0)));
        match event(ChannelDecoder(ChannelKind::Fleet).decode(&raw, now()).unwrap()) {
            DomainEvent::Position(p) => assert_eq!(p.timestamp, 1234),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn fleet_without_coord_fails() {
        let fleet = proto::Fleet {
            vehicle_id: 1,
            ..Default::default()
        };
        let raw = frame(ChannelKind::Fleet, "", fleet.encode_to_vec(), None);
        let err = ChannelDecoder(ChannelKind::Fleet).decode(&raw, now()).unwrap_err();
        assert_eq!(err, DecodeError::MissingField("coord"));
    }

    #[test]
    fn fleet_out_of_range_fails_closed() {
        let fleet = proto::Fleet {
            vehicle_id: 1,
            coord: Some(proto::Coord { lat: 135.0, lon: 35.0 }),
            ..Default::default()
        };
        let raw = frame(ChannelKind::Fleet, "", fleet.encode_to_vec(), None);
        let err = ChannelDecoder(ChannelKind::Fleet).decode(&raw, now()).unwrap_err();
        assert_eq!(err.error_kind(), "invalid_value");
    }

    #[test]
    fn truncated_envelope_is_rejected() {
        let mut raw = frame(ChannelKind::Fleet, "x", vec![1, 2, 3, 4, 5], None);
        raw.truncate(raw.len() - 4);
        let err = ChannelDecoder(ChannelKind::Fleet).decode(&raw, now()).unwrap_err();
        assert_eq!(err.error_kind(), "envelope");
    }

    #[test]
    fn garbage_entity_is_rejected() {
        // field 1, length-delimited, claims 127 bytes but has none
        let raw = frame(ChannelKind::Fleet, "", vec![0x0A, 0x7F], None);
        let err = ChannelDecoder(ChannelKind::Fleet).decode(&raw, now()).unwrap_err();
        assert_eq!(err.error_kind(), "malformed");
    }

    #[test]
    fn wrong_channel_type_is_rejected() {
        let raw = frame(ChannelKind::Geographic, "Pitch", vec![], None);
        let err = ChannelDecoder(ChannelKind::Fleet).decode(&raw, now()).unwrap_err();
        assert!(matches!(err, DecodeError::ChannelMismatch { .. }));
    }

    #[test]
    fn robot_pose_at_origin_maps_to_base() {
        let raw = mqtt_frame("pos/robot/7/pose", r#"{"pose":{"position":{"x":0,"y":0}}}"#);
        match event(ChannelDecoder(ChannelKind::MqttGateway).decode(&raw, now()).unwrap()) {
            DomainEvent::Position(p) => {
                assert_eq!(p.subject_id, 7);
                assert_eq!(p.kind, PositionKind::Robot);
                assert_eq!(p.position.lat, LAT_BASE);
                assert_eq!(p.position.lon, LON_BASE);
                assert_eq!(p.speed, 1);
                assert_eq!(p.timestamp, 1_700_000_000);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn robot_pose_uses_orientation_and_stamp() {
        let json = r#"{"header":{"seq":3,"stamp":{"secs":99,"nsecs":5},"frame_id":"map"},
                       "pose":{"position":{"x":9.109,"y":0,"z":0},"orientation":{"x":0,"y":0,"z":0.5,"w":1}}}"#;
        let raw = mqtt_frame("pos/robot/12/pose", json);
        match event(ChannelDecoder(ChannelKind::MqttGateway).decode(&raw, now()).unwrap()) {
            DomainEvent::Position(p) => {
                assert_eq!(p.subject_id, 12);
                assert_eq!(p.heading, 0.5);
                assert_eq!(p.timestamp, 99);
                assert!((p.position.lon - (LON_BASE + 0.001)).abs() < 1e-12);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn robot_pose_without_position_fails() {
        let raw = mqtt_frame("pos/robot/7/pose", r#"{"pose":{}}"#);
        let err = ChannelDecoder(ChannelKind::MqttGateway).decode(&raw, now()).unwrap_err();
        assert_eq!(err.error_kind(), "malformed");
    }

    #[test]
    fn human_batch_preserves_order_and_ids() {
        let json = r#"[
            {"header":{"frame_id":"3"},"pose":{"position":{"x":0,"y":0}}},
            {"header":{"frame_id":"9"},"pose":{"position":{"x":9.109,"y":11.094}}}
        ]"#;
        let raw = mqtt_frame("pos/human/all", json);
        let e = event(ChannelDecoder(ChannelKind::MqttGateway).decode(&raw, now()).unwrap());
        let DomainEvent::AgentSet(set) = &e else {
            panic!("wrong variant: {e:?}");
        };
        assert_eq!(set.agents.len(), 2);
        assert_eq!(set.agents[0].id, 3);
        assert_eq!(set.agents[0].lon, LON_BASE);
        assert_eq!(set.agents[0].lat, LAT_BASE);
        assert_eq!(set.agents[1].id, 9);
        assert_eq!(set.timestamp_seconds, 1_700_000_000);

        let wire = BroadcastTopic::from_event(&e).unwrap();
        let v: serde_json::Value = serde_json::from_str(wire.payload()).unwrap();
        let agents = v["dt"]["agents"].as_array().unwrap();
        assert_eq!(agents[0]["id"], 3);
        assert_eq!(agents[0]["point"][0].as_f64().unwrap(), LON_BASE);
        assert_eq!(agents[0]["point"][1].as_f64().unwrap(), LAT_BASE);
        assert_eq!(agents[1]["id"], 9);
        assert!(wire.payload().starts_with("{\"ts\":1700000000.250,"));
    }

    #[test]
    fn human_batch_allows_duplicate_ids() {
        let json = r#"[
            {"header":{"frame_id":"4"},"pose":{"position":{"x":1,"y":1}}},
            {"header":{"frame_id":"4"},"pose":{"position":{"x":2,"y":2}}}
        ]"#;
        let raw = mqtt_frame("pos/human/all", json);
        match event(ChannelDecoder(ChannelKind::MqttGateway).decode(&raw, now()).unwrap()) {
            DomainEvent::AgentSet(set) => {
                assert_eq!(set.agents.len(), 2);
                assert!(set.agents.iter().all(|a| a.id == 4));
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn human_batch_with_non_numeric_frame_id_fails() {
        let json = r#"[{"header":{"frame_id":"base_link"},"pose":{"position":{"x":0,"y":0}}}]"#;
        let raw = mqtt_frame("pos/human/all", json);
        let err = ChannelDecoder(ChannelKind::MqttGateway).decode(&raw, now()).unwrap_err();
        assert_eq!(err.error_kind(), "invalid_value");
    }

    #[test]
    fn unrelated_mqtt_topics_are_ignored() {
        for topic in ["sensors/temp", "pos/robot/7/battery", "pos/robot/x/pose"] {
            let raw = mqtt_frame(topic, "{}");
            let decoded = ChannelDecoder(ChannelKind::MqttGateway).decode(&raw, now()).unwrap();
            assert!(matches!(decoded, Decoded::Ignored(_)), "topic {topic}");
        }
    }

    #[test]
    fn people_agents_take_envelope_time() {
        let batch = proto::PAgents {
            agents: vec![
                proto::PAgent { id: 1, point: vec![136.9, 35.1] },
                proto::PAgent { id: 2, point: vec![137.0, 35.2, 0.0] },
            ],
        };
        let raw = frame(
            ChannelKind::PeopleAgent,
            "Agents",
            batch.encode_to_vec(),
            Some((1_600_000_000, 42_000_000)),
        );
        let e = event(ChannelDecoder(ChannelKind::PeopleAgent).decode(&raw, now()).unwrap());
        let DomainEvent::AgentSet(set) = &e else {
            panic!("wrong variant: {e:?}");
        };
        assert_eq!(set.agents[1], Agent { id: 2, lon: 137.0, lat: 35.2 });
        let wire = BroadcastTopic::from_event(&e).unwrap();
        assert!(wire.payload().starts_with("{\"ts\":1600000000.042,"));
    }

    #[test]
    fn people_agent_with_short_point_fails() {
        let batch = proto::PAgents {
            agents: vec![proto::PAgent { id: 1, point: vec![136.9] }],
        };
        let raw = frame(ChannelKind::PeopleAgent, "Agents", batch.encode_to_vec(), None);
        let err = ChannelDecoder(ChannelKind::PeopleAgent).decode(&raw, now()).unwrap_err();
        assert_eq!(err.error_kind(), "invalid_value");
    }

    #[test]
    fn people_agent_other_supply_names_ignored() {
        let raw = frame(ChannelKind::PeopleAgent, "Routes", vec![], None);
        let decoded = ChannelDecoder(ChannelKind::PeopleAgent).decode(&raw, now()).unwrap();
        assert!(matches!(decoded, Decoded::Ignored(_)));
    }

    #[test]
    fn geojson_passes_through_verbatim() {
        let text = r#"{"type":"FeatureCollection","features":[]}"#;
        let geo = proto::Geo {
            r#type: "geojson".into(),
            id: 1,
            label: "area".into(),
            data: text.as_bytes().to_vec(),
        };
        let raw = frame(ChannelKind::Geographic, "GeoJson", geo.encode_to_vec(), None);
        match event(ChannelDecoder(ChannelKind::Geographic).decode(&raw, now()).unwrap()) {
            DomainEvent::GeoOverlay(o) => {
                assert_eq!(o.kind, OverlayKind::GeoJson);
                assert_eq!(o.payload, text);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn lines_serialize_the_line_list() {
        let lines = proto::Lines {
            lines: vec![proto::Line {
                from: vec![136.9, 35.1],
                to: vec![137.0, 35.2],
                color: vec![255, 0, 0],
                width: 2.0,
            }],
        };
        let raw = frame(ChannelKind::Geographic, "Lines", lines.encode_to_vec(), None);
        match event(ChannelDecoder(ChannelKind::Geographic).decode(&raw, now()).unwrap()) {
            DomainEvent::GeoOverlay(o) => {
                assert_eq!(o.kind, OverlayKind::Lines);
                let v: serde_json::Value = serde_json::from_str(&o.payload).unwrap();
                assert!(v.is_array());
                assert_eq!(v[0]["color"][0], 255);
                assert_eq!(v[0]["width"].as_f64().unwrap(), 2.0);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn view_state_pitch_bearing_clear_moves() {
        let cases: Vec<(&str, Vec<u8>, OverlayKind, &str)> = vec![
            (
                "ViewState",
                proto::ViewState { lat: 35.0, lon: 136.0, zoom: 14.0, ..Default::default() }.encode_to_vec(),
                OverlayKind::ViewState,
                "zoom",
            ),
            ("Pitch", proto::Pitch { pitch: 30.0 }.encode_to_vec(), OverlayKind::Pitch, "pitch"),
            ("Bearing", proto::Bearing { bearing: 90.0 }.encode_to_vec(), OverlayKind::Bearing, "bearing"),
            (
                "ClearMoves",
                proto::ClearMoves { target: "all".into() }.encode_to_vec(),
                OverlayKind::ClearMoves,
                "target",
            ),
        ];
        for (tag, entity, kind, field) in cases {
            let raw = frame(ChannelKind::Geographic, tag, entity, None);
            match event(ChannelDecoder(ChannelKind::Geographic).decode(&raw, now()).unwrap()) {
                DomainEvent::GeoOverlay(o) => {
                    assert_eq!(o.kind, kind);
                    let v: serde_json::Value = serde_json::from_str(&o.payload).unwrap();
                    assert!(v.get(field).is_some(), "{tag} payload lacks {field}");
                }
                other => panic!("wrong variant: {other:?}"),
            }
        }
    }

    #[test]
    fn zero_valued_overlay_fields_are_omitted() {
        let cases: Vec<(&str, Vec<u8>, &str)> = vec![
            ("Pitch", proto::Pitch { pitch: 0.0 }.encode_to_vec(), "{}"),
            (
                "ViewState",
                proto::ViewState { lat: 35.0, zoom: 12.5, ..Default::default() }.encode_to_vec(),
                r#"{"lat":35.0,"zoom":12.5}"#,
            ),
            ("ClearMoves", proto::ClearMoves::default().encode_to_vec(), "{}"),
        ];
        for (tag, entity, expected) in cases {
            let raw = frame(ChannelKind::Geographic, tag, entity, None);
            match event(ChannelDecoder(ChannelKind::Geographic).decode(&raw, now()).unwrap()) {
                DomainEvent::GeoOverlay(o) => assert_eq!(o.payload, expected, "{tag}"),
                other => panic!("wrong variant: {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_geographic_tag_ignored() {
        let raw = frame(ChannelKind::Geographic, "Heatmap", vec![], None);
        let decoded = ChannelDecoder(ChannelKind::Geographic).decode(&raw, now()).unwrap();
        assert!(matches!(decoded, Decoded::Ignored(_)));
    }

    #[test]
    fn robot_topic_parsing() {
        assert_eq!(robot_id("pos/robot/7/pose"), Some(7));
        assert_eq!(robot_id("pos/robot/-2/pose"), Some(-2));
        assert_eq!(robot_id("pos/robot/7/pse"), None);
        assert_eq!(robot_id("pos/robot//pose"), None);
        assert_eq!(robot_id("pos/human/all"), None);
    }
}
