//! Room listings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::{RoomId, UserId};

/// Seats in a room.
pub const ROOM_CAPACITY: usize = 2;

/// Lifecycle of a room. Only ever moves forward.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RoomStatus {
    /// Waiting for a second player.
    Waiting,
    /// Game in progress.
    Playing,
    /// Game ended.
    Finished,
}

/// One room in the lobby listing.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room identifier.
    id: RoomId,
    /// Display name.
    name: String,
    /// Creator's user id.
    created_by: UserId,
    /// Members, at most two.
    players: Vec<UserId>,
    /// Lifecycle status.
    status: RoomStatus,
    /// Creation time, if the server sent one we could read.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
}

/// Reads `createdAt` as RFC 3339 text or epoch milliseconds.
///
/// Anything else is logged and becomes `None`, so one odd field never
/// rejects the whole listing.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let parsed = match &raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|time| time.with_timezone(&Utc)),
        Some(Value::Number(number)) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        Some(_) => None,
    };
    if parsed.is_none() {
        warn!(created_at = ?raw, "Unreadable room timestamp");
    }
    Ok(parsed)
}

impl RoomSummary {
    /// Whether another player can still sit down.
    pub fn has_free_seat(&self) -> bool {
        self.status == RoomStatus::Waiting && self.players.len() < ROOM_CAPACITY
    }
}

/// Validates an incoming listing against the one it replaces.
///
/// Rooms reporting more members than seats are dropped. Status regressions
/// for a known id are logged and kept, since the server is authoritative.
pub fn screen_listing(previous: &[RoomSummary], incoming: Vec<RoomSummary>) -> Vec<RoomSummary> {
    let known: HashMap<&str, RoomStatus> = previous
        .iter()
        .map(|room| (room.id.as_str(), room.status))
        .collect();

    incoming
        .into_iter()
        .filter(|room| {
            if room.players.len() > ROOM_CAPACITY {
                warn!(
                    room_id = %room.id,
                    players = room.players.len(),
                    "Dropping room over capacity"
                );
                return false;
            }
            if let Some(before) = known.get(room.id.as_str()) {
                if room.status < *before {
                    warn!(
                        room_id = %room.id,
                        from = %before,
                        to = %room.status,
                        "Room status went backwards"
                    );
                }
            }
            true
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn room(id: &str, players: &[&str], status: RoomStatus) -> RoomSummary {
        RoomSummary::new(
            id.to_string(),
            format!("room {}", id),
            "alice".to_string(),
            players.iter().map(|p| p.to_string()).collect(),
            status,
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single(),
        )
    }

    #[test]
    fn test_parses_wire_listing() {
        let rooms: Vec<RoomSummary> = serde_json::from_value(json!([{
            "id": "r1",
            "name": "Lobby",
            "createdBy": "alice",
            "players": ["alice"],
            "status": "waiting",
            "createdAt": "2025-01-02T03:04:05Z"
        }]))
        .unwrap();
        assert_eq!(
            rooms,
            vec![RoomSummary::new(
                "r1".into(),
                "Lobby".into(),
                "alice".into(),
                vec!["alice".into()],
                RoomStatus::Waiting,
                Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single(),
            )]
        );
        assert!(rooms[0].has_free_seat());
    }

    #[test]
    fn test_odd_timestamps_do_not_reject_listing() {
        let rooms: Vec<RoomSummary> = serde_json::from_value(json!([
            {"id": "text", "name": "a", "createdBy": "x", "players": [], "status": "waiting",
             "createdAt": "yesterday"},
            {"id": "millis", "name": "b", "createdBy": "x", "players": [], "status": "waiting",
             "createdAt": 1735787045000i64},
            {"id": "missing", "name": "c", "createdBy": "x", "players": [], "status": "waiting"}
        ]))
        .unwrap();

        assert_eq!(rooms.len(), 3);
        assert_eq!(*rooms[0].created_at(), None);
        assert_eq!(
            *rooms[1].created_at(),
            Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single()
        );
        assert_eq!(*rooms[2].created_at(), None);
    }

    #[test]
    fn test_status_order_and_display() {
        assert!(RoomStatus::Waiting < RoomStatus::Playing);
        assert!(RoomStatus::Playing < RoomStatus::Finished);
        assert_eq!(RoomStatus::Playing.to_string(), "playing");
    }

    #[test]
    fn test_screen_drops_overfull_rooms() {
        let incoming = vec![
            room("ok", &["a", "b"], RoomStatus::Playing),
            room("bad", &["a", "b", "c"], RoomStatus::Playing),
        ];
        let kept = screen_listing(&[], incoming);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id(), "ok");
    }

    #[test]
    fn test_screen_keeps_regressed_room() {
        let previous = vec![room("r1", &["a", "b"], RoomStatus::Finished)];
        let incoming = vec![room("r1", &["a"], RoomStatus::Waiting)];
        let kept = screen_listing(&previous, incoming.clone());
        assert_eq!(kept, incoming);
    }

    #[test]
    fn test_full_room_has_no_free_seat() {
        assert!(!room("r", &["a", "b"], RoomStatus::Waiting).has_free_seat());
        assert!(!room("r", &["a"], RoomStatus::Finished).has_free_seat());
    }
}
