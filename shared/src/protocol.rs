//! JSON wire protocol.
//!
//! Inbound messages are objects tagged by `"action"`, outbound events are
//! tagged by `"event"`. One message per datagram.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kinds::{MonsterState, ObjectKind, Recipe};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown object kind: {0}")]
    UnknownObjectKind(String),
    #[error("unknown recipe: {0}")]
    UnknownRecipe(String),
    #[error("coordinate is not a finite number")]
    InvalidCoordinate,
}

fn default_amount() -> u32 {
    1
}

/// Raw inbound envelope exactly as clients send it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Connect {
        #[serde(default)]
        name: Option<String>,
    },
    Disconnect,
    Heartbeat,
    RequestMove {
        x: f64,
        y: f64,
        seq_id: u64,
    },
    CollectItem {
        item: String,
    },
    RemoveItem {
        item: String,
        #[serde(default = "default_amount")]
        amount: u32,
    },
    DropItem {
        item: String,
    },
    CraftItem {
        recipe: String,
    },
    PlaceObject {
        #[serde(rename = "type")]
        kind: String,
        x: f64,
        y: f64,
    },
    PickupObject {
        x: f64,
        y: f64,
    },
    Interact {
        x: f64,
        y: f64,
    },
}

/// A game action with kind and recipe names already resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Move { x: f64, y: f64, seq_id: u64 },
    CollectItem { item: String },
    RemoveItem { item: String, amount: u32 },
    DropItem { item: String },
    Craft { recipe: Recipe },
    Place { kind: ObjectKind, x: i32, y: i32 },
    Pickup { x: i32, y: i32 },
    Interact { x: i32, y: i32 },
}

/// Decoded inbound message: session control or a game action.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Connect { name: Option<String> },
    Disconnect,
    Heartbeat,
    Action(Action),
}

fn tile_coord(value: f64) -> Result<i32, ProtocolError> {
    if value.is_finite() {
        Ok(value.floor() as i32)
    } else {
        Err(ProtocolError::InvalidCoordinate)
    }
}

impl TryFrom<ClientMessage> for Inbound {
    type Error = ProtocolError;

    fn try_from(message: ClientMessage) -> Result<Self, Self::Error> {
        let action = match message {
            ClientMessage::Connect { name } => return Ok(Inbound::Connect { name }),
            ClientMessage::Disconnect => return Ok(Inbound::Disconnect),
            ClientMessage::Heartbeat => return Ok(Inbound::Heartbeat),
            ClientMessage::RequestMove { x, y, seq_id } => {
                if !x.is_finite() || !y.is_finite() {
                    return Err(ProtocolError::InvalidCoordinate);
                }
                Action::Move { x, y, seq_id }
            }
            ClientMessage::CollectItem { item } => Action::CollectItem { item },
            ClientMessage::RemoveItem { item, amount } => Action::RemoveItem { item, amount },
            ClientMessage::DropItem { item } => Action::DropItem { item },
            ClientMessage::CraftItem { recipe } => Action::Craft {
                recipe: recipe.parse()?,
            },
            ClientMessage::PlaceObject { kind, x, y } => Action::Place {
                kind: kind.parse()?,
                x: tile_coord(x)?,
                y: tile_coord(y)?,
            },
            ClientMessage::PickupObject { x, y } => Action::Pickup {
                x: tile_coord(x)?,
                y: tile_coord(y)?,
            },
            ClientMessage::Interact { x, y } => Action::Interact {
                x: tile_coord(x)?,
                y: tile_coord(y)?,
            },
        };
        Ok(Inbound::Action(action))
    }
}

/// Decodes one datagram into an [`Inbound`] message.
pub fn decode(bytes: &[u8]) -> Result<Inbound, ProtocolError> {
    let message: ClientMessage = serde_json::from_slice(bytes)?;
    Inbound::try_from(message)
}

/// One `(item, amount)` pair produced by harvesting, killing or dropping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDrop {
    #[serde(rename = "type")]
    pub item: String,
    pub amount: u32,
}

impl ItemDrop {
    pub fn new(item: impl Into<String>, amount: u32) -> Self {
        Self {
            item: item.into(),
            amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonsterView {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub state: MonsterState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectView {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Connected {
        session_id: String,
    },
    Rejected {
        reason: String,
    },
    PositionUpdate {
        x: f64,
        y: f64,
        /// Time of day in `[0, 1)`.
        time: f64,
        hp: i32,
        max_hp: i32,
        last_seq_id: u64,
        monsters: Vec<MonsterView>,
    },
    InventoryUpdate {
        items: BTreeMap<String, u32>,
    },
    WorldObjects {
        objects: Vec<ObjectView>,
    },
    ObjectPlaced {
        #[serde(rename = "type")]
        kind: ObjectKind,
        x: i32,
        y: i32,
        owner: Option<String>,
    },
    ObjectRemoved {
        x: i32,
        y: i32,
        drops: Vec<ItemDrop>,
    },
    ObjectHit {
        x: i32,
        y: i32,
        hp: i32,
        drops: Vec<ItemDrop>,
    },
    MonsterHit {
        id: String,
        x: i32,
        y: i32,
        hp: i32,
        destroyed: bool,
        drops: Vec<ItemDrop>,
    },
    ItemSpawn {
        x: f64,
        y: f64,
        drops: Vec<ItemDrop>,
    },
    ItemCrafted {
        item: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_move_request() {
        let inbound = decode(br#"{"action":"request_move","x":10.5,"y":-3,"seqId":7}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Action(Action::Move {
                x: 10.5,
                y: -3.0,
                seq_id: 7
            })
        );
    }

    #[test]
    fn test_decode_remove_item_default_amount() {
        let inbound = decode(br#"{"action":"remove_item","item":"Wood"}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Action(Action::RemoveItem {
                item: "Wood".to_string(),
                amount: 1
            })
        );
    }

    #[test]
    fn test_decode_place_resolves_kind() {
        let inbound =
            decode(br#"{"action":"place_object","type":"Crafting Table","x":3,"y":-2}"#).unwrap();
        assert_eq!(
            inbound,
            Inbound::Action(Action::Place {
                kind: ObjectKind::CraftingTable,
                x: 3,
                y: -2
            })
        );
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let inbound = decode(br#"{"action":"interact","x":1,"y":2,"extra":true}"#).unwrap();
        assert_eq!(inbound, Inbound::Action(Action::Interact { x: 1, y: 2 }));
    }

    #[test]
    fn test_decode_control_messages() {
        assert_eq!(
            decode(br#"{"action":"connect","name":"ana"}"#).unwrap(),
            Inbound::Connect {
                name: Some("ana".to_string())
            }
        );
        assert_eq!(
            decode(br#"{"action":"connect"}"#).unwrap(),
            Inbound::Connect { name: None }
        );
        assert_eq!(
            decode(br#"{"action":"disconnect"}"#).unwrap(),
            Inbound::Disconnect
        );
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            decode(b"not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode(br#"{"action":"fly"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode(br#"{"action":"craft_item","recipe":"Sword"}"#),
            Err(ProtocolError::UnknownRecipe(_))
        ));
        assert!(matches!(
            decode(br#"{"action":"place_object","type":"Castle","x":0,"y":0}"#),
            Err(ProtocolError::UnknownObjectKind(_))
        ));
    }

    #[test]
    fn test_event_encoding() {
        let event = ServerEvent::MonsterHit {
            id: "monster_3".to_string(),
            x: 10,
            y: 20,
            hp: 0,
            destroyed: true,
            drops: vec![ItemDrop::new("Rope", 1)],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "monster_hit",
                "id": "monster_3",
                "x": 10,
                "y": 20,
                "hp": 0,
                "destroyed": true,
                "drops": [{"type": "Rope", "amount": 1}]
            })
        );
    }

    #[test]
    fn test_position_update_field_names() {
        let event = ServerEvent::PositionUpdate {
            x: 1.0,
            y: 2.0,
            time: 0.25,
            hp: 90,
            max_hp: 100,
            last_seq_id: 4,
            monsters: vec![MonsterView {
                id: "monster_1".to_string(),
                x: 5,
                y: 6,
                hp: 10,
                state: MonsterState::Wander,
            }],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "position_update");
        assert_eq!(value["maxHp"], 100);
        assert_eq!(value["lastSeqId"], 4);
        assert_eq!(value["monsters"][0]["state"], "WANDER");
    }
}
