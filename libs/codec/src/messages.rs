//! Cataloged GC message types.
//!
//! Every message the channel speaks is declared here twice over: a static
//! field table and a matching record type implementing [`GcProto`]. The
//! tables are the single source of truth for field numbers; the registry
//! maps clean message ids onto them once, at startup.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use demgate_types::emsg;

use crate::catalog::{self, DecodedMessage, Value};
use crate::error::CodecResult;
use crate::schema::{FieldKind, FieldSpec, MessageSchema};

/// Shared decode/encode capability for top-level cataloged messages.
pub trait GcProto: Sized {
    /// Clean (unmasked) GC message id.
    const MSG_ID: u32;

    fn schema() -> &'static MessageSchema;
    fn from_decoded(message: &DecodedMessage) -> CodecResult<Self>;
    fn to_decoded(&self) -> DecodedMessage;

    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        Self::from_decoded(&catalog::decode(Self::schema(), bytes)?)
    }

    fn encode(&self) -> Vec<u8> {
        catalog::encode(&self.to_decoded())
    }
}

/// Clean message id → declared layout. Built once, never mutated.
static REGISTRY: Lazy<HashMap<u32, &'static MessageSchema>> = Lazy::new(|| {
    HashMap::from([
        (emsg::CLIENT_HELLO, &CLIENT_HELLO_SCHEMA),
        (emsg::CLIENT_WELCOME, &CLIENT_WELCOME_SCHEMA),
        (emsg::CLIENT_CONNECTION_STATUS, &CONNECTION_STATUS_SCHEMA),
        (
            emsg::MATCH_LIST_REQUEST_FULL_GAME_INFO,
            &MATCH_LIST_REQUEST_SCHEMA,
        ),
        (emsg::MATCH_LIST, &MATCH_LIST_SCHEMA),
    ])
});

/// Layout for a clean message id, if cataloged.
pub fn schema_for(clean_id: u32) -> Option<&'static MessageSchema> {
    REGISTRY.get(&clean_id).copied()
}

pub static CLIENT_HELLO_SCHEMA: MessageSchema = MessageSchema {
    name: "ClientHello",
    fields: &[
        FieldSpec { name: "version", number: 1, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "client_session_need", number: 3, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "client_launcher", number: 4, kind: FieldKind::Varint, repeated: false },
    ],
};

pub static CLIENT_WELCOME_SCHEMA: MessageSchema = MessageSchema {
    name: "ClientWelcome",
    fields: &[
        FieldSpec { name: "version", number: 1, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "game_data", number: 2, kind: FieldKind::Bytes, repeated: false },
        FieldSpec { name: "game_data2", number: 4, kind: FieldKind::Bytes, repeated: false },
    ],
};

pub static CONNECTION_STATUS_SCHEMA: MessageSchema = MessageSchema {
    name: "ConnectionStatus",
    fields: &[FieldSpec { name: "status", number: 1, kind: FieldKind::Varint, repeated: false }],
};

pub static MATCH_LIST_REQUEST_SCHEMA: MessageSchema = MessageSchema {
    name: "MatchListRequestFullGameInfo",
    fields: &[
        FieldSpec { name: "matchid", number: 1, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "outcomeid", number: 2, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "token", number: 3, kind: FieldKind::Varint, repeated: false },
    ],
};

pub static ROUND_STATS_SCHEMA: MessageSchema = MessageSchema {
    name: "RoundStats",
    fields: &[
        FieldSpec { name: "reservationid", number: 1, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "map", number: 3, kind: FieldKind::Bytes, repeated: false },
    ],
};

pub static MATCH_INFO_SCHEMA: MessageSchema = MessageSchema {
    name: "MatchInfo",
    fields: &[
        FieldSpec { name: "matchid", number: 1, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "matchtime", number: 2, kind: FieldKind::Varint, repeated: false },
        FieldSpec {
            name: "roundstatsall",
            number: 5,
            kind: FieldKind::Message(&ROUND_STATS_SCHEMA),
            repeated: true,
        },
    ],
};

pub static MATCH_LIST_SCHEMA: MessageSchema = MessageSchema {
    name: "MatchList",
    fields: &[
        FieldSpec { name: "msgrequestid", number: 1, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "accountid", number: 2, kind: FieldKind::Varint, repeated: false },
        FieldSpec { name: "servertime", number: 3, kind: FieldKind::Varint, repeated: false },
        FieldSpec {
            name: "matches",
            number: 4,
            kind: FieldKind::Message(&MATCH_INFO_SCHEMA),
            repeated: true,
        },
    ],
};

/// Client opener; only the version is meaningful to the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientHello {
    pub version: u32,
    pub client_session_need: u32,
    pub client_launcher: u32,
}

impl GcProto for ClientHello {
    const MSG_ID: u32 = emsg::CLIENT_HELLO;

    fn schema() -> &'static MessageSchema {
        &CLIENT_HELLO_SCHEMA
    }

    fn from_decoded(message: &DecodedMessage) -> CodecResult<Self> {
        Ok(Self {
            version: message.get_u32(1).unwrap_or_default(),
            client_session_need: message.get_u32(3).unwrap_or_default(),
            client_launcher: message.get_u32(4).unwrap_or_default(),
        })
    }

    fn to_decoded(&self) -> DecodedMessage {
        DecodedMessage::new(Self::schema())
            .with(1, Value::Varint(self.version.into()))
            .with(3, Value::Varint(self.client_session_need.into()))
            .with(4, Value::Varint(self.client_launcher.into()))
    }
}

/// Coordinator's answer to the hello; receipt flips the channel to ready.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientWelcome {
    pub version: u32,
    pub game_data: Vec<u8>,
    pub game_data2: Vec<u8>,
}

impl GcProto for ClientWelcome {
    const MSG_ID: u32 = emsg::CLIENT_WELCOME;

    fn schema() -> &'static MessageSchema {
        &CLIENT_WELCOME_SCHEMA
    }

    fn from_decoded(message: &DecodedMessage) -> CodecResult<Self> {
        Ok(Self {
            version: message.get_u32(1).unwrap_or_default(),
            game_data: message.get_bytes(2).map(<[u8]>::to_vec).unwrap_or_default(),
            game_data2: message.get_bytes(4).map(<[u8]>::to_vec).unwrap_or_default(),
        })
    }

    fn to_decoded(&self) -> DecodedMessage {
        DecodedMessage::new(Self::schema())
            .with(1, Value::Varint(self.version.into()))
            .with(2, Value::Bytes(self.game_data.clone()))
            .with(4, Value::Bytes(self.game_data2.clone()))
    }
}

/// Session status notification; informational.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub status: u32,
}

impl GcProto for ConnectionStatus {
    const MSG_ID: u32 = emsg::CLIENT_CONNECTION_STATUS;

    fn schema() -> &'static MessageSchema {
        &CONNECTION_STATUS_SCHEMA
    }

    fn from_decoded(message: &DecodedMessage) -> CodecResult<Self> {
        Ok(Self {
            status: message.get_u32(1).unwrap_or_default(),
        })
    }

    fn to_decoded(&self) -> DecodedMessage {
        DecodedMessage::new(Self::schema()).with(1, Value::Varint(self.status.into()))
    }
}

/// Full-game-info request; the triple comes straight from a share code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchListRequestFullGameInfo {
    pub matchid: u64,
    pub outcomeid: u64,
    pub token: u32,
}

impl GcProto for MatchListRequestFullGameInfo {
    const MSG_ID: u32 = emsg::MATCH_LIST_REQUEST_FULL_GAME_INFO;

    fn schema() -> &'static MessageSchema {
        &MATCH_LIST_REQUEST_SCHEMA
    }

    fn from_decoded(message: &DecodedMessage) -> CodecResult<Self> {
        Ok(Self {
            matchid: message.get_u64(1).unwrap_or_default(),
            outcomeid: message.get_u64(2).unwrap_or_default(),
            token: message.get_u32(3).unwrap_or_default(),
        })
    }

    fn to_decoded(&self) -> DecodedMessage {
        DecodedMessage::new(Self::schema())
            .with(1, Value::Varint(self.matchid))
            .with(2, Value::Varint(self.outcomeid))
            .with(3, Value::Varint(self.token.into()))
    }
}

/// Per-round server stats; the last round's `map` carries the replay URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub reservationid: u64,
    pub map: String,
}

impl RoundStats {
    pub fn from_decoded(message: &DecodedMessage) -> CodecResult<Self> {
        Ok(Self {
            reservationid: message.get_u64(1).unwrap_or_default(),
            map: message.get_str(3).unwrap_or_default().to_string(),
        })
    }

    pub fn to_decoded(&self) -> DecodedMessage {
        DecodedMessage::new(&ROUND_STATS_SCHEMA)
            .with(1, Value::Varint(self.reservationid))
            .with(3, Value::Bytes(self.map.clone().into_bytes()))
    }
}

/// One resolved match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchInfo {
    pub matchid: u64,
    pub matchtime: u32,
    pub roundstatsall: Vec<RoundStats>,
}

impl MatchInfo {
    pub fn from_decoded(message: &DecodedMessage) -> CodecResult<Self> {
        Ok(Self {
            matchid: message.get_u64(1).unwrap_or_default(),
            matchtime: message.get_u32(2).unwrap_or_default(),
            roundstatsall: message
                .messages(5)
                .map(RoundStats::from_decoded)
                .collect::<CodecResult<_>>()?,
        })
    }

    pub fn to_decoded(&self) -> DecodedMessage {
        let mut message = DecodedMessage::new(&MATCH_INFO_SCHEMA)
            .with(1, Value::Varint(self.matchid))
            .with(2, Value::Varint(self.matchtime.into()));
        for round in &self.roundstatsall {
            message.push(5, Value::Message(round.to_decoded()));
        }
        message
    }
}

/// Match metadata response. An empty `matches` means the coordinator knows
/// nothing about the requested match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchList {
    pub msgrequestid: u32,
    pub accountid: u32,
    pub servertime: u32,
    pub matches: Vec<MatchInfo>,
}

impl GcProto for MatchList {
    const MSG_ID: u32 = emsg::MATCH_LIST;

    fn schema() -> &'static MessageSchema {
        &MATCH_LIST_SCHEMA
    }

    fn from_decoded(message: &DecodedMessage) -> CodecResult<Self> {
        Ok(Self {
            msgrequestid: message.get_u32(1).unwrap_or_default(),
            accountid: message.get_u32(2).unwrap_or_default(),
            servertime: message.get_u32(3).unwrap_or_default(),
            matches: message
                .messages(4)
                .map(MatchInfo::from_decoded)
                .collect::<CodecResult<_>>()?,
        })
    }

    fn to_decoded(&self) -> DecodedMessage {
        let mut message = DecodedMessage::new(Self::schema())
            .with(1, Value::Varint(self.msgrequestid.into()))
            .with(2, Value::Varint(self.accountid.into()))
            .with(3, Value::Varint(self.servertime.into()));
        for info in &self.matches {
            message.push(4, Value::Message(info.to_decoded()));
        }
        message
    }
}
