use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::CoreError;

macro_rules! uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(LocalId);
uuid_id!(MutationId);

const LOCAL_PREFIX: &str = "local:";

/// Identity of a record: either assigned by the server, or a temporary
/// client-side id that lives until the create is reconciled.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordId {
    Server(i64),
    Local(LocalId),
}

impl RecordId {
    pub fn local() -> Self {
        Self::Local(LocalId::new())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    pub fn as_server(&self) -> Option<i64> {
        match self {
            Self::Server(id) => Some(*id),
            Self::Local(_) => None,
        }
    }

    /// The server id, or an error naming what the id was needed for.
    pub fn require_server(&self, what: &str) -> Result<i64, CoreError> {
        self.as_server()
            .ok_or_else(|| CoreError::UnconfirmedId(format!("{what} {self}")))
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        if let Some(rest) = s.strip_prefix(LOCAL_PREFIX) {
            let uuid = Uuid::parse_str(rest)
                .map_err(|e| CoreError::InvalidData(format!("bad local id {s}: {e}")))?;
            return Ok(Self::Local(LocalId::from_uuid(uuid)));
        }
        s.parse::<i64>()
            .map(Self::Server)
            .map_err(|_| CoreError::InvalidData(format!("bad record id: {s}")))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::local()
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self::Server(id)
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "#{id}"),
            Self::Local(id) => write!(f, "{id:?}"),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(id) => write!(f, "{LOCAL_PREFIX}{id}"),
        }
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Server(id) => serializer.serialize_i64(*id),
            Self::Local(_) => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(id) => Ok(Self::Server(id)),
            Raw::Text(s) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Quiz,
    Question,
    Project,
    Document,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::Question => "question",
            Self::Project => "project",
            Self::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "quiz" => Ok(Self::Quiz),
            "question" => Ok(Self::Question),
            "project" => Ok(Self::Project),
            "document" => Ok(Self::Document),
            _ => Err(CoreError::InvalidData(format!("unknown entity kind: {s}"))),
        }
    }

    /// Whether the server keeps an edit history for this kind.
    pub fn has_history(&self) -> bool {
        !matches!(self, Self::Document)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache address of one entity. Ordered by kind, then id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: RecordId,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: impl Into<RecordId>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn quiz(id: impl Into<RecordId>) -> Self {
        Self::new(EntityKind::Quiz, id)
    }

    pub fn question(id: impl Into<RecordId>) -> Self {
        Self::new(EntityKind::Question, id)
    }

    pub fn project(id: impl Into<RecordId>) -> Self {
        Self::new(EntityKind::Project, id)
    }

    pub fn document(id: impl Into<RecordId>) -> Self {
        Self::new(EntityKind::Document, id)
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.kind, self.id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}
