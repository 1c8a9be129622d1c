// Path: crates/types/src/object.rs

//! The marketplace object model as stored by a validator.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Field holding the object's type tag.
pub const OBJECT_TYPE_FIELD: &str = "object-type";
/// Field holding the object's (relative or absolute) name.
pub const NAME_FIELD: &str = "name";
/// Field referencing the participant that created the object.
pub const CREATOR_FIELD: &str = "creator";
/// Field set to `true` on entries retired but not yet purged by the validator.
pub const DELETED_FIELD: &str = "deleted";

/// Fields other than `creator` whose values are identifiers of other objects.
pub const REFERENCE_FIELDS: &[&str] = &[
    "account",
    "asset",
    "asset-type",
    "guarantor",
    "input",
    "output",
    "owner",
];

/// An opaque object identifier assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The type tag of a marketplace object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectType {
    Participant,
    Account,
    AssetType,
    Asset,
    Holding,
    Liability,
    ExchangeOffer,
    SellOffer,
    /// A tag this harness does not know about; kept verbatim.
    Other(String),
}

impl ObjectType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Participant => "Participant",
            Self::Account => "Account",
            Self::AssetType => "AssetType",
            Self::Asset => "Asset",
            Self::Holding => "Holding",
            Self::Liability => "Liability",
            Self::ExchangeOffer => "ExchangeOffer",
            Self::SellOffer => "SellOffer",
            Self::Other(tag) => tag,
        }
    }
}

impl FromStr for ObjectType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Participant" => Self::Participant,
            "Account" => Self::Account,
            "AssetType" => Self::AssetType,
            "Asset" => Self::Asset,
            "Holding" => Self::Holding,
            "Liability" => Self::Liability,
            "ExchangeOffer" => Self::ExchangeOffer,
            "SellOffer" => Self::SellOffer,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl From<&str> for ObjectType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

/// One object as read from a validator's store at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObjectEntry {
    pub id: ObjectId,
    pub object_type: ObjectType,
    pub name: Option<String>,
    pub creator: Option<ObjectId>,
    /// Other identifier-valued fields, keyed by field name.
    pub references: BTreeMap<String, ObjectId>,
    pub deleted: bool,
    /// Every field of the stored object, including the ones parsed above.
    pub fields: Map<String, Value>,
}

impl RawObjectEntry {
    pub fn new(id: impl Into<ObjectId>, object_type: ObjectType) -> Self {
        Self {
            id: id.into(),
            object_type,
            name: None,
            creator: None,
            references: BTreeMap::new(),
            deleted: false,
            fields: Map::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<ObjectId>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_reference(mut self, field: &str, target: impl Into<ObjectId>) -> Self {
        self.references.insert(field.to_string(), target.into());
        self
    }

    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    pub fn reference(&self, field: &str) -> Option<&ObjectId> {
        if field == CREATOR_FIELD {
            return self.creator.as_ref();
        }
        self.references.get(field)
    }
}
