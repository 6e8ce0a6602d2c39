//! Value Objects for the variant catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// SKU (Stock Keeping Unit) value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    pub const MAX_LEN: usize = 64;

    pub fn new(value: impl AsRef<str>) -> Result<Self, SkuError> {
        let value = value.as_ref().trim();
        if value.is_empty() { return Err(SkuError::Empty); }
        if value.len() > Self::MAX_LEN { return Err(SkuError::TooLong); }
        Ok(Self(value.to_string()))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SkuError { Empty, TooLong }
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "Item SKU is required"), Self::TooLong => write!(f, "Item SKU is too long") }
    }
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn generate() -> Self { Self(Uuid::now_v7()) }
            pub const fn from_uuid(id: Uuid) -> Self { Self(id) }
            pub const fn as_uuid(&self) -> Uuid { self.0 }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

uuid_id!(
    /// Identifier of a size record
    SizeId
);
uuid_id!(
    /// Identifier of a color record
    ColorId
);

/// Stock held by one size/color combination. Never negative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLevel(u32);

impl StockLevel {
    pub const ZERO: Self = Self(0);

    pub const fn new(value: u32) -> Self { Self(value) }
    pub const fn value(&self) -> u32 { self.0 }

    /// Accepts only JSON integers in `0..=i32::MAX`; a missing value counts as zero.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, StockLevelError> {
        match value {
            serde_json::Value::Null => Ok(Self::ZERO),
            serde_json::Value::Number(n) => {
                let raw = n.as_u64().ok_or(StockLevelError::NotANonNegativeInteger)?;
                let raw = i32::try_from(raw).map_err(|_| StockLevelError::OutOfRange)?;
                Ok(Self(raw.unsigned_abs()))
            }
            _ => Err(StockLevelError::NotANonNegativeInteger),
        }
    }

    /// Database columns are `INTEGER`; negative values are rejected.
    pub fn from_db(value: i32) -> Result<Self, StockLevelError> {
        u32::try_from(value).map(Self).map_err(|_| StockLevelError::NotANonNegativeInteger)
    }

    pub fn to_db(self) -> i32 { i32::try_from(self.0).unwrap_or(i32::MAX) }
}

impl fmt::Display for StockLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum StockLevelError { NotANonNegativeInteger, OutOfRange }
impl std::error::Error for StockLevelError {}
impl fmt::Display for StockLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANonNegativeInteger => write!(f, "stock level must be a non-negative integer"),
            Self::OutOfRange => write!(f, "stock level is out of range"),
        }
    }
}
