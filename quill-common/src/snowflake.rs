//! Snowflake ids: 64 bit, roughly time ordered identifiers.
//!
//! Layout, most significant bit first:
//! 42 bits of milliseconds since [`EPOCH`], 5 bits worker id,
//! 5 bits process id, 12 bits per-generator increment.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};

pub const EPOCH: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);

pub const TIMESTAMP_OFFSET: u32 = 22;
pub const TIMESTAMP_LENGTH: u32 = 42;
pub const WORKER_ID_OFFSET: u32 = 17;
pub const PROCESS_ID_OFFSET: u32 = 12;
pub const NODE_PART_LENGTH: u32 = 5;
pub const INCREMENT_LENGTH: u32 = 12;

const fn mask(length: u32) -> u64 {
    (1_u64 << length) - 1
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum SnowflakeTimeError {
    #[error("Time is before the snowflake epoch")]
    BeforeEpoch,
    #[error("Time is too far after the snowflake epoch")]
    TooLate,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Node part {0} does not fit into {NODE_PART_LENGTH} bits")]
pub struct NodePartOutOfRangeError(pub u8);

/// Worker or process id, restricted to [`NODE_PART_LENGTH`] bits.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct NodePart(u8);

impl NodePart {
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (u64::from(value) <= mask(NODE_PART_LENGTH)).then_some(Self(value))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for NodePart {
    type Error = NodePartOutOfRangeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NodePartOutOfRangeError(value))
    }
}

impl From<NodePart> for u8 {
    fn from(value: NodePart) -> Self {
        value.0
    }
}

#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Snowflake(u64);

impl Snowflake {
    #[must_use]
    pub fn new(inner: u64) -> Self {
        Self(inner)
    }

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Milliseconds since [`EPOCH`].
    #[must_use]
    pub fn timestamp_millis(self) -> u64 {
        self.0 >> TIMESTAMP_OFFSET
    }

    #[must_use]
    pub fn created_at(self) -> OffsetDateTime {
        #[allow(clippy::cast_possible_wrap)]
        let millis = self.timestamp_millis() as i64;
        EPOCH + time::Duration::milliseconds(millis)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn worker_id(self) -> NodePart {
        NodePart(((self.0 >> WORKER_ID_OFFSET) & mask(NODE_PART_LENGTH)) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn process_id(self) -> NodePart {
        NodePart(((self.0 >> PROCESS_ID_OFFSET) & mask(NODE_PART_LENGTH)) as u8)
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn increment(self) -> u16 {
        (self.0 & mask(INCREMENT_LENGTH)) as u16
    }
}

impl Display for Snowflake {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Snowflake> for u64 {
    fn from(value: Snowflake) -> Self {
        value.get()
    }
}

pub fn timestamp_millis(time: OffsetDateTime) -> Result<u64, SnowflakeTimeError> {
    let millis = (time - EPOCH).whole_milliseconds();
    let millis = u64::try_from(millis).map_err(|_| SnowflakeTimeError::BeforeEpoch)?;
    if millis > mask(TIMESTAMP_LENGTH) {
        return Err(SnowflakeTimeError::TooLate);
    }
    Ok(millis)
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SnowflakeGenerator {
    worker_id: NodePart,
    process_id: NodePart,
    next_increment: u16,
}

impl SnowflakeGenerator {
    #[must_use]
    pub fn new(worker_id: NodePart, process_id: NodePart) -> Self {
        Self {
            worker_id,
            process_id,
            next_increment: 0,
        }
    }

    pub fn generate_at(&mut self, time: OffsetDateTime) -> Result<Snowflake, SnowflakeTimeError> {
        let millis = timestamp_millis(time)?;
        let increment = self.next_increment;
        #[allow(clippy::cast_possible_truncation)]
        let next = ((u64::from(increment) + 1) & mask(INCREMENT_LENGTH)) as u16;
        self.next_increment = next;

        Ok(Snowflake(
            millis << TIMESTAMP_OFFSET
                | u64::from(self.worker_id.get()) << WORKER_ID_OFFSET
                | u64::from(self.process_id.get()) << PROCESS_ID_OFFSET
                | u64::from(increment),
        ))
    }

    pub fn generate(&mut self) -> Result<Snowflake, SnowflakeTimeError> {
        self.generate_at(OffsetDateTime::now_utc())
    }
}
