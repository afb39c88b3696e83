//! Record identifiers.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one persisted record: the type it belongs to and its
/// sequence number within that type.
///
/// The canonical text form is `hex(type_id)-hex(object_id)`, lowercase and
/// unpadded, e.g. `3e9-1f`. It is the primary key of the record in its
/// type's bucket and the value stored in index buckets.
///
/// Identifiers are never reused once allocated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Identifier {
    /// Id of the record's type.
    pub type_id: i64,
    /// Sequence number within the type.
    pub object_id: i64,
}

impl Identifier {
    /// Creates an identifier.
    #[inline]
    #[must_use]
    pub const fn new(type_id: i64, object_id: i64) -> Self {
        Self { type_id, object_id }
    }

    /// Parses canonical identifier text.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedIdentifier`] unless the text has exactly
    /// one `-` separating two base-16 integers.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let mut parts = text.split('-');
        let (Some(type_part), Some(object_part), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(CoreError::malformed_identifier(
                text,
                "expected exactly one '-' separator",
            ));
        };

        let type_id = parse_hex(text, type_part)?;
        let object_id = parse_hex(text, object_part)?;
        Ok(Self::new(type_id, object_id))
    }
}

fn parse_hex(text: &str, part: &str) -> CoreResult<i64> {
    // from_str_radix accepts a leading '+', canonical text never has one.
    if part.starts_with('+') {
        return Err(CoreError::malformed_identifier(text, "unexpected sign"));
    }
    i64::from_str_radix(part, 16)
        .map_err(|e| CoreError::malformed_identifier(text, format!("{part:?}: {e}")))
}

fn write_hex(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
    if value < 0 {
        write!(f, "-{:x}", value.unsigned_abs())
    } else {
        write!(f, "{value:x}")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, self.type_id)?;
        f.write_str("-")?;
        write_hex(f, self.object_id)
    }
}

impl FromStr for Identifier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<(i64, i64)> for Identifier {
    fn from((type_id, object_id): (i64, i64)) -> Self {
        Self::new(type_id, object_id)
    }
}


