//! Self-describing blob codecs.
//!
//! Every `.bin` file in a generation starts with a 3-byte tag naming the
//! serializer of the rest of the file:
//!
//! | Tag | Codec | Notes |
//! |-----|-------|-------|
//! | `BIN` | bincode | compact and fast; needs the `binary-codec` feature |
//! | `JSN` | serde_json | portable fallback, always available |
//!
//! Readers dispatch on the tag, never on configuration, so a generation
//! written with either codec loads under any setting. A `BIN` blob read by a
//! build without the binary codec fails with [`CodecError::Unavailable`],
//! which the repository treats as a stale cache.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

pub const TAG_LEN: usize = 3;
const BIN_TAG: &[u8; TAG_LEN] = b"BIN";
const JSON_TAG: &[u8; TAG_LEN] = b"JSN";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("blob is shorter than its codec tag")]
    Truncated,
    #[error("unknown codec tag {0:?}")]
    UnknownTag(String),
    #[error("codec '{0}' is not compiled into this build")]
    Unavailable(&'static str),
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "binary-codec")]
    #[error("binary codec error: {0}")]
    Binary(#[from] bincode::Error),
}

/// Serializer of a cache blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Binary,
    Json,
}

impl Codec {
    /// The codec to write with: binary when preferred and compiled in.
    pub fn preferred(binary: bool) -> Codec {
        if binary && Codec::Binary.is_available() {
            Codec::Binary
        } else {
            Codec::Json
        }
    }

    pub fn is_available(self) -> bool {
        match self {
            Codec::Binary => cfg!(feature = "binary-codec"),
            Codec::Json => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Binary => "binary",
            Codec::Json => "json",
        }
    }

    pub fn tag(self) -> &'static [u8; TAG_LEN] {
        match self {
            Codec::Binary => BIN_TAG,
            Codec::Json => JSON_TAG,
        }
    }

    /// Identify the codec of a blob from its header.
    pub fn detect(blob: &[u8]) -> Result<Codec, CodecError> {
        let tag = blob.get(..TAG_LEN).ok_or(CodecError::Truncated)?;
        if tag == BIN_TAG {
            Ok(Codec::Binary)
        } else if tag == JSON_TAG {
            Ok(Codec::Json)
        } else {
            Err(CodecError::UnknownTag(String::from_utf8_lossy(tag).into_owned()))
        }
    }

    /// Serialize `value` behind this codec's tag.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut out = self.tag().to_vec();
        match self {
            Codec::Json => serde_json::to_writer(&mut out, value)?,
            #[cfg(feature = "binary-codec")]
            Codec::Binary => bincode::serialize_into(&mut out, value)?,
            #[cfg(not(feature = "binary-codec"))]
            Codec::Binary => return Err(CodecError::Unavailable(self.name())),
        }
        Ok(out)
    }

    /// Deserialize a tagged blob written by any codec.
    pub fn decode<T: DeserializeOwned>(blob: &[u8]) -> Result<T, CodecError> {
        let codec = Codec::detect(blob)?;
        let payload = &blob[TAG_LEN..];
        match codec {
            Codec::Json => Ok(serde_json::from_slice(payload)?),
            #[cfg(feature = "binary-codec")]
            Codec::Binary => Ok(bincode::deserialize(payload)?),
            #[cfg(not(feature = "binary-codec"))]
            Codec::Binary => Err(CodecError::Unavailable(codec.name())),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
