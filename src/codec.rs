//! MessagePack encode/decode helpers.
//!
//! Everything that crosses a slot boundary (literals, arguments, return
//! values, branch conditions, and the structural payloads themselves) goes
//! through this one codec so both sides agree on a single deterministic,
//! self-describing binary format. Structs encode positionally
//! ([`rmp_serde::to_vec`]), matching the ordered-field wire layout.

use miette::Diagnostic;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure while encoding or decoding a MessagePack value.
#[derive(Debug, Error, Diagnostic)]
pub enum CodecError {
    /// A value could not be encoded.
    #[error("encode failed: {0}")]
    #[diagnostic(code(wiregraph::codec::encode))]
    Encode(#[from] rmp_serde::encode::Error),

    /// Bytes did not decode as the expected type.
    #[error("decode failed: {0}")]
    #[diagnostic(code(wiregraph::codec::decode))]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Encodes `value` as MessagePack bytes.
pub fn encode<T>(value: &T) -> Result<Vec<u8>, CodecError>
where
    T: Serialize + ?Sized,
{
    Ok(rmp_serde::to_vec(value)?)
}

/// Decodes a MessagePack value of type `T` from `bytes`.
pub fn decode<T>(bytes: &[u8]) -> Result<T, CodecError>
where
    T: DeserializeOwned,
{
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Decodes a branch condition.
///
/// Conditions are plain booleans; anything else is a decode failure, never
/// a truthiness coercion.
pub fn decode_bool(bytes: &[u8]) -> Result<bool, CodecError> {
    decode(bytes)
}
