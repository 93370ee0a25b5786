//! Wire payloads and frame I/O.
//!
//! A request is three independently decodable MessagePack values
//! concatenated in order: the value-store seed, the instruction list, and
//! the output slot-id list. A response is a single envelope carrying a
//! status code, a message, and the output mapping. Each payload travels in
//! one length-prefixed frame (4-byte big-endian length).
//!
//! Status code zero is success; engine failures map to the stable codes in
//! [`FaultKind`](crate::errors::FaultKind). A failing response carries an
//! empty output map, never partial values.

use std::io::{self, Cursor};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::codec::CodecError;
use crate::program::{Instruction, Program, RawInstruction};
use crate::slots::{SlotId, ValueStore};

/// Status code of a successful response.
pub const STATUS_OK: u32 = 0;

/// Default cap on a single frame's payload size.
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// The single-value response payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// Zero for success, a [`FaultKind`](crate::errors::FaultKind) status
    /// code otherwise.
    pub status: u32,
    /// Human-readable failure description; empty on success.
    pub message: String,
    /// Output mapping restricted to the requested slots; empty on failure.
    pub outputs: ValueStore,
}

impl ResponseEnvelope {
    /// A success envelope carrying `outputs`.
    #[must_use]
    pub fn success(outputs: ValueStore) -> Self {
        Self {
            status: STATUS_OK,
            message: String::new(),
            outputs,
        }
    }

    /// A failure envelope with no outputs.
    #[must_use]
    pub fn fault(status: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            outputs: ValueStore::new(),
        }
    }
}

/// Encodes a request payload from its three parts.
pub fn encode_request(
    seed: &ValueStore,
    instructions: &[Instruction],
    outputs: &[SlotId],
) -> Result<Vec<u8>, CodecError> {
    let raw: Vec<RawInstruction> = instructions.iter().map(Instruction::to_raw).collect();
    let mut payload = rmp_serde::to_vec(seed)?;
    payload.extend(rmp_serde::to_vec(&raw)?);
    payload.extend(rmp_serde::to_vec(&outputs)?);
    Ok(payload)
}

/// Decodes a request payload into a working store and a program.
pub fn decode_request(payload: &[u8]) -> Result<(ValueStore, Program), CodecError> {
    let mut cursor = Cursor::new(payload);
    let seed: ValueStore = rmp_serde::from_read(&mut cursor)?;
    let raw: Vec<RawInstruction> = rmp_serde::from_read(&mut cursor)?;
    let outputs: Vec<SlotId> = rmp_serde::from_read(&mut cursor)?;
    let instructions = raw.into_iter().map(Instruction::from_raw).collect();
    Ok((seed, Program::new(instructions, outputs)))
}

/// Encodes a response envelope.
pub fn encode_response(envelope: &ResponseEnvelope) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec(envelope)?)
}

/// Decodes a response envelope.
pub fn decode_response(payload: &[u8]) -> Result<ResponseEnvelope, CodecError> {
    Ok(rmp_serde::from_slice(payload)?)
}

/// Writes one length-prefixed frame.
pub(crate) async fn write_frame<W>(writer: &mut W, payload: &[u8], max_frame: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > max_frame {
        return Err(oversize(payload.len(), max_frame));
    }
    let len = u32::try_from(payload.len())
        .map_err(|_| oversize(payload.len(), u32::MAX as usize))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

/// Reads one length-prefixed frame. `Ok(None)` on clean end of stream.
pub(crate) async fn read_frame<R>(reader: &mut R, max_frame: usize) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > max_frame {
        return Err(oversize(len, max_frame));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

fn oversize(len: usize, max: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("frame of {len} bytes exceeds the {max} byte limit"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn request_round_trip() {
        let mut seed = ValueStore::new();
        let slot = SlotId::FIRST;
        seed.insert(slot, codec::encode(&"a").unwrap());

        let instructions = vec![
            Instruction::Invoke {
                name: "kv/get".into(),
                args: vec![slot],
                result: slot.next(),
            },
            Instruction::Return,
        ];
        let outputs = vec![slot.next()];

        let payload = encode_request(&seed, &instructions, &outputs).unwrap();
        let (seed_back, program) = decode_request(&payload).unwrap();

        assert_eq!(seed_back, seed);
        assert_eq!(program.instructions(), &instructions[..]);
        assert_eq!(program.outputs(), &outputs[..]);
    }

    #[test]
    fn response_round_trip() {
        let mut outputs = ValueStore::new();
        outputs.insert(SlotId::FIRST, codec::encode(&2025i64).unwrap());
        let envelope = ResponseEnvelope::success(outputs);

        let payload = encode_response(&envelope).unwrap();
        assert_eq!(decode_response(&payload).unwrap(), envelope);
    }

    #[test]
    fn fault_envelope_is_outputless() {
        let envelope = ResponseEnvelope::fault(5, "execution limit exceeded");
        assert_ne!(envelope.status, STATUS_OK);
        assert!(envelope.outputs.is_empty());
    }

    #[tokio::test]
    async fn frame_round_trip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello", DEFAULT_MAX_FRAME).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor, DEFAULT_MAX_FRAME).await.unwrap();
        assert_eq!(frame.as_deref(), Some(&b"hello"[..]));

        let end = read_frame(&mut cursor, DEFAULT_MAX_FRAME).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, &[0u8; 64], 16).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
