//! Preregistered integer codecs: marker byte followed by the big-endian
//! two's-complement payload.

use eyre::{ensure, Result};

use super::{check_marker, Codec, TypeDescriptor, NULL_MARKER, VALUE_MARKER};

/// 32-bit signed integer codec, 5 bytes per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int32Codec;

impl Codec for Int32Codec {
    type Value = i32;

    fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::new("int32", 5)
    }

    fn encode(&self, value: Option<&i32>, out: &mut [u8]) -> Result<()> {
        ensure!(out.len() >= 5, "int32 record needs 5 bytes, buffer has {}", out.len());
        match value {
            Some(v) => {
                out[0] = VALUE_MARKER;
                out[1..5].copy_from_slice(&v.to_be_bytes());
            }
            None => {
                out[0] = NULL_MARKER;
                out[1..5].fill(0);
            }
        }
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<i32>> {
        ensure!(bytes.len() >= 5, "int32 record needs 5 bytes, got {}", bytes.len());
        if !check_marker(bytes[0])? {
            return Ok(None);
        }
        let mut payload = [0u8; 4];
        payload.copy_from_slice(&bytes[1..5]);
        Ok(Some(i32::from_be_bytes(payload)))
    }
}

/// 64-bit signed integer codec, 9 bytes per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int64Codec;

impl Codec for Int64Codec {
    type Value = i64;

    fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::new("int64", 9)
    }

    fn encode(&self, value: Option<&i64>, out: &mut [u8]) -> Result<()> {
        ensure!(out.len() >= 9, "int64 record needs 9 bytes, buffer has {}", out.len());
        match value {
            Some(v) => {
                out[0] = VALUE_MARKER;
                out[1..9].copy_from_slice(&v.to_be_bytes());
            }
            None => {
                out[0] = NULL_MARKER;
                out[1..9].fill(0);
            }
        }
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<i64>> {
        ensure!(bytes.len() >= 9, "int64 record needs 9 bytes, got {}", bytes.len());
        if !check_marker(bytes[0])? {
            return Ok(None);
        }
        let mut payload = [0u8; 8];
        payload.copy_from_slice(&bytes[1..9]);
        Ok(Some(i64::from_be_bytes(payload)))
    }
}
