// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! User data types.

use crate::error::{Error, Result};
use crate::protocol::constants::CDR_LE;
use crate::protocol::guid::InstanceHandle;
use crate::protocol::types::SerializedPayload;

/// Serialization plug-in of a topic data type `T`.
///
/// Implementations are registered once per participant under
/// [`name`](TopicDataType::name). Keyed types must override
/// [`get_key`](TopicDataType::get_key) and return `true` from
/// [`is_keyed`](TopicDataType::is_keyed).
pub trait TopicDataType<T>: Send + Sync {
    fn name(&self) -> &str;

    /// Largest serialized size of one sample, in bytes.
    fn type_size(&self) -> usize;

    fn is_keyed(&self) -> bool {
        false
    }

    /// Write `data` into `payload`, setting its encapsulation.
    fn serialize(&self, data: &T, payload: &mut SerializedPayload) -> Result<()>;

    fn deserialize(&self, payload: &SerializedPayload) -> Result<T>;

    /// Instance handle of `data`; `None` for types without a key.
    fn get_key(&self, _data: &T) -> Option<InstanceHandle> {
        None
    }
}

/// Opaque byte samples, encapsulated as CDR little-endian.
///
/// With `keyed` set, the first 16 bytes of a sample (zero padded) form its
/// key.
#[derive(Clone, Debug)]
pub struct BytesType {
    name: String,
    max_size: usize,
    keyed: bool,
}

impl BytesType {
    pub fn new(name: &str, max_size: usize) -> Self {
        Self {
            name: name.to_string(),
            max_size,
            keyed: false,
        }
    }

    pub fn keyed(name: &str, max_size: usize) -> Self {
        Self {
            keyed: true,
            ..Self::new(name, max_size)
        }
    }
}

impl TopicDataType<Vec<u8>> for BytesType {
    fn name(&self) -> &str {
        &self.name
    }

    fn type_size(&self) -> usize {
        self.max_size
    }

    fn is_keyed(&self) -> bool {
        self.keyed
    }

    fn serialize(&self, data: &Vec<u8>, payload: &mut SerializedPayload) -> Result<()> {
        if data.len() > self.max_size {
            return Err(Error::PayloadTooLarge {
                size: data.len(),
                max: self.max_size,
            });
        }
        payload.encapsulation = CDR_LE;
        payload.data.clear();
        payload.data.extend_from_slice(data);
        Ok(())
    }

    fn deserialize(&self, payload: &SerializedPayload) -> Result<Vec<u8>> {
        Ok(payload.data.clone())
    }

    fn get_key(&self, data: &Vec<u8>) -> Option<InstanceHandle> {
        if !self.keyed {
            return None;
        }
        let mut key = [0u8; 16];
        let n = data.len().min(16);
        key[..n].copy_from_slice(&data[..n]);
        Some(InstanceHandle(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_type_serialize() {
        let ty = BytesType::new("Bytes", 8);
        let mut payload = SerializedPayload::default();
        ty.serialize(&vec![1, 2, 3], &mut payload).expect("serialize");
        assert_eq!(payload.encapsulation, CDR_LE);
        assert_eq!(ty.deserialize(&payload).expect("deserialize"), vec![1, 2, 3]);
        assert!(matches!(
            ty.serialize(&vec![0; 9], &mut payload),
            Err(Error::PayloadTooLarge { size: 9, max: 8 })
        ));
        assert_eq!(ty.get_key(&vec![1]), None);
    }

    #[test]
    fn test_keyed_bytes_type() {
        let ty = BytesType::keyed("Keyed", 64);
        assert!(ty.is_keyed());
        let key = ty.get_key(&vec![7, 8]).expect("key");
        assert_eq!(key.0[..3], [7, 8, 0]);
        assert_eq!(ty.get_key(&vec![7, 8, 9]).expect("key").0[2], 9);
    }
}
