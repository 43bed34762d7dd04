use bincode::error::{DecodeError, EncodeError};
use serde::{de::DeserializeOwned, Serialize};

/// Trait for fixed-layout records stored inside a block
/// # Note
/// Records use bincode's legacy configuration: little endian,
/// fixed-width integers and no length prefix for arrays,
/// so a struct of `u32`s lands on disk exactly as its fields are declared.
pub trait OnDiskRecord: Serialize + DeserializeOwned {
    /// serialize into the start of `buf`
    /// # Returns
    /// The number of bytes written if successful
    fn encode_into(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let config = bincode::config::legacy();
        bincode::serde::encode_into_slice(self, buf, config)
    }

    /// deserialize from the start of `buf`, trailing bytes are ignored
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let config = bincode::config::legacy();
        let (object, _bytes_read): (Self, usize) = bincode::serde::decode_from_slice(buf, config)?;
        Ok(object)
    }
}
