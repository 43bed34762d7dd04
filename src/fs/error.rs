use std::io;

use thiserror::Error;

/// Everything that can go wrong in a filesystem session
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FsError {
    #[error("no volume is mounted")]
    NotMounted,
    #[error("inode {0} is out of range or not in use")]
    InvalidInode(u32),
    #[error("invalid magic: expected {expected:#x}, got {actual:#x}")]
    BadMagic { expected: u32, actual: u32 },
    #[error("superblock records {recorded} blocks but the store has {actual}")]
    CapacityMismatch { recorded: u32, actual: u32 },
    #[error("a store of {blocks} blocks can't hold the superblock and {inode_blocks} inode blocks")]
    VolumeTooSmall { blocks: u32, inode_blocks: u32 },
    #[error("no free inode left")]
    NoFreeInode,
    #[error("no free block left")]
    NoFreeBlock,
    #[error("inode {inode} points at block {block}, which is not a data block")]
    BadBlockPointer { inode: u32, block: u32 },
    #[error("I/O error on block {block}: {source}")]
    Io {
        block: u32,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode a record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode a record: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}

/// coarse grouping of [FsError] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// bad arguments or wrong session state, nothing was touched
    Validation,
    /// a block transfer failed or the volume is damaged,
    /// the operation stopped half way
    Io,
    /// ran out of inodes or blocks
    Exhausted,
}

pub type Result<T> = std::result::Result<T, FsError>;

impl FsError {
    pub(crate) fn io(block: u32) -> impl FnOnce(io::Error) -> FsError {
        move |source| FsError::Io { block, source }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            FsError::NotMounted
            | FsError::InvalidInode(_)
            | FsError::BadMagic { .. }
            | FsError::CapacityMismatch { .. }
            | FsError::VolumeTooSmall { .. } => ErrorClass::Validation,
            FsError::NoFreeInode | FsError::NoFreeBlock => ErrorClass::Exhausted,
            FsError::BadBlockPointer { .. }
            | FsError::Io { .. }
            | FsError::Encode(_)
            | FsError::Decode(_) => ErrorClass::Io,
        }
    }

    /// the errno a fuse front-end would reply with
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::NotMounted => libc::ENODEV,
            FsError::InvalidInode(_) => libc::ENOENT,
            FsError::BadMagic { .. }
            | FsError::CapacityMismatch { .. }
            | FsError::VolumeTooSmall { .. } => libc::EINVAL,
            FsError::NoFreeInode | FsError::NoFreeBlock => libc::ENOSPC,
            FsError::BadBlockPointer { .. }
            | FsError::Io { .. }
            | FsError::Encode(_)
            | FsError::Decode(_) => libc::EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(FsError::NotMounted.class(), ErrorClass::Validation);
        assert_eq!(FsError::InvalidInode(3).class(), ErrorClass::Validation);
        assert_eq!(FsError::NoFreeBlock.class(), ErrorClass::Exhausted);
        let io = FsError::io(9)(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert_eq!(io.class(), ErrorClass::Io);
        assert_eq!(io.errno(), libc::EIO);
        assert_eq!(FsError::NoFreeInode.errno(), libc::ENOSPC);
        let corrupt = FsError::BadBlockPointer { inode: 3, block: 1 };
        assert_eq!(corrupt.class(), ErrorClass::Io);
        assert_eq!(corrupt.errno(), libc::EIO);
    }

    #[test]
    fn test_error_messages() {
        let err = FsError::BadMagic {
            expected: 0xf0f03410,
            actual: 0,
        };
        assert_eq!(err.to_string(), "invalid magic: expected 0xf0f03410, got 0x0");
        let err = FsError::io(4)(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(err.to_string(), "I/O error on block 4: boom");
    }
}
