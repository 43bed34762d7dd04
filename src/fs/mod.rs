//! our inode filesystem
pub mod bitmap;
mod block;
pub mod debug;
pub mod error;
pub mod fs_layout;
pub mod inode;
pub mod options;
pub mod superblock;
pub use bitmap::*;
pub(crate) use block::*;
pub use debug::*;
pub use error::*;
pub use fs_layout::*;
pub use inode::*;
pub use options::*;
pub use superblock::*;

/// bytes per block, for every block on the volume
pub const BLOCK_SIZE: usize = 4096;
pub const FS_MAGIC: u32 = 0xf0f0_3410;
pub const INODES_PER_BLOCK: u32 = 128;
/// bytes reserved for each inode slot in the inode table
pub const INODE_SIZE: usize = BLOCK_SIZE / INODES_PER_BLOCK as usize;
pub const POINTERS_PER_INODE: usize = 5;
pub const POINTERS_PER_BLOCK: usize = BLOCK_SIZE / std::mem::size_of::<u32>();
/// the largest file the direct and indirect pointers can address
pub const MAX_FILE_SIZE: u64 = ((POINTERS_PER_INODE + POINTERS_PER_BLOCK) * BLOCK_SIZE) as u64;
