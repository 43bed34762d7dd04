//! This module contains functions to calculate the size of different fs components

use crate::fs::{BLOCK_SIZE, INODES_PER_BLOCK};

/// calculate how many inodes a volume gets
/// # Arguments
/// - `blocks`: the number of blocks in the volume
/// # Return
/// a tenth of the blocks, but never less than one inode block's worth
/// # Example
/// ```
/// use inodefs::utils::fs_size_calculator::inode_count;
/// assert_eq!(inode_count(200), 128);
/// assert_eq!(inode_count(5000), 500);
/// ```
pub const fn inode_count(blocks: u32) -> u32 {
    let inodes = blocks / 10;
    if inodes < INODES_PER_BLOCK {
        INODES_PER_BLOCK
    } else {
        inodes
    }
}

/// calculate needed Inode Table size in blocks
/// # Arguments
/// - `inode_count`: the number of inodes
/// # Example
/// ```
/// use inodefs::utils::fs_size_calculator::inode_table_blocks;
/// assert_eq!(inode_table_blocks(128), 1);
/// assert_eq!(inode_table_blocks(129), 2);
/// ```
pub const fn inode_table_blocks(inode_count: u32) -> u32 {
    inode_count.div_ceil(INODES_PER_BLOCK)
}

/// calculate the size of a volume in bytes
/// # Example
/// ```
/// use inodefs::utils::fs_size_calculator::volume_size;
/// assert_eq!(volume_size(2), 8192);
/// ```
pub const fn volume_size(blocks: u32) -> u64 {
    blocks as u64 * BLOCK_SIZE as u64
}
