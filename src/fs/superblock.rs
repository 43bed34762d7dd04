use serde::{Deserialize, Serialize};

use crate::utils::{fs_size_calculator, traits::OnDiskRecord};

use super::{FsError, Result, FS_MAGIC, INODES_PER_BLOCK};

/// The superblock of this filesystem, stored at block 0
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuperBlock {
    /// magic number
    pub magic: u32,
    /// number of blocks in the volume, superblock included
    pub blocks: u32,
    /// number of blocks reserved for the inode table
    pub inode_blocks: u32,
    /// number of inodes in the inode table
    pub inodes: u32,
}

impl SuperBlock {
    /// lay out a fresh volume of `blocks` blocks
    pub fn new(blocks: u32) -> Self {
        let inodes = fs_size_calculator::inode_count(blocks);
        Self {
            magic: FS_MAGIC,
            blocks,
            inode_blocks: fs_size_calculator::inode_table_blocks(inodes),
            inodes,
        }
    }

    pub fn is_magic_valid(&self) -> bool {
        self.magic == FS_MAGIC
    }

    /// the first block after the inode table
    pub fn first_data_block(&self) -> u32 {
        self.inode_blocks.saturating_add(1)
    }

    /// block numbers of the inode table
    pub fn inode_table(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.inode_blocks
    }

    /// whether `block` may hold file data or block pointers,
    /// i.e. it lies after the inode table and inside the volume
    pub fn is_data_block(&self, block: u32) -> bool {
        (self.first_data_block()..self.blocks).contains(&block)
    }

    /// check that the inode table fits in the volume and holds every inode
    pub fn check_layout(&self) -> Result<()> {
        let inode_slots = self.inode_blocks.checked_mul(INODES_PER_BLOCK);
        if self.first_data_block() > self.blocks
            || inode_slots.map_or(true, |slots| self.inodes > slots)
        {
            return Err(FsError::VolumeTooSmall {
                blocks: self.blocks,
                inode_blocks: self.inode_blocks,
            });
        }
        Ok(())
    }
}

impl OnDiskRecord for SuperBlock {}
