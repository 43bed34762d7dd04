use serde::{Deserialize, Serialize};

use crate::utils::traits::OnDiskRecord;

use super::{INODES_PER_BLOCK, POINTERS_PER_INODE};

/// one slot of the inode table
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inode {
    /// 1 when the slot holds a file
    pub valid: u32,
    /// logical size in bytes
    pub size: u32,
    pub direct: [u32; POINTERS_PER_INODE],
    pub indirect: u32,
}

impl OnDiskRecord for Inode {}

impl Inode {
    /// an empty, in-use inode
    pub fn new() -> Self {
        Inode {
            valid: 1,
            ..Inode::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid == 1
    }

    /// which inode table block and slot hold inode `inode_number`
    pub fn locate(inode_number: u32) -> (u32, usize) {
        (
            1 + inode_number / INODES_PER_BLOCK,
            (inode_number % INODES_PER_BLOCK) as usize,
        )
    }

    /// allocated direct blocks, in file order
    pub fn direct_blocks(&self) -> Vec<u32> {
        self.direct.iter().copied().filter(|b| *b != 0).collect()
    }

    /// grow the recorded size to cover `end`, returns whether it changed
    pub fn adjust_size(&mut self, end: u32) -> bool {
        if end > self.size {
            self.size = end;
            true
        } else {
            false
        }
    }
}
