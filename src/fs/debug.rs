//! a human readable dump of a volume's metadata
use std::fmt;

use log::warn;

use crate::block_store::BlockStore;

use super::{read_block, read_inode_table, read_pointer_block, Result, SuperBlock, INODES_PER_BLOCK};
use crate::utils::traits::OnDiskRecord;

/// what [debug_report] found out about one valid inode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeReport {
    pub number: u32,
    pub size: u32,
    pub direct_blocks: Vec<u32>,
    pub indirect_block: Option<u32>,
    pub indirect_data_blocks: Vec<u32>,
}

/// superblock and valid inodes of a volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugReport {
    pub superblock: SuperBlock,
    /// empty when the magic number or the inode table layout is wrong,
    /// the rest of the superblock can't be trusted then
    pub inodes: Vec<InodeReport>,
}

/// walk the superblock and inode table of `store`, which needn't be mounted
pub fn debug_report<D>(store: &mut D) -> Result<DebugReport>
where
    D: BlockStore + ?Sized,
{
    let superblock = SuperBlock::decode(&read_block(store, 0)?)?;
    let mut inodes = Vec::new();
    if !superblock.is_magic_valid() {
        return Ok(DebugReport { superblock, inodes });
    }

    if let Err(e) = superblock.check_layout() {
        warn!("not walking the inode table: {e}");
        return Ok(DebugReport { superblock, inodes });
    }

    let capacity = store.capacity();
    for table_block in superblock.inode_table() {
        let Some(first_inode) = (table_block - 1).checked_mul(INODES_PER_BLOCK) else {
            break;
        };
        if first_inode >= superblock.inodes || table_block >= capacity {
            break;
        }
        let table = read_inode_table(store, table_block)?;
        let slots = (superblock.inodes - first_inode).min(INODES_PER_BLOCK) as usize;
        for (slot, inode) in table.iter().enumerate().take(slots) {
            if !inode.is_valid() {
                continue;
            }
            let indirect_block = (inode.indirect != 0).then_some(inode.indirect);
            let indirect_data_blocks = match indirect_block {
                Some(block) if superblock.is_data_block(block) && block < capacity => {
                    read_pointer_block(store, block)?.allocated().collect()
                }
                _ => Vec::new(),
            };
            inodes.push(InodeReport {
                number: first_inode + slot as u32,
                size: inode.size,
                direct_blocks: inode.direct_blocks(),
                indirect_block,
                indirect_data_blocks,
            });
        }
    }
    Ok(DebugReport { superblock, inodes })
}

fn write_blocks(f: &mut fmt::Formatter<'_>, label: &str, blocks: &[u32]) -> fmt::Result {
    write!(f, "    {label}:")?;
    for block in blocks {
        write!(f, " {block}")?;
    }
    writeln!(f)
}

impl fmt::Display for DebugReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let SuperBlock {
            blocks,
            inode_blocks,
            inodes,
            ..
        } = self.superblock;
        writeln!(f, "SuperBlock:")?;
        if !self.superblock.is_magic_valid() {
            return writeln!(f, "    magic number is invalid");
        }
        writeln!(f, "    magic number is valid")?;
        writeln!(f, "    {blocks} blocks")?;
        writeln!(f, "    {inode_blocks} inode blocks")?;
        writeln!(f, "    {inodes} inodes")?;
        for inode in &self.inodes {
            writeln!(f, "Inode {}:", inode.number)?;
            writeln!(f, "    size: {} bytes", inode.size)?;
            write_blocks(f, "direct blocks", &inode.direct_blocks)?;
            if let Some(indirect) = inode.indirect_block {
                writeln!(f, "    indirect block: {indirect}")?;
                write_blocks(f, "indirect data blocks", &inode.indirect_data_blocks)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block_store::MemoryStore,
        fs::{FileSystem, BLOCK_SIZE},
        mkfs::format,
    };

    #[test]
    fn test_debug_report() -> anyhow::Result<()> {
        let mut store = MemoryStore::new(20);
        format(&mut store)?;
        let mut fs = FileSystem::new();
        fs.mount(&mut store)?;
        let first = fs.create()?;
        fs.write(first, &vec![1u8; 7 * BLOCK_SIZE], 0)?;
        let second = fs.create()?;
        fs.write(second, b"hi", 0)?;
        drop(fs);

        let report = debug_report(&mut store)?;
        assert_eq!(report.inodes.len(), 3);
        let placeholder = &report.inodes[0];
        assert_eq!(placeholder.number, 0);
        assert!(placeholder.direct_blocks.is_empty());
        assert_eq!(placeholder.indirect_block, None);

        assert_eq!(
            report.inodes[1],
            InodeReport {
                number: 1,
                size: 7 * BLOCK_SIZE as u32,
                direct_blocks: vec![2, 3, 4, 5, 6],
                indirect_block: Some(7),
                indirect_data_blocks: vec![8, 9],
            }
        );

        let text = report.to_string();
        let expected = "\
SuperBlock:
    magic number is valid
    20 blocks
    1 inode blocks
    128 inodes
Inode 0:
    size: 0 bytes
    direct blocks:
Inode 1:
    size: 28672 bytes
    direct blocks: 2 3 4 5 6
    indirect block: 7
    indirect data blocks: 8 9
Inode 2:
    size: 2 bytes
    direct blocks: 10
";
        assert_eq!(text, expected);
        Ok(())
    }

    #[test]
    fn test_debug_report_invalid_magic() -> anyhow::Result<()> {
        let mut store = MemoryStore::new(20);
        let report = debug_report(&mut store)?;
        assert!(report.inodes.is_empty());
        assert_eq!(report.to_string(), "SuperBlock:\n    magic number is invalid\n");
        Ok(())
    }

    #[test]
    fn test_debug_report_bad_layout() -> anyhow::Result<()> {
        let mut store = MemoryStore::new(20);
        format(&mut store)?;
        let mut superblock = SuperBlock::new(20);
        superblock.inode_blocks = u32::MAX;
        superblock.inodes = u32::MAX;
        let mut block = [0u8; BLOCK_SIZE];
        superblock.encode_into(&mut block)?;
        store.write_block(0, &block)?;

        let report = debug_report(&mut store)?;
        assert_eq!(report.superblock, superblock);
        assert!(report.inodes.is_empty());
        Ok(())
    }
}
