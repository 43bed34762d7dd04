//! typed views of a raw block
//!
//! Every block read off the store is decoded into exactly one of these,
//! the raw bytes are never reinterpreted in place.
use std::fmt;

use serde::{
    de::{self, SeqAccess, Visitor},
    ser::SerializeTuple,
    Deserialize, Deserializer, Serialize, Serializer,
};

use crate::{
    block_store::{Block, BlockStore},
    utils::traits::OnDiskRecord,
};

use super::{FsError, Inode, Result, BLOCK_SIZE, INODES_PER_BLOCK, INODE_SIZE, POINTERS_PER_BLOCK};

pub(crate) fn read_block<D>(store: &mut D, index: u32) -> Result<Block>
where
    D: BlockStore + ?Sized,
{
    let mut block = [0u8; BLOCK_SIZE];
    store
        .read_block(index, &mut block)
        .map_err(FsError::io(index))?;
    Ok(block)
}

pub(crate) fn write_block<D>(store: &mut D, index: u32, block: &Block) -> Result<()>
where
    D: BlockStore + ?Sized,
{
    store.write_block(index, block).map_err(FsError::io(index))
}

pub(crate) fn read_inode_table<D>(store: &mut D, index: u32) -> Result<InodeTable>
where
    D: BlockStore + ?Sized,
{
    InodeTable::decode(&read_block(store, index)?)
}

pub(crate) fn write_inode_table<D>(store: &mut D, index: u32, table: &InodeTable) -> Result<()>
where
    D: BlockStore + ?Sized,
{
    write_block(store, index, &table.encode()?)
}

pub(crate) fn read_pointer_block<D>(store: &mut D, index: u32) -> Result<PointerBlock>
where
    D: BlockStore + ?Sized,
{
    Ok(PointerBlock::decode(&read_block(store, index)?)?)
}

pub(crate) fn write_pointer_block<D>(store: &mut D, index: u32, pointers: &PointerBlock) -> Result<()>
where
    D: BlockStore + ?Sized,
{
    let mut block = [0u8; BLOCK_SIZE];
    pointers.encode_into(&mut block)?;
    write_block(store, index, &block)
}

/// one block of the inode table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeTable {
    inodes: Vec<Inode>,
}

impl InodeTable {
    /// a table with every slot free
    pub fn empty() -> Self {
        Self {
            inodes: vec![Inode::default(); INODES_PER_BLOCK as usize],
        }
    }

    pub fn decode(block: &Block) -> Result<Self> {
        let inodes = block
            .chunks_exact(INODE_SIZE)
            .map(Inode::decode)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { inodes })
    }

    /// encode into a fresh block, slot padding is zeroed
    pub fn encode(&self) -> Result<Block> {
        let mut block = [0u8; BLOCK_SIZE];
        for (slot, inode) in block.chunks_exact_mut(INODE_SIZE).zip(&self.inodes) {
            inode.encode_into(slot)?;
        }
        Ok(block)
    }

    pub fn get(&self, slot: usize) -> &Inode {
        &self.inodes[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Inode {
        &mut self.inodes[slot]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Inode> {
        self.inodes.iter()
    }
}

/// a data block holding block pointers
///
/// On disk it is a plain run of [POINTERS_PER_BLOCK] `u32`s. serde only
/// derives arrays of up to 32 elements, so it (de)serializes as a fixed
/// size tuple, which bincode writes without a length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerBlock {
    pointers: Vec<u32>,
}

impl PointerBlock {
    pub fn empty() -> Self {
        Self {
            pointers: vec![0; POINTERS_PER_BLOCK],
        }
    }

    pub fn get(&self, index: usize) -> u32 {
        self.pointers[index]
    }

    pub fn set(&mut self, index: usize, block: u32) {
        self.pointers[index] = block;
    }

    /// non-zero pointers, in file order
    pub fn allocated(&self) -> impl Iterator<Item = u32> + '_ {
        self.pointers.iter().copied().filter(|b| *b != 0)
    }
}

impl Serialize for PointerBlock {
    fn serialize<Se>(&self, serializer: Se) -> std::result::Result<Se::Ok, Se::Error>
    where
        Se: Serializer,
    {
        let mut tuple = serializer.serialize_tuple(POINTERS_PER_BLOCK)?;
        for pointer in &self.pointers {
            tuple.serialize_element(pointer)?;
        }
        tuple.end()
    }
}

struct PointerBlockVisitor;

impl<'de> Visitor<'de> for PointerBlockVisitor {
    type Value = PointerBlock;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{POINTERS_PER_BLOCK} block pointers")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<PointerBlock, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut pointers = Vec::with_capacity(POINTERS_PER_BLOCK);
        for i in 0..POINTERS_PER_BLOCK {
            let pointer = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
            pointers.push(pointer);
        }
        Ok(PointerBlock { pointers })
    }
}

impl<'de> Deserialize<'de> for PointerBlock {
    fn deserialize<De>(deserializer: De) -> std::result::Result<Self, De::Error>
    where
        De: Deserializer<'de>,
    {
        deserializer.deserialize_tuple(POINTERS_PER_BLOCK, PointerBlockVisitor)
    }
}

impl OnDiskRecord for PointerBlock {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inode_table_slots() -> anyhow::Result<()> {
        let mut table = InodeTable::decode(&[0u8; BLOCK_SIZE])?;
        assert_eq!(table.iter().count(), INODES_PER_BLOCK as usize);
        assert!(table.iter().all(|inode| !inode.is_valid()));

        *table.get_mut(3) = Inode {
            valid: 1,
            size: 42,
            direct: [20, 0, 0, 0, 0],
            indirect: 0,
        };
        let block = table.encode()?;
        // slot 3 starts 3 * 32 bytes in
        assert_eq!(&block[96..100], &1u32.to_le_bytes());
        assert_eq!(&block[100..104], &42u32.to_le_bytes());

        let table = InodeTable::decode(&block)?;
        assert_eq!(table.get(3).size, 42);
        assert_eq!(table.get(3).direct_blocks(), vec![20]);
        assert!(!table.get(4).is_valid());
        Ok(())
    }

    #[test]
    fn test_pointer_block() -> anyhow::Result<()> {
        let mut pointers = PointerBlock::empty();
        pointers.set(0, 13);
        pointers.set(1023, 14);
        let mut block = [0xffu8; BLOCK_SIZE];
        // fills the block exactly, no length prefix
        assert_eq!(pointers.encode_into(&mut block)?, BLOCK_SIZE);
        assert_eq!(&block[0..4], &13u32.to_le_bytes());
        assert_eq!(&block[4..8], &[0u8; 4]);
        assert_eq!(&block[4092..4096], &14u32.to_le_bytes());

        let pointers = PointerBlock::decode(&block)?;
        assert_eq!(pointers.get(0), 13);
        assert_eq!(pointers.get(1), 0);
        assert_eq!(pointers.allocated().collect::<Vec<_>>(), vec![13, 14]);
        Ok(())
    }

    #[test]
    fn test_pointer_block_store_helpers() -> anyhow::Result<()> {
        let mut store = crate::block_store::MemoryStore::new(4);
        let mut pointers = PointerBlock::empty();
        pointers.set(7, 3);
        write_pointer_block(&mut store, 2, &pointers)?;
        assert_eq!(read_pointer_block(&mut store, 2)?, pointers);
        // a short buffer can't hold a whole pointer block
        assert!(PointerBlock::decode(&[0u8; 16]).is_err());
        Ok(())
    }
}
