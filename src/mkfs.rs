//! create our filesystem
use std::path::Path;

use byte_unit::Byte;
use log::info;

use crate::{
    block_store::{BlockStore, ImageFile},
    fs::{FsError, Inode, InodeTable, Result, SuperBlock, BLOCK_SIZE},
    utils::{fs_size_calculator, traits::OnDiskRecord},
};

/// write an empty filesystem onto `store`
///
/// The superblock goes to block 0, the inode table follows it with only
/// inode 0 in use as a placeholder, and every other block is zeroed.
/// # Note
/// Formatting is not atomic: the first failed block write aborts it and
/// whatever was written before stays written. Never format a store that a
/// session has mounted.
/// # Return
/// the superblock that was written
pub fn format<D>(store: &mut D) -> Result<SuperBlock>
where
    D: BlockStore + ?Sized,
{
    let blocks = store.capacity();
    let superblock = SuperBlock::new(blocks);
    if superblock.first_data_block() > blocks {
        return Err(FsError::VolumeTooSmall {
            blocks,
            inode_blocks: superblock.inode_blocks,
        });
    }

    let mut block = [0u8; BLOCK_SIZE];
    superblock.encode_into(&mut block)?;
    store.write_block(0, &block).map_err(FsError::io(0))?;

    let mut first_table = InodeTable::empty();
    *first_table.get_mut(0) = Inode::new();
    let first_table = first_table.encode()?;
    let zeroes = [0u8; BLOCK_SIZE];
    for index in 1..blocks {
        let block = if index == 1 { &first_table } else { &zeroes };
        store.write_block(index, block).map_err(FsError::io(index))?;
    }

    info!(
        "formatted {} volume: {} blocks, {} inode blocks, {} inodes",
        Byte::from_bytes(fs_size_calculator::volume_size(blocks) as _).get_appropriate_unit(true),
        superblock.blocks,
        superblock.inode_blocks,
        superblock.inodes
    );
    Ok(superblock)
}

/// create a new filesystem image of `blocks` blocks at `image_file_path`
/// # Params
/// - `image_file_path`: the path of the image file, created when missing
/// - `blocks`: the number of blocks in the volume
///
/// # Return
/// an [anyhow::Result] type to indicate whether the operation is successful
pub fn mkfs<P>(image_file_path: P, blocks: u32) -> anyhow::Result<SuperBlock>
where
    P: AsRef<Path>,
{
    let mut image = ImageFile::open(image_file_path, blocks)?;
    let superblock = format(&mut image)?;
    image.close()?;
    Ok(superblock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block_store::MemoryStore,
        fs::{ErrorClass, FileSystem, INODE_SIZE},
    };
    use std::io;

    #[test]
    fn test_format_layout() -> anyhow::Result<()> {
        let mut store = MemoryStore::new(300);
        // leftovers from an earlier life
        store.write_block(250, &[0xffu8; BLOCK_SIZE])?;

        let superblock = format(&mut store)?;
        assert_eq!(superblock, SuperBlock::new(300));
        assert_eq!(store.writes(), 301);

        let mut block = [0u8; BLOCK_SIZE];
        store.read_block(0, &mut block)?;
        assert_eq!(SuperBlock::decode(&block)?, superblock);

        store.read_block(1, &mut block)?;
        let placeholder = Inode::decode(&block)?;
        assert!(placeholder.is_valid());
        assert_eq!(placeholder.size, 0);
        assert!(block[INODE_SIZE..].iter().all(|b| *b == 0));

        store.read_block(250, &mut block)?;
        assert_eq!(block, [0u8; BLOCK_SIZE]);
        Ok(())
    }

    #[test]
    fn test_format_rejects_tiny_store() {
        let mut store = MemoryStore::new(1);
        let err = format(&mut store).unwrap_err();
        assert!(matches!(err, FsError::VolumeTooSmall { blocks: 1, .. }));
        assert_eq!(err.class(), ErrorClass::Validation);
    }

    #[test]
    fn test_format_stops_at_first_failure() {
        struct ReadOnly(MemoryStore);
        impl BlockStore for ReadOnly {
            fn capacity(&self) -> u32 {
                self.0.capacity()
            }
            fn read_block(&mut self, index: u32, buf: &mut [u8; BLOCK_SIZE]) -> io::Result<()> {
                self.0.read_block(index, buf)
            }
            fn write_block(&mut self, _index: u32, _buf: &[u8; BLOCK_SIZE]) -> io::Result<()> {
                Err(io::Error::from(io::ErrorKind::PermissionDenied))
            }
        }
        let mut store = ReadOnly(MemoryStore::new(200));
        let err = format(&mut store).unwrap_err();
        assert!(matches!(err, FsError::Io { block: 0, .. }));
        assert_eq!(store.0.writes(), 0);
    }

    #[test]
    fn test_mkfs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let image_path = dir.path().join("new_fs.img");
        let blocks = 1290;

        let superblock = mkfs(&image_path, blocks)?;
        assert_eq!(superblock.inodes, 129);
        assert_eq!(superblock.inode_blocks, 2);
        assert_eq!(
            std::fs::metadata(&image_path)?.len(),
            fs_size_calculator::volume_size(blocks)
        );

        let mut fs = FileSystem::new();
        fs.mount(ImageFile::open_existing(&image_path)?)?;
        assert_eq!(*fs.superblock()?, superblock);
        // root placeholder is in use and empty
        assert_eq!(fs.stat(0)?, 0);
        assert_eq!(fs.create()?, 1);
        Ok(())
    }
}
