//! block devices our filesystem lives on.
//!
//! A [BlockStore] only knows how to move whole [BLOCK_SIZE] blocks around,
//! it has no idea what the blocks mean.
use std::{
    fs::OpenOptions,
    io::{self, ErrorKind},
    ops::Range,
    path::Path,
};

use log::{debug, info, warn};
use memmap2::MmapMut;

use crate::fs::BLOCK_SIZE;

/// one block worth of bytes
pub type Block = [u8; BLOCK_SIZE];

/// a fixed-size array of blocks
pub trait BlockStore {
    /// number of blocks in this store
    fn capacity(&self) -> u32;

    /// read block `index` into `buf`
    fn read_block(&mut self, index: u32, buf: &mut Block) -> io::Result<()>;

    /// write `buf` to block `index`
    fn write_block(&mut self, index: u32, buf: &Block) -> io::Result<()>;
}

/// lets a session borrow a store instead of owning it
impl<T> BlockStore for &mut T
where
    T: BlockStore + ?Sized,
{
    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn read_block(&mut self, index: u32, buf: &mut Block) -> io::Result<()> {
        (**self).read_block(index, buf)
    }

    fn write_block(&mut self, index: u32, buf: &Block) -> io::Result<()> {
        (**self).write_block(index, buf)
    }
}

/// blocks laid out back to back in a byte buffer
#[derive(Debug, Default, Clone)]
pub struct BlockBuffer<T> {
    inner: T,
    blocks: u32,
    reads: u64,
    writes: u64,
}

/// a volume kept entirely in memory
pub type MemoryStore = BlockBuffer<Vec<u8>>;

impl MemoryStore {
    /// create a zeroed in-memory volume of `blocks` blocks
    pub fn new(blocks: u32) -> Self {
        BlockBuffer::from_inner(vec![0u8; blocks as usize * BLOCK_SIZE], blocks)
    }
}

impl<T> BlockBuffer<T> {
    fn from_inner(inner: T, blocks: u32) -> Self {
        Self {
            inner,
            blocks,
            reads: 0,
            writes: 0,
        }
    }

    /// get underlying buffer
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// get read only reference to underlying buffer
    pub const fn get_ref(&self) -> &T {
        &self.inner
    }

    /// successful block reads so far
    pub const fn reads(&self) -> u64 {
        self.reads
    }

    /// successful block writes so far
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    fn block_range(&self, index: u32) -> io::Result<Range<usize>> {
        if index >= self.blocks {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("block {index} is out of range, capacity is {}", self.blocks),
            ));
        }
        let start = index as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

impl<T> BlockStore for BlockBuffer<T>
where
    T: AsRef<[u8]> + AsMut<[u8]>,
{
    fn capacity(&self) -> u32 {
        self.blocks
    }

    fn read_block(&mut self, index: u32, buf: &mut Block) -> io::Result<()> {
        let range = self.block_range(index)?;
        let src = self
            .inner
            .as_ref()
            .get(range)
            .ok_or_else(|| io::Error::from(ErrorKind::UnexpectedEof))?;
        buf.copy_from_slice(src);
        self.reads += 1;
        Ok(())
    }

    fn write_block(&mut self, index: u32, buf: &Block) -> io::Result<()> {
        let range = self.block_range(index)?;
        let dst = self
            .inner
            .as_mut()
            .get_mut(range)
            .ok_or_else(|| io::Error::from(ErrorKind::WriteZero))?;
        dst.copy_from_slice(buf);
        self.writes += 1;
        Ok(())
    }
}

/// a disk image file, memory mapped for block access
#[derive(Debug)]
pub struct ImageFile {
    blocks: u32,
    mapped: Option<BlockBuffer<MmapMut>>,
}

impl ImageFile {
    /// open the image at `image_path`, creating it if it doesn't exist,
    /// and size it to exactly `blocks` blocks
    pub fn open<P>(image_path: P, blocks: u32) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        if blocks == 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "an image needs at least one block",
            ));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(image_path.as_ref())?;
        file.set_len(blocks as u64 * BLOCK_SIZE as u64)?;

        // Safety
        // the mapping lives only as long as this store and the image is
        // assumed to be used by a single session at a time
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        debug!(
            "opened image {} with {blocks} blocks",
            image_path.as_ref().display()
        );
        Ok(Self {
            blocks,
            mapped: Some(BlockBuffer::from_inner(mmap, blocks)),
        })
    }

    /// open an existing image, its capacity is taken from the file length
    pub fn open_existing<P>(image_path: P) -> io::Result<Self>
    where
        P: AsRef<Path>,
    {
        let len = std::fs::metadata(image_path.as_ref())?.len();
        if len == 0 || len % BLOCK_SIZE as u64 != 0 {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("image length {len} is not a whole number of {BLOCK_SIZE} byte blocks"),
            ));
        }
        let blocks = u32::try_from(len / BLOCK_SIZE as u64)
            .map_err(|_| io::Error::new(ErrorKind::InvalidData, "image has too many blocks"))?;
        Self::open(image_path, blocks)
    }

    pub fn is_open(&self) -> bool {
        self.mapped.is_some()
    }

    pub fn reads(&self) -> u64 {
        self.mapped.as_ref().map_or(0, BlockBuffer::reads)
    }

    pub fn writes(&self) -> u64 {
        self.mapped.as_ref().map_or(0, BlockBuffer::writes)
    }

    /// flush and unmap the image. closing twice does nothing
    pub fn close(&mut self) -> io::Result<()> {
        if let Some(mapped) = self.mapped.take() {
            info!(
                "{} disk block reads, {} disk block writes",
                mapped.reads(),
                mapped.writes()
            );
            mapped.into_inner().flush()?;
        }
        Ok(())
    }

    fn mapped_mut(&mut self) -> io::Result<&mut BlockBuffer<MmapMut>> {
        self.mapped
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "image is closed"))
    }
}

impl BlockStore for ImageFile {
    fn capacity(&self) -> u32 {
        self.blocks
    }

    fn read_block(&mut self, index: u32, buf: &mut Block) -> io::Result<()> {
        self.mapped_mut()?.read_block(index, buf)
    }

    fn write_block(&mut self, index: u32, buf: &Block) -> io::Result<()> {
        self.mapped_mut()?.write_block(index, buf)
    }
}

impl Drop for ImageFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to flush image on drop: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_read_write() {
        let mut store = MemoryStore::new(4);
        assert_eq!(store.capacity(), 4);

        let block = [7u8; BLOCK_SIZE];
        store.write_block(2, &block).unwrap();
        let mut buf = [0u8; BLOCK_SIZE];
        store.read_block(2, &mut buf).unwrap();
        assert_eq!(buf, block);
        // neighbours are untouched
        store.read_block(1, &mut buf).unwrap();
        assert_eq!(buf, [0u8; BLOCK_SIZE]);

        assert_eq!(store.reads(), 2);
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn test_out_of_range_block() {
        let mut store = MemoryStore::new(4);
        let mut buf = [0u8; BLOCK_SIZE];
        let err = store.read_block(4, &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.write_block(100, &buf).is_err());
        // failed transfers are not counted
        assert_eq!(store.reads(), 0);
        assert_eq!(store.writes(), 0);
    }

    #[test]
    fn test_image_file_is_sized_and_persists() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("disk.img");

        let mut image = ImageFile::open(&path, 8)?;
        assert_eq!(std::fs::metadata(&path)?.len(), 8 * BLOCK_SIZE as u64);
        image.write_block(5, &[0xabu8; BLOCK_SIZE])?;
        assert_eq!(image.writes(), 1);
        image.close()?;
        assert!(!image.is_open());
        // a closed image refuses transfers
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(image.read_block(5, &mut buf).is_err());

        let mut image = ImageFile::open_existing(&path)?;
        assert_eq!(image.capacity(), 8);
        image.read_block(5, &mut buf)?;
        assert_eq!(buf, [0xabu8; BLOCK_SIZE]);
        Ok(())
    }

    #[test]
    fn test_open_existing_rejects_ragged_image() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ragged.img");
        std::fs::write(&path, vec![0u8; BLOCK_SIZE + 1])?;
        let err = ImageFile::open_existing(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        Ok(())
    }

    #[test]
    fn test_borrowed_store() {
        fn fill<S: BlockStore>(mut store: S) {
            store.write_block(0, &[1u8; BLOCK_SIZE]).unwrap();
        }
        let mut store = MemoryStore::new(1);
        fill(&mut store);
        assert_eq!(&store.get_ref()[..BLOCK_SIZE], &[1u8; BLOCK_SIZE][..]);
    }
}
