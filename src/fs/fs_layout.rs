//! what a mounted volume looks like in memory

use log::{debug, info, warn};

use crate::{
    block_store::BlockStore,
    fs::{read_block, read_inode_table, read_pointer_block, write_block, write_inode_table, write_pointer_block},
    utils::traits::OnDiskRecord,
};

use super::{
    FreeBlockMap, FsError, FsOptions, HoleMode, Inode, InodeTable, PointerBlock, Result,
    SuperBlock, BLOCK_SIZE, INODES_PER_BLOCK, MAX_FILE_SIZE, POINTERS_PER_BLOCK,
    POINTERS_PER_INODE,
};

const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

/// A filesystem session.
///
/// It starts out unmounted. [mount](FileSystem::mount) binds a formatted
/// [BlockStore] to it and every file operation then works on that store
/// until [unmount](FileSystem::unmount) hands the store back.
/// File operations on an unmounted session fail with [FsError::NotMounted].
///
/// To keep ownership of a store, mount `&mut store` instead of `store`.
#[derive(Debug)]
pub struct FileSystem<S> {
    volume: Option<Volume<S>>,
    options: FsOptions,
}

/// state that only exists while a volume is mounted
#[derive(Debug)]
struct Volume<S> {
    /// copy of block 0
    superblock: SuperBlock,
    /// rebuilt on every mount, never written to the store
    free_blocks: FreeBlockMap,
    store: S,
}

/// an inode together with the inode table block it lives in
struct LoadedInode {
    block: u32,
    slot: usize,
    table: InodeTable,
}

impl LoadedInode {
    fn inode(&self) -> &Inode {
        self.table.get(self.slot)
    }

    fn inode_mut(&mut self) -> &mut Inode {
        self.table.get_mut(self.slot)
    }
}

/// block and inode usage of a mounted volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeStats {
    pub blocks: u32,
    pub free_blocks: u32,
    pub inode_blocks: u32,
    pub inodes: u32,
}

impl<S> Default for FileSystem<S> {
    fn default() -> Self {
        Self {
            volume: None,
            options: FsOptions::default(),
        }
    }
}

impl<S> FileSystem<S> {
    /// an unmounted session with default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FsOptions) -> Self {
        Self {
            volume: None,
            options,
        }
    }

    pub fn options(&self) -> FsOptions {
        self.options
    }

    pub fn is_mounted(&self) -> bool {
        self.volume.is_some()
    }

    /// drop the bitmap and superblock and give the store back.
    /// does nothing when no volume is mounted
    pub fn unmount(&mut self) -> Option<S> {
        let volume = self.volume.take()?;
        info!(
            "unmounted volume of {} blocks, {} free",
            volume.superblock.blocks,
            volume.free_blocks.free_blocks()
        );
        Some(volume.store)
    }

    #[inline]
    pub fn superblock(&self) -> Result<&SuperBlock> {
        Ok(&self.volume()?.superblock)
    }

    pub fn stats(&self) -> Result<VolumeStats> {
        let volume = self.volume()?;
        Ok(VolumeStats {
            blocks: volume.superblock.blocks,
            free_blocks: volume.free_blocks.free_blocks() as u32,
            inode_blocks: volume.superblock.inode_blocks,
            inodes: volume.superblock.inodes,
        })
    }

    /// check whether block `block` is marked used in the free-block bitmap
    pub fn is_block_used(&self, block: u32) -> Result<bool> {
        Ok(self.volume()?.free_blocks.is_used(block))
    }

    #[inline]
    fn volume(&self) -> Result<&Volume<S>> {
        self.volume.as_ref().ok_or(FsError::NotMounted)
    }

    #[inline]
    fn volume_mut(&mut self) -> Result<&mut Volume<S>> {
        self.volume.as_mut().ok_or(FsError::NotMounted)
    }
}

impl<S> FileSystem<S>
where
    S: BlockStore,
{
    /// mount a formatted store.
    ///
    /// The superblock must carry our magic number and the block count of
    /// `store`. Any volume mounted before is unmounted first and its store
    /// dropped, call [unmount](Self::unmount) beforehand to get it back.
    /// On failure the session is left unmounted and `store` is dropped,
    /// so mount `&mut store` to keep using a store after a failed mount.
    pub fn mount(&mut self, mut store: S) -> Result<()> {
        self.unmount();

        let superblock = SuperBlock::decode(&read_block(&mut store, 0)?)?;
        if !superblock.is_magic_valid() {
            return Err(FsError::BadMagic {
                expected: super::FS_MAGIC,
                actual: superblock.magic,
            });
        }
        if superblock.blocks != store.capacity() {
            return Err(FsError::CapacityMismatch {
                recorded: superblock.blocks,
                actual: store.capacity(),
            });
        }
        superblock.check_layout()?;

        let free_blocks = scan_free_blocks(&mut store, &superblock)?;
        info!(
            "mounted volume of {} blocks, {} inodes, {} blocks free",
            superblock.blocks,
            superblock.inodes,
            free_blocks.free_blocks()
        );
        self.volume = Some(Volume {
            superblock,
            free_blocks,
            store,
        });
        Ok(())
    }

    /// claim the lowest free inode and return its number
    pub fn create(&mut self) -> Result<u32> {
        self.volume_mut()?.create()
    }

    /// release every block of inode `inode_number` and mark it free
    pub fn remove(&mut self, inode_number: u32) -> Result<()> {
        self.volume_mut()?.remove(inode_number)
    }

    /// the size in bytes of inode `inode_number`
    pub fn stat(&mut self, inode_number: u32) -> Result<u32> {
        let volume = self.volume_mut()?;
        Ok(volume.load_inode(inode_number)?.inode().size)
    }

    /// read up to `buf.len()` bytes starting at `offset`
    /// # Return
    /// the number of bytes copied into `buf`, 0 at or past the end of the file.
    /// how unwritten parts of the file are treated depends on [HoleMode]
    pub fn read(&mut self, inode_number: u32, buf: &mut [u8], offset: u64) -> Result<usize> {
        let hole_mode = self.options.hole_mode;
        self.volume_mut()?.read(inode_number, buf, offset, hole_mode)
    }

    /// write `data` starting at `offset`, allocating blocks as needed
    /// # Return
    /// the number of bytes written, which is less than `data.len()` only
    /// when the write runs into [MAX_FILE_SIZE]
    pub fn write(&mut self, inode_number: u32, data: &[u8], offset: u64) -> Result<usize> {
        self.volume_mut()?.write(inode_number, data, offset)
    }

    /// take the lowest free block off the free-block bitmap
    pub fn alloc_block(&mut self) -> Result<u32> {
        self.volume_mut()?.alloc_block()
    }
}

/// rebuild the free-block bitmap of a volume.
///
/// block 0, the inode table and every block reachable from a valid inode
/// end up marked as used
fn scan_free_blocks<D>(store: &mut D, superblock: &SuperBlock) -> Result<FreeBlockMap>
where
    D: BlockStore + ?Sized,
{
    let mut free_blocks = FreeBlockMap::new(superblock.blocks);
    free_blocks.occupy(0);
    for block in superblock.inode_table() {
        free_blocks.occupy(block);
    }

    let mark = |free_blocks: &mut FreeBlockMap, inode_number: u32, block: u32| {
        if superblock.is_data_block(block) {
            free_blocks.occupy(block);
        } else {
            warn!("inode {inode_number} points at block {block} outside the data region");
        }
    };

    for table_block in superblock.inode_table() {
        let first_inode = (table_block - 1) * INODES_PER_BLOCK;
        let slots = superblock.inodes.saturating_sub(first_inode).min(INODES_PER_BLOCK);
        let table = read_inode_table(store, table_block)?;
        for (slot, inode) in table.iter().enumerate().take(slots as usize) {
            if !inode.is_valid() {
                continue;
            }
            let inode_number = first_inode + slot as u32;
            for block in inode.direct_blocks() {
                mark(&mut free_blocks, inode_number, block);
            }
            if inode.indirect == 0 {
                continue;
            }
            mark(&mut free_blocks, inode_number, inode.indirect);
            if superblock.is_data_block(inode.indirect) {
                for block in read_pointer_block(store, inode.indirect)?.allocated() {
                    mark(&mut free_blocks, inode_number, block);
                }
            }
        }
    }
    Ok(free_blocks)
}

/// [Inode] operations
impl<S> Volume<S>
where
    S: BlockStore,
{
    fn load_inode(&mut self, inode_number: u32) -> Result<LoadedInode> {
        if inode_number >= self.superblock.inodes {
            return Err(FsError::InvalidInode(inode_number));
        }
        let (block, slot) = Inode::locate(inode_number);
        let table = read_inode_table(&mut self.store, block)?;
        let loaded = LoadedInode { block, slot, table };
        if !loaded.inode().is_valid() {
            return Err(FsError::InvalidInode(inode_number));
        }
        Ok(loaded)
    }

    #[inline]
    fn save_inode(&mut self, loaded: &LoadedInode) -> Result<()> {
        write_inode_table(&mut self.store, loaded.block, &loaded.table)
    }

    fn create(&mut self) -> Result<u32> {
        let SuperBlock { inodes, .. } = self.superblock;
        for table_block in self.superblock.inode_table() {
            let first_inode = (table_block - 1) * INODES_PER_BLOCK;
            if first_inode >= inodes {
                break;
            }
            // one damaged table block must not stop every other file from being created
            let mut table = match read_inode_table(&mut self.store, table_block) {
                Ok(table) => table,
                Err(e) => {
                    warn!("skipping inode table block {table_block}: {e}");
                    continue;
                }
            };
            let slots = (inodes - first_inode).min(INODES_PER_BLOCK) as usize;
            let Some(slot) = table.iter().take(slots).position(|inode| !inode.is_valid()) else {
                continue;
            };
            *table.get_mut(slot) = Inode::new();
            write_inode_table(&mut self.store, table_block, &table)?;

            let inode_number = first_inode + slot as u32;
            debug!("created inode {inode_number}");
            return Ok(inode_number);
        }
        Err(FsError::NoFreeInode)
    }

    fn remove(&mut self, inode_number: u32) -> Result<()> {
        let mut loaded = self.load_inode(inode_number)?;
        let inode = *loaded.inode();

        for block in inode.direct_blocks() {
            self.release_block(inode_number, block);
        }
        if inode.indirect != 0 {
            // a damaged pointer into the inode table must never be zeroed
            if self.superblock.is_data_block(inode.indirect) {
                let pointers = read_pointer_block(&mut self.store, inode.indirect)?;
                for block in pointers.allocated() {
                    self.release_block(inode_number, block);
                }
                write_pointer_block(&mut self.store, inode.indirect, &PointerBlock::empty())?;
            }
            self.release_block(inode_number, inode.indirect);
        }

        // bits released above stay released even if this write fails
        *loaded.inode_mut() = Inode::default();
        self.save_inode(&loaded)?;
        debug!("removed inode {inode_number}");
        Ok(())
    }
}

/// data block operations
impl<S> Volume<S>
where
    S: BlockStore,
{
    fn alloc_block(&mut self) -> Result<u32> {
        self.free_blocks.allocate().ok_or(FsError::NoFreeBlock)
    }

    fn release_block(&mut self, inode_number: u32, block: u32) {
        if self.superblock.is_data_block(block) {
            self.free_blocks.release(block);
        } else {
            warn!("inode {inode_number} points at block {block} outside the data region, not releasing it");
        }
    }

    /// pass a pointer found in inode `inode_number` through, 0 included,
    /// unless it points outside the data region
    fn check_pointer(&self, inode_number: u32, block: u32) -> Result<u32> {
        if block == 0 || self.superblock.is_data_block(block) {
            Ok(block)
        } else {
            Err(FsError::BadBlockPointer {
                inode: inode_number,
                block,
            })
        }
    }

    /// the block holding byte `file_block * BLOCK_SIZE` of the file, 0 for a hole
    fn find_data_block(
        &mut self,
        inode_number: u32,
        inode: &Inode,
        file_block: usize,
        indirect: &mut Option<PointerBlock>,
    ) -> Result<u32> {
        if file_block < POINTERS_PER_INODE {
            return self.check_pointer(inode_number, inode.direct[file_block]);
        }
        let index = file_block - POINTERS_PER_INODE;
        if index >= POINTERS_PER_BLOCK || inode.indirect == 0 {
            return Ok(0);
        }
        if let Some(pointers) = indirect {
            return self.check_pointer(inode_number, pointers.get(index));
        }
        self.check_pointer(inode_number, inode.indirect)?;
        let pointers = read_pointer_block(&mut self.store, inode.indirect)?;
        let block = pointers.get(index);
        *indirect = Some(pointers);
        self.check_pointer(inode_number, block)
    }

    /// like [find_data_block](Self::find_data_block) but fills holes with
    /// freshly allocated blocks.
    /// # Return
    /// the block and whether it was just allocated
    fn map_data_block(
        &mut self,
        inode_number: u32,
        inode: &mut Inode,
        file_block: usize,
        indirect: &mut Option<PointerBlock>,
    ) -> Result<(u32, bool)> {
        if file_block < POINTERS_PER_INODE {
            return match self.check_pointer(inode_number, inode.direct[file_block])? {
                0 => {
                    let block = self.alloc_block()?;
                    inode.direct[file_block] = block;
                    Ok((block, true))
                }
                block => Ok((block, false)),
            };
        }

        let index = file_block - POINTERS_PER_INODE;
        if self.check_pointer(inode_number, inode.indirect)? == 0 {
            let block = self.alloc_block()?;
            let pointers = PointerBlock::empty();
            write_pointer_block(&mut self.store, block, &pointers)?;
            inode.indirect = block;
            *indirect = Some(pointers);
        }
        let mut pointers = match indirect.take() {
            Some(pointers) => pointers,
            None => read_pointer_block(&mut self.store, inode.indirect)?,
        };
        let mapped = match self.check_pointer(inode_number, pointers.get(index))? {
            0 => {
                let block = self.alloc_block()?;
                pointers.set(index, block);
                write_pointer_block(&mut self.store, inode.indirect, &pointers)?;
                (block, true)
            }
            block => (block, false),
        };
        *indirect = Some(pointers);
        Ok(mapped)
    }
}

/// read and write file contents
impl<S> Volume<S>
where
    S: BlockStore,
{
    fn read(
        &mut self,
        inode_number: u32,
        buf: &mut [u8],
        offset: u64,
        hole_mode: HoleMode,
    ) -> Result<usize> {
        let inode = *self.load_inode(inode_number)?.inode();
        let size = inode.size as u64;
        if offset >= size {
            return Ok(0);
        }
        let should_read = (size - offset).min(buf.len() as u64) as usize;

        let mut indirect = None;
        let mut block = [0u8; BLOCK_SIZE];
        let mut position = 0;
        let mut total_read = 0;
        while position < should_read {
            let file_offset = offset + position as u64;
            let file_block = (file_offset / BLOCK_SIZE_U64) as usize;
            let offset_in_block = (file_offset % BLOCK_SIZE_U64) as usize;
            let len = (BLOCK_SIZE - offset_in_block).min(should_read - position);
            let dst = &mut buf[position..position + len];

            match self.find_data_block(inode_number, &inode, file_block, &mut indirect)? {
                0 => {
                    if hole_mode == HoleMode::ZeroFill {
                        dst.fill(0);
                        total_read += len;
                    }
                }
                data_block => {
                    self.store
                        .read_block(data_block, &mut block)
                        .map_err(FsError::io(data_block))?;
                    dst.copy_from_slice(&block[offset_in_block..offset_in_block + len]);
                    total_read += len;
                }
            }
            position += len;
        }
        Ok(total_read)
    }

    fn write(&mut self, inode_number: u32, data: &[u8], offset: u64) -> Result<usize> {
        let mut loaded = self.load_inode(inode_number)?;
        if offset >= MAX_FILE_SIZE {
            return Ok(0);
        }
        let should_write = (MAX_FILE_SIZE - offset).min(data.len() as u64) as usize;

        // blocks allocated here stay allocated if anything below fails
        let mut inode = *loaded.inode();
        let mut indirect = None;
        let mut block = [0u8; BLOCK_SIZE];
        let mut total_written = 0;
        while total_written < should_write {
            let file_offset = offset + total_written as u64;
            let file_block = (file_offset / BLOCK_SIZE_U64) as usize;
            let offset_in_block = (file_offset % BLOCK_SIZE_U64) as usize;
            let len = (BLOCK_SIZE - offset_in_block).min(should_write - total_written);

            let (data_block, fresh) =
                self.map_data_block(inode_number, &mut inode, file_block, &mut indirect)?;
            if fresh {
                // never expose what the block's previous owner left behind
                block.fill(0);
            } else if len < BLOCK_SIZE {
                self.store
                    .read_block(data_block, &mut block)
                    .map_err(FsError::io(data_block))?;
            }
            block[offset_in_block..offset_in_block + len]
                .copy_from_slice(&data[total_written..total_written + len]);
            write_block(&mut self.store, data_block, &block)?;
            total_written += len;
        }

        let end = offset + total_written as u64;
        inode.adjust_size(end as u32);
        if inode != *loaded.inode() {
            *loaded.inode_mut() = inode;
            self.save_inode(&loaded)?;
        }
        Ok(total_written)
    }
}
