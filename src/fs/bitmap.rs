use bitvec::prelude::*;
use log::debug;

/// in-memory record of which blocks are in use, one bit per block
#[derive(Debug, Default, Clone)]
pub struct FreeBlockMap {
    bitmap: BitVec<u8, Lsb0>,
}

impl FreeBlockMap {
    /// a map of `blocks` blocks, all free
    pub fn new(blocks: u32) -> Self {
        Self {
            bitmap: bitvec![u8, Lsb0; 0; blocks as usize],
        }
    }

    /// check if block `i` is in use, out of range blocks are never in use
    pub fn is_used(&self, i: u32) -> bool {
        self.bitmap.get(i as usize).as_deref().unwrap_or(&false) == &true
    }

    /// calculate the number of free blocks
    pub fn free_blocks(&self) -> usize {
        self.bitmap.count_zeros()
    }

    /// mark block `i` as used, returns false when `i` is out of range
    pub fn occupy(&mut self, i: u32) -> bool {
        match self.bitmap.get_mut(i as usize) {
            Some(mut bit) => {
                *bit = true;
                true
            }
            None => false,
        }
    }

    /// mark block `i` as free, returns false when `i` is out of range
    pub fn release(&mut self, i: u32) -> bool {
        match self.bitmap.get_mut(i as usize) {
            Some(mut bit) => {
                *bit = false;
                debug!("released block {i}");
                true
            }
            None => false,
        }
    }

    /// allocate the lowest free block
    pub fn allocate(&mut self) -> Option<u32> {
        let index = self.bitmap.first_zero()?;
        self.bitmap.set(index, true);
        debug!("allocated block {index}");
        Some(index as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_used() {
        let mut map = FreeBlockMap::new(10);
        assert!(!map.is_used(0));
        assert!(map.occupy(9));
        assert!(map.is_used(9));
        assert!(!map.is_used(10));
        assert!(!map.occupy(10));
    }

    #[test]
    fn test_allocate() {
        // free space at the beginning
        let mut map = FreeBlockMap::new(15);
        assert_eq!(map.allocate(), Some(0));
        assert!(map.is_used(0));

        // free space in the middle
        let mut map = FreeBlockMap::new(15);
        (0..15).for_each(|i| {
            map.occupy(i);
        });
        map.release(9);
        assert_eq!(map.allocate(), Some(9));
        assert!(map.is_used(9));

        // free space at the end
        let mut map = FreeBlockMap::new(15);
        (0..14).for_each(|i| {
            map.occupy(i);
        });
        assert_eq!(map.allocate(), Some(14));
        assert_eq!(map.allocate(), None);
        assert_eq!(map.free_blocks(), 0);
    }

    #[test]
    fn test_release() {
        let mut map = FreeBlockMap::new(4);
        (0..4).for_each(|_| {
            map.allocate();
        });
        assert!(map.release(2));
        assert!(!map.release(4));
        assert_eq!(map.free_blocks(), 1);
        assert_eq!(map.allocate(), Some(2));
    }
}
