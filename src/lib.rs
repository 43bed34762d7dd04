//! A small Unix-style inode filesystem on top of a fixed-size block store.
//!
//! ```
//! use inodefs::{block_store::MemoryStore, mkfs::format, FileSystem};
//!
//! let mut store = MemoryStore::new(200);
//! format(&mut store).unwrap();
//!
//! let mut fs = FileSystem::new();
//! fs.mount(&mut store).unwrap();
//! let inode = fs.create().unwrap();
//! fs.write(inode, b"hello", 0).unwrap();
//!
//! let mut buf = [0u8; 5];
//! assert_eq!(fs.read(inode, &mut buf, 0).unwrap(), 5);
//! assert_eq!(&buf, b"hello");
//! fs.unmount();
//! ```
pub mod block_store;
pub mod cli_interface;
mod fs;
pub mod mkfs;
pub mod utils;
pub use fs::*;
