//! Address-range allocation shared by the disk (swap pages) and MMU
//! (physical pages).

pub mod freelist;

pub use freelist::{Block, FreeBlockList};
