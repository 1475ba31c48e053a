pub mod block_store;
pub mod cli_interface;
mod fs;
pub mod mkfs;
pub mod mount;
pub mod utils;
pub use fs::*;
