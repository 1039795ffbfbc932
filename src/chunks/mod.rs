mod bytes_chunk;
mod chunk;
mod pool;
mod profile_chunk;

pub use bytes_chunk::*;
pub use chunk::*;
pub use pool::*;
pub use profile_chunk::*;
