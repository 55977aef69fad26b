pub mod bitset;
pub mod codec;
