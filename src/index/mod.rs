pub mod document;
pub mod inverted;
pub mod keyword;
