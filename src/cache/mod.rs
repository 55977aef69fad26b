pub mod generational;
