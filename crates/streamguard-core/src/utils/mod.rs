pub mod columns;
pub mod hasher;
