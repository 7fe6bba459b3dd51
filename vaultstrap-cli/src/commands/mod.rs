pub mod cleanup;
pub mod create;
pub mod runs;
