pub mod cluster;
pub mod stack;
pub mod templates;
