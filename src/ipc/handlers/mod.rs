pub mod core;
pub mod nodes;
pub mod selection;
pub mod tree;
