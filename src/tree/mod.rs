pub mod builder;
pub mod promotion;
pub mod tree;
