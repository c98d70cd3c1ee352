pub mod hot_swap;
pub mod lifecycle;
