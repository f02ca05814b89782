pub mod item;
pub mod item_model;

pub use item::*;
pub use item_model::*;
