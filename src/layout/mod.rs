pub mod grid;

pub use grid::{Flow, GridLayout, Rect};
