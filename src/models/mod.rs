//! Payload models handed to the document and table stores.

mod item;
mod table_entity;

pub use item::*;
pub use table_entity::*;
