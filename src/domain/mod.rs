pub mod contact;
pub mod entity;
pub mod flags;
pub mod physics;
pub mod rect;
pub mod tile;
