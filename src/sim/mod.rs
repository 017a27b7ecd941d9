pub mod event;
pub mod index;
pub mod level;
pub mod step;
pub mod world;
