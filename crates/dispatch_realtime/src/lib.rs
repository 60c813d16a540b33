pub mod adapters;
pub mod events;
pub mod hub;
pub mod session;

mod approval;
mod offer;
mod room;
mod simulate;
