// src/game/mod.rs
// Garden simulation: collectibles, ambient creatures, the player and the per-frame tick

pub mod collection;
pub mod entity_state;
pub mod kinds;
pub mod player;
pub mod registry;
pub mod scheduler;
pub mod shopping_list;
pub mod wander;

pub use registry::SessionRegistry;
pub use scheduler::GardenSession;
pub use shopping_list::{ShoppingList, ShoppingListSnapshot};
