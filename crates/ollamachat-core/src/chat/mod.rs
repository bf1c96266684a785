mod controller;
mod events;

pub use controller::{ChatController, ControllerOptions};
pub use events::{ChatEvent, TurnState, TurnStatus};
