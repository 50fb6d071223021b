//! Turn state machine
//!
//! Pure transitions in the Elm style: given the stored state and an event,
//! produce the next state and an ordered list of effects. The runtime
//! executes the effects and feeds results back in as events, so a turn that
//! acknowledges feedback and then answers is a flat loop rather than a
//! recursive call.

mod effect;
mod event;
mod state;
mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{TurnContext, TurnState};
pub use transition::{transition, TransitionError};
