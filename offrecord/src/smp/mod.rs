// SMP module declarations

pub mod messages;
pub mod proof;
pub mod protocol;
pub mod state;

pub use messages::SmpMessage;
pub use protocol::{SmpContext, SmpEngine, SmpFailure, SmpOutcome, SmpStep};
pub use state::SmpState;
