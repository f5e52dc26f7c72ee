// AKE module declarations

pub mod messages;
pub mod protocol;
pub mod state;

pub use messages::AkeMessage;
pub use protocol::{AkeEngine, AkeStep, SessionKeys};
pub use state::{AuthState, MsgState};
