mod assembler;
mod context;
mod observer;

pub use assembler::ResponseTurn;
pub use context::{ChatContext, Rejection, SubmitOutcome};
pub use observer::{NoopObserver, ResponseObserver, ResponseUpdate};
