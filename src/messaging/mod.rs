pub mod event;
pub mod router;

pub use event::{ClientFrame, KindProbe, ServerEvent, SessionNotice, TopicEvent};
pub use router::MessageRouter;
