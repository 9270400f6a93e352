//! Client-side synchronization core: clock math, score cache, countdown
//! engine, and match progression, glued together by a per-session dispatch
//! loop over an abstract transport.

pub mod clock;
pub mod coordinator;
pub mod counter_store;
pub mod countdown;
pub mod events;
pub mod match_flow;
pub mod session;
pub mod timer_engine;

pub use self::clock::{SystemClock, WallClock};
pub use self::events::{EventHub, SessionEvent};
pub use self::match_flow::{MatchPhase, Winner};
pub use self::session::{ScoreboardSession, SessionConfig};
