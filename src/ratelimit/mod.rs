//! Rate limiting logic and state management.

mod clock;
mod decision;
mod key;
mod limiter;
mod quota;
mod rules;
mod state;
mod store;

pub mod housekeeping;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decision::Decision;
pub use key::RateLimitKey;
pub use limiter::RateLimiter;
pub use quota::Quota;
pub use rules::{PolicyConfig, PolicyTable, RateLimitRule, RateLimitRules, TimeUnit};
pub use state::RateLimitState;
pub use store::{MemoryStore, RateLimitStore};
