mod cache;
mod record;

pub use cache::{SessionCache, SESSIONS_KEY};
pub use record::{SessionRecord, TaskId};
