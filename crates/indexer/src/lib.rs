//! Explorer polling core: fetch → filter → dispatch → commit, one task per channel.

pub mod dedup;
pub mod explorer;
pub mod poller;
pub mod progress;
pub mod scheduler;
