//! Display-side polling: the counterpart of the snapshot server.

pub mod backoff;
pub mod client;
pub mod model;
pub mod poller;

pub use backoff::{Backoff, BackoffPolicy, LinkHealth};
pub use client::{PollClient, PollError};
pub use model::{DisplayEvent, DisplayModel};
pub use poller::{Poller, PollerExit};
