//! Durable record of flagged question/answer pairs for human review.

mod store;

pub use store::{FlagSink, FlaggedRecord, SqliteFlagStore, StoreError};
