//! Subscriber-facing endpoints: topic listing, subscribe, dashboard,
//! preferences, manual send and the Kakao account link.

pub mod handlers;
