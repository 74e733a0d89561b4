//! Weekly digest pipeline: topic matching, localization, composition and
//! per-channel delivery.

pub mod compose;
pub mod dispatch;
pub mod i18n;
pub mod matcher;
pub mod translate;
pub mod window;
