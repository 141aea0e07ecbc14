//! Cache-side consumers of model change notifications.

pub mod invalidation;
