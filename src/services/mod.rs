//! Service layer: intent routing, snapshot dispatch, and periodic timers.

pub mod dispatch;
pub mod router;
pub mod ticker;
