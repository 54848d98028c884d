//! # SMS Failover
//!
//! Two strategies for spreading sends over several providers:
//!
//! - [`FailoverSmsService`] rotates the starting provider on every call and
//!   walks the whole list until one provider accepts the message.
//! - [`TimeoutFailoverSmsService`] sticks to one active provider and only moves
//!   on after a run of consecutive timeouts.
//!
//! Both keep their rotation state in atomics owned by the instance, so
//! concurrent sends never block each other.

mod round_robin;
mod timeout;

pub use round_robin::FailoverSmsService;
pub use timeout::TimeoutFailoverSmsService;
