//! # Scheduler
//!
//! The outermost control loop. Everything else in the crate runs inside a
//! callback this module invokes: inbound notifications, user input, and
//! alarms (handshake timeouts, keep-alive, chain refresh).
//!
//! - [`timer`]: one-shot alarms with cancellation by handle.
//! - [`event_loop`]: the cooperative loop and the [`EventHandler`] contract.

pub mod event_loop;
pub mod timer;

pub use event_loop::{EventHandler, EventLoop, IdleCallback, LoopControl};
pub use timer::{TimerHandle, TimerQueue};
