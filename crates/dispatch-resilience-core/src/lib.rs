//! Core types for dispatch-resilience.
//!
//! A *dispatch* sends a templated payload to a set of recipients through a
//! pluggable backend such as an SMS gateway, a push service, or an email
//! relay. Every backend and every resilience decorator implements the same
//! capability, `tower::Service<Dispatch<T>, Error = DispatchError>`, so
//! decorators stack in any order:
//!
//! - [`Dispatch`]: the request (template, arguments, recipients, caller context)
//! - [`DispatchContext`]: the caller's cancellation and deadline budget
//! - [`DispatchError`]: the one error type every layer returns
//! - [`events`]: listener plumbing used by the decorators for observability

pub mod context;
pub mod error;
pub mod events;
pub mod request;

pub use context::DispatchContext;
pub use error::{BoxError, DispatchError, SharedError};
pub use events::{EventListener, EventListeners, FnListener, ResilienceEvent};
pub use request::Dispatch;
