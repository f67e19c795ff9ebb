//! Listener registry for named events.
//!
//! Listeners are registered either under an exact event name or under the
//! wildcard key, which sees every event. Each list keeps insertion order,
//! and that order is the invocation order.
//!
//! [`ListenerRegistry`] is the plain owned data structure. [`Events`] is the
//! cloneable handle shared between an application and the decoder that
//! feeds it.

pub mod error;
pub mod events;
pub mod payload;
pub mod registry;

pub use error::{RegistryError, Result};
pub use events::Events;
pub use payload::{Event, Payload};
pub use registry::{Batch, Callback, EventKey, ListenerId, ListenerRegistry};
