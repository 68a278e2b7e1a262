//! # Event Bus Module
//!
//! Publish/subscribe hub that lets the job session, the telemetry poller,
//! and the settings store announce state changes without knowing who
//! listens (a CLI printer, a log sink, a UI shell).
//!
//! ## Usage
//!
//! ```rust
//! use muralkit_core::event_bus::{AppEvent, EventBus, EventCategory, EventFilter, JobEvent};
//!
//! let bus = EventBus::new();
//! let subscription = bus.subscribe(
//!     EventFilter::Categories(vec![EventCategory::Job]),
//!     |event| {
//!         if let AppEvent::Job(job) = event {
//!             println!("job event: {:?}", job);
//!         }
//!     },
//! );
//!
//! bus.publish(AppEvent::Job(JobEvent::Stopped));
//! bus.unsubscribe(subscription);
//! ```

mod bus;
mod events;

pub use bus::*;
pub use events::*;
