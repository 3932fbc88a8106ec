//! Stack activities: single operations against the provisioning backend

pub mod create_stack;
pub mod find_network_stack;
pub mod format_event;
pub mod poll_stack;

pub use create_stack::create_stack;
pub use find_network_stack::find_network_stack;
pub use format_event::{format_event, parse_event_line};
pub use poll_stack::{poll_until_terminal, EventCursor};
