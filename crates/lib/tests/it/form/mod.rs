//! Form controller integration tests
//!
//! This module tests the reactive form controller: registration and field
//! events, element bindings, validation modes, submission, resets, field
//! arrays and state subscriptions. Tests are organized by operation.

mod arrays;
mod helpers;
mod register;
mod submit;
mod subscriptions;
mod validation;
