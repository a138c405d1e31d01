//! Page hydration and preview integration tests.

mod support;
mod hydration;
mod preview;
mod legacy;

#[cfg(feature = "http")]
mod http;
