//! # Binary-Side Test Suite
//!
//! End-to-end tests that exercise the library the way the binary wires it:
//! scripted byte streams through the full reconstruction loop, checked
//! against the rendered emissions.

mod pipeline_tests;
