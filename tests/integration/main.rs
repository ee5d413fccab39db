//! Integration tests for ripple-crawl
//!
//! These tests use wiremock to stand up mock HTTP servers and drive the
//! reqwest transport and the scheduler end to end.

mod crawl_tests;
mod transport_tests;
