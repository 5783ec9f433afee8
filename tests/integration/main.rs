//! End-to-end tests against mock sites and a mock embedding backend

mod crawl_tests;
mod support;
