//! End-to-end tests against temporary project roots, with the external
//! tools replaced by in-process fakes.

mod audit;
mod build;
mod common;
mod properties;
