//! Test fixtures for quill's testsuite.

pub mod mock;
