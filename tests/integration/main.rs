//! Integration test driver for `tests/integration/` submodules.
//!
//! Each `mod` below maps to a file that exercises the link core
//! against the mock radio. All tests run on the host with no real
//! Bluetooth controller required.

mod link_lifecycle_tests;
mod mock_radio;
