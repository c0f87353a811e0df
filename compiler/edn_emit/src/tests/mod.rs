//! Whole-function emission scenarios.


mod control_flow_tests;
mod matching_tests;
mod scope_tests;
