//! Test suites for the bridge client.

mod support;
mod unit;
