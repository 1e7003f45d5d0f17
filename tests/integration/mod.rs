//! Integration test modules.

mod factory_test;
mod hours_test;
mod lifecycle_test;
mod persistence_test;
mod support;
