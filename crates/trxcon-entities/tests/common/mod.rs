#![allow(dead_code)]

pub mod bursts;
pub mod component_test;
pub mod mock_trx;
pub mod sink;

pub use component_test::{ComponentTest, default_test_config};
