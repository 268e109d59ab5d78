//! Core模块 - 归属规则与并发扫描

pub mod models;
pub mod errors;
pub mod pattern;
pub mod rule_engine;
pub mod baseline;
pub mod cancel;
pub mod scanner;
