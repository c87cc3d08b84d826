#![allow(dead_code)]

pub mod breaker;
