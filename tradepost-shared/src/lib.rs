#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(clippy::pedantic)]

//! Wire models and client configuration shared by the Tradepost messaging
//! core and its front ends.

pub mod config;
pub mod models;
