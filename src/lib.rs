//! Voice Match - interest-based voice matchmaking service
//!
//! Pairs connected users who share interest tags into timed one-to-one
//! voice sessions, drives each session's countdown and cleans up when a
//! participant leaves or disconnects.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
