//! tubebot: Telegram frontend of the YouTube downloader.
//!
//! The download machinery lives in `tubecore`; this crate wires it to
//! Telegram, runs the worker loop and provides the command line.

pub mod cli;
pub mod telegram;
pub mod worker;
