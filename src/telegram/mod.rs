//! Telegram front end: long-poll dispatch, per-message jobs, delivery.

pub mod action;
pub mod dispatcher;
pub mod handler;
pub mod send;
pub mod tasks;

pub use dispatcher::UpdateDispatcher;
