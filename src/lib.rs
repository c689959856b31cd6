//! Client for the rapid reef assessment service.
//!
//! The pure core (`assessment`, `intent`, `simulator`, `report`) derives
//! and adjusts assessment results without I/O. `backend` and `feed` talk to
//! the analysis server; `state` owns the session the user is looking at.

pub mod assessment;
pub mod backend;
pub mod chat;
pub mod console;
pub mod feed;
pub mod intent;
pub mod logging;
pub mod report;
pub mod simulator;
pub mod state;
pub mod upload;
