#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

mod ai;
mod bitboard;
mod board;
mod common;
mod config;
mod finalize;
mod game;
mod rules;
mod ship;
#[cfg(feature = "std")]
mod logging;
#[cfg(feature = "std")]
pub mod orchestrator;
#[cfg(feature = "std")]
pub mod protocol;
#[cfg(feature = "std")]
pub mod services;
#[cfg(feature = "std")]
pub mod sync;

pub use ai::*;
pub use bitboard::{BitBoard, BitBoardError, CellMask};
pub use board::*;
pub use common::*;
pub use config::*;
pub use finalize::Finalizer;
pub use game::*;
pub use rules::*;
pub use ship::*;
#[cfg(feature = "std")]
pub use logging::init_logging;
#[cfg(feature = "std")]
pub use orchestrator::{
    run_bot, AiMatch, AiMatchConfig, GuestMatch, GuestMatchConfig, MatchError, MatchSnapshot,
    RemoteMatch, RemoteMatchConfig,
};
#[cfg(feature = "std")]
pub use sync::{InMemoryChannel, PresenceMonitor, SyncChannel};
