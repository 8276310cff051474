//! Open Protocol tightening-tool controller simulator.
//!
//! [`codec`] frames the wire protocol; [`mids`] holds the per-MID handler
//! table dispatched by [`session::SessionController`]; [`simulator`]
//! produces the tightening results those handlers subscribe to; and
//! [`persistence`] loads and saves the Pset table and controller profiles
//! that [`revision::RevisionRegistry`] and [`state::ControllerState`] are
//! seeded from.

pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod fields;
pub mod io_relay;
pub mod mids;
pub mod persistence;
pub mod profile;
pub mod pset;
pub mod revision;
pub mod session;
pub mod simulator;
pub mod state;
pub mod vin;
