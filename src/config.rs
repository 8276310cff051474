//! Command-line configuration for the simulator binary.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "toolsim")]
#[command(version)]
#[command(about = "Simulates an Open Protocol tightening tool controller")]
pub struct Cli {
    /// TCP port to listen on.
    #[arg(long, default_value_t = 4545)]
    pub port: u16,

    /// Controller name reported in identification payloads and used to
    /// namespace the on-disk Pset store.
    #[arg(long, default_value = "OpenProtocolSim")]
    pub name: String,

    /// Controller profile to apply at startup — a built-in name
    /// (`legacy`, `pf6000-basic`, `pf6000-full`) or the name of a profile
    /// saved under the config directory.
    #[arg(long, default_value = "pf6000-full")]
    pub profile: String,

    /// Probability (0.0-1.0) that a simulated tightening comes out NOK.
    #[arg(long, default_value_t = 0.0)]
    pub nok_probability: f64,

    /// Seconds between automatic result emissions while a session is
    /// subscribed to results and the auto-loop is enabled.
    #[arg(long, default_value_t = 20)]
    pub auto_loop_interval: u64,
}
