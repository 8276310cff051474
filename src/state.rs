//! Controller state: the single aggregate protected by one mutex.
//!
//! Every session, subscription, batch, VIN, and I/O field lives here.
//! Handlers must finish mutating the lock and copy out whatever they need
//! to emit *before* releasing it — sends happen after the guard drops, per
//! the compute-under-lock-then-send discipline in the design notes.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::io_relay::IoState;
use crate::pset::{Pset, ALLOWED_PSET_IDS};
use crate::vin::Vin;

/// Durable-for-the-session interest in a push stream.
#[derive(Debug, Clone, Copy)]
pub struct Subscription {
    pub active: bool,
    pub revision: u32,
    pub no_ack: bool,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            active: false,
            revision: 1,
            no_ack: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    pub vin: Subscription,
    pub result: Subscription,
    pub pset: Subscription,
    pub multi_spindle: Subscription,
}

/// Controller identification fields reported in the MID 0002 start ack.
#[derive(Debug, Clone)]
pub struct Identification {
    pub cell_id: u32,
    pub channel_id: u8,
    pub name: String,
    pub supplier_code: u32,
    pub system_software_version: String,
    pub controller_software_version: String,
    pub tool_software_version: String,
    pub rbu_type: String,
    pub controller_serial: String,
    pub system_type: String,
    pub system_subtype: String,
    pub seq_num_support: u8,
    pub link_support: u8,
    pub station_id: String,
    pub station_name: String,
    pub client_id: u8,
}

impl Default for Identification {
    fn default() -> Self {
        Self {
            cell_id: 1,
            channel_id: 1,
            name: "OpenProtocolSim".to_string(),
            supplier_code: 1,
            system_software_version: "1.0.0".to_string(),
            controller_software_version: "1.0.0".to_string(),
            tool_software_version: "1.0.0".to_string(),
            rbu_type: String::new(),
            controller_serial: "SN00000000".to_string(),
            system_type: "SIM".to_string(),
            system_subtype: String::new(),
            seq_num_support: 0,
            link_support: 0,
            station_id: "0001".to_string(),
            station_name: "Station".to_string(),
            client_id: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Batch {
    pub counter: u32,
}

impl Batch {
    /// `true` once `counter` has reached `target` (target 0 disables batching).
    pub fn is_complete(&self, target: u32) -> bool {
        target > 0 && self.counter >= target
    }

    pub fn status(&self, target: u32) -> u8 {
        if self.is_complete(target) {
            1
        } else {
            0
        }
    }
}

const TIGHTENING_ID_MODULUS: u64 = 10_000_000_000;
const SYNC_TIGHTENING_ID_MODULUS: u32 = 65_536;

/// Tool identification reported by MID 0041. Distinct from
/// [`Identification`] (the controller's own MID 0002 identity) because a
/// real cell can swap tools independently of the controller.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    pub serial_number: String,
    pub last_calib_date: String,
    pub calib_value: u32,
    pub last_service_date: String,
    pub tightenings_since_service: u64,
    pub tool_type: u8,
    pub motor_size: u32,
    pub open_end_data: String,
}

impl Default for ToolInfo {
    fn default() -> Self {
        Self {
            serial_number: "TOOL0000000000".to_string(),
            last_calib_date: "2025-01-01".to_string(),
            calib_value: 10_000,
            last_service_date: "2025-01-01".to_string(),
            tightenings_since_service: 0,
            tool_type: 1,
            motor_size: 100,
            open_end_data: String::new(),
        }
    }
}

pub struct ControllerState {
    pub identification: Identification,
    pub tool: ToolInfo,
    pub session_active: bool,
    pub tool_enabled: bool,
    pub auto_loop_enabled: bool,
    pub auto_loop_interval_secs: u64,
    pub nok_probability: f64,

    pub subscriptions: Subscriptions,
    pub relay_subscriptions: HashMap<u16, bool>,

    pub psets: HashMap<String, Pset>,
    pub current_pset: String,
    pub pset_change_time: NaiveDateTime,
    pub ok_counter: u32,
    pub batch: Batch,

    pub vin: Vin,
    pub vin_identifier_part2: String,
    pub vin_identifier_part3: String,
    pub vin_identifier_part4: String,
    pub controller_time: NaiveDateTime,

    pub tightening_id: u64,
    pub sync_tightening_id: u32,
    pub tool_lifetime_tightenings: u64,
    pub num_spindles: u8,

    pub io: IoState,
}

impl ControllerState {
    pub fn new() -> Self {
        let epoch = NaiveDateTime::parse_from_str("2000-01-01 00:00:00", "%Y-%m-%d %H:%M:%S")
            .expect("static epoch parses");
        Self {
            identification: Identification::default(),
            tool: ToolInfo::default(),
            session_active: false,
            tool_enabled: true,
            auto_loop_enabled: true,
            auto_loop_interval_secs: 20,
            nok_probability: 0.0,
            subscriptions: Subscriptions::default(),
            relay_subscriptions: HashMap::new(),
            psets: HashMap::new(),
            current_pset: "0".to_string(),
            pset_change_time: epoch,
            ok_counter: 0,
            batch: Batch::default(),
            vin: Vin::parse("AB123000"),
            vin_identifier_part2: String::new(),
            vin_identifier_part3: String::new(),
            vin_identifier_part4: String::new(),
            controller_time: epoch,
            tightening_id: 0,
            sync_tightening_id: 0,
            tool_lifetime_tightenings: 0,
            num_spindles: 2,
            io: IoState::new(),
        }
    }

    pub fn next_sync_tightening_id(&mut self) -> u32 {
        self.sync_tightening_id = (self.sync_tightening_id + 1) % SYNC_TIGHTENING_ID_MODULUS;
        self.sync_tightening_id
    }

    /// The parameters to simulate against: the selected Pset if one is
    /// selected and known, else the global defaults.
    pub fn active_pset_params(&self) -> Pset {
        if self.current_pset == "0" {
            return Pset::default();
        }
        self.psets
            .get(&self.current_pset)
            .copied()
            .unwrap_or_default()
    }

    /// Reset everything a session transition (MID 0003, disconnect, I/O
    /// error) must clear: subscriptions, relay subscriptions, and session
    /// activity. Pset table, VIN, and batch counters survive — they're
    /// process-lifetime, per the data model.
    pub fn end_session(&mut self) {
        self.session_active = false;
        self.subscriptions = Subscriptions::default();
        self.relay_subscriptions.clear();
    }

    /// Reset per-session counters on a freshly accepted connection.
    pub fn start_session(&mut self) {
        self.tightening_id = 0;
        self.batch = Batch::default();
        self.tool_enabled = true;
        self.auto_loop_enabled = true;
    }

    pub fn next_tightening_id(&mut self) -> u64 {
        self.tightening_id = (self.tightening_id + 1) % TIGHTENING_ID_MODULUS;
        self.tightening_id
    }

    pub fn select_pset(&mut self, id: &str, now: NaiveDateTime) {
        self.current_pset = id.to_string();
        self.pset_change_time = now;
        self.ok_counter = 0;
    }

    pub fn deselect_pset(&mut self, now: NaiveDateTime) {
        self.select_pset("0", now);
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `id` is an identifier a controller will accept for MID 0018.
pub fn is_known_pset_table_id(id: &str) -> bool {
    ALLOWED_PSET_IDS.contains(&id)
}
