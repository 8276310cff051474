//! Revision-tiered payload builders for every outbound MID.
//!
//! Each builder takes the revision actually negotiated for its stream and
//! the data needed to fill every tier up to that revision; fields beyond
//! the negotiated revision are simply never appended (see
//! [`crate::fields::build_payload`]).

use chrono::NaiveDateTime;

use crate::fields::{num, text, build_payload, Tagged};
use crate::io_relay::Slot;
use crate::state::{Identification, ToolInfo};

const TIMESTAMP_FMT: &str = "%Y-%m-%d:%H:%M:%S";

pub fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FMT).to_string()
}

/// MID 0002: communication start acknowledge. Max rev 6.
pub fn build_mid0002(revision: u32, ident: &Identification) -> String {
    let fields = vec![
        Tagged::new(1, 1, num(ident.cell_id, 4)),
        Tagged::new(2, 1, num(ident.channel_id, 2)),
        Tagged::new(3, 1, text(&ident.name, 25)),
        Tagged::new(4, 2, num(ident.supplier_code, 3)),
        Tagged::new(5, 2, text(&ident.system_software_version, 19)),
        Tagged::new(6, 2, text(&ident.controller_software_version, 19)),
        Tagged::new(7, 2, text(&ident.tool_software_version, 19)),
        Tagged::new(8, 3, text(&ident.rbu_type, 24)),
        Tagged::new(9, 3, text(&ident.controller_serial, 10)),
        Tagged::new(10, 4, text(&ident.system_type, 10)),
        Tagged::new(11, 4, text(&ident.system_subtype, 10)),
        Tagged::new(12, 5, num(ident.seq_num_support, 1)),
        Tagged::new(13, 5, num(ident.link_support, 1)),
        Tagged::new(14, 5, text(&ident.station_id, 10)),
        Tagged::new(15, 5, text(&ident.station_name, 25)),
        Tagged::new(16, 6, num(ident.client_id, 1)),
    ];
    build_payload(revision, &fields)
}

/// MID 0004: error. Untagged — just the raw fixed-width fields. Max rev 3.
pub fn build_mid0004(revision: u32, failing_mid: u16, error_code: u8, extra_text: &str) -> String {
    let mut out = format!("{}{}", num(failing_mid, 4), num(error_code, 2));
    if revision >= 2 {
        out.push_str(&num(failing_mid, 4));
    }
    if revision >= 3 {
        out.push_str(&text(extra_text, 25));
    }
    out
}

/// MID 0005: generic positive acknowledge. Untagged.
pub fn build_mid0005(acked_mid: u16) -> String {
    num(acked_mid, 4)
}

/// MID 0015: Pset selected. Max rev 2.
pub fn build_mid0015(
    revision: u32,
    pset_id: &str,
    change_time: NaiveDateTime,
    batch_size: u32,
    batch_counter: u32,
    ok_counter: u32,
) -> String {
    let date = format_timestamp(change_time);
    if revision < 2 {
        return format!("{}{}", text(pset_id, 3), date);
    }
    let fields = vec![
        Tagged::new(1, 1, text(pset_id, 3)),
        Tagged::new(2, 1, date),
        Tagged::new(3, 2, num(batch_size, 4)),
        Tagged::new(4, 2, num(batch_counter, 4)),
        Tagged::new(5, 2, num(ok_counter, 4)),
    ];
    build_payload(revision, &fields)
}

/// MID 0040: tool disabled notification. No payload fields — the request
/// MID reused unsolicited, per §4.5's MID 0042 handler.
pub fn build_mid0040() -> String {
    String::new()
}

/// MID 0041: tool data. Max rev 5.
pub fn build_mid0041(revision: u32, tool: &ToolInfo, lifetime_tightenings: u64, controller_serial: &str, controller_sw_version: &str) -> String {
    let fields = vec![
        Tagged::new(1, 1, text(&tool.serial_number, 14)),
        Tagged::new(2, 1, num(lifetime_tightenings as i64, 10)),
        Tagged::new(3, 1, text(&tool.last_calib_date, 10)),
        Tagged::new(4, 1, text(controller_serial, 10)),
        Tagged::new(5, 2, num(tool.calib_value, 6)),
        Tagged::new(6, 2, text(&tool.last_service_date, 10)),
        Tagged::new(7, 2, num(tool.tightenings_since_service as i64, 10)),
        Tagged::new(8, 3, num(tool.tool_type, 2)),
        Tagged::new(9, 3, num(tool.motor_size, 4)),
        Tagged::new(10, 4, text(&tool.open_end_data, 20)),
        Tagged::new(11, 5, text(controller_sw_version, 19)),
    ];
    build_payload(revision, &fields)
}

/// MID 0052: VIN. Max rev 2.
pub fn build_mid0052(revision: u32, vin: &str, part2: &str, part3: &str, part4: &str) -> String {
    if revision < 2 {
        return text(vin, 25);
    }
    let fields = vec![
        Tagged::new(1, 1, text(vin, 25)),
        Tagged::new(2, 1, text(part2, 25)),
        Tagged::new(3, 1, text(part3, 25)),
        Tagged::new(4, 1, text(part4, 25)),
    ];
    build_payload(revision, &fields)
}

/// Inputs to [`build_mid0061`], gathered by the simulator under the state
/// lock and passed to the payload builder after it's released.
pub struct TighteningResult {
    pub cell_id: u32,
    pub channel_id: u8,
    pub controller_name: String,
    pub vin: String,
    pub job_id: u8,
    pub pset_id: String,
    pub batch_size: u32,
    pub batch_counter: u32,
    pub status_ok: bool,
    pub torque_status: u8,
    pub angle_status: u8,
    pub torque_min_hundredths: i64,
    pub torque_max_hundredths: i64,
    pub torque_target_hundredths: i64,
    pub torque_final_hundredths: i64,
    pub angle_min: i32,
    pub angle_max: i32,
    pub angle_target: i32,
    pub angle_final: i32,
    pub timestamp: NaiveDateTime,
    pub pset_change_time: NaiveDateTime,
    pub batch_complete: bool,
    pub tightening_id: u64,
    pub strategy_code: u32,
    pub strategy_options: String,
    pub tightening_error_status_2: u64,
    pub stage_result_count: u8,
}

/// MID 0061: tightening result. Max rev 7.
pub fn build_mid0061(revision: u32, r: &TighteningResult) -> String {
    let fields = vec![
        Tagged::new(1, 1, num(r.cell_id, 4)),
        Tagged::new(2, 1, num(r.channel_id, 2)),
        Tagged::new(3, 1, text(&r.controller_name, 25)),
        Tagged::new(4, 1, text(&r.vin, 25)),
        Tagged::new(5, 1, num(r.job_id, 2)),
        Tagged::new(6, 1, text(&r.pset_id, 3)),
        Tagged::new(7, 1, num(r.batch_size, 4)),
        Tagged::new(8, 1, num(r.batch_counter, 4)),
        Tagged::new(9, 1, num(r.status_ok as i64, 1)),
        Tagged::new(10, 1, num(r.torque_status, 1)),
        Tagged::new(11, 1, num(r.angle_status, 1)),
        Tagged::new(12, 1, num(r.torque_min_hundredths, 6)),
        Tagged::new(13, 1, num(r.torque_max_hundredths, 6)),
        Tagged::new(14, 1, num(r.torque_target_hundredths, 6)),
        Tagged::new(15, 1, num(r.torque_final_hundredths, 6)),
        Tagged::new(16, 1, num(r.angle_min, 5)),
        Tagged::new(17, 1, num(r.angle_max, 5)),
        Tagged::new(18, 1, num(r.angle_target, 5)),
        Tagged::new(19, 1, num(r.angle_final, 5)),
        Tagged::new(20, 1, format_timestamp(r.timestamp)),
        Tagged::new(21, 1, format_timestamp(r.pset_change_time)),
        Tagged::new(22, 1, num(r.batch_complete as i64, 1)),
        Tagged::new(23, 1, num(r.tightening_id as i64, 10)),
        Tagged::new(24, 3, num(r.strategy_code, 4)),
        Tagged::new(25, 4, text(&r.strategy_options, 5)),
        Tagged::new(26, 5, num(r.tightening_error_status_2 as i64, 10)),
        Tagged::new(27, 6, num(r.stage_result_count, 2)),
    ];
    build_payload(revision, &fields)
}

pub struct SpindleResult {
    pub number: u8,
    pub channel: u8,
    pub status_ok: bool,
    pub torque_status: u8,
    pub torque_hundredths: i64,
    pub angle_status: u8,
    pub angle: i32,
}

/// Inputs to [`build_mid0101`].
pub struct MultiSpindleResult {
    pub num_spindles: u8,
    pub vin: String,
    pub job_id: u8,
    pub pset_id: String,
    pub batch_size: u32,
    pub batch_counter: u32,
    pub torque_min_hundredths: i64,
    pub torque_max_hundredths: i64,
    pub torque_target_hundredths: i64,
    pub angle_min: i32,
    pub angle_max: i32,
    pub angle_target: i32,
    pub pset_change_time: NaiveDateTime,
    pub timestamp: NaiveDateTime,
    pub sync_tightening_id: u32,
    pub spindles: Vec<SpindleResult>,
}

/// MID 0101: multi-spindle result. Max rev 5.
pub fn build_mid0101(revision: u32, r: &MultiSpindleResult) -> String {
    let overall_ok = r.spindles.iter().all(|s| s.status_ok);
    let mut spindle_data = String::new();
    for s in &r.spindles {
        spindle_data.push_str(&num(s.number, 2));
        spindle_data.push_str(&num(s.channel, 2));
        spindle_data.push_str(&num(s.status_ok as i64, 1));
        spindle_data.push_str(&num(s.torque_status, 1));
        spindle_data.push_str(&num(s.torque_hundredths, 6));
        spindle_data.push_str(&num(s.angle_status, 1));
        spindle_data.push_str(&num(s.angle, 5));
    }

    let mut fields = vec![
        Tagged::new(1, 1, num(r.num_spindles, 2)),
        Tagged::new(2, 1, text(&r.vin, 25)),
        Tagged::new(3, 1, num(r.job_id, 2)),
        Tagged::new(4, 1, text(&r.pset_id, 3)),
        Tagged::new(5, 1, num(r.batch_size, 4)),
        Tagged::new(6, 1, num(r.batch_counter, 4)),
        Tagged::new(7, 1, "0".to_string()),
        Tagged::new(8, 1, num(r.torque_min_hundredths, 6)),
        Tagged::new(9, 1, num(r.torque_max_hundredths, 6)),
        Tagged::new(10, 1, num(r.torque_target_hundredths, 6)),
        Tagged::new(11, 1, num(r.angle_min, 5)),
        Tagged::new(12, 1, num(r.angle_max, 5)),
        Tagged::new(13, 1, num(r.angle_target, 5)),
        Tagged::new(14, 1, format_timestamp(r.pset_change_time)),
        Tagged::new(15, 1, format_timestamp(r.timestamp)),
        Tagged::new(16, 1, num(r.sync_tightening_id, 5)),
        Tagged::new(17, 1, num(overall_ok as i64, 1)),
        Tagged::new(18, 1, spindle_data),
    ];
    if revision >= 4 {
        fields.push(Tagged::new(19, 4, "001".to_string()));
    }
    if revision >= 5 {
        fields.push(Tagged::new(20, 5, num(0i64, 5)));
    }
    build_payload(revision, &fields)
}

/// MID 0215: I/O device status. Rev 1 is fixed-width 8 slots per array;
/// rev 2 is length-prefixed. Max rev 2.
pub fn build_mid0215(revision: u32, device_id: &str, relays: &[Slot], digital_inputs: &[Slot]) -> String {
    if revision < 2 {
        let relay_data = slots_fixed(relays);
        let din_data = slots_fixed(digital_inputs);
        let fields = vec![
            Tagged::new(1, 1, text(device_id, 2)),
            Tagged::new(2, 1, relay_data),
            Tagged::new(3, 1, din_data),
        ];
        return build_payload(1, &fields);
    }
    let relay_data = slots_variable(relays);
    let din_data = slots_variable(digital_inputs);
    let fields = vec![
        Tagged::new(1, 1, text(device_id, 2)),
        Tagged::new(2, 1, num(relays.len() as i64, 2)),
        Tagged::new(3, 1, relay_data),
        Tagged::new(4, 1, num(digital_inputs.len() as i64, 2)),
        Tagged::new(5, 1, din_data),
    ];
    build_payload(2, &fields)
}

fn slots_fixed(slots: &[Slot]) -> String {
    let mut out = String::new();
    for slot in slots.iter().take(8) {
        out.push_str(&num(slot.function, 3));
        out.push_str(&num(slot.status, 1));
    }
    while out.len() < 32 {
        out.push_str("0000");
    }
    out
}

fn slots_variable(slots: &[Slot]) -> String {
    let mut out = String::new();
    for slot in slots {
        out.push_str(&num(slot.function, 3));
        out.push_str(&num(slot.status, 1));
    }
    out
}

/// MID 0217: relay function status push.
pub fn build_mid0217(function: u16, status: u8) -> String {
    let fields = vec![
        Tagged::new(1, 1, num(function, 3)),
        Tagged::new(2, 1, num(status, 1)),
    ];
    build_payload(1, &fields)
}
