use chrono::{NaiveDate, NaiveDateTime};

use super::types::{DownlinkStatus, OrbitElement, UplinkStatus};

/// Two-letter name of a satellite from its hex identifier.
pub fn satellite_name(sat_hex_id: u8) -> &'static str {
    match sat_hex_id {
        0x6 => "A1",
        0xA => "MA",
        0x9 => "MB",
        0xB => "MC",
        0x5 => "NK",
        0x8 => "NN",
        0xC => "NP",
        0xD => "SR",
        _ => "XX",
    }
}

fn epoch(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|date| date.and_hms_opt(h, mi, s))
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn element(
    sat_hex_id: u8,
    sat_dcs_id: u8,
    downlink: DownlinkStatus,
    uplink: UplinkStatus,
    bulletin_epoch: NaiveDateTime,
    semi_major_axis_km: f64,
    inclination_deg: f64,
    ascending_node_longitude_deg: f64,
    ascending_node_drift_deg: f64,
    orbit_period_min: f64,
    semi_major_axis_drift_m_per_day: f64,
) -> OrbitElement {
    OrbitElement {
        sat_hex_id,
        sat_dcs_id,
        downlink,
        uplink,
        bulletin_epoch,
        semi_major_axis_km,
        inclination_deg,
        ascending_node_longitude_deg,
        ascending_node_drift_deg,
        orbit_period_min,
        semi_major_axis_drift_m_per_day,
    }
}

/// Bulletin shipped with the beacon, used when the configuration has none.
pub fn default_table() -> Vec<OrbitElement> {
    use DownlinkStatus as D;
    use UplinkStatus as U;
    vec![
        element(0xA, 5, D::OnWithA3, U::OnWithA3, epoch(2020, 3, 26, 22, 17, 58),
            7195.543, 98.5333, 337.191, -25.341, 101.3586, 0.00),
        element(0x9, 3, D::Off, U::OnWithA3, epoch(2020, 3, 26, 23, 33, 23),
            7195.595, 98.7011, 329.290, -25.340, 101.3592, 0.00),
        element(0xB, 7, D::OnWithA3, U::OnWithA3, epoch(2020, 3, 26, 22, 45, 19),
            7195.624, 98.7079, 341.538, -25.340, 101.3598, 0.00),
        element(0x5, 0, D::Off, U::OnWithA2, epoch(2020, 3, 26, 22, 0, 17),
            7180.518, 98.7247, 317.478, -25.259, 101.0413, -1.78),
        element(0x8, 0, D::Off, U::OnWithA2, epoch(2020, 3, 26, 22, 9, 30),
            7226.140, 99.0541, 345.355, -25.499, 102.0034, -1.80),
        element(0xC, 6, D::Off, U::OnWithA3, epoch(2020, 3, 26, 23, 48, 50),
            7226.486, 99.1948, 268.101, -25.500, 102.0103, -1.98),
        element(0xD, 4, D::OnWithA3, U::OnWithA3, epoch(2020, 3, 26, 22, 32, 0),
            7160.258, 98.5403, 110.937, -25.154, 100.6151, 0.00),
    ]
}
