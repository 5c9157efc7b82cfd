//! Storage health report formatting (NVMe SMART, eMMC EXT_CSD, UFS descriptor).

#![allow(missing_docs)]

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, RuiError};
use crate::diag::TextBuffer;
use crate::platform::pal::Storage;

/// NVMe data units are thousands of 512-byte blocks.
const BYTES_PER_DATA_UNIT: u64 = 1000 * 512;

const BINARY_PREFIXES: [&str; 9] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB", "ZiB", "YiB"];

/// NVMe SMART / Health Information log page 0x02.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NvmeSmartLog {
    pub critical_warning: u8,
    /// Composite temperature in Kelvin.
    pub temperature: u16,
    pub avail_spare: u8,
    pub spare_thresh: u8,
    pub percent_used: u8,
    pub data_units_read: u128,
    pub data_units_written: u128,
    pub host_reads: u128,
    pub host_writes: u128,
    pub ctrl_busy_time: u128,
    pub power_cycles: u128,
    pub power_on_hours: u128,
    pub unsafe_shutdowns: u128,
    pub media_errors: u128,
    pub num_err_log_entries: u128,
    pub warning_temp_time: u32,
    pub critical_comp_time: u32,
    /// Kelvin; zero means the sensor is absent.
    pub temp_sensor: [u16; 8],
    pub thm_temp1_trans_count: u32,
    pub thm_temp2_trans_count: u32,
    pub thm_temp1_total_time: u32,
    pub thm_temp2_total_time: u32,
}

/// eMMC extended CSD health fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MmcHealth {
    pub csd_rev: u8,
    pub life_time_est_a: u8,
    pub life_time_est_b: u8,
    pub pre_eol_info: u8,
}

/// UFS health descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UfsHealth {
    pub life_time_est_a: u8,
    pub life_time_est_b: u8,
    pub pre_eol_info: u8,
    pub vendor_info: [u8; 32],
}

/// Raw health data reported by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthInfo {
    Nvme(Box<NvmeSmartLog>),
    Mmc(MmcHealth),
    Ufs(UfsHealth),
}

/// Append a health section for every fixed storage device.
///
/// A device that fails to report still gets a line in `out`; the first such
/// failure is returned after every device has been visited.
pub fn dump_all_health_info<S: Storage + ?Sized>(
    storage: &mut S,
    out: &mut TextBuffer,
) -> Result<()> {
    let count = storage.fixed_device_count();
    if count == 0 {
        out.push_str("No storage device found\n\n");
        return Ok(());
    }
    let _ = write!(
        out,
        "Total {count} storage device{}\n\n",
        if count > 1 { "s" } else { "" }
    );

    let mut first_error = None;
    let mut idx = 1;
    for i in 0..count {
        let Some(dev) = storage.fixed_device(i) else {
            continue;
        };
        match dev.health_info() {
            Some(Ok(info)) => {
                let _ = writeln!(out, "({idx}/{count}) Block device '{}':", dev.name());
                stringify_health_info(&info, out);
                if idx < count {
                    out.push_str("\n");
                }
                idx += 1;
            }
            Some(Err(err)) => {
                let code = match &err {
                    RuiError::Hardware { code, .. } => *code,
                    _ => -1,
                };
                let _ = writeln!(out, "{}: Get Health info error: {code}", dev.name());
                first_error.get_or_insert(err);
            }
            None => {
                let _ = writeln!(
                    out,
                    "({idx}/{count}) Block device '{}' does not provide health info.",
                    dev.name()
                );
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

pub fn stringify_health_info(info: &HealthInfo, out: &mut TextBuffer) {
    match info {
        HealthInfo::Nvme(smart) => stringify_nvme_smart(smart, out),
        HealthInfo::Mmc(mmc) => stringify_mmc_health(mmc, out),
        HealthInfo::Ufs(ufs) => stringify_ufs_health(ufs, out),
    }
}

// ──────────────────── NVMe ────────────────────

fn stringify_nvme_smart(log: &NvmeSmartLog, out: &mut TextBuffer) {
    out.push_str("SMART/Health Information (NVMe Log 0x02)\n");
    let _ = writeln!(
        out,
        "Critical Warning:                   {}",
        alt_hex(log.critical_warning)
    );
    let _ = writeln!(
        out,
        "Temperature:                        {} Celsius",
        kelvin_to_celsius(log.temperature)
    );
    let _ = writeln!(out, "Available Spare:                    {}%", log.avail_spare);
    let _ = writeln!(out, "Available Spare Threshold:          {}%", log.spare_thresh);
    let _ = writeln!(out, "Percentage Used:                    {}%", log.percent_used);
    let _ = writeln!(
        out,
        "Data Units Read:                    {} [{}]",
        u128_to_str(log.data_units_read),
        u128_to_capacity_str(log.data_units_read, BYTES_PER_DATA_UNIT)
    );
    let _ = writeln!(
        out,
        "Data Units Written:                 {} [{}]",
        u128_to_str(log.data_units_written),
        u128_to_capacity_str(log.data_units_written, BYTES_PER_DATA_UNIT)
    );
    for (label, value) in [
        ("Host Read Commands:                 ", log.host_reads),
        ("Host Write Commands:                ", log.host_writes),
        ("Controller Busy Time:               ", log.ctrl_busy_time),
        ("Power Cycles:                       ", log.power_cycles),
        ("Power On Hours:                     ", log.power_on_hours),
        ("Unsafe Shutdowns:                   ", log.unsafe_shutdowns),
        ("Media and Data Integrity Errors:    ", log.media_errors),
        ("Error Information Log Entries:      ", log.num_err_log_entries),
    ] {
        let _ = writeln!(out, "{label}{}", u128_to_str(value));
    }

    if log.warning_temp_time != 0 {
        let _ = writeln!(
            out,
            "Warning  Comp. Temperature Time:    {}",
            log.warning_temp_time
        );
    }
    if log.critical_comp_time != 0 {
        let _ = writeln!(
            out,
            "Critical Comp. Temperature Time:    {}",
            log.critical_comp_time
        );
    }
    for (i, kelvin) in log.temp_sensor.iter().enumerate() {
        if *kelvin != 0 {
            let _ = writeln!(
                out,
                "Temperature Sensor {}:               {} Celsius",
                i + 1,
                kelvin_to_celsius(*kelvin)
            );
        }
    }
    let _ = writeln!(
        out,
        "Thermal Temp. 1 Transition Count:   {}",
        log.thm_temp1_trans_count
    );
    let _ = writeln!(
        out,
        "Thermal Temp. 2 Transition Count:   {}",
        log.thm_temp2_trans_count
    );
    let _ = writeln!(
        out,
        "Thermal Temp. 1 Total Time:         {}",
        log.thm_temp1_total_time
    );
    let _ = writeln!(
        out,
        "Thermal Temp. 2 Total Time:         {}",
        log.thm_temp2_total_time
    );
}

fn kelvin_to_celsius(kelvin: u16) -> i32 {
    i32::from(kelvin) - 273
}

fn alt_hex(value: u8) -> String {
    format!("{value:#x}")
}

const fn round_up_10(value: u32) -> u32 {
    value.div_ceil(10) * 10
}

/// Keep the upper 64 significant bits; the shift is a multiple of ten.
fn u128_to_u64(value: u128) -> (u64, u32) {
    let hi = (value >> 64) as u64;
    let shift = round_up_10(u64::BITS - hi.leading_zeros());
    // `shift >= bit length of hi`, so the result fits.
    #[allow(clippy::cast_possible_truncation)]
    let truncated = (value >> shift) as u64;
    (truncated, shift)
}

/// Decimal rendering with 64-bit precision: `~N000…` once the value exceeds
/// 64 bits, using thousands as an approximation of 1024.
pub fn u128_to_str(value: u128) -> String {
    let (truncated, shift) = u128_to_u64(value);
    let zeros = (shift / 10 * 3) as usize;
    if zeros > 0 {
        format!("~{truncated}{}", "0".repeat(zeros))
    } else {
        truncated.to_string()
    }
}

/// `xxx.yyy <binary prefix>` rendering of `units * bytes_per_unit` bytes.
pub fn u128_to_capacity_str(units: u128, bytes_per_unit: u64) -> String {
    const BASE: u64 = 1024;

    let (mut value, mut shift) = u128_to_u64(units);
    let free_bits = u32::try_from(value >> 32).map_or(0, u32::leading_zeros);
    let needed_bits = bytes_per_unit.ilog2() + 1;
    if needed_bits > free_bits {
        let adjust = round_up_10(needed_bits - free_bits);
        shift += adjust;
        value = value.checked_shr(adjust).unwrap_or(0);
    }
    value = value.saturating_mul(bytes_per_unit);

    while value >= BASE * BASE {
        value /= BASE;
        shift += 10;
    }
    let (hi, lo) = if value >= BASE {
        shift += 10;
        (value / BASE, (value % BASE) * 1000 / BASE)
    } else {
        (value, 0)
    };

    match BINARY_PREFIXES.get((shift / 10) as usize) {
        Some(prefix) if shift <= 80 => format!("{hi}.{lo:03} {prefix}"),
        _ => format!("{hi}.{lo:03} 2^{shift} B"),
    }
}

// ──────────────────── eMMC / UFS ────────────────────

fn device_lifetime_str(used: u8) -> String {
    match used {
        0x0 => "Not defined".to_string(),
        0x1..=0xa => format!(
            "{}% - {}% device life time used",
            u32::from(used - 1) * 10,
            u32::from(used) * 10
        ),
        0xb => "Exceeded its maximum estimated device life time".to_string(),
        _ => "Unknown".to_string(),
    }
}

const fn eol_info_str(eol: u8) -> &'static str {
    match eol {
        0x0 => "Not defined",
        0x1 => "Normal",
        0x2 => "Warning (Consumed 80% of reserved blocks)",
        0x3 => "Urgent",
        _ => "Unknown",
    }
}

struct LifetimeReport<'a> {
    storage: &'a str,
    est_a: u8,
    est_b: u8,
    eol: u8,
    est_prefix: &'a str,
    eol_name: &'a str,
}

fn stringify_lifetime_report(report: &LifetimeReport<'_>, out: &mut TextBuffer) {
    for (suffix, est) in [("A", report.est_a), ("B", report.est_b)] {
        let _ = write!(
            out,
            "{} Life Time Estimation {suffix} [{}{suffix}]: {}\n  i.e. {}\n",
            report.storage,
            report.est_prefix,
            alt_hex(est),
            device_lifetime_str(est)
        );
    }
    let _ = write!(
        out,
        "{} Pre EOL information [{}]: {}\n  i.e. {}\n",
        report.storage,
        report.eol_name,
        alt_hex(report.eol),
        eol_info_str(report.eol)
    );
}

const EXT_CSD_REV_OBSOLETE: u8 = 4;
const EXT_CSD_REV_EMMC_5_0: u8 = 7;
const EXT_CSD_VERSIONS: [&str; 9] = [
    "4.0", "4.1", "4.2", "4.3", "Obsolete", "4.41", "4.5", "5.0", "5.1",
];

fn stringify_mmc_health(mmc: &MmcHealth, out: &mut TextBuffer) {
    let version = EXT_CSD_VERSIONS.get(usize::from(mmc.csd_rev));
    match version {
        Some(version) if mmc.csd_rev != EXT_CSD_REV_OBSOLETE => {
            let _ = writeln!(
                out,
                "Extended CSD rev 1.{} (MMC {version})",
                mmc.csd_rev
            );
        }
        _ => {
            let _ = writeln!(out, "Unsupported Extended CSD rev 1.{}", mmc.csd_rev);
            return;
        }
    }

    if mmc.csd_rev >= EXT_CSD_REV_EMMC_5_0 {
        stringify_lifetime_report(
            &LifetimeReport {
                storage: "eMMC",
                est_a: mmc.life_time_est_a,
                est_b: mmc.life_time_est_b,
                eol: mmc.pre_eol_info,
                est_prefix: "EXT_CSD_DEVICE_LIFE_TIME_EST_TYPE_",
                eol_name: "EXT_CSD_PRE_EOL_INFO",
            },
            out,
        );
    }
}

fn stringify_ufs_health(ufs: &UfsHealth, out: &mut TextBuffer) {
    stringify_lifetime_report(
        &LifetimeReport {
            storage: "UFS",
            est_a: ufs.life_time_est_a,
            est_b: ufs.life_time_est_b,
            eol: ufs.pre_eol_info,
            est_prefix: "bDeviceLifeTimeEst",
            eol_name: "bPreEOLInfo",
        },
        out,
    );

    out.push_str("Vendor proprietary health report [VendorPropInfo]:\n");
    for (i, byte) in ufs.vendor_info.iter().enumerate() {
        let _ = write!(out, "  0x{byte:02x}");
        if i % 8 == 7 {
            out.push_str("\n");
        }
    }
}
