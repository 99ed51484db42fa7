use serde::Serialize;
use sysinfo::System;

/// Machine the load was generated from. Memory in bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub cpu_cores: u64,
    pub total_memory: u64,
    pub available_memory: u64,
}

pub fn get_hardware_info() -> HostInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    HostInfo {
        cpu_cores: sys.cpus().len() as u64,
        total_memory: sys.total_memory(),
        available_memory: sys.available_memory(),
    }
}
