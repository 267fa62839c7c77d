// In-memory stand-in for the device network.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aldbkit_core::{Address, AldbRecord, BrokenLink, CoreError, Device, ScanTarget, StatusFeed, Transport};
use tokio::sync::mpsc::UnboundedSender;

pub const A: Address = Address::new([0x0a, 0x0a, 0x0a]);
pub const B: Address = Address::new([0x0b, 0x0b, 0x0b]);
pub const C: Address = Address::new([0x0c, 0x0c, 0x0c]);
pub const D: Address = Address::new([0x0d, 0x0d, 0x0d]);

pub fn rec(mem_addr: i32, is_controller: bool, group: u8, target: Address) -> AldbRecord {
    AldbRecord {
        mem_addr,
        in_use: true,
        is_controller,
        highwater: false,
        group,
        target,
        target_name: None,
        data1: 255,
        data2: 28,
        data3: 1,
        dirty: false,
    }
}

pub fn highwater(mem_addr: i32) -> AldbRecord {
    AldbRecord {
        mem_addr,
        in_use: false,
        is_controller: false,
        highwater: true,
        group: 0,
        target: Address::new([0, 0, 0]),
        target_name: None,
        data1: 0,
        data2: 0,
        data3: 0,
        dirty: false,
    }
}

#[derive(Default)]
struct FakeState {
    devices: Vec<Device>,
    tables: HashMap<Address, Vec<AldbRecord>>,
    unknown: Vec<Address>,
    host_broken: Vec<BrokenLink>,
    failing: HashSet<&'static str>,
    calls: Vec<String>,
    status_tx: Option<UnboundedSender<bool>>,
    subscriptions: usize,
    scans_finish_before_ack: bool,
    linkable: HashSet<Address>,
}

/// Cloneable handle; clones share one network.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn with_devices(devices: &[(Address, &str)]) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().devices = devices
            .iter()
            .map(|(address, name)| Device {
                address: *address,
                name: Some((*name).to_owned()),
            })
            .collect();
        fake
    }

    /// Join a device to the network after startup.
    pub fn add_device(&self, address: Address, name: &str, records: Vec<AldbRecord>) {
        let mut state = self.state.lock().unwrap();
        state.devices.push(Device {
            address,
            name: Some(name.to_owned()),
        });
        state.tables.insert(address, records);
    }

    /// Set what the physical device holds.
    pub fn set_table(&self, address: Address, records: Vec<AldbRecord>) {
        self.state.lock().unwrap().tables.insert(address, records);
    }

    pub fn device_table(&self, address: Address) -> Vec<AldbRecord> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&address)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_unknown(&self, unknown: Vec<Address>) {
        self.state.lock().unwrap().unknown = unknown;
    }

    pub fn set_host_broken(&self, links: Vec<BrokenLink>) {
        self.state.lock().unwrap().host_broken = links;
    }

    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn heal(&self, op: &'static str) {
        self.state.lock().unwrap().failing.remove(op);
    }

    /// Report every scan as started and finished before acknowledging
    /// the request.
    pub fn finish_scans_before_ack(&self) {
        self.state.lock().unwrap().scans_finish_before_ack = true;
    }

    /// Let `address` answer the next linking session.
    pub fn make_linkable(&self, address: Address) {
        self.state.lock().unwrap().linkable.insert(address);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn subscriptions(&self) -> usize {
        self.state.lock().unwrap().subscriptions
    }

    /// Whether the current status feed has been dropped by the core.
    pub fn status_released(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .status_tx
            .as_ref()
            .is_none_or(UnboundedSender::is_closed)
    }

    /// Push a loading flag. Returns `false` if nobody is subscribed.
    pub fn push_status(&self, is_loading: bool) -> bool {
        self.state
            .lock()
            .unwrap()
            .status_tx
            .as_ref()
            .is_some_and(|tx| tx.send(is_loading).is_ok())
    }

    fn enter(&self, op: &'static str, detail: impl std::fmt::Display) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{op} {detail}"));
        if state.failing.contains(op) {
            return Err(CoreError::Transport {
                message: format!("{op} failed"),
                code: Some("injected".into()),
            });
        }
        Ok(())
    }
}

impl Transport for FakeTransport {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        self.enter("list_devices", "")?;
        Ok(self.state.lock().unwrap().devices.clone())
    }

    async fn fetch_table(&self, address: Address) -> Result<Vec<AldbRecord>, CoreError> {
        self.enter("fetch_table", address)?;
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&address)
            .cloned()
            .ok_or(CoreError::DeviceNotFound {
                address: address.to_string(),
            })
    }

    async fn write_table(&self, address: Address, records: Vec<AldbRecord>) -> Result<(), CoreError> {
        self.enter("write_table", address)?;
        let mut state = self.state.lock().unwrap();
        let table = state.tables.entry(address).or_default();
        for mut record in records {
            record.dirty = false;
            if record.mem_addr < 0 {
                // The device picks a free slot below the lowest used one.
                let lowest = table.iter().map(|r| r.mem_addr).filter(|m| *m > 0).min().unwrap_or(4103);
                record.mem_addr = lowest - 8;
                table.push(record);
            } else if let Some(slot) = table.iter_mut().find(|r| r.mem_addr == record.mem_addr) {
                *slot = record;
            } else {
                table.push(record);
            }
        }
        Ok(())
    }

    async fn reset_table(&self, address: Address) -> Result<(), CoreError> {
        self.enter("reset_table", address)
    }

    async fn request_scan(&self, target: ScanTarget) -> Result<(), CoreError> {
        self.enter("request_scan", target)?;
        let early = self.state.lock().unwrap().scans_finish_before_ack;
        if early {
            self.push_status(true);
            self.push_status(false);
            // Let the core see both flags before the ack arrives.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }

    async fn add_device(&self, address: Address) -> Result<bool, CoreError> {
        self.enter("add_device", address)?;
        let mut state = self.state.lock().unwrap();
        if !state.linkable.remove(&address) {
            return Ok(false);
        }
        state.devices.push(Device { address, name: None });
        state.tables.entry(address).or_default();
        state.unknown.retain(|a| *a != address);
        Ok(true)
    }

    async fn remove_device(&self, address: Address, purge_all_references: bool) -> Result<(), CoreError> {
        self.enter("remove_device", format!("{address} purge={purge_all_references}"))?;
        let mut state = self.state.lock().unwrap();
        state.devices.retain(|d| d.address != address);
        state.tables.remove(&address);
        state.unknown.retain(|a| *a != address);
        Ok(())
    }

    async fn subscribe_status(&self) -> Result<StatusFeed, CoreError> {
        self.enter("subscribe_status", "")?;
        let (tx, feed) = StatusFeed::channel();
        let mut state = self.state.lock().unwrap();
        state.status_tx = Some(tx);
        state.subscriptions += 1;
        Ok(feed)
    }

    async fn list_unknown_devices(&self) -> Result<Vec<Address>, CoreError> {
        self.enter("list_unknown_devices", "")?;
        Ok(self.state.lock().unwrap().unknown.clone())
    }

    async fn list_broken_links(&self) -> Result<Vec<BrokenLink>, CoreError> {
        self.enter("list_broken_links", "")?;
        Ok(self.state.lock().unwrap().host_broken.clone())
    }
}
