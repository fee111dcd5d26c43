//! Visibility tracker
//!
//! Counts visible command and articulation buttons per device. Only the
//! 0 -> 1 and 1 -> 0 transitions are reported; counters never go negative.

use std::collections::HashMap;

use super::types::DeviceId;

/// Button page tracked by the visibility counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    Command,
    Articulation,
}

/// Observable visibility transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityEdge {
    BecameVisible,
    BecameHidden,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisibilityCounter {
    pub command: u32,
    pub articulation: u32,
}

impl VisibilityCounter {
    fn slot(&mut self, page: Page) -> &mut u32 {
        match page {
            Page::Command => &mut self.command,
            Page::Articulation => &mut self.articulation,
        }
    }
}

#[derive(Debug, Default)]
pub struct VisibilityTracker {
    devices: HashMap<DeviceId, VisibilityCounter>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a device has counters (on connect)
    pub fn ensure_device(&mut self, device_id: &str) {
        self.devices.entry(device_id.to_string()).or_default();
    }

    /// Forget a device entirely (on disconnect)
    pub fn remove_device(&mut self, device_id: &str) -> Option<VisibilityCounter> {
        self.devices.remove(device_id)
    }

    pub fn appear(&mut self, device_id: &str, page: Page) -> Option<VisibilityEdge> {
        let slot = self
            .devices
            .entry(device_id.to_string())
            .or_default()
            .slot(page);
        *slot += 1;
        (*slot == 1).then_some(VisibilityEdge::BecameVisible)
    }

    pub fn disappear(&mut self, device_id: &str, page: Page) -> Option<VisibilityEdge> {
        let slot = self.devices.get_mut(device_id)?.slot(page);
        if *slot == 0 {
            return None;
        }
        *slot -= 1;
        (*slot == 0).then_some(VisibilityEdge::BecameHidden)
    }

    pub fn count(&self, device_id: &str, page: Page) -> u32 {
        self.devices
            .get(device_id)
            .map(|counter| match page {
                Page::Command => counter.command,
                Page::Articulation => counter.articulation,
            })
            .unwrap_or(0)
    }

    pub fn is_visible(&self, device_id: &str, page: Page) -> bool {
        self.count(device_id, page) > 0
    }

    /// Devices with at least one visible button of the given page, sorted
    pub fn devices_showing(&self, page: Page) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self
            .devices
            .keys()
            .filter(|device_id| self.is_visible(device_id, page))
            .cloned()
            .collect();
        devices.sort();
        devices
    }
}
