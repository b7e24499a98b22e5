/*
 * This module defines the FleetViewUiState struct.
 * FleetViewUiState holds the state that belongs to the view rather than to the
 * backend: which servers and listeners the user has selected and which page of the
 * servers table is showing. It lives exactly as long as the view is mounted and is
 * reconciled against each new snapshot so selections never point at records the
 * backend no longer reports.
 */
use crate::core::ManagerSnapshot;
use std::collections::BTreeSet;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetViewUiState {
    /* Ids of the servers currently selected in the servers table. */
    pub selected_server_ids: BTreeSet<String>,
    /* Ports of the listeners currently selected in the listeners table. */
    pub selected_listener_ports: BTreeSet<u16>,
    /* Zero-based page of the servers table. */
    pub page_index: usize,
    pub page_size: usize,
}

impl FleetViewUiState {
    pub fn new(page_size: usize) -> Self {
        log::debug!("FleetViewUiState::new called with page_size: {page_size}");
        FleetViewUiState {
            selected_server_ids: BTreeSet::new(),
            selected_listener_ports: BTreeSet::new(),
            page_index: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn toggle_server(&mut self, id: &str) {
        if !self.selected_server_ids.remove(id) {
            self.selected_server_ids.insert(id.to_string());
        }
    }

    pub fn toggle_listener(&mut self, port: u16) {
        if !self.selected_listener_ports.remove(&port) {
            self.selected_listener_ports.insert(port);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_server_ids.clear();
        self.selected_listener_ports.clear();
    }

    pub fn page_count(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.page_size).max(1)
    }

    pub fn set_page(&mut self, page_index: usize, total_rows: usize) {
        self.page_index = page_index.min(self.page_count(total_rows) - 1);
    }

    /// Row range of the current page, clipped to `total_rows`.
    pub fn page_bounds(&self, total_rows: usize) -> Range<usize> {
        let start = (self.page_index * self.page_size).min(total_rows);
        let end = (start + self.page_size).min(total_rows);
        start..end
    }

    /*
     * Drops selections of servers and listeners missing from `snapshot` and pulls
     * the page index back if the table shrank. Returns whether anything changed.
     */
    pub fn reconcile(&mut self, snapshot: &ManagerSnapshot) -> bool {
        let before = (
            self.selected_server_ids.len(),
            self.selected_listener_ports.len(),
            self.page_index,
        );
        self.selected_server_ids
            .retain(|id| snapshot.servers.contains_key(id));
        self.selected_listener_ports
            .retain(|port| snapshot.listeners.contains_key(port));
        self.set_page(self.page_index, snapshot.servers.len());

        let after = (
            self.selected_server_ids.len(),
            self.selected_listener_ports.len(),
            self.page_index,
        );
        before != after
    }
}
