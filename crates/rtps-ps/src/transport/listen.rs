// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One receive thread per bound locator.

use super::InputChannel;
use crate::endpoint::Endpoint;
use crate::participant::receiver::MessageReceiver;
use crate::protocol::guid::GUID;
use crate::protocol::locator::Locator;
use parking_lot::RwLock;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll granularity of the receive loop; bounds shutdown latency.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(50);

/// Input channel plus the endpoints that want its datagrams.
pub struct ListenResource {
    locator: Locator,
    endpoints: Arc<RwLock<Vec<Endpoint>>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ListenResource {
    /// Spawn the receive thread for `channel`.
    pub fn start(
        mut channel: Box<dyn InputChannel>,
        receiver: Arc<MessageReceiver>,
    ) -> io::Result<Self> {
        let locator = channel.locator();
        let endpoints: Arc<RwLock<Vec<Endpoint>>> = Arc::new(RwLock::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread_endpoints = endpoints.clone();
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name(format!("rtps-listen-{}", locator.port))
            .spawn(move || {
                log::debug!("[ListenResource] thread started on {}", locator);
                while thread_running.load(Ordering::Relaxed) {
                    match channel.receive(RECEIVE_TIMEOUT) {
                        Ok(Some(data)) => {
                            let targets = thread_endpoints.read().clone();
                            if !targets.is_empty() {
                                receiver.process_message(&data, &targets);
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            log::debug!("[ListenResource] receive on {} failed: {}", locator, e);
                            thread::sleep(RECEIVE_TIMEOUT);
                        }
                    }
                }
                log::debug!("[ListenResource] thread stopped on {}", locator);
            })?;

        Ok(Self {
            locator,
            endpoints,
            running,
            handle: Some(handle),
        })
    }

    pub fn locator(&self) -> Locator {
        self.locator
    }

    pub fn is_listening_to(&self, locator: &Locator) -> bool {
        self.locator == *locator
    }

    /// Associate an endpoint; false if it already is.
    pub fn add_endpoint(&self, endpoint: Endpoint) -> bool {
        let mut eps = self.endpoints.write();
        let guid = endpoint.guid();
        if eps.iter().any(|e| e.guid() == guid) {
            return false;
        }
        eps.push(endpoint);
        true
    }

    pub fn remove_endpoint(&self, guid: &GUID) -> bool {
        let mut eps = self.endpoints.write();
        let before = eps.len();
        eps.retain(|e| e.guid() != *guid);
        eps.len() != before
    }

    pub fn has_endpoint(&self, guid: &GUID) -> bool {
        self.endpoints.read().iter().any(|e| e.guid() == *guid)
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Signal the thread and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::debug!("[ListenResource] thread on {} panicked", self.locator);
            }
        }
        self.endpoints.write().clear();
    }
}

impl Drop for ListenResource {
    fn drop(&mut self) {
        self.stop();
    }
}
