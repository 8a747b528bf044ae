// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant configuration and RTPS port mapping.
//!
//! # Port Mapping (DDS-RTPS v2.3 Sec.9.6.1.1)
//!
//! | Traffic | Formula |
//! |---------|---------|
//! | metatraffic multicast | `PB + DG * domain + d0` |
//! | metatraffic unicast | `PB + DG * domain + d1 + PG * participant` |
//! | user multicast | `PB + DG * domain + d2` |
//! | user unicast | `PB + DG * domain + d3 + PG * participant` |
//!
//! With defaults, domain 0 participant 0 announces on 7400 and receives
//! user traffic on 7411.
//!
//! # Loading
//!
//! With the `config-loaders` feature, [`ParticipantAttributes::from_yaml_str`]
//! accepts a partial YAML document; missing fields keep their defaults.

use crate::protocol::locator::LocatorList;
use crate::protocol::types::Time;
use std::net::Ipv4Addr;
use std::path::PathBuf;

#[cfg(feature = "config-loaders")]
use serde::{Deserialize, Serialize};

// =======================================================================
// RTPS port constants
// =======================================================================

/// RTPS base port (PB).
pub const PORT_BASE: u32 = 7400;

/// Domain id gain (DG).
pub const DOMAIN_ID_GAIN: u32 = 250;

/// Participant id gain (PG).
pub const PARTICIPANT_ID_GAIN: u32 = 2;

/// Offset d0: metatraffic multicast.
pub const OFFSET_D0: u32 = 0;

/// Offset d1: metatraffic unicast.
pub const OFFSET_D1: u32 = 10;

/// Offset d2: user multicast.
pub const OFFSET_D2: u32 = 1;

/// Offset d3: user unicast.
pub const OFFSET_D3: u32 = 11;

/// Highest domain id whose ports still fit in 16 bits with defaults.
pub const MAX_DOMAIN_ID: u32 = 232;

/// Standard RTPS discovery multicast group.
pub const DEFAULT_MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 0, 1);

/// Participant ids probed when none is given.
pub const MAX_AUTO_PARTICIPANT_ID: i32 = 120;

// =======================================================================
// Port parameters
// =======================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct PortParameters {
    pub port_base: u32,
    pub domain_id_gain: u32,
    pub participant_id_gain: u32,
    pub offset_d0: u32,
    pub offset_d1: u32,
    pub offset_d2: u32,
    pub offset_d3: u32,
}

impl Default for PortParameters {
    fn default() -> Self {
        Self {
            port_base: PORT_BASE,
            domain_id_gain: DOMAIN_ID_GAIN,
            participant_id_gain: PARTICIPANT_ID_GAIN,
            offset_d0: OFFSET_D0,
            offset_d1: OFFSET_D1,
            offset_d2: OFFSET_D2,
            offset_d3: OFFSET_D3,
        }
    }
}

impl PortParameters {
    fn domain_base(&self, domain_id: u32) -> u32 {
        self.port_base + self.domain_id_gain * domain_id
    }

    pub fn metatraffic_multicast_port(&self, domain_id: u32) -> u32 {
        self.domain_base(domain_id) + self.offset_d0
    }

    pub fn metatraffic_unicast_port(&self, domain_id: u32, participant_id: u32) -> u32 {
        self.domain_base(domain_id) + self.offset_d1 + self.participant_id_gain * participant_id
    }

    pub fn user_multicast_port(&self, domain_id: u32) -> u32 {
        self.domain_base(domain_id) + self.offset_d2
    }

    pub fn user_unicast_port(&self, domain_id: u32, participant_id: u32) -> u32 {
        self.domain_base(domain_id) + self.offset_d3 + self.participant_id_gain * participant_id
    }
}

// =======================================================================
// Builtin protocol attributes
// =======================================================================

/// Where the static endpoint description comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
pub enum StaticXmlSource {
    Text(String),
    File(PathBuf),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct SimpleEdpAttributes {
    pub use_publication_writer_and_subscription_reader: bool,
    pub use_publication_reader_and_subscription_writer: bool,
}

impl Default for SimpleEdpAttributes {
    fn default() -> Self {
        Self {
            use_publication_writer_and_subscription_reader: true,
            use_publication_reader_and_subscription_writer: true,
        }
    }
}

/// Discovery configuration of a participant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct BuiltinAttributes {
    /// Run the simple participant discovery protocol.
    pub use_simple_pdp: bool,
    pub domain_id: u32,
    /// Time a remote participant stays alive without a new announcement.
    pub lease_duration: Time,
    /// Period between our own announcements.
    pub lease_duration_announcement_period: Time,
    pub use_simple_edp: bool,
    pub use_static_edp: bool,
    pub simple_edp: SimpleEdpAttributes,
    pub static_endpoint_xml: Option<StaticXmlSource>,
    pub metatraffic_unicast_locator_list: LocatorList,
    pub metatraffic_multicast_locator_list: LocatorList,
    /// Extra destinations for participant announcements.
    pub initial_peers_list: LocatorList,
    /// Period of the lease expiry sweep.
    pub lease_check_period: Time,
}

impl Default for BuiltinAttributes {
    fn default() -> Self {
        Self {
            use_simple_pdp: true,
            domain_id: 0,
            lease_duration: Time::from_secs(130),
            lease_duration_announcement_period: Time::from_secs(40),
            use_simple_edp: true,
            use_static_edp: false,
            simple_edp: SimpleEdpAttributes::default(),
            static_endpoint_xml: None,
            metatraffic_unicast_locator_list: LocatorList::new(),
            metatraffic_multicast_locator_list: LocatorList::new(),
            initial_peers_list: LocatorList::new(),
            lease_check_period: Time::from_secs(1),
        }
    }
}

// =======================================================================
// Participant attributes
// =======================================================================

/// Everything needed to create a participant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "config-loaders", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config-loaders", serde(default))]
pub struct ParticipantAttributes {
    pub name: String,
    /// Negative means "pick the first free id in the domain".
    pub participant_id: i32,
    pub default_unicast_locator_list: LocatorList,
    pub default_multicast_locator_list: LocatorList,
    pub send_socket_buffer_size: u32,
    pub listen_socket_buffer_size: u32,
    /// Include 127.0.0.1 when synthesizing default unicast locators.
    pub use_ip_loopback: bool,
    pub builtin: BuiltinAttributes,
    pub port: PortParameters,
    pub user_data: Vec<u8>,
}

impl Default for ParticipantAttributes {
    fn default() -> Self {
        Self {
            name: "RTPSParticipant".to_string(),
            participant_id: -1,
            default_unicast_locator_list: LocatorList::new(),
            default_multicast_locator_list: LocatorList::new(),
            send_socket_buffer_size: 65_536,
            listen_socket_buffer_size: 65_536,
            use_ip_loopback: true,
            builtin: BuiltinAttributes::default(),
            port: PortParameters::default(),
            user_data: Vec::new(),
        }
    }
}

impl ParticipantAttributes {
    pub fn with_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn domain_id(&self) -> u32 {
        self.builtin.domain_id
    }

    /// Reject configurations that cannot produce a working participant.
    pub fn validate(&self) -> crate::Result<()> {
        if self.builtin.domain_id > MAX_DOMAIN_ID {
            return Err(crate::Error::InvalidAttributes(format!(
                "domain id {} exceeds {}",
                self.builtin.domain_id, MAX_DOMAIN_ID
            )));
        }
        for (label, list) in [
            ("default unicast", &self.default_unicast_locator_list),
            ("default multicast", &self.default_multicast_locator_list),
            (
                "metatraffic unicast",
                &self.builtin.metatraffic_unicast_locator_list,
            ),
            (
                "metatraffic multicast",
                &self.builtin.metatraffic_multicast_locator_list,
            ),
            ("initial peers", &self.builtin.initial_peers_list),
        ] {
            if let Some(bad) = list.first_invalid() {
                return Err(crate::Error::InvalidLocatorList(format!(
                    "{} list contains {}",
                    label, bad
                )));
            }
        }
        if self.builtin.use_static_edp && self.builtin.static_endpoint_xml.is_none() {
            return Err(crate::Error::InvalidAttributes(
                "static EDP requires an endpoint XML source".into(),
            ));
        }
        Ok(())
    }

    /// Parse attributes from YAML; absent fields keep their defaults.
    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_str(text: &str) -> crate::Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| crate::Error::InvalidAttributes(format!("YAML: {}", e)))
    }

    #[cfg(feature = "config-loaders")]
    pub fn from_yaml_file(path: &std::path::Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }
}
