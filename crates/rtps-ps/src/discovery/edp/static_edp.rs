// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Static endpoint discovery.
//!
//! Every participant loads the same XML table describing the readers and
//! writers of each participant by name and user id:
//!
//! ```xml
//! <staticdiscovery>
//!   <participant>
//!     <name>publisher</name>
//!     <writer>
//!       <userId>1</userId>
//!       <entityID>2</entityID>
//!       <topicName>Square</topicName>
//!       <topicDataType>ShapeType</topicDataType>
//!       <topicKind>WITH_KEY</topicKind>
//!       <reliabilityQos>RELIABLE_RELIABILITY_QOS</reliabilityQos>
//!       <durabilityQos>TRANSIENT_LOCAL_DURABILITY_QOS</durabilityQos>
//!       <unicastLocator address="127.0.0.1" port="7411"/>
//!     </writer>
//!   </participant>
//! </staticdiscovery>
//! ```
//!
//! Local endpoints are announced by property list entries in the SPDP
//! data (`eProsimaEDPStatic_Writer_ALIVE_ID_1` = `0.0.1.2`); a remote
//! participant's entries select which table rows to activate.

use super::{pair_remote_reader, pair_remote_writer, unpair_reader_proxy, unpair_writer_proxy};
use crate::config::{BuiltinAttributes, StaticXmlSource};
use crate::discovery::pdp::Pdp;
use crate::discovery::proxy_data::{ParticipantProxyData, ReaderProxyData, WriterProxyData};
use crate::endpoint::EndpointKind;
use crate::error::{Error, Result};
use crate::protocol::constants::{
    ENTITY_KIND_USER_READER_NO_KEY, ENTITY_KIND_USER_READER_WITH_KEY,
    ENTITY_KIND_USER_WRITER_NO_KEY, ENTITY_KIND_USER_WRITER_WITH_KEY,
};
use crate::protocol::guid::{EntityId, GUID};
use crate::protocol::locator::{Locator, LocatorList};
use crate::protocol::parameter::Property;
use crate::protocol::types::TopicKind;
use crate::qos::{DurabilityKind, ReaderQos, ReliabilityKind, WriterQos};
use roxmltree::{Document, Node};
use std::net::Ipv4Addr;

const PROPERTY_PREFIX: &str = "eProsimaEDPStatic_";

/// One reader or writer row of the static table.
#[derive(Clone, Debug, PartialEq)]
pub struct StaticEndpoint {
    pub user_id: i16,
    /// Entity key; the kind byte follows from the topic kind.
    pub entity_id: Option<u32>,
    pub topic_name: String,
    pub type_name: String,
    pub topic_kind: TopicKind,
    pub reliability: ReliabilityKind,
    pub durability: DurabilityKind,
    pub expects_inline_qos: bool,
    pub unicast_locator_list: LocatorList,
    pub multicast_locator_list: LocatorList,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticParticipant {
    pub name: String,
    pub readers: Vec<StaticEndpoint>,
    pub writers: Vec<StaticEndpoint>,
}

/// Parsed `<staticdiscovery>` document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticEndpointTable {
    pub participants: Vec<StaticParticipant>,
}

impl StaticEndpointTable {
    pub fn load(source: &StaticXmlSource) -> Result<Self> {
        match source {
            StaticXmlSource::Text(text) => Self::parse(text),
            StaticXmlSource::File(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::StaticDiscovery(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::parse(&text)
            }
        }
    }

    pub fn parse(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml)
            .map_err(|e| Error::StaticDiscovery(format!("XML parse error: {}", e)))?;
        let root = doc.root_element();
        if root.tag_name().name() != "staticdiscovery" {
            return Err(Error::StaticDiscovery(format!(
                "root element is <{}>, expected <staticdiscovery>",
                root.tag_name().name()
            )));
        }

        let mut table = StaticEndpointTable::default();
        for node in root.children().filter(|n| n.is_element()) {
            if node.tag_name().name() != "participant" {
                log::warn!(
                    "[StaticEDP] ignoring <{}> under <staticdiscovery>",
                    node.tag_name().name()
                );
                continue;
            }
            let participant = parse_participant(&node)?;
            if table.participants.iter().any(|p| p.name == participant.name) {
                return Err(Error::StaticDiscovery(format!(
                    "participant '{}' described twice",
                    participant.name
                )));
            }
            table.participants.push(participant);
        }
        log::debug!(
            "[StaticEDP] loaded {} participant description(s)",
            table.participants.len()
        );
        Ok(table)
    }

    fn participant(&self, name: &str) -> Option<&StaticParticipant> {
        self.participants.iter().find(|p| p.name == name)
    }

    pub fn lookup_reader(&self, participant: &str, user_id: i16) -> Option<&StaticEndpoint> {
        self.participant(participant)?
            .readers
            .iter()
            .find(|r| r.user_id == user_id)
    }

    pub fn lookup_writer(&self, participant: &str, user_id: i16) -> Option<&StaticEndpoint> {
        self.participant(participant)?
            .writers
            .iter()
            .find(|w| w.user_id == user_id)
    }
}

fn parse_participant(node: &Node) -> Result<StaticParticipant> {
    let mut participant = StaticParticipant::default();
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "name" => participant.name = text_of(&child).to_string(),
            "reader" => participant.readers.push(parse_endpoint(&child)?),
            "writer" => participant.writers.push(parse_endpoint(&child)?),
            other => log::warn!("[StaticEDP] ignoring <{}> in <participant>", other),
        }
    }
    if participant.name.is_empty() {
        return Err(Error::StaticDiscovery("participant without <name>".into()));
    }
    for (kind, list) in [("reader", &participant.readers), ("writer", &participant.writers)] {
        for (i, e) in list.iter().enumerate() {
            if list[..i].iter().any(|o| o.user_id == e.user_id) {
                return Err(Error::StaticDiscovery(format!(
                    "participant '{}' has two {}s with userId {}",
                    participant.name, kind, e.user_id
                )));
            }
        }
    }
    Ok(participant)
}

fn parse_endpoint(node: &Node) -> Result<StaticEndpoint> {
    let mut user_id = None;
    let mut endpoint = StaticEndpoint {
        user_id: 0,
        entity_id: None,
        topic_name: String::new(),
        type_name: String::new(),
        topic_kind: TopicKind::NoKey,
        reliability: ReliabilityKind::BestEffort,
        durability: DurabilityKind::Volatile,
        expects_inline_qos: false,
        unicast_locator_list: LocatorList::new(),
        multicast_locator_list: LocatorList::new(),
    };

    for child in node.children().filter(|n| n.is_element()) {
        let text = text_of(&child);
        match child.tag_name().name() {
            "userId" => user_id = Some(parse_number::<i16>("userId", text)?),
            "entityID" => endpoint.entity_id = Some(parse_number::<u32>("entityID", text)?),
            "topicName" => endpoint.topic_name = text.to_string(),
            "topicDataType" => endpoint.type_name = text.to_string(),
            "topicKind" => endpoint.topic_kind = parse_topic_kind(text)?,
            "topic" => {
                if let Some(name) = child.attribute("name") {
                    endpoint.topic_name = name.to_string();
                }
                if let Some(ty) = child.attribute("dataType") {
                    endpoint.type_name = ty.to_string();
                }
                if let Some(kind) = child.attribute("kind") {
                    endpoint.topic_kind = parse_topic_kind(kind)?;
                }
            }
            "reliabilityQos" => {
                endpoint.reliability = match text {
                    "RELIABLE_RELIABILITY_QOS" => ReliabilityKind::Reliable,
                    "BEST_EFFORT_RELIABILITY_QOS" => ReliabilityKind::BestEffort,
                    other => {
                        return Err(Error::StaticDiscovery(format!(
                            "unknown reliabilityQos '{}'",
                            other
                        )))
                    }
                }
            }
            "durabilityQos" => {
                endpoint.durability = match text {
                    "VOLATILE_DURABILITY_QOS" => DurabilityKind::Volatile,
                    "TRANSIENT_LOCAL_DURABILITY_QOS" => DurabilityKind::TransientLocal,
                    other => {
                        return Err(Error::StaticDiscovery(format!(
                            "unknown durabilityQos '{}'",
                            other
                        )))
                    }
                }
            }
            "expectsInlineQos" => {
                endpoint.expects_inline_qos = match text {
                    "true" => true,
                    "false" => false,
                    other => {
                        return Err(Error::StaticDiscovery(format!(
                            "expectsInlineQos must be true or false, got '{}'",
                            other
                        )))
                    }
                }
            }
            "unicastLocator" => endpoint.unicast_locator_list.push(parse_locator(&child)?),
            "multicastLocator" => endpoint.multicast_locator_list.push(parse_locator(&child)?),
            other => log::debug!("[StaticEDP] ignoring <{}> in endpoint", other),
        }
    }

    endpoint.user_id = match user_id {
        Some(id) if id > 0 => id,
        Some(id) => {
            return Err(Error::StaticDiscovery(format!(
                "userId must be positive, got {}",
                id
            )))
        }
        None => return Err(Error::StaticDiscovery("endpoint without <userId>".into())),
    };
    if endpoint.topic_name.is_empty() || endpoint.type_name.is_empty() {
        return Err(Error::StaticDiscovery(format!(
            "endpoint {} needs a topic name and data type",
            endpoint.user_id
        )));
    }
    Ok(endpoint)
}

fn text_of<'a>(node: &Node<'a, '_>) -> &'a str {
    node.text().map(str::trim).unwrap_or("")
}

fn parse_number<T: std::str::FromStr>(what: &str, text: &str) -> Result<T> {
    text.parse()
        .map_err(|_| Error::StaticDiscovery(format!("invalid {} '{}'", what, text)))
}

fn parse_topic_kind(text: &str) -> Result<TopicKind> {
    match text {
        "NO_KEY" => Ok(TopicKind::NoKey),
        "WITH_KEY" => Ok(TopicKind::WithKey),
        other => Err(Error::StaticDiscovery(format!("unknown topicKind '{}'", other))),
    }
}

fn parse_locator(node: &Node) -> Result<Locator> {
    let address = node
        .attribute("address")
        .ok_or_else(|| Error::StaticDiscovery("locator without address".into()))?;
    let address: Ipv4Addr = address
        .parse()
        .map_err(|_| Error::StaticDiscovery(format!("invalid locator address '{}'", address)))?;
    let port = node
        .attribute("port")
        .ok_or_else(|| Error::StaticDiscovery("locator without port".into()))?;
    let port = parse_number::<u32>("locator port", port)?;
    Ok(Locator::udpv4(address, port))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointStatus {
    Alive,
    Ended,
}

/// Liveness entry of one local endpoint, carried in the SPDP property list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticProperty {
    pub endpoint_kind: EndpointKind,
    pub status: EndpointStatus,
    pub user_id: i16,
    pub entity_id: EntityId,
}

impl StaticProperty {
    pub fn to_property(&self) -> Property {
        let kind = match self.endpoint_kind {
            EndpointKind::Reader => "Reader",
            EndpointKind::Writer => "Writer",
        };
        let status = match self.status {
            EndpointStatus::Alive => "ALIVE",
            EndpointStatus::Ended => "ENDED",
        };
        let e = self.entity_id.0;
        Property::new(
            format!("{}{}_{}_ID_{}", PROPERTY_PREFIX, kind, status, self.user_id),
            format!("{}.{}.{}.{}", e[0], e[1], e[2], e[3]),
        )
    }

    /// `None` for properties that are not static discovery entries.
    pub fn from_property(property: &Property) -> Option<Self> {
        let rest = property.name.strip_prefix(PROPERTY_PREFIX)?;
        let mut parts = rest.split('_');
        let endpoint_kind = match parts.next()? {
            "Reader" => EndpointKind::Reader,
            "Writer" => EndpointKind::Writer,
            _ => return None,
        };
        let status = match parts.next()? {
            "ALIVE" => EndpointStatus::Alive,
            "ENDED" => EndpointStatus::Ended,
            _ => return None,
        };
        if parts.next()? != "ID" {
            return None;
        }
        let user_id = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        let mut bytes = [0u8; 4];
        let mut values = property.value.split('.');
        for b in bytes.iter_mut() {
            *b = values.next()?.parse().ok()?;
        }
        if values.next().is_some() {
            return None;
        }
        Some(Self {
            endpoint_kind,
            status,
            user_id,
            entity_id: EntityId(bytes),
        })
    }

    fn same_endpoint(&self, other: &StaticProperty) -> bool {
        self.endpoint_kind == other.endpoint_kind
            && (self.entity_id == other.entity_id || self.user_id == other.user_id)
    }
}

/// Whether the kind byte of `entity_id` fits an endpoint of `topic_kind`.
pub fn check_entity_id(entity_id: EntityId, topic_kind: TopicKind, endpoint: EndpointKind) -> bool {
    entity_id.kind() == user_entity_kind(topic_kind, endpoint)
}

fn user_entity_kind(topic_kind: TopicKind, endpoint: EndpointKind) -> u8 {
    match (endpoint, topic_kind) {
        (EndpointKind::Reader, TopicKind::WithKey) => ENTITY_KIND_USER_READER_WITH_KEY,
        (EndpointKind::Reader, TopicKind::NoKey) => ENTITY_KIND_USER_READER_NO_KEY,
        (EndpointKind::Writer, TopicKind::WithKey) => ENTITY_KIND_USER_WRITER_WITH_KEY,
        (EndpointKind::Writer, TopicKind::NoKey) => ENTITY_KIND_USER_WRITER_NO_KEY,
    }
}

pub struct StaticEdp {
    table: StaticEndpointTable,
}

impl StaticEdp {
    pub(crate) fn create(builtin: &BuiltinAttributes) -> Result<Self> {
        let source = builtin.static_endpoint_xml.as_ref().ok_or_else(|| {
            Error::StaticDiscovery("static EDP enabled without an endpoint XML".into())
        })?;
        Ok(Self {
            table: StaticEndpointTable::load(source)?,
        })
    }

    pub fn table(&self) -> &StaticEndpointTable {
        &self.table
    }

    /// Advertise a local endpoint as alive and announce right away.
    pub(crate) fn local_endpoint_alive(
        &self,
        pdp: &Pdp,
        kind: EndpointKind,
        user_id: i16,
        entity_id: EntityId,
    ) -> Result<()> {
        if user_id <= 0 {
            return Err(Error::InvalidAttributes(format!(
                "static discovery needs a positive user id, got {}",
                user_id
            )));
        }
        self.set_local_property(
            pdp,
            StaticProperty {
                endpoint_kind: kind,
                status: EndpointStatus::Alive,
                user_id,
                entity_id,
            },
        )
    }

    pub(crate) fn local_endpoint_ended(
        &self,
        pdp: &Pdp,
        kind: EndpointKind,
        user_id: i16,
        entity_id: EntityId,
    ) -> Result<()> {
        self.set_local_property(
            pdp,
            StaticProperty {
                endpoint_kind: kind,
                status: EndpointStatus::Ended,
                user_id,
                entity_id,
            },
        )
    }

    fn set_local_property(&self, pdp: &Pdp, property: StaticProperty) -> Result<()> {
        pdp.update_local(|local| {
            local.properties.retain(|p| {
                StaticProperty::from_property(p).map_or(true, |s| !s.same_endpoint(&property))
            });
            local.properties.push(property.to_property());
        });
        log::debug!(
            "[StaticEDP] local {:?} {} ({:?}) is {:?}",
            property.endpoint_kind,
            property.user_id,
            property.entity_id,
            property.status
        );
        pdp.announce_participant_state(true)
    }

    /// Walk the static entries of a remote participant: activate new ALIVE
    /// endpoints, drop ENDED ones.
    pub(crate) fn assign_remote(&self, pdp: &Pdp, pdata: &ParticipantProxyData) {
        for property in pdata.properties.iter() {
            let Some(entry) = StaticProperty::from_property(property) else {
                continue;
            };
            let guid = GUID::new(pdata.guid.prefix, entry.entity_id);
            match (entry.endpoint_kind, entry.status) {
                (EndpointKind::Reader, EndpointStatus::Alive) => {
                    if pdp.lookup_reader_proxy_data(&guid).is_none() {
                        self.new_remote_reader(pdp, pdata, entry.user_id, Some(entry.entity_id));
                    }
                }
                (EndpointKind::Writer, EndpointStatus::Alive) => {
                    if pdp.lookup_writer_proxy_data(&guid).is_none() {
                        self.new_remote_writer(pdp, pdata, entry.user_id, Some(entry.entity_id));
                    }
                }
                (EndpointKind::Reader, EndpointStatus::Ended) => {
                    if pdp.remove_reader_proxy_data(&guid).is_some() {
                        log::info!("[StaticEDP] remote reader {} ended", guid);
                    }
                    unpair_reader_proxy(pdp, &guid);
                }
                (EndpointKind::Writer, EndpointStatus::Ended) => {
                    if pdp.remove_writer_proxy_data(&guid).is_some() {
                        log::info!("[StaticEDP] remote writer {} ended", guid);
                    }
                    unpair_writer_proxy(pdp, &guid);
                }
            }
        }
    }

    pub(crate) fn new_remote_endpoint(
        &self,
        pdp: &Pdp,
        pdata: &ParticipantProxyData,
        user_id: i16,
        entity_id: Option<EntityId>,
        kind: EndpointKind,
    ) -> bool {
        match kind {
            EndpointKind::Reader => self.new_remote_reader(pdp, pdata, user_id, entity_id),
            EndpointKind::Writer => self.new_remote_writer(pdp, pdata, user_id, entity_id),
        }
    }

    pub(crate) fn new_remote_reader(
        &self,
        pdp: &Pdp,
        pdata: &ParticipantProxyData,
        user_id: i16,
        entity_id: Option<EntityId>,
    ) -> bool {
        let Some(row) = self.table.lookup_reader(&pdata.participant_name, user_id) else {
            log::debug!(
                "[StaticEDP] no reader {} for participant '{}'",
                user_id,
                pdata.participant_name
            );
            return false;
        };
        let Some(entity_id) = resolve_entity_id(row, entity_id, EndpointKind::Reader) else {
            return false;
        };
        let (unicast, multicast) = row_locators(row, pdata);
        let mut qos = ReaderQos::default();
        qos.reliability.kind = row.reliability;
        qos.durability.kind = row.durability;
        let data = ReaderProxyData {
            guid: GUID::new(pdata.guid.prefix, entity_id),
            participant_guid: pdata.guid,
            unicast_locator_list: unicast,
            multicast_locator_list: multicast,
            expects_inline_qos: row.expects_inline_qos,
            topic_name: row.topic_name.clone(),
            type_name: row.type_name.clone(),
            topic_kind: row.topic_kind,
            qos,
            user_defined_id: user_id,
            is_alive: true,
        };
        if !pdp.add_reader_proxy_data(data.clone()) {
            return false;
        }
        log::info!(
            "[StaticEDP] activated remote reader {} on '{}'",
            data.guid,
            data.topic_name
        );
        pair_remote_reader(pdp, &data);
        true
    }

    pub(crate) fn new_remote_writer(
        &self,
        pdp: &Pdp,
        pdata: &ParticipantProxyData,
        user_id: i16,
        entity_id: Option<EntityId>,
    ) -> bool {
        let Some(row) = self.table.lookup_writer(&pdata.participant_name, user_id) else {
            log::debug!(
                "[StaticEDP] no writer {} for participant '{}'",
                user_id,
                pdata.participant_name
            );
            return false;
        };
        let Some(entity_id) = resolve_entity_id(row, entity_id, EndpointKind::Writer) else {
            return false;
        };
        let (unicast, multicast) = row_locators(row, pdata);
        let mut qos = WriterQos::default();
        qos.reliability.kind = row.reliability;
        qos.durability.kind = row.durability;
        let data = WriterProxyData {
            guid: GUID::new(pdata.guid.prefix, entity_id),
            participant_guid: pdata.guid,
            unicast_locator_list: unicast,
            multicast_locator_list: multicast,
            topic_name: row.topic_name.clone(),
            type_name: row.type_name.clone(),
            topic_kind: row.topic_kind,
            qos,
            user_defined_id: user_id,
            is_alive: true,
        };
        if !pdp.add_writer_proxy_data(data.clone()) {
            return false;
        }
        log::info!(
            "[StaticEDP] activated remote writer {} on '{}'",
            data.guid,
            data.topic_name
        );
        pair_remote_writer(pdp, &data);
        true
    }
}

/// The announced entity id wins over the table; either must match the
/// topic kind of the row.
fn resolve_entity_id(
    row: &StaticEndpoint,
    announced: Option<EntityId>,
    kind: EndpointKind,
) -> Option<EntityId> {
    let from_table = row
        .entity_id
        .map(|key| EntityId::from_key(key, user_entity_kind(row.topic_kind, kind)));
    let entity_id = match (announced, from_table) {
        (Some(a), Some(t)) => {
            if a.key() != t.key() {
                log::warn!(
                    "[StaticEDP] {:?} {}: announced entity id {:?} differs from table {:?}",
                    kind,
                    row.user_id,
                    a,
                    t
                );
            }
            a
        }
        (Some(a), None) => a,
        (None, Some(t)) => t,
        (None, None) => {
            log::warn!(
                "[StaticEDP] {:?} {} has no entity id",
                kind,
                row.user_id
            );
            return None;
        }
    };
    if !check_entity_id(entity_id, row.topic_kind, kind) {
        log::error!(
            "[StaticEDP] entity id {:?} of {:?} {} does not match topic kind {:?}",
            entity_id,
            kind,
            row.user_id,
            row.topic_kind
        );
        return None;
    }
    Some(entity_id)
}

/// Row locators, or the participant defaults when the row has none.
fn row_locators(row: &StaticEndpoint, pdata: &ParticipantProxyData) -> (LocatorList, LocatorList) {
    if row.unicast_locator_list.is_empty() && row.multicast_locator_list.is_empty() {
        (
            pdata.default_unicast_locator_list.clone(),
            pdata.default_multicast_locator_list.clone(),
        )
    } else {
        (
            row.unicast_locator_list.clone(),
            row.multicast_locator_list.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const XML: &str = r#"<?xml version="1.0"?>
<staticdiscovery>
  <participant>
    <name>pub</name>
    <writer>
      <userId>1</userId>
      <entityID>2</entityID>
      <topicName>Square</topicName>
      <topicDataType>ShapeType</topicDataType>
      <topicKind>WITH_KEY</topicKind>
      <reliabilityQos>RELIABLE_RELIABILITY_QOS</reliabilityQos>
      <durabilityQos>TRANSIENT_LOCAL_DURABILITY_QOS</durabilityQos>
      <unicastLocator address="127.0.0.1" port="7411"/>
    </writer>
  </participant>
  <participant>
    <name>sub</name>
    <reader>
      <userId>3</userId>
      <topic name="Square" dataType="ShapeType" kind="WITH_KEY"/>
      <expectsInlineQos>true</expectsInlineQos>
      <multicastLocator address="239.255.0.2" port="7401"/>
    </reader>
  </participant>
</staticdiscovery>"#;

    #[test]
    fn test_parse_table() {
        let table = StaticEndpointTable::parse(XML).expect("parse");
        assert_eq!(table.participants.len(), 2);

        let w = table.lookup_writer("pub", 1).expect("writer");
        assert_eq!(w.entity_id, Some(2));
        assert_eq!(w.topic_kind, TopicKind::WithKey);
        assert_eq!(w.reliability, ReliabilityKind::Reliable);
        assert_eq!(w.durability, DurabilityKind::TransientLocal);
        assert_eq!(w.unicast_locator_list.len(), 1);

        let r = table.lookup_reader("sub", 3).expect("reader");
        assert_eq!(r.topic_name, "Square");
        assert_eq!(r.type_name, "ShapeType");
        assert!(r.expects_inline_qos);
        assert_eq!(r.entity_id, None);
        assert_eq!(r.multicast_locator_list.len(), 1);

        assert!(table.lookup_reader("pub", 1).is_none());
        assert!(table.lookup_writer("nobody", 1).is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            StaticEndpointTable::parse("<other/>"),
            Err(Error::StaticDiscovery(_))
        ));
        let no_user_id = "<staticdiscovery><participant><name>p</name>\
            <reader><topicName>T</topicName><topicDataType>D</topicDataType></reader>\
            </participant></staticdiscovery>";
        assert!(matches!(
            StaticEndpointTable::parse(no_user_id),
            Err(Error::StaticDiscovery(_))
        ));
        let bad_kind = "<staticdiscovery><participant><name>p</name>\
            <reader><userId>1</userId><topicName>T</topicName>\
            <topicDataType>D</topicDataType><topicKind>SOME_KEY</topicKind></reader>\
            </participant></staticdiscovery>";
        assert!(StaticEndpointTable::parse(bad_kind).is_err());
        let duplicate = "<staticdiscovery><participant><name>p</name>\
            <writer><userId>1</userId><topicName>T</topicName><topicDataType>D</topicDataType></writer>\
            <writer><userId>1</userId><topicName>U</topicName><topicDataType>D</topicDataType></writer>\
            </participant></staticdiscovery>";
        assert!(StaticEndpointTable::parse(duplicate).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(XML.as_bytes()).expect("write");
        let table = StaticEndpointTable::load(&StaticXmlSource::File(file.path().to_path_buf()))
            .expect("load");
        assert!(table.lookup_writer("pub", 1).is_some());

        let missing = StaticXmlSource::File("/nonexistent/static.xml".into());
        assert!(matches!(
            StaticEndpointTable::load(&missing),
            Err(Error::StaticDiscovery(_))
        ));
    }

    #[test]
    fn test_property_round_trip() {
        let p = StaticProperty {
            endpoint_kind: EndpointKind::Writer,
            status: EndpointStatus::Alive,
            user_id: 7,
            entity_id: EntityId([0, 0, 1, 0x02]),
        };
        let property = p.to_property();
        assert_eq!(property.name, "eProsimaEDPStatic_Writer_ALIVE_ID_7");
        assert_eq!(property.value, "0.0.1.2");
        assert_eq!(StaticProperty::from_property(&property), Some(p));

        assert_eq!(
            StaticProperty::from_property(&Property::new("other", "0.0.1.2")),
            None
        );
        assert_eq!(
            StaticProperty::from_property(&Property::new(
                "eProsimaEDPStatic_Writer_ALIVE_ID_7",
                "0.0.1"
            )),
            None
        );
        assert_eq!(
            StaticProperty::from_property(&Property::new(
                "eProsimaEDPStatic_Topic_ALIVE_ID_7",
                "0.0.1.2"
            )),
            None
        );
    }

    #[test]
    fn test_check_entity_id() {
        let reader_keyed = EntityId::from_key(1, ENTITY_KIND_USER_READER_WITH_KEY);
        assert!(check_entity_id(reader_keyed, TopicKind::WithKey, EndpointKind::Reader));
        assert!(!check_entity_id(reader_keyed, TopicKind::NoKey, EndpointKind::Reader));
        assert!(!check_entity_id(reader_keyed, TopicKind::WithKey, EndpointKind::Writer));
        let writer_plain = EntityId::from_key(1, ENTITY_KIND_USER_WRITER_NO_KEY);
        assert!(check_entity_id(writer_plain, TopicKind::NoKey, EndpointKind::Writer));
    }

    #[test]
    fn test_resolve_entity_id() {
        let table = StaticEndpointTable::parse(XML).expect("parse");
        let w = table.lookup_writer("pub", 1).expect("writer");
        let from_table = resolve_entity_id(w, None, EndpointKind::Writer).expect("entity id");
        assert_eq!(from_table.key(), 2);
        assert_eq!(from_table.kind(), ENTITY_KIND_USER_WRITER_WITH_KEY);

        let announced = EntityId::from_key(9, ENTITY_KIND_USER_WRITER_WITH_KEY);
        assert_eq!(
            resolve_entity_id(w, Some(announced), EndpointKind::Writer),
            Some(announced)
        );
        let wrong_kind = EntityId::from_key(9, ENTITY_KIND_USER_WRITER_NO_KEY);
        assert_eq!(resolve_entity_id(w, Some(wrong_kind), EndpointKind::Writer), None);

        let r = table.lookup_reader("sub", 3).expect("reader");
        assert_eq!(resolve_entity_id(r, None, EndpointKind::Reader), None);
    }
}
