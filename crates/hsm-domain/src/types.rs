use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── xname ─────────────────────────────────────────────────────────────────────

/// The hierarchical hardware identifier scheme: `xCcCsSbBnN` etc., where each
/// letter introduces a positive integer for one level (cabinet, chassis, slot,
/// bmc, node, ...). Always stored normalized: lower-case, non-significant
/// leading zeros stripped per segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct XName(String);

/// Routes every wire/JSON deserialization of an `XName` through
/// [`XName::normalize`] — a hand-rolled `Deserialize` would just call this;
/// `try_from` lets serde do it without writing the visitor by hand. Without
/// this, an embedded `XName` field (e.g. `Component.id`) would deserialize
/// whatever case/zero-padding the client sent, diverging from the
/// normalized keys every store and path-param lookup uses.
impl TryFrom<String> for XName {
    type Error = crate::error::DomainError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        XName::normalize(&raw)
    }
}

impl From<XName> for String {
    fn from(x: XName) -> String {
        x.0
    }
}

/// One `(letter, number)` pair of an xname, e.g. `x1c4s4b0` decomposes into
/// `[('x', 1), ('c', 4), ('s', 4), ('b', 0)]`.
pub type Segment = (char, u32);

impl XName {
    /// Normalize and validate `raw` into an `XName`. Lower-cases letters and
    /// strips non-significant leading zeros from each numeric segment.
    ///
    /// Re-normalizing an already-normalized name is a no-op (Testable
    /// Properties §8: "a normalized component identifier, re-normalized,
    /// equals itself").
    pub fn normalize(raw: &str) -> Result<Self, crate::error::DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(crate::error::DomainError::BadId(raw.to_string()));
        }
        let segments = parse_segments(trimmed).ok_or_else(|| crate::error::DomainError::BadId(raw.to_string()))?;
        Ok(XName(render_segments(&segments)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> Vec<Segment> {
        parse_segments(&self.0).expect("normalized xname is always parseable")
    }

    /// The parent xname (one fewer segment), or `None` at the system root.
    pub fn parent(&self) -> Option<XName> {
        let segs = self.segments();
        if segs.len() <= 1 {
            return None;
        }
        Some(XName(render_segments(&segs[..segs.len() - 1])))
    }

    /// Every ancestor from immediate parent up to the cabinet, nearest first.
    pub fn ancestors(&self) -> Vec<XName> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(x) = cur {
            cur = x.parent();
            out.push(x);
        }
        out
    }

    /// `true` if `other` is this xname or a descendant of it.
    pub fn contains(&self, other: &XName) -> bool {
        let mine = self.segments();
        let theirs = other.segments();
        theirs.len() >= mine.len() && theirs[..mine.len()] == mine[..]
    }

    pub fn component_type(&self) -> ComponentType {
        classify(&self.segments())
    }

    pub fn is_controller(&self) -> bool {
        self.component_type().is_controller()
    }
}

impl std::fmt::Display for XName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse_segments(s: &str) -> Option<Vec<Segment>> {
    let mut chars = s.chars().peekable();
    let mut out = Vec::new();
    while let Some(c) = chars.next() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let letter = c.to_ascii_lowercase();
        let mut digits = String::new();
        while let Some(d) = chars.peek() {
            if d.is_ascii_digit() {
                digits.push(*d);
                chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            return None;
        }
        let n: u32 = digits.parse().ok()?;
        out.push((letter, n));
    }
    if out.is_empty() || out[0].0 != 'x' {
        return None;
    }
    Some(out)
}

fn render_segments(segs: &[Segment]) -> String {
    let mut s = String::new();
    for (letter, n) in segs {
        s.push(*letter);
        s.push_str(&n.to_string());
    }
    s
}

/// Classify an xname's trailing segment (in context of its parent) into a
/// component type. Mirrors the real hierarchy: cabinet > chassis >
/// {compute,router} module > {bmc, enclosure} > {node, nic}.
fn classify(segs: &[Segment]) -> ComponentType {
    match segs.last() {
        None => ComponentType::Unknown,
        Some(('x', _)) => ComponentType::Cabinet,
        Some(('c', _)) => ComponentType::Chassis,
        Some(('m', _)) => ComponentType::CabinetPDU,
        Some(('p', _)) if matches!(segs.get(segs.len().saturating_sub(2)), Some(('m', _))) => {
            ComponentType::PDUController
        }
        Some(('s', _)) => ComponentType::ComputeModule,
        Some(('r', _)) => ComponentType::RouterModule,
        Some(('e', _)) => ComponentType::NodeEnclosure,
        Some(('b', _)) => match segs.get(segs.len().saturating_sub(2)) {
            Some(('c', _)) => ComponentType::ChassisBmc,
            Some(('s', _)) => ComponentType::NodeBmc,
            Some(('r', _)) => ComponentType::RouterBmc,
            _ => ComponentType::Unknown,
        },
        Some(('n', _)) => ComponentType::Node,
        Some(('i', _)) => ComponentType::NodeBmcNic,
        _ => ComponentType::Unknown,
    }
}

// ── Component type / state / flag / role ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ComponentType {
    Cabinet,
    Chassis,
    ChassisBmc,
    ComputeModule,
    RouterModule,
    NodeEnclosure,
    NodeBmc,
    NodeBmcNic,
    Node,
    RouterBmc,
    CabinetPDU,
    PDUController,
    Unknown,
}

impl ComponentType {
    /// `true` for xname types that name a Redfish-controllable BMC/chassis
    /// controller (the only valid `RedfishEndpoint` identifiers, and the
    /// only types the Event Normalizer will accept as an endpoint-ID).
    pub fn is_controller(&self) -> bool {
        matches!(
            self,
            ComponentType::ChassisBmc
                | ComponentType::NodeBmc
                | ComponentType::RouterBmc
                | ComponentType::PDUController
        )
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Administrative state of a Component (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum State {
    Unknown,
    Empty,
    Populated,
    Off,
    On,
    Standby,
    Halt,
    Ready,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl State {
    /// The legal-transition matrix (§4.2). `force=true` bypasses this.
    ///
    /// `Unknown` and `Empty` are universal sources/sinks used by discovery
    /// and endpoint deletion; the rest follow the power/standby lifecycle.
    pub fn legal_transition(&self, to: State) -> bool {
        use State::*;
        if *self == to {
            return true;
        }
        match (*self, to) {
            (_, Unknown) => true,
            (_, Empty) => true,
            (Unknown, _) => true,
            (Empty, Populated) => true,
            (Populated, On) | (Populated, Off) => true,
            (Off, On) => true,
            (On, Off) => true,
            (On, Standby) => true,
            (Standby, On) | (Standby, Off) => true,
            (On, Halt) | (Halt, On) | (Halt, Off) => true,
            (_, Ready) => matches!(*self, On | Ready),
            (Ready, Off) | (Ready, On) => true,
            _ => false,
        }
    }
}

/// Health flag of a Component (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub enum Flag {
    #[default]
    OK,
    Warning,
    Alert,
    Locked,
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubRole(pub String);

/// Deployment class (Glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Class {
    Mountain,
    River,
    Hill,
}

impl std::fmt::Display for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SoftwareStatus(pub String);

/// Node identifier — a positive integer, unique within the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nid(pub u64);

// ── ComponentMeta (ambient bookkeeping) ────────────────────────────────────────

/// Lifecycle bookkeeping carried alongside every `Component`, generalized from
/// the store-layer metadata pattern: timestamps plus a monotonic write counter
/// so callers (and tests) can observe idempotence of repeated writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentMeta {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Incremented on every write that actually changed stored data.
    pub generation: u64,
}

impl ComponentMeta {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { created_at: now, updated_at: now, generation: 0 }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.generation += 1;
    }
}

// ── Component ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub id: XName,
    pub component_type: ComponentType,
    pub state: State,
    pub flag: Flag,
    pub enabled: bool,
    pub software_status: SoftwareStatus,
    pub role: Option<Role>,
    pub sub_role: Option<SubRole>,
    pub nid: Option<Nid>,
    pub class: Option<Class>,
    pub arch: Option<String>,
    pub net_type: Option<String>,
    pub subtype: Option<String>,
    /// `true` once an admin `Disable` has forbidden new reservations.
    #[serde(default)]
    pub reservations_disabled: bool,
    /// `true` when an admin `Lock` is in effect (independent of `flag`,
    /// which mirrors it for display — see Reservation Manager §4.3).
    #[serde(default)]
    pub locked: bool,
    pub meta: ComponentMeta,
}

impl Component {
    pub fn new(id: XName, component_type: ComponentType, now: DateTime<Utc>) -> Self {
        Component {
            id,
            component_type,
            state: State::Unknown,
            flag: Flag::OK,
            enabled: true,
            software_status: SoftwareStatus::default(),
            role: None,
            sub_role: None,
            nid: None,
            class: None,
            arch: None,
            net_type: None,
            subtype: None,
            reservations_disabled: false,
            locked: false,
            meta: ComponentMeta::new(now),
        }
    }
}

// ── RedfishEndpoint ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    NotYetDiscovered,
    DiscoverOK,
    HttpsGetFailed,
    ChildVerificationFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedfishEndpoint {
    /// xname of a controller (invariant: `id.component_type().is_controller()`).
    pub id: XName,
    pub fqdn: String,
    /// Opaque reference into the credential store; never the secret itself.
    pub credentials_ref: Option<String>,
    pub discovery_status: DiscoveryStatus,
    pub last_discovery_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

// ── ComponentEndpoint ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEndpoint {
    /// xname of the discovered subcomponent.
    pub id: XName,
    pub endpoint_id: XName,
    /// Redfish `OdataID` for this component on its parent endpoint.
    pub odata_id: String,
    /// Component-specific descriptive payload from discovery, opaque here.
    pub redfish_info: serde_json::Value,
}

/// A service exposed by a discovered endpoint (e.g. `redfish`, `ssh`),
/// discovered alongside its `ComponentEndpoint`s (§4.8, §6 table
/// `service_endpoints`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub endpoint_id: XName,
    pub service_name: String,
    pub uri: String,
}

/// A discovered Ethernet NIC belonging to a component (§6 table
/// `comp_eth_interfaces`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEthInterface {
    pub id: String,
    pub component_id: XName,
    pub mac_address: String,
    pub ip_addresses: Vec<String>,
}

// ── Hardware inventory ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HwInventoryLocation {
    pub id: XName,
    pub hw_type: ComponentType,
    /// FRU id present at this location, if populated.
    pub fru_id: Option<String>,
    pub populated_fru: Option<HwInventoryFru>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HwInventoryFru {
    pub fru_id: String,
    pub fru_type: ComponentType,
    pub manufacturer: Option<String>,
    pub part_number: Option<String>,
    pub serial_number: Option<String>,
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HwInventoryHistoryEntry {
    pub fru_id: String,
    pub location_id: XName,
    pub event_type: HwInventoryEventType,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwInventoryEventType {
    Added,
    Removed,
    Scanned,
}

// ── Reservation ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub component_id: XName,
    pub reservation_key: String,
    pub deputy_key: String,
    /// Absent means the reservation persists while the component is Locked.
    pub expiration: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ── Group / Partition / Membership ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub exclusive_group: Option<String>,
    pub members: Vec<XName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub name: String,
    pub members: Vec<XName>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Membership {
    pub groups: Vec<String>,
    pub partition: Option<String>,
}

// ── Notification subscription ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TriggerType {
    State,
    Role,
    SubRole,
    SoftwareStatus,
    Enabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TriggerFilter {
    pub states: Vec<State>,
    pub roles: Vec<Role>,
    pub sub_roles: Vec<SubRole>,
    pub software_status: Vec<SoftwareStatus>,
    pub enabled: Vec<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub url: String,
    pub triggers: TriggerFilter,
}

// ── Job ────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobStatus {
    Default,
    Queued,
    InProgress,
    Complete,
    Cancelled,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    StateRedfishPoll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub job_type: JobType,
    pub component_id: XName,
    pub status: JobStatus,
    pub keep_alive_interval_secs: u64,
    pub last_keep_alive: DateTime<Utc>,
    pub data: serde_json::Value,
}

// ── Update requests (§4.2) ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    StateData,
    FlagOnly,
    Enabled,
    SoftwareStatus,
    Role,
    Nid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UpdatePayload {
    StateData { state: State, flag: Option<Flag> },
    FlagOnly { flag: Flag },
    Enabled { enabled: bool },
    SoftwareStatus { software_status: SoftwareStatus },
    Role { role: Role, sub_role: Option<SubRole> },
    Nid { nid: Nid },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingModel {
    Rigid,
    Flexible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub component_ids: Vec<XName>,
    pub payload: UpdatePayload,
    pub force: bool,
}

// ── Filtered component queries (§4.6) ────────────────────────────────────

/// Filter predicate for `Persistence::list_components` (§4.6: "by
/// type, state, flag, class, role, subrole, enabled, group, partition, NID
/// range"). Every field is an AND'd predicate; `None`/empty means
/// unconstrained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentFilter {
    pub component_type: Option<ComponentType>,
    pub state: Option<State>,
    pub flag: Option<Flag>,
    pub class: Option<Class>,
    pub role: Option<Role>,
    pub sub_role: Option<SubRole>,
    pub enabled: Option<bool>,
    pub group: Option<String>,
    pub partition: Option<String>,
    pub nid_range: Option<(Nid, Nid)>,
}

impl ComponentFilter {
    /// `true` if `component` satisfies every constrained field. Group and
    /// partition membership are supplied by the caller (the store doesn't
    /// know about `Membership` without a join), via `memberships`.
    pub fn matches(&self, component: &Component, memberships: Option<&Membership>) -> bool {
        if let Some(t) = self.component_type {
            if component.component_type != t {
                return false;
            }
        }
        if let Some(s) = self.state {
            if component.state != s {
                return false;
            }
        }
        if let Some(f) = self.flag {
            if component.flag != f {
                return false;
            }
        }
        if let Some(c) = self.class {
            if component.class != Some(c) {
                return false;
            }
        }
        if let Some(r) = &self.role {
            if component.role.as_ref() != Some(r) {
                return false;
            }
        }
        if let Some(sr) = &self.sub_role {
            if component.sub_role.as_ref() != Some(sr) {
                return false;
            }
        }
        if let Some(e) = self.enabled {
            if component.enabled != e {
                return false;
            }
        }
        if let Some((lo, hi)) = self.nid_range {
            match component.nid {
                Some(n) if n >= lo && n <= hi => {}
                _ => return false,
            }
        }
        if let Some(g) = &self.group {
            match memberships {
                Some(m) if m.groups.iter().any(|x| x == g) => {}
                _ => return false,
            }
        }
        if let Some(p) = &self.partition {
            match memberships {
                Some(m) if m.partition.as_deref() == Some(p.as_str()) => {}
                _ => return false,
            }
        }
        true
    }
}

// ── Discovery commit (§4.8) ──────────────────────────────────────────────

/// Everything a single discovery pass produces, written atomically by
/// `Persistence::commit_discovery` (§4.8).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryBundle {
    pub endpoint: Option<RedfishEndpoint>,
    pub component_endpoints: Vec<ComponentEndpoint>,
    pub hwinv_locations: Vec<HwInventoryLocation>,
    pub components: Vec<Component>,
    pub service_endpoints: Vec<ServiceEndpoint>,
    pub eth_interfaces: Vec<ComponentEthInterface>,
}

/// Per-ID failure reason under `flexible` processing (§4.3, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum FailureReason {
    NotFound,
    ReservationConflict,
    Disabled,
    BadState,
    InvalidKey,
}

pub type HashMapOutputs = HashMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_zeros_and_lowercases() {
        let x = XName::normalize("X0001C0004S0004B0").unwrap();
        assert_eq!(x.as_str(), "x1c4s4b0");
    }

    #[test]
    fn normalize_is_idempotent() {
        let x = XName::normalize("x1c4s4b0").unwrap();
        let y = XName::normalize(x.as_str()).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn rejects_malformed_id() {
        assert!(XName::normalize("not-an-xname").is_err());
        assert!(XName::normalize("").is_err());
        assert!(XName::normalize("c4s4").is_err());
    }

    #[test]
    fn classifies_hierarchy() {
        assert_eq!(XName::normalize("x1").unwrap().component_type(), ComponentType::Cabinet);
        assert_eq!(XName::normalize("x1c4").unwrap().component_type(), ComponentType::Chassis);
        assert_eq!(XName::normalize("x1c4b0").unwrap().component_type(), ComponentType::ChassisBmc);
        assert_eq!(XName::normalize("x1c4s4").unwrap().component_type(), ComponentType::ComputeModule);
        assert_eq!(XName::normalize("x1c4r4").unwrap().component_type(), ComponentType::RouterModule);
        assert_eq!(XName::normalize("x1c4s4b0").unwrap().component_type(), ComponentType::NodeBmc);
        assert_eq!(XName::normalize("x1c4s4b0n0").unwrap().component_type(), ComponentType::Node);
        assert_eq!(XName::normalize("x1c4r4b0").unwrap().component_type(), ComponentType::RouterBmc);
    }

    #[test]
    fn controller_types_are_recognized() {
        assert!(XName::normalize("x1c4b0").unwrap().is_controller());
        assert!(XName::normalize("x1c4s4b0").unwrap().is_controller());
        assert!(!XName::normalize("x1c4s4").unwrap().is_controller());
        assert!(!XName::normalize("x1c4s4b0n0").unwrap().is_controller());
    }

    #[test]
    fn parent_and_ancestors() {
        let x = XName::normalize("x1c4s4b0n0").unwrap();
        assert_eq!(x.parent().unwrap().as_str(), "x1c4s4b0");
        let ancestors: Vec<String> = x.ancestors().iter().map(|a| a.as_str().to_string()).collect();
        assert_eq!(ancestors, vec!["x1c4s4b0", "x1c4s4", "x1c4", "x1"]);
    }

    #[test]
    fn legal_transition_table() {
        assert!(State::On.legal_transition(State::Standby));
        assert!(State::Standby.legal_transition(State::Off));
        assert!(!State::Empty.legal_transition(State::On));
        assert!(State::Populated.legal_transition(State::On));
    }
}
