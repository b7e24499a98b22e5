/*
 * Defines the backend-owned records mirrored by the client: proxy servers, local
 * listeners, the manager snapshot that groups them, and the ancillary app state.
 * All of them decode from the backend's PascalCase JSON and derive `PartialEq`, so
 * two snapshots compare structurally (maps by key, sequences by position) no matter
 * in which order the backend happened to emit their fields.
 */
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;

pub const PROTOCOL_HTTP: &str = "http";
pub const PROTOCOL_SOCKS5: &str = "socks5";
pub const PROTOCOL_SSH: &str = "ssh";

pub const KNOWN_PROTOCOLS: [&str; 3] = [PROTOCOL_HTTP, PROTOCOL_SOCKS5, PROTOCOL_SSH];

const NANOS_PER_MILLI: i64 = 1_000_000;

// The backend encodes empty slices and maps as `null`; treat those as empty collections.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdSetRepr {
    List(Vec<String>),
    Flags(BTreeMap<String, bool>),
}

// `ServerIds` is a set on our side; the backend may send it as a list or as a
// `name -> bool` map in which only `true` keys are members.
fn deserialize_id_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<IdSetRepr>::deserialize(deserializer)? {
        None => BTreeSet::new(),
        Some(IdSetRepr::List(ids)) => ids.into_iter().collect(),
        Some(IdSetRepr::Flags(flags)) => flags
            .into_iter()
            .filter_map(|(id, enabled)| enabled.then_some(id))
            .collect(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

impl ProxyAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        ProxyAuth {
            username: username.into(),
            password: password.into(),
        }
    }
}

/*
 * A remote proxy server as reported by the backend. The client never edits one of
 * these; deletions and rechecks are requested from the backend and observed on the
 * next sync.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProxyServer {
    /* Filled from the servers map key when the record itself carries none. */
    #[serde(default)]
    pub id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub auth: Option<ProxyAuth>,
    #[serde(default)]
    pub public_ip: String,
    /* Latency in nanoseconds, `None` until the first check completes. */
    #[serde(default)]
    pub latency: Option<i64>,
    #[serde(
        rename = "LastChecked",
        default,
        with = "time::serde::rfc3339::option"
    )]
    pub last_checked_at: Option<OffsetDateTime>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub protocols: BTreeMap<String, bool>,
    /* On the wire the tags sit on the managed-server envelope, not the server. */
    #[serde(default, skip_serializing, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, bool>,
}

impl ProxyServer {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        ProxyServer {
            id: id.into(),
            host: host.into(),
            port,
            auth: None,
            public_ip: String::new(),
            latency: None,
            last_checked_at: None,
            protocols: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn supports(&self, protocol: &str) -> bool {
        self.protocols.get(protocol).copied().unwrap_or(false)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.get(tag).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerFilter {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub ignore_all: bool,
    #[serde(default, deserialize_with = "deserialize_id_set")]
    pub server_ids: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerStat {
    #[serde(default)]
    pub sent: u64,
    #[serde(default)]
    pub received: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LocalListener {
    pub port: u16,
    #[serde(default)]
    pub filter: ServerFilter,
    #[serde(default)]
    pub stat: ListenerStat,
    /* Carried by the managed-listener envelope on the wire. */
    #[serde(default, skip_serializing)]
    pub is_serving: bool,
}

impl LocalListener {
    pub fn new(port: u16, filter: ServerFilter) -> Self {
        LocalListener {
            port,
            filter,
            stat: ListenerStat::default(),
            is_serving: false,
        }
    }
}

/*
 * The complete manager state returned by every poll. Maps are ordered by key so
 * that listener iteration order (by port) is stable across snapshots.
 *
 * The backend nests each server and listener in a managed envelope
 * (`{"Server": {..}, "Tags": {..}}`, `{"Listener": {..}, "IsServing": ..}`) and
 * reports the recheck interval as a duration in nanoseconds. The snapshot is
 * decoded from and encoded to that shape through `ManagerSnapshotWire`, while the
 * rest of the client works with the flattened records.
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ManagerSnapshotWire", into = "ManagerSnapshotWire")]
pub struct ManagerSnapshot {
    pub servers: BTreeMap<String, ProxyServer>,
    pub listeners: BTreeMap<u16, LocalListener>,
    pub server_recheck_interval_ms: u64,
    pub is_serving: bool,
}

impl ManagerSnapshot {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManagedServerWire {
    server: ProxyServer,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: BTreeMap<String, bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManagedListenerWire {
    listener: LocalListener,
    #[serde(default)]
    is_serving: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManagerSnapshotWire {
    #[serde(default, deserialize_with = "null_as_default")]
    servers: BTreeMap<String, ManagedServerWire>,
    #[serde(default, deserialize_with = "null_as_default")]
    listeners: BTreeMap<u16, ManagedListenerWire>,
    /* Nanoseconds. */
    #[serde(default)]
    server_recheck_interval: i64,
    #[serde(default)]
    is_serving: bool,
}

impl From<ManagerSnapshotWire> for ManagerSnapshot {
    fn from(wire: ManagerSnapshotWire) -> Self {
        let servers = wire
            .servers
            .into_iter()
            .map(|(key, managed)| {
                let mut server = managed.server;
                if server.id.is_empty() {
                    server.id = key.clone();
                }
                server.tags = managed.tags;
                // An unchecked server reports a zero latency.
                if server.last_checked_at.is_none() && server.latency == Some(0) {
                    server.latency = None;
                }
                (key, server)
            })
            .collect();
        let listeners = wire
            .listeners
            .into_iter()
            .map(|(port, managed)| {
                let mut listener = managed.listener;
                listener.is_serving = managed.is_serving;
                (port, listener)
            })
            .collect();
        ManagerSnapshot {
            servers,
            listeners,
            server_recheck_interval_ms: u64::try_from(wire.server_recheck_interval / NANOS_PER_MILLI)
                .unwrap_or(0),
            is_serving: wire.is_serving,
        }
    }
}

impl From<ManagerSnapshot> for ManagerSnapshotWire {
    fn from(snapshot: ManagerSnapshot) -> Self {
        ManagerSnapshotWire {
            servers: snapshot
                .servers
                .into_iter()
                .map(|(key, server)| {
                    let tags = server.tags.clone();
                    (key, ManagedServerWire { server, tags })
                })
                .collect(),
            listeners: snapshot
                .listeners
                .into_iter()
                .map(|(port, listener)| {
                    let is_serving = listener.is_serving;
                    (port, ManagedListenerWire { listener, is_serving })
                })
                .collect(),
            server_recheck_interval: i64::try_from(snapshot.server_recheck_interval_ms)
                .unwrap_or(i64::MAX / NANOS_PER_MILLI)
                .saturating_mul(NANOS_PER_MILLI),
            is_serving: snapshot.is_serving,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppState {
    #[serde(default)]
    pub local_ip: String,
}

/* One parsed import line. `auth` is present once a username column exists. */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PreviewRecord {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub auth: Option<ProxyAuth>,
}

impl PreviewRecord {
    pub fn username(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.username.as_str())
    }

    pub fn password(&self) -> Option<&str> {
        self.auth.as_ref().map(|a| a.password.as_str())
    }
}
