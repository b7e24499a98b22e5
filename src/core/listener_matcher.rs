/*
 * Resolves the association between proxy servers and the local listeners that
 * forward to them. A listener names servers through its filter's `server_ids`; the
 * same server may be named by several listeners, in which case the first listener
 * in stored (port) order wins. The tests below pin that tie-break.
 */
use super::models::{LocalListener, ManagerSnapshot, ProxyServer, ServerFilter};
use std::collections::HashMap;

/// Returns the first listener whose filter explicitly names `server_id`.
pub fn match_listener<'a>(
    server_id: &str,
    listeners: impl IntoIterator<Item = &'a LocalListener>,
) -> Option<&'a LocalListener> {
    listeners
        .into_iter()
        .find(|listener| listener.filter.server_ids.contains(server_id))
}

/*
 * Precomputed server-id -> listener-port lookup for one snapshot, built in a single
 * pass over the listeners.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerIndex {
    port_by_server_id: HashMap<String, u16>,
}

impl ListenerIndex {
    pub fn build(snapshot: &ManagerSnapshot) -> Self {
        let mut port_by_server_id = HashMap::new();
        for listener in snapshot.listeners.values() {
            for server_id in &listener.filter.server_ids {
                port_by_server_id
                    .entry(server_id.clone())
                    .or_insert(listener.port);
            }
        }
        log::trace!(
            "ListenerIndex: Indexed {} server ids over {} listeners.",
            port_by_server_id.len(),
            snapshot.listeners.len()
        );
        ListenerIndex { port_by_server_id }
    }

    pub fn port_for(&self, server_id: &str) -> Option<u16> {
        self.port_by_server_id.get(server_id).copied()
    }

    pub fn listener_for<'a>(
        &self,
        server_id: &str,
        snapshot: &'a ManagerSnapshot,
    ) -> Option<&'a LocalListener> {
        self.port_for(server_id)
            .and_then(|port| snapshot.listeners.get(&port))
    }

    pub fn len(&self) -> usize {
        self.port_by_server_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.port_by_server_id.is_empty()
    }
}

impl ServerFilter {
    /*
     * Whether this filter lets the listener forward through `server`. An ignore-all
     * filter connects directly and accepts no server. Otherwise every filter tag
     * must be active on the server, and a non-empty id set must contain the server.
     */
    pub fn accepts(&self, server: &ProxyServer) -> bool {
        if self.ignore_all {
            return false;
        }
        if !self.tags.iter().all(|tag| server.has_tag(tag)) {
            return false;
        }
        self.server_ids.is_empty() || self.server_ids.contains(&server.id)
    }
}

/// Servers `filter` would accept, in id order.
pub fn candidate_servers<'a>(
    filter: &ServerFilter,
    snapshot: &'a ManagerSnapshot,
) -> Vec<&'a ProxyServer> {
    snapshot
        .servers
        .values()
        .filter(|server| filter.accepts(server))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn listener_for_ids(port: u16, ids: &[&str]) -> LocalListener {
        LocalListener::new(
            port,
            ServerFilter {
                server_ids: ids.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
                ..ServerFilter::default()
            },
        )
    }

    fn tagged_server(id: &str, tags: &[&str]) -> ProxyServer {
        let mut server = ProxyServer::new(id, "h", 1);
        for tag in tags {
            server.tags.insert(tag.to_string(), true);
        }
        server
    }

    #[test]
    fn test_match_listener_first_in_order_wins() {
        let a = listener_for_ids(9000, &["s1"]);
        let b = listener_for_ids(9001, &["s1"]);
        let listeners = vec![a.clone(), b.clone()];
        for _ in 0..3 {
            assert_eq!(match_listener("s1", &listeners), Some(&a));
        }
        // Order is what decides, not the port.
        let reversed = vec![b.clone(), a.clone()];
        assert_eq!(match_listener("s1", &reversed), Some(&b));
    }

    #[test]
    fn test_match_listener_none_when_unreferenced() {
        let listeners = vec![listener_for_ids(9000, &["s1", "s2"])];
        assert!(match_listener("s3", &listeners).is_none());
        assert!(match_listener("s1", &Vec::<LocalListener>::new()).is_none());
    }

    #[test]
    fn test_index_agrees_with_linear_match() {
        let mut snapshot = ManagerSnapshot::default();
        for listener in [
            listener_for_ids(9002, &["s2", "s3"]),
            listener_for_ids(9000, &["s1"]),
            listener_for_ids(9001, &["s1", "s2"]),
        ] {
            snapshot.listeners.insert(listener.port, listener);
        }

        let index = ListenerIndex::build(&snapshot);
        assert_eq!(index.len(), 3);
        for id in ["s1", "s2", "s3", "s4"] {
            assert_eq!(
                index.listener_for(id, &snapshot),
                match_listener(id, snapshot.listeners.values()),
                "mismatch for {id}"
            );
        }
        assert_eq!(index.port_for("s1"), Some(9000));
        assert_eq!(index.port_for("s2"), Some(9001));
    }

    #[test]
    fn test_filter_accepts_tags_and_ids() {
        let server = tagged_server("s1", &["http", "VN"]);

        let by_tag = ServerFilter {
            tags: vec!["http".to_string()],
            ..ServerFilter::default()
        };
        assert!(by_tag.accepts(&server));

        let missing_tag = ServerFilter {
            tags: vec!["http".to_string(), "US".to_string()],
            ..ServerFilter::default()
        };
        assert!(!missing_tag.accepts(&server));

        let wrong_id = ServerFilter {
            server_ids: ["s2".to_string()].into_iter().collect(),
            ..ServerFilter::default()
        };
        assert!(!wrong_id.accepts(&server));

        let direct = ServerFilter {
            ignore_all: true,
            ..ServerFilter::default()
        };
        assert!(!direct.accepts(&server));
    }

    #[test]
    fn test_candidate_servers_in_id_order() {
        let mut snapshot = ManagerSnapshot::default();
        for server in [
            tagged_server("b", &["socks5"]),
            tagged_server("a", &["socks5"]),
            tagged_server("c", &["http"]),
        ] {
            snapshot.servers.insert(server.id.clone(), server);
        }
        let filter = ServerFilter {
            tags: vec!["socks5".to_string()],
            ..ServerFilter::default()
        };
        let ids: Vec<&str> = candidate_servers(&filter, &snapshot)
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
