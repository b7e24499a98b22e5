/*
 * Parsing for pasted proxy lists. Input is free-form text in which each line holds
 * host, port, username and password separated by one of a few common delimiters,
 * optionally preceded by columns to skip and a header line. Parsing never fails
 * loudly: a line that yields nothing usable is reported as `None` and skipped.
 */
use super::models::{PreviewRecord, ProxyAuth};

pub const DELIMITER_CANDIDATES: [&str; 4] = [";", "|", ":", ","];
pub const DEFAULT_DELIMITER: &str = ";";

/// Parameters shared by the line preview and the whole-text import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportParams {
    pub delimiter: String,
    pub skip_columns: usize,
    pub default_port: u16,
    pub skip_header: bool,
}

/// Picks the candidate delimiter occurring most often in `text`.
///
/// Ties go to the earlier candidate; text without any candidate yields `;`.
pub fn detect_delimiter(text: &str) -> &'static str {
    let mut best = DEFAULT_DELIMITER;
    let mut best_count = 0;
    for candidate in DELIMITER_CANDIDATES {
        let count = text.matches(candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

fn parse_port(field: &str) -> Option<u16> {
    field.trim().parse::<u16>().ok().filter(|port| *port > 0)
}

/*
 * Parses one line into a preview record. Fields after the skipped columns are read
 * positionally as host, port, username, password. A missing or invalid port takes
 * `default_port`; credentials exist once a username column is present. Returns
 * `None` when no host remains.
 */
pub fn parse_line(
    line: &str,
    delimiter: &str,
    skip_columns: usize,
    default_port: u16,
) -> Option<PreviewRecord> {
    if delimiter.is_empty() {
        log::debug!("ImportParser: Empty delimiter, cannot split line.");
        return None;
    }

    let mut fields = line.trim().split(delimiter).skip(skip_columns).map(str::trim);

    let host = fields.next().filter(|h| !h.is_empty())?.to_string();
    let port = fields.next().and_then(parse_port).unwrap_or(default_port);
    let auth = fields.next().map(|username| {
        let password = fields.next().unwrap_or_default();
        ProxyAuth::new(username, password)
    });

    Some(PreviewRecord { host, port, auth })
}

/// Returns the first line a preview should be built from, honoring `skip_header`.
pub fn first_data_line(text: &str, skip_header: bool) -> Option<&str> {
    let mut lines = text.trim().lines();
    if skip_header {
        lines.next();
    }
    lines.find(|line| !line.trim().is_empty())
}

/*
 * Parses a whole pasted document the way a bulk import interprets it: the text is
 * trimmed, the header line dropped when requested, and every remaining line parsed.
 * Lines that produce nothing are skipped.
 */
pub fn parse_bulk(text: &str, params: &ImportParams) -> Vec<PreviewRecord> {
    let mut lines = text.trim().lines();
    if params.skip_header {
        lines.next();
    }
    lines
        .filter_map(|line| {
            parse_line(
                line,
                &params.delimiter,
                params.skip_columns,
                params.default_port,
            )
        })
        .collect()
}

/// A scheme-aware parse of `[scheme://][user:pass@]host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEndpoint {
    pub scheme: Option<String>,
    pub record: PreviewRecord,
}

/*
 * Inverse of `serialize_endpoint`. Credentials are split at the last `@` and then
 * at the first `:`; the port is taken after the last `:` of the address part, so
 * bracketed IPv6 hosts keep their colons.
 */
pub fn parse_endpoint(text: &str, default_port: u16) -> Option<ParsedEndpoint> {
    let text = text.trim();
    let (scheme, rest) = match text.split_once("://") {
        Some((scheme, rest)) => (Some(scheme.to_ascii_lowercase()), rest),
        None => (None, text),
    };

    let (auth, address) = match rest.rsplit_once('@') {
        Some((credentials, address)) => {
            let (username, password) = credentials.split_once(':').unwrap_or((credentials, ""));
            (Some(ProxyAuth::new(username, password)), address)
        }
        None => (None, rest),
    };

    let (host, port) = match address.rsplit_once(':') {
        Some((host, port)) if !host.ends_with(':') => {
            (host, parse_port(port).unwrap_or(default_port))
        }
        _ => (address, default_port),
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }

    Some(ParsedEndpoint {
        scheme,
        record: PreviewRecord {
            host: host.to_string(),
            port,
            auth,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::formatting::serialize_endpoint;
    use crate::core::models::{PROTOCOL_HTTP, ProxyServer};

    fn params(delimiter: &str) -> ImportParams {
        ImportParams {
            delimiter: delimiter.to_string(),
            skip_columns: 0,
            default_port: 22,
            skip_header: false,
        }
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c"), ";");
        assert_eq!(detect_delimiter("a|b,c|d|e"), "|");
        assert_eq!(detect_delimiter("abc"), ";");
        assert_eq!(detect_delimiter(""), ";");
        assert_eq!(detect_delimiter("1.2.3.4:80:u:p\n5.6.7.8:81:u:p"), ":");
    }

    #[test]
    fn test_detect_delimiter_tie_prefers_earlier_candidate() {
        assert_eq!(detect_delimiter("a,b:c"), ":");
        assert_eq!(detect_delimiter("a|b;c"), ";");
    }

    #[test]
    fn test_parse_line_all_fields() {
        let record = parse_line("1.2.3.4:8080:user:pass", ":", 0, 22).unwrap();
        assert_eq!(record.host, "1.2.3.4");
        assert_eq!(record.port, 8080);
        assert_eq!(record.username(), Some("user"));
        assert_eq!(record.password(), Some("pass"));
    }

    #[test]
    fn test_parse_line_defaults_missing_port() {
        let record = parse_line("1.2.3.4", ":", 0, 22).unwrap();
        assert_eq!(record.host, "1.2.3.4");
        assert_eq!(record.port, 22);
        assert!(record.auth.is_none());
    }

    #[test]
    fn test_parse_line_invalid_port_uses_default() {
        assert_eq!(parse_line("h;abc", ";", 0, 22).unwrap().port, 22);
        assert_eq!(parse_line("h;0", ";", 0, 22).unwrap().port, 22);
        assert_eq!(parse_line("h;-5", ";", 0, 22).unwrap().port, 22);
        assert_eq!(parse_line("h;70000", ";", 0, 22).unwrap().port, 22);
    }

    #[test]
    fn test_parse_line_username_without_password() {
        let record = parse_line("h|81|alice", "|", 0, 22).unwrap();
        assert_eq!(record.username(), Some("alice"));
        assert_eq!(record.password(), Some(""));
    }

    #[test]
    fn test_parse_line_skip_columns() {
        let record = parse_line("VN;label;10.0.0.1;3128;u;p", ";", 2, 22).unwrap();
        assert_eq!(record.host, "10.0.0.1");
        assert_eq!(record.port, 3128);
        assert!(parse_line("a;b", ";", 5, 22).is_none());
    }

    #[test]
    fn test_parse_line_blank_or_empty_delimiter() {
        assert!(parse_line("   ", ";", 0, 22).is_none());
        assert!(parse_line("h:1", "", 0, 22).is_none());
    }

    #[test]
    fn test_parse_line_trims_carriage_returns() {
        let record = parse_line("h,8080,u,p\r", ",", 0, 22).unwrap();
        assert_eq!(record.password(), Some("p"));
    }

    #[test]
    fn test_first_data_line_honors_header_and_blanks() {
        let text = "host;port\n\n1.1.1.1;80\n2.2.2.2;81";
        assert_eq!(first_data_line(text, false), Some("host;port"));
        assert_eq!(first_data_line(text, true), Some("1.1.1.1;80"));
        assert_eq!(first_data_line("only header", true), None);
        assert_eq!(first_data_line("", false), None);
    }

    #[test]
    fn test_parse_bulk_skips_header_and_blank_lines() {
        let text = "\nhost;port;user;pass\n1.1.1.1;80;a;b\n\n2.2.2.2;x\n";
        let mut p = params(";");
        p.skip_header = true;
        let records = parse_bulk(text, &p);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].host, "1.1.1.1");
        assert_eq!(records[1].port, 22);
    }

    #[test]
    fn test_endpoint_round_trip() {
        let mut server = ProxyServer::new("s1", "1.2.3.4", 8080);
        server.auth = Some(ProxyAuth::new("user", "pass"));
        server.protocols.insert(PROTOCOL_HTTP.to_string(), true);

        let parsed = parse_endpoint(&serialize_endpoint(&server), 22).unwrap();
        assert_eq!(parsed.scheme.as_deref(), Some("http"));
        assert_eq!(parsed.record.host, server.host);
        assert_eq!(parsed.record.port, server.port);
        assert_eq!(parsed.record.auth, server.auth);
    }

    #[test]
    fn test_parse_endpoint_plain_and_ipv6() {
        let plain = parse_endpoint("example.org:3128", 22).unwrap();
        assert!(plain.scheme.is_none());
        assert!(plain.record.auth.is_none());
        assert_eq!(plain.record.port, 3128);

        let v6 = parse_endpoint("socks5://[::1]:9002", 22).unwrap();
        assert_eq!(v6.record.host, "::1");
        assert_eq!(v6.record.port, 9002);

        let no_port = parse_endpoint("example.org", 22).unwrap();
        assert_eq!(no_port.record.port, 22);
    }
}
