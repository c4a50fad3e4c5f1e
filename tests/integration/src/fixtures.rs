//! Test fixtures and stanza builders
//!
//! Provides reusable stanzas for integration tests.

use stanza_core::{Element, Iq, Jid, Stanza};
use stanza_service::modules::{DISCO_INFO_NAMESPACE, HTTP_UPLOAD_NAMESPACE, LAST_NAMESPACE};
use std::sync::atomic::{AtomicU64, Ordering};

/// Domain served by test servers
pub const DOMAIN: &str = "jackal.im";

/// Counter for unique stanza ids
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique stanza id
pub fn unique_id(prefix: &str) -> String {
    format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Parse a JID, panicking on malformed test input
pub fn jid(s: &str) -> Jid {
    s.parse().unwrap_or_else(|e| panic!("bad test JID {s}: {e}"))
}

/// `user@DOMAIN`, with `/resource` when given
pub fn account(user: &str, resource: Option<&str>) -> Jid {
    match resource {
        Some(resource) => jid(&format!("{user}@{DOMAIN}/{resource}")),
        None => jid(&format!("{user}@{DOMAIN}")),
    }
}

/// The server JID
pub fn server_jid() -> Jid {
    jid(DOMAIN)
}

fn query(namespace: &str, to: Jid) -> Stanza {
    Iq::get(unique_id("iq"))
        .with_to(to)
        .with_payload(Element::builder("query").namespace(namespace).build())
        .into()
}

/// Last activity query (`jabber:iq:last`)
pub fn last_query(to: Jid) -> Stanza {
    query(LAST_NAMESPACE, to)
}

/// Service discovery info query
pub fn disco_info_query(to: Jid) -> Stanza {
    query(DISCO_INFO_NAMESPACE, to)
}

/// Upload slot request with the given `<request/>` attributes
pub fn upload_request(attributes: &[(&str, &str)]) -> Stanza {
    let request = attributes
        .iter()
        .fold(
            Element::builder("request").namespace(HTTP_UPLOAD_NAMESPACE),
            |builder, (key, value)| builder.attribute(*key, *value),
        )
        .build();
    Iq::get(unique_id("upload"))
        .with_to(server_jid())
        .with_payload(request)
        .into()
}
