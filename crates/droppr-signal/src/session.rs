//! Resolving upgrade requests to sessions
//!
//! Authorization happens before a connection reaches the relay. A resolver
//! looks at the upgrade request and says which channel and role it belongs
//! to; the relay trusts that answer.

use tokio_tungstenite::tungstenite::handshake::server::Request;
use tokio_tungstenite::tungstenite::http::header::COOKIE;

use droppr_core::{ChannelId, Role, Session};

/// Cookie holding the drop id
pub const DROP_ID_COOKIE: &str = "drop_id";

/// Cookie holding the drop role
pub const DROP_ROLE_COOKIE: &str = "drop_role";

/// Resolves an upgrade request to a session, or `None` if unauthorized
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, request: &Request) -> Option<Session>;
}

/// Reads the session from the `drop_id` and `drop_role` cookies set when a
/// drop is registered or claimed
///
/// Validating the cookie values against the session store is left to the
/// deployment in front of the relay.
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieSessionResolver;

impl SessionResolver for CookieSessionResolver {
    fn resolve(&self, request: &Request) -> Option<Session> {
        let mut drop_id = None;
        let mut drop_role = None;

        for header in request.headers().get_all(COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            for (name, value) in parse_cookies(header) {
                match name {
                    DROP_ID_COOKIE => drop_id = Some(value),
                    DROP_ROLE_COOKIE => drop_role = Some(value),
                    _ => {}
                }
            }
        }

        let channel_id = ChannelId::from(drop_id?);
        if channel_id.is_empty() {
            return None;
        }
        let role: Role = drop_role?.parse().ok()?;
        Some(Session::new(channel_id, role))
    }
}

fn parse_cookies(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim().trim_matches('"')))
}
