use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
};

use axum::{
    extract::{ConnectInfo, Request},
    middleware::{from_fn, Next},
    Router,
};
use tracing::{debug, error, warn};

use crate::RealIpConfig;

pub fn add<S: Clone + Send + Sync + 'static>(
    real_ip_config: Option<Arc<RealIpConfig>>,
) -> impl FnOnce(Router<S>) -> Router<S> {
    |router| {
        router.layer(from_fn(move |mut request: Request, next: Next| {
            let client_ip = ClientIp::from_request(&request, real_ip_config.as_deref());
            request.extensions_mut().insert(client_ip);
            next.run(request)
        }))
    }
}

/// Address of the client which sent the request. Used as the rate limiting
/// key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientIp(pub IpAddr);

impl ClientIp {
    fn from_request(request: &Request, real_ip_config: Option<&RealIpConfig>) -> Self {
        let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() else {
            warn!("peer address not available");
            return Self(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        };
        let client_ip = peer.ip();

        let Some(RealIpConfig { header, set_from }) = real_ip_config else {
            return Self(client_ip);
        };

        let header_value = request.headers().get(header);

        if *set_from != client_ip {
            if let Some(header_value) = header_value {
                debug!(%client_ip, ?header_value, "ignoring real ip header value from untrusted source");
            }
            return Self(client_ip);
        }

        let Some(header_value) = header_value else {
            warn!(%client_ip, "real ip header not found");
            return Self(client_ip);
        };

        // proxies append to X-Forwarded-For, so the left most entry is the client
        let Some(real_ip) = header_value
            .to_str()
            .ok()
            .and_then(|value| value.split(',').next())
            .and_then(|real_ip| real_ip.trim().parse().ok())
        else {
            error!(%client_ip, ?header_value, "failed to parse real ip header value");
            return Self(client_ip);
        };

        Self(real_ip)
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    const PROXY: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

    fn config() -> RealIpConfig {
        RealIpConfig {
            header: "X-Real-Ip".into(),
            set_from: PROXY,
        }
    }

    fn request(peer: IpAddr, real_ip: Option<&str>) -> Request {
        let mut builder = Request::builder();
        if let Some(real_ip) = real_ip {
            builder = builder.header("X-Real-Ip", real_ip);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((peer, 1234))));
        request
    }

    #[test]
    fn peer_address() {
        let peer = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
        let result = ClientIp::from_request(&request(peer, Some("198.51.100.1")), None);
        assert_eq!(result, ClientIp(peer));
    }

    #[test]
    fn trusted_proxy() {
        let result = ClientIp::from_request(
            &request(PROXY, Some("198.51.100.1, 10.0.0.1")),
            Some(&config()),
        );
        assert_eq!(result, ClientIp("198.51.100.1".parse().unwrap()));
    }

    #[test]
    fn untrusted_proxy() {
        let peer = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));
        let result =
            ClientIp::from_request(&request(peer, Some("198.51.100.1")), Some(&config()));
        assert_eq!(result, ClientIp(peer));
    }

    #[test]
    fn invalid_header() {
        let result = ClientIp::from_request(&request(PROXY, Some("garbage")), Some(&config()));
        assert_eq!(result, ClientIp(PROXY));
    }

    #[test]
    fn missing_peer_address() {
        let request = Request::builder().body(Body::empty()).unwrap();
        let result = ClientIp::from_request(&request, None);
        assert_eq!(result, ClientIp(IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
    }
}
