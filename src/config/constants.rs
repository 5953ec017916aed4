//! Configuration constants.
//!
//! Defaults applied when a caller leaves a request option unset.

/// Number of redirects followed automatically when `follow_redirects` is unset.
pub const DEFAULT_FOLLOW_REDIRECTS: u32 = 3;

/// HTTP method used when `method` is unset.
pub const DEFAULT_METHOD: &str = "GET";

/// Port used for plain `http` targets without an explicit port.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Port used for secure `https` targets without an explicit port.
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Process-wide strict-SSL default (certificate verification enabled).
pub const DEFAULT_STRICT_SSL: bool = true;

// Header names
/// Header carrying proxy credentials, merged into every request.
pub const HEADER_PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
/// Redirect target header.
pub const HEADER_LOCATION: &str = "location";
/// Header naming the body's content coding.
pub const HEADER_CONTENT_ENCODING: &str = "content-encoding";

/// Content coding that triggers transparent decompression.
pub const GZIP_ENCODING: &str = "gzip";

// Proxy environment variables, in lookup order
/// Proxy for `http` targets (and `https` targets without their own).
pub const ENV_HTTP_PROXY: &[&str] = &["HTTP_PROXY", "http_proxy"];
/// Proxy for `https` targets.
pub const ENV_HTTPS_PROXY: &[&str] = &["HTTPS_PROXY", "https_proxy"];
/// Hosts, IPs and CIDR ranges that bypass the proxy.
pub const ENV_NO_PROXY: &[&str] = &["NO_PROXY", "no_proxy"];
