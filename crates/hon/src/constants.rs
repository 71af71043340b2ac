//! Constants shared by the hOn integration and its platforms

/// Integration domain, also the key of its shared state
pub const DOMAIN: &str = "hon";

pub const CONF_EMAIL: &str = "email";
pub const CONF_PASSWORD: &str = "password";

/// Entry data key caching the account's refresh token across restarts
pub const CONF_REFRESH_TOKEN: &str = "refresh_token";

/// Device identifier presented to the hOn cloud
pub const MOBILE_ID: &str = "homassistant";

/// Platform modules every hOn entry is forwarded to
pub const PLATFORMS: &[&str] = &[
    "binary_sensor",
    "button",
    "climate",
    "fan",
    "light",
    "lock",
    "number",
    "select",
    "sensor",
    "switch",
];
