//! User-agent parsing for open/click distributions

use serde::{Deserialize, Serialize};

/// Device class derived from a user-agent string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
    Unknown,
}

impl DeviceClass {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "Desktop",
            DeviceClass::Mobile => "Mobile",
            DeviceClass::Tablet => "Tablet",
            DeviceClass::Unknown => "Unknown",
        }
    }
}

/// Parsed user-agent facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentInfo {
    pub browser: String,
    pub os: String,
    pub device: DeviceClass,
}

impl Default for UserAgentInfo {
    fn default() -> Self {
        Self {
            browser: "Unknown".to_string(),
            os: "Unknown".to_string(),
            device: DeviceClass::Unknown,
        }
    }
}

/// Best-effort classification of a raw user-agent string.
///
/// Order matters: Chrome-family agents also mention Safari, Edge mentions
/// Chrome, and tablets often mention Mobile.
pub fn parse_user_agent(user_agent: Option<&str>) -> UserAgentInfo {
    let Some(raw) = user_agent else {
        return UserAgentInfo::default();
    };
    let ua = raw.to_lowercase();
    if ua.is_empty() {
        return UserAgentInfo::default();
    }

    let browser = if ua.contains("edg") {
        "Edge"
    } else if ua.contains("opr") || ua.contains("opera") {
        "Opera"
    } else if ua.contains("chrome") {
        "Chrome"
    } else if ua.contains("firefox") {
        "Firefox"
    } else if ua.contains("safari") {
        "Safari"
    } else {
        "Unknown"
    };

    let os = if ua.contains("windows nt") {
        "Windows"
    } else if ua.contains("mac os x") || ua.contains("macos") {
        // iPhones report "like Mac OS X"
        if ua.contains("iphone") || ua.contains("ipad") {
            "iOS"
        } else {
            "macOS"
        }
    } else if ua.contains("android") {
        "Android"
    } else if ua.contains("iphone os") || ua.contains("ios") {
        "iOS"
    } else if ua.contains("linux") {
        "Linux"
    } else {
        "Unknown"
    };

    let is_tablet = ["tablet", "ipad", "kindle", "silk"]
        .iter()
        .any(|t| ua.contains(t));
    let is_mobile = !is_tablet
        && ["mobile", "android", "iphone", "ipod", "blackberry", "windows phone"]
            .iter()
            .any(|t| ua.contains(t));

    let device = if is_tablet {
        DeviceClass::Tablet
    } else if is_mobile {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    };

    UserAgentInfo {
        browser: browser.to_string(),
        os: os.to_string(),
        device,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CHROME_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const EDGE_WIN: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0";
    const FIREFOX_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

    #[test]
    fn test_chrome_on_windows_desktop() {
        let info = parse_user_agent(Some(CHROME_WIN));
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "Windows");
        assert_eq!(info.device, DeviceClass::Desktop);
    }

    #[test]
    fn test_safari_on_iphone_is_mobile() {
        let info = parse_user_agent(Some(SAFARI_IPHONE));
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.os, "iOS");
        assert_eq!(info.device, DeviceClass::Mobile);
    }

    #[test]
    fn test_edge_wins_over_chrome_token() {
        let info = parse_user_agent(Some(EDGE_WIN));
        assert_eq!(info.browser, "Edge");
    }

    #[test]
    fn test_firefox_on_linux() {
        let info = parse_user_agent(Some(FIREFOX_LINUX));
        assert_eq!(info.browser, "Firefox");
        assert_eq!(info.os, "Linux");
    }

    #[test]
    fn test_ipad_is_tablet_not_mobile() {
        let info = parse_user_agent(Some(SAFARI_IPAD));
        assert_eq!(info.device, DeviceClass::Tablet);
        assert_eq!(info.os, "iOS");
    }

    #[test]
    fn test_missing_or_empty_agent() {
        assert_eq!(parse_user_agent(None), UserAgentInfo::default());
        assert_eq!(parse_user_agent(Some("")), UserAgentInfo::default());
    }
}
