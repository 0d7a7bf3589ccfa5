use serde::{Deserialize, Serialize};

use crate::geometry::{sanitize_ratio, ClientPoint, PagePoint, PageRect, ScrollOffset};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Top-left of the viewport's client area in screen points, below any
/// browser toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Live viewport state at the moment a selection or capture happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub url: String,
    pub user_agent: String,
    pub width: f64,
    pub height: f64,
    pub scroll: ScrollOffset,
    pub device_pixel_ratio: f64,
    pub screen: ScreenSize,
    /// Needed for live grabs; saved grabs are already viewport-sized.
    pub screen_origin: Option<ScreenPoint>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            url: String::new(),
            user_agent: String::new(),
            width: 1280.0,
            height: 720.0,
            scroll: ScrollOffset::default(),
            device_pixel_ratio: 1.0,
            screen: ScreenSize {
                width: 1280,
                height: 720,
            },
            screen_origin: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

/// Page facts attached to every screenshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMetadata {
    pub url: String,
    pub device_class: DeviceClass,
    pub browser_name: String,
    pub screen_resolution: String,
    pub viewport_size: String,
}

impl Viewport {
    pub fn dpr(&self) -> f64 {
        sanitize_ratio(self.device_pixel_ratio)
    }

    pub fn client_to_page(&self, point: ClientPoint) -> PagePoint {
        point.to_page(self.scroll)
    }

    /// The visible viewport in page coordinates.
    pub fn visible_rect(&self) -> PageRect {
        PageRect::new(self.scroll.x, self.scroll.y, self.width, self.height)
    }

    pub fn device_class(&self) -> DeviceClass {
        if self.width < 768.0 {
            DeviceClass::Mobile
        } else if self.width < 1024.0 {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn browser_name(&self) -> &'static str {
        browser_from_user_agent(&self.user_agent)
    }

    pub fn page_metadata(&self) -> PageMetadata {
        PageMetadata {
            url: self.url.clone(),
            device_class: self.device_class(),
            browser_name: self.browser_name().to_string(),
            screen_resolution: format!("{}x{}", self.screen.width, self.screen.height),
            viewport_size: format!("{}x{}", self.width.round(), self.height.round()),
        }
    }
}

// Chromium derivatives also carry "Chrome/" and Chrome carries "Safari/",
// so the more specific tokens are checked first.
fn browser_from_user_agent(ua: &str) -> &'static str {
    if ua.contains("Edg/") || ua.contains("Edge/") {
        "Edge"
    } else if ua.contains("OPR/") || ua.contains("Opera") {
        "Opera"
    } else if ua.contains("Firefox/") {
        "Firefox"
    } else if ua.contains("Chrome/") || ua.contains("CriOS/") {
        "Chrome"
    } else if ua.contains("Safari/") {
        "Safari"
    } else {
        "Unknown"
    }
}
