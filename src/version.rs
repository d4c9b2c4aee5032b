// Version information for the YOLOE API

/// Semantic version number reported by the API
pub const VERSION_NUMBER: &str = "1.0.0";

/// Major version number
pub const VERSION_MAJOR: u32 = 1;

/// Minor version number
pub const VERSION_MINOR: u32 = 0;

/// Patch version number
pub const VERSION_PATCH: u32 = 0;

/// Service title
pub const API_TITLE: &str = "YOLOE API";

/// Service description
pub const API_DESCRIPTION: &str = "YOLOE: Real-Time Seeing Anything API";

/// Upstream project page
pub const GITHUB_URL: &str = "https://github.com/THU-MIG/yoloe";

/// Paper describing the model family
pub const PAPER_URL: &str = "https://arxiv.org/abs/2503.07465";

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("{} {}", API_TITLE, VERSION_NUMBER)
}
