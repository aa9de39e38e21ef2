//! Service metadata and startup banner

use tracing::info;

/// What the running binary is
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "pulsesrv")
    pub name: String,
    pub version: String,
    pub description: String,
    pub default_port: u16,
    /// ASCII art logged above the service line
    pub banner: Option<&'static str>,
}

impl ServiceInfo {
    /// Service info carrying the version of the calling crate
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        default_port: u16,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: description.into(),
            default_port,
            banner: None,
        }
    }

    pub fn with_banner(mut self, banner: &'static str) -> Self {
        self.banner = Some(banner);
        self
    }

    /// `PULSESRV v0.1.0`
    pub fn headline(&self) -> String {
        format!("{} v{}", self.name.to_uppercase(), self.version)
    }
}

/// Log the banner, name, version and default port
pub fn print_startup_banner(service: &ServiceInfo) {
    if let Some(banner) = service.banner {
        info!("{}", banner);
    }
    info!(" {}", service.headline());
    info!(" {}", service.description);
    info!(" Default Port: {}", service.default_port);
}
