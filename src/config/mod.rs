use std::env;

use crate::models::compliance::AggregationOptions;
use crate::parsers::cci_list::{CatalogOptions, DEFAULT_REFERENCE_TITLE};

/// Default upload cap: 50 MiB.
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub cci_reference_title: String,
    pub include_not_applicable_as_compliant: bool,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            cci_reference_title: env::var("CCI_REFERENCE_TITLE")
                .unwrap_or_else(|_| DEFAULT_REFERENCE_TITLE.to_string()),
            include_not_applicable_as_compliant: parse_flag(
                env::var("INCLUDE_NOT_APPLICABLE_AS_COMPLIANT").ok().as_deref(),
            ),
            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        })
    }

    /// Aggregation options derived from configuration.
    pub fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions {
            include_not_applicable_as_compliant: self.include_not_applicable_as_compliant,
        }
    }

    /// Catalog loader options derived from configuration.
    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            reference_title: self.cci_reference_title.clone(),
        }
    }
}

/// `true`/`1`/`yes`/`on` (any case) enable a flag; anything else disables it.
fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes" | "on")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "postgres://localhost/stigmap".to_string(),
            database_max_connections: 5,
            host: "127.0.0.1".to_string(),
            port: 3000,
            frontend_url: "http://localhost:5173".to_string(),
            cci_reference_title: "Revision 5".to_string(),
            include_not_applicable_as_compliant: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    #[test]
    fn flag_parsing() {
        assert!(parse_flag(Some("TRUE")));
        assert!(parse_flag(Some(" 1 ")));
        assert!(parse_flag(Some("on")));
        assert!(!parse_flag(Some("false")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }

    #[test]
    fn projects_core_options() {
        let cfg = config();
        assert!(cfg.aggregation_options().include_not_applicable_as_compliant);
        assert_eq!(cfg.catalog_options().reference_title, "Revision 5");
    }
}
