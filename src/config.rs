//! Process configuration
//!
//! Everything is settable as a flag or an environment variable; `.env` files
//! are loaded by `main` before parsing. Secrets only ever arrive through the
//! environment.

use std::net::SocketAddr;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "avni-server", version, about = "Avni administrative and sync server")]
pub struct Args {
    /// Address the admin API listens on
    #[arg(long, env = "AVNI_LISTEN", default_value = "127.0.0.1:8021")]
    pub listen: SocketAddr,

    /// Organisation this instance serves
    #[arg(long, env = "AVNI_ORGANISATION_ID", default_value_t = 1)]
    pub organisation_id: i64,

    /// Identity provider: none, keycloak, cognito or both
    #[arg(long, env = "AVNI_IDP_TYPE", default_value = "none")]
    pub idp_type: String,

    /// Keycloak base url, e.g. https://keycloak.example.org
    #[arg(long, env = "KEYCLOAK_SERVER")]
    pub keycloak_server: Option<String>,

    #[arg(long, env = "KEYCLOAK_REALM", default_value = "avni")]
    pub keycloak_realm: String,

    #[arg(long, env = "KEYCLOAK_CLIENT_ID", default_value = "admin-api")]
    pub keycloak_client_id: String,

    #[arg(long, env = "KEYCLOAK_CLIENT_SECRET", hide_env_values = true)]
    pub keycloak_client_secret: Option<String>,

    /// Messaging gateway base url; messaging is disabled when unset
    #[arg(long, env = "GLIFIC_BASE_URL")]
    pub glific_base_url: Option<String>,

    #[arg(long, env = "GLIFIC_API_KEY", hide_env_values = true)]
    pub glific_api_key: Option<String>,

    /// Log filter, e.g. info or avni_server=debug
    #[arg(long, env = "AVNI_LOG", default_value = "info")]
    pub log: String,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8021".parse().expect("default listen address"),
            organisation_id: 1,
            idp_type: "none".into(),
            keycloak_server: None,
            keycloak_realm: "avni".into(),
            keycloak_client_id: "admin-api".into(),
            keycloak_client_secret: None,
            glific_base_url: None,
            glific_api_key: None,
            log: "info".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let args = Args::parse_from(["avni-server"]);
        assert_eq!(args.organisation_id, 1);
        assert_eq!(args.idp_type, "none");
        assert_eq!(args.listen.port(), 8021);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "avni-server",
            "--idp-type",
            "keycloak",
            "--keycloak-server",
            "https://kc.example.org",
        ]);
        assert_eq!(args.idp_type, "keycloak");
        assert_eq!(args.keycloak_server.as_deref(), Some("https://kc.example.org"));
    }
}
