//! cu-auth operator tool
//!
//! Inspects and exercises an identity configuration: builds SSO URLs,
//! prints SP metadata, classifies IdP entity ids and normalizes claim sets.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use cu_auth::identity::Claims;
use cu_auth::saml::SamlConfigJson;
use cu_auth::{
    AuthConfig, AuthConfigJson, IdentityManager, IdentityManagerKind, IdentityProvider,
    SamaelEngine,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "cu-auth")]
#[command(about = "Identity federation tooling for Shibboleth and SAML SSO")]
struct Args {
    /// Path to a JSON configuration file
    #[arg(long, env = "CU_AUTH_CONFIG")]
    config: Option<PathBuf>,

    /// Identity manager (apache-shib or php-saml)
    #[arg(long, env = "CU_AUTH_IDENTITY_MANAGER")]
    identity_manager: Option<IdentityManagerKind>,

    /// Server variable holding the proxy-authenticated user
    #[arg(long, env = "APACHE_SHIB_USER_VARIABLE")]
    remote_user_variable: Option<String>,

    /// Shibboleth IdP base URL, e.g. https://shibidp-test.cit.cornell.edu/idp
    #[arg(long, env = "SAML_IDP_BASEURL")]
    idp_base_url: Option<String>,

    /// Directory holding idp_cert.pem, sp_cert.pem and sp_key.pem
    #[arg(long, env = "SAML_KEYS_DIR")]
    keys_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, env = "CU_AUTH_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the login URL that returns to REDIRECT
    SsoUrl { redirect: String },
    /// Print the logout URL that returns to RETURN_URL
    SloUrl { return_url: String },
    /// Print SP metadata XML
    Metadata,
    /// Print the organization an IdP entity id belongs to
    Classify { entity_id: String },
    /// Normalize a JSON claim set ({"name": ["value", ...]}) into an identity
    Normalize {
        claims: PathBuf,
        /// IdP entity id the claims came from (defaults to the configured IdP)
        #[arg(long)]
        issuer: Option<String>,
    },
    /// Validate the configuration and key material
    CheckConfig,
}

impl Args {
    /// Command line values layered over the config file.
    fn overlay(&self) -> AuthConfigJson {
        let saml = if self.idp_base_url.is_some() || self.keys_dir.is_some() {
            Some(SamlConfigJson {
                idp_base_url: self.idp_base_url.clone(),
                keys_dir: self.keys_dir.clone(),
                ..Default::default()
            })
        } else {
            None
        };

        AuthConfigJson {
            identity_manager: self.identity_manager,
            remote_user_variable: self.remote_user_variable.clone(),
            saml,
            ..Default::default()
        }
    }

    fn load_config(&self) -> Result<AuthConfig> {
        let mut config = match self.config {
            Some(ref path) => AuthConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => AuthConfig::default(),
        };
        self.overlay().apply_to(&mut config);
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("{}={}", env!("CARGO_CRATE_NAME"), log_level))
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = args.load_config()?;
    debug!(
        identity_manager = ?config.identity_manager,
        extra_fields = config.extra_fields.len(),
        classifier_rules = config.classifier_rules.len(),
        "Configuration loaded"
    );

    match args.command {
        Command::SsoUrl { ref redirect } => {
            let manager = build_manager(&config)?;
            println!("{}", manager.sso_url(redirect)?);
        }
        Command::SloUrl { ref return_url } => {
            let manager = build_manager(&config)?;
            println!("{}", manager.slo_url(return_url)?);
        }
        Command::Metadata => {
            let manager = build_manager(&config)?;
            match manager.metadata()? {
                Some(metadata) => print!("{}", metadata),
                None => anyhow::bail!(
                    "the {:?} identity manager does not publish metadata",
                    config.identity_manager
                ),
            }
        }
        Command::Classify { ref entity_id } => {
            println!("{}", config.classifier().classify(entity_id));
        }
        Command::Normalize {
            ref claims,
            ref issuer,
        } => {
            let content = std::fs::read_to_string(claims)
                .with_context(|| format!("reading {}", claims.display()))?;
            let raw_claims: Claims =
                serde_json::from_str(&content).context("claims must map names to string lists")?;

            let entity_id = issuer.as_deref().unwrap_or(&config.saml.idp_entity_id);
            let org = config.classifier().classify(entity_id);
            let identity = config.normalizer().normalize(org, raw_claims);

            let output = serde_json::json!({
                "id": identity.id(),
                "name": identity.name(),
                "email": identity.email(),
                "identity": identity,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::CheckConfig => {
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
            if config.identity_manager == IdentityManagerKind::Saml {
                config.saml.resolve()?;
            }
            info!(identity_manager = ?config.identity_manager, "Configuration is valid");
            println!("ok");
        }
    }

    Ok(())
}

fn build_manager(config: &AuthConfig) -> Result<IdentityManager> {
    let manager = IdentityManager::from_config(config, Arc::new(SamaelEngine::new()))?;
    Ok(manager)
}
