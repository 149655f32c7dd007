//! Account model types.

use serde::{Deserialize, Serialize};

/// Connection settings for one mail server (IMAP or SMTP).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Implicit TLS from the first byte. When false the connection starts in
    /// plaintext (SMTP upgrades with STARTTLS when the server offers it).
    pub secure: bool,
    /// Username for authentication.
    pub user: String,
    /// Password for authentication.
    pub password: String,
}

impl ServerConfig {
    /// Creates a server configuration.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        secure: bool,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
            user: user.into(),
            password: password.into(),
        }
    }

    /// Default IMAP port for the security mode.
    #[must_use]
    pub const fn default_imap_port(secure: bool) -> u16 {
        if secure { 993 } else { 143 }
    }

    /// Default SMTP port for the security mode.
    #[must_use]
    pub const fn default_smtp_port(secure: bool) -> u16 {
        if secure { 465 } else { 587 }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Email account configuration.
///
/// Loaded once at startup and treated as immutable for the rest of the
/// session; onboarding is the only place that creates one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Name shown in the `From` header.
    pub display_name: String,
    /// Email address.
    pub email: String,
    /// Incoming mail server.
    pub imap: ServerConfig,
    /// Outgoing mail server.
    pub smtp: ServerConfig,
}

impl Account {
    /// Create a new empty account.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create account with settings detected from the email domain.
    ///
    /// Unknown domains get empty hosts and TLS defaults; usernames default to
    /// the address itself.
    #[must_use]
    pub fn with_email(email: &str) -> Self {
        let provider = email
            .split('@')
            .nth(1)
            .map_or(Provider::Custom, Provider::detect);
        let mut account = Self::from_provider(provider, "", email, "");
        if provider == Provider::Custom {
            account.display_name = email.split('@').nth(1).unwrap_or_default().to_string();
        }
        account
    }

    /// Build an account from a provider preset, sharing one password between
    /// IMAP and SMTP (the common app-password setup).
    #[must_use]
    pub fn from_provider(
        provider: Provider,
        display_name: &str,
        email: &str,
        password: &str,
    ) -> Self {
        let (imap, smtp) = provider.preset().map_or_else(
            || {
                let imap_port = ServerConfig::default_imap_port(true);
                let smtp_port = ServerConfig::default_smtp_port(true);
                (
                    ServerConfig::new("", imap_port, true, email, password),
                    ServerConfig::new("", smtp_port, true, email, password),
                )
            },
            |preset| {
                (
                    ServerConfig::new(preset.imap.0, preset.imap.1, preset.imap.2, email, password),
                    ServerConfig::new(preset.smtp.0, preset.smtp.1, preset.smtp.2, email, password),
                )
            },
        );

        let display_name = if display_name.trim().is_empty() {
            provider.preset().map_or("", |p| p.label).to_string()
        } else {
            display_name.to_string()
        };

        Self {
            display_name,
            email: email.to_string(),
            imap,
            smtp,
        }
    }

    /// `From` header value: `Display Name <email>`.
    #[must_use]
    pub fn from_header(&self) -> String {
        if self.display_name.trim().is_empty() {
            self.email.clone()
        } else {
            format!("{} <{}>", self.display_name, self.email)
        }
    }
}

/// Well-known mail providers with preset server settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Google Mail.
    Gmail,
    /// Outlook.com / Office 365.
    Outlook,
    /// Apple iCloud.
    ICloud,
    /// Yahoo Mail.
    Yahoo,
    /// Anything else; servers entered by hand.
    Custom,
}

/// Preset server settings: `(host, port, secure)` per protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderPreset {
    /// Human-readable provider name.
    pub label: &'static str,
    /// IMAP server.
    pub imap: (&'static str, u16, bool),
    /// SMTP server.
    pub smtp: (&'static str, u16, bool),
    /// Setup hint shown during onboarding.
    pub notes: Option<&'static str>,
}

impl Provider {
    /// All providers in onboarding order.
    pub const ALL: [Self; 5] = [
        Self::Gmail,
        Self::Outlook,
        Self::ICloud,
        Self::Yahoo,
        Self::Custom,
    ];

    /// Preset settings, `None` for [`Provider::Custom`].
    #[must_use]
    pub const fn preset(self) -> Option<ProviderPreset> {
        match self {
            Self::Gmail => Some(ProviderPreset {
                label: "Gmail",
                imap: ("imap.gmail.com", 993, true),
                smtp: ("smtp.gmail.com", 465, true),
                notes: Some("Use an App Password with 2-Step Verification."),
            }),
            Self::Outlook => Some(ProviderPreset {
                label: "Outlook / Office 365",
                imap: ("outlook.office365.com", 993, true),
                smtp: ("smtp.office365.com", 587, false),
                notes: None,
            }),
            Self::ICloud => Some(ProviderPreset {
                label: "iCloud",
                imap: ("imap.mail.me.com", 993, true),
                smtp: ("smtp.mail.me.com", 587, false),
                notes: Some("Use an App Password generated at appleid.apple.com."),
            }),
            Self::Yahoo => Some(ProviderPreset {
                label: "Yahoo",
                imap: ("imap.mail.yahoo.com", 993, true),
                smtp: ("smtp.mail.yahoo.com", 465, true),
                notes: Some("Use an App Password."),
            }),
            Self::Custom => None,
        }
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self.preset() {
            Some(preset) => preset.label,
            None => "Custom",
        }
    }

    /// Detect the provider from an email domain.
    #[must_use]
    pub fn detect(domain: &str) -> Self {
        match domain.to_lowercase().as_str() {
            "gmail.com" | "googlemail.com" => Self::Gmail,
            "outlook.com" | "hotmail.com" | "live.com" => Self::Outlook,
            "icloud.com" | "me.com" | "mac.com" => Self::ICloud,
            "yahoo.com" | "ymail.com" => Self::Yahoo,
            _ => Self::Custom,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    mod server_config_tests {
        use super::*;

        #[test]
        fn default_ports() {
            assert_eq!(ServerConfig::default_imap_port(true), 993);
            assert_eq!(ServerConfig::default_imap_port(false), 143);
            assert_eq!(ServerConfig::default_smtp_port(true), 465);
            assert_eq!(ServerConfig::default_smtp_port(false), 587);
        }

        #[test]
        fn debug_hides_password() {
            let config = ServerConfig::new("imap.example.com", 993, true, "me", "hunter2");
            let debug = format!("{config:?}");
            assert!(!debug.contains("hunter2"));
            assert!(debug.contains("imap.example.com"));
        }
    }

    mod account_tests {
        use super::*;

        #[test]
        fn new_creates_empty() {
            let account = Account::new();
            assert!(account.display_name.is_empty());
            assert!(account.email.is_empty());
        }

        #[test]
        fn with_email_gmail() {
            let account = Account::with_email("user@gmail.com");
            assert_eq!(account.display_name, "Gmail");
            assert_eq!(account.imap.host, "imap.gmail.com");
            assert_eq!(account.imap.port, 993);
            assert!(account.imap.secure);
            assert_eq!(account.smtp.host, "smtp.gmail.com");
            assert_eq!(account.smtp.port, 465);
            assert_eq!(account.imap.user, "user@gmail.com");
            assert_eq!(account.smtp.user, "user@gmail.com");
        }

        #[test]
        fn with_email_outlook_uses_starttls_submission() {
            let account = Account::with_email("user@hotmail.com");
            assert_eq!(account.smtp.host, "smtp.office365.com");
            assert_eq!(account.smtp.port, 587);
            assert!(!account.smtp.secure);
        }

        #[test]
        fn with_email_unknown_domain() {
            let account = Account::with_email("user@example.org");
            assert_eq!(account.display_name, "example.org");
            assert!(account.imap.host.is_empty());
            assert_eq!(account.imap.user, "user@example.org");
        }

        #[test]
        fn from_provider_shares_password() {
            let account = Account::from_provider(Provider::Yahoo, "Ann", "ann@yahoo.com", "pw");
            assert_eq!(account.display_name, "Ann");
            assert_eq!(account.imap.password, "pw");
            assert_eq!(account.smtp.password, "pw");
        }

        #[test]
        fn from_header_formats_display_name() {
            let account = Account::from_provider(Provider::Gmail, "Ann Lee", "ann@gmail.com", "pw");
            assert_eq!(account.from_header(), "Ann Lee <ann@gmail.com>");

            let mut bare = account.clone();
            bare.display_name = String::new();
            assert_eq!(bare.from_header(), "ann@gmail.com");
        }

        #[test]
        fn serializes_with_camel_case_record_shape() {
            let account = Account::from_provider(Provider::Gmail, "Ann", "ann@gmail.com", "pw");
            let json = serde_json::to_value(&account).unwrap();
            assert_eq!(json["displayName"], "Ann");
            assert_eq!(json["imap"]["host"], "imap.gmail.com");
            assert_eq!(json["smtp"]["secure"], true);
            assert_eq!(json["smtp"]["user"], "ann@gmail.com");
        }
    }

    mod provider_tests {
        use super::*;

        #[test]
        fn detect_known_domains() {
            assert_eq!(Provider::detect("GMAIL.com"), Provider::Gmail);
            assert_eq!(Provider::detect("live.com"), Provider::Outlook);
            assert_eq!(Provider::detect("me.com"), Provider::ICloud);
            assert_eq!(Provider::detect("ymail.com"), Provider::Yahoo);
            assert_eq!(Provider::detect("corp.example"), Provider::Custom);
        }

        #[test]
        fn custom_has_no_preset() {
            assert!(Provider::Custom.preset().is_none());
            assert_eq!(Provider::Custom.label(), "Custom");
        }
    }
}
