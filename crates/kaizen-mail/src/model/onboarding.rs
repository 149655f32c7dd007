//! First-run account form.

use kaizen_mail_core::{Account, Provider, ServerConfig, ValidationError, validate_account};

use super::input::TextInput;

/// Focusable fields, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Provider,
    Name,
    Email,
    Password,
    ImapHost,
    ImapPort,
    SmtpHost,
    SmtpPort,
    Passphrase,
    Confirm,
    Remember,
}

impl Field {
    const ORDER: [Self; 11] = [
        Self::Provider,
        Self::Name,
        Self::Email,
        Self::Password,
        Self::ImapHost,
        Self::ImapPort,
        Self::SmtpHost,
        Self::SmtpPort,
        Self::Passphrase,
        Self::Confirm,
        Self::Remember,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Provider => "Provider",
            Self::Name => "Name",
            Self::Email => "Email",
            Self::Password => "Password",
            Self::ImapHost => "IMAP host",
            Self::ImapPort => "IMAP port",
            Self::SmtpHost => "SMTP host",
            Self::SmtpPort => "SMTP port",
            Self::Passphrase => "Passphrase",
            Self::Confirm => "Confirm",
            Self::Remember => "Remember in keyring",
        }
    }

    const fn is_server(self) -> bool {
        matches!(self, Self::ImapHost | Self::ImapPort | Self::SmtpHost | Self::SmtpPort)
    }

    const fn is_secret(self) -> bool {
        matches!(self, Self::Password | Self::Passphrase | Self::Confirm)
    }
}

/// What the form produced once submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub account: Account,
    pub passphrase: String,
    pub remember: bool,
}

/// State of the onboarding screen.
#[derive(Debug, Clone)]
pub struct OnboardingState {
    provider: usize,
    pub focus: Field,
    pub name: TextInput,
    pub email: TextInput,
    pub password: TextInput,
    pub imap_host: TextInput,
    pub imap_port: TextInput,
    pub smtp_host: TextInput,
    pub smtp_port: TextInput,
    pub passphrase: TextInput,
    pub confirm: TextInput,
    pub remember: bool,
    pub errors: Vec<String>,
}

impl Default for OnboardingState {
    fn default() -> Self {
        Self {
            provider: 0,
            focus: Field::Provider,
            name: TextInput::default(),
            email: TextInput::default(),
            password: TextInput::default(),
            imap_host: TextInput::default(),
            imap_port: TextInput::new(ServerConfig::default_imap_port(true).to_string()),
            smtp_host: TextInput::default(),
            smtp_port: TextInput::new(ServerConfig::default_smtp_port(true).to_string()),
            passphrase: TextInput::default(),
            confirm: TextInput::default(),
            remember: false,
            errors: Vec::new(),
        }
    }
}

impl OnboardingState {
    pub const fn provider(&self) -> Provider {
        Provider::ALL[self.provider]
    }

    pub fn is_custom(&self) -> bool {
        self.provider() == Provider::Custom
    }

    /// Fields currently shown; server settings only for custom providers.
    pub fn visible_fields(&self) -> Vec<Field> {
        let custom = self.is_custom();
        Field::ORDER
            .into_iter()
            .filter(|f| custom || !f.is_server())
            .collect()
    }

    pub fn next_field(&mut self) {
        self.step(1);
    }

    pub fn prev_field(&mut self) {
        self.step(-1);
    }

    fn step(&mut self, delta: isize) {
        let fields = self.visible_fields();
        let current = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let len = fields.len().cast_signed();
        let next = (current.cast_signed() + delta).rem_euclid(len);
        self.focus = fields[next.cast_unsigned()];
    }

    /// Cycle the provider preset.
    pub const fn cycle_provider(&mut self, forward: bool) {
        let len = Provider::ALL.len();
        self.provider = if forward {
            (self.provider + 1) % len
        } else {
            (self.provider + len - 1) % len
        };
    }

    /// The text input behind `field`, if it is a text field.
    pub const fn input(&self, field: Field) -> Option<&TextInput> {
        match field {
            Field::Name => Some(&self.name),
            Field::Email => Some(&self.email),
            Field::Password => Some(&self.password),
            Field::ImapHost => Some(&self.imap_host),
            Field::ImapPort => Some(&self.imap_port),
            Field::SmtpHost => Some(&self.smtp_host),
            Field::SmtpPort => Some(&self.smtp_port),
            Field::Passphrase => Some(&self.passphrase),
            Field::Confirm => Some(&self.confirm),
            Field::Provider | Field::Remember => None,
        }
    }

    pub const fn input_mut(&mut self, field: Field) -> Option<&mut TextInput> {
        match field {
            Field::Name => Some(&mut self.name),
            Field::Email => Some(&mut self.email),
            Field::Password => Some(&mut self.password),
            Field::ImapHost => Some(&mut self.imap_host),
            Field::ImapPort => Some(&mut self.imap_port),
            Field::SmtpHost => Some(&mut self.smtp_host),
            Field::SmtpPort => Some(&mut self.smtp_port),
            Field::Passphrase => Some(&mut self.passphrase),
            Field::Confirm => Some(&mut self.confirm),
            Field::Provider | Field::Remember => None,
        }
    }

    /// Display value for `field`, secrets masked.
    pub fn display(&self, field: Field) -> String {
        match (field, self.input(field)) {
            (Field::Provider, _) => format!("< {} >", self.provider().label()),
            (Field::Remember, _) => if self.remember { "[x]" } else { "[ ]" }.to_string(),
            (_, Some(input)) if field.is_secret() => input.masked(),
            (_, Some(input)) => input.value().to_string(),
            (_, None) => String::new(),
        }
    }

    /// Provider hint shown under the form.
    pub fn notes(&self) -> Option<&'static str> {
        self.provider().preset().and_then(|p| p.notes)
    }

    fn account(&self) -> Result<Account, Vec<String>> {
        let email = self.email.value().trim();
        let mut account = Account::from_provider(
            self.provider(),
            self.name.value().trim(),
            email,
            self.password.value(),
        );
        if self.is_custom() {
            let mut errors = Vec::new();
            let imap_port = parse_port(self.imap_port.value(), "IMAP port", &mut errors);
            let smtp_port = parse_port(self.smtp_port.value(), "SMTP port", &mut errors);
            if !errors.is_empty() {
                return Err(errors);
            }
            account.imap.host = self.imap_host.value().trim().to_string();
            account.imap.port = imap_port;
            account.imap.secure = imap_port == ServerConfig::default_imap_port(true);
            account.smtp.host = self.smtp_host.value().trim().to_string();
            account.smtp.port = smtp_port;
            account.smtp.secure = smtp_port == ServerConfig::default_smtp_port(true);
        }
        Ok(account)
    }

    /// Validate the form. On failure the messages are kept in `errors`.
    pub fn submit(&mut self) -> Option<Completed> {
        let account = match self.account() {
            Ok(account) => account,
            Err(errors) => {
                self.errors = errors;
                return None;
            }
        };

        let mut errors: Vec<String> = match validate_account(&account) {
            Ok(()) => Vec::new(),
            Err(list) => list.iter().map(ValidationError::to_string).collect(),
        };
        if self.passphrase.is_empty() {
            errors.push("Passphrase is required".to_string());
        } else if self.passphrase.value() != self.confirm.value() {
            errors.push("Passphrases do not match".to_string());
        }

        if errors.is_empty() {
            self.errors.clear();
            Some(Completed {
                account,
                passphrase: self.passphrase.value().to_string(),
                remember: self.remember,
            })
        } else {
            self.errors = errors;
            None
        }
    }
}

fn parse_port(value: &str, label: &str, errors: &mut Vec<String>) -> u16 {
    value.trim().parse().unwrap_or_else(|_| {
        errors.push(format!("{label} must be a number between 1 and 65535"));
        0
    })
}
