//! Compose screen state.

use kaizen_mail_core::{ComposeForm, OutgoingMessage, Signature};

use super::input::TextInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeField {
    To,
    Subject,
    Body,
}

/// Editable copy of a [`ComposeForm`].
#[derive(Debug, Clone)]
pub struct ComposeState {
    pub draft_id: Option<String>,
    pub to: TextInput,
    pub subject: TextInput,
    pub body: TextInput,
    pub attachments: Vec<kaizen_mail_core::storage::DraftAttachment>,
    pub focus: ComposeField,
    /// Append the configured signature when sending.
    pub include_signature: bool,
    pub sending: bool,
}

impl ComposeState {
    pub fn new(form: ComposeForm, include_signature: bool) -> Self {
        // Replies and forwards open with the cursor on the body.
        let focus = if form.to.is_empty() {
            ComposeField::To
        } else {
            ComposeField::Body
        };
        let mut body = TextInput::new(form.body);
        body.home();
        Self {
            draft_id: form.draft_id,
            to: TextInput::new(form.to),
            subject: TextInput::new(form.subject),
            body,
            attachments: form.attachments,
            focus,
            include_signature,
            sending: false,
        }
    }

    pub fn form(&self) -> ComposeForm {
        ComposeForm {
            draft_id: self.draft_id.clone(),
            to: self.to.value().to_string(),
            subject: self.subject.value().to_string(),
            body: self.body.value().to_string(),
            attachments: self.attachments.clone(),
        }
    }

    pub fn outgoing(&self, signature: Option<&Signature>) -> OutgoingMessage {
        let signature = signature.filter(|_| self.include_signature);
        self.form().to_outgoing(signature)
    }

    pub const fn next_field(&mut self) {
        self.focus = match self.focus {
            ComposeField::To => ComposeField::Subject,
            ComposeField::Subject => ComposeField::Body,
            ComposeField::Body => ComposeField::To,
        };
    }

    pub const fn prev_field(&mut self) {
        self.focus = match self.focus {
            ComposeField::To => ComposeField::Body,
            ComposeField::Subject => ComposeField::To,
            ComposeField::Body => ComposeField::Subject,
        };
    }

    pub const fn focused(&mut self) -> &mut TextInput {
        match self.focus {
            ComposeField::To => &mut self.to,
            ComposeField::Subject => &mut self.subject,
            ComposeField::Body => &mut self.body,
        }
    }

    pub fn attach(&mut self, path: &str) {
        let mut form = ComposeForm::default();
        form.attach_file(path);
        self.attachments.append(&mut form.attachments);
    }

    pub fn attachment_names(&self) -> Vec<String> {
        self.attachments
            .iter()
            .map(|a| a.filename.clone().unwrap_or_else(|| "attachment".to_string()))
            .collect()
    }
}
