//! Email templates rendered with Handlebars
//!
//! Every template is registered once when the engine is built; the handlers
//! only pick a template by name and hand over the values. Bodies are plain
//! text, so HTML escaping is turned off and query values of links are
//! URL-encoded before rendering.

use crate::core::email::{EmailError, EmailMessage};
use crate::entities::StaffRole;
use handlebars::Handlebars;
use serde_json::{Value, json};
use tracing::debug;

/// Prefix of the line carrying the raw token in every template
pub const TOKEN_LINE_PREFIX: &str = "Token: ";

const CONFIRMATION: &str = "confirmation";
const PASSWORD_RESET: &str = "password_reset";
const INVITATION: &str = "invitation";

struct EmailTemplate {
    name: &'static str,
    subject: &'static str,
    body: &'static str,
}

const DEFAULT_TEMPLATES: [EmailTemplate; 3] = [
    EmailTemplate {
        name: CONFIRMATION,
        subject: "Confirm your email address",
        body: r#"Hi {{first_name}},

please confirm your email address by opening the link below:
{{frontend_url}}/confirm-email?email={{email_param}}&token={{token_param}}

Token: {{token}}
"#,
    },
    EmailTemplate {
        name: PASSWORD_RESET,
        subject: "Reset your password",
        body: r#"Hi {{first_name}},

we received a request to reset your password. If it was you, open:
{{frontend_url}}/reset-password?email={{email_param}}&token={{token_param}}

If you did not ask for a reset you can ignore this email.

Token: {{token}}
"#,
    },
    EmailTemplate {
        name: INVITATION,
        subject: "You have been invited to join {{clinic_name}}",
        body: r#"Hello,

you have been invited to join {{clinic_name}} as {{role}}.
Accept the invitation here:
{{frontend_url}}/invitations/accept?token={{token_param}}

Token: {{token}}
"#,
    },
];

/// Extract the token from an email built by one of the templates
pub fn extract_token(body: &str) -> Option<String> {
    body.lines()
        .find_map(|line| line.strip_prefix(TOKEN_LINE_PREFIX))
        .map(|t| t.trim().to_string())
}

pub struct TemplateEngine {
    handlebars: Handlebars<'static>,
}

impl TemplateEngine {
    /// Build the engine with the confirmation, password reset and invitation templates
    pub fn new() -> Result<Self, EmailError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        for template in &DEFAULT_TEMPLATES {
            handlebars
                .register_template_string(&format!("{}_subject", template.name), template.subject)
                .map_err(|e| EmailError(format!("invalid subject template {}: {}", template.name, e)))?;
            handlebars
                .register_template_string(&format!("{}_body", template.name), template.body)
                .map_err(|e| EmailError(format!("invalid body template {}: {}", template.name, e)))?;
        }

        debug!("Registered {} email templates", DEFAULT_TEMPLATES.len());
        Ok(Self { handlebars })
    }

    fn render(&self, name: &str, to: &str, data: &Value) -> Result<EmailMessage, EmailError> {
        let subject = self
            .handlebars
            .render(&format!("{}_subject", name), data)
            .map_err(|e| EmailError(format!("failed to render subject of {}: {}", name, e)))?;
        let body = self
            .handlebars
            .render(&format!("{}_body", name), data)
            .map_err(|e| EmailError(format!("failed to render body of {}: {}", name, e)))?;

        Ok(EmailMessage {
            to: to.to_string(),
            subject,
            body,
        })
    }

    pub fn confirmation_email(
        &self,
        to: &str,
        first_name: &str,
        token: &str,
        frontend_url: &str,
    ) -> Result<EmailMessage, EmailError> {
        self.render(CONFIRMATION, to, &account_link_data(to, first_name, token, frontend_url))
    }

    pub fn password_reset_email(
        &self,
        to: &str,
        first_name: &str,
        token: &str,
        frontend_url: &str,
    ) -> Result<EmailMessage, EmailError> {
        self.render(PASSWORD_RESET, to, &account_link_data(to, first_name, token, frontend_url))
    }

    pub fn invitation_email(
        &self,
        to: &str,
        clinic_name: &str,
        role: StaffRole,
        token: &str,
        frontend_url: &str,
    ) -> Result<EmailMessage, EmailError> {
        let data = json!({
            "clinic_name": clinic_name,
            "role": role.to_string(),
            "token": token,
            "token_param": urlencoding::encode(token),
            "frontend_url": frontend_url.trim_end_matches('/'),
        });
        self.render(INVITATION, to, &data)
    }
}

fn account_link_data(to: &str, first_name: &str, token: &str, frontend_url: &str) -> Value {
    json!({
        "first_name": first_name,
        "token": token,
        "email_param": urlencoding::encode(to),
        "token_param": urlencoding::encode(token),
        "frontend_url": frontend_url.trim_end_matches('/'),
    })
}
