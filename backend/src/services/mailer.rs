use anyhow::Result;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::env;

pub struct Mailer {
    mailer: SmtpTransport,
    from_address: String,
    frontend_url: String,
}

impl Mailer {
    pub fn new(frontend_url: &str) -> Result<Self> {
        let smtp_host = env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
        let smtp_port = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .unwrap_or(587);
        let smtp_username = env::var("SMTP_USERNAME").unwrap_or_default();
        let smtp_password = env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_address = env::var("SMTP_FROM_ADDRESS")
            .unwrap_or_else(|_| "noreply@shardview.local".to_string());

        let mailer = if smtp_username.is_empty() {
            SmtpTransport::builder_dangerous(&smtp_host)
                .port(smtp_port)
                .build()
        } else {
            let creds = Credentials::new(smtp_username, smtp_password);
            SmtpTransport::relay(&smtp_host)?
                .port(smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from_address,
            frontend_url: frontend_url.to_string(),
        })
    }

    pub fn send_password_reset_email(&self, to_email: &str, reset_token: &str) -> Result<()> {
        if env::var("SMTP_SKIP_SEND").unwrap_or_default() == "true" {
            return Ok(());
        }
        let reset_url = format!("{}/reset-password?token={}", self.frontend_url, reset_token);

        let body = format!(
            r#"A password reset was requested for your Shardview account.

Open the link below to choose a new password:

{}

The link is valid for 1 hour.

If you did not request this, you can ignore this email.

---
Shardview cluster console
"#,
            reset_url
        );

        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject("Password reset request - Shardview")
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(&email)?;
        Ok(())
    }

    pub fn send_email_change_confirmation(&self, to_email: &str, token: &str) -> Result<()> {
        if env::var("SMTP_SKIP_SEND").unwrap_or_default() == "true" {
            return Ok(());
        }
        let confirm_url = format!("{}/confirm-email?token={}", self.frontend_url, token);

        let body = format!(
            r#"A request was made to move your Shardview account to this email address.

Open the link below to confirm the change:

{}

The link is valid for 24 hours.

If you did not request this, you can ignore this email.

---
Shardview cluster console
"#,
            confirm_url
        );

        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject("Confirm your new email address - Shardview")
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(&email)?;
        Ok(())
    }

    pub fn send_password_changed_notice(&self, to_email: &str, name: &str) -> Result<()> {
        if env::var("SMTP_SKIP_SEND").unwrap_or_default() == "true" {
            return Ok(());
        }
        let body = format!(
            r#"Hello {},

The password for your Shardview account was changed at {}.

If this was not you, reset your password immediately and contact your
cluster administrator.

---
Shardview cluster console
"#,
            name,
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        );

        let email = Message::builder()
            .from(self.from_address.parse()?)
            .to(to_email.parse()?)
            .subject("Password changed - Shardview")
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(&email)?;
        Ok(())
    }
}
