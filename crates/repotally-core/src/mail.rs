//! Plain-text report mail over an unauthenticated SMTP relay.

use std::time::Duration;

use lettre::message::{Mailbox, header::ContentType};
use lettre::{Message, SmtpTransport, Transport};
use thiserror::Error;
use tracing::{info, instrument};

const DEFAULT_SMTP_PORT: u16 = 25;

/// Errors from composing or sending mail.
#[derive(Error, Debug)]
pub enum MailError {
    /// A sender or recipient address did not parse.
    #[error("invalid mail address {address:?}: {source}")]
    Address {
        /// The offending address.
        address: String,
        /// Parser error.
        source: lettre::address::AddressError,
    },

    /// The message could not be assembled.
    #[error("unable to build mail: {0}")]
    Build(#[from] lettre::error::Error),

    /// The server setting is not `host` or `host:port`.
    #[error("invalid SMTP server {0:?}, expected host or host:port")]
    Server(String),

    /// The relay refused the message or could not be reached.
    #[error("mail server {server} failure: {source}")]
    Smtp {
        /// `host:port` that was tried.
        server: String,
        /// Transport error.
        source: lettre::transport::smtp::Error,
    },
}

/// A message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl OutgoingMail {
    /// Assemble the RFC 5322 message.
    pub fn to_message(&self) -> Result<Message, MailError> {
        let message = Message::builder()
            .from(mailbox(&self.from)?)
            .to(mailbox(&self.to)?)
            .subject(&self.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())?;
        Ok(message)
    }
}

fn mailbox(address: &str) -> Result<Mailbox, MailError> {
    address.parse().map_err(|source| MailError::Address {
        address: address.to_string(),
        source,
    })
}

/// Something that can deliver an [`OutgoingMail`].
pub trait MailTransport {
    /// Deliver the message or fail.
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Unauthenticated SMTP relay.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SmtpMailer {
    /// Mailer for `host` or `host:port`; the port defaults to 25.
    pub fn new(server: &str, timeout: Duration) -> Result<Self, MailError> {
        let server = server.trim();
        let (host, port) = match server.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| MailError::Server(server.to_string()))?;
                (host, port)
            }
            None => (server, DEFAULT_SMTP_PORT),
        };
        if host.is_empty() {
            return Err(MailError::Server(server.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
            timeout,
        })
    }

    /// `host:port` this mailer connects to.
    pub fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl MailTransport for SmtpMailer {
    #[instrument(skip_all, fields(server = %self.server(), to = %mail.to))]
    fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let message = mail.to_message()?;
        let transport = SmtpTransport::builder_dangerous(&self.host)
            .port(self.port)
            .timeout(Some(self.timeout))
            .build();
        transport.send(&message).map_err(|source| MailError::Smtp {
            server: self.server(),
            source,
        })?;
        info!(subject = %mail.subject, "report mailed");
        Ok(())
    }
}
