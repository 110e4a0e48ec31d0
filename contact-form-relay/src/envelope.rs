use crate::{config::Config, message::ValidatedContactFormMessage};
use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format, format_unescaped, TinyTemplate};

pub const SUBJECT_PREFIX: &str = "Portfolio Contact: ";

const HTML_TEMPLATE_NAME: &str = "contact-email-html";
const TEXT_TEMPLATE_NAME: &str = "contact-email-text";
const HTML_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-email.html"
));
const TEXT_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-email.txt"
));

/// One outbound email. Serialises to the JSON body expected by the Resend API.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Serialize)]
struct Context<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

impl Envelope {
    pub fn new(message: &ValidatedContactFormMessage, config: &Config) -> Result<Self, Error> {
        let context = Context {
            name: message.name,
            email: message.email,
            subject: message.subject,
            message: message.message,
        };
        Ok(Self {
            from: config.sender.clone(),
            to: config.recipient.clone(),
            reply_to: message.email.into(),
            subject: format!("{SUBJECT_PREFIX}{}", message.subject),
            html: render_html(&context)?,
            text: render_text(&context)?,
        })
    }
}

fn render_html(context: &Context) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    tt.add_formatter("render_paragraphs", render_paragraphs);
    tt.add_template(HTML_TEMPLATE_NAME, HTML_TEMPLATE)?;
    tt.render(HTML_TEMPLATE_NAME, context)
}

// The plain text part is never interpreted as markup, so user input goes in verbatim.
fn render_text(context: &Context) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_template(TEXT_TEMPLATE_NAME, TEXT_TEMPLATE)?;
    tt.render(TEXT_TEMPLATE_NAME, context)
}

fn render_paragraphs(value: &Value, output: &mut String) -> Result<(), Error> {
    output.push_str("<p>");
    let mut formatted = String::new();
    format(value, &mut formatted)?;
    output.push_str(
        &formatted
            .replace("\r\n", "\n")
            .replace("\n\n", "</p><p>")
            .replace('\n', "<br>"),
    );
    output.push_str("</p>");
    Ok(())
}
