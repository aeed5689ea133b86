use crate::config::TemplateVariant;
use serde::Serialize;
use serde_json::Value;
use tinytemplate::{error::Error, format_unescaped, TinyTemplate};

const CONTACT_TEMPLATE_NAME_MODERN: &str = "contact-template-modern";
const CONTACT_TEMPLATE_NAME_CLASSIC: &str = "contact-template-classic";
const CONTACT_TEMPLATE_MODERN: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-modern.html"
));
const CONTACT_TEMPLATE_CLASSIC: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/contact-classic.html"
));

#[derive(Serialize)]
struct Context<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
}

pub fn render_contact_email(
    variant: TemplateVariant,
    name: &str,
    email: &str,
    message: &str,
) -> Result<String, Error> {
    let mut tt = TinyTemplate::new();
    tt.add_formatter("sanitize", sanitize);
    tt.add_template(CONTACT_TEMPLATE_NAME_MODERN, CONTACT_TEMPLATE_MODERN)?;
    tt.add_template(CONTACT_TEMPLATE_NAME_CLASSIC, CONTACT_TEMPLATE_CLASSIC)?;
    let context = Context {
        name,
        email,
        message,
    };
    match variant {
        TemplateVariant::Modern => tt.render(CONTACT_TEMPLATE_NAME_MODERN, &context),
        TemplateVariant::Classic => tt.render(CONTACT_TEMPLATE_NAME_CLASSIC, &context),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            '\n' => escaped.push_str("<br>"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn sanitize(value: &Value, output: &mut String) -> Result<(), Error> {
    match value {
        Value::String(s) => {
            output.push_str(&escape_html(s));
            Ok(())
        }
        other => format_unescaped(other, output),
    }
}
