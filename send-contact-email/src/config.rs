use std::{borrow::Cow, fmt::Display, str::FromStr};
use tracing::warn;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

const API_KEY_VARIABLE: &str = "RESEND_API_KEY";
const RECIPIENT_VARIABLE: &str = "MY_EMAIL";
const API_URL_VARIABLE: &str = "RESEND_API_URL";
const TEMPLATE_VARIABLE: &str = "CONTACT_FORM_TEMPLATE";
const FROM_VARIABLE: &str = "CONTACT_FORM_FROM";

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub api_key: Option<String>,
    pub recipient: Option<String>,
    pub resend_url: Cow<'static, str>,
    pub sender: SenderProfile,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let template = match non_empty_var(TEMPLATE_VARIABLE) {
            Some(value) => value.parse().unwrap_or_else(|error| {
                warn!("{error}; falling back to the {} template", TemplateVariant::default());
                TemplateVariant::default()
            }),
            None => TemplateVariant::default(),
        };
        let sender = match non_empty_var(FROM_VARIABLE) {
            Some(from) => SenderProfile::new(from, template),
            None => SenderProfile::for_variant(template),
        };
        Self {
            api_key: non_empty_var(API_KEY_VARIABLE),
            recipient: non_empty_var(RECIPIENT_VARIABLE),
            resend_url: non_empty_var(API_URL_VARIABLE)
                .map(Cow::Owned)
                .unwrap_or(RESEND_API_URL.into()),
            sender,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderProfile {
    pub from: Cow<'static, str>,
    pub template: TemplateVariant,
}

impl SenderProfile {
    pub fn new(from: impl Into<Cow<'static, str>>, template: TemplateVariant) -> Self {
        Self {
            from: from.into(),
            template,
        }
    }

    pub fn for_variant(template: TemplateVariant) -> Self {
        Self::new(template.default_sender(), template)
    }
}

impl Default for SenderProfile {
    fn default() -> Self {
        Self::for_variant(TemplateVariant::default())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemplateVariant {
    #[default]
    Modern,
    Classic,
}

impl TemplateVariant {
    pub fn default_sender(self) -> &'static str {
        match self {
            TemplateVariant::Modern => "My Website <onboarding@resend.dev>",
            TemplateVariant::Classic => "Portfolio Contact <onboarding@resend.dev>",
        }
    }
}

impl Display for TemplateVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateVariant::Modern => write!(f, "modern"),
            TemplateVariant::Classic => write!(f, "classic"),
        }
    }
}

impl FromStr for TemplateVariant {
    type Err = UnknownTemplateVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modern" => Ok(TemplateVariant::Modern),
            "classic" => Ok(TemplateVariant::Classic),
            _ => Err(UnknownTemplateVariant(s.into())),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownTemplateVariant(String);

impl Display for UnknownTemplateVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown email template variant {:?}", self.0)
    }
}

impl std::error::Error for UnknownTemplateVariant {}
