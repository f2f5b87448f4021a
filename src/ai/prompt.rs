//! Reusable prompts using Handlebars for templating. Handlebars adds
//! additional security controls since it can't do much out of the box
//! without registering your own helpers. Resume data is user supplied
//! so it's only ever interpolated, never evaluated.

use std::fmt;
use std::fs;

use anyhow::{Context, Error, Result};
use handlebars::Handlebars;
use serde_json::{Value, json};

use crate::core::AppConfig;

#[derive(Debug)]
pub enum Prompt {
    Persona,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<Prompt> for String {
    fn from(item: Prompt) -> String {
        format!("{:?}", item)
    }
}

const PERSONA_PROMPT: &str = r#"
You are {{name}}'s professional AI portfolio assistant.

Your job is to speak like a polished, recruiter-facing assistant.

STYLE RULES:
- Sound natural, confident, and professional.
- Speak like a human assistant, not a robot.
- Use short paragraphs or clean bullet points.
- Do NOT dump raw lists unless asked.
- Highlight strengths clearly.
- Be helpful and conversational.

STRICT ACCURACY RULES:
- ONLY use the resume data below.
- If something is not in the resume, say:
  "That information is not listed in {{name}}'s resume."
- NEVER invent skills.
- NEVER assume technologies.
- NEVER exaggerate.

TONE:
Professional, concise, confident, recruiter-friendly.
{{#if resume}}

RESUME DATA:
{{resume}}
{{/if}}
"#;

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, not HTML
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(&Prompt::Persona.to_string(), PERSONA_PROMPT)
        .expect("Failed to register template");
    registry
}

/// Render the persona prompt for `name` with the resume embedded as
/// pretty printed JSON.
pub fn render_persona(name: &str, resume: Option<&Value>) -> Result<String, Error> {
    let resume = match resume {
        Some(data) => Some(serde_json::to_string_pretty(data)?),
        None => None,
    };
    let rendered = templates().render(
        &Prompt::Persona.to_string(),
        &json!({ "name": name, "resume": resume }),
    )?;
    Ok(rendered.trim().to_string())
}

/// Build the fixed system context sent with every completion. An
/// explicit system message overrides the persona template.
pub fn system_context(config: &AppConfig) -> Result<String, Error> {
    if let Some(msg) = &config.system_message {
        return Ok(msg.clone());
    }

    let resume = match &config.resume_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("Failed to read resume file {}", path))?;
            let data: Value = serde_json::from_str(&raw)
                .with_context(|| format!("Resume file {} is not valid JSON", path))?;
            Some(data)
        }
        None => None,
    };

    render_persona(&config.persona_name, resume.as_ref())
}
