//! Prompt builder for rendering templates with variables.

use crate::types::{PromptDefinition, RenderedPrompt};
use converse_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render a prompt from a definition and input variables.
///
/// Both the system and user templates are rendered against the same
/// variable map. Conditional sections (`{{#if history}}`) are driven purely
/// by which variables the caller chose to insert, so presence decisions are
/// made before this boundary, not inside it.
///
/// # Example
/// ```
/// use converse_prompt::{render_prompt, templates};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = templates::rephrase_prompt();
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "corporation tax".to_string());
///
/// let rendered = render_prompt(&def, vars)?;
/// println!("User prompt: {}", rendered.user);
/// # Ok(())
/// # }
/// ```
pub fn render_prompt(
    definition: &PromptDefinition,
    variables: HashMap<String, String>,
) -> AppResult<RenderedPrompt> {
    tracing::debug!("Rendering prompt: {}", definition.id);

    let system = match definition.system {
        Some(ref template) => Some(render_template(template, &variables)?),
        None => None,
    };

    let user = render_template(&definition.template, &variables)?;

    Ok(RenderedPrompt::new(
        system,
        user,
        definition.id.clone(),
        variables,
    ))
}

/// Render a Handlebars template with variables.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    // Register template
    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    // Render
    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
