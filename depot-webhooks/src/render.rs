//! Payload rendering
//!
//! A subscription without a template receives the canonical JSON encoding of
//! the event. A template is evaluated with Handlebars; when it fails to parse
//! or evaluate, the canonical JSON is sent instead so that a bad template
//! never blocks delivery.

use crate::{Event, Result, WebhookError};
use handlebars::{
    Context, Handlebars, Helper, HelperResult, JsonRender, Output, RenderContext,
    RenderErrorReason,
};
use tracing::debug;

/// Renders request bodies for deliveries
pub struct PayloadRenderer {
    handlebars: Handlebars<'static>,
}

impl std::fmt::Debug for PayloadRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadRenderer").finish_non_exhaustive()
    }
}

impl Default for PayloadRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadRenderer {
    /// Create a renderer with strict field lookup and no HTML escaping
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("json", Box::new(json_helper));
        handlebars.register_helper("upper", Box::new(upper_helper));
        handlebars.register_helper("lower", Box::new(lower_helper));
        handlebars.register_helper("default", Box::new(default_helper));

        Self { handlebars }
    }

    /// Render the body for an event, falling back to canonical JSON
    pub fn render(&self, event: &Event, template: Option<&str>) -> Result<String> {
        let Some(template) = template.filter(|t| !t.trim().is_empty()) else {
            return Ok(event.to_canonical_json()?);
        };

        match self.try_render(event, template) {
            Ok(body) => Ok(body),
            Err(e) => {
                debug!(error = %e, "payload template failed, sending canonical JSON");
                Ok(event.to_canonical_json()?)
            }
        }
    }

    /// Evaluate a template against an event without any fallback
    pub fn try_render(&self, event: &Event, template: &str) -> Result<String> {
        self.handlebars
            .render_template(template, &event.template_context())
            .map_err(WebhookError::from)
    }
}

/// JSON encoding helper: {{json value}}
fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("json", 0))?;

    let encoded = serde_json::to_string(param.value())
        .map_err(|e| RenderErrorReason::Other(e.to_string()))?;
    out.write(&encoded)?;
    Ok(())
}

/// Uppercase helper: {{upper text}}
fn upper_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("upper", 0))?;

    if let Some(s) = param.value().as_str() {
        out.write(&s.to_uppercase())?;
    }
    Ok(())
}

/// Lowercase helper: {{lower text}}
fn lower_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("lower", 0))?;

    if let Some(s) = param.value().as_str() {
        out.write(&s.to_lowercase())?;
    }
    Ok(())
}

/// Default value helper: {{default version "unversioned"}}
fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let param = h
        .param(0)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("default", 0))?;
    let fallback = h
        .param(1)
        .ok_or(RenderErrorReason::ParamNotFoundForIndex("default", 1))?;

    let value = if param.value().is_null() {
        fallback.value()
    } else {
        param.value()
    };

    out.write(&value.render())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event() -> Event {
        Event::added("maven-releases", "com/acme/lib/1.0/lib-1.0.jar")
            .with_name("lib")
            .with_version("1.0")
            .with_group("com.acme")
            .with_timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap())
    }

    #[test]
    fn test_no_template_is_canonical_json() {
        let renderer = PayloadRenderer::new();
        let event = event();

        let body = renderer.render(&event, None).unwrap();
        assert_eq!(body, event.to_canonical_json().unwrap());

        let body = renderer.render(&event, Some("   ")).unwrap();
        assert_eq!(body, event.to_canonical_json().unwrap());
    }

    #[test]
    fn test_template_renders_fields() {
        let renderer = PayloadRenderer::new();
        let body = renderer
            .render(
                &event(),
                Some(r#"{"text":"{{upper kind}} {{group}}:{{name}}:{{version}} in {{repository}}"}"#),
            )
            .unwrap();

        assert_eq!(body, r#"{"text":"ADD com.acme:lib:1.0 in maven-releases"}"#);
    }

    #[test]
    fn test_template_does_not_escape() {
        let renderer = PayloadRenderer::new();
        let event = Event::changed("npm", "@scope/pkg/-/pkg-1.0.0.tgz");

        let body = renderer.render(&event, Some("<{{path}}>")).unwrap();
        assert_eq!(body, "<@scope/pkg/-/pkg-1.0.0.tgz>");
    }

    #[test]
    fn test_json_and_default_helpers() {
        let renderer = PayloadRenderer::new();
        let event = Event::removed("npm", "a/b");

        let body = renderer
            .render(&event, Some(r#"{"path":{{json path}},"v":"{{default version "none"}}"}"#))
            .unwrap();
        assert_eq!(body, r#"{"path":"a/b","v":"none"}"#);
    }

    #[test]
    fn test_syntax_error_falls_back() {
        let renderer = PayloadRenderer::new();
        let event = event();

        assert!(renderer.try_render(&event, "{{#if kind}}unclosed").is_err());

        let body = renderer.render(&event, Some("{{#if kind}}unclosed")).unwrap();
        assert_eq!(body, event.to_canonical_json().unwrap());
    }

    #[test]
    fn test_unknown_field_falls_back() {
        let renderer = PayloadRenderer::new();
        let event = event();

        let result = renderer.try_render(&event, "{{repo}}");
        assert!(matches!(result, Err(WebhookError::TemplateError(_))));

        let body = renderer.render(&event, Some("{{repo}}")).unwrap();
        assert_eq!(body, event.to_canonical_json().unwrap());
    }

    #[test]
    fn test_absent_optional_field_renders() {
        let renderer = PayloadRenderer::new();
        let event = Event::removed("npm", "a/b");

        let body = renderer.try_render(&event, "[{{name}}]").unwrap();
        assert_eq!(body, "[]");
    }
}
