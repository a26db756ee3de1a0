//! Review prompt template.
//!
//! The diff is substituted at a fixed placeholder. The default template asks
//! for a markdown review covering correctness, security, performance and
//! style, which downstream rendering turns into the notification email.

use crate::errors::{LlmError, LlmResult};

/// Placeholder the diff is substituted into.
pub const DIFF_PLACEHOLDER: &str = "{{DIFF}}";

const DEFAULT_TEMPLATE: &str = r#"You are a senior code reviewer. Review the following change.

- Focus on correctness, security, performance and style, in that order.
- Be concise and actionable. Avoid generic advice.
- Point at concrete hunks; propose minimal fixes where needed.
- If the change looks correct, say so briefly and do not invent issues.

Respond in markdown. Use fenced code blocks for any code you quote.

# Diff

```diff
{{DIFF}}
```
"#;

/// A prompt template with a mandatory diff placeholder.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    /// Wraps a custom template. Fails when the placeholder is absent, since
    /// a template that ignores the diff would silently review nothing.
    pub fn new(text: impl Into<String>) -> LlmResult<Self> {
        let text = text.into();
        if !text.contains(DIFF_PLACEHOLDER) {
            return Err(LlmError::InvalidTemplate { placeholder: DIFF_PLACEHOLDER });
        }
        Ok(Self { text })
    }

    /// Substitutes the diff into the template.
    pub fn render(&self, diff: &str) -> String {
        self.text.replace(DIFF_PLACEHOLDER, diff)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_template_embeds_the_diff() {
        let prompt = PromptTemplate::default().render("+added line");
        assert!(prompt.contains("+added line"));
        assert!(!prompt.contains(DIFF_PLACEHOLDER));
        assert!(prompt.contains("correctness"));
    }

    #[test]
    fn custom_template_requires_placeholder() {
        assert!(PromptTemplate::new("review this please").is_err());
        let tpl = PromptTemplate::new("Diff follows: {{DIFF}}").unwrap();
        assert_eq!(tpl.render("x"), "Diff follows: x");
    }
}
