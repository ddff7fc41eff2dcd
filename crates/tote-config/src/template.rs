//! Output path templates.
//!
//! Templates substitute `[name]`, `[ext]`, `[hash]` and `[path]` tokens, e.g.
//! `css/[name].[hash].css`. Validation happens at configuration time so that
//! rendering can never fail.

use crate::error::{ConfigError, Result};

pub const TOKENS: &[&str] = &["name", "ext", "hash", "path"];

/// Values substituted into a template for one file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateValues<'a> {
    /// Entry name for entry points, file stem otherwise
    pub name: &'a str,
    /// Source extension without the dot
    pub ext: &'a str,
    /// Short content hash
    pub hash: &'a str,
    /// Source directory relative to the project root, `/` terminated (empty at the root)
    pub path: &'a str,
}

pub fn validate_template(template: &str) -> Result<()> {
    if template.trim().is_empty() {
        return Err(invalid(template, "template is empty"));
    }

    let mut rest = template;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let close = after
            .find(']')
            .ok_or_else(|| invalid(template, "unclosed `[`"))?;
        let token = &after[..close];
        if !TOKENS.contains(&token) {
            return Err(invalid(
                template,
                &format!("unknown token `[{token}]` (expected one of [name], [ext], [hash], [path])"),
            ));
        }
        rest = &after[close + 1..];
    }

    Ok(())
}

pub fn render(template: &str, values: &TemplateValues<'_>) -> String {
    let mut out = String::with_capacity(template.len() + values.name.len());
    let mut rest = template;
    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                let token = &after[..close];
                match token {
                    "name" => out.push_str(values.name),
                    "ext" => out.push_str(values.ext),
                    "hash" => out.push_str(values.hash),
                    "path" => out.push_str(values.path),
                    other => {
                        out.push('[');
                        out.push_str(other);
                        out.push(']');
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn invalid(template: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    }
}
