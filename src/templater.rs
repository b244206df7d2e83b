// src/templater.rs

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{name}}}' in command argument '{arg}'")]
    UnknownPlaceholder { name: String, arg: String },
    #[error("malformed command argument '{arg}': {reason}")]
    Malformed { arg: String, reason: String },
    #[error("the command template is empty")]
    Empty,
}

/// Named values a command template may refer to.
#[derive(Debug, Clone)]
pub struct TemplateValues {
    pub num: u64,
    pub vid_format: String,
    pub vid_output_dir: String,
}

/// A resolved placeholder value, kept typed so numeric format specs apply to `num`.
enum Resolved<'a> {
    Int(u64),
    Text(&'a str),
}

impl TemplateValues {
    fn lookup(&self, name: &str) -> Option<Resolved<'_>> {
        match name {
            "num" => Some(Resolved::Int(self.num)),
            "vid_format" => Some(Resolved::Text(&self.vid_format)),
            "vid_output_dir" => Some(Resolved::Text(&self.vid_output_dir)),
            _ => None,
        }
    }
}

/// Expands every argument of `template` against `values`.
///
/// The result has the same length and order as the template; its last element
/// is the path the encoder is expected to write.
///
/// # Errors
///
/// Returns `TemplateError::Empty` for an empty template, and the first
/// placeholder error found otherwise.
pub fn expand(template: &[String], values: &TemplateValues) -> Result<Vec<String>, TemplateError> {
    if template.is_empty() {
        return Err(TemplateError::Empty);
    }
    template.iter().map(|arg| expand_arg(arg, values)).collect()
}

/// Formats a single argument. `{name}` and `{name:spec}` are substituted,
/// `{{` and `}}` produce literal braces.
fn expand_arg(arg: &str, values: &TemplateValues) -> Result<String, TemplateError> {
    let malformed = |reason: &str| TemplateError::Malformed {
        arg: arg.to_string(),
        reason: reason.to_string(),
    };

    let mut out = String::with_capacity(arg.len());
    let mut chars = arg.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') => return Err(malformed("nested '{' in placeholder")),
                        Some(ch) => field.push(ch),
                        None => return Err(malformed("unclosed '{'")),
                    }
                }
                let (name, spec) = match field.split_once(':') {
                    Some((name, spec)) => (name, Some(spec)),
                    None => (field.as_str(), None),
                };
                let value = values
                    .lookup(name)
                    .ok_or_else(|| TemplateError::UnknownPlaceholder {
                        name: name.to_string(),
                        arg: arg.to_string(),
                    })?;
                let formatted =
                    format_value(value, spec).map_err(|reason| malformed(reason.as_str()))?;
                out.push_str(&formatted);
            }
            '}' => return Err(malformed("single '}' encountered")),
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Applies the small subset of format specs supported in templates:
/// an optional `0` fill flag, a width, and an optional `d` or `s` type.
fn format_value(value: Resolved<'_>, spec: Option<&str>) -> Result<String, String> {
    let spec = spec.unwrap_or("");
    let (body, kind) = match spec.chars().last() {
        Some(t @ ('d' | 's')) => (&spec[..spec.len() - 1], Some(t)),
        _ => (spec, None),
    };
    if !body.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("unsupported format spec '{}'", spec));
    }
    let zero_fill = body.starts_with('0') && body.len() > 1;
    let width: usize = if body.is_empty() {
        0
    } else {
        body.parse().map_err(|_| format!("invalid width in '{}'", spec))?
    };

    match (value, kind) {
        (Resolved::Int(i), None | Some('d')) if zero_fill => {
            Ok(format!("{:0width$}", i, width = width))
        }
        (Resolved::Int(i), None | Some('d')) => Ok(format!("{:>width$}", i, width = width)),
        (Resolved::Text(s), None | Some('s')) if !zero_fill => {
            Ok(format!("{:<width$}", s, width = width))
        }
        (Resolved::Int(_), _) => Err(format!(
            "format spec '{}' does not apply to a number",
            spec
        )),
        (Resolved::Text(_), _) => Err(format!(
            "format spec '{}' does not apply to text",
            spec
        )),
    }
}
