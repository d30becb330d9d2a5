//! # Output Template Rendering
//!
//! Renders one line of aggregated sensor data from a user-supplied template
//! string. The template language is a superset of strftime: calendar
//! directives are delegated verbatim to chrono, while the custom `v` type
//! substitutes sensor values (`%vC` temperature in °C, `%vF` temperature in
//! °F, `%vH` relative humidity in %) with printf-`%f` style flag, width and
//! precision modifiers. `%%` emits a literal percent sign and backslash
//! escapes (`\n`, `\t`, ...) are decoded.
//!
//! Templates are fixed at startup, not streamed device data, so a partially
//! scanned invalid directive is a fatal error rather than something to
//! resynchronize from. Errors carry the scan position plus the text before
//! and after it so the user can locate the bad directive.

use crate::parse::{DirectiveParser, DirectiveState, FormatDirective, ParseStatus};
use chrono::{DateTime, FixedOffset};
use log::trace;
use std::fmt::Write as _;
use thiserror::Error;

/// Longest accepted directive span in characters, matching the substitution
/// buffer of the wire-compatible implementation.
const MAX_DIRECTIVE_LEN: usize = 64;

/// Default precision of a `v` substitution when the directive gives none,
/// as with printf's `%f`.
const DEFAULT_PRECISION: u32 = 6;

/// Fatal template errors.
///
/// Each variant reports the byte offset just past the character where the
/// error was detected, the scanned prefix and the unscanned remainder,
/// rendered in a `<<<HERE<<<` marker line.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Invalid directive syntax or unsupported subtype.
    #[error("format code syntax error\n{prefix}<<<HERE<<<{remainder}")]
    Syntax {
        offset: usize,
        prefix: String,
        remainder: String,
    },

    /// Width or precision modifier does not fit the accumulator.
    #[error("format code width/precision modifier is too large\n{prefix}<<<HERE<<<{remainder}")]
    Overflow {
        offset: usize,
        prefix: String,
        remainder: String,
    },

    /// Directive span exceeds the substitution buffer.
    #[error("format code length error\n{prefix}<<<HERE<<<{remainder}")]
    Length {
        offset: usize,
        prefix: String,
        remainder: String,
    },

    /// The calendar formatter rejected the directive or produced nothing.
    #[error("format code error reported by the calendar formatter\n{prefix}<<<HERE<<<{remainder}")]
    Calendar {
        offset: usize,
        prefix: String,
        remainder: String,
    },
}

impl RenderError {
    /// Byte offset into the template just past the offending character.
    pub fn offset(&self) -> usize {
        match self {
            RenderError::Syntax { offset, .. }
            | RenderError::Overflow { offset, .. }
            | RenderError::Length { offset, .. }
            | RenderError::Calendar { offset, .. } => *offset,
        }
    }
}

/// Where the scan currently is, outside or inside a compound token.
#[derive(Clone, Copy)]
enum Mode {
    Literal,
    /// A backslash was consumed; the next character is an escape code.
    Escape,
    /// Inside a `%...` directive that began at the given byte offset.
    Directive { start: usize },
}

/// Renders aggregated sensor values through a fixed output template.
///
/// The template is scanned once per emission, left to right, using
/// [`DirectiveParser`] to tokenize `%...` directives.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    template: String,
}

impl TemplateRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        TemplateRenderer {
            template: template.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render one output line for the given time reference, mean temperature
    /// (°C) and mean relative humidity (%).
    pub fn render(
        &self,
        when: &DateTime<FixedOffset>,
        temperature: f32,
        humidity: f32,
    ) -> Result<String, RenderError> {
        let template = self.template.as_str();
        let mut out = String::with_capacity(template.len());
        let mut parser = DirectiveParser::new();
        let mut mode = Mode::Literal;

        for (i, ch) in template.char_indices() {
            trace!("render: offset {} char {:?}", i, ch);
            match mode {
                Mode::Literal => {
                    if ch == '%' {
                        parser.reset();
                        // The `%` itself is the first character of the scan.
                        parser.step(b'%');
                        mode = Mode::Directive { start: i };
                    } else if ch == '\\' {
                        mode = Mode::Escape;
                    } else {
                        out.push(ch);
                    }
                }
                Mode::Escape => {
                    mode = Mode::Literal;
                    match ch {
                        '\\' => out.push('\\'),
                        'a' => out.push('\u{07}'),
                        'b' => out.push('\u{08}'),
                        'e' => out.push('\u{1B}'),
                        'f' => out.push('\u{0C}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        // Not an escape code of this grammar: keep both
                        // characters, then let the character act normally.
                        '%' => {
                            out.push('\\');
                            parser.reset();
                            parser.step(b'%');
                            mode = Mode::Directive { start: i };
                        }
                        _ => {
                            out.push('\\');
                            out.push(ch);
                        }
                    }
                }
                Mode::Directive { start } => {
                    let byte = if ch.is_ascii() { ch as u8 } else { 0xFF };
                    match parser.step(byte) {
                        ParseStatus::Continue => {}
                        ParseStatus::Stop => {
                            let end = i + ch.len_utf8();
                            let span = &template[start..end];
                            self.substitute(
                                &mut out,
                                span,
                                end,
                                parser.directive(),
                                when,
                                temperature,
                                humidity,
                            )?;
                            mode = Mode::Literal;
                        }
                        ParseStatus::Failed => {
                            let offset = i + ch.len_utf8();
                            return Err(if parser.state() == DirectiveState::ErrorOverflow {
                                RenderError::Overflow {
                                    offset,
                                    prefix: template[..offset].to_string(),
                                    remainder: template[offset..].to_string(),
                                }
                            } else {
                                RenderError::Syntax {
                                    offset,
                                    prefix: template[..offset].to_string(),
                                    remainder: template[offset..].to_string(),
                                }
                            });
                        }
                    }
                }
            }
        }

        // A trailing backslash or an unfinished directive is emitted as-is.
        match mode {
            Mode::Literal => {}
            Mode::Escape => out.push('\\'),
            Mode::Directive { start } => out.push_str(&template[start..]),
        }

        Ok(out)
    }

    /// Expand one completely scanned directive into the output.
    #[allow(clippy::too_many_arguments)]
    fn substitute(
        &self,
        out: &mut String,
        span: &str,
        end: usize,
        dir: FormatDirective,
        when: &DateTime<FixedOffset>,
        temperature: f32,
        humidity: f32,
    ) -> Result<(), RenderError> {
        let template = self.template.as_str();
        if dir.type_char == b'v' {
            if span.chars().count() >= MAX_DIRECTIVE_LEN {
                return Err(RenderError::Length {
                    offset: end,
                    prefix: template[..end].to_string(),
                    remainder: template[end..].to_string(),
                });
            }
            let value = match dir.subtype {
                Some(b'C') => temperature,
                Some(b'F') => temperature * 1.8 + 32.0,
                Some(b'H') => humidity,
                // The directive parser only stops on a valid subtype.
                _ => {
                    return Err(RenderError::Syntax {
                        offset: end,
                        prefix: template[..end].to_string(),
                        remainder: template[end..].to_string(),
                    })
                }
            };
            out.push_str(&format_value(&dir, value));
        } else if span == "%%" {
            out.push('%');
        } else {
            // Passthrough calendar directive: hand the whole span to chrono.
            let mut buf = String::new();
            let ok = write!(buf, "{}", when.format(span)).is_ok();
            if !ok || buf.is_empty() {
                return Err(RenderError::Calendar {
                    offset: end,
                    prefix: template[..end].to_string(),
                    remainder: template[end..].to_string(),
                });
            }
            out.push_str(&buf);
        }
        Ok(())
    }
}

/// Format a sensor value like printf's `%f` honoring the directive's flags,
/// width and precision.
fn format_value(dir: &FormatDirective, value: f32) -> String {
    let precision = dir.precision.unwrap_or(DEFAULT_PRECISION) as usize;
    let mut body = format!("{:.*}", precision, value.abs());
    if dir.flags.alt_form && precision == 0 {
        // `#` keeps the decimal point even without fraction digits.
        body.push('.');
    }

    let sign = if value.is_sign_negative() {
        "-"
    } else if dir.flags.force_sign {
        "+"
    } else if dir.flags.blank {
        " "
    } else {
        ""
    };

    let width = dir.width as usize;
    let len = sign.len() + body.len();
    if len >= width {
        return format!("{sign}{body}");
    }
    let pad = width - len;
    if dir.flags.left_align {
        format!("{}{}{}", sign, body, " ".repeat(pad))
    } else if dir.flags.zero_pad {
        format!("{}{}{}", sign, "0".repeat(pad), body)
    } else {
        format!("{}{}{}", " ".repeat(pad), sign, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Fixed reference time: 2023-04-10 12:34:56 +00:00.
    fn when() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2023, 4, 10, 12, 34, 56)
            .unwrap()
    }

    fn render(template: &str, temperature: f32, humidity: f32) -> Result<String, RenderError> {
        TemplateRenderer::new(template).render(&when(), temperature, humidity)
    }

    #[test]
    fn sensor_values_with_one_decimal() {
        let out = render(r"%.1vC\t%.1vH\n", 20.0, 50.0).unwrap();
        assert_eq!(out, "20.0\t50.0\n");
    }

    #[test]
    fn fahrenheit_conversion() {
        let out = render(r"%.1vF\n", 20.0, 0.0).unwrap();
        assert_eq!(out, "68.0\n");
    }

    #[test]
    fn default_precision_matches_printf() {
        assert_eq!(render("%vH", 0.0, 50.0).unwrap(), "50.000000");
    }

    #[test]
    fn width_and_zero_padding() {
        assert_eq!(render("%08.2vC", 20.0, 0.0).unwrap(), "00020.00");
        assert_eq!(render("%8.2vC", 20.0, 0.0).unwrap(), "   20.00");
        assert_eq!(render("%-8.1vC|", 20.0, 0.0).unwrap(), "20.0    |");
    }

    #[test]
    fn sign_flags() {
        assert_eq!(render("%+.1vC", 20.0, 0.0).unwrap(), "+20.0");
        assert_eq!(render("% .1vC", 20.0, 0.0).unwrap(), " 20.0");
        assert_eq!(render("%+.1vC", -20.0, 0.0).unwrap(), "-20.0");
        assert_eq!(render("%08.1vC", -20.0, 0.0).unwrap(), "-00020.0");
    }

    #[test]
    fn percent_literal() {
        assert_eq!(render(r"%%\n", 0.0, 0.0).unwrap(), "%\n");
        assert_eq!(render("a%%b", 0.0, 0.0).unwrap(), "a%b");
    }

    #[test]
    fn calendar_passthrough() {
        assert_eq!(render("%Y-%m-%d", 0.0, 0.0).unwrap(), "2023-04-10");
        assert_eq!(render("%H:%M:%S", 0.0, 0.0).unwrap(), "12:34:56");
    }

    #[test]
    fn default_template_shape() {
        let out = render(crate::config::DEFAULT_TEMPLATE, 21.5, 48.25).unwrap();
        assert_eq!(out, "2023-04-10 12:34:56\t21.5\t48.2\n");
    }

    #[test]
    fn escapes() {
        assert_eq!(render(r"a\tb\nc", 0.0, 0.0).unwrap(), "a\tb\nc");
        assert_eq!(render(r"\a\b\e\f\r", 0.0, 0.0).unwrap(), "\u{07}\u{08}\u{1B}\u{0C}\r");
        assert_eq!(render(r"\\", 0.0, 0.0).unwrap(), "\\");
    }

    #[test]
    fn unknown_escape_passes_both_characters_through() {
        assert_eq!(render(r"\q", 0.0, 0.0).unwrap(), "\\q");
    }

    #[test]
    fn escaped_percent_still_starts_a_directive() {
        // `\%` is not an escape code: the backslash stays and the percent
        // sign begins a directive scan.
        assert_eq!(render(r"\%d", 0.0, 0.0).unwrap(), "\\10");
    }

    #[test]
    fn trailing_backslash_is_literal() {
        assert_eq!(render(r"x\", 0.0, 0.0).unwrap(), "x\\");
    }

    #[test]
    fn unfinished_directive_is_literal() {
        assert_eq!(render("x%5", 0.0, 0.0).unwrap(), "x%5");
        assert_eq!(render("%", 0.0, 0.0).unwrap(), "%");
    }

    #[test]
    fn unsupported_subtype_reports_offset() {
        let err = render("%vZ\n", 0.0, 0.0).unwrap_err();
        match err {
            RenderError::Syntax {
                offset,
                prefix,
                remainder,
            } => {
                assert_eq!(offset, 3);
                assert_eq!(prefix, "%vZ");
                assert_eq!(remainder, "\n");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_fatal() {
        let err = render("ab%q", 0.0, 0.0).unwrap_err();
        assert_eq!(err.offset(), 4);
        assert!(matches!(err, RenderError::Syntax { .. }));
    }

    #[test]
    fn width_overflow_is_fatal() {
        let err = render("%99999999999vC", 0.0, 0.0).unwrap_err();
        assert!(matches!(err, RenderError::Overflow { .. }));
    }

    #[test]
    fn rejected_calendar_directive_is_fatal() {
        // The directive grammar accepts flags for calendar types, chrono
        // rejects the combination at delegation time.
        let err = render("%#d", 0.0, 0.0).unwrap_err();
        assert!(matches!(err, RenderError::Calendar { .. }));
    }

    #[test]
    fn oversized_sensor_directive_is_fatal() {
        let template = format!("%{}.1vC", "0".repeat(70));
        let err = render(&template, 0.0, 0.0).unwrap_err();
        assert!(matches!(err, RenderError::Length { .. }));
    }
}
