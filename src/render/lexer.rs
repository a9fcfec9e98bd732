//! # 模板词法分析
//!
//! 把模板文本切分为文本段、`{{ }}` 输出段和 `{% %}` 指令段，并去掉 `{# #}` 注释。
//!
//! 指令段与注释遵循块裁剪规则：同一行前导的空白被删去，紧随其后的一个换行被删去，
//! 这样独占一行的指令不会在输出中留下空行。
//!
//! ## 依赖关系
//! - 被 `render/parser.rs` 使用

use crate::error::{ChainsError, Result};

/// 模板片段
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr { body: String, line: usize },
    Tag { body: String, line: usize },
}

#[derive(Clone, Copy)]
enum Delim {
    Expr,
    Tag,
    Comment,
}

impl Delim {
    fn close(self) -> &'static str {
        match self {
            Delim::Expr => "}}",
            Delim::Tag => "%}",
            Delim::Comment => "#}",
        }
    }
}

/// 切分模板
pub fn tokenize(template: &str, src: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut pos = 0;
    let mut line = 1;
    let mut eat_newline = false;

    while pos < src.len() {
        let rest = &src[pos..];

        if eat_newline {
            eat_newline = false;
            if let Some(stripped) = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n')) {
                line += 1;
                pos = src.len() - stripped.len();
                continue;
            }
        }

        let Some(brace) = rest.find('{') else {
            text.push_str(rest);
            break;
        };

        let delim = match rest[brace..].as_bytes().get(1) {
            Some(b'{') => Some(Delim::Expr),
            Some(b'%') => Some(Delim::Tag),
            Some(b'#') => Some(Delim::Comment),
            _ => None,
        };

        let Some(delim) = delim else {
            // 普通花括号，原样保留
            let upto = &rest[..brace + 1];
            text.push_str(upto);
            line += upto.matches('\n').count();
            pos += brace + 1;
            continue;
        };

        let before = &rest[..brace];
        text.push_str(before);
        line += before.matches('\n').count();
        let open_at = pos + brace;

        let body_start = open_at + 2;
        let close_rel = src[body_start..].find(delim.close()).ok_or_else(|| {
            ChainsError::TemplateSyntax {
                template: template.to_string(),
                line,
                reason: format!("unclosed '{}'", &src[open_at..body_start]),
            }
        })?;
        let body = &src[body_start..body_start + close_rel];
        let tag_line = line;

        if !matches!(delim, Delim::Expr) {
            let line_start = src[..open_at].rfind('\n').map(|i| i + 1).unwrap_or(0);
            if src[line_start..open_at].chars().all(|c| c == ' ' || c == '\t') {
                let keep = text.trim_end_matches([' ', '\t']).len();
                text.truncate(keep);
            }
            eat_newline = true;
        }

        match delim {
            Delim::Expr => {
                flush(&mut text, &mut segments);
                segments.push(Segment::Expr {
                    body: body.trim().to_string(),
                    line: tag_line,
                });
            }
            Delim::Tag => {
                flush(&mut text, &mut segments);
                segments.push(Segment::Tag {
                    body: body.trim().to_string(),
                    line: tag_line,
                });
            }
            Delim::Comment => {}
        }

        line += body.matches('\n').count();
        pos = body_start + close_rel + 2;
    }

    flush(&mut text, &mut segments);
    Ok(segments)
}

fn flush(text: &mut String, segments: &mut Vec<Segment>) {
    if !text.is_empty() {
        segments.push(Segment::Text(std::mem::take(text)));
    }
}
