//! # 模板语法分析
//!
//! 把词法片段组装成语法树，并解析 `if` / `for` / `{{ }}` 中的表达式。
//!
//! 表达式文法：
//! ```text
//! or      := and ("or" and)*
//! and     := not ("and" not)*
//! not     := "not" not | compare
//! compare := primary [("==" | "!=") primary | "is" ["not"] "defined"]
//! primary := string | number | None | true | false | path | "(" or ")"
//! path    := ident ("." ident)*
//! ```
//!
//! ## 依赖关系
//! - 被 `render/mod.rs` 使用
//! - 使用 `render/lexer.rs`, `render/value.rs`

use super::lexer::{self, Segment};
use super::value::Value;
use crate::error::{ChainsError, Result};

/// 表达式
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        negated: bool,
    },
    Defined {
        path: Vec<String>,
        negated: bool,
    },
}

/// 语法树节点
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output {
        expr: Expr,
        line: usize,
    },
    If {
        branches: Vec<(Expr, Vec<Node>)>,
        otherwise: Vec<Node>,
        line: usize,
    },
    For {
        var: String,
        iterable: Expr,
        body: Vec<Node>,
        line: usize,
    },
    Include {
        name: String,
        line: usize,
    },
}

/// 解析整个模板
pub fn parse(template: &str, src: &str) -> Result<Vec<Node>> {
    let segments = lexer::tokenize(template, src)?;
    let mut parser = Parser {
        template,
        segments,
        pos: 0,
    };
    let (nodes, end) = parser.block(&[])?;
    if let Some(tag) = end {
        return Err(parser.error(tag.line, format!("unexpected '{}'", tag.keyword)));
    }
    Ok(nodes)
}

/// 结束当前块的指令
struct EndTag {
    keyword: String,
    rest: String,
    line: usize,
}

struct Parser<'a> {
    template: &'a str,
    segments: Vec<Segment>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, line: usize, reason: impl Into<String>) -> ChainsError {
        ChainsError::TemplateSyntax {
            template: self.template.to_string(),
            line,
            reason: reason.into(),
        }
    }

    /// 解析到 `terminators` 中任一指令或文件结尾
    fn block(&mut self, terminators: &[&str]) -> Result<(Vec<Node>, Option<EndTag>)> {
        let mut nodes = Vec::new();

        while self.pos < self.segments.len() {
            let segment = self.segments[self.pos].clone();
            self.pos += 1;

            match segment {
                Segment::Text(text) => nodes.push(Node::Text(text)),
                Segment::Expr { body, line } => {
                    if body.is_empty() {
                        return Err(self.error(line, "empty '{{ }}'"));
                    }
                    let expr = parse_expr(self.template, &body, line)?;
                    nodes.push(Node::Output { expr, line });
                }
                Segment::Tag { body, line } => {
                    let (keyword, rest) = match body.split_once(char::is_whitespace) {
                        Some((k, r)) => (k.to_string(), r.trim().to_string()),
                        None => (body.clone(), String::new()),
                    };

                    if terminators.contains(&keyword.as_str()) {
                        return Ok((nodes, Some(EndTag { keyword, rest, line })));
                    }

                    match keyword.as_str() {
                        "if" => nodes.push(self.if_block(&rest, line)?),
                        "for" => nodes.push(self.for_block(&rest, line)?),
                        "include" => nodes.push(Node::Include {
                            name: self.include_name(&rest, line)?,
                            line,
                        }),
                        "elif" | "else" | "endif" | "endfor" => {
                            return Err(self.error(line, format!("unexpected '{}'", keyword)))
                        }
                        other => {
                            return Err(self.error(line, format!("unknown tag '{}'", other)))
                        }
                    }
                }
            }
        }

        if terminators.is_empty() {
            Ok((nodes, None))
        } else {
            Err(self.error(
                self.last_line(),
                format!("missing '{}' before end of template", terminators.join("' or '")),
            ))
        }
    }

    fn last_line(&self) -> usize {
        self.segments
            .iter()
            .rev()
            .find_map(|s| match s {
                Segment::Expr { line, .. } | Segment::Tag { line, .. } => Some(*line),
                Segment::Text(_) => None,
            })
            .unwrap_or(1)
    }

    fn if_block(&mut self, cond: &str, line: usize) -> Result<Node> {
        let mut branches = Vec::new();
        let mut cond = parse_expr(self.template, cond, line)?;

        loop {
            let (body, end) = self.block(&["elif", "else", "endif"])?;
            let Some(end) = end else {
                return Err(self.error(line, "missing 'endif'"));
            };
            branches.push((cond, body));

            match end.keyword.as_str() {
                "elif" => {
                    cond = parse_expr(self.template, &end.rest, end.line)?;
                }
                "else" => {
                    let (otherwise, close) = self.block(&["endif"])?;
                    if close.is_none() {
                        return Err(self.error(line, "missing 'endif'"));
                    }
                    return Ok(Node::If {
                        branches,
                        otherwise,
                        line,
                    });
                }
                _ => {
                    return Ok(Node::If {
                        branches,
                        otherwise: Vec::new(),
                        line,
                    })
                }
            }
        }
    }

    fn for_block(&mut self, header: &str, line: usize) -> Result<Node> {
        let mut words = header.splitn(3, char::is_whitespace);
        let var = words.next().unwrap_or("").trim();
        let keyword = words.next().unwrap_or("").trim();
        let iterable = words.next().unwrap_or("").trim();

        if !is_identifier(var) || keyword != "in" || iterable.is_empty() {
            return Err(self.error(line, "expected 'for <name> in <sequence>'"));
        }
        if var == "loop" {
            return Err(self.error(line, "'loop' is reserved inside for blocks"));
        }

        let iterable = parse_expr(self.template, iterable, line)?;
        let (body, end) = self.block(&["endfor"])?;
        if end.is_none() {
            return Err(self.error(line, "missing 'endfor'"));
        }

        Ok(Node::For {
            var: var.to_string(),
            iterable,
            body,
            line,
        })
    }

    fn include_name(&self, rest: &str, line: usize) -> Result<String> {
        let rest = rest.trim();
        let quoted = rest.len() >= 2
            && ((rest.starts_with('"') && rest.ends_with('"'))
                || (rest.starts_with('\'') && rest.ends_with('\'')));
        if !quoted {
            return Err(self.error(line, "include expects a quoted template name"));
        }
        Ok(rest[1..rest.len() - 1].to_string())
    }
}

fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ─────────────────────────────────────────────────────────────
// 表达式
// ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    LParen,
    RParen,
    EqEq,
    NotEq,
}

fn lex_expr(template: &str, src: &str, line: usize) -> Result<Vec<Tok>> {
    let err = |reason: String| ChainsError::TemplateSyntax {
        template: template.to_string(),
        line,
        reason,
    };

    let chars: Vec<char> = src.chars().collect();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                toks.push(Tok::Dot);
                i += 1;
            }
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            '=' | '!' => {
                if chars.get(i + 1) != Some(&'=') {
                    return Err(err(format!("unexpected '{}' in '{}'", c, src)));
                }
                toks.push(if c == '=' { Tok::EqEq } else { Tok::NotEq });
                i += 2;
            }
            '"' | '\'' => {
                let start = i + 1;
                let end = chars[start..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| err(format!("unterminated string in '{}'", src)))?;
                toks.push(Tok::Str(chars[start..start + end].iter().collect()));
                i = start + end + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == 'e' || chars[i] == 'E') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if let Ok(v) = text.parse::<i64>() {
                    toks.push(Tok::Int(v));
                } else {
                    let v = text
                        .parse::<f64>()
                        .map_err(|_| err(format!("invalid number '{}'", text)))?;
                    toks.push(Tok::Float(v));
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                toks.push(Tok::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(err(format!("unexpected character '{}' in '{}'", other, src))),
        }
    }

    Ok(toks)
}

/// 解析单个表达式
pub fn parse_expr(template: &str, src: &str, line: usize) -> Result<Expr> {
    let toks = lex_expr(template, src, line)?;
    let mut p = ExprParser {
        template,
        src,
        line,
        toks,
        pos: 0,
    };
    let expr = p.or()?;
    if p.pos != p.toks.len() {
        return Err(p.error("unexpected trailing tokens"));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    template: &'a str,
    src: &'a str,
    line: usize,
    toks: Vec<Tok>,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn error(&self, reason: &str) -> ChainsError {
        ChainsError::TemplateSyntax {
            template: self.template.to_string(),
            line: self.line,
            reason: format!("{} in expression '{}'", reason, self.src),
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(w)) if w == kw)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.toks.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn or(&mut self) -> Result<Expr> {
        let mut lhs = self.and()?;
        while self.peek_keyword("or") {
            self.pos += 1;
            let rhs = self.and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut lhs = self.not()?;
        while self.peek_keyword("and") {
            self.pos += 1;
            let rhs = self.not()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Expr> {
        if self.peek_keyword("not") {
            self.pos += 1;
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr> {
        let lhs = self.primary()?;

        match self.peek() {
            Some(Tok::EqEq) | Some(Tok::NotEq) => {
                let negated = self.next() == Some(Tok::NotEq);
                let rhs = self.primary()?;
                Ok(Expr::Compare {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    negated,
                })
            }
            Some(Tok::Ident(w)) if w == "is" => {
                self.pos += 1;
                let negated = self.peek_keyword("not");
                if negated {
                    self.pos += 1;
                }
                if !self.peek_keyword("defined") {
                    return Err(self.error("expected 'defined' after 'is'"));
                }
                self.pos += 1;
                match lhs {
                    Expr::Var(path) => Ok(Expr::Defined { path, negated }),
                    _ => Err(self.error("'is defined' applies to variables only")),
                }
            }
            _ => Ok(lhs),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Tok::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Tok::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Tok::LParen) => {
                let inner = self.or()?;
                if self.next() != Some(Tok::RParen) {
                    return Err(self.error("missing ')'"));
                }
                Ok(inner)
            }
            Some(Tok::Ident(word)) => match word.as_str() {
                "None" | "none" => Ok(Expr::Literal(Value::None)),
                "true" | "True" => Ok(Expr::Literal(Value::Bool(true))),
                "false" | "False" => Ok(Expr::Literal(Value::Bool(false))),
                "and" | "or" | "not" | "is" | "in" => {
                    Err(self.error(&format!("unexpected keyword '{}'", word)))
                }
                _ => {
                    let mut path = vec![word];
                    while self.peek() == Some(&Tok::Dot) {
                        self.pos += 1;
                        match self.next() {
                            Some(Tok::Ident(seg)) => path.push(seg),
                            _ => return Err(self.error("expected name after '.'")),
                        }
                    }
                    Ok(Expr::Var(path))
                }
            },
            _ => Err(self.error("expected a value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Expr {
        Expr::Var(name.split('.').map(str::to_string).collect())
    }

    #[test]
    fn test_parse_expr_precedence() {
        let e = parse_expr("t", "a or b and not c", 1).unwrap();
        assert_eq!(
            e,
            Expr::Or(
                Box::new(var("a")),
                Box::new(Expr::And(
                    Box::new(var("b")),
                    Box::new(Expr::Not(Box::new(var("c"))))
                ))
            )
        );
    }

    #[test]
    fn test_parse_compare_and_defined() {
        let e = parse_expr("t", "cluster_name == 'lemaitre3'", 1).unwrap();
        assert_eq!(
            e,
            Expr::Compare {
                lhs: Box::new(var("cluster_name")),
                rhs: Box::new(Expr::Literal(Value::from("lemaitre3"))),
                negated: false,
            }
        );

        let e = parse_expr("t", "job.partition is not defined", 1).unwrap();
        assert_eq!(
            e,
            Expr::Defined {
                path: vec!["job".to_string(), "partition".to_string()],
                negated: true,
            }
        );

        let e = parse_expr("t", "(x != None)", 1).unwrap();
        assert!(matches!(e, Expr::Compare { negated: true, .. }));
    }

    #[test]
    fn test_parse_expr_errors() {
        assert!(parse_expr("t", "a ==", 1).is_err());
        assert!(parse_expr("t", "a = b", 1).is_err());
        assert!(parse_expr("t", "'abc", 1).is_err());
        assert!(parse_expr("t", "a b", 1).is_err());
        assert!(parse_expr("t", "1 is defined", 1).is_err());
        assert!(parse_expr("t", "(a", 1).is_err());
    }

    #[test]
    fn test_parse_blocks() {
        let nodes = parse(
            "t",
            "{% if a %}A{% elif b %}B{% else %}C{% endif %}{% for x in xs %}{{ x }}{% endfor %}",
        )
        .unwrap();
        assert_eq!(nodes.len(), 2);
        match &nodes[0] {
            Node::If { branches, otherwise, .. } => {
                assert_eq!(branches.len(), 2);
                assert_eq!(otherwise, &vec![Node::Text("C".to_string())]);
            }
            other => panic!("unexpected node {:?}", other),
        }
        assert!(matches!(&nodes[1], Node::For { var, .. } if var == "x"));
    }

    #[test]
    fn test_parse_include() {
        let nodes = parse("t", "{% include \"benchmark.tpl\" %}").unwrap();
        assert_eq!(
            nodes,
            vec![Node::Include {
                name: "benchmark.tpl".to_string(),
                line: 1
            }]
        );
        assert!(parse("t", "{% include benchmark %}").is_err());
    }

    #[test]
    fn test_parse_block_errors() {
        assert!(parse("t", "{% if a %}x").is_err());
        assert!(parse("t", "{% for x in xs %}x").is_err());
        assert!(parse("t", "{% endif %}").is_err());
        assert!(parse("t", "{% else %}").is_err());
        assert!(parse("t", "{% while a %}{% endwhile %}").is_err());
        assert!(parse("t", "{% for x of xs %}{% endfor %}").is_err());
        assert!(parse("t", "{{ }}").is_err());
    }
}
