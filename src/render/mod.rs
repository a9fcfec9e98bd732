//! # 模板渲染引擎
//!
//! 按名称取得模板，对渲染上下文求值得到最终文本。
//!
//! ## 语法
//! - `{{ expr }}` 输出表达式的字符串形式
//! - `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}` 条件分支
//! - `{% for x in seq %}` ... `{% endfor %}` 迭代，循环体内可用 `loop.index` 等
//! - `{% include "name" %}` 在当前位置插入另一个模板的渲染结果，共享上下文
//! - `{# ... #}` 注释
//!
//! 引用上下文中不存在的变量是错误；与 `None` 比较或 `is defined` 检测时除外，
//! 此时缺失的变量视为 `None`。
//!
//! ## 依赖关系
//! - 被 `render/functions.rs`, `registry/`, `batch/driver.rs` 使用
//! - 子模块: lexer, parser, value, context, source, functions

pub mod context;
pub mod functions;
mod lexer;
mod parser;
pub mod source;
pub mod value;

pub use context::RenderContext;
#[cfg(test)]
pub use source::MemorySource;
pub use source::{DirectorySource, TemplateSource};
pub use value::Value;

use crate::error::{ChainsError, Result};
use parser::{Expr, Node};

use std::collections::BTreeMap;
use std::path::PathBuf;

/// include 嵌套上限
const MAX_INCLUDE_DEPTH: usize = 16;

/// 模板渲染器
pub struct Renderer {
    source: Box<dyn TemplateSource>,
}

impl Renderer {
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Renderer {
            source: Box::new(source),
        }
    }

    /// 从模板目录读取
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(DirectorySource::new(dir))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.source.contains(name)
    }

    /// 渲染指定名称的模板
    pub fn render(&self, name: &str, ctx: &RenderContext) -> Result<String> {
        let text = self.source.load(name)?;
        self.render_str(name, &text, ctx)
    }

    /// 渲染给定文本，`name` 只用于错误信息
    pub fn render_str(&self, name: &str, text: &str, ctx: &RenderContext) -> Result<String> {
        let nodes = parser::parse(name, text)?;
        let mut scope = Scope {
            ctx,
            locals: Vec::new(),
        };
        let mut out = String::with_capacity(text.len());
        self.render_nodes(name, &nodes, &mut scope, &mut out, 0)?;
        Ok(out)
    }

    /// 只做语法检查，连同全部 include 的模板
    pub fn check(&self, name: &str) -> Result<()> {
        self.check_at(name, 0)
    }

    fn check_at(&self, name: &str, depth: usize) -> Result<()> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(include_depth_error(name));
        }
        let text = self.source.load(name)?;
        let nodes = parser::parse(name, &text)?;
        let mut includes = Vec::new();
        collect_includes(&nodes, &mut includes);
        for child in includes {
            self.check_at(&child, depth + 1)?;
        }
        Ok(())
    }

    fn render_nodes(
        &self,
        template: &str,
        nodes: &[Node],
        scope: &mut Scope<'_>,
        out: &mut String,
        depth: usize,
    ) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output { expr, line } => {
                    let value = scope.eval(template, expr, *line)?;
                    out.push_str(&value.to_string());
                }
                Node::If {
                    branches,
                    otherwise,
                    line,
                } => {
                    let mut taken = None;
                    for (cond, body) in branches {
                        if scope.eval(template, cond, *line)?.is_truthy() {
                            taken = Some(body);
                            break;
                        }
                    }
                    let body = taken.unwrap_or(otherwise);
                    self.render_nodes(template, body, scope, out, depth)?;
                }
                Node::For {
                    var,
                    iterable,
                    body,
                    line,
                } => {
                    let items = match scope.eval(template, iterable, *line)? {
                        Value::List(items) => items,
                        Value::Map(map) => map.into_keys().map(Value::Str).collect(),
                        other => {
                            return Err(ChainsError::Render(format!(
                                "'{}' line {}: cannot iterate over a {}",
                                template,
                                line,
                                other.type_name()
                            )))
                        }
                    };

                    let length = items.len();
                    for (i, item) in items.into_iter().enumerate() {
                        scope.locals.push((var.clone(), item));
                        scope.locals.push(("loop".to_string(), loop_value(i, length)));
                        let result = self.render_nodes(template, body, scope, out, depth);
                        scope.locals.truncate(scope.locals.len() - 2);
                        result?;
                    }
                }
                Node::Include { name, line } => {
                    if depth >= MAX_INCLUDE_DEPTH {
                        return Err(include_depth_error(name));
                    }
                    let text = self.source.load(name).map_err(|e| {
                        ChainsError::Render(format!(
                            "'{}' line {}: cannot include '{}': {}",
                            template, line, name, e
                        ))
                    })?;
                    let nodes = parser::parse(name, &text)?;
                    self.render_nodes(name, &nodes, scope, out, depth + 1)?;
                }
            }
        }
        Ok(())
    }
}

fn include_depth_error(name: &str) -> ChainsError {
    ChainsError::Render(format!(
        "include depth exceeds {} at '{}' (recursive include?)",
        MAX_INCLUDE_DEPTH, name
    ))
}

fn collect_includes(nodes: &[Node], found: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Include { name, .. } => found.push(name.clone()),
            Node::If {
                branches,
                otherwise,
                ..
            } => {
                for (_, body) in branches {
                    collect_includes(body, found);
                }
                collect_includes(otherwise, found);
            }
            Node::For { body, .. } => collect_includes(body, found),
            Node::Text(_) | Node::Output { .. } => {}
        }
    }
}

fn loop_value(i: usize, length: usize) -> Value {
    let mut m = BTreeMap::new();
    m.insert("index".to_string(), Value::from((i + 1) as u64));
    m.insert("index0".to_string(), Value::from(i as u64));
    m.insert("first".to_string(), Value::Bool(i == 0));
    m.insert("last".to_string(), Value::Bool(i + 1 == length));
    m.insert("length".to_string(), Value::from(length as u64));
    Value::Map(m)
}

/// 求值作用域：上下文加循环变量
struct Scope<'a> {
    ctx: &'a RenderContext,
    locals: Vec<(String, Value)>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, path: &[String]) -> Option<Value> {
        let (head, rest) = path.split_first()?;
        let mut current = self
            .locals
            .iter()
            .rev()
            .find(|(k, _)| k == head)
            .map(|(_, v)| v)
            .or_else(|| self.ctx.get(head))?;
        for seg in rest {
            current = current.get(seg)?;
        }
        Some(current.clone())
    }

    fn eval(&self, template: &str, expr: &Expr, line: usize) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Var(path) => self.lookup(path).ok_or_else(|| ChainsError::UndefinedVariable {
                template: template.to_string(),
                name: path.join("."),
                line,
            }),
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(template, inner, line)?.is_truthy())),
            Expr::And(lhs, rhs) => {
                if !self.eval(template, lhs, line)?.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(template, rhs, line)?.is_truthy()))
            }
            Expr::Or(lhs, rhs) => {
                if self.eval(template, lhs, line)?.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(template, rhs, line)?.is_truthy()))
            }
            Expr::Compare { lhs, rhs, negated } => {
                let a = self.operand(template, lhs, line)?;
                let b = self.operand(template, rhs, line)?;
                Ok(Value::Bool(a.loose_eq(&b) != *negated))
            }
            Expr::Defined { path, negated } => {
                Ok(Value::Bool(self.lookup(path).is_some() != *negated))
            }
        }
    }

    /// 比较的操作数，缺失的变量视为 None
    fn operand(&self, template: &str, expr: &Expr, line: usize) -> Result<Value> {
        match expr {
            Expr::Var(path) => Ok(self.lookup(path).unwrap_or(Value::None)),
            other => self.eval(template, other, line),
        }
    }
}
