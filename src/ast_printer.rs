//! Two renderings of an expression tree:
//!
//! * [`AstPrinter::print`]: fully parenthesised prefix form, e.g.
//!   `(+ 1.0 (group (* 2.0 3.0)))`, as shown by the `parse` command.
//! * [`AstPrinter::to_source`]: infix source text that parses back into the
//!   same tree.  Grouping nodes are the only parentheses emitted, so a tree the
//!   parser built round‑trips unchanged.

use crate::ast::{Expr, LiteralValue};
use crate::token::format_literal_number;
use crate::value::Value;

pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => format_literal_number(*n),
                LiteralValue::Str(s) => s.clone(),
                LiteralValue::True => "true".to_string(),
                LiteralValue::False => "false".to_string(),
                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Grouping(inner) => format!("(group {})", self.print(inner)),

            Expr::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, self.print(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print(left),
                self.print(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, self.print(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let mut out = format!("(call {}", self.print(callee));
                for arg in arguments {
                    out.push(' ');
                    out.push_str(&self.print(arg));
                }
                out.push(')');
                out
            }

            Expr::Get { object, name } => format!("(. {} {})", self.print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "(= (. {} {}) {})",
                self.print(object),
                name.lexeme,
                self.print(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("(super {})", method.lexeme),
        }
    }

    pub fn to_source(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => Value::Number(*n).to_string(),
                LiteralValue::Str(s) => format!("\"{}\"", s),
                LiteralValue::True => "true".to_string(),
                LiteralValue::False => "false".to_string(),
                LiteralValue::Nil => "nil".to_string(),
            },

            Expr::Grouping(inner) => format!("({})", self.to_source(inner)),

            Expr::Unary { operator, right } => {
                format!("{}{}", operator.lexeme, self.to_source(right))
            }

            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                self.to_source(left),
                operator.lexeme,
                self.to_source(right)
            ),

            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("{} = {}", name.lexeme, self.to_source(value))
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(|a| self.to_source(a)).collect();
                format!("{}({})", self.to_source(callee), args.join(", "))
            }

            Expr::Get { object, name } => format!("{}.{}", self.to_source(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "{}.{} = {}",
                self.to_source(object),
                name.lexeme,
                self.to_source(value)
            ),

            Expr::This { .. } => "this".to_string(),

            Expr::Super { method, .. } => format!("super.{}", method.lexeme),
        }
    }
}
