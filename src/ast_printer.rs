//! Renders AST nodes back to source-like text.
//!
//! Used by the `parse` subcommand and by tests: printing a parsed program
//! and re-scanning/re-parsing the output yields a structurally identical
//! tree, so `print ∘ parse` reaches a fixpoint after one round.  That only
//! holds because every shape the parser can produce is printed with the
//! syntax that produces it: groupings keep their parentheses and strings keep
//! their quotes, and operator chains rely on the grammar's own
//! associativity.

use crate::ast::{Expr, FunctionDecl, LiteralValue, Stmt};

/// Converts expressions and statements to compact single-line source form.
pub struct AstPrinter;

impl AstPrinter {
    /// Print a whole program, one statement per line.
    pub fn print_program(statements: &[Stmt]) -> String {
        let lines: Vec<String> = statements.iter().map(Self::print_stmt).collect();

        lines.join("\n")
    }

    pub fn print_stmt(stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression(expr) => format!("{};", Self::print(expr)),

            Stmt::Print(expr) => format!("print {};", Self::print(expr)),

            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("var {} = {};", name.lexeme, Self::print(init)),
                None => format!("var {};", name.lexeme),
            },

            Stmt::Block(statements) => {
                let mut s = String::from("{");
                for stmt in statements {
                    s.push(' ');
                    s.push_str(&Self::print_stmt(stmt));
                }
                s.push_str(" }");
                s
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let mut s = format!(
                    "if ({}) {}",
                    Self::print(condition),
                    Self::print_stmt(then_branch)
                );
                if let Some(else_branch) = else_branch {
                    s.push_str(" else ");
                    s.push_str(&Self::print_stmt(else_branch));
                }
                s
            }

            Stmt::While { condition, body } => {
                format!("while ({}) {}", Self::print(condition), Self::print_stmt(body))
            }

            Stmt::Function(decl) => format!("fun {}", Self::print_function(decl)),

            Stmt::Return { value, .. } => match value {
                Some(value) => format!("return {};", Self::print(value)),
                None => "return;".into(),
            },

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let mut s = format!("class {}", name.lexeme);
                if let Some(Expr::Variable { name: superclass, .. }) = superclass {
                    s.push_str(" < ");
                    s.push_str(&superclass.lexeme);
                }
                s.push_str(" {");
                for method in methods {
                    s.push(' ');
                    s.push_str(&Self::print_function(method));
                }
                s.push_str(" }");
                s
            }
        }
    }

    fn print_function(decl: &FunctionDecl) -> String {
        let params: Vec<&str> = decl.params.iter().map(|p| p.lexeme.as_str()).collect();

        let mut s = format!("{}({}) {{", decl.name.lexeme, params.join(", "));
        for stmt in &decl.body {
            s.push(' ');
            s.push_str(&Self::print_stmt(stmt));
        }
        s.push_str(" }");
        s
    }

    pub fn print(expr: &Expr) -> String {
        match expr {
            // ── literals ────────────────────────────────────────────────
            Expr::Literal(lit) => match lit {
                LiteralValue::True => "true".into(),

                LiteralValue::False => "false".into(),

                LiteralValue::Nil => "nil".into(),

                // Quotes restored so the output re-scans as a string.
                LiteralValue::Str(s) => format!("\"{}\"", s),

                LiteralValue::Number(n) => {
                    if n.fract() == 0.0 {
                        format!("{:.0}", n)
                    } else {
                        n.to_string()
                    }
                }
            },

            // ── grouping ────────────────────────────────────────────────
            Expr::Grouping(inner) => format!("({})", Self::print(inner)),

            // ── unary operator ──────────────────────────────────────────
            Expr::Unary { operator, right } => {
                format!("{}{}", operator.lexeme, Self::print(right))
            }

            // ── binary / logical operators ──────────────────────────────
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
                Self::print(left),
                operator.lexeme,
                Self::print(right)
            ),

            // ── names and assignment ────────────────────────────────────
            Expr::Variable { name, .. } => name.lexeme.clone(),

            Expr::Assign { name, value, .. } => {
                format!("{} = {}", name.lexeme, Self::print(value))
            }

            // ── calls and properties ────────────────────────────────────
            Expr::Call {
                callee, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(Self::print).collect();

                format!("{}({})", Self::print(callee), args.join(", "))
            }

            Expr::Get { object, name } => format!("{}.{}", Self::print(object), name.lexeme),

            Expr::Set {
                object,
                name,
                value,
            } => format!(
                "{}.{} = {}",
                Self::print(object),
                name.lexeme,
                Self::print(value)
            ),

            Expr::This { .. } => "this".into(),

            Expr::Super { method, .. } => format!("super.{}", method.lexeme),
        }
    }
}
