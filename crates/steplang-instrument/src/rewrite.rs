//! The AST rewriting visitor.
//!
//! Each syntactic category has one rewrite arm; statement-like nodes emit a
//! before/after bracket around themselves, expression-like nodes wrap their
//! own evaluation. Excluded from reporting (wrapping them would change
//! semantics, not just trace fidelity):
//!
//! - assignment targets and their member/index chains in target position
//! - `let` binding names, function names, and parameter lists
//! - object literal keys
//! - bare identifiers in callee position (the call reads the binding
//!   directly; wrapping would report it as a detached value read)
//! - the `for` header's init declaration as a statement (its initializer
//!   expression still reports; statements cannot be injected into the
//!   header)
//! - sequence expressions themselves (their elements still report)
//! - everything the rewriter generates
//!
//! Exclusion never changes result values or control flow -- excluded nodes
//! execute exactly as written, they just emit no step of their own.

use steplang_core::Span;
use steplang_syntax::ast::{Expr, ExprKind, Program, Stmt, StmtKind};

use crate::{REPORT_BEFORE, REPORT_AFTER, REPORT_VALUE};

/// Rewrites a whole program.
pub fn rewrite_program(program: Program) -> Program {
    Program {
        body: rewrite_block(program.body),
    }
}

/// Rewrites a statement list, bracketing every statement with report calls.
///
/// Statements that transfer control (`return`, `break`, `continue`,
/// `throw`) get no `after` call: control never reaches the spot where it
/// would stand, and emitting it before the transfer would claim completion
/// of a statement that is still executing.
fn rewrite_block(body: Vec<Stmt>) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(body.len() * 3);
    for stmt in body {
        let kind_name = stmt.kind_name();
        let span = stmt.span;
        let transfers = stmt.transfers_control();
        out.push(before_statement(kind_name, span));
        out.push(rewrite_stmt(stmt));
        if !transfers {
            out.push(after_statement(kind_name, span));
        }
    }
    out
}

fn rewrite_stmt(stmt: Stmt) -> Stmt {
    let span = stmt.span;
    let kind = match stmt.kind {
        StmtKind::Let { name, init } => StmtKind::Let {
            name,
            init: rewrite_expr(init),
        },
        StmtKind::Expr { expr } => StmtKind::Expr {
            expr: rewrite_expr(expr),
        },
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => StmtKind::If {
            cond: rewrite_expr(cond),
            then_block: rewrite_block(then_block),
            else_block: else_block.map(rewrite_block),
        },
        StmtKind::While { cond, body } => StmtKind::While {
            // The condition re-reports on every iteration because the
            // wrapped expression is evaluated on every iteration.
            cond: rewrite_expr(cond),
            body: rewrite_block(body),
        },
        StmtKind::For {
            init,
            cond,
            update,
            body,
        } => StmtKind::For {
            init: init.map(|stmt| Box::new(rewrite_for_init(*stmt))),
            cond: cond.map(rewrite_expr),
            update: update.map(rewrite_expr),
            body: rewrite_block(body),
        },
        StmtKind::Function { name, params, body } => StmtKind::Function {
            name,
            params,
            body: rewrite_block(body),
        },
        StmtKind::Return { value } => StmtKind::Return {
            value: value.map(rewrite_expr),
        },
        StmtKind::Break => StmtKind::Break,
        StmtKind::Continue => StmtKind::Continue,
        StmtKind::Throw { value } => StmtKind::Throw {
            value: rewrite_expr(value),
        },
        StmtKind::Block { body } => StmtKind::Block {
            body: rewrite_block(body),
        },
    };
    Stmt { kind, span }
}

/// A `for` header init slot: only the initializer expression reports.
fn rewrite_for_init(stmt: Stmt) -> Stmt {
    let span = stmt.span;
    let kind = match stmt.kind {
        StmtKind::Let { name, init } => StmtKind::Let {
            name,
            init: rewrite_expr(init),
        },
        StmtKind::Expr { expr } => StmtKind::Expr {
            expr: rewrite_expr(expr),
        },
        other => other,
    };
    Stmt { kind, span }
}

fn rewrite_expr(expr: Expr) -> Expr {
    let kind_name = expr.kind_name();
    let span = expr.span;
    let kind = match expr.kind {
        // Leaves carry nothing to recurse into.
        leaf @ (ExprKind::Null
        | ExprKind::Bool(_)
        | ExprKind::Num(_)
        | ExprKind::Str(_)
        | ExprKind::Ident(_)) => leaf,
        ExprKind::Array(items) => {
            ExprKind::Array(items.into_iter().map(rewrite_expr).collect())
        }
        ExprKind::Object(entries) => ExprKind::Object(
            entries
                .into_iter()
                .map(|(key, value)| (key, rewrite_expr(value)))
                .collect(),
        ),
        ExprKind::Unary { op, operand } => ExprKind::Unary {
            op,
            operand: Box::new(rewrite_expr(*operand)),
        },
        ExprKind::Binary { op, left, right } => ExprKind::Binary {
            op,
            left: Box::new(rewrite_expr(*left)),
            right: Box::new(rewrite_expr(*right)),
        },
        // The rewritten right operand stays in right-operand position, so
        // short-circuiting still skips its report calls entirely.
        ExprKind::Logical { op, left, right } => ExprKind::Logical {
            op,
            left: Box::new(rewrite_expr(*left)),
            right: Box::new(rewrite_expr(*right)),
        },
        // The target is excluded from reporting; only the value reports.
        ExprKind::Assign { op, target, value } => ExprKind::Assign {
            op,
            target,
            value: Box::new(rewrite_expr(*value)),
        },
        ExprKind::Call { callee, args } => {
            let callee = match callee.kind {
                // A bare callee identifier is a direct binding read.
                ExprKind::Ident(_) => callee,
                _ => Box::new(rewrite_expr(*callee)),
            };
            ExprKind::Call {
                callee,
                args: args.into_iter().map(rewrite_expr).collect(),
            }
        }
        ExprKind::Member { object, property } => ExprKind::Member {
            object: Box::new(rewrite_expr(*object)),
            property,
        },
        ExprKind::Index { object, index } => ExprKind::Index {
            object: Box::new(rewrite_expr(*object)),
            index: Box::new(rewrite_expr(*index)),
        },
        ExprKind::Function { name, params, body } => ExprKind::Function {
            name,
            params,
            body: rewrite_block(body),
        },
        ExprKind::Seq(exprs) => {
            // User-written sequences are transparent like grouping; the
            // elements report individually.
            let exprs = exprs.into_iter().map(rewrite_expr).collect();
            return Expr::new(ExprKind::Seq(exprs), span);
        }
    };
    wrap_expression(Expr::new(kind, span), kind_name)
}

/// Wraps a rewritten expression in its before/value reporting sequence.
fn wrap_expression(expr: Expr, kind_name: &str) -> Expr {
    let span = expr.span;
    let before = report_call(
        REPORT_BEFORE,
        kind_name,
        Some("expression"),
        span,
        None,
        span,
    );
    let value = report_call(REPORT_VALUE, kind_name, None, span, Some(expr), span);
    Expr::new(ExprKind::Seq(vec![before, value]), span)
}

fn before_statement(kind_name: &str, span: Span) -> Stmt {
    Stmt {
        kind: StmtKind::Expr {
            expr: report_call(
                REPORT_BEFORE,
                kind_name,
                Some("statement"),
                span,
                None,
                span,
            ),
        },
        span,
    }
}

fn after_statement(kind_name: &str, span: Span) -> Stmt {
    Stmt {
        kind: StmtKind::Expr {
            expr: report_call(REPORT_AFTER, kind_name, None, span, None, span),
        },
        span,
    }
}

/// Builds `fname(kind, [category,] l1, c1, l2, c2 [, payload])`.
///
/// Spans on generated nodes are never reported; the location the viewer
/// sees is the literal argument tuple, which always comes from the original
/// node's span.
fn report_call(
    fname: &str,
    kind_name: &str,
    category: Option<&str>,
    loc: Span,
    payload: Option<Expr>,
    span: Span,
) -> Expr {
    let mut args = vec![str_lit(kind_name, span)];
    if let Some(category) = category {
        args.push(str_lit(category, span));
    }
    args.push(num_lit(loc.start.line as f64, span));
    args.push(num_lit(loc.start.column as f64, span));
    args.push(num_lit(loc.end.line as f64, span));
    args.push(num_lit(loc.end.column as f64, span));
    if let Some(payload) = payload {
        args.push(payload);
    }
    Expr::new(
        ExprKind::Call {
            callee: Box::new(Expr::new(ExprKind::Ident(fname.to_string()), span)),
            args,
        },
        span,
    )
}

fn str_lit(value: &str, span: Span) -> Expr {
    Expr::new(ExprKind::Str(value.to_string()), span)
}

fn num_lit(value: f64, span: Span) -> Expr {
    Expr::new(ExprKind::Num(value), span)
}

#[cfg(test)]
mod tests {
    use crate::instrument;
    use steplang_syntax::parse;

    fn instrumented(source: &str) -> String {
        instrument(source).unwrap().source
    }

    #[test]
    fn let_statement_fixture() {
        let out = instrumented("let x = 1;");
        let expected = "\
__step_before__(\"LetStatement\", \"statement\", 1, 0, 1, 10);
let x = (__step_before__(\"NumericLiteral\", \"expression\", 1, 8, 1, 9), __step_value__(\"NumericLiteral\", 1, 8, 1, 9, 1));
__step_after__(\"LetStatement\", 1, 0, 1, 10);
";
        assert_eq!(out, expected);
    }

    #[test]
    fn output_reparses() {
        let out = instrumented(
            "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }\nlet r = fib(6);",
        );
        parse(&out).expect("instrumented output must be parseable");
    }

    #[test]
    fn binary_operands_each_report() {
        let out = instrumented("let x = 1 + 2;");
        assert_eq!(out.matches("\"NumericLiteral\", \"expression\"").count(), 2);
        assert_eq!(
            out.matches("\"BinaryExpression\", \"expression\"").count(),
            1
        );
    }

    #[test]
    fn assignment_target_not_wrapped() {
        let out = instrumented("let a = { b: 1 };\na.b = 2;");
        // The assignment's target member expression must not report; only
        // the object literal read (`{ b: 1 }`) and the assigned value do.
        assert_eq!(out.matches("\"MemberExpression\"").count(), 0);
        assert_eq!(out.matches("\"AssignmentExpression\"").count(), 2);
    }

    #[test]
    fn member_read_is_wrapped() {
        let out = instrumented("let a = { b: 1 };\nlet c = a.b;");
        assert!(out.matches("\"MemberExpression\"").count() >= 2);
    }

    #[test]
    fn bare_callee_identifier_not_wrapped() {
        let out = instrumented("f(1);");
        // `f` must stay a direct binding read: the emitted call happens on
        // the bare identifier, never on a wrapped sequence.
        assert!(out.contains("f((__step_before__"));
        assert_eq!(out.matches("\"Identifier\"").count(), 0);
    }

    #[test]
    fn short_circuit_operand_stays_in_branch() {
        let out = instrumented("let x = true || f();");
        // The wrapped call expression must appear inside the logical's
        // right operand, i.e. after the `||` in the emitted source.
        let or_pos = out.find("||").expect("logical operator");
        let call_pos = out.find("\"CallExpression\"").expect("call report");
        assert!(call_pos > or_pos);
    }

    #[test]
    fn control_transfer_statements_have_no_after() {
        let out = instrumented("function f() { return 1; }\nf();");
        assert_eq!(out.matches("\"ReturnStatement\", \"statement\"").count(), 1);
        assert!(!out.contains("__step_after__(\"ReturnStatement\""));
    }

    #[test]
    fn loop_body_reports_live_inside_loop() {
        let out = instrumented("while (x > 0) { x -= 1; }");
        // The while condition and body report calls must be inside the
        // emitted while statement, not hoisted before it.
        let while_pos = out.find("while").unwrap();
        let cond_report = out.find("\"BinaryExpression\", \"expression\"").unwrap();
        assert!(cond_report > while_pos);
    }

    #[test]
    fn syntax_error_detected_before_execution() {
        let err = instrument("let x = ;").unwrap_err();
        let failure = err.to_failure();
        assert_eq!(failure.kind, "SyntaxError");
        assert!(failure.message.contains("expected an expression"));
    }

    #[test]
    fn locations_are_one_based_lines_zero_based_columns() {
        let out = instrumented("\nlet y = 5;");
        assert!(out.contains("__step_before__(\"LetStatement\", \"statement\", 2, 0, 2, 10)"));
    }
}
