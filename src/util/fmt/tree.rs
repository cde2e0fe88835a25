//! Renders a compiled [`Program`] as an indented tree, one node per line.
//! Every expression line carries the type computed for it, so the output
//! doubles as a readable record of what the type checker decided.

use std::fmt::Write;

use crate::{
    ast::{Block, Call, Closure, Expr, ExprKind, FunDecl, Param, Program, Stmt},
    types::Type,
};

pub fn print_program_string(program: &Program) -> String {
    let mut printer = TreePrinter::default();
    printer.program(program);
    printer.out
}

#[derive(Default)]
struct TreePrinter {
    out: String,
    depth: usize,
}

impl TreePrinter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut TreePrinter)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn program(&mut self, program: &Program) {
        for global in &program.globals {
            self.stmt(global);
        }
        for function in &program.functions {
            self.function(function);
        }
    }

    fn function(&mut self, function: &FunDecl) {
        let mut header = format!("fun {}({})", function.name, params(&function.params));
        if function.ret != Type::Void {
            let _ = write!(header, " {}", function.ret);
        }
        self.line(&header);
        self.nested(|p| p.stmts(&function.body));
    }

    fn stmts(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    /// A labeled section holding one statement, as in a `for` header.
    fn section_stmt(&mut self, label: &str, stmt: &Stmt) {
        self.line(label);
        self.nested(|p| p.stmt(stmt));
    }

    fn section_expr(&mut self, label: &str, expr: &Expr) {
        self.line(label);
        self.nested(|p| p.expr(expr));
    }

    fn section_block(&mut self, label: &str, block: &Block) {
        self.line(label);
        self.nested(|p| p.stmts(block));
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration { name, ty, init } => {
                self.line(&format!("var {name} {ty}"));
                if let Some(init) = init {
                    self.nested(|p| p.expr(init));
                }
            }
            Stmt::Assignment {
                target,
                op,
                value,
                wait,
            } => {
                let suffix = if *wait { " (wait)" } else { "" };
                self.line(&format!("assign {target} {}{suffix}", op.symbol()));
                if let Some(value) = value {
                    self.nested(|p| p.expr(value));
                }
            }
            Stmt::Call(call) => self.call(call),
            Stmt::For {
                init,
                cond,
                step,
                body,
            } => {
                self.line("for");
                self.nested(|p| {
                    if let Some(init) = init {
                        p.section_stmt("init", init);
                    }
                    if let Some(cond) = cond {
                        p.section_expr("cond", cond);
                    }
                    if let Some(step) = step {
                        p.section_stmt("step", step);
                    }
                    p.section_block("body", body);
                });
            }
            Stmt::While { cond, body } => {
                self.line("while");
                self.nested(|p| {
                    p.section_expr("cond", cond);
                    p.section_block("body", body);
                });
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => {
                self.line("if");
                self.nested(|p| {
                    p.section_expr("cond", cond);
                    p.section_block("then", then_body);
                    if let Some(else_body) = else_body {
                        p.section_block("else", else_body);
                    }
                });
            }
            Stmt::Return(value) => {
                self.line("return");
                if let Some(value) = value {
                    self.nested(|p| p.expr(value));
                }
            }
            Stmt::Block(block) => self.section_block("block", block),
            Stmt::Async(body) => self.section_block("async", body),
            Stmt::Dasync { target, body } => {
                self.section_block(&format!("dasync {target}"), body);
            }
        }
    }

    fn call(&mut self, call: &Call) {
        self.line(&format!("call {} : {}", call.name, call.ty));
        self.nested(|p| {
            for arg in &call.args {
                p.expr(arg);
            }
            for group in &call.chained {
                p.line("apply");
                p.nested(|p| {
                    for arg in group {
                        p.expr(arg);
                    }
                });
            }
        });
    }

    fn expr(&mut self, expr: &Expr) {
        let ty = &expr.ty;
        match &expr.kind {
            ExprKind::Int(v) => self.line(&format!("int {v} : {ty}")),
            ExprKind::Float(v) => self.line(&format!("float {v} : {ty}")),
            ExprKind::Double(v) => self.line(&format!("double {v} : {ty}")),
            ExprKind::Char(c) => self.line(&format!("char '{c}' : {ty}")),
            ExprKind::Str(s) => self.line(&format!("str \"{s}\" : {ty}")),
            ExprKind::Bool(b) => self.line(&format!("bool {b} : {ty}")),
            ExprKind::Ident { name, wait } => {
                let suffix = if *wait { " (wait)" } else { "" };
                self.line(&format!("ident {name}{suffix} : {ty}"));
            }
            ExprKind::Call(call) => self.call(call),
            ExprKind::Cast(operand) => {
                self.line(&format!("cast : {ty}"));
                self.nested(|p| p.expr(operand));
            }
            ExprKind::Closure(closure) => self.closure(closure, ty),
            ExprKind::Async(body) => {
                self.section_block(&format!("async : {ty}"), body);
            }
            ExprKind::Dasync { target, body } => {
                self.section_block(&format!("dasync {target} : {ty}"), body);
            }
            ExprKind::Unary { op, operand } => {
                self.line(&format!("unary {} : {ty}", op.symbol()));
                self.nested(|p| p.expr(operand));
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.line(&format!("binary {} : {ty}", op.symbol()));
                self.nested(|p| {
                    p.expr(lhs);
                    p.expr(rhs);
                });
            }
        }
    }

    fn closure(&mut self, closure: &Closure, ty: &Type) {
        let mut header = format!("closure({})", params(&closure.params));
        if closure.ret != Type::Void {
            let _ = write!(header, " {}", closure.ret);
        }
        let _ = write!(header, " : {ty}");
        self.line(&header);
        self.nested(|p| p.stmts(&closure.body));
    }
}

fn params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| format!("{} {}", p.name, p.ty))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AssignOp, BinaryOp};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn int(v: i32) -> Expr {
        Expr {
            kind: ExprKind::Int(v),
            ty: Type::Int,
        }
    }

    #[test]
    fn renders_nested_statements() {
        let program = Program {
            globals: vec![Stmt::Declaration {
                name: "g".into(),
                ty: Type::Int,
                init: Some(int(0)),
            }],
            functions: vec![FunDecl {
                name: "main".into(),
                params: vec![],
                ret: Type::Void,
                body: Block {
                    stmts: vec![Stmt::Assignment {
                        target: "g".into(),
                        op: AssignOp::Assign,
                        value: Some(Expr {
                            kind: ExprKind::Binary {
                                op: BinaryOp::Add,
                                lhs: Box::new(int(1)),
                                rhs: Box::new(int(2)),
                            },
                            ty: Type::Int,
                        }),
                        wait: false,
                    }],
                },
            }],
        };
        assert_eq!(
            print_program_string(&program),
            indoc! {r"
                var g int
                  int 0 : int
                fun main()
                  assign g =
                    binary + : int
                      int 1 : int
                      int 2 : int
            "}
        );
    }
}
