use std::{mem, rc::Rc};

use crate::{
    ast::{
        AssignOp, BinaryOp, Block, Call, Closure, Expr, ExprKind, FunDecl, Param, Program, Stmt,
        UnaryOp,
    },
    error::{AsyncError, CompileError, ErrorKind, ScopeError, SyntaxError, TypeError},
    lexer::Lexer,
    scope::{Identifier, Record, ScopeStack},
    token::{Token, TokenKind},
    types::{FunctionType, Type},
};

/// Parses, resolves, and type-checks a whole program in a single pass.
/// Fails fast: the first violation aborts the compilation.
pub fn parse_program(src: &str) -> Result<Program, CompileError> {
    Parser::new(src)?.program()
}

struct Parser<'src> {
    lexer: Lexer<'src>,
    token: Token,
    scopes: ScopeStack,
    /// Declared return type of the function or closure being parsed.
    ret_ty: Type,
    saw_return: bool,
    main_found: bool,
    inside_async: bool,
    /// Stack position at the entry of the innermost async or dasync block;
    /// assignments to records below it are side-effect violations.
    async_index: usize,
    async_return: bool,
    async_result: Option<Type>,
    inside_closure: bool,
    closure_return: bool,
    /// Function-typed parameters awaiting their sibling callable bindings,
    /// pushed right after the owning frame.
    deferred_params: Vec<(Rc<str>, FunctionType)>,
}

impl<'src> Parser<'src> {
    fn new(src: &'src str) -> Result<Parser<'src>, CompileError> {
        let mut lexer = Lexer::new(src);
        let token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            token,
            scopes: ScopeStack::new(),
            ret_ty: Type::Void,
            saw_return: false,
            main_found: false,
            inside_async: false,
            async_index: 0,
            async_return: false,
            async_result: None,
            inside_closure: false,
            closure_return: false,
            deferred_params: Vec::new(),
        })
    }

    fn program(mut self) -> Result<Program, CompileError> {
        let mut globals = Vec::new();
        while self.token.kind == TokenKind::Var {
            globals.extend(self.declaration()?);
        }
        let mut functions = Vec::new();
        loop {
            match self.token.kind.clone() {
                TokenKind::Fun => {
                    self.advance()?;
                    let name: Rc<str> = match self.token.kind.clone() {
                        TokenKind::Main => {
                            if self.main_found {
                                return Err(self.err(ScopeError::DuplicatedMain));
                            }
                            self.main_found = true;
                            "main".into()
                        }
                        TokenKind::Identifier(name) => name.into(),
                        other => {
                            return Err(
                                self.err(SyntaxError::ExpectedIdentifier(other.to_string()))
                            );
                        }
                    };
                    self.advance()?;
                    functions.push(self.function(name)?);
                }
                TokenKind::Eof => break,
                other => return Err(self.err(SyntaxError::UnexpectedToken(other.to_string()))),
            }
        }
        if !self.main_found {
            return Err(self.err(ScopeError::MissingMain));
        }
        Ok(Program { globals, functions })
    }

    fn function(&mut self, name: Rc<str>) -> Result<FunDecl, CompileError> {
        let line = self.line();
        self.expect(&TokenKind::LParen)?;
        let params = self.param_list(false)?;
        self.expect(&TokenKind::RParen)?;
        let ret = self.opt_type()?;

        let param_types: Vec<Type> = params.iter().map(|p| p.ty.clone()).collect();
        if self.scopes.has_signature(&name, &param_types) {
            return Err(CompileError::new(
                line,
                ScopeError::DuplicatedFunction(render_call(&name, &param_types)),
            ));
        }
        let sig = FunctionType::new(param_types, ret.clone());
        self.scopes
            .push_frame(Record::function(Rc::clone(&name), sig));
        for param in &params {
            self.scopes.declare(
                Identifier::new(Rc::clone(&param.name), param.ty.clone(), true),
                line,
            )?;
        }
        self.flush_deferred_params();

        self.ret_ty = ret.clone();
        self.saw_return = false;
        let body = self.block_body()?;
        self.scopes.close_block(true);
        if ret != Type::Void && !self.saw_return {
            return Err(self.err(TypeError::MissingReturn {
                name: name.to_string(),
                ty: ret.to_string(),
            }));
        }
        Ok(FunDecl {
            name,
            params,
            ret,
            body,
        })
    }

    fn param_list(&mut self, check_scope: bool) -> Result<Vec<Param>, CompileError> {
        let mut params = Vec::new();
        while let TokenKind::Identifier(n) = &self.token.kind {
            let name: Rc<str> = n.as_str().into();
            if check_scope && self.scopes.find_record(&name, false).is_some() {
                return Err(self.err(ScopeError::DuplicatedVariable(name.to_string())));
            }
            self.advance()?;
            let ty = self.parse_type()?;
            if let Type::Function(sig) = &ty {
                self.deferred_params.push((Rc::clone(&name), sig.clone()));
            }
            params.push(Param { name, ty });
            if self.token.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(params)
    }

    fn flush_deferred_params(&mut self) {
        for (name, sig) in mem::take(&mut self.deferred_params) {
            self.scopes.push_binding(name, sig);
        }
    }

    // ==== statements ====

    fn block_body(&mut self) -> Result<Block, CompileError> {
        self.expect(&TokenKind::LBrace)?;
        let stmts = self.statement_list()?;
        self.expect(&TokenKind::RBrace)?;
        Ok(Block { stmts })
    }

    /// Parses a `{ ... }` block with its own anonymous record.
    fn scoped_block(&mut self) -> Result<Block, CompileError> {
        self.scopes.push_frame(Record::block());
        let block = self.block_body()?;
        self.scopes.close_block(false);
        Ok(block)
    }

    fn statement_list(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            match self.token.kind.clone() {
                TokenKind::Var => stmts.extend(self.declaration()?),
                TokenKind::Identifier(name) => {
                    let name: Rc<str> = name.into();
                    self.advance()?;
                    let stmt = if self.token.kind == TokenKind::LParen {
                        Stmt::Call(self.call(name)?)
                    } else {
                        self.assignment(name)?
                    };
                    self.expect(&TokenKind::Semicolon)?;
                    stmts.push(stmt);
                }
                TokenKind::For => stmts.push(self.for_stmt()?),
                TokenKind::While => stmts.push(self.while_stmt()?),
                TokenKind::If => stmts.push(self.if_stmt()?),
                TokenKind::Return => stmts.push(self.return_stmt()?),
                TokenKind::LBrace => stmts.push(Stmt::Block(self.scoped_block()?)),
                TokenKind::Async => {
                    self.advance()?;
                    let (body, _) = self.async_body(false)?;
                    stmts.push(Stmt::Async(body));
                }
                TokenKind::Dasync => {
                    self.advance()?;
                    let target = self.dasync_target()?;
                    let (body, _) = self.async_body(false)?;
                    stmts.push(Stmt::Dasync { target, body });
                }
                // Stray semicolons are harmless.
                TokenKind::Semicolon => self.advance()?,
                _ => break,
            }
        }
        Ok(stmts)
    }

    /// `var a, b type = init, init;`: declares every name in the current
    /// record, then assigns initializers positionally.
    fn declaration(&mut self) -> Result<Vec<Stmt>, CompileError> {
        self.advance()?;
        let line = self.line();
        let mut names = Vec::new();
        loop {
            names.push(self.expect_identifier()?);
            if self.token.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        let ty = self.parse_type()?;
        for name in &names {
            self.scopes
                .declare(Identifier::new(Rc::clone(name), ty.clone(), false), line)?;
        }
        let mut stmts: Vec<Stmt> = names
            .iter()
            .map(|name| Stmt::Declaration {
                name: Rc::clone(name),
                ty: ty.clone(),
                init: None,
            })
            .collect();
        if self.token.kind == TokenKind::Assign {
            self.advance()?;
            let mut i = 0;
            loop {
                if i == names.len() {
                    return Err(self.err(SyntaxError::TooManyInitializers));
                }
                let init = self.initializer(&names[i], &ty)?;
                if let Stmt::Declaration { init: slot, .. } = &mut stmts[i] {
                    *slot = Some(init);
                }
                i += 1;
                if self.token.kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::Semicolon)?;
        Ok(stmts)
    }

    /// One initializer of a declaration: a closure, async, or dasync
    /// literal, or a plain expression checked relaxed against the declared
    /// type.
    fn initializer(&mut self, name: &Rc<str>, declared: &Type) -> Result<Expr, CompileError> {
        let line = self.line();
        match self.token.kind {
            TokenKind::Fun => {
                let (closure, sig) = self.closure(Some(declared), false)?;
                self.scopes.push_binding(Rc::clone(name), sig.clone());
                self.mark_initialized(name);
                Ok(Expr {
                    kind: ExprKind::Closure(Box::new(closure)),
                    ty: Type::Function(sig),
                })
            }
            TokenKind::Async => {
                self.advance()?;
                let (body, result) = self.async_body(true)?;
                let result = result.unwrap_or(Type::Void);
                check_relaxed(declared, &result, line)?;
                self.mark_initialized(name);
                self.mark_pending(name);
                Ok(Expr {
                    kind: ExprKind::Async(body),
                    ty: result,
                })
            }
            TokenKind::Dasync => {
                self.advance()?;
                let target = self.dasync_target()?;
                let (body, result) = self.async_body(true)?;
                let result = result.unwrap_or(Type::Void);
                check_relaxed(declared, &result, line)?;
                self.mark_initialized(name);
                self.mark_pending(name);
                Ok(Expr {
                    kind: ExprKind::Dasync { target, body },
                    ty: result,
                })
            }
            _ => {
                let expr = self.expr()?;
                check_relaxed(declared, &expr.ty, line)?;
                if let (Type::Function(_), Type::Function(sig)) = (declared, &expr.ty) {
                    // Calls and identifiers of function type rebind the
                    // declared name as a callable.
                    self.scopes.push_binding(Rc::clone(name), sig.clone());
                }
                self.mark_initialized(name);
                Ok(expr)
            }
        }
    }

    /// An assignment statement, after its target identifier has been
    /// consumed; the current token is the operator.
    fn assignment(&mut self, name: Rc<str>) -> Result<Stmt, CompileError> {
        use TokenKind::*;
        let line = self.line();
        match self.token.kind {
            Incr | Decr => {
                let op = if self.token.kind == Incr {
                    AssignOp::Incr
                } else {
                    AssignOp::Decr
                };
                self.advance()?;
                let wait = self.touch_numeric_target(&name, line, false)?;
                Ok(Stmt::Assignment {
                    target: name,
                    op,
                    value: None,
                    wait,
                })
            }
            PlusAssign | MinusAssign | StarAssign | SlashAssign => {
                let op = match self.token.kind {
                    PlusAssign => AssignOp::Add,
                    MinusAssign => AssignOp::Sub,
                    StarAssign => AssignOp::Mul,
                    _ => AssignOp::Div,
                };
                self.advance()?;
                let wait = self.touch_numeric_target(&name, line, true)?;
                let value = self.expr()?;
                if !value.ty.is_numeric() {
                    return Err(CompileError::new(
                        line,
                        TypeError::NumericExpression(value.ty.to_string()),
                    ));
                }
                Ok(Stmt::Assignment {
                    target: name,
                    op,
                    value: Some(value),
                    wait,
                })
            }
            Assign => {
                self.advance()?;
                self.assign_rhs(name, line)
            }
            _ => Err(self.err(SyntaxError::UnexpectedToken(self.token.kind.to_string()))),
        }
    }

    /// The right-hand side of a plain `=` assignment.
    fn assign_rhs(&mut self, name: Rc<str>, line: u32) -> Result<Stmt, CompileError> {
        let boundary = self.side_effect_boundary();
        let deferred = self.inside_async || self.inside_closure;
        let position = self.scopes.top();
        let Some(id) = self
            .scopes
            .lookup_identifier(&name, true, boundary, line)?
        else {
            return Err(CompileError::new(
                line,
                ScopeError::UndeclaredVariable(name.to_string()),
            ));
        };
        let target_ty = id.ty.clone();
        id.mark_modified(deferred, position);

        let value = match self.token.kind {
            TokenKind::Fun => {
                let (closure, sig) = self.closure(Some(&target_ty), false)?;
                self.scopes.push_binding(Rc::clone(&name), sig.clone());
                Expr {
                    kind: ExprKind::Closure(Box::new(closure)),
                    ty: Type::Function(sig),
                }
            }
            TokenKind::Async => {
                self.advance()?;
                let (body, result) = self.async_body(true)?;
                let result = result.unwrap_or(Type::Void);
                check_strict(&target_ty, &result, line)?;
                self.mark_pending(&name);
                Expr {
                    kind: ExprKind::Async(body),
                    ty: result,
                }
            }
            TokenKind::Dasync => {
                self.advance()?;
                let target = self.dasync_target()?;
                let (body, result) = self.async_body(true)?;
                let result = result.unwrap_or(Type::Void);
                check_strict(&target_ty, &result, line)?;
                self.mark_pending(&name);
                Expr {
                    kind: ExprKind::Dasync { target, body },
                    ty: result,
                }
            }
            _ => {
                let value = self.expr()?;
                check_strict(&target_ty, &value.ty, line)?;
                if let (Type::Function(_), Type::Function(sig)) = (&target_ty, &value.ty) {
                    self.scopes.push_binding(Rc::clone(&name), sig.clone());
                }
                value
            }
        };
        Ok(Stmt::Assignment {
            target: name,
            op: AssignOp::Assign,
            value: Some(value),
            wait: false,
        })
    }

    /// Validates the target of `++`, `--`, and the compound assignments:
    /// declared, numeric, already usable. The compound forms (`mark`) also
    /// record the modification; `++`/`--` do not. Consumes a pending async
    /// result, returning the wait flag.
    fn touch_numeric_target(
        &mut self,
        name: &str,
        line: u32,
        mark: bool,
    ) -> Result<bool, CompileError> {
        let boundary = self.side_effect_boundary();
        let deferred = self.inside_async || self.inside_closure;
        let position = self.scopes.top();
        let inside_async = self.inside_async;
        let Some(id) = self.scopes.lookup_identifier(name, true, boundary, line)? else {
            return Err(CompileError::new(
                line,
                ScopeError::UndeclaredVariable(name.to_string()),
            ));
        };
        if !id.ty.is_numeric() {
            return Err(CompileError::new(
                line,
                TypeError::NumberRequired(name.to_string()),
            ));
        }
        if !id.has_value(position) {
            return Err(CompileError::new(
                line,
                ScopeError::UsedUninitialized(name.to_string()),
            ));
        }
        if mark {
            id.mark_modified(deferred, position);
        }
        let wait = id.pending && !inside_async;
        if wait {
            id.pending = false;
        }
        Ok(wait)
    }

    fn for_stmt(&mut self) -> Result<Stmt, CompileError> {
        self.advance()?;
        let init = self.opt_assignment()?.map(Box::new);
        self.expect(&TokenKind::Semicolon)?;
        let cond = if self.token.kind == TokenKind::Semicolon {
            None
        } else {
            let line = self.line();
            let cond = self.expr()?;
            if cond.ty != Type::Bool {
                return Err(CompileError::new(line, TypeError::BoolGuard("for")));
            }
            Some(cond)
        };
        self.expect(&TokenKind::Semicolon)?;
        let step = self.opt_assignment()?.map(Box::new);
        let body = self.scoped_block()?;
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
        })
    }

    fn opt_assignment(&mut self) -> Result<Option<Stmt>, CompileError> {
        if let TokenKind::Identifier(n) = &self.token.kind {
            let name: Rc<str> = n.as_str().into();
            self.advance()?;
            Ok(Some(self.assignment(name)?))
        } else {
            Ok(None)
        }
    }

    fn while_stmt(&mut self) -> Result<Stmt, CompileError> {
        self.advance()?;
        let line = self.line();
        let cond = self.expr()?;
        if cond.ty != Type::Bool {
            return Err(CompileError::new(line, TypeError::BoolGuard("while")));
        }
        let body = self.scoped_block()?;
        Ok(Stmt::While { cond, body })
    }

    fn if_stmt(&mut self) -> Result<Stmt, CompileError> {
        self.advance()?;
        let line = self.line();
        let cond = self.expr()?;
        if cond.ty != Type::Bool {
            return Err(CompileError::new(line, TypeError::BoolGuard("if")));
        }
        let then_body = self.scoped_block()?;
        let else_body = if self.token.kind == TokenKind::Else {
            self.advance()?;
            Some(self.scoped_block()?)
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn return_stmt(&mut self) -> Result<Stmt, CompileError> {
        self.advance()?;
        let line = self.line();
        // Inside an async body (but not inside a nested closure) the value
        // is checked later, against the assignment target.
        let checks_fn_type = self.inside_closure || !self.inside_async;
        let value = if self.token.kind == TokenKind::Semicolon {
            if checks_fn_type && self.ret_ty != Type::Void {
                return Err(CompileError::new(
                    line,
                    TypeError::ReturnMismatch {
                        expected: self.ret_ty.to_string(),
                        found: Type::Void.to_string(),
                    },
                ));
            }
            None
        } else if self.token.kind == TokenKind::Fun {
            let (closure, sig) = self.closure(None, checks_fn_type)?;
            Some(Expr {
                kind: ExprKind::Closure(Box::new(closure)),
                ty: Type::Function(sig),
            })
        } else {
            let value = self.expr()?;
            if checks_fn_type {
                let matches = if matches!(value.ty, Type::Function(_)) {
                    self.ret_ty.strict_eq(&value.ty)
                } else {
                    self.ret_ty.relaxed_eq(&value.ty)
                };
                if !matches {
                    return Err(CompileError::new(
                        line,
                        TypeError::ReturnMismatch {
                            expected: self.ret_ty.to_string(),
                            found: value.ty.to_string(),
                        },
                    ));
                }
            }
            Some(value)
        };
        self.expect(&TokenKind::Semicolon)?;
        if self.inside_closure {
            self.closure_return = true;
        } else if self.inside_async {
            self.async_return = true;
            self.async_result = Some(value.as_ref().map_or(Type::Void, |e| e.ty.clone()));
        }
        self.saw_return = true;
        Ok(Stmt::Return(value))
    }

    // ==== async / dasync ====

    /// `( target )` of a dasync header: a declared, usable, url-typed
    /// identifier.
    fn dasync_target(&mut self) -> Result<Rc<str>, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let line = self.line();
        let name = self.expect_identifier()?;
        let position = self.scopes.top();
        let Some(id) = self.scopes.lookup_identifier(&name, true, None, line)? else {
            return Err(CompileError::new(
                line,
                ScopeError::UndeclaredVariable(name.to_string()),
            ));
        };
        if id.ty != Type::Url {
            return Err(CompileError::new(
                line,
                AsyncError::NonUrlTarget {
                    name: name.to_string(),
                    found: id.ty.to_string(),
                },
            ));
        }
        if !id.has_value(position) {
            return Err(CompileError::new(
                line,
                AsyncError::UninitializedTarget(name.to_string()),
            ));
        }
        self.expect(&TokenKind::RParen)?;
        Ok(name)
    }

    /// The `{ ... }` body of an async or dasync block. Statement form
    /// (`require_return` false) must not return; assignment form must.
    /// Returns the body and the type of the returned value, if any.
    fn async_body(
        &mut self,
        require_return: bool,
    ) -> Result<(Block, Option<Type>), CompileError> {
        let line = self.line();
        let saved = (
            self.inside_async,
            self.async_index,
            self.async_return,
            self.async_result.take(),
            self.inside_closure,
            self.saw_return,
        );
        self.inside_async = true;
        self.async_index = self.scopes.top();
        self.async_return = false;
        self.inside_closure = false;

        let body = self.scoped_block()?;

        let returned = self.async_return;
        let result = self.async_result.take();
        (
            self.inside_async,
            self.async_index,
            self.async_return,
            self.async_result,
            self.inside_closure,
            self.saw_return,
        ) = saved;
        if require_return && !returned {
            return Err(CompileError::new(line, AsyncError::MissingReturn));
        }
        if !require_return && returned {
            return Err(CompileError::new(line, AsyncError::ReturnNotAllowed));
        }
        Ok((body, result))
    }

    fn side_effect_boundary(&self) -> Option<usize> {
        self.inside_async.then_some(self.async_index)
    }

    // ==== closures ====

    /// A `fun(params) type { ... }` literal. `bound` carries the declared
    /// type of the identifier it initializes, checked structurally;
    /// `check_ret`, for return-position literals, checks it against the
    /// enclosing declared return type instead.
    fn closure(
        &mut self,
        bound: Option<&Type>,
        check_ret: bool,
    ) -> Result<(Closure, FunctionType), CompileError> {
        let line = self.line();
        self.advance()?;
        self.expect(&TokenKind::LParen)?;
        let params = self.param_list(true)?;
        self.expect(&TokenKind::RParen)?;
        let ret = self.opt_type()?;
        let sig = FunctionType::new(params.iter().map(|p| p.ty.clone()).collect(), ret.clone());

        if let Some(declared) = bound {
            let actual = Type::Function(sig.clone());
            if !declared.strict_eq(&actual) {
                return Err(CompileError::new(
                    line,
                    TypeError::Mismatch {
                        from: actual.to_string(),
                        to: declared.to_string(),
                    },
                ));
            }
        }
        if check_ret {
            let actual = Type::Function(sig.clone());
            if !self.ret_ty.strict_eq(&actual) {
                return Err(CompileError::new(
                    line,
                    TypeError::ReturnMismatch {
                        expected: self.ret_ty.to_string(),
                        found: actual.to_string(),
                    },
                ));
            }
        }

        let saved = (
            mem::replace(&mut self.ret_ty, ret.clone()),
            self.saw_return,
            self.inside_closure,
            self.closure_return,
        );
        self.inside_closure = true;
        self.closure_return = false;

        self.scopes.push_frame(Record::function("", sig.clone()));
        for param in &params {
            self.scopes.declare(
                Identifier::new(Rc::clone(&param.name), param.ty.clone(), true),
                line,
            )?;
        }
        self.flush_deferred_params();
        let body = self.block_body()?;
        self.scopes.close_block(false);

        let returned = self.closure_return;
        (
            self.ret_ty,
            self.saw_return,
            self.inside_closure,
            self.closure_return,
        ) = saved;
        if ret == Type::Void && returned {
            return Err(self.err(AsyncError::ClosureReturnForbidden));
        }
        if ret != Type::Void && !returned {
            return Err(self.err(AsyncError::ClosureReturnRequired));
        }
        Ok((Closure { params, ret, body }, sig))
    }

    // ==== calls ====

    /// A (possibly curried) call, after the callee name; the current token
    /// is the opening parenthesis.
    fn call(&mut self, name: Rc<str>) -> Result<Call, CompileError> {
        let line = self.line();
        let args = self.call_args()?;
        let arg_types: Vec<Type> = args.iter().map(|a| a.ty.clone()).collect();
        let Some(sig) = self.scopes.lookup_function(&name, &arg_types) else {
            return Err(CompileError::new(
                line,
                ScopeError::UndeclaredFunction(render_call(&name, &arg_types)),
            ));
        };
        let mut ty = (*sig.ret).clone();
        let mut chained = Vec::new();
        let mut nth = 1;
        while self.token.kind == TokenKind::LParen {
            nth += 1;
            let line = self.line();
            let Type::Function(next) = ty else {
                return Err(CompileError::new(line, TypeError::NotAFunction(nth)));
            };
            let more = self.call_args()?;
            let more_types: Vec<Type> = more.iter().map(|a| a.ty.clone()).collect();
            check_call_args(&next, &more_types, line)?;
            ty = (*next.ret).clone();
            chained.push(more);
        }
        Ok(Call {
            name,
            args,
            chained,
            ty,
        })
    }

    fn call_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if self.token.kind != TokenKind::RParen {
            loop {
                if self.token.kind == TokenKind::Fun {
                    let (closure, sig) = self.closure(None, false)?;
                    args.push(Expr {
                        kind: ExprKind::Closure(Box::new(closure)),
                        ty: Type::Function(sig),
                    });
                } else {
                    args.push(self.expr()?);
                }
                if self.token.kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    // ==== expressions ====

    /// Equality and logical tier, right-associative.
    fn expr(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.relational()?;
        let op = match self.token.kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::AndAnd => BinaryOp::And,
            TokenKind::OrOr => BinaryOp::Or,
            _ => return Ok(lhs),
        };
        let line = self.line();
        self.advance()?;
        let rhs = self.expr()?;
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let comparable = (lhs.ty.is_numeric() && rhs.ty.is_numeric())
                    || lhs.ty.relaxed_eq(&rhs.ty)
                    || rhs.ty.relaxed_eq(&lhs.ty);
                if !comparable {
                    return Err(CompileError::new(
                        line,
                        TypeError::ComparableOperands {
                            lhs: lhs.ty.to_string(),
                            rhs: rhs.ty.to_string(),
                        },
                    ));
                }
            }
            _ => {
                for side in [&lhs, &rhs] {
                    if side.ty != Type::Bool {
                        return Err(CompileError::new(
                            line,
                            TypeError::BoolOperand(side.ty.to_string()),
                        ));
                    }
                }
            }
        }
        Ok(Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty: Type::Bool,
        })
    }

    /// Relational tier: non-associative, at most one comparison per level.
    fn relational(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.arith()?;
        let op = match self.token.kind {
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEq => BinaryOp::LessEq,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEq => BinaryOp::GreaterEq,
            _ => return Ok(lhs),
        };
        let line = self.line();
        self.advance()?;
        let rhs = self.arith()?;
        let comparable = (lhs.ty.is_numeric() && rhs.ty.is_numeric())
            || (lhs.ty == Type::Char && rhs.ty == Type::Char);
        if !comparable {
            return Err(CompileError::new(
                line,
                TypeError::ComparableOperands {
                    lhs: lhs.ty.to_string(),
                    rhs: rhs.ty.to_string(),
                },
            ));
        }
        Ok(Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty: Type::Bool,
        })
    }

    /// Single arithmetic tier, left-associative; also folds the
    /// expression-level compound assignments and `++`/`--`. The result of
    /// an arithmetic chain is always int-tagged.
    fn arith(&mut self) -> Result<Expr, CompileError> {
        use TokenKind::*;
        let mut lhs = self.unary()?;
        loop {
            let line = self.line();
            match self.token.kind {
                Incr | Decr => {
                    let op = if self.token.kind == Incr {
                        UnaryOp::Incr
                    } else {
                        UnaryOp::Decr
                    };
                    self.advance()?;
                    if !lhs.ty.is_numeric() {
                        return Err(CompileError::new(
                            line,
                            TypeError::NumericExpression(lhs.ty.to_string()),
                        ));
                    }
                    let ty = lhs.ty.clone();
                    lhs = Expr {
                        kind: ExprKind::Unary {
                            op,
                            operand: Box::new(lhs),
                        },
                        ty,
                    };
                }
                Plus | Minus | Star | Slash | PlusAssign | MinusAssign | StarAssign
                | SlashAssign => {
                    let op = match self.token.kind {
                        Plus => BinaryOp::Add,
                        Minus => BinaryOp::Sub,
                        Star => BinaryOp::Mul,
                        Slash => BinaryOp::Div,
                        PlusAssign => BinaryOp::AddAssign,
                        MinusAssign => BinaryOp::SubAssign,
                        StarAssign => BinaryOp::MulAssign,
                        _ => BinaryOp::DivAssign,
                    };
                    let compound = matches!(
                        op,
                        BinaryOp::AddAssign
                            | BinaryOp::SubAssign
                            | BinaryOp::MulAssign
                            | BinaryOp::DivAssign
                    );
                    if compound && !matches!(lhs.kind, ExprKind::Ident { .. }) {
                        return Err(CompileError::new(line, SyntaxError::InvalidAssignTarget));
                    }
                    self.advance()?;
                    let rhs = self.unary()?;
                    if !lhs.ty.is_numeric() || !rhs.ty.is_numeric() {
                        return Err(CompileError::new(
                            line,
                            TypeError::NumericOperands {
                                lhs: lhs.ty.to_string(),
                                rhs: rhs.ty.to_string(),
                            },
                        ));
                    }
                    lhs = Expr {
                        kind: ExprKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        ty: Type::Int,
                    };
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.token.kind {
            TokenKind::Plus => UnaryOp::Pos,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.primary(),
        };
        let line = self.line();
        self.advance()?;
        let operand = self.primary()?;
        let ty = if op == UnaryOp::Not {
            if operand.ty != Type::Bool {
                return Err(CompileError::new(
                    line,
                    TypeError::BoolOperand(operand.ty.to_string()),
                ));
            }
            Type::Bool
        } else {
            if !operand.ty.is_numeric() {
                return Err(CompileError::new(
                    line,
                    TypeError::NumericExpression(operand.ty.to_string()),
                ));
            }
            operand.ty.clone()
        };
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
        })
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let line = self.line();
        let lit = |kind, ty| Ok(Expr { kind, ty });
        match self.token.kind.clone() {
            TokenKind::IntLit(v) => {
                self.advance()?;
                lit(ExprKind::Int(v), Type::Int)
            }
            TokenKind::FloatLit(v) => {
                self.advance()?;
                lit(ExprKind::Float(v), Type::Float)
            }
            TokenKind::DoubleLit(v) => {
                self.advance()?;
                lit(ExprKind::Double(v), Type::Double)
            }
            TokenKind::CharLit(c) => {
                self.advance()?;
                lit(ExprKind::Char(c), Type::Char)
            }
            TokenKind::StrLit(s) => {
                self.advance()?;
                lit(ExprKind::Str(s), Type::Str)
            }
            TokenKind::True => {
                self.advance()?;
                lit(ExprKind::Bool(true), Type::Bool)
            }
            TokenKind::False => {
                self.advance()?;
                lit(ExprKind::Bool(false), Type::Bool)
            }
            TokenKind::Identifier(name) => {
                let name: Rc<str> = name.into();
                self.advance()?;
                if self.token.kind == TokenKind::LParen {
                    let call = self.call(name)?;
                    let ty = call.ty.clone();
                    Ok(Expr {
                        kind: ExprKind::Call(call),
                        ty,
                    })
                } else {
                    let position = self.scopes.top();
                    let inside_async = self.inside_async;
                    let Some(id) = self.scopes.lookup_identifier(&name, true, None, line)?
                    else {
                        return Err(CompileError::new(
                            line,
                            ScopeError::UndeclaredVariable(name.to_string()),
                        ));
                    };
                    if !id.has_value(position) {
                        return Err(CompileError::new(
                            line,
                            ScopeError::UsedUninitialized(name.to_string()),
                        ));
                    }
                    // The first read outside an async context consumes a
                    // pending result and waits for it.
                    let wait = id.pending && !inside_async;
                    if wait {
                        id.pending = false;
                    }
                    let ty = id.ty.clone();
                    Ok(Expr {
                        kind: ExprKind::Ident { name, wait },
                        ty,
                    })
                }
            }
            TokenKind::LParen => {
                self.advance()?;
                if self.token.kind == TokenKind::Fun || type_keyword(&self.token.kind).is_some()
                {
                    let target = self.parse_type()?;
                    self.expect(&TokenKind::RParen)?;
                    let operand = self.primary()?;
                    if !operand.ty.relaxed_eq(&target) {
                        return Err(CompileError::new(
                            line,
                            TypeError::InvalidCast {
                                from: operand.ty.to_string(),
                                to: target.to_string(),
                            },
                        ));
                    }
                    Ok(Expr {
                        kind: ExprKind::Cast(Box::new(operand)),
                        ty: target,
                    })
                } else {
                    let expr = self.expr()?;
                    self.expect(&TokenKind::RParen)?;
                    Ok(expr)
                }
            }
            other => Err(CompileError::new(
                line,
                SyntaxError::ExpectedExpression(other.to_string()),
            )),
        }
    }

    // ==== types ====

    fn opt_type(&mut self) -> Result<Type, CompileError> {
        if self.token.kind == TokenKind::Fun {
            return self.fun_type();
        }
        match type_keyword(&self.token.kind) {
            Some(ty) => {
                self.advance()?;
                Ok(ty)
            }
            None => Ok(Type::Void),
        }
    }

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        if self.token.kind == TokenKind::Fun {
            return self.fun_type();
        }
        match type_keyword(&self.token.kind) {
            Some(ty) => {
                self.advance()?;
                Ok(ty)
            }
            None => Err(self.err(SyntaxError::ExpectedType(self.token.kind.to_string()))),
        }
    }

    /// The written form of a function type, `fun( type, ... ) type?`.
    fn fun_type(&mut self) -> Result<Type, CompileError> {
        self.advance()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.token.kind != TokenKind::RParen {
            loop {
                params.push(self.parse_type()?);
                if self.token.kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let ret = self.opt_type()?;
        Ok(Type::Function(FunctionType::new(params, ret)))
    }

    // ==== plumbing ====

    fn line(&self) -> u32 {
        self.token.line
    }

    fn err(&self, kind: impl Into<ErrorKind>) -> CompileError {
        CompileError::new(self.token.line, kind)
    }

    fn advance(&mut self) -> Result<(), CompileError> {
        self.token = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), CompileError> {
        if self.token.kind == *kind {
            self.advance()
        } else {
            Err(self.err(SyntaxError::ExpectedToken {
                expected: kind.to_string(),
                found: self.token.kind.to_string(),
            }))
        }
    }

    fn expect_identifier(&mut self) -> Result<Rc<str>, CompileError> {
        if let TokenKind::Identifier(name) = &self.token.kind {
            let name: Rc<str> = name.as_str().into();
            self.advance()?;
            Ok(name)
        } else {
            Err(self.err(SyntaxError::ExpectedIdentifier(self.token.kind.to_string())))
        }
    }

    fn mark_initialized(&mut self, name: &str) {
        if let Some(id) = self.scopes.identifier_mut(name) {
            id.mark_initialized();
        }
    }

    fn mark_pending(&mut self, name: &str) {
        if let Some(id) = self.scopes.identifier_mut(name) {
            id.pending = true;
        }
    }
}

fn check_relaxed(to: &Type, from: &Type, line: u32) -> Result<(), CompileError> {
    if to.relaxed_eq(from) {
        Ok(())
    } else {
        Err(CompileError::new(
            line,
            TypeError::Mismatch {
                from: from.to_string(),
                to: to.to_string(),
            },
        ))
    }
}

fn check_strict(to: &Type, from: &Type, line: u32) -> Result<(), CompileError> {
    if to.strict_eq(from) {
        Ok(())
    } else {
        Err(CompileError::new(
            line,
            TypeError::Mismatch {
                from: from.to_string(),
                to: to.to_string(),
            },
        ))
    }
}

fn type_keyword(kind: &TokenKind) -> Option<Type> {
    match kind {
        TokenKind::Int => Some(Type::Int),
        TokenKind::Float => Some(Type::Float),
        TokenKind::Double => Some(Type::Double),
        TokenKind::Bool => Some(Type::Bool),
        TokenKind::Char => Some(Type::Char),
        TokenKind::Str => Some(Type::Str),
        TokenKind::Url => Some(Type::Url),
        TokenKind::Void => Some(Type::Void),
        _ => None,
    }
}

fn check_call_args(sig: &FunctionType, args: &[Type], line: u32) -> Result<(), CompileError> {
    if sig.params.len() != args.len() {
        return Err(CompileError::new(line, TypeError::ArityMismatch));
    }
    for (param, arg) in sig.params.iter().zip(args) {
        if !param.relaxed_eq(arg) {
            return Err(CompileError::new(
                line,
                TypeError::Mismatch {
                    from: arg.to_string(),
                    to: param.to_string(),
                },
            ));
        }
    }
    Ok(())
}

/// Renders a call or signature shape for error messages, e.g. `half( int )`.
fn render_call(name: &str, args: &[Type]) -> String {
    if args.is_empty() {
        return format!("{name}()");
    }
    let list = args
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("{name}( {list} )")
}
