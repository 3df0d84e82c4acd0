//! Recursive-descent parser: `Vec<Token>` → [`Node`] (§4.3, §4.4).
//!
//! Precedence climbs bottom-up through a fixed ladder of methods, the
//! usual recursive-descent shape; each level only recurses into the level
//! below it (§4.3's precedence table, highest binding at the bottom).

use std::rc::Rc;

use crate::ast::{DictKey, Node, NodeKind, ParamDecl, SwitchCase};
use crate::error::{RResult, RuntimeError};
use crate::intern::{hash, NameId};
use crate::kind;
use crate::lexer::Lexer;
use crate::number::Number;
use crate::scope::ScopeKind;
use crate::signature::ParamType;
use crate::token::{Token, TokenKind};
use crate::value::Value;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Lexes and parses a full program into one top-level [`Node`] (a
/// `Sequence` of statements, §4.5) without folding — callers fold
/// separately so tests can inspect either stage.
pub fn parse_source(filename: &str, source: &str) -> RResult<Node> {
    let tokens = Lexer::new(filename, source).lex()?;
    Parser::new(tokens).parse_program()
}

impl Parser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().kind == *kind
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Operator(o) if o == op)
    }

    /// Consumes a leading `<` or `>` off the current token, splitting a
    /// merged multi-char operator (`<<`, `<=`, `<>`, `>>`, ...) if the
    /// lexer happened to glue it to what follows — the usual
    /// recursive-descent trick for telling a type qualifier list's angle
    /// brackets apart from shift/comparison operators (e.g.
    /// `Function<Array<Number>>>` must not read as a `>>` shift).
    fn consume_angle(&mut self, ch: char) -> bool {
        let op = match &self.peek().kind {
            TokenKind::Operator(op) if op.starts_with(ch) => op.clone(),
            _ => return false,
        };
        let rest = op[ch.len_utf8()..].to_string();
        let mut tok = self.advance();
        if !rest.is_empty() {
            tok.literal = rest.clone();
            tok.kind = TokenKind::Operator(rest);
            self.tokens.insert(self.pos, tok);
        }
        true
    }

    fn match_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> RResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(RuntimeError::new(format!("expected {what}"), self.peek().clone()))
        }
    }

    fn expect_identifier(&mut self) -> RResult<(NameId, Token)> {
        let token = self.peek().clone();
        if token.kind == TokenKind::Identifier {
            self.advance();
            Ok((hash(&token.literal), token))
        } else {
            Err(RuntimeError::new("expected an identifier", token))
        }
    }

    // ---- program / statements ----------------------------------------

    pub fn parse_program(&mut self) -> RResult<Node> {
        let start = self.peek().clone();
        let mut stmts = Vec::new();
        while !self.at_eof() {
            stmts.push(self.statement()?);
        }
        Ok(Node::new(start, NodeKind::Sequence(stmts)))
    }

    fn block(&mut self) -> RResult<Node> {
        let start = self.expect(&TokenKind::LBrace, "`{`")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.at_eof() {
            stmts.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace, "`}`")?;
        Ok(Node::new(start, NodeKind::Scope(stmts)))
    }

    /// A statement body that may be either a `{ ... }` block or a single
    /// statement (§4.3: control-flow bodies need not be braced).
    fn body(&mut self) -> RResult<Node> {
        if self.check(&TokenKind::LBrace) {
            self.block()
        } else {
            let stmt = self.statement()?;
            Ok(Node::new(stmt.token.clone(), NodeKind::Scope(vec![stmt])))
        }
    }

    fn statement(&mut self) -> RResult<Node> {
        match self.peek_kind().clone() {
            TokenKind::LBrace => self.block(),
            TokenKind::Var | TokenKind::Const => self.var_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For | TokenKind::Each => self.for_statement(),
            TokenKind::Def => self.def_statement(),
            TokenKind::Return => self.simple_keyword_expr(NodeKind::Return),
            TokenKind::Refer => self.simple_keyword_expr(NodeKind::Refer),
            TokenKind::Break => {
                let t = self.advance();
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(Node::new(t, NodeKind::Break))
            }
            TokenKind::Continue => {
                let t = self.advance();
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(Node::new(t, NodeKind::Continue))
            }
            TokenKind::Throw => {
                let t = self.advance();
                let e = self.expression()?;
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(Node::new(t, NodeKind::Throw(Box::new(e))))
            }
            TokenKind::Try => self.try_statement(),
            TokenKind::Switch => self.switch_statement(),
            TokenKind::Struct | TokenKind::Static | TokenKind::Virtual => self.class_statement(),
            TokenKind::Load => {
                let t = self.advance();
                let path_tok = self.expect(&TokenKind::String, "a module path string")?;
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(Node::new(t, NodeKind::Load(path_tok.literal)))
            }
            TokenKind::Extern => self.extern_statement(),
            _ => {
                let e = self.expression()?;
                self.expect(&TokenKind::Semicolon, "`;`")?;
                Ok(e)
            }
        }
    }

    fn simple_keyword_expr(&mut self, ctor: fn(Box<Node>) -> NodeKind) -> RResult<Node> {
        let t = self.advance();
        let value = if self.check(&TokenKind::Semicolon) {
            Node::new(t.clone(), NodeKind::Container(Value::Nil))
        } else {
            self.expression()?
        };
        self.expect(&TokenKind::Semicolon, "`;`")?;
        Ok(Node::new(t, ctor(Box::new(value))))
    }

    fn var_statement(&mut self) -> RResult<Node> {
        let is_const_kw = matches!(self.peek().kind, TokenKind::Const);
        let t = self.advance();
        let mut names_only = Vec::new();
        let mut decls = Vec::new();
        loop {
            let (name, _) = self.expect_identifier()?;
            let ty = if self.matches(&TokenKind::Colon) { Some(self.parse_type()?) } else { None };
            let assign_is_const = self.is_op(":=");
            if self.match_op("=") || self.match_op(":=") {
                let is_const = is_const_kw || assign_is_const;
                let init = self.ternary()?;
                decls.push(Node::new(
                    t.clone(),
                    NodeKind::Declare { name, ty, init: Box::new(init), is_const },
                ));
            } else {
                names_only.push(name);
            }
            if !self.matches(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::Semicolon, "`;`")?;
        if decls.is_empty() {
            return Ok(Node::new(t, NodeKind::DeclareVars(names_only)));
        }
        if names_only.is_empty() && decls.len() == 1 {
            return Ok(decls.into_iter().next().unwrap());
        }
        let mut all = names_only.is_empty().then(Vec::new).unwrap_or_else(|| {
            vec![Node::new(t.clone(), NodeKind::DeclareVars(names_only.clone()))]
        });
        all.extend(decls);
        Ok(Node::new(t, NodeKind::Sequence(all)))
    }

    fn if_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        self.if_tail(t)
    }

    /// Shared by `if` and `elif`: both start with a parenthesized
    /// condition and a body, and an `elif` chains into another tail
    /// rather than requiring a fresh `if` keyword (§4.3).
    fn if_tail(&mut self, t: Token) -> RResult<Node> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RParen, "`)`")?;
        let body = self.body()?;
        let or_else = if self.check(&TokenKind::Elif) {
            let elif_t = self.advance();
            Some(Box::new(self.if_tail(elif_t)?))
        } else if self.matches(&TokenKind::Else) {
            Some(Box::new(self.body()?))
        } else {
            None
        };
        Ok(Node::new(t, NodeKind::IfElse { cond: Box::new(cond), body: Box::new(body), or_else }))
    }

    fn while_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        self.expect(&TokenKind::LParen, "`(`")?;
        let cond = self.expression()?;
        self.expect(&TokenKind::RParen, "`)`")?;
        let body = self.body()?;
        Ok(Node::new(t, NodeKind::While { cond: Box::new(cond), body: Box::new(body) }))
    }

    fn for_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        self.expect(&TokenKind::LParen, "`(`")?;
        let (var, _) = self.expect_identifier()?;
        self.expect(&TokenKind::In, "`in`")?;
        let iter = self.expression()?;
        self.expect(&TokenKind::RParen, "`)`")?;
        let body = self.body()?;
        Ok(Node::new(t, NodeKind::For { var, iter: Box::new(iter), body: Box::new(body) }))
    }

    fn def_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        let (name, _) = self.expect_identifier()?;
        let (params, is_vargs) = self.parse_params()?;
        let body = if self.matches(&TokenKind::Arrow) {
            let e = self.expression()?;
            self.expect(&TokenKind::Semicolon, "`;`")?;
            Node::new(t.clone(), NodeKind::Return(Box::new(e)))
        } else {
            self.block()?
        };
        Ok(Node::new(t, NodeKind::FuncDecl { name, params, is_vargs, body: Box::new(body) }))
    }

    /// `try { ... } catch id then { ... }` (§4.3).
    fn try_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        let body = self.block()?;
        self.expect(&TokenKind::Catch, "`catch`")?;
        let (catch_name, _) = self.expect_identifier()?;
        self.expect(&TokenKind::Then, "`then`")?;
        let catch_body = self.block()?;
        Ok(Node::new(
            t,
            NodeKind::TryCatch { body: Box::new(body), catch_name, catch_body: Box::new(catch_body) },
        ))
    }

    /// `switch expr of { case label: body ... } [else { body }]` (§4.3).
    fn switch_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        let disc = self.expression()?;
        self.expect(&TokenKind::Of, "`of`")?;
        self.expect(&TokenKind::LBrace, "`{`")?;
        let mut cases = Vec::new();
        let mut or_else = None;
        while !self.check(&TokenKind::RBrace) {
            if self.matches(&TokenKind::Case) {
                let label = self.expression()?;
                self.expect(&TokenKind::Colon, "`:`")?;
                let body = self.body()?;
                cases.push(SwitchCase { label, body });
            } else if self.matches(&TokenKind::Else) {
                self.expect(&TokenKind::Colon, "`:`")?;
                or_else = Some(Box::new(self.body()?));
            } else {
                return Err(RuntimeError::new("expected `case` or `else`", self.peek().clone()));
            }
        }
        self.expect(&TokenKind::RBrace, "`}`")?;
        Ok(Node::new(t, NodeKind::Switch { disc: Box::new(disc), cases, or_else }))
    }

    fn class_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        let kind = match t.kind {
            TokenKind::Struct => ScopeKind::Struct,
            TokenKind::Static => ScopeKind::Static,
            TokenKind::Virtual => ScopeKind::Virtual,
            _ => unreachable!(),
        };
        let (name, _) = self.expect_identifier()?;
        let extends = if self.matches(&TokenKind::Colon) {
            let (parent, parent_tok) = self.expect_identifier()?;
            Some(Box::new(Node::new(parent_tok, NodeKind::Variable(parent))))
        } else {
            None
        };
        let open = self.expect(&TokenKind::LBrace, "`{`")?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            body.push(self.statement()?);
        }
        self.expect(&TokenKind::RBrace, "`}`")?;
        let _ = open;
        Ok(Node::new(t, NodeKind::ClassDecl { name, kind, body, extends }))
    }

    /// `extern name in "lib";` (§4.4): declares `name` as a function that
    /// forwards whatever arguments it is called with to the `(lib, name)`
    /// host callback. Desugars to a single-arity varargs `FuncDecl` whose
    /// body spreads the bound argument Array into an `Extern` call —
    /// there is no separate call-site `extern` expression form.
    fn extern_statement(&mut self) -> RResult<Node> {
        let t = self.advance();
        let (name, name_tok) = self.expect_identifier()?;
        self.expect(&TokenKind::In, "`in`")?;
        let lib_tok = self.expect(&TokenKind::String, "a library name string")?;
        self.expect(&TokenKind::Semicolon, "`;`")?;
        let func_name = crate::intern::dehash(name);
        if !crate::extension::is_registered(&lib_tok.literal, &func_name) {
            return Err(RuntimeError::new(
                format!("extension function `{}${}` is not registered", lib_tok.literal, func_name),
                name_tok.clone(),
            ));
        }
        let rest = hash("__extern_args");
        let forward = Node::new(
            name_tok.clone(),
            NodeKind::Extern {
                lib: lib_tok.literal,
                func: func_name,
                args: vec![Node::new(name_tok.clone(), NodeKind::Variable(rest))],
                spread: true,
            },
        );
        let body = Node::new(t.clone(), NodeKind::Return(Box::new(forward)));
        Ok(Node::new(
            t,
            NodeKind::FuncDecl {
                name,
                params: vec![ParamDecl { name: rest, by_ref: false, param_type: ParamType::any() }],
                is_vargs: true,
                body: Box::new(body),
            },
        ))
    }

    // ---- expressions ---------------------------------------------------

    fn expression(&mut self) -> RResult<Node> {
        self.assignment()
    }

    fn assignment(&mut self) -> RResult<Node> {
        let target = self.ternary()?;
        const COMPOUND: &[&str] = &["+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "&&=", "||=", "<<=", ">>="];
        for op in COMPOUND {
            if self.is_op(op) {
                let t = self.advance();
                let rhs = self.assignment()?;
                let base_op = op.trim_end_matches('=').to_string();
                let combined =
                    Node::new(t.clone(), NodeKind::BinOp { op: base_op, lhs: Box::new(target.clone()), rhs: Box::new(rhs) });
                return Ok(Node::new(
                    t,
                    NodeKind::Set { target: Box::new(target), value: Box::new(combined), declare_const: false },
                ));
            }
        }
        if self.is_op("=") || self.is_op(":=") {
            let is_const = self.is_op(":=");
            let t = self.advance();
            let value = self.assignment()?;
            return Ok(Node::new(
                t,
                NodeKind::Set { target: Box::new(target), value: Box::new(value), declare_const: is_const },
            ));
        }
        Ok(target)
    }

    fn ternary(&mut self) -> RResult<Node> {
        let cond = self.delete_expr()?;
        if self.matches(&TokenKind::Question) {
            let then_branch = self.ternary()?;
            self.expect(&TokenKind::Colon, "`:`")?;
            let else_branch = self.ternary()?;
            let t = cond.token.clone();
            return Ok(Node::new(
                t,
                NodeKind::IfElse {
                    cond: Box::new(cond),
                    body: Box::new(then_branch),
                    or_else: Some(Box::new(else_branch)),
                },
            ));
        }
        Ok(cond)
    }

    /// `delete expr` (§4.3: precedence 1, between `||` and `=`) desugars
    /// to `expr = nil` — the real teardown runs through the binding's
    /// drop/`rem` machinery (§3.3), not through this node.
    fn delete_expr(&mut self) -> RResult<Node> {
        if self.check(&TokenKind::Delete) {
            let t = self.advance();
            let target = self.delete_expr()?;
            return Ok(Node::new(
                t.clone(),
                NodeKind::Set {
                    target: Box::new(target),
                    value: Box::new(Node::new(t, NodeKind::Container(Value::Nil))),
                    declare_const: false,
                },
            ));
        }
        self.logical_or()
    }

    fn binary_level(&mut self, ops: &[&str], next: fn(&mut Self) -> RResult<Node>) -> RResult<Node> {
        let mut lhs = next(self)?;
        loop {
            let mut matched = None;
            for op in ops {
                if self.is_op(op) {
                    matched = Some((*op).to_string());
                    break;
                }
            }
            let Some(op) = matched else { break };
            let t = self.advance();
            let rhs = next(self)?;
            lhs = Node::new(t, NodeKind::BinOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) });
        }
        Ok(lhs)
    }

    fn logical_or(&mut self) -> RResult<Node> {
        self.binary_level(&["||"], Self::logical_and)
    }
    fn logical_and(&mut self) -> RResult<Node> {
        self.binary_level(&["&&"], Self::bitwise_or)
    }
    fn bitwise_or(&mut self) -> RResult<Node> {
        self.binary_level(&["|"], Self::bitwise_xor)
    }
    fn bitwise_xor(&mut self) -> RResult<Node> {
        self.binary_level(&["^"], Self::bitwise_and)
    }
    fn bitwise_and(&mut self) -> RResult<Node> {
        self.binary_level(&["&"], Self::equality)
    }
    fn equality(&mut self) -> RResult<Node> {
        self.binary_level(&["===", "!==", "==", "!="], Self::relational)
    }
    fn relational(&mut self) -> RResult<Node> {
        self.binary_level(&["<=", ">=", "<", ">"], Self::range)
    }

    fn range(&mut self) -> RResult<Node> {
        let from = self.shift()?;
        if self.is_op("..") || self.is_op("<>") {
            let t = self.advance();
            let inclusive = t.literal == "<>";
            let to = self.shift()?;
            let step = if self.matches(&TokenKind::Colon) { Some(Box::new(self.shift()?)) } else { None };
            return Ok(Node::new(
                t,
                NodeKind::Until { from: Box::new(from), to: Box::new(to), step, inclusive },
            ));
        }
        Ok(from)
    }

    fn shift(&mut self) -> RResult<Node> {
        self.binary_level(&["<<", ">>"], Self::additive)
    }
    fn additive(&mut self) -> RResult<Node> {
        self.binary_level(&["+", "-"], Self::multiplicative)
    }
    fn multiplicative(&mut self) -> RResult<Node> {
        self.binary_level(&["*", "/", "%"], Self::power)
    }

    fn power(&mut self) -> RResult<Node> {
        let base = self.unary()?;
        if self.is_op("**") {
            let t = self.advance();
            let exp = self.power()?;
            return Ok(Node::new(t, NodeKind::BinOp { op: "**".to_string(), lhs: Box::new(base), rhs: Box::new(exp) }));
        }
        Ok(base)
    }

    fn unary(&mut self) -> RResult<Node> {
        for op in ["-", "+", "!", "~"] {
            if self.is_op(op) {
                let t = self.advance();
                let operand = self.unary()?;
                return Ok(Node::new(t, NodeKind::UnOp { op: op.to_string(), operand: Box::new(operand) }));
            }
        }
        self.postfix()
    }

    fn postfix(&mut self) -> RResult<Node> {
        let mut node = self.primary()?;
        loop {
            if self.matches(&TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let t = self.expect(&TokenKind::RParen, "`)`")?;
                node = Node::new(t, NodeKind::Call { callee: Box::new(node), args });
            } else if self.matches(&TokenKind::LBracket) {
                let index = self.expression()?;
                let t = self.expect(&TokenKind::RBracket, "`]`")?;
                node = Node::new(t, NodeKind::Index(Box::new(node), Box::new(index)));
            } else if self.matches(&TokenKind::Dot) {
                let (name, t) = self.expect_identifier()?;
                node = Node::new(t.clone(), NodeKind::Inner(Box::new(node), Box::new(Node::new(t, NodeKind::Variable(name)))));
            } else if self.matches(&TokenKind::Arrow) {
                let ty = self.type_expr()?;
                let t = ty.token.clone();
                node = Node::new(t, NodeKind::CastTo(Box::new(node), Box::new(ty)));
            } else {
                break;
            }
        }
        Ok(node)
    }

    /// A type name used as a value expression (`x -> Number`), distinct
    /// from [`Parser::parse_type`] which builds a [`ParamType`] signature
    /// descriptor.
    fn type_expr(&mut self) -> RResult<Node> {
        let t = self.peek().clone();
        if let Some(code) = builtin_type_code(&t.kind) {
            self.advance();
            return Ok(Node::new(t, NodeKind::Container(Value::Type(code))));
        }
        let (name, tok) = self.expect_identifier()?;
        Ok(Node::new(tok, NodeKind::Container(Value::Type(kind::class_code(name)))))
    }

    fn primary(&mut self) -> RResult<Node> {
        let t = self.peek().clone();
        match &t.kind {
            TokenKind::Number => {
                self.advance();
                Ok(Node::new(t.clone(), NodeKind::Container(Value::Number(t.number.unwrap_or(Number::Integer(0))))))
            }
            TokenKind::String => {
                self.advance();
                Ok(Node::new(t.clone(), NodeKind::Container(Value::string(t.literal.clone()))))
            }
            TokenKind::Boolean => {
                self.advance();
                Ok(Node::new(t.clone(), NodeKind::Container(Value::Boolean(t.literal == "true"))))
            }
            TokenKind::Nil => {
                self.advance();
                Ok(Node::new(t, NodeKind::Container(Value::Nil)))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Node::new(t.clone(), NodeKind::Variable(hash(&t.literal))))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.expression()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.array_or_matrix_literal(),
            TokenKind::LBrace => self.dict_literal(),
            TokenKind::Lambda => self.lambda_literal(),
            TokenKind::Pipe => {
                // `|> expr` — a zero-parameter lambda shorthand (§4.3).
                self.advance();
                let body = self.expression()?;
                Ok(Node::new(
                    t,
                    NodeKind::Lambda { name: crate::intern::LAMBDA, params: Vec::new(), is_vargs: false, body: Box::new(body) },
                ))
            }
            TokenKind::New => {
                self.advance();
                let class = self.postfix_no_call()?;
                self.expect(&TokenKind::LParen, "`(`")?;
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.expression()?);
                        if !self.matches(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "`)`")?;
                Ok(Node::new(t, NodeKind::New { class: Box::new(class), args }))
            }
            TokenKind::At => {
                self.advance();
                let operand = self.unary()?;
                Ok(Node::new(t, NodeKind::TypeOf(Box::new(operand))))
            }
            TokenKind::Len => self.builtin_call(t, |a| NodeKind::Length(Box::new(a))),
            TokenKind::Alloc => self.builtin_call(t, |a| NodeKind::Alloc(Box::new(a))),
            TokenKind::Codes => self.builtin_call(t, |a| NodeKind::CharN(Box::new(a))),
            TokenKind::Chars => self.builtin_call(t, |a| NodeKind::CharS(Box::new(a))),
            TokenKind::ParseKw => self.builtin_call(t, |a| NodeKind::Parse(Box::new(a))),
            TokenKind::Operator(op) if op == "$" => {
                // `$` is undocumented beyond the unary-operator precedence
                // table; the language this was distilled from maps it to
                // the same type-of operation as `@`, so it is kept as an
                // alias rather than invented from nothing.
                self.advance();
                let operand = self.unary()?;
                Ok(Node::new(t, NodeKind::TypeOf(Box::new(operand))))
            }
            kind if builtin_type_code(kind).is_some() => self.type_expr(),
            _ => Err(RuntimeError::new(format!("unexpected token {}", t.kind), t)),
        }
    }

    /// `len(x)`, `alloc(n)`, `codes(s)`, `chars(v)`, `parse(s)` (§4.3/§4.5):
    /// a fixed built-in keyword followed by a single parenthesized
    /// argument, lowering directly to the matching `NodeKind` rather than
    /// going through ordinary `Call` overload resolution.
    fn builtin_call(&mut self, t: Token, ctor: fn(Node) -> NodeKind) -> RResult<Node> {
        self.advance();
        self.expect(&TokenKind::LParen, "`(`")?;
        let arg = self.expression()?;
        self.expect(&TokenKind::RParen, "`)`")?;
        Ok(Node::new(t, ctor(arg)))
    }

    /// Parses an identifier/type-name expression for use as a `new`
    /// class reference, without consuming a following `(...)` as a call.
    fn postfix_no_call(&mut self) -> RResult<Node> {
        let (name, t) = self.expect_identifier()?;
        Ok(Node::new(t, NodeKind::Variable(name)))
    }

    fn array_or_matrix_literal(&mut self) -> RResult<Node> {
        let t = self.advance();
        let mut rows: Vec<Vec<Node>> = vec![Vec::new()];
        if !self.check(&TokenKind::RBracket) {
            loop {
                rows.last_mut().unwrap().push(self.expression()?);
                if self.matches(&TokenKind::Semicolon) {
                    rows.push(Vec::new());
                } else if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket, "`]`")?;
        if rows.len() > 1 {
            Ok(Node::new(t, NodeKind::MatrixLit(rows)))
        } else {
            Ok(Node::new(t, NodeKind::ArrayLit(rows.into_iter().next().unwrap_or_default())))
        }
    }

    fn dict_literal(&mut self) -> RResult<Node> {
        let t = self.advance();
        let mut pairs = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = if self.check(&TokenKind::Identifier) {
                    let (_, tok) = self.expect_identifier()?;
                    DictKey::Literal(tok.literal)
                } else if self.check(&TokenKind::String) {
                    let tok = self.advance();
                    DictKey::Literal(tok.literal)
                } else {
                    DictKey::Expr(Box::new(self.expression()?))
                };
                self.expect(&TokenKind::Colon, "`:`")?;
                let value = self.expression()?;
                pairs.push((key, value));
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "`}`")?;
        Ok(Node::new(t, NodeKind::DictLit(pairs)))
    }

    fn lambda_literal(&mut self) -> RResult<Node> {
        let t = self.advance();
        let (params, is_vargs) = self.parse_params()?;
        let body = if self.matches(&TokenKind::Arrow) {
            self.expression()?
        } else {
            self.block()?
        };
        Ok(Node::new(t, NodeKind::Lambda { name: crate::intern::LAMBDA, params, is_vargs, body: Box::new(body) }))
    }

    /// `(ref? name [: type], …)` (§4.4), or a single `($name)` varargs
    /// form (§3.4: a Function is *either* a fixed-arity overload set *or*
    /// one varargs form, never a mix) — `$name` binds the whole argument
    /// list as an Array.
    fn parse_params(&mut self) -> RResult<(Vec<ParamDecl>, bool)> {
        self.expect(&TokenKind::LParen, "`(`")?;
        if self.is_op("$") {
            self.advance();
            let (name, _) = self.expect_identifier()?;
            self.expect(&TokenKind::RParen, "`)`")?;
            return Ok((vec![ParamDecl { name, by_ref: false, param_type: ParamType::any() }], true));
        }
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let by_ref = self.matches(&TokenKind::Ref);
                let (name, _) = self.expect_identifier()?;
                let param_type = if self.matches(&TokenKind::Colon) { self.parse_type()? } else { ParamType::any() };
                params.push(ParamDecl { name, by_ref, param_type });
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "`)`")?;
        Ok((params, false))
    }

    /// Parses a structural type descriptor (§3.5): a base kind name,
    /// optionally followed by `<...>` function-signature qualifiers.
    /// `consume_angle` handles telling these brackets apart from the
    /// shift/comparison operators they'd otherwise be glued to.
    fn parse_type(&mut self) -> RResult<ParamType> {
        let t = self.peek().clone();
        let base = if let Some(code) = builtin_type_code(&t.kind) {
            self.advance();
            code
        } else {
            let (name, _) = self.expect_identifier()?;
            kind::class_code(name)
        };
        let mut qualifiers = Vec::new();
        if self.consume_angle('<') {
            loop {
                qualifiers.push(self.parse_type()?);
                if !self.matches(&TokenKind::Comma) {
                    break;
                }
            }
            if !self.consume_angle('>') {
                return Err(RuntimeError::new("expected `>` to close a type qualifier list", self.peek().clone()));
            }
        }
        Ok(ParamType { base, qualifiers })
    }
}

fn builtin_type_code(kind: &TokenKind) -> Option<crate::kind::TypeCode> {
    Some(match kind {
        TokenKind::TypeNumber => crate::kind::KIND_NUMBER,
        TokenKind::TypeString => crate::kind::KIND_STRING,
        TokenKind::TypeBoolean => crate::kind::KIND_BOOLEAN,
        TokenKind::TypeArray => crate::kind::KIND_ARRAY,
        TokenKind::TypeDictionary => crate::kind::KIND_DICTIONARY,
        TokenKind::TypeObject => crate::kind::KIND_OBJECT,
        TokenKind::TypeFunction => crate::kind::KIND_FUNCTION,
        TokenKind::TypeType => crate::kind::KIND_TYPE,
        TokenKind::TypePointer => crate::kind::KIND_POINTER,
        TokenKind::TypeNil => crate::kind::KIND_NIL,
        TokenKind::TypeAny => crate::kind::KIND_ANY,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fib_def_with_base_case() {
        let node = parse_source("t", "def fib(0) -> 0; def fib(1) -> 1;").unwrap();
        match node.kind {
            NodeKind::Sequence(stmts) => assert_eq!(stmts.len(), 2),
            _ => panic!("expected a top-level sequence"),
        }
    }

    #[test]
    fn parses_if_else_chain() {
        let node = parse_source("t", "if (1 < 2) { 1; } elif (2 < 3) { 2; } else { 3; }").unwrap();
        match node.kind {
            NodeKind::Sequence(stmts) => assert_eq!(stmts.len(), 1),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_array_and_index() {
        let node = parse_source("t", "[1, 2, 3][0];").unwrap();
        match node.kind {
            NodeKind::Sequence(stmts) => assert!(matches!(stmts[0].kind, NodeKind::Index(_, _))),
            _ => panic!(),
        }
    }

    #[test]
    fn parses_range_literal() {
        let node = parse_source("t", "1..5;").unwrap();
        match node.kind {
            NodeKind::Sequence(stmts) => assert!(matches!(stmts[0].kind, NodeKind::Until { .. })),
            _ => panic!(),
        }
    }
}
