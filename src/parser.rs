use std::mem;

use swc_atoms::JsWord;
use thiserror::Error;

use crate::ast::{Ast, NodeId, Token};
use crate::lexer::{kw_text, Kw, Lexer, Tok, TplPart, P};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unexpected character `{0}` at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("unterminated {0}")]
    Unterminated(&'static str),
    #[error("unexpected token {0}, expected {1}")]
    UnexpectedToken(String, &'static str),
    #[error("unsupported syntax: {0}")]
    Unsupported(&'static str),
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
}

/// Parses a program into `ast`, returning the `Script` root.
pub fn parse_script(ast: &mut Ast, src: &str) -> Result<NodeId, ParseError> {
    Parser::new(ast, src, false)?.parse_program()
}

/// Parses an externs file; every produced node is marked as extern.
pub fn parse_externs(ast: &mut Ast, src: &str) -> Result<NodeId, ParseError> {
    Parser::new(ast, src, true)?.parse_program()
}

pub struct Parser<'a> {
    lexer: Lexer,
    tok: Tok,
    ast: &'a mut Ast,
    externs: bool,
    /// Suppresses the `in` operator while parsing a classic for-head.
    no_in: bool,
}

impl<'a> Parser<'a> {
    fn new(ast: &'a mut Ast, src: &str, externs: bool) -> Result<Parser<'a>, ParseError> {
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_tok()?;
        Ok(Parser {
            lexer,
            tok,
            ast,
            externs,
            no_in: false,
        })
    }

    fn bump(&mut self) -> Result<Tok, ParseError> {
        Ok(mem::replace(&mut self.tok, self.lexer.next_tok()?))
    }

    fn node(&mut self, token: Token) -> NodeId {
        self.ast.alloc(token, JsWord::default(), self.externs)
    }

    fn node_sym(&mut self, token: Token, sym: JsWord) -> NodeId {
        self.ast.alloc(token, sym, self.externs)
    }

    fn is(&self, p: P) -> bool {
        self.tok == Tok::P(p)
    }

    fn is_kw(&self, kw: Kw) -> bool {
        self.tok == Tok::Kw(kw)
    }

    fn is_ident(&self, text: &str) -> bool {
        matches!(&self.tok, Tok::Ident(w) if &**w == text)
    }

    fn eat(&mut self, p: P) -> Result<bool, ParseError> {
        if self.is(p) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_kw(&mut self, kw: Kw) -> Result<bool, ParseError> {
        if self.is_kw(kw) {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, p: P) -> Result<(), ParseError> {
        if self.eat(p)? {
            Ok(())
        } else {
            Err(self.unexpected("punctuation"))
        }
    }

    fn expect_kw(&mut self, kw: Kw) -> Result<(), ParseError> {
        if self.eat_kw(kw)? {
            Ok(())
        } else {
            Err(self.unexpected(kw_text(kw)))
        }
    }

    fn expect_ident(&mut self) -> Result<JsWord, ParseError> {
        match self.bump()? {
            Tok::Ident(w) => Ok(w),
            t => Err(ParseError::UnexpectedToken(
                format!("{:?}", t),
                "identifier",
            )),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        ParseError::UnexpectedToken(format!("{:?}", self.tok), expected)
    }

    /// `;`, or an implicit terminator (`}` / end of input).
    fn eat_semi(&mut self) -> Result<(), ParseError> {
        if self.eat(P::Semi)? || self.is(P::RBrace) || self.tok == Tok::Eof {
            Ok(())
        } else {
            Err(self.unexpected(";"))
        }
    }

    fn parse_program(mut self) -> Result<NodeId, ParseError> {
        let root = self.node(Token::Script);
        while self.tok != Tok::Eof {
            let stmt = self.parse_statement()?;
            self.ast.add_child(root, stmt);
        }
        Ok(root)
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<NodeId, ParseError> {
        let doc = self.lexer.take_doc();
        let stmt = match &self.tok {
            Tok::Kw(Kw::Var) => self.parse_var_statement(Token::Var)?,
            Tok::Kw(Kw::Let) => self.parse_var_statement(Token::Let)?,
            Tok::Kw(Kw::Const) => self.parse_var_statement(Token::Const)?,
            Tok::Kw(Kw::Function) => self.parse_function()?,
            Tok::Kw(Kw::Class) => self.parse_class()?,
            Tok::Kw(Kw::If) => self.parse_if()?,
            Tok::Kw(Kw::While) => self.parse_while()?,
            Tok::Kw(Kw::For) => self.parse_for()?,
            Tok::Kw(Kw::Return) => self.parse_return()?,
            Tok::Kw(Kw::Throw) => self.parse_throw()?,
            Tok::Kw(Kw::Try) => self.parse_try()?,
            Tok::Kw(Kw::Switch) => self.parse_switch()?,
            Tok::Kw(Kw::Break) => {
                self.bump()?;
                self.eat_semi()?;
                self.node(Token::Break)
            }
            Tok::Kw(Kw::Continue) => {
                self.bump()?;
                self.eat_semi()?;
                self.node(Token::Continue)
            }
            Tok::P(P::LBrace) => self.parse_block()?,
            Tok::P(P::Semi) => {
                self.bump()?;
                self.node(Token::Empty)
            }
            Tok::Ident(w) if &**w == "async" => {
                self.bump()?;
                if !self.is_kw(Kw::Function) {
                    return Err(ParseError::Unsupported("`async` without `function`"));
                }
                self.parse_function()?
            }
            _ => {
                let expr = self.parse_expression()?;
                self.eat_semi()?;
                let stmt = self.node(Token::ExprResult);
                self.ast.add_child(stmt, expr);
                stmt
            }
        };
        if let Some(doc) = doc {
            if self.ast.jsdoc(stmt).is_none() {
                self.ast.set_jsdoc(stmt, doc);
            }
        }
        Ok(stmt)
    }

    fn parse_block(&mut self) -> Result<NodeId, ParseError> {
        self.expect(P::LBrace)?;
        let block = self.node(Token::Block);
        while !self.eat(P::RBrace)? {
            if self.tok == Tok::Eof {
                return Err(ParseError::Unterminated("block"));
            }
            let stmt = self.parse_statement()?;
            self.ast.add_child(block, stmt);
        }
        Ok(block)
    }

    fn parse_var_statement(&mut self, kind: Token) -> Result<NodeId, ParseError> {
        self.bump()?;
        let decl = self.node(kind);
        loop {
            let declarator = self.parse_declarator()?;
            self.ast.add_child(decl, declarator);
            if !self.eat(P::Comma)? {
                break;
            }
        }
        self.eat_semi()?;
        Ok(decl)
    }

    /// One declarator: a `Name` (with optional initializer child) or, for
    /// destructuring, an `Assign` of a pattern and its required initializer.
    fn parse_declarator(&mut self) -> Result<NodeId, ParseError> {
        if self.is(P::LBrace) || self.is(P::LBracket) {
            let pattern = self.parse_primary()?;
            self.to_pattern(pattern)?;
            self.expect(P::Assign)?;
            let rhs = self.parse_assign_expr()?;
            let assign = self.node(Token::Assign);
            self.ast.add_child(assign, pattern);
            self.ast.add_child(assign, rhs);
            Ok(assign)
        } else {
            let sym = self.expect_ident()?;
            let name = self.node_sym(Token::Name, sym);
            if self.eat(P::Assign)? {
                let init = self.parse_assign_expr()?;
                self.ast.add_child(name, init);
            }
            Ok(name)
        }
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        self.expect(P::LParen)?;
        let test = self.parse_expression()?;
        self.expect(P::RParen)?;
        let then = self.parse_statement()?;
        let if_node = self.node(Token::If);
        self.ast.add_child(if_node, test);
        self.ast.add_child(if_node, then);
        if self.eat_kw(Kw::Else)? {
            let alt = self.parse_statement()?;
            self.ast.add_child(if_node, alt);
        }
        Ok(if_node)
    }

    fn parse_while(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        self.expect(P::LParen)?;
        let test = self.parse_expression()?;
        self.expect(P::RParen)?;
        let body = self.parse_statement()?;
        let node = self.node(Token::While);
        self.ast.add_child(node, test);
        self.ast.add_child(node, body);
        Ok(node)
    }

    fn parse_for(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        let is_await = self.eat_kw(Kw::Await)?;
        self.expect(P::LParen)?;

        if self.eat(P::Semi)? {
            let init = self.node(Token::Empty);
            return self.finish_classic_for(init);
        }

        if let Tok::Kw(kw @ (Kw::Var | Kw::Let | Kw::Const)) = self.tok {
            let kind = match kw {
                Kw::Var => Token::Var,
                Kw::Let => Token::Let,
                _ => Token::Const,
            };
            self.bump()?;
            let decl = self.node(kind);

            if self.is(P::LBrace) || self.is(P::LBracket) {
                let pattern = self.parse_primary()?;
                self.to_pattern(pattern)?;
                if self.is_kw(Kw::In) || self.is_ident("of") {
                    self.ast.add_child(decl, pattern);
                    return self.finish_for_in_of(decl, is_await);
                }
                self.expect(P::Assign)?;
                let saved = mem::replace(&mut self.no_in, true);
                let rhs = self.parse_assign_expr();
                self.no_in = saved;
                let assign = self.node(Token::Assign);
                self.ast.add_child(assign, pattern);
                self.ast.add_child(assign, rhs?);
                self.ast.add_child(decl, assign);
            } else {
                let sym = self.expect_ident()?;
                let name = self.node_sym(Token::Name, sym);
                if self.is_kw(Kw::In) || self.is_ident("of") {
                    self.ast.add_child(decl, name);
                    return self.finish_for_in_of(decl, is_await);
                }
                if self.eat(P::Assign)? {
                    let saved = mem::replace(&mut self.no_in, true);
                    let init = self.parse_assign_expr();
                    self.no_in = saved;
                    self.ast.add_child(name, init?);
                }
                self.ast.add_child(decl, name);
            }

            while self.eat(P::Comma)? {
                let saved = mem::replace(&mut self.no_in, true);
                let declarator = self.parse_declarator();
                self.no_in = saved;
                let declarator = declarator?;
                self.ast.add_child(decl, declarator);
            }
            self.expect(P::Semi)?;
            return self.finish_classic_for(decl);
        }

        let saved = mem::replace(&mut self.no_in, true);
        let head = self.parse_expression();
        self.no_in = saved;
        let head = head?;

        if self.is_kw(Kw::In) || self.is_ident("of") {
            self.to_pattern(head)?;
            return self.finish_for_in_of(head, is_await);
        }
        self.expect(P::Semi)?;
        self.finish_classic_for(head)
    }

    fn finish_classic_for(&mut self, init: NodeId) -> Result<NodeId, ParseError> {
        let test = if self.is(P::Semi) {
            self.node(Token::Empty)
        } else {
            self.parse_expression()?
        };
        self.expect(P::Semi)?;
        let update = if self.is(P::RParen) {
            self.node(Token::Empty)
        } else {
            self.parse_expression()?
        };
        self.expect(P::RParen)?;
        let body = self.parse_statement()?;
        let node = self.node(Token::For);
        self.ast.add_child(node, init);
        self.ast.add_child(node, test);
        self.ast.add_child(node, update);
        self.ast.add_child(node, body);
        Ok(node)
    }

    fn finish_for_in_of(&mut self, target: NodeId, is_await: bool) -> Result<NodeId, ParseError> {
        let token = if self.eat_kw(Kw::In)? {
            Token::ForIn
        } else {
            self.bump()?; // `of`
            if is_await {
                Token::ForAwaitOf
            } else {
                Token::ForOf
            }
        };
        let obj = self.parse_assign_expr()?;
        self.expect(P::RParen)?;
        let body = self.parse_statement()?;
        let node = self.node(token);
        self.ast.add_child(node, target);
        self.ast.add_child(node, obj);
        self.ast.add_child(node, body);
        Ok(node)
    }

    fn parse_return(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        let node = self.node(Token::Return);
        if !self.is(P::Semi) && !self.is(P::RBrace) && self.tok != Tok::Eof {
            let value = self.parse_expression()?;
            self.ast.add_child(node, value);
        }
        self.eat_semi()?;
        Ok(node)
    }

    fn parse_throw(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        let value = self.parse_expression()?;
        self.eat_semi()?;
        let node = self.node(Token::Throw);
        self.ast.add_child(node, value);
        Ok(node)
    }

    fn parse_try(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        let block = self.parse_block()?;
        let node = self.node(Token::Try);
        self.ast.add_child(node, block);
        if self.eat_kw(Kw::Catch)? {
            let catch = self.node(Token::Catch);
            if self.eat(P::LParen)? {
                let sym = self.expect_ident()?;
                let param = self.node_sym(Token::Name, sym);
                self.ast.add_child(catch, param);
                self.expect(P::RParen)?;
            }
            let body = self.parse_block()?;
            self.ast.add_child(catch, body);
            self.ast.add_child(node, catch);
        } else {
            let empty = self.node(Token::Empty);
            self.ast.add_child(node, empty);
        }
        if self.eat_kw(Kw::Finally)? {
            let finally = self.parse_block()?;
            self.ast.add_child(node, finally);
        }
        Ok(node)
    }

    fn parse_switch(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        self.expect(P::LParen)?;
        let disc = self.parse_expression()?;
        self.expect(P::RParen)?;
        let node = self.node(Token::Switch);
        self.ast.add_child(node, disc);
        self.expect(P::LBrace)?;
        while !self.eat(P::RBrace)? {
            let clause = if self.eat_kw(Kw::Case)? {
                let test = self.parse_expression()?;
                self.expect(P::Colon)?;
                let body = self.parse_case_body()?;
                let case = self.node(Token::Case);
                self.ast.add_child(case, test);
                self.ast.add_child(case, body);
                case
            } else if self.eat_kw(Kw::Default)? {
                self.expect(P::Colon)?;
                let body = self.parse_case_body()?;
                let default = self.node(Token::Default);
                self.ast.add_child(default, body);
                default
            } else {
                return Err(self.unexpected("case or default"));
            };
            self.ast.add_child(node, clause);
        }
        Ok(node)
    }

    fn parse_case_body(&mut self) -> Result<NodeId, ParseError> {
        let block = self.node(Token::Block);
        while !self.is(P::RBrace) && !self.is_kw(Kw::Case) && !self.is_kw(Kw::Default) {
            if self.tok == Tok::Eof {
                return Err(ParseError::Unterminated("switch"));
            }
            let stmt = self.parse_statement()?;
            self.ast.add_child(block, stmt);
        }
        Ok(block)
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = self.parse_assign_expr()?;
        while self.eat(P::Comma)? {
            let rhs = self.parse_assign_expr()?;
            let comma = self.node(Token::Comma);
            self.ast.add_child(comma, expr);
            self.ast.add_child(comma, rhs);
            expr = comma;
        }
        Ok(expr)
    }

    fn parse_assign_expr(&mut self) -> Result<NodeId, ParseError> {
        if self.is_kw(Kw::Yield) {
            return self.parse_yield();
        }

        let lhs = self.parse_cond_expr()?;

        if self.is(P::Assign) {
            self.bump()?;
            self.to_pattern(lhs)?;
            let rhs = self.parse_assign_expr()?;
            let assign = self.node(Token::Assign);
            self.ast.add_child(assign, lhs);
            self.ast.add_child(assign, rhs);
            return Ok(assign);
        }

        if let Tok::P(
            P::PlusAssign | P::MinusAssign | P::StarAssign | P::SlashAssign | P::PercentAssign,
        ) = self.tok
        {
            self.bump()?;
            if !matches!(
                self.ast.token(lhs),
                Token::Name | Token::GetProp | Token::GetElem
            ) {
                return Err(ParseError::InvalidAssignmentTarget);
            }
            let rhs = self.parse_assign_expr()?;
            let assign = self.node(Token::CompoundAssign);
            self.ast.add_child(assign, lhs);
            self.ast.add_child(assign, rhs);
            return Ok(assign);
        }

        Ok(lhs)
    }

    fn parse_yield(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        let node = self.node(Token::Yield);
        if self.eat(P::Star)? {
            self.ast.set_yield_all(node);
            let value = self.parse_assign_expr()?;
            self.ast.add_child(node, value);
        } else if !self.is(P::Semi)
            && !self.is(P::RParen)
            && !self.is(P::RBrace)
            && !self.is(P::RBracket)
            && !self.is(P::Comma)
            && !self.is(P::Colon)
            && self.tok != Tok::Eof
        {
            let value = self.parse_assign_expr()?;
            self.ast.add_child(node, value);
        }
        Ok(node)
    }

    fn parse_cond_expr(&mut self) -> Result<NodeId, ParseError> {
        let test = self.parse_or_expr()?;
        if self.eat(P::Question)? {
            let then = self.parse_assign_expr()?;
            self.expect(P::Colon)?;
            let alt = self.parse_assign_expr()?;
            let hook = self.node(Token::Hook);
            self.ast.add_child(hook, test);
            self.ast.add_child(hook, then);
            self.ast.add_child(hook, alt);
            return Ok(hook);
        }
        Ok(test)
    }

    fn parse_binary<F>(
        &mut self,
        mut op_for: F,
        next: fn(&mut Self) -> Result<NodeId, ParseError>,
    ) -> Result<NodeId, ParseError>
    where
        F: FnMut(&Self) -> Option<Token>,
    {
        let mut lhs = next(self)?;
        while let Some(op) = op_for(self) {
            self.bump()?;
            let rhs = next(self)?;
            let node = self.node(op);
            self.ast.add_child(node, lhs);
            self.ast.add_child(node, rhs);
            lhs = node;
        }
        Ok(lhs)
    }

    fn parse_or_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(
            |p| p.is(P::OrOr).then_some(Token::Or),
            Self::parse_and_expr,
        )
    }

    fn parse_and_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(
            |p| p.is(P::AndAnd).then_some(Token::And),
            Self::parse_eq_expr,
        )
    }

    fn parse_eq_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(
            |p| match p.tok {
                Tok::P(P::EqEq) => Some(Token::Eq),
                Tok::P(P::NotEq) => Some(Token::Ne),
                Tok::P(P::EqEqEq) => Some(Token::Sheq),
                Tok::P(P::NotEqEq) => Some(Token::Shne),
                _ => None,
            },
            Self::parse_rel_expr,
        )
    }

    fn parse_rel_expr(&mut self) -> Result<NodeId, ParseError> {
        let no_in = self.no_in;
        self.parse_binary(
            move |p| match p.tok {
                Tok::P(P::Lt) => Some(Token::Lt),
                Tok::P(P::Gt) => Some(Token::Gt),
                Tok::P(P::Le) => Some(Token::Le),
                Tok::P(P::Ge) => Some(Token::Ge),
                Tok::Kw(Kw::Instanceof) => Some(Token::Instanceof),
                Tok::Kw(Kw::In) if !no_in => Some(Token::In),
                _ => None,
            },
            Self::parse_add_expr,
        )
    }

    fn parse_add_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(
            |p| match p.tok {
                Tok::P(P::Plus) => Some(Token::Add),
                Tok::P(P::Minus) => Some(Token::Sub),
                _ => None,
            },
            Self::parse_mul_expr,
        )
    }

    fn parse_mul_expr(&mut self) -> Result<NodeId, ParseError> {
        self.parse_binary(
            |p| match p.tok {
                Tok::P(P::Star) => Some(Token::Mul),
                Tok::P(P::Slash) => Some(Token::Div),
                Tok::P(P::Percent) => Some(Token::Mod),
                _ => None,
            },
            Self::parse_unary_expr,
        )
    }

    fn parse_unary_expr(&mut self) -> Result<NodeId, ParseError> {
        let op = match self.tok {
            Tok::P(P::Bang) => Some(Token::Not),
            Tok::P(P::Minus) => Some(Token::Neg),
            Tok::P(P::Plus) => Some(Token::Pos),
            Tok::P(P::PlusPlus) => Some(Token::Inc),
            Tok::P(P::MinusMinus) => Some(Token::Dec),
            Tok::Kw(Kw::Typeof) => Some(Token::Typeof),
            Tok::Kw(Kw::Delete) => Some(Token::Delete),
            Tok::Kw(Kw::Await) => Some(Token::Await),
            _ => None,
        };
        if let Some(op) = op {
            self.bump()?;
            let operand = self.parse_unary_expr()?;
            let node = self.node(op);
            self.ast.add_child(node, operand);
            return Ok(node);
        }

        let expr = self.parse_call_expr()?;
        if self.is(P::PlusPlus) || self.is(P::MinusMinus) {
            let op = if self.is(P::PlusPlus) {
                Token::Inc
            } else {
                Token::Dec
            };
            self.bump()?;
            let node = self.node(op);
            self.ast.add_child(node, expr);
            return Ok(node);
        }
        Ok(expr)
    }

    fn parse_call_expr(&mut self) -> Result<NodeId, ParseError> {
        let mut expr = self.parse_member_expr()?;
        loop {
            if self.eat(P::Dot)? {
                let sym = self.prop_name()?;
                let prop = self.node_sym(Token::GetProp, sym);
                self.ast.add_child(prop, expr);
                expr = prop;
            } else if self.eat(P::LBracket)? {
                let index = self.parse_expression()?;
                self.expect(P::RBracket)?;
                let elem = self.node(Token::GetElem);
                self.ast.add_child(elem, expr);
                self.ast.add_child(elem, index);
                expr = elem;
            } else if self.is(P::LParen) {
                let args = self.parse_args()?;
                let call = self.node(Token::Call);
                self.ast.add_child(call, expr);
                for arg in args {
                    self.ast.add_child(call, arg);
                }
                expr = call;
            } else if matches!(self.tok, Tok::Template(_)) {
                let template = self.parse_template()?;
                let tagged = self.node(Token::TaggedTemplate);
                self.ast.add_child(tagged, expr);
                self.ast.add_child(tagged, template);
                expr = tagged;
            } else {
                return Ok(expr);
            }
        }
    }

    /// Member expression, including `new` (whose argument list binds tighter
    /// than call suffixes).
    fn parse_member_expr(&mut self) -> Result<NodeId, ParseError> {
        if self.eat_kw(Kw::New)? {
            let mut callee = self.parse_member_expr()?;
            loop {
                if self.eat(P::Dot)? {
                    let sym = self.prop_name()?;
                    let prop = self.node_sym(Token::GetProp, sym);
                    self.ast.add_child(prop, callee);
                    callee = prop;
                } else if self.eat(P::LBracket)? {
                    let index = self.parse_expression()?;
                    self.expect(P::RBracket)?;
                    let elem = self.node(Token::GetElem);
                    self.ast.add_child(elem, callee);
                    self.ast.add_child(elem, index);
                    callee = elem;
                } else {
                    break;
                }
            }
            let new_node = self.node(Token::New);
            self.ast.add_child(new_node, callee);
            if self.is(P::LParen) {
                let args = self.parse_args()?;
                for arg in args {
                    self.ast.add_child(new_node, arg);
                }
            }
            return Ok(new_node);
        }
        self.parse_primary()
    }

    fn parse_args(&mut self) -> Result<Vec<NodeId>, ParseError> {
        self.expect(P::LParen)?;
        let mut args = Vec::new();
        while !self.eat(P::RParen)? {
            let arg = if self.eat(P::Ellipsis)? {
                let value = self.parse_assign_expr()?;
                let spread = self.node(Token::Spread);
                self.ast.add_child(spread, value);
                spread
            } else {
                self.parse_assign_expr()?
            };
            args.push(arg);
            if !self.is(P::RParen) {
                self.expect(P::Comma)?;
            }
        }
        Ok(args)
    }

    /// Property name after `.`; keywords are fine here (`x.delete`, `f.call`).
    fn prop_name(&mut self) -> Result<JsWord, ParseError> {
        match self.bump()? {
            Tok::Ident(w) => Ok(w),
            Tok::Kw(kw) => Ok(JsWord::from(kw_text(kw))),
            t => Err(ParseError::UnexpectedToken(
                format!("{:?}", t),
                "property name",
            )),
        }
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        match &self.tok {
            Tok::Ident(w) if &**w == "async" => {
                self.bump()?;
                if !self.is_kw(Kw::Function) {
                    return Err(ParseError::Unsupported("`async` without `function`"));
                }
                self.parse_function()
            }
            Tok::Ident(_) => {
                let sym = self.expect_ident()?;
                Ok(self.node_sym(Token::Name, sym))
            }
            Tok::Num(_) => {
                if let Tok::Num(w) = self.bump()? {
                    Ok(self.node_sym(Token::Number, w))
                } else {
                    unreachable!()
                }
            }
            Tok::Str(_) => {
                if let Tok::Str(w) = self.bump()? {
                    Ok(self.node_sym(Token::Str, w))
                } else {
                    unreachable!()
                }
            }
            Tok::Template(_) => self.parse_template(),
            Tok::Kw(Kw::This) => {
                self.bump()?;
                Ok(self.node(Token::This))
            }
            Tok::Kw(Kw::True) => {
                self.bump()?;
                Ok(self.node(Token::True))
            }
            Tok::Kw(Kw::False) => {
                self.bump()?;
                Ok(self.node(Token::False))
            }
            Tok::Kw(Kw::Null) => {
                self.bump()?;
                Ok(self.node(Token::Null))
            }
            Tok::Kw(Kw::Function) => self.parse_function(),
            Tok::Kw(Kw::Class) => self.parse_class(),
            Tok::P(P::LParen) => {
                self.bump()?;
                let expr = self.parse_expression()?;
                self.expect(P::RParen)?;
                Ok(expr)
            }
            Tok::P(P::LBracket) => self.parse_array_literal(),
            Tok::P(P::LBrace) => self.parse_object_literal(),
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_template(&mut self) -> Result<NodeId, ParseError> {
        let parts = match self.bump()? {
            Tok::Template(parts) => parts,
            _ => unreachable!(),
        };
        let template = self.node(Token::TemplateLit);
        for part in parts {
            if let TplPart::Expr(src) = part {
                let expr = self.parse_substitution(&src)?;
                self.ast.add_child(template, expr);
            }
        }
        Ok(template)
    }

    /// Parses the source of one `${...}` substitution with a temporary lexer.
    fn parse_substitution(&mut self, src: &str) -> Result<NodeId, ParseError> {
        let mut lexer = Lexer::new(src);
        let tok = lexer.next_tok()?;
        let saved_lexer = mem::replace(&mut self.lexer, lexer);
        let saved_tok = mem::replace(&mut self.tok, tok);
        let result = self.parse_expression().and_then(|expr| {
            if self.tok == Tok::Eof {
                Ok(expr)
            } else {
                Err(self.unexpected("end of substitution"))
            }
        });
        self.lexer = saved_lexer;
        self.tok = saved_tok;
        result
    }

    fn parse_array_literal(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        let array = self.node(Token::ArrayLit);
        loop {
            if self.eat(P::RBracket)? {
                return Ok(array);
            }
            if self.eat(P::Comma)? {
                let hole = self.node(Token::Empty);
                self.ast.add_child(array, hole);
                continue;
            }
            let element = if self.eat(P::Ellipsis)? {
                let value = self.parse_assign_expr()?;
                let spread = self.node(Token::Spread);
                self.ast.add_child(spread, value);
                spread
            } else {
                self.parse_assign_expr()?
            };
            self.ast.add_child(array, element);
            if !self.is(P::RBracket) {
                self.expect(P::Comma)?;
            }
        }
    }

    fn parse_object_literal(&mut self) -> Result<NodeId, ParseError> {
        self.bump()?;
        let object = self.node(Token::ObjectLit);
        while !self.eat(P::RBrace)? {
            if self.eat(P::Ellipsis)? {
                let value = self.parse_assign_expr()?;
                let spread = self.node(Token::Spread);
                self.ast.add_child(spread, value);
                self.ast.add_child(object, spread);
            } else {
                let key = self.prop_name()?;
                let entry = self.node_sym(Token::StringKey, key.clone());
                if self.eat(P::Colon)? {
                    let value = self.parse_assign_expr()?;
                    self.ast.add_child(entry, value);
                } else if self.is(P::LParen) {
                    let method = self.parse_function_tail(JsWord::default())?;
                    self.ast.add_child(entry, method);
                } else {
                    let shorthand = self.node_sym(Token::Name, key);
                    self.ast.add_child(entry, shorthand);
                }
                self.ast.add_child(object, entry);
            }
            if !self.is(P::RBrace) {
                self.expect(P::Comma)?;
            }
        }
        Ok(object)
    }

    fn parse_function(&mut self) -> Result<NodeId, ParseError> {
        let doc = self.lexer.take_doc();
        self.expect_kw(Kw::Function)?;
        self.eat(P::Star)?; // generator marker
        let name = match &self.tok {
            Tok::Ident(_) => self.expect_ident()?,
            _ => JsWord::default(),
        };
        let function = self.parse_function_tail(name)?;
        if let Some(doc) = doc {
            self.ast.set_jsdoc(function, doc);
        }
        Ok(function)
    }

    /// Params and body; builds `Function[Name, ParamList, Block]`.
    fn parse_function_tail(&mut self, name: JsWord) -> Result<NodeId, ParseError> {
        let name_node = self.node_sym(Token::Name, name);
        self.expect(P::LParen)?;
        let params = self.node(Token::ParamList);
        while !self.eat(P::RParen)? {
            let param = if self.eat(P::Ellipsis)? {
                let sym = self.expect_ident()?;
                let target = self.node_sym(Token::Name, sym);
                let rest = self.node(Token::Rest);
                self.ast.add_child(rest, target);
                rest
            } else {
                let sym = self.expect_ident()?;
                self.node_sym(Token::Name, sym)
            };
            self.ast.add_child(params, param);
            if !self.is(P::RParen) {
                self.expect(P::Comma)?;
            }
        }
        let body = self.parse_block()?;
        let function = self.node(Token::Function);
        self.ast.add_child(function, name_node);
        self.ast.add_child(function, params);
        self.ast.add_child(function, body);
        Ok(function)
    }

    fn parse_class(&mut self) -> Result<NodeId, ParseError> {
        let doc = self.lexer.take_doc();
        self.expect_kw(Kw::Class)?;
        let name = match &self.tok {
            Tok::Ident(_) => self.expect_ident()?,
            _ => JsWord::default(),
        };
        let name_node = self.node_sym(Token::Name, name);
        let heritage = if self.eat_kw(Kw::Extends)? {
            self.parse_call_expr()?
        } else {
            self.node(Token::Empty)
        };
        self.expect(P::LBrace)?;
        let members = self.node(Token::ClassMembers);
        while !self.eat(P::RBrace)? {
            if self.eat(P::Semi)? {
                continue;
            }
            if self.is_ident("static") {
                self.bump()?;
            }
            let method_name = self.prop_name()?;
            let function = self.parse_function_tail(JsWord::default())?;
            let member = self.node_sym(Token::MemberFunctionDef, method_name);
            self.ast.add_child(member, function);
            self.ast.add_child(members, member);
        }
        let class = self.node(Token::Class);
        self.ast.add_child(class, name_node);
        self.ast.add_child(class, heritage);
        self.ast.add_child(class, members);
        if let Some(doc) = doc {
            self.ast.set_jsdoc(class, doc);
        }
        Ok(class)
    }

    /// Reinterprets an already-parsed expression as an assignment target,
    /// rewriting literal tokens into pattern tokens in place.
    fn to_pattern(&mut self, n: NodeId) -> Result<(), ParseError> {
        match self.ast.token(n) {
            Token::Name | Token::GetProp | Token::GetElem => Ok(()),
            Token::ObjectLit => {
                self.ast.set_token(n, Token::ObjectPattern);
                for entry in self.ast.children(n).to_vec() {
                    match self.ast.token(entry) {
                        Token::StringKey => {
                            let value = self
                                .ast
                                .first_child(entry)
                                .ok_or(ParseError::InvalidAssignmentTarget)?;
                            self.to_pattern(value)?;
                        }
                        Token::Spread => {
                            self.ast.set_token(entry, Token::Rest);
                            let target = self.ast.child(entry, 0);
                            if !matches!(self.ast.token(target), Token::Name | Token::GetProp) {
                                return Err(ParseError::InvalidAssignmentTarget);
                            }
                        }
                        _ => return Err(ParseError::InvalidAssignmentTarget),
                    }
                }
                Ok(())
            }
            Token::ArrayLit => {
                self.ast.set_token(n, Token::ArrayPattern);
                for element in self.ast.children(n).to_vec() {
                    match self.ast.token(element) {
                        Token::Empty => {}
                        Token::Spread => {
                            self.ast.set_token(element, Token::Rest);
                            let target = self.ast.child(element, 0);
                            self.to_pattern(target)?;
                        }
                        _ => self.to_pattern(element)?,
                    }
                }
                Ok(())
            }
            _ => Err(ParseError::InvalidAssignmentTarget),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Ast, NodeId) {
        let mut ast = Ast::default();
        let root = parse_script(&mut ast, src).unwrap();
        (ast, root)
    }

    fn find(ast: &Ast, root: NodeId, token: Token) -> Vec<NodeId> {
        ast.preorder(root).filter(|&n| ast.token(n) == token).collect()
    }

    #[test]
    fn function_shape() {
        let (ast, root) = parse("function f(a, ...rest) { return a; }");
        let f = find(&ast, root, Token::Function)[0];
        assert_eq!(&**ast.sym(ast.child(f, 0)), "f");
        let params = ast.child(f, 1);
        assert_eq!(ast.token(params), Token::ParamList);
        assert_eq!(ast.children(params).len(), 2);
        assert_eq!(ast.token(ast.child(params, 1)), Token::Rest);
    }

    #[test]
    fn member_and_call_chains() {
        let (ast, root) = parse("a.b.c(1)[2]`t`;");
        let tagged = find(&ast, root, Token::TaggedTemplate)[0];
        let elem = ast.child(tagged, 0);
        assert_eq!(ast.token(elem), Token::GetElem);
        let call = ast.child(elem, 0);
        assert_eq!(ast.token(call), Token::Call);
        assert_eq!(ast.reference_text(ast.child(call, 0)), "a.b.c");
    }

    #[test]
    fn new_binds_member_args() {
        let (ast, root) = parse("new a.B(1).m();");
        let call = find(&ast, root, Token::Call)[0];
        let prop = ast.child(call, 0);
        assert_eq!(ast.token(prop), Token::GetProp);
        assert_eq!(ast.token(ast.child(prop, 0)), Token::New);
    }

    #[test]
    fn destructuring_declarations() {
        let (ast, root) = parse("var {a, b: c.d} = obj; const [x, ...y] = arr;");
        assert_eq!(find(&ast, root, Token::ObjectPattern).len(), 1);
        assert_eq!(find(&ast, root, Token::ArrayPattern).len(), 1);
        assert_eq!(find(&ast, root, Token::Rest).len(), 1);
        // Declaration patterns hang off an Assign inside the declaration.
        let var = find(&ast, root, Token::Var)[0];
        assert_eq!(ast.token(ast.child(var, 0)), Token::Assign);
    }

    #[test]
    fn for_variants() {
        let (ast, root) = parse(
            "for (var i = 0; i < 2; i++) {} for (var k in o) {} for (const v of xs) {} \
             for await (const v of xs) {}",
        );
        assert_eq!(find(&ast, root, Token::For).len(), 1);
        assert_eq!(find(&ast, root, Token::ForIn).len(), 1);
        assert_eq!(find(&ast, root, Token::ForOf).len(), 1);
        assert_eq!(find(&ast, root, Token::ForAwaitOf).len(), 1);
    }

    #[test]
    fn in_operator_still_works_outside_for_heads() {
        let (ast, root) = parse("x = a in b;");
        assert_eq!(find(&ast, root, Token::In).len(), 1);
    }

    #[test]
    fn jsdoc_attaches_to_functions() {
        let (ast, root) = parse("/** @nosideeffects */ function f() {} var g = /** @modifies {this} */ function() {};");
        let fns = find(&ast, root, Token::Function);
        assert!(ast.jsdoc(fns[0]).unwrap().no_side_effects);
        assert!(ast.jsdoc(fns[1]).unwrap().modifies_this);
    }

    #[test]
    fn yield_forms() {
        let (ast, root) = parse("function g() { yield; yield 1; yield* xs; }");
        let yields = find(&ast, root, Token::Yield);
        assert_eq!(yields.len(), 3);
        assert!(!ast.yield_all(yields[0]));
        assert!(ast.yield_all(yields[2]));
    }

    #[test]
    fn class_members() {
        let (ast, root) = parse("class C extends B { constructor() {} m(x) {} static s() {} }");
        let class = find(&ast, root, Token::Class)[0];
        assert_eq!(ast.reference_text(ast.child(class, 1)), "B");
        let members = ast.child(class, 2);
        assert_eq!(ast.children(members).len(), 3);
        assert_eq!(&**ast.sym(ast.child(members, 0)), "constructor");
    }

    #[test]
    fn rejects_unsupported_syntax() {
        let mut ast = Ast::default();
        assert!(parse_script(&mut ast, "const f = (a) => a;").is_err());
        assert!(parse_script(&mut ast, "var x = /re/;").is_err());
    }
}
