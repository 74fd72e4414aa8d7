//! Single-pass Pratt parser that emits bytecode directly — there is no
//! intermediate AST. Precedence climbing drives both expression parsing and
//! assignment-target detection (`can_assign`); jumps are emitted with
//! placeholder operands and back-patched once their target is known.

use crate::chunk::{Chunk, OpCode};
use crate::error::Error;
use crate::scanner::{Scanner, Token, TokenKind};
use crate::value::{LoxFunction, Value};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . (
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        use Precedence::*;
        match self {
            None => Assignment,
            Assignment => Or,
            Or => And,
            And => Equality,
            Equality => Comparison,
            Comparison => Term,
            Term => Factor,
            Factor => Unary,
            Unary => Call,
            Call => Primary,
            Primary => Primary,
        }
    }
}

type ParseFn<'src> = fn(&mut Compiler<'src>, bool);

struct Rule<'src> {
    prefix: Option<ParseFn<'src>>,
    infix: Option<ParseFn<'src>>,
    precedence: Precedence,
}

fn get_rule<'src>(kind: TokenKind) -> Rule<'src> {
    use Precedence::*;
    use TokenKind::*;
    match kind {
        LeftParen => Rule { prefix: Some(Compiler::grouping), infix: Some(Compiler::call), precedence: Call },
        Minus => Rule { prefix: Some(Compiler::unary), infix: Some(Compiler::binary), precedence: Term },
        Plus => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Term },
        Slash => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Factor },
        Star => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Factor },
        Bang => Rule { prefix: Some(Compiler::unary), infix: None, precedence: None },
        BangEqual => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Equality },
        EqualEqual => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Equality },
        Greater => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Comparison },
        GreaterEqual => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Comparison },
        Less => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Comparison },
        LessEqual => Rule { prefix: None, infix: Some(Compiler::binary), precedence: Comparison },
        Identifier => Rule { prefix: Some(Compiler::variable), infix: None, precedence: None },
        String => Rule { prefix: Some(Compiler::string), infix: None, precedence: None },
        Number => Rule { prefix: Some(Compiler::number), infix: None, precedence: None },
        And => Rule { prefix: None, infix: Some(Compiler::and_), precedence: And },
        Or => Rule { prefix: None, infix: Some(Compiler::or_), precedence: Or },
        False | True | Nil => Rule { prefix: Some(Compiler::literal), infix: None, precedence: None },
        _ => Rule { prefix: None, infix: None, precedence: None },
    }
}

struct Local<'src> {
    name: &'src str,
    depth: i32,
}

#[derive(PartialEq, Clone, Copy)]
enum FunctionType {
    Script,
    Function,
}

struct FuncState<'src> {
    chunk: Chunk,
    locals: Vec<Local<'src>>,
    scope_depth: i32,
    function_type: FunctionType,
    name: Option<String>,
    arity: u8,
}

impl<'src> FuncState<'src> {
    fn new(function_type: FunctionType, name: Option<String>) -> Self {
        FuncState {
            chunk: Chunk::new(),
            // Slot 0 is reserved for the callee itself (the VM's slot_base
            // convention); it has no name a Lox program could reference.
            locals: vec![Local { name: "", depth: 0 }],
            scope_depth: 0,
            function_type,
            name,
            arity: 0,
        }
    }
}

pub struct Compiler<'src> {
    scanner: Scanner<'src>,
    current: Token<'src>,
    previous: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    first_error: Option<Error>,
    functions: Vec<FuncState<'src>>,
}

const MAX_LOCALS: usize = 256;
const MAX_PARAMS: usize = 255;
const MAX_ARGS: usize = 255;

impl<'src> Compiler<'src> {
    fn new(source: &'src str) -> Self {
        let mut scanner = Scanner::new(source);
        let first = scanner.scan_token();
        Compiler {
            scanner,
            current: first,
            previous: first,
            had_error: false,
            panic_mode: false,
            first_error: None,
            functions: vec![FuncState::new(FunctionType::Script, None)],
        }
    }

    pub fn compile(source: &'src str) -> Result<LoxFunction, Error> {
        let mut compiler = Compiler::new(source);
        while !compiler.check(TokenKind::Eof) {
            compiler.declaration();
        }
        compiler.consume(TokenKind::Eof, "Expect end of expression.");
        compiler.end_function()
    }

    // -- token stream -----------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let line = self.current.line;
            let message = self.current.lexeme.to_string();
            self.error_at_line(line, None, &message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    // -- error reporting ----------------------------------------------------

    fn error_at_current(&mut self, message: &str) {
        let token = self.current;
        self.error_at(token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous;
        self.error_at(token, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if token.kind == TokenKind::Eof {
            self.error_at_line(token.line, None, message);
        } else {
            self.error_at_line(token.line, Some(token.lexeme), message);
        }
    }

    fn error_at_line(&mut self, line: usize, lexeme: Option<&str>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        let err = match lexeme {
            Some(lexeme) => Error::compile_at(line, lexeme, message),
            None => Error::compile_at_end(line, message),
        };
        eprintln!("{err}");
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            use TokenKind::*;
            match self.current.kind {
                Class | Fun | Var | For | If | While | Print | Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // -- bytecode emission --------------------------------------------------

    fn current_func(&self) -> &FuncState<'src> {
        self.functions.last().unwrap()
    }

    fn current_func_mut(&mut self) -> &mut FuncState<'src> {
        self.functions.last_mut().unwrap()
    }

    fn chunk_mut(&mut self) -> &mut Chunk {
        &mut self.current_func_mut().chunk
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.previous.line;
        self.chunk_mut().write(byte, line);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_bytes(&mut self, op: OpCode, byte: u8) {
        self.emit_op(op);
        self.emit_byte(byte);
    }

    fn emit_return(&mut self) {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Return);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        let line = self.previous.line;
        self.chunk_mut().emit_jump(op, line)
    }

    fn patch_jump(&mut self, offset: usize) {
        if self.chunk_mut().patch_jump(offset).is_err() {
            self.error("Too much code to jump over.");
        }
    }

    fn emit_loop(&mut self, loop_start: usize) {
        let line = self.previous.line;
        if self.chunk_mut().emit_loop(loop_start, line).is_err() {
            self.error("Loop body too large.");
        }
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        match self.chunk_mut().add_constant(value) {
            Some(idx) => idx,
            None => {
                self.error("Too many constants in one chunk.");
                0
            }
        }
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        self.emit_bytes(OpCode::Constant, idx);
    }

    fn identifier_constant(&mut self, name: &str) -> u8 {
        self.make_constant(Value::string(name.to_string()))
    }

    fn end_function(&mut self) -> Result<LoxFunction, Error> {
        self.emit_return();
        let func = self.functions.pop().unwrap();
        if self.had_error {
            return Err(self.first_error.clone().unwrap());
        }
        Ok(LoxFunction {
            arity: func.arity,
            chunk: func.chunk,
            name: func.name,
        })
    }

    // -- scopes & locals ------------------------------------------------

    fn begin_scope(&mut self) {
        self.current_func_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.current_func_mut().scope_depth -= 1;
        let depth = self.current_func().scope_depth;
        while let Some(local) = self.current_func().locals.last() {
            if local.depth > depth {
                self.emit_op(OpCode::Pop);
                self.current_func_mut().locals.pop();
            } else {
                break;
            }
        }
    }

    fn add_local(&mut self, name: &'src str) {
        if self.current_func().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.current_func_mut().locals.push(Local { name, depth: -1 });
    }

    fn declare_variable(&mut self) {
        if self.current_func().scope_depth == 0 {
            return;
        }
        let name = self.previous.lexeme;
        let depth = self.current_func().scope_depth;
        for local in self.current_func().locals.iter().rev() {
            if local.depth != -1 && local.depth < depth {
                break;
            }
            if local.name == name {
                self.error("Already a variable with this name in this scope.");
                return;
            }
        }
        self.add_local(name);
    }

    fn mark_initialized(&mut self) {
        if self.current_func().scope_depth == 0 {
            return;
        }
        let depth = self.current_func().scope_depth;
        self.current_func_mut().locals.last_mut().unwrap().depth = depth;
    }

    fn resolve_local(&mut self, name: &str) -> Option<u8> {
        for (i, local) in self.current_func().locals.iter().enumerate().rev() {
            if local.name == name {
                if local.depth == -1 {
                    self.error("Can't read local variable in its own initializer.");
                }
                return Some(i as u8);
            }
        }
        None
    }

    fn parse_variable(&mut self, message: &str) -> Option<u8> {
        self.consume(TokenKind::Identifier, message);
        self.declare_variable();
        if self.current_func().scope_depth > 0 {
            return None;
        }
        let name = self.previous.lexeme;
        Some(self.identifier_constant(name))
    }

    fn define_variable(&mut self, global: Option<u8>) {
        if self.current_func().scope_depth > 0 {
            self.mark_initialized();
            return;
        }
        self.emit_bytes(OpCode::DefineGlobal, global.unwrap());
    }

    // -- statements ----------------------------------------------------

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Fun) {
            self.fun_declaration();
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn fun_declaration(&mut self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&mut self, function_type: FunctionType) {
        let name = self.previous.lexeme.to_string();
        self.functions.push(FuncState::new(function_type, Some(name)));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                if self.current_func().arity as usize >= MAX_PARAMS {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                self.current_func_mut().arity += 1;
                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expect '{' before function body.");
        self.block();

        match self.end_function() {
            Ok(func) => {
                let value = Value::Obj(std::rc::Rc::new(crate::value::Obj::function(func)));
                self.emit_constant(value);
            }
            Err(err) => {
                self.had_error = true;
                if self.first_error.is_none() {
                    self.first_error = Some(err);
                }
            }
        }
    }

    fn var_declaration(&mut self) {
        let global = self.parse_variable("Expect variable name.");
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.");
        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else if self.match_token(TokenKind::If) {
            self.if_statement();
        } else if self.match_token(TokenKind::While) {
            self.while_statement();
        } else if self.match_token(TokenKind::For) {
            self.for_statement();
        } else if self.match_token(TokenKind::Return) {
            self.return_statement();
        } else if self.match_token(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn return_statement(&mut self) {
        if self.current_func().function_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_token(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_token(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.chunk_mut().code.len();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn for_statement(&mut self) {
        self.begin_scope();
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.");

        if self.match_token(TokenKind::Semicolon) {
            // no initializer
        } else if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.chunk_mut().code.len();
        let mut exit_jump = None;
        if !self.match_token(TokenKind::Semicolon) {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.");
            exit_jump = Some(self.emit_jump(OpCode::JumpIfFalse));
            self.emit_op(OpCode::Pop);
        }

        if !self.check(TokenKind::RightParen) {
            let body_jump = self.emit_jump(OpCode::Jump);
            let increment_start = self.chunk_mut().code.len();
            self.expression();
            self.emit_op(OpCode::Pop);
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_jump);
        } else {
            self.consume(TokenKind::RightParen, "Expect ')' after for clauses.");
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_jump) = exit_jump {
            self.patch_jump(exit_jump);
            self.emit_op(OpCode::Pop);
        }
        self.end_scope();
    }

    // -- expressions ----------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix = get_rule(self.previous.kind).prefix;
        let prefix = match prefix {
            Some(f) => f,
            None => {
                self.error("Expect expression.");
                return;
            }
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            let infix = get_rule(self.previous.kind).infix.unwrap();
            infix(self, can_assign);
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().unwrap_or(f64::NAN);
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let raw = &lexeme[1..lexeme.len() - 1];
        self.emit_constant(Value::string(raw.to_string()));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!(),
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match kind {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!(),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let kind = self.previous.kind;
        let rule = get_rule(kind);
        self.parse_precedence(rule.precedence.next());
        match kind {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            _ => unreachable!(),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme;
        self.named_variable(name, can_assign);
    }

    fn named_variable(&mut self, name: &'src str, can_assign: bool) {
        let (get_op, set_op, arg) = match self.resolve_local(name) {
            Some(slot) => (OpCode::GetLocal, OpCode::SetLocal, slot),
            None => {
                let idx = self.identifier_constant(name);
                (OpCode::GetGlobal, OpCode::SetGlobal, idx)
            }
        };

        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit_bytes(set_op, arg);
        } else {
            self.emit_bytes(get_op, arg);
        }
    }

    fn call(&mut self, _can_assign: bool) {
        let arg_count = self.argument_list();
        self.emit_bytes(OpCode::Call, arg_count);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: usize = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count >= MAX_ARGS {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.match_token(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments.");
        count as u8
    }
}
