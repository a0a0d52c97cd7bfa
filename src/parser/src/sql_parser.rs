use crate::node::{SqlLiteral, SqlNode};
use crate::operator::{OperatorSyntax, OperatorTable, SqlKind, SqlOperator};
use crate::pos::ParserPos;
use crate::reducer::{to_tree, TreeListItem};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use common::{parse_timestamp, MedError, DATE_FORMAT};
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;
use std::str::FromStr;

/// Words that never start an operand and are never taken as an alias.
const RESERVED: &[&str] = &[
    "SELECT",
    "FROM",
    "WHERE",
    "AND",
    "OR",
    "IS",
    "IN",
    "BETWEEN",
    "LIKE",
    "ESCAPE",
    "AS",
    "SYMMETRIC",
    "ASYMMETRIC",
];

/// Token of the expression grammar.
#[derive(Debug, Clone, PartialEq)]
enum Lexeme {
    Word { value: String, quoted: bool },
    Number(String),
    Str(String),
    Symbol(String),
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lexeme::Word { value, .. } => write!(f, "{}", value),
            Lexeme::Number(n) => write!(f, "{}", n),
            Lexeme::Str(s) => write!(f, "'{}'", s),
            Lexeme::Symbol(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone)]
struct Lexed {
    lexeme: Lexeme,
    pos: ParserPos,
}

/// Splits SQL text into lexemes with their positions, dropping whitespace.
/// Text a token occupies in the source. The tokenizer unescapes doubled
/// quotes, so string literals are re-escaped.
fn source_text(token: &Token) -> String {
    match token {
        Token::SingleQuotedString(s) => format!("'{}'", s.replace('\'', "''")),
        Token::NationalStringLiteral(s) => format!("N'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    }
}

fn lex(sql: &str) -> Result<Vec<Lexed>, MedError> {
    let dialect = GenericDialect {};
    let mut tokenizer = Tokenizer::new(&dialect, sql);
    let tokens = tokenizer
        .tokenize()
        .map_err(|e| MedError::ParseError(format!("{:?}", e)))?;

    let mut out: Vec<Lexed> = Vec::new();
    let (mut line, mut column) = (1, 1);
    for token in tokens {
        let text = source_text(&token);
        let (start_line, start_column) = (line, column);
        let (mut end_line, mut end_column) = (line, column);
        for ch in text.chars() {
            end_line = line;
            end_column = column;
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        let pos = ParserPos::new(start_line, start_column, end_line, end_column);
        let lexeme = match token {
            Token::Whitespace(_) => continue,
            Token::Word(w) => Lexeme::Word {
                value: w.value,
                quoted: w.quote_style.is_some(),
            },
            Token::Number(n) => Lexeme::Number(n),
            Token::SingleQuotedString(s) => Lexeme::Str(s),
            other => match other.to_string().as_str() {
                "!=" => Lexeme::Symbol(String::from("<>")),
                s => Lexeme::Symbol(s.to_string()),
            },
        };

        // Some tokenizers split || into two pipes.
        if lexeme == Lexeme::Symbol(String::from("|")) {
            if let Some(last) = out.last_mut() {
                if last.lexeme == lexeme
                    && last.pos.end_line == pos.line
                    && last.pos.end_column + 1 == pos.column
                {
                    last.lexeme = Lexeme::Symbol(String::from("||"));
                    last.pos = last.pos.plus(pos);
                    continue;
                }
            }
        }
        out.push(Lexed { lexeme, pos });
    }
    Ok(out)
}

/// Item of a select list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`.
    Wildcard,
    Expr { expr: SqlNode, alias: Option<String> },
}

/// `SELECT items FROM object [WHERE selection]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlSelect {
    pub items: Vec<SelectItem>,
    pub from: String,
    pub selection: Option<SqlNode>,
}

impl fmt::Display for SqlSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let items: Vec<String> = self
            .items
            .iter()
            .map(|item| match item {
                SelectItem::Wildcard => String::from("*"),
                SelectItem::Expr { expr, alias: None } => expr.to_string(),
                SelectItem::Expr {
                    expr,
                    alias: Some(a),
                } => format!("{} AS {}", expr, a),
            })
            .collect();
        write!(f, "SELECT {} FROM {}", items.join(", "), self.from)?;
        if let Some(selection) = &self.selection {
            write!(f, " WHERE {}", selection)?;
        }
        Ok(())
    }
}

/// Recursive-descent parser that collects operand/operator runs and hands
/// them to the reducer.
pub struct SqlParser<'a> {
    table: &'a OperatorTable,
    tokens: Vec<Lexed>,
    index: usize,
}

impl<'a> SqlParser<'a> {
    /// Tokenizes `sql` and creates a parser over it.
    ///
    /// # Arguments
    ///
    /// * `sql` - SQL text.
    /// * `table` - Operators the grammar recognises.
    pub fn new(sql: &str, table: &'a OperatorTable) -> Result<Self, MedError> {
        Ok(Self {
            table,
            tokens: lex(sql)?,
            index: 0,
        })
    }

    /// Parses the whole text as one expression.
    pub fn parse_expression(&mut self) -> Result<SqlNode, MedError> {
        let node = self.expression(0)?;
        self.expect_end()?;
        Ok(node)
    }

    /// Parses the whole text as a query.
    pub fn parse_query(&mut self) -> Result<SqlSelect, MedError> {
        self.expect_keyword("SELECT")?;
        let mut items = Vec::new();
        loop {
            if self.consume_symbol("*") {
                items.push(SelectItem::Wildcard);
            } else {
                let expr = self.expression(0)?;
                let alias = self.alias()?;
                items.push(SelectItem::Expr { expr, alias });
            }
            if !self.consume_symbol(",") {
                break;
            }
        }
        self.expect_keyword("FROM")?;
        let from = match self.next() {
            Some(Lexed {
                lexeme: Lexeme::Word { value, .. },
                ..
            }) => value,
            _ => return Err(self.error_before("Expected an object name")),
        };
        let selection = if self.consume_keyword("WHERE") {
            Some(self.expression(0)?)
        } else {
            None
        };
        self.consume_symbol(";");
        self.expect_end()?;
        let select = SqlSelect {
            items,
            from,
            selection,
        };
        debug!("Parsed query: {}", select);
        Ok(select)
    }

    fn peek_at(&self, k: usize) -> Option<&Lexed> {
        self.tokens.get(self.index + k)
    }

    fn next(&mut self) -> Option<Lexed> {
        let lexed = self.tokens.get(self.index).cloned();
        if lexed.is_some() {
            self.index += 1;
        }
        lexed
    }

    fn is_keyword_at(&self, k: usize, keyword: &str) -> bool {
        match self.peek_at(k) {
            Some(Lexed {
                lexeme: Lexeme::Word {
                    value,
                    quoted: false,
                },
                ..
            }) => value.eq_ignore_ascii_case(keyword),
            _ => false,
        }
    }

    fn is_symbol_at(&self, k: usize, symbol: &str) -> bool {
        match self.peek_at(k) {
            Some(Lexed {
                lexeme: Lexeme::Symbol(s),
                ..
            }) => s == symbol,
            _ => false,
        }
    }

    fn consume_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword_at(0, keyword) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn consume_symbol(&mut self, symbol: &str) -> bool {
        if self.is_symbol_at(0, symbol) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), MedError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_here(&format!("Expected {}", keyword)))
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<ParserPos, MedError> {
        match self.peek_at(0) {
            Some(lexed) if lexed.lexeme == Lexeme::Symbol(symbol.to_string()) => {
                let pos = lexed.pos;
                self.index += 1;
                Ok(pos)
            }
            _ => Err(self.error_here(&format!("Expected '{}'", symbol))),
        }
    }

    fn expect_end(&self) -> Result<(), MedError> {
        match self.peek_at(0) {
            None => Ok(()),
            Some(_) => Err(self.error_here("Unexpected")),
        }
    }

    /// Error pointing at the next token, or at the end of the input.
    fn error_here(&self, msg: &str) -> MedError {
        match self.peek_at(0) {
            Some(lexed) => {
                MedError::ParseError(format!("{} '{}' at {}", msg, lexed.lexeme, lexed.pos))
            }
            None => {
                let pos = self.tokens.last().map(|l| l.pos).unwrap_or(ParserPos::ZERO);
                MedError::ParseError(format!(
                    "{}: unexpected end of input at line {}, column {}",
                    msg,
                    pos.end_line,
                    pos.end_column + 1
                ))
            }
        }
    }

    /// Error pointing at the token just consumed.
    fn error_before(&self, msg: &str) -> MedError {
        match self.index.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(lexed) => {
                MedError::ParseError(format!("{} near '{}' at {}", msg, lexed.lexeme, lexed.pos))
            }
            None => self.error_here(msg),
        }
    }

    /// Optional `[AS] alias` after a select item.
    fn alias(&mut self) -> Result<Option<String>, MedError> {
        if self.consume_keyword("AS") {
            return match self.next() {
                Some(Lexed {
                    lexeme: Lexeme::Word { value, .. },
                    ..
                }) => Ok(Some(value)),
                _ => Err(self.error_before("Expected an alias")),
            };
        }
        match self.peek_at(0) {
            Some(Lexed {
                lexeme: Lexeme::Word { value, quoted },
                ..
            }) if *quoted || !is_reserved(value) => {
                let alias = value.clone();
                self.index += 1;
                Ok(Some(alias))
            }
            _ => Ok(None),
        }
    }

    fn lookup(&self, syntax: OperatorSyntax, name: &str) -> Result<SqlOperator, MedError> {
        self.table
            .lookup(syntax, name)
            .cloned()
            .ok_or_else(|| self.error_here(&format!("Unsupported operator {}", name)))
    }

    /// Recognises the operator starting at the next token, if any. Returns the
    /// operator, the number of tokens it spans, and its position.
    fn peek_operator(&self) -> Result<Option<(SqlOperator, usize, ParserPos)>, MedError> {
        let lexed = match self.peek_at(0) {
            Some(lexed) => lexed,
            None => return Ok(None),
        };
        let (syntax, name, len) = match &lexed.lexeme {
            Lexeme::Symbol(s) => match s.as_str() {
                "=" | "<>" | "<" | "<=" | ">" | ">=" | "+" | "-" | "*" | "/" | "||" => {
                    (OperatorSyntax::Binary, s.clone(), 1)
                }
                _ => return Ok(None),
            },
            Lexeme::Word {
                value,
                quoted: false,
            } => match value.to_uppercase().as_str() {
                "AND" | "OR" | "IN" => (OperatorSyntax::Binary, value.to_uppercase(), 1),
                "LIKE" | "ESCAPE" => (OperatorSyntax::Special, value.to_uppercase(), 1),
                "BETWEEN" => {
                    let (name, len) = self.between_name(1, "BETWEEN");
                    (OperatorSyntax::Special, name, len)
                }
                "NOT" => {
                    if self.is_keyword_at(1, "BETWEEN") {
                        let (name, len) = self.between_name(2, "NOT BETWEEN");
                        (OperatorSyntax::Special, name, len)
                    } else if self.is_keyword_at(1, "LIKE") {
                        (OperatorSyntax::Special, String::from("NOT LIKE"), 2)
                    } else if self.is_keyword_at(1, "IN") {
                        (OperatorSyntax::Binary, String::from("NOT IN"), 2)
                    } else {
                        return Ok(None);
                    }
                }
                "IS" => {
                    let negated = self.is_keyword_at(1, "NOT");
                    let k = if negated { 2 } else { 1 };
                    let target = ["NULL", "TRUE", "FALSE"]
                        .iter()
                        .find(|t| self.is_keyword_at(k, t))
                        .ok_or_else(|| self.error_here("Expected NULL, TRUE or FALSE after"))?;
                    let name = if negated {
                        format!("IS NOT {}", target)
                    } else {
                        format!("IS {}", target)
                    };
                    (OperatorSyntax::Postfix, name, k + 1)
                }
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };
        let op = self.lookup(syntax, &name)?;
        let last = self.peek_at(len - 1).map(|l| l.pos).unwrap_or(lexed.pos);
        Ok(Some((op, len, lexed.pos.plus(last))))
    }

    /// Name and token count of a BETWEEN with an optional SYMMETRIC or
    /// ASYMMETRIC qualifier at offset `k`.
    fn between_name(&self, k: usize, base: &str) -> (String, usize) {
        for flag in ["SYMMETRIC", "ASYMMETRIC"].iter() {
            if self.is_keyword_at(k, flag) {
                return (format!("{} {}", base, flag), k + 1);
            }
        }
        (base.to_string(), k)
    }

    /// Parses an expression, collecting operators whose left precedence is at
    /// least `min_prec`.
    fn expression(&mut self, min_prec: u32) -> Result<SqlNode, MedError> {
        let mut list = vec![TreeListItem::Operand(self.expression3()?)];
        let mut pending_between = 0;
        // Right precedence of a LIKE whose pattern may still take an ESCAPE.
        let mut like_right: Option<u32> = None;
        while let Some((op, len, pos)) = self.peek_operator()? {
            match op.kind {
                SqlKind::And if pending_between > 0 => pending_between -= 1,
                SqlKind::Escape if like_right.is_some() => (),
                SqlKind::Escape => break,
                _ if op.left_prec < min_prec => break,
                _ => (),
            }
            like_right = match op.kind {
                SqlKind::Like | SqlKind::NotLike => Some(op.right_prec),
                SqlKind::Escape => None,
                _ => like_right.filter(|r| op.left_prec > *r),
            };
            if op.kind == SqlKind::Between || op.kind == SqlKind::NotBetween {
                pending_between += 1;
            }
            self.index += len;
            list.push(TreeListItem::operator(&op, pos));
            if op.syntax == OperatorSyntax::Postfix {
                continue;
            }
            let operand = match op.kind {
                SqlKind::In | SqlKind::NotIn => self.row()?,
                _ => self.expression3()?,
            };
            list.push(TreeListItem::Operand(operand));
        }
        if pending_between > 0 {
            return Err(self.error_here("BETWEEN requires AND"));
        }
        to_tree(list)
    }

    /// Parenthesised, comma separated list of expressions.
    fn row(&mut self) -> Result<SqlNode, MedError> {
        let open = self.expect_symbol("(")?;
        let mut items = vec![self.expression(0)?];
        while self.consume_symbol(",") {
            items.push(self.expression(0)?);
        }
        let close = self.expect_symbol(")")?;
        Ok(SqlNode::Row {
            items,
            pos: open.plus(close),
        })
    }

    /// A single operand: literal, identifier, function call, parenthesised
    /// expression or row, or a prefix operator applied to an operand.
    fn expression3(&mut self) -> Result<SqlNode, MedError> {
        let lexed = match self.next() {
            Some(lexed) => lexed,
            None => return Err(self.error_here("Expected an expression")),
        };
        let pos = lexed.pos;
        match lexed.lexeme {
            Lexeme::Number(n) => {
                let d = BigDecimal::from_str(&n)
                    .map_err(|_| self.error_before(&format!("Invalid number {}", n)))?;
                Ok(SqlNode::literal(SqlLiteral::Numeric(d), pos))
            }
            Lexeme::Str(s) => Ok(SqlNode::literal(SqlLiteral::String(s), pos)),
            Lexeme::Symbol(s) if s == "(" => {
                let first = self.expression(0)?;
                if self.is_symbol_at(0, ",") {
                    let mut items = vec![first];
                    while self.consume_symbol(",") {
                        items.push(self.expression(0)?);
                    }
                    let close = self.expect_symbol(")")?;
                    return Ok(SqlNode::Row {
                        items,
                        pos: pos.plus(close),
                    });
                }
                self.expect_symbol(")")?;
                Ok(first)
            }
            Lexeme::Symbol(s) if s == "-" || s == "+" => {
                let op = self.lookup(OperatorSyntax::Prefix, &s)?;
                let operand = self.expression3()?;
                let call_pos = pos.plus(operand.pos());
                match (op.kind, operand) {
                    (
                        SqlKind::MinusPrefix,
                        SqlNode::Literal {
                            value: SqlLiteral::Numeric(d),
                            ..
                        },
                    ) => Ok(SqlNode::literal(SqlLiteral::Numeric(-d), call_pos)),
                    (
                        SqlKind::PlusPrefix,
                        lit @ SqlNode::Literal {
                            value: SqlLiteral::Numeric(_),
                            ..
                        },
                    ) => Ok(lit.with_pos(call_pos)),
                    (_, operand) => Ok(op.create_call(vec![operand], call_pos)),
                }
            }
            Lexeme::Word {
                value,
                quoted: false,
            } => self.word(value, pos),
            Lexeme::Word {
                value,
                quoted: true,
            } => self.identifier(value, pos),
            other => Err(self.error_before(&format!("Unexpected {}", other))),
        }
    }

    /// Operand starting with an unquoted word.
    fn word(&mut self, value: String, pos: ParserPos) -> Result<SqlNode, MedError> {
        let upper = value.to_uppercase();
        match upper.as_str() {
            "NOT" => {
                let op = self.lookup(OperatorSyntax::Prefix, "NOT")?;
                let operand = self.expression(op.right_prec)?;
                let call_pos = pos.plus(operand.pos());
                Ok(op.create_call(vec![operand], call_pos))
            }
            "NULL" => Ok(SqlNode::literal(SqlLiteral::Null, pos)),
            "TRUE" => Ok(SqlNode::literal(SqlLiteral::Boolean(true), pos)),
            "FALSE" => Ok(SqlNode::literal(SqlLiteral::Boolean(false), pos)),
            "DATE" | "TIMESTAMP" => match self.peek_at(0).cloned() {
                Some(Lexed {
                    lexeme: Lexeme::Str(text),
                    pos: text_pos,
                }) => {
                    self.index += 1;
                    let literal = if upper == "DATE" {
                        NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                            .ok()
                            .map(SqlLiteral::Date)
                    } else {
                        parse_timestamp(&text).map(SqlLiteral::Timestamp)
                    };
                    match literal {
                        Some(literal) => Ok(SqlNode::literal(literal, pos.plus(text_pos))),
                        None => Err(self.error_before(&format!("Invalid {} literal", upper))),
                    }
                }
                _ => self.identifier(value, pos),
            },
            _ if is_reserved(&upper) => Err(self.error_before(&format!("Unexpected {}", upper))),
            _ => self.identifier(value, pos),
        }
    }

    /// Compound identifier, or a function call when followed by a parenthesis.
    fn identifier(&mut self, first: String, pos: ParserPos) -> Result<SqlNode, MedError> {
        let mut names = vec![first];
        let mut end = pos;
        while self.is_symbol_at(0, ".") {
            match self.peek_at(1).cloned() {
                Some(Lexed {
                    lexeme: Lexeme::Word { value, .. },
                    pos: name_pos,
                }) => {
                    self.index += 2;
                    names.push(value);
                    end = name_pos;
                }
                _ => {
                    self.index += 1;
                    return Err(self.error_here("Expected an identifier after '.'"));
                }
            }
        }
        if names.len() == 1 && self.is_symbol_at(0, "(") {
            self.index += 1;
            let mut args = Vec::new();
            if !self.is_symbol_at(0, ")") {
                args.push(self.expression(0)?);
                while self.consume_symbol(",") {
                    args.push(self.expression(0)?);
                }
            }
            let close = self.expect_symbol(")")?;
            return Ok(SqlNode::Function {
                name: names.remove(0).to_uppercase(),
                args,
                pos: pos.plus(close),
            });
        }
        Ok(SqlNode::Identifier {
            names,
            pos: pos.plus(end),
        })
    }
}

fn is_reserved(word: &str) -> bool {
    let upper = word.to_uppercase();
    RESERVED.iter().any(|r| *r == upper)
}

/// Parses an expression with the standard operator table.
///
/// # Arguments
///
/// * `sql` - Expression text, e.g. `a BETWEEN 1 AND 2 OR b IS NULL`.
pub fn parse_expression(sql: &str) -> Result<SqlNode, MedError> {
    let table = OperatorTable::standard();
    SqlParser::new(sql, &table)?.parse_expression()
}

/// Parses a query with the standard operator table.
///
/// # Arguments
///
/// * `sql` - Query text, e.g. `SELECT Id FROM Account WHERE Name = 'Acme'`.
pub fn parse_query(sql: &str) -> Result<SqlSelect, MedError> {
    let table = OperatorTable::standard();
    SqlParser::new(sql, &table)?.parse_query()
}
