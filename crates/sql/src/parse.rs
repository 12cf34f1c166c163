// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use sqltxt_planner::{ConditionToken, RelationDescriptor, SelectStatement};

use crate::{
	Error,
	token::{Keyword, Token},
};

pub(crate) struct Parser {
	tokens: Vec<Token>,
	pos: usize,
}

impl Parser {
	pub(crate) fn new(tokens: Vec<Token>) -> Self {
		Self {
			tokens,
			pos: 0,
		}
	}

	fn peek(&self) -> Option<&Token> {
		self.tokens.get(self.pos)
	}

	fn advance(&mut self) -> Option<Token> {
		let token = self.tokens.get(self.pos).cloned();
		if token.is_some() {
			self.pos += 1;
		}
		token
	}

	fn at_keyword(&self, keyword: Keyword) -> bool {
		self.peek() == Some(&Token::Keyword(keyword))
	}

	fn eat_keyword(&mut self, keyword: Keyword) -> bool {
		if self.at_keyword(keyword) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn eat(&mut self, token: &Token) -> bool {
		if self.peek() == Some(token) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), Error> {
		if self.eat_keyword(keyword) {
			Ok(())
		} else {
			Err(self.unexpected(&format!("{keyword:?}").to_uppercase()))
		}
	}

	fn expect(&mut self, token: Token, what: &str) -> Result<(), Error> {
		if self.eat(&token) {
			Ok(())
		} else {
			Err(self.unexpected(what))
		}
	}

	fn unexpected(&self, expected: &str) -> Error {
		match self.peek() {
			Some(token) => Error::Syntax(format!("expected {expected}, found {token:?}")),
			None => Error::Syntax(format!("expected {expected}, found end of input")),
		}
	}

	pub(crate) fn parse_select(&mut self) -> Result<SelectStatement, Error> {
		self.expect_keyword(Keyword::Select)?;
		let columns = self.parse_items()?;

		self.expect_keyword(Keyword::From)?;
		let mut relations = vec![self.parse_relation()?];
		let mut groups = Vec::new();
		loop {
			if self.eat(&Token::Comma) {
				relations.push(self.parse_relation()?);
				continue;
			}
			if self.at_keyword(Keyword::Left) || self.at_keyword(Keyword::Right) || self.at_keyword(Keyword::Full)
			{
				return Err(Error::Syntax("outer joins are not supported".into()));
			}
			let inner = self.eat_keyword(Keyword::Inner);
			if inner || self.at_keyword(Keyword::Join) {
				self.expect_keyword(Keyword::Join)?;
				relations.push(self.parse_relation()?);
				self.expect_keyword(Keyword::On)?;
				groups.push(self.parse_condition()?);
				continue;
			}
			break;
		}

		if self.eat_keyword(Keyword::Where) {
			groups.push(self.parse_condition()?);
		}

		let sample = if self.eat_keyword(Keyword::Tablesample) {
			self.expect(Token::OpenParen, "'('")?;
			let size = match self.advance() {
				Some(Token::Integer(n)) if n >= 0 => n as usize,
				Some(token) => {
					return Err(Error::Syntax(format!(
						"TABLESAMPLE expects a non-negative row count, found {token:?}"
					)));
				}
				None => return Err(self.unexpected("a row count")),
			};
			self.expect(Token::CloseParen, "')'")?;
			Some(size)
		} else {
			None
		};

		self.eat(&Token::Semicolon);
		if let Some(token) = self.peek() {
			return Err(Error::Syntax(format!("unexpected {token:?} after end of statement")));
		}

		Ok(SelectStatement {
			columns,
			relations,
			conditions: combine(groups),
			sample,
		})
	}

	fn parse_items(&mut self) -> Result<Vec<String>, Error> {
		let mut items = vec![self.parse_item()?];
		while self.eat(&Token::Comma) {
			items.push(self.parse_item()?);
		}
		Ok(items)
	}

	fn parse_item(&mut self) -> Result<String, Error> {
		match self.advance() {
			Some(Token::Asterisk) => Ok("*".into()),
			Some(Token::Ident(name)) => Ok(name),
			Some(Token::Keyword(Keyword::Count)) => {
				self.expect(Token::OpenParen, "'(' after COUNT")?;
				let argument = match self.advance() {
					Some(Token::Asterisk) => "*".to_string(),
					Some(Token::Ident(name)) => name,
					Some(token) => {
						return Err(Error::Syntax(format!("COUNT expects '*' or a column, found {token:?}")));
					}
					None => return Err(self.unexpected("'*' or a column")),
				};
				self.expect(Token::CloseParen, "')' after COUNT argument")?;
				Ok(format!("count({argument})"))
			}
			Some(token) => Err(Error::Syntax(format!("expected a select item, found {token:?}"))),
			None => Err(self.unexpected("a select item")),
		}
	}

	fn parse_relation(&mut self) -> Result<RelationDescriptor, Error> {
		let path = match self.advance() {
			Some(Token::Ident(path)) | Some(Token::StringLit(path)) => path,
			Some(token) => return Err(Error::Syntax(format!("expected a relation path, found {token:?}"))),
			None => return Err(self.unexpected("a relation path")),
		};
		let relation = RelationDescriptor::new(path);

		if self.eat_keyword(Keyword::As) {
			return match self.advance() {
				Some(Token::Ident(alias)) => Ok(relation.with_alias(alias)),
				Some(token) => Err(Error::Syntax(format!("expected an alias after AS, found {token:?}"))),
				None => Err(self.unexpected("an alias after AS")),
			};
		}
		if let Some(Token::Ident(alias)) = self.peek() {
			let alias = alias.clone();
			self.pos += 1;
			return Ok(relation.with_alias(alias));
		}
		Ok(relation)
	}

	fn parse_condition(&mut self) -> Result<Vec<ConditionToken>, Error> {
		let mut tokens = vec![self.parse_term()?];
		loop {
			if self.eat_keyword(Keyword::And) {
				tokens.push(ConditionToken::And);
			} else if self.eat_keyword(Keyword::Or) {
				tokens.push(ConditionToken::Or);
			} else {
				break;
			}
			tokens.push(self.parse_term()?);
		}
		Ok(tokens)
	}

	fn parse_term(&mut self) -> Result<ConditionToken, Error> {
		if self.eat(&Token::OpenParen) {
			let group = self.parse_condition()?;
			self.expect(Token::CloseParen, "')'")?;
			return Ok(ConditionToken::Group(group));
		}
		if self.at_keyword(Keyword::Not) {
			return Err(Error::Syntax("NOT is not supported, negate the comparison instead".into()));
		}
		let left = self.parse_operand()?;
		let operator = match self.advance() {
			Some(Token::Eq) => "=",
			Some(Token::NotEq) => "!=",
			Some(Token::Lt) => "<",
			Some(Token::LtEq) => "<=",
			Some(Token::Gt) => ">",
			Some(Token::GtEq) => ">=",
			Some(Token::Ident(word)) => match word.to_ascii_lowercase().as_str() {
				"eq" => "=",
				"ne" => "!=",
				"lt" => "<",
				"le" => "<=",
				"gt" => ">",
				"ge" => ">=",
				_ => return Err(Error::Syntax(format!("expected a comparison operator, found '{word}'"))),
			},
			Some(token) => {
				return Err(Error::Syntax(format!("expected a comparison operator, found {token:?}")));
			}
			None => return Err(self.unexpected("a comparison operator")),
		};
		let right = self.parse_operand()?;
		Ok(ConditionToken::atom(left, operator, right))
	}

	/// Operands keep their source spelling. String literals stay quoted so
	/// the planner can tell them from column names.
	fn parse_operand(&mut self) -> Result<String, Error> {
		match self.advance() {
			Some(Token::Ident(name)) => Ok(name),
			Some(Token::Integer(n)) => Ok(n.to_string()),
			Some(Token::Float(f)) => Ok(f.to_string()),
			Some(Token::StringLit(s)) => Ok(format!("'{}'", s.replace('\'', "''"))),
			Some(token) => Err(Error::Syntax(format!("expected a column or literal, found {token:?}"))),
			None => Err(self.unexpected("a column or literal")),
		}
	}
}

/// Joins ON and WHERE conditions with `and`, each in its own group.
fn combine(groups: Vec<Vec<ConditionToken>>) -> Vec<ConditionToken> {
	if groups.len() == 1 {
		return groups.into_iter().flatten().collect();
	}
	let mut tokens = Vec::new();
	for group in groups {
		if !tokens.is_empty() {
			tokens.push(ConditionToken::And);
		}
		tokens.push(ConditionToken::Group(group));
	}
	tokens
}
