// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 ReifyDB

use crate::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
	// Keywords
	Keyword(Keyword),
	// Names: columns, relation paths and aliases, `q.*`
	Ident(String),
	// Literals
	Integer(i64),
	Float(f64),
	StringLit(String),
	// Operators & punctuation
	Asterisk,   // *
	Comma,      // ,
	Semicolon,  // ;
	OpenParen,  // (
	CloseParen, // )
	Eq,         // = or ==
	NotEq,      // <> or !=
	Lt,         // <
	Gt,         // >
	LtEq,       // <=
	GtEq,       // >=
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Keyword {
	Select,
	From,
	Where,
	And,
	Or,
	Not,
	As,
	Join,
	Inner,
	Left,
	Right,
	Full,
	Outer,
	On,
	Count,
	Tablesample,
}

impl Keyword {
	fn from_word(word: &str) -> Option<Self> {
		let keyword = match word.to_ascii_uppercase().as_str() {
			"SELECT" => Keyword::Select,
			"FROM" => Keyword::From,
			"WHERE" => Keyword::Where,
			"AND" => Keyword::And,
			"OR" => Keyword::Or,
			"NOT" => Keyword::Not,
			"AS" => Keyword::As,
			"JOIN" => Keyword::Join,
			"INNER" => Keyword::Inner,
			"LEFT" => Keyword::Left,
			"RIGHT" => Keyword::Right,
			"FULL" => Keyword::Full,
			"OUTER" => Keyword::Outer,
			"ON" => Keyword::On,
			"COUNT" => Keyword::Count,
			"TABLESAMPLE" => Keyword::Tablesample,
			_ => return None,
		};
		Some(keyword)
	}
}

/// A character that may start a bare name. Paths may start with `.`, `/`
/// or `~`.
fn starts_word(c: char) -> bool {
	c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '/' | '~')
}

fn continues_word(c: char) -> bool {
	c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-')
}

pub fn tokenize(sql: &str) -> Result<Vec<Token>, Error> {
	let mut tokens = Vec::new();
	let chars: Vec<char> = sql.chars().collect();
	let len = chars.len();
	let mut i = 0;

	while i < len {
		let c = chars[i];

		// Skip whitespace
		if c.is_ascii_whitespace() {
			i += 1;
			continue;
		}

		// Skip line comments (-- ...)
		if c == '-' && i + 1 < len && chars[i + 1] == '-' {
			while i < len && chars[i] != '\n' {
				i += 1;
			}
			continue;
		}

		// Operators and punctuation
		match c {
			'*' => {
				tokens.push(Token::Asterisk);
				i += 1;
				continue;
			}
			',' => {
				tokens.push(Token::Comma);
				i += 1;
				continue;
			}
			';' => {
				tokens.push(Token::Semicolon);
				i += 1;
				continue;
			}
			'(' => {
				tokens.push(Token::OpenParen);
				i += 1;
				continue;
			}
			')' => {
				tokens.push(Token::CloseParen);
				i += 1;
				continue;
			}
			'=' => {
				tokens.push(Token::Eq);
				i += if i + 1 < len && chars[i + 1] == '=' { 2 } else { 1 };
				continue;
			}
			'<' => {
				if i + 1 < len && chars[i + 1] == '=' {
					tokens.push(Token::LtEq);
					i += 2;
				} else if i + 1 < len && chars[i + 1] == '>' {
					tokens.push(Token::NotEq);
					i += 2;
				} else {
					tokens.push(Token::Lt);
					i += 1;
				}
				continue;
			}
			'>' => {
				if i + 1 < len && chars[i + 1] == '=' {
					tokens.push(Token::GtEq);
					i += 2;
				} else {
					tokens.push(Token::Gt);
					i += 1;
				}
				continue;
			}
			'!' => {
				if i + 1 < len && chars[i + 1] == '=' {
					tokens.push(Token::NotEq);
					i += 2;
					continue;
				}
				return Err(Error::Syntax(format!("unexpected character '!' at position {i}")));
			}
			_ => {}
		}

		// String literals
		if c == '\'' {
			i += 1;
			let mut s = String::new();
			while i < len {
				if chars[i] == '\'' {
					// Check for escaped single quote ''
					if i + 1 < len && chars[i + 1] == '\'' {
						s.push('\'');
						i += 2;
					} else {
						break;
					}
				} else {
					s.push(chars[i]);
					i += 1;
				}
			}
			if i >= len {
				return Err(Error::Syntax("unterminated string literal".into()));
			}
			i += 1; // skip closing quote
			tokens.push(Token::StringLit(s));
			continue;
		}

		// Quoted names
		if c == '"' {
			let start = i + 1;
			i = start;
			while i < len && chars[i] != '"' {
				i += 1;
			}
			if i >= len {
				return Err(Error::Syntax("unterminated quoted name".into()));
			}
			tokens.push(Token::Ident(chars[start..i].iter().collect()));
			i += 1;
			continue;
		}

		// Numeric literals, optionally negative
		let negative = c == '-' && i + 1 < len && chars[i + 1].is_ascii_digit();
		if c.is_ascii_digit() || negative {
			let start = i;
			if negative {
				i += 1;
			}
			while i < len && chars[i].is_ascii_digit() {
				i += 1;
			}
			if i < len && chars[i] == '.' && i + 1 < len && chars[i + 1].is_ascii_digit() {
				i += 1; // skip dot
				while i < len && chars[i].is_ascii_digit() {
					i += 1;
				}
				let text: String = chars[start..i].iter().collect();
				let f: f64 = text.parse().map_err(|e| Error::Syntax(format!("invalid float: {e}")))?;
				tokens.push(Token::Float(f));
			} else {
				let text: String = chars[start..i].iter().collect();
				let n: i64 = text.parse().map_err(|e| Error::Syntax(format!("invalid integer: {e}")))?;
				tokens.push(Token::Integer(n));
			}
			continue;
		}

		// Names and keywords. A name may be a path (`data/a.csv`), a
		// qualified column (`a.csv.col_a`) or a qualified wildcard (`ta.*`).
		if starts_word(c) {
			let start = i;
			while i < len && continues_word(chars[i]) {
				i += 1;
			}
			if chars[i - 1] == '.' && i < len && chars[i] == '*' {
				i += 1;
			}
			let word: String = chars[start..i].iter().collect();
			let token = match Keyword::from_word(&word) {
				Some(keyword) => Token::Keyword(keyword),
				None => Token::Ident(word),
			};
			tokens.push(token);
			continue;
		}

		return Err(Error::Syntax(format!("unexpected character '{c}' at position {i}")));
	}

	Ok(tokens)
}
