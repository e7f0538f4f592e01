/// Represents the different kinds of tokens that the lexer can produce.
/// Each token is a meaningful unit of the HOCON syntax.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    // == Special Tokens ==
    /// Represents the end of the input file.
    Eof,
    /// A run of whitespace that does not contain a line break. It is kept
    /// because whitespace between juxtaposed values is part of the value.
    Whitespace,
    /// A single line break. Newlines separate object members and array elements.
    Newline,
    /// A comment, starting with `#` or `//` and continuing to the end of the line.
    /// The associated `String` contains the content of the comment.
    Comment(String),
    /// Represents a token that could not be recognized by the lexer.
    Unknown,

    // == Literals ==
    /// A string in double quotes (escapes processed) or triple quotes (raw).
    QuotedString(String),
    /// Unquoted text such as `localhost`, `10s`, `1.5` or a dotted key `a.b.c`.
    Unquoted(String),
    /// A substitution `${path}` or `${?path}`. The path text is kept raw,
    /// quotes included, for the path tokenizer.
    Substitution { path: String, optional: bool },

    // == Punctuation ==
    /// Left Brace: `{`
    LBrace,
    /// Right Brace: `}`
    RBrace,
    /// Left Bracket: `[`
    LBracket,
    /// Right Bracket: `]`
    RBracket,
    /// Comma: `,`
    Comma,
    /// Colon: `:`
    Colon,
    /// Equals: `=`
    Equals,
}

/// A token with its type and position
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    pub pos_start: usize,
    pub pos_end: usize,
}

impl Token {
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
        }
    }
}

/// Whether `c` may appear in an unquoted string.
pub(crate) fn is_unquoted_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '$' | '"' | '{' | '}' | '[' | ']' | ':' | '=' | ',' | '+' | '#' | '`' | '^' | '?'
                | '!' | '@' | '*' | '&' | '\\'
        )
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
        }
    }

    pub fn lex(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token.ttype == TokenType::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        tokens
    }

    pub fn next_token(&mut self) -> Token {
        let start_pos = self.position;

        let ttype = if let Some(char) = self.advance() {
            match char {
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                ',' => TokenType::Comma,
                ':' => TokenType::Colon,
                '=' => TokenType::Equals,
                '\n' => TokenType::Newline,
                '#' => self.read_comment(),
                '/' if self.peek() == Some(&'/') => {
                    self.advance(); // Consume the second '/'
                    self.read_comment()
                }
                '$' => {
                    if self.peek() == Some(&'{') {
                        self.advance();
                        self.read_substitution()
                    } else {
                        TokenType::Unknown
                    }
                }
                '"' => {
                    if self.rest().starts_with("\"\"") {
                        self.advance();
                        self.advance();
                        self.read_triple_quoted()
                    } else {
                        self.read_string()
                    }
                }
                c if c.is_whitespace() => self.read_whitespace(),
                c if is_unquoted_char(c) => self.read_unquoted(c),
                _ => TokenType::Unknown,
            }
        } else {
            TokenType::Eof
        };

        Token::new(ttype, start_pos, self.position)
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
        }
        char
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    fn read_whitespace(&mut self) -> TokenType {
        while let Some(c) = self.peek() {
            if c.is_whitespace() && *c != '\n' {
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Whitespace
    }

    fn read_comment(&mut self) -> TokenType {
        let mut comment_text = String::new();
        while let Some(&c) = self.peek() {
            if c == '\n' {
                break;
            }
            comment_text.push(c);
            self.advance();
        }
        TokenType::Comment(comment_text.trim().to_string())
    }

    fn read_string(&mut self) -> TokenType {
        let mut value = String::new();
        while let Some(c) = self.advance() {
            match c {
                '"' => return TokenType::QuotedString(value),
                '\n' => return TokenType::Unknown, // Line break inside a quoted string
                '\\' => {
                    let Some(escaped_char) = self.advance() else {
                        return TokenType::Unknown; // Unclosed escape sequence
                    };
                    match escaped_char {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        '/' => value.push('/'),
                        'b' => value.push('\u{0008}'),
                        'f' => value.push('\u{000C}'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'u' => match self.read_unicode_escape() {
                            Some(decoded) => value.push(decoded),
                            None => return TokenType::Unknown,
                        },
                        _ => return TokenType::Unknown,
                    }
                }
                c => value.push(c),
            }
        }
        TokenType::Unknown // Unclosed string
    }

    fn read_unicode_escape(&mut self) -> Option<char> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self.advance()?.to_digit(16)?;
            code = code * 16 + digit;
        }
        char::from_u32(code)
    }

    /// Reads a `"""` string. Quotes directly before the closing `"""` belong
    /// to the content.
    fn read_triple_quoted(&mut self) -> TokenType {
        let rest = self.rest();
        let Some(mut end) = rest.find("\"\"\"") else {
            while self.advance().is_some() {}
            return TokenType::Unknown; // Unclosed string
        };
        while rest[end + 3..].starts_with('"') {
            end += 1;
        }
        let value = rest[..end].to_string();
        let target = self.position + end + 3;
        while self.position < target {
            self.advance();
        }
        TokenType::QuotedString(value)
    }

    fn read_substitution(&mut self) -> TokenType {
        let optional = if self.peek() == Some(&'?') {
            self.advance();
            true
        } else {
            false
        };

        let mut path = String::new();
        let mut in_quotes = false;
        while let Some(c) = self.advance() {
            match c {
                '}' if !in_quotes => return TokenType::Substitution { path, optional },
                '\n' => return TokenType::Unknown,
                '"' => {
                    in_quotes = !in_quotes;
                    path.push(c);
                }
                c => path.push(c),
            }
        }
        TokenType::Unknown // Unclosed substitution
    }

    fn read_unquoted(&mut self, first_char: char) -> TokenType {
        let mut text = String::new();
        text.push(first_char);

        while let Some(&c) = self.peek() {
            if !is_unquoted_char(c) || (c == '/' && self.rest().starts_with("//")) {
                break;
            }
            text.push(c);
            self.advance();
        }

        TokenType::Unquoted(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tokens(input: &str, expected: Vec<TokenType>) {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.lex();
        let token_types: Vec<TokenType> = tokens.into_iter().map(|t| t.ttype).collect();

        // Filter out whitespace and comments for most tests
        let filtered_tokens: Vec<TokenType> = token_types
            .into_iter()
            .filter(|t| !matches!(t, TokenType::Whitespace | TokenType::Comment(_)))
            .collect();

        assert_eq!(filtered_tokens, expected);
    }

    fn unquoted(text: &str) -> TokenType {
        TokenType::Unquoted(text.to_string())
    }

    #[test]
    fn test_eof() {
        assert_tokens("", vec![TokenType::Eof]);
    }

    #[test]
    fn test_single_char_tokens() {
        let input = "{}[],:=";
        let expected = vec![
            TokenType::LBrace,
            TokenType::RBrace,
            TokenType::LBracket,
            TokenType::RBracket,
            TokenType::Comma,
            TokenType::Colon,
            TokenType::Equals,
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_unquoted_text() {
        let input = "foo a.b.c 10s -1.5 true";
        let expected = vec![
            unquoted("foo"),
            unquoted("a.b.c"),
            unquoted("10s"),
            unquoted("-1.5"),
            unquoted("true"),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_unquoted_stops_at_comment() {
        let input = "value// trailing";
        let expected = vec![unquoted("value"), TokenType::Eof];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_strings() {
        let input = r#""hello world" "" "another""#;
        let expected = vec![
            TokenType::QuotedString("hello world".to_string()),
            TokenType::QuotedString("".to_string()),
            TokenType::QuotedString("another".to_string()),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_strings_with_escapes() {
        let input = r#""say \"hi\"\t\u0041\\""#;
        let expected = vec![
            TokenType::QuotedString("say \"hi\"\tA\\".to_string()),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_triple_quoted_string_is_raw() {
        let input = "\"\"\"line one\n\"quoted\" \\n\"\"\"\"";
        let expected = vec![
            TokenType::QuotedString("line one\n\"quoted\" \\n\"".to_string()),
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_unclosed_string_is_unknown() {
        assert_tokens(r#""open"#, vec![TokenType::Unknown, TokenType::Eof]);
    }

    #[test]
    fn test_substitutions() {
        let input = r#"${a.b} ${?"x.y".z}"#;
        let expected = vec![
            TokenType::Substitution {
                path: "a.b".to_string(),
                optional: false,
            },
            TokenType::Substitution {
                path: r#""x.y".z"#.to_string(),
                optional: true,
            },
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }

    #[test]
    fn test_comments_whitespace_and_newlines() {
        let input = " # this is a comment\n key = value // another one";
        let mut lexer = Lexer::new(input);
        let tokens = lexer.lex();
        let token_types: Vec<TokenType> = tokens.into_iter().map(|t| t.ttype).collect();

        let expected = vec![
            TokenType::Whitespace,
            TokenType::Comment("this is a comment".to_string()),
            TokenType::Newline,
            TokenType::Whitespace,
            unquoted("key"),
            TokenType::Whitespace,
            TokenType::Equals,
            TokenType::Whitespace,
            unquoted("value"),
            TokenType::Whitespace,
            TokenType::Comment("another one".to_string()),
            TokenType::Eof,
        ];

        assert_eq!(token_types, expected);
    }

    #[test]
    fn test_token_positions() {
        let mut lexer = Lexer::new("ab = \"c\"");
        let tokens = lexer.lex();
        assert_eq!((tokens[0].pos_start, tokens[0].pos_end), (0, 2));
        assert_eq!((tokens[4].pos_start, tokens[4].pos_end), (5, 8));
    }

    #[test]
    fn test_complex_hocon_structure() {
        let input = r#"
app {
    name = "My App"
    port: 8080,
    path = ${base}"/bin"
    tags = [a, b]
}
"#;
        let expected = vec![
            TokenType::Newline,
            unquoted("app"),
            TokenType::LBrace,
            TokenType::Newline,
            unquoted("name"),
            TokenType::Equals,
            TokenType::QuotedString("My App".to_string()),
            TokenType::Newline,
            unquoted("port"),
            TokenType::Colon,
            unquoted("8080"),
            TokenType::Comma,
            TokenType::Newline,
            unquoted("path"),
            TokenType::Equals,
            TokenType::Substitution {
                path: "base".to_string(),
                optional: false,
            },
            TokenType::QuotedString("/bin".to_string()),
            TokenType::Newline,
            unquoted("tags"),
            TokenType::Equals,
            TokenType::LBracket,
            unquoted("a"),
            TokenType::Comma,
            unquoted("b"),
            TokenType::RBracket,
            TokenType::Newline,
            TokenType::RBrace,
            TokenType::Newline,
            TokenType::Eof,
        ];
        assert_tokens(input, expected);
    }
}
