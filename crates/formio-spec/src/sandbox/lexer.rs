use crate::sandbox::ScriptError;

/// Punctuators, longest first so greedy matching picks `===` before `==`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "??", "?.", "+=", "-=", "(", ")", "[",
    "]", "{", "}", ",", ";", ".", "?", ":", "=", "<", ">", "+", "-", "*", "/", "%", "!",
];

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, ScriptError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let (offset, ch) = chars[index];

        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        if ch == '/' && peek(&chars, index + 1) == Some('/') {
            while index < chars.len() && chars[index].1 != '\n' {
                index += 1;
            }
            continue;
        }

        if ch == '/' && peek(&chars, index + 1) == Some('*') {
            index += 2;
            loop {
                if index >= chars.len() {
                    return Err(ScriptError::syntax(offset, "unterminated comment"));
                }
                if chars[index].1 == '*' && peek(&chars, index + 1) == Some('/') {
                    index += 2;
                    break;
                }
                index += 1;
            }
            continue;
        }

        if ch.is_ascii_digit()
            || (ch == '.' && peek(&chars, index + 1).is_some_and(|next| next.is_ascii_digit()))
        {
            let (number, next) = read_number(&chars, index, offset)?;
            tokens.push(Token {
                kind: TokenKind::Number(number),
                offset,
            });
            index = next;
            continue;
        }

        if ch == '"' || ch == '\'' {
            let (text, next) = read_string(&chars, index, offset)?;
            tokens.push(Token {
                kind: TokenKind::Str(text),
                offset,
            });
            index = next;
            continue;
        }

        if is_ident_start(ch) {
            let start = index;
            while index < chars.len() && is_ident_part(chars[index].1) {
                index += 1;
            }
            let name: String = chars[start..index].iter().map(|(_, ch)| ch).collect();
            tokens.push(Token {
                kind: TokenKind::Ident(name),
                offset,
            });
            continue;
        }

        match match_punct(&chars, index) {
            Some(punct) => {
                // `a?.5:1` is a conditional, not optional chaining.
                if punct == "?."
                    && peek(&chars, index + 2).is_some_and(|next| next.is_ascii_digit())
                {
                    tokens.push(Token {
                        kind: TokenKind::Punct("?"),
                        offset,
                    });
                    index += 1;
                } else {
                    tokens.push(Token {
                        kind: TokenKind::Punct(punct),
                        offset,
                    });
                    index += punct.chars().count();
                }
            }
            None => {
                return Err(ScriptError::syntax(
                    offset,
                    format!("unexpected character '{}'", ch),
                ));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: source.len(),
    });
    Ok(tokens)
}

fn peek(chars: &[(usize, char)], index: usize) -> Option<char> {
    chars.get(index).map(|(_, ch)| *ch)
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '$'
}

fn match_punct(chars: &[(usize, char)], index: usize) -> Option<&'static str> {
    PUNCTUATORS.iter().copied().find(|punct| {
        punct
            .chars()
            .enumerate()
            .all(|(step, expected)| peek(chars, index + step) == Some(expected))
    })
}

fn read_number(
    chars: &[(usize, char)],
    start: usize,
    offset: usize,
) -> Result<(f64, usize), ScriptError> {
    let mut index = start;
    let mut text = String::new();
    while let Some(ch) = peek(chars, index) {
        if ch.is_ascii_digit() || ch == '.' {
            text.push(ch);
            index += 1;
        } else if (ch == 'e' || ch == 'E')
            && peek(chars, index + 1)
                .is_some_and(|next| next.is_ascii_digit() || next == '+' || next == '-')
        {
            text.push(ch);
            index += 1;
            if let Some(sign) = peek(chars, index).filter(|next| *next == '+' || *next == '-') {
                text.push(sign);
                index += 1;
            }
        } else {
            break;
        }
    }
    if peek(chars, index).is_some_and(is_ident_start) {
        return Err(ScriptError::syntax(offset, "identifier directly after number"));
    }
    text.parse::<f64>()
        .map(|number| (number, index))
        .map_err(|_| ScriptError::syntax(offset, format!("invalid number '{}'", text)))
}

fn read_string(
    chars: &[(usize, char)],
    start: usize,
    offset: usize,
) -> Result<(String, usize), ScriptError> {
    let quote = chars[start].1;
    let mut index = start + 1;
    let mut text = String::new();
    loop {
        let Some(ch) = peek(chars, index) else {
            return Err(ScriptError::syntax(offset, "unterminated string"));
        };
        index += 1;
        if ch == quote {
            return Ok((text, index));
        }
        if ch == '\n' {
            return Err(ScriptError::syntax(offset, "unterminated string"));
        }
        if ch != '\\' {
            text.push(ch);
            continue;
        }
        let Some(escaped) = peek(chars, index) else {
            return Err(ScriptError::syntax(offset, "unterminated string"));
        };
        index += 1;
        match escaped {
            'n' => text.push('\n'),
            't' => text.push('\t'),
            'r' => text.push('\r'),
            '0' => text.push('\0'),
            'u' => {
                let hex: String = (0..4).filter_map(|step| peek(chars, index + step)).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| ScriptError::syntax(offset, "invalid unicode escape"))?;
                text.push(code);
                index += 4;
            }
            other => text.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn strict_equality_wins_over_loose() {
        assert_eq!(
            kinds("a === 'x'"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("==="),
                TokenKind::Str("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("// note\n1 /* inline */ + 2.5e1"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Punct("+"),
                TokenKind::Number(25.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn escapes_are_decoded() {
        assert_eq!(
            kinds(r#""a\"b\u0041""#),
            vec![TokenKind::Str("a\"bA".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn ternary_with_decimal_is_not_optional_chaining() {
        assert_eq!(
            kinds("a?.5:1"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("?"),
                TokenKind::Number(0.5),
                TokenKind::Punct(":"),
                TokenKind::Number(1.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        assert!(matches!(
            tokenize("'open"),
            Err(ScriptError::Syntax { offset: 0, .. })
        ));
    }
}
