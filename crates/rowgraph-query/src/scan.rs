//! A minimal lexical scan of SQL text.
//!
//! This is not a parser. It splits text into words and punctuation while
//! tracking parenthesis depth, so callers can find clause keywords that sit
//! at the top level of a statement. Quoted strings, quoted identifiers and
//! comments are skipped as opaque runs.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Word,
    Open,
    Close,
    Comma,
    Quoted,
    Symbol,
}

/// A token and its byte range in the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// Parenthesis depth the token sits at. Both parentheses of a pair report
    /// the outer depth.
    pub depth: usize,
}

impl Token {
    pub fn text<'s>(&self, sql: &'s str) -> &'s str {
        &sql[self.start..self.end]
    }

    /// Whether this is a top-level word equal to `keyword`, ignoring case.
    pub fn is_keyword(&self, sql: &str, keyword: &str) -> bool {
        self.depth == 0 && self.kind == TokenKind::Word && self.text(sql).eq_ignore_ascii_case(keyword)
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'@' | b'$' | b'#' | b'.' | b':') || b >= 0x80
}

/// Scan `sql` into tokens. Fails on unbalanced parentheses or unterminated
/// quotes and block comments.
pub(crate) fn tokenize(sql: &str) -> Result<Vec<Token>, &'static str> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let start = i;
        match b {
            _ if b.is_ascii_whitespace() => {
                i += 1;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = sql[i + 2..].find("*/").ok_or("unterminated block comment")?;
                i += 2 + close + 2;
            }
            b'\'' | b'"' | b'`' | b'[' => {
                let closing = if b == b'[' { b']' } else { b };
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err("unterminated quoted text"),
                        // A doubled quote is an escaped quote.
                        Some(&c) if c == closing && b != b'[' && bytes.get(i + 1) == Some(&closing) => i += 2,
                        Some(&c) if c == closing => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
                tokens.push(Token { kind: TokenKind::Quoted, start, end: i, depth });
            }
            b'(' => {
                tokens.push(Token { kind: TokenKind::Open, start, end: i + 1, depth });
                depth += 1;
                i += 1;
            }
            b')' => {
                depth = depth.checked_sub(1).ok_or("unbalanced parentheses")?;
                tokens.push(Token { kind: TokenKind::Close, start, end: i + 1, depth });
                i += 1;
            }
            b',' => {
                tokens.push(Token { kind: TokenKind::Comma, start, end: i + 1, depth });
                i += 1;
            }
            _ if is_word_byte(b) => {
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                tokens.push(Token { kind: TokenKind::Word, start, end: i, depth });
            }
            _ => {
                tokens.push(Token { kind: TokenKind::Symbol, start, end: i + 1, depth });
                i += 1;
            }
        }
    }

    if depth != 0 {
        return Err("unbalanced parentheses");
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(sql: &str) -> Vec<(&str, usize)> {
        tokenize(sql)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind == TokenKind::Word)
            .map(|t| (t.text(sql), t.depth))
            .collect()
    }

    #[test]
    fn test_depth_tracks_parentheses() {
        let sql = "SELECT (SELECT MAX(x) FROM y) AS m FROM t";
        let w = words(sql);
        assert_eq!(w[0], ("SELECT", 0));
        assert_eq!(w[1], ("SELECT", 1));
        assert_eq!(w[2], ("MAX", 1));
        assert_eq!(w[3], ("x", 2));
        assert_eq!(w[4], ("FROM", 1));
        assert_eq!(w[6], ("AS", 0));
        assert_eq!(w[8], ("FROM", 0));
    }

    #[test]
    fn test_quotes_and_comments_are_opaque() {
        let sql = "SELECT 'it''s FROM here', [FROM] -- FROM\n /* FROM */ FROM t";
        let from: Vec<_> = tokenize(sql)
            .unwrap()
            .into_iter()
            .filter(|t| t.is_keyword(sql, "from"))
            .collect();
        assert_eq!(from.len(), 1);
        assert_eq!(&sql[from[0].start..], "FROM t");
    }

    #[test]
    fn test_malformed_text_is_rejected() {
        assert_eq!(tokenize("SELECT (a FROM t"), Err("unbalanced parentheses"));
        assert_eq!(tokenize("SELECT a) FROM t"), Err("unbalanced parentheses"));
        assert_eq!(tokenize("SELECT 'a FROM t"), Err("unterminated quoted text"));
        assert_eq!(tokenize("SELECT /* a FROM t"), Err("unterminated block comment"));
    }
}
