/// A single step of a parsed path: a property name, a numeric index, or a
/// wildcard matching every child. Shared between the JSON and XML pointer
/// extractors, which differ only in how they walk a document and in how
/// they turn a numeric index into a position (JSON is 0-based, XML follows
/// XPath's 1-based convention).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Property(String),
    Index(usize),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer(pub Vec<Token>);

impl Pointer {
    /// Parses `.prop[N].child` / `.*` / `[*]` style paths. A leading
    /// property name without a leading `.` is accepted too, so `"orders[0]"`
    /// and `".orders[0]"` parse the same way.
    pub fn parse(path: &str) -> Pointer {
        let mut tokens = Vec::new();
        let mut chars = path.chars().peekable();
        let mut leading = String::new();
        while let Some(&c) = chars.peek() {
            if c == '.' || c == '[' {
                break;
            }
            leading.push(c);
            chars.next();
        }
        if !leading.is_empty() {
            tokens.push(Token::Property(leading));
        }
        while let Some(&c) = chars.peek() {
            match c {
                '.' => {
                    chars.next();
                    let mut name = String::new();
                    while let Some(&c2) = chars.peek() {
                        if c2 == '.' || c2 == '[' {
                            break;
                        }
                        name.push(c2);
                        chars.next();
                    }
                    tokens.push(if name == "*" {
                        Token::Wildcard
                    } else {
                        Token::Property(name)
                    });
                }
                '[' => {
                    chars.next();
                    let mut idx = String::new();
                    while let Some(&c2) = chars.peek() {
                        if c2 == ']' {
                            break;
                        }
                        idx.push(c2);
                        chars.next();
                    }
                    chars.next();
                    tokens.push(if idx == "*" {
                        Token::Wildcard
                    } else {
                        match idx.parse() {
                            Ok(i) => Token::Index(i),
                            Err(_) => Token::Property(idx),
                        }
                    });
                }
                _ => {
                    chars.next();
                }
            }
        }
        Pointer(tokens)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_leading_property_then_index_then_property() {
        let p = Pointer::parse(".orders[0].id");
        assert_eq!(
            p.0,
            vec![
                Token::Property("orders".into()),
                Token::Index(0),
                Token::Property("id".into()),
            ]
        );
    }

    #[test]
    fn bare_leading_property_without_dot() {
        let p = Pointer::parse("orders[1]");
        assert_eq!(p.0, vec![Token::Property("orders".into()), Token::Index(1)]);
    }

    #[test]
    fn wildcards_in_both_positions() {
        let p = Pointer::parse(".*[*].id");
        assert_eq!(
            p.0,
            vec![Token::Wildcard, Token::Wildcard, Token::Property("id".into())]
        );
    }
}
