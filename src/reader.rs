use std::collections::VecDeque;

use crate::error::{Error, SchemeResult};
use crate::heap::Heap;
use crate::number;
use crate::symbol::sym;
use crate::value::Value;

/// A lexical token.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Open,
    Close,
    Quote,
    /// A string literal, without its quotes.
    Str(String),
    /// Anything else: numbers, booleans, symbols and the dot.
    Atom(String),
}

/// Split source text into tokens.
///
/// `(`, `)` and `'` always stand alone. A string literal runs from `"` to
/// the next `"` on the same line (or to the end of the line) and is never
/// split. An unquoted `;` discards the rest of its line.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let mut chars = line.chars();
        let mut word = String::new();
        while let Some(ch) = chars.next() {
            match ch {
                '(' | ')' | '\'' | '"' | ';' => {
                    flush_word(&mut word, &mut tokens);
                    match ch {
                        '(' => tokens.push(Token::Open),
                        ')' => tokens.push(Token::Close),
                        '\'' => tokens.push(Token::Quote),
                        '"' => {
                            let mut s = String::new();
                            for c in chars.by_ref() {
                                if c == '"' {
                                    break;
                                }
                                s.push(c);
                            }
                            tokens.push(Token::Str(s));
                        }
                        _ => break, // comment
                    }
                }
                c if c.is_whitespace() => flush_word(&mut word, &mut tokens),
                c => word.push(c),
            }
        }
        flush_word(&mut word, &mut tokens);
    }
    tokens
}

fn flush_word(word: &mut String, tokens: &mut Vec<Token>) {
    if !word.is_empty() {
        tokens.push(Token::Atom(std::mem::take(word)));
    }
}

/// Read one expression, consuming its tokens from the front of the queue.
///
/// Running out of tokens anywhere inside the expression is
/// `Error::EndOfInput`; structural mistakes are `Error::Syntax`.
pub fn parse_one(tokens: &mut VecDeque<Token>, heap: &mut Heap) -> SchemeResult<Value> {
    let mut open: Vec<Nest> = Vec::new();
    loop {
        let token = tokens.pop_front().ok_or(Error::EndOfInput)?;
        if let Some(Nest::List { tail: Some(_), .. }) = open.last() {
            if token != Token::Close {
                return Err(Error::Syntax(") is expected".into()));
            }
        }

        let mut val = match token {
            Token::Open => {
                open.push(Nest::List {
                    elements: Vec::new(),
                    dotted: false,
                    tail: None,
                });
                continue;
            }
            Token::Quote => {
                open.push(Nest::Quote);
                continue;
            }
            Token::Close => match open.pop() {
                Some(Nest::List {
                    elements,
                    dotted,
                    tail,
                }) if tail.is_some() || !dotted => {
                    let mut result = tail.unwrap_or(Value::Nil);
                    for val in elements.into_iter().rev() {
                        result = heap.cons(val, result)?;
                    }
                    result
                }
                _ => return Err(Error::Syntax("unexpected )".into())),
            },
            Token::Str(s) => heap.string(s)?,
            Token::Atom(word) => {
                if word == "." {
                    if let Some(Nest::List {
                        elements, dotted, ..
                    }) = open.last_mut()
                    {
                        if elements.is_empty() {
                            return Err(Error::Syntax("unexpected .".into()));
                        }
                        if !*dotted {
                            *dotted = true;
                            continue;
                        }
                    }
                }
                parse_atom(&word, heap)?
            }
        };

        // hand the finished datum to whatever encloses it
        loop {
            match open.last_mut() {
                None => return Ok(val),
                Some(Nest::Quote) => {
                    open.pop();
                    val = heap.list(&[Value::Symbol(sym::QUOTE), val])?;
                }
                Some(Nest::List {
                    elements,
                    dotted,
                    tail,
                }) => {
                    if *dotted {
                        *tail = Some(val);
                    } else {
                        elements.push(val);
                    }
                    break;
                }
            }
        }
    }
}

/// A datum still waiting for its closing token.
enum Nest {
    /// Inside `( ... )`: the elements so far, whether a `.` was seen and
    /// the tail after it.
    List {
        elements: Vec<Value>,
        dotted: bool,
        tail: Option<Value>,
    },
    /// After `'`, waiting for the quoted datum.
    Quote,
}

fn parse_atom(word: &str, heap: &mut Heap) -> SchemeResult<Value> {
    match word {
        "#t" => Ok(Value::Bool(true)),
        "#f" => Ok(Value::Bool(false)),
        _ => match number::parse(word) {
            Some(n) => heap.number(n),
            None => Ok(heap.symbol(word)),
        },
    }
}

/// Read a single expression from a string.
pub fn read_str(text: &str, heap: &mut Heap) -> SchemeResult<Value> {
    let mut tokens: VecDeque<Token> = tokenize(text).into();
    parse_one(&mut tokens, heap)
}

/// Tokens buffered from interactive input, shared by the REPL and the
/// `read` intrinsic.
#[derive(Default)]
pub struct TokenQueue {
    tokens: VecDeque<Token>,
    /// The host reported end-of-file and no read has consumed it yet.
    eof: bool,
}

impl TokenQueue {
    pub fn new() -> Self {
        TokenQueue {
            tokens: VecDeque::new(),
            eof: false,
        }
    }

    /// Record that the input source is exhausted.
    pub fn set_eof(&mut self) {
        self.eof = true;
    }

    /// Consume a pending end-of-file report.
    pub fn take_eof(&mut self) -> bool {
        std::mem::take(&mut self.eof)
    }

    /// Tokenize a line of input and append it to the queue.
    pub fn push_text(&mut self, text: &str) {
        self.tokens.extend(tokenize(text));
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Read one expression from the buffered tokens.
    ///
    /// On `EndOfInput` the queue is left untouched, so the caller can
    /// append more text and try again. On a syntax error the queue is
    /// discarded.
    pub fn read_expression(&mut self, heap: &mut Heap) -> SchemeResult<Value> {
        let mut attempt = self.tokens.clone();
        match parse_one(&mut attempt, heap) {
            Ok(val) => {
                self.tokens = attempt;
                Ok(val)
            }
            Err(Error::EndOfInput) => Err(Error::EndOfInput),
            Err(e) => {
                self.tokens.clear();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::print_val;

    fn atom(s: &str) -> Token {
        Token::Atom(s.into())
    }

    fn round_trip(text: &str) -> String {
        let mut heap = Heap::new(1024);
        let val = read_str(text, &mut heap).unwrap();
        print_val(val, &heap, true)
    }

    #[test]
    fn tokenize_delimiters_and_strings() {
        let tokens = tokenize("(display \"a (b) ;c\")'x ; comment\n(+ 1 2)");
        assert_eq!(
            tokens,
            vec![
                Token::Open,
                atom("display"),
                Token::Str("a (b) ;c".into()),
                Token::Close,
                Token::Quote,
                atom("x"),
                Token::Open,
                atom("+"),
                atom("1"),
                atom("2"),
                Token::Close,
            ]
        );
    }

    #[test]
    fn literals_round_trip() {
        for text in ["#t", "#f", "42", "-17", "2.5", "3.0", "\"hi there\"", "foo", "()"] {
            assert_eq!(round_trip(text), text);
        }
    }

    #[test]
    fn improper_list_round_trips() {
        assert_eq!(round_trip("(1 2 . 3)"), "(1 2 . 3)");
        assert_eq!(round_trip("(a . (b . (c . ())))"), "(a b c)");
    }

    #[test]
    fn quote_expands() {
        assert_eq!(round_trip("'(a 'b)"), "(quote (a (quote b)))");
    }

    #[test]
    fn atom_classification() {
        let mut heap = Heap::new(64);
        let plus = read_str("+", &mut heap).unwrap();
        assert!(plus.as_symbol().is_some());
        let n = read_str("007", &mut heap).unwrap();
        assert!(heap.get_number(n.as_number().unwrap()).is_exact());
        let x = read_str("1e2", &mut heap).unwrap();
        assert!(!heap.get_number(x.as_number().unwrap()).is_exact());
    }

    #[test]
    fn incomplete_input_is_end_of_input() {
        let mut heap = Heap::new(64);
        for text in ["", "(a b", "'", "(a . b", "(a ."] {
            assert_eq!(read_str(text, &mut heap), Err(Error::EndOfInput), "{:?}", text);
        }
    }

    #[test]
    fn malformed_input_is_syntax_error() {
        let mut heap = Heap::new(64);
        for text in [")", "(a . b c)", "(. a)"] {
            assert!(matches!(read_str(text, &mut heap), Err(Error::Syntax(_))), "{:?}", text);
        }
    }

    #[test]
    fn queue_keeps_partial_input_until_complete() {
        let mut heap = Heap::new(64);
        let mut queue = TokenQueue::new();
        queue.push_text("(+ 1");
        assert_eq!(queue.read_expression(&mut heap), Err(Error::EndOfInput));
        assert!(!queue.is_empty());
        queue.push_text("2) foo");
        let val = queue.read_expression(&mut heap).unwrap();
        assert_eq!(print_val(val, &heap, true), "(+ 1 2)");
        let foo = queue.read_expression(&mut heap).unwrap();
        assert_eq!(print_val(foo, &heap, true), "foo");
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_discards_after_syntax_error() {
        let mut heap = Heap::new(64);
        let mut queue = TokenQueue::new();
        queue.push_text(") (a b)");
        assert!(matches!(queue.read_expression(&mut heap), Err(Error::Syntax(_))));
        assert!(queue.is_empty());
    }

    #[test]
    fn deep_nesting_reads_without_recursion() {
        let depth = 300_000;
        let text = format!("'{}x{}", "(".repeat(depth), ")".repeat(depth));
        let mut heap = Heap::new(1 << 20);
        let val = read_str(&text, &mut heap).unwrap();

        let quoted = heap.car_val(heap.cdr_val(val).unwrap()).unwrap();
        let mut current = quoted;
        let mut levels = 0;
        while let Value::Pair(id) = current {
            assert_eq!(heap.cdr(id), Value::Nil);
            current = heap.car(id);
            levels += 1;
        }
        assert_eq!(levels, depth);
        assert_eq!(current, heap.symbol("x"));

        let unclosed = "(".repeat(depth);
        assert_eq!(read_str(&unclosed, &mut heap), Err(Error::EndOfInput));
    }

    #[test]
    fn dots_and_quotes_inside_lists() {
        assert_eq!(round_trip("(a . (b . (c)))"), "(a b c)");
        assert_eq!(round_trip("('a . 'b)"), "((quote a) quote b)");
        assert_eq!(round_trip("''x"), "(quote (quote x))");
        assert_eq!(round_trip("(a . .)"), "(a . .)");
        let mut heap = Heap::new(64);
        assert_eq!(
            read_str("(a . b (c))", &mut heap),
            Err(Error::Syntax(") is expected".into()))
        );
        assert_eq!(
            read_str("(a . )", &mut heap),
            Err(Error::Syntax("unexpected )".into()))
        );
        assert_eq!(read_str("'", &mut heap), Err(Error::EndOfInput));
    }
}
