use proptest::prelude::*;

use lython::lexer::{
    formatter::{LineFormatter, TokenFormatter},
    Lexer, Token, TokenKind,
};

fn check(input: &str, expected: &str) {
    let mut scanner = Lexer::new(input);
    let formatter = LineFormatter::new(input);
    let mut lines = Vec::new();
    loop {
        match scanner.next_token() {
            Ok(token) => {
                lines.push(formatter.format(&token));
                if matches!(token.kind, TokenKind::Eof) {
                    break;
                }
            }
            Err(error) => lines.push(formatter.format_error(&error)),
        }
    }

    assert_eq!(lines.join("\n"), expected, "Failed to tokenize {input:?}");
}

#[test]
fn smoke_test() {
    check("", "(1) EOF null");
}

#[test]
fn simple_assignment() {
    check(
        "x = 1\n",
        "(1) IDENTIFIER x null
(1) EQUAL = null
(1) INTEGER 1 1
(1) NEWLINE null
(2) EOF null",
    );
}

#[test]
fn missing_final_newline_is_supplied() {
    check(
        "pass",
        "(1) PASS pass null
(1) NEWLINE null
(1) EOF null",
    );
}

#[test]
fn indented_block() {
    check(
        "if x:\n    y\n",
        "(1) IF if null
(1) IDENTIFIER x null
(1) COLON : null
(1) NEWLINE null
(2) INDENT null
(2) IDENTIFIER y null
(2) NEWLINE null
(3) DEDENT null
(3) EOF null",
    );
}

#[test]
fn blank_and_comment_lines_do_not_change_indentation() {
    check(
        "while a:\n\n    # note\n    b\nc\n",
        "(1) WHILE while null
(1) IDENTIFIER a null
(1) COLON : null
(1) NEWLINE null
(4) INDENT null
(4) IDENTIFIER b null
(4) NEWLINE null
(5) DEDENT null
(5) IDENTIFIER c null
(5) NEWLINE null
(6) EOF null",
    );
}

#[test]
fn inconsistent_dedent_is_reported() {
    check(
        "if x:\n    y\n  z\n",
        "(1) IF if null
(1) IDENTIFIER x null
(1) COLON : null
(1) NEWLINE null
(2) INDENT null
(2) IDENTIFIER y null
(2) NEWLINE null
(3) ERROR INCONSISTENT_DEDENT null
(3) IDENTIFIER z null
(3) NEWLINE null
(4) EOF null",
    );
}

#[test]
fn brackets_join_physical_lines() {
    check(
        "f(1,\n  2)\n",
        "(1) IDENTIFIER f null
(1) LEFT_PAREN ( null
(1) INTEGER 1 1
(1) COMMA , null
(2) INTEGER 2 2
(2) RIGHT_PAREN ) null
(2) NEWLINE null
(3) EOF null",
    );
}

#[test]
fn literals_carry_their_values() {
    check(
        "1_000 2.5 'it''s' \"a\\tb\"",
        "(1) INTEGER 1_000 1000
(1) FLOAT 2.5 2.5
(1) STRING 'it' it
(1) STRING 's' s
(1) STRING \"a\\tb\" a\tb
(1) NEWLINE null
(1) EOF null",
    );
}

#[test]
fn compound_operators() {
    check(
        "a //= b ** -c -> d",
        "(1) IDENTIFIER a null
(1) DOUBLE_SLASH_EQUAL //= null
(1) IDENTIFIER b null
(1) DOUBLE_STAR ** null
(1) MINUS - null
(1) IDENTIFIER c null
(1) ARROW -> null
(1) IDENTIFIER d null
(1) NEWLINE null
(1) EOF null",
    );
}

#[test]
fn soft_keywords_are_keywords() {
    check(
        "match case",
        "(1) MATCH match null
(1) CASE case null
(1) NEWLINE null
(1) EOF null",
    );
}

#[test]
fn import_statements() {
    check(
        "from math import pi as p",
        "(1) FROM from null
(1) IDENTIFIER math null
(1) IMPORT import null
(1) IDENTIFIER pi null
(1) AS as null
(1) IDENTIFIER p null
(1) NEWLINE null
(1) EOF null",
    );
}

#[test]
fn lone_bang_is_unrecognized() {
    check(
        "a ! b",
        "(1) IDENTIFIER a null
(1) ERROR UNEXPECTED_CHAR !
(1) IDENTIFIER b null
(1) NEWLINE null
(1) EOF null",
    );
}

#[test]
fn unterminated_string_is_reported() {
    check(
        "x = \"open\ny\n",
        "(1) IDENTIFIER x null
(1) EQUAL = null
(1) ERROR UNTERMINATED_STRING null
(2) IDENTIFIER y null
(2) NEWLINE null
(3) EOF null",
    );
}

#[test]
fn tokenize_stops_at_first_error() {
    assert!(Lexer::new("a $ b").tokenize().is_err());
    let tokens = Lexer::new("a b").tokenize();
    assert_eq!(tokens.map(|tokens| tokens.len()), Ok(4));
}

// Property-based tests

fn symbol_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("(".to_string()),
        Just(")".to_string()),
        Just("[".to_string()),
        Just("]".to_string()),
        Just(",".to_string()),
        Just(".".to_string()),
        Just(":".to_string()),
        Just(";".to_string()),
        Just("|".to_string()),
        Just("->".to_string()),
        Just("-".to_string()),
        Just("+".to_string()),
        Just("*".to_string()),
        Just("**".to_string()),
        Just("/".to_string()),
        Just("//".to_string()),
        Just("%".to_string()),
        Just("!=".to_string()),
        Just("=".to_string()),
        Just("==".to_string()),
        Just("+=".to_string()),
        Just("//=".to_string()),
        Just("<".to_string()),
        Just("<=".to_string()),
        Just(">".to_string()),
        Just(">=".to_string()),
    ]
}

fn numeric_literal_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]+".prop_map(|s| s),          // Integer literals
        "[0-9]+\\.[0-9]+".prop_map(|s| s)  // Decimal literals
    ]
}

fn string_literal_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[^\"\\\\\n]*".prop_map(|s: String| format!("\"{s}\"")),
        "[^'\\\\\n]*".prop_map(|s: String| format!("'{s}'")),
    ]
}

fn identifier_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z_][a-zA-Z0-9_]*".prop_map(|s: String| s)
}

fn keyword_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("and".to_string()),
        Just("class".to_string()),
        Just("def".to_string()),
        Just("else".to_string()),
        Just("False".to_string()),
        Just("for".to_string()),
        Just("if".to_string()),
        Just("None".to_string()),
        Just("or".to_string()),
        Just("return".to_string()),
        Just("True".to_string()),
        Just("while".to_string()),
        Just("yield".to_string()),
        Just("match".to_string()),
    ]
}

fn comment_strategy() -> impl Strategy<Value = String> {
    "[^\n]*".prop_map(|s: String| format!("#{s}\n"))
}

fn token_sequence_with_comments_strategy() -> impl Strategy<Value = String> {
    const MIN_TOKEN_COUNT: usize = 1;
    const MAX_TOKEN_COUNT: usize = 100;
    prop::collection::vec(
        prop_oneof![
            symbol_strategy(),
            numeric_literal_strategy(),
            string_literal_strategy(),
            identifier_strategy(),
            keyword_strategy(),
            comment_strategy(),
        ],
        MIN_TOKEN_COUNT..MAX_TOKEN_COUNT,
    )
    .prop_map(|tokens| tokens.join(" "))
}

fn token_sequence_without_comments_strategy() -> impl Strategy<Value = Vec<String>> {
    const MIN_TOKEN_COUNT: usize = 1;
    const MAX_TOKEN_COUNT: usize = 100;
    prop::collection::vec(
        prop_oneof![
            symbol_strategy(),
            numeric_literal_strategy(),
            string_literal_strategy(),
            identifier_strategy(),
            keyword_strategy(),
        ],
        MIN_TOKEN_COUNT..MAX_TOKEN_COUNT,
    )
}

proptest! {
    #[test]
    fn lexer_handles_valid_tokens_without_comments(input in token_sequence_without_comments_strategy()) {
        // One line, so the only layout tokens are the closing NEWLINE and EOF.
        let expected_num_tokens = input.len() + 2;
        let input = input.join(" ");
        let mut scanner = Lexer::new(&input);
        let mut num_tokens = 0;
        loop {
            num_tokens += 1;
            match scanner.next_token() {
                Ok(Token {kind: TokenKind::Eof, ..}) => {
                    break;
                },
                token => {
                    prop_assert!(token.is_ok());
                }
            }
        }
        prop_assert_eq!(num_tokens, expected_num_tokens);
    }

    #[test]
    fn lexer_handles_valid_tokens_with_comments(input in token_sequence_with_comments_strategy()) {
        let mut scanner = Lexer::new(&input);
        loop {
            match scanner.next_token() {
                Ok(Token {kind: TokenKind::Eof, ..}) => {
                    break;
                },
                token => {
                    prop_assert!(token.is_ok());
                }
            }
        }
    }

    #[test]
    fn indentation_tokens_balance(depths in prop::collection::vec(0usize..4, 1..20)) {
        // Every line nests at most one level deeper than the line before it.
        let mut source = String::new();
        let mut previous = 0;
        for depth in depths {
            let depth = depth.min(previous + 1);
            if depth > previous {
                source.push_str(&"    ".repeat(previous));
                source.push_str("if x:\n");
            }
            source.push_str(&"    ".repeat(depth));
            source.push_str("pass\n");
            previous = depth;
        }
        let tokens = Lexer::new(&source).tokenize();
        prop_assert!(tokens.is_ok());
        let tokens = tokens.unwrap_or_default();
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        prop_assert_eq!(indents, dedents);
    }
}
