//! Import scanner
//!
//! A small lexer that pulls module specifiers out of ES module and CommonJS
//! sources without building an AST. Recognised forms:
//!
//! - `import x from 'a'`, `import 'a'`, `import('a')`
//! - `export * from 'a'`, `export { x } from 'a'`
//! - `require('a')`
//!
//! Strings, comments, template text and regular expressions are skipped so
//! quoted text that merely looks like an import is not reported. Template
//! substitutions (`${...}`) are code and are scanned like the rest.

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Punct(char),
    Template,
    Regex,
}

/// Words after which a `/` starts a regular expression rather than a division.
const REGEX_PRECEDING_WORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

pub struct ImportScanner<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current_pos: usize,
    current_char: Option<char>,
}

impl<'a> ImportScanner<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.char_indices();
        let current_char = chars.next().map(|(_, c)| c);
        Self {
            source,
            chars,
            current_pos: 0,
            current_char,
        }
    }

    /// Module specifiers of `source`, deduplicated, in order of appearance.
    pub fn scan(source: &str) -> Vec<String> {
        let tokens = ImportScanner::new(source).tokenize();
        let mut specifiers: Vec<String> = Vec::new();
        for specifier in find_specifiers(&tokens) {
            if !specifiers.iter().any(|seen| seen == specifier) {
                specifiers.push(specifier.to_string());
            }
        }
        specifiers
    }

    /// Cheap pre-check: can `source` contain any import at all?
    pub fn has_import_or_require(source: &str) -> bool {
        source.contains("import") || source.contains("export") || source.contains("require")
    }

    fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        self.tokenize_into(&mut tokens, false);
        tokens
    }

    /// Push tokens until the end of input or, inside a `${...}` substitution,
    /// until its closing brace.
    fn tokenize_into(&mut self, tokens: &mut Vec<Token>, in_substitution: bool) {
        let mut depth = 0usize;
        loop {
            self.skip_whitespace_and_comments();
            let Some(ch) = self.current_char else {
                return;
            };
            let token = match ch {
                '"' | '\'' => Token::Str(self.read_string_literal(ch)),
                '`' => {
                    self.read_template_literal(tokens);
                    Token::Template
                }
                '/' if starts_regex(tokens.last()) => {
                    self.skip_regex();
                    Token::Regex
                }
                c if is_word_char(c) => Token::Word(self.read_word()),
                '{' => {
                    self.advance();
                    depth += 1;
                    Token::Punct('{')
                }
                '}' => {
                    self.advance();
                    if in_substitution && depth == 0 {
                        return;
                    }
                    depth = depth.saturating_sub(1);
                    Token::Punct('}')
                }
                c => {
                    self.advance();
                    Token::Punct(c)
                }
            };
            tokens.push(token);
        }
    }

    // Helper methods

    fn advance(&mut self) {
        if let Some((pos, ch)) = self.chars.next() {
            self.current_pos = pos;
            self.current_char = Some(ch);
        } else {
            self.current_pos = self.source.len();
            self.current_char = None;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.clone().next().map(|(_, c)| c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current_char {
                Some(ch) if ch.is_whitespace() => self.advance(),
                Some('/') if self.peek() == Some('/') => {
                    while let Some(ch) = self.current_char {
                        self.advance();
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek() == Some('*') => {
                    self.advance();
                    self.advance();
                    while let Some(ch) = self.current_char {
                        if ch == '*' && self.peek() == Some('/') {
                            self.advance();
                            self.advance();
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_word(&mut self) -> String {
        let start = self.current_pos;
        while matches!(self.current_char, Some(c) if is_word_char(c)) {
            self.advance();
        }
        self.source[start..self.current_pos].to_string()
    }

    fn read_string_literal(&mut self, quote: char) -> String {
        self.advance();
        let mut value = String::new();
        while let Some(ch) = self.current_char {
            match ch {
                c if c == quote => {
                    self.advance();
                    break;
                }
                '\\' => {
                    self.advance();
                    if let Some(escaped) = self.current_char {
                        value.push(escaped);
                        self.advance();
                    }
                }
                // Unterminated; give up at the end of the line.
                '\n' => break,
                c => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        value
    }

    /// Skip the text of a template literal, tokenizing its substitutions.
    fn read_template_literal(&mut self, tokens: &mut Vec<Token>) {
        self.advance();
        while let Some(ch) = self.current_char {
            match ch {
                '`' => {
                    self.advance();
                    break;
                }
                '\\' => {
                    self.advance();
                    self.advance();
                }
                '$' if self.peek() == Some('{') => {
                    self.advance();
                    self.advance();
                    self.tokenize_into(tokens, true);
                }
                _ => self.advance(),
            }
        }
    }

    fn skip_regex(&mut self) {
        self.advance();
        let mut in_class = false;
        while let Some(ch) = self.current_char {
            self.advance();
            match ch {
                '\\' => self.advance(),
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => break,
                '\n' => break,
                _ => {}
            }
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn starts_regex(previous: Option<&Token>) -> bool {
    match previous {
        None => true,
        Some(Token::Punct(c)) => !matches!(c, ')' | ']' | '}'),
        Some(Token::Word(word)) => REGEX_PRECEDING_WORDS.contains(&word.as_str()),
        Some(_) => false,
    }
}

fn find_specifiers(tokens: &[Token]) -> Vec<&str> {
    let mut specifiers = Vec::new();
    let mut in_declaration = false;

    for (i, token) in tokens.iter().enumerate() {
        let after_dot = i > 0 && tokens[i - 1] == Token::Punct('.');
        let next = tokens.get(i + 1);
        match token {
            Token::Word(word) if word == "import" && !after_dot => match next {
                Some(Token::Str(specifier)) => specifiers.push(specifier.as_str()),
                Some(Token::Punct('(')) => {
                    if let Some(Token::Str(specifier)) = tokens.get(i + 2) {
                        specifiers.push(specifier.as_str());
                    }
                }
                // `import.meta`
                Some(Token::Punct('.')) => {}
                _ => in_declaration = true,
            },
            Token::Word(word) if word == "export" && !after_dot => in_declaration = true,
            Token::Word(word) if word == "from" && in_declaration => {
                if let Some(Token::Str(specifier)) = next {
                    specifiers.push(specifier.as_str());
                    in_declaration = false;
                }
            }
            Token::Word(word) if word == "require" && !after_dot => {
                if let (Some(Token::Punct('(')), Some(Token::Str(specifier)), Some(Token::Punct(')'))) =
                    (next, tokens.get(i + 2), tokens.get(i + 3))
                {
                    specifiers.push(specifier.as_str());
                }
            }
            Token::Punct(';') => in_declaration = false,
            _ => {}
        }
    }
    specifiers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_es_module_imports() {
        let source = r#"
            import { a } from './a';
            import * as b from "b";
            import c, { d } from '@scope/c/d';
            import './side-effect';
        "#;
        assert_eq!(
            ImportScanner::scan(source),
            vec!["./a", "b", "@scope/c/d", "./side-effect"]
        );
    }

    #[test]
    fn test_reexports() {
        let source = r#"
            export * from './all';
            export { x as y } from "./named";
            export const local = 1;
            export default function () {}
        "#;
        assert_eq!(ImportScanner::scan(source), vec!["./all", "./named"]);
    }

    #[test]
    fn test_multiline_import() {
        let source = "import {\n  a,\n  b,\n} from\n  'multi';";
        assert_eq!(ImportScanner::scan(source), vec!["multi"]);
    }

    #[test]
    fn test_dynamic_import_and_require() {
        let source = r#"
            const lazy = import('./lazy');
            var fs = require('fs');
            var lib = require("lib");
            module.require('not-a-call');
        "#;
        assert_eq!(ImportScanner::scan(source), vec!["./lazy", "fs", "lib"]);
    }

    #[test]
    fn test_comments_and_strings_are_ignored() {
        let source = r#"
            // import x from 'commented';
            /* require('block') */
            const text = "import y from 'in-string'";
            const tpl = `require('${name}')`;
            import real from 'real';
        "#;
        assert_eq!(ImportScanner::scan(source), vec!["real"]);
    }

    #[test]
    fn test_template_substitutions_are_scanned() {
        assert_eq!(ImportScanner::scan("const s = `${require('dep')}`;\n"), vec!["dep"]);

        let nested = "const s = `a ${`b ${require('inner')}`} c`; require('after');";
        assert_eq!(ImportScanner::scan(nested), vec!["inner", "after"]);

        let braces = "const s = `${ { key: 1 }.key } require('text')`; import x from 'real';";
        assert_eq!(ImportScanner::scan(braces), vec!["real"]);
    }

    #[test]
    fn test_regex_literals_are_skipped() {
        let source = r#"
            var re = /import 'x'/g;
            var half = total / 2; var other = count / 4;
            import after from './after';
        "#;
        assert_eq!(ImportScanner::scan(source), vec!["./after"]);
    }

    #[test]
    fn test_import_meta_is_not_a_declaration() {
        let source = "const url = import.meta.url; const from = 'nope';";
        assert!(ImportScanner::scan(source).is_empty());
    }

    #[test]
    fn test_duplicates_are_reported_once() {
        let source = "import a from 'x'; export { b } from 'x';";
        assert_eq!(ImportScanner::scan(source), vec!["x"]);
    }
}
