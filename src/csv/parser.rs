//! A permissive line parser for delimited text.
//!
//! ```text
//! Column         := QuotedColumn | UnquotedColumn | Empty
//! QuotedColumn   := '"' EscapedContent '"'
//! EscapedContent := (AnyCharExceptQuote)* ( '""' EscapedContent )?
//! UnquotedColumn := (AnyCharExceptSeparator)*
//! Row            := Column (Separator Column)*
//! ```
//!
//! Malformed input never fails: an unterminated quoted column takes the rest
//! of the line, and whatever follows a closing quote is consumed as if it
//! were the separator.

const QUOTE: char = '"';

/// Splits one line into its columns.
///
/// Assigning a new line with [`RowParser::set_line`] resets the cursor, so
/// one parser is reused for a whole file.
#[derive(Clone, Debug)]
pub struct RowParser {
    line: String,
    separator: char,
    cursor: usize,
    escape_col: bool,
    have_error: bool,
}

impl RowParser {
    pub fn new(separator: char) -> RowParser {
        RowParser {
            line: String::new(),
            separator,
            cursor: 0,
            escape_col: false,
            have_error: false,
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn set_line(&mut self, line: &str) {
        self.line.clear();
        self.line.push_str(line);
        self.cursor = 0;
    }

    pub fn separator(&self) -> char {
        self.separator
    }

    pub fn set_separator(&mut self, separator: char) {
        self.separator = separator;
    }

    pub fn have_error(&self) -> bool {
        //! Kept for callers that check it, the grammar accepts every line.

        self.have_error
    }

    pub fn is_escape_col(&self) -> bool {
        //! Whether the column returned last was quoted.

        self.escape_col
    }

    pub fn columns(&mut self) -> Columns<'_> {
        Columns { parser: self }
    }

    fn skip_unquoted(&mut self) {
        self.cursor = self.line[self.cursor..]
            .find(self.separator)
            .map_or(self.line.len(), |offset| self.cursor + offset);
    }

    fn skip_to_quote(&mut self) {
        self.cursor = self.line[self.cursor..]
            .find(QUOTE)
            .map_or(self.line.len(), |offset| self.cursor + offset);
    }

    fn skip_escaped(&mut self) -> bool {
        //! Leaves the cursor on the closing quote, or at the end of an
        //! unterminated column. Returns whether a doubled quote was seen.

        let mut doubled = false;
        loop {
            self.skip_to_quote();
            if !self.line[self.cursor..].starts_with("\"\"") {
                return doubled;
            }
            self.cursor += 2;
            doubled = true;
        }
    }

    fn parse_column(&mut self) -> String {
        self.escape_col = false;
        if self.cursor >= self.line.len() {
            return String::new();
        }

        if self.line[self.cursor..].starts_with(QUOTE) {
            self.escape_col = true;
            self.cursor += QUOTE.len_utf8();

            let start = self.cursor;
            let doubled = self.skip_escaped();
            let content = &self.line[start..self.cursor];
            let content = if doubled {
                content.replace("\"\"", "\"")
            } else {
                content.to_string()
            };

            // closing quote
            if self.cursor < self.line.len() {
                self.cursor += QUOTE.len_utf8();
            }
            content
        } else {
            let start = self.cursor;
            self.skip_unquoted();
            self.line[start..self.cursor].to_string()
        }
    }

    fn skip_separator(&mut self) {
        //! Steps over one character, whatever it is.

        let width = self.line[self.cursor..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        self.cursor += width;
    }
}

/// The lazy column sequence of the current line of a [`RowParser`].
pub struct Columns<'a> {
    parser: &'a mut RowParser,
}

impl Iterator for Columns<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.parser.cursor > self.parser.line.len() {
            return None;
        }

        let column = self.parser.parse_column();
        self.parser.skip_separator();
        Some(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str, separator: char) -> Vec<String> {
        let mut parser = RowParser::new(separator);
        parser.set_line(line);
        parser.columns().collect()
    }

    #[test]
    fn plain_columns_split_on_separator() {
        assert_eq!(parse("1,Jansen,3.5", ','), vec!["1", "Jansen", "3.5"]);
        assert_eq!(parse("1\tJansen", '\t'), vec!["1", "Jansen"]);
    }

    #[test]
    fn empty_columns_are_kept() {
        assert_eq!(parse("a,,b,", ','), vec!["a", "", "b", ""]);
        assert_eq!(parse("", ','), vec![""]);
    }

    #[test]
    fn quoted_columns_keep_separators_and_unescape_quotes() {
        assert_eq!(parse("1,\"a,b\",c", ','), vec!["1", "a,b", "c"]);
        assert_eq!(
            parse("\"say \"\"hi\"\"\",x", ','),
            vec!["say \"hi\"", "x"]
        );
        assert_eq!(parse("\"\",x", ','), vec!["", "x"]);
    }

    #[test]
    fn malformed_quotes_are_tolerated() {
        assert_eq!(parse("\"abc,def", ','), vec!["abc,def"]);
        assert_eq!(parse("\"ab\"x,c", ','), vec!["ab", "", "c"]);

        let mut parser = RowParser::new(',');
        parser.set_line("\"open");
        let _ = parser.columns().count();
        assert!(!parser.have_error());
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        assert_eq!(parse("名字,\"ü,ß\",ok", ','), vec!["名字", "ü,ß", "ok"]);
        assert_eq!(parse("a→b→c", '→'), vec!["a", "b", "c"]);
    }

    #[test]
    fn assigning_a_line_resets_the_cursor() {
        let mut parser = RowParser::new(',');
        parser.set_line("a,b");
        assert_eq!(parser.columns().next(), Some("a".to_string()));
        parser.set_line("c,d");
        assert_eq!(parser.columns().collect::<Vec<_>>(), vec!["c", "d"]);
        assert!(!parser.is_escape_col());
    }
}
