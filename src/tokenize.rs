/// Quote-aware field splitter for one line.
///
/// Inside a quoted span the delimiter is literal text; the quote character
/// opens and closes spans and is never emitted, except that a doubled quote
/// inside a span stands for one literal quote. Fields are trimmed.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    delimiter: char,
    quote: char,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(b',', b'"')
    }
}

impl Tokenizer {
    pub fn new(delimiter: u8, quote: u8) -> Self {
        Self {
            delimiter: delimiter as char,
            quote: quote as char,
        }
    }

    pub fn tokenize(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut field = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if c == self.quote {
                if in_quotes && chars.peek() == Some(&self.quote) {
                    field.push(self.quote);
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            } else if c == self.delimiter && !in_quotes {
                fields.push(field.trim().to_string());
                field.clear();
            } else {
                field.push(c);
            }
        }
        fields.push(field.trim().to_string());
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_inside_quotes_is_literal() {
        let t = Tokenizer::default();
        assert_eq!(t.tokenize(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn doubled_quote_unescapes_to_one() {
        let t = Tokenizer::default();
        assert_eq!(t.tokenize(r#"x,"y""z",w"#), vec!["x", "y\"z", "w"]);
    }

    #[test]
    fn trims_and_keeps_empty_fields() {
        let t = Tokenizer::default();
        assert_eq!(t.tokenize(" 1 ,, 3.71 ,"), vec!["1", "", "3.71", ""]);
        assert_eq!(t.tokenize(""), vec![""]);
    }

    #[test]
    fn custom_delimiter() {
        let t = Tokenizer::new(b'\t', b'\'');
        assert_eq!(t.tokenize("Cycle\t'Voltage\t(V)'"), vec!["Cycle", "Voltage\t(V)"]);
    }
}
