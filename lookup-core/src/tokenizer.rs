//! # Tokenizador
//!
//! Divide o texto bruto em tokens preservando a posição original de cada um
//! (offsets em bytes, intervalo semiaberto). Os offsets são a base de todo o
//! anotador: o matcher devolve posições no texto e o documento precisa mapear
//! essas posições de volta para sequências de tokens.
//!
//! ## Modos
//!
//! - **Standard**: palavras separadas por espaços e pontuação, preservando
//!   abreviações comuns ("Dr.", "Sr.") e números decimais ("3.5").
//! - **Unicode**: fronteiras de palavra do UAX #29 via `unicode-segmentation`.
//!
//! Espaços em branco nunca viram token.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use lookup_core::tokenizer::{tokenize_with_mode, TokenizerMode};
//!
//! let tokens = tokenize_with_mode("Dr. Silva mora em São Paulo.", TokenizerMode::Standard);
//! assert_eq!(tokens[0].text, "Dr.");
//! assert_eq!(tokens.last().map(|t| t.text.as_str()), Some("."));
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Um token extraído do texto original.
///
/// `start` e `end` apontam para o texto do documento; `text` é sempre igual a
/// `&doc.text[start..end]`, inclusive depois de um merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "Lula", ",", "New York").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token no documento (0, 1, 2...).
    pub index: usize,
}

impl Token {
    /// Comprimento do token em bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Estratégias de tokenização disponíveis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerMode {
    /// **Padrão**: separa por espaços e pontuação, mas preserva abreviações
    /// comuns e números com ponto decimal.
    Standard,
    /// **Unicode**: segmentação por fronteiras de palavra (UAX #29).
    Unicode,
}

impl Default for TokenizerMode {
    fn default() -> Self {
        TokenizerMode::Standard
    }
}

/// Abreviações que não devem ter o ponto separado
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Dra", "Sr", "Sra", "Prof", "Profa", "Gov", "Dep", "Sen", "Min",
    "Gen", "Cap", "Av", "Mr", "Mrs", "Ms", "St", "Jr", "etc", "vol", "núm",
    "art", "pág", "cap", "tel", "vs",
];

/// Tokeniza um texto usando o modo padrão.
pub fn tokenize(text: &str) -> Vec<Token> {
    tokenize_with_mode(text, TokenizerMode::Standard)
}

/// Tokeniza um texto com o modo especificado.
pub fn tokenize_with_mode(text: &str, mode: TokenizerMode) -> Vec<Token> {
    let mut tokens = match mode {
        TokenizerMode::Standard => tokenize_standard(text),
        TokenizerMode::Unicode => tokenize_unicode(text),
    };

    // Re-indexa os tokens
    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

fn tokenize_unicode(text: &str) -> Vec<Token> {
    text.split_word_bound_indices()
        .filter(|(_, segment)| !segment.chars().all(char::is_whitespace))
        .map(|(start, segment)| Token {
            text: segment.to_string(),
            start,
            end: start + segment.len(),
            index: 0,
        })
        .collect()
}

fn tokenize_standard(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current_start = 0;
    let mut current_text = String::new();
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    for (i, &(byte_pos, ch)) in chars.iter().enumerate() {
        let next = chars.get(i + 1).map(|(_, c)| *c);

        if ch.is_alphanumeric() || ((ch == '-' || ch == '_') && !current_text.is_empty()) {
            if current_text.is_empty() {
                current_start = byte_pos;
            }
            current_text.push(ch);
        } else if ch == '.' && !current_text.is_empty() {
            let is_abbrev = ABBREVIATIONS.contains(&current_text.as_str());
            let current_is_num = current_text.chars().all(char::is_numeric);
            let next_is_num = next.map(char::is_numeric).unwrap_or(false);

            if is_abbrev || (current_is_num && next_is_num) {
                current_text.push('.');
            } else {
                flush_token(&mut tokens, &mut current_text, current_start, byte_pos);
                push_token(&mut tokens, ".", byte_pos, byte_pos + 1);
            }
        } else if (ch == '\'' || ch == '\u{2019}')
            && !current_text.is_empty()
            && next.map(char::is_alphabetic).unwrap_or(false)
        {
            // Apóstrofo interno: "d'água", "don't"
            current_text.push(ch);
        } else if ch.is_whitespace() {
            flush_token(&mut tokens, &mut current_text, current_start, byte_pos);
        } else {
            flush_token(&mut tokens, &mut current_text, current_start, byte_pos);
            let mut buf = [0u8; 4];
            push_token(&mut tokens, ch.encode_utf8(&mut buf), byte_pos, byte_pos + ch.len_utf8());
        }
    }

    flush_token(&mut tokens, &mut current_text, current_start, text.len());

    tokens
}

/// Fecha o token acumulado e adiciona à lista (se não vazio)
fn flush_token(tokens: &mut Vec<Token>, text: &mut String, start: usize, end: usize) {
    if !text.is_empty() {
        tokens.push(Token {
            text: std::mem::take(text),
            start,
            end,
            index: 0, // será atribuído depois
        });
    }
}

/// Adiciona um token de pontuação diretamente
fn push_token(tokens: &mut Vec<Token>, text: &str, start: usize, end: usize) {
    tokens.push(Token {
        text: text.to_string(),
        start,
        end,
        index: 0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_standard_basic() {
        let tokens = tokenize("I live in New York City.");
        assert_eq!(texts(&tokens), vec!["I", "live", "in", "New", "York", "City", "."]);
        assert_eq!(tokens[3].start, 10);
        assert_eq!(tokens[3].end, 13);
        assert_eq!(tokens[6].index, 6);
    }

    #[test]
    fn test_offsets_address_original_text() {
        let text = "Visitei São Paulo, depois Brasília.";
        for token in tokenize(text) {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_abbreviation_and_decimal() {
        let tokens = tokenize("Dr. Silva pagou 3.5 reais.");
        assert_eq!(texts(&tokens), vec!["Dr.", "Silva", "pagou", "3.5", "reais", "."]);
    }

    #[test]
    fn test_inner_apostrophe_and_hyphen() {
        let tokens = tokenize("copo d'água bem-vindo");
        assert_eq!(texts(&tokens), vec!["copo", "d'água", "bem-vindo"]);
    }

    #[test]
    fn test_tokenize_unicode() {
        let tokens = tokenize_with_mode("São Paulo, 2022", TokenizerMode::Unicode);
        assert_eq!(texts(&tokens), vec!["São", "Paulo", ",", "2022"]);
        assert_eq!(tokens[1].index, 1);
    }

    #[test]
    fn test_empty_text() {
        assert!(tokenize("").is_empty());
        assert!(tokenize_with_mode("   ", TokenizerMode::Unicode).is_empty());
    }
}
