use kinetix_core::{Color, KinetixResult};
use kinetix_render::{Canvas, TextAlign, TextStyle};
use serde::{Deserialize, Serialize};

use crate::object::{drawable_common, finite_or, Drawable, ObjectBase, ObjectKind, Rescale};

/// Height reserved for the window chrome above the first line.
const HEADER_HEIGHT: f64 = 40.0;
const CORNER_RADIUS: f64 = 8.0;
const LINE_SPACING: f64 = 1.5;

const KEYWORDS: &[&str] = &[
    "const", "let", "var", "function", "return", "import", "export", "from", "class", "if",
    "else", "new", "this", "extends", "true", "false", "null", "undefined",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeTheme {
    #[default]
    VscodeDark,
    Light,
    Monokai,
    GithubDark,
    Dracula,
}

#[derive(Debug, Clone)]
pub struct ThemePalette {
    pub background: Color,
    pub text: Color,
    pub line_numbers: Color,
    pub keyword: Color,
    pub string: Color,
    pub comment: Color,
    pub function: Color,
    pub number: Color,
    pub traffic: [Color; 3],
}

fn hex(s: &str) -> Color {
    Color::parse_or(s, Color::BLACK)
}

impl CodeTheme {
    pub fn palette(&self) -> ThemePalette {
        // bg, text, numbers, keyword, string, comment, function, number
        let c = match self {
            CodeTheme::VscodeDark => [
                "#1e1e1e", "#d4d4d4", "#858585", "#569cd6", "#ce9178", "#6a9955", "#dcdcaa",
                "#b5cea8",
            ],
            CodeTheme::Light => [
                "#ffffff", "#24292e", "#6a737d", "#d73a49", "#032f62", "#6a737d", "#6f42c1",
                "#005cc5",
            ],
            CodeTheme::Monokai => [
                "#272822", "#f8f8f2", "#75715e", "#f92672", "#e6db74", "#75715e", "#a6e22e",
                "#ae81ff",
            ],
            CodeTheme::GithubDark => [
                "#0d1117", "#c9d1d9", "#6e7681", "#ff7b72", "#a5d6ff", "#8b949e", "#d2a8ff",
                "#79c0ff",
            ],
            CodeTheme::Dracula => [
                "#282a36", "#f8f8f2", "#6272a4", "#ff79c6", "#f1fa8c", "#6272a4", "#50fa7b",
                "#bd93f9",
            ],
        };
        ThemePalette {
            background: hex(c[0]),
            text: hex(c[1]),
            line_numbers: hex(c[2]),
            keyword: hex(c[3]),
            string: hex(c[4]),
            comment: hex(c[5]),
            function: hex(c[6]),
            number: hex(c[7]),
            traffic: [hex("#ff5f56"), hex("#ffbd2e"), hex("#27c93f")],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Plain,
    Comment,
    String,
    Keyword,
    Function,
    Number,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

/// Split one source line into highlight tokens. Concatenating the token
/// texts always reproduces the line.
pub fn tokenize(line: &str) -> Vec<Token> {
    let chars: Vec<char> = line.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let push = |tokens: &mut Vec<Token>, slice: &[char], kind| {
        tokens.push(Token {
            text: slice.iter().collect(),
            kind,
        });
    };

    while i < chars.len() {
        let c = chars[i];
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            push(&mut tokens, &chars[i..], TokenKind::Comment);
            break;
        }
        if is_quote(c) {
            let end = chars[i + 1..]
                .iter()
                .position(|&ch| ch == c)
                .map(|p| i + 1 + p + 1)
                .unwrap_or(chars.len());
            push(&mut tokens, &chars[i..end], TokenKind::String);
            i = end;
            continue;
        }
        if is_word(c) {
            let start = i;
            while i < chars.len() && is_word(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let next = chars[i..].iter().find(|ch| !ch.is_whitespace());
            let kind = if KEYWORDS.contains(&word.as_str()) {
                TokenKind::Keyword
            } else if word.starts_with(|ch: char| ch.is_ascii_digit()) {
                TokenKind::Number
            } else if next == Some(&'(') || word == "console" {
                TokenKind::Function
            } else {
                TokenKind::Plain
            };
            tokens.push(Token { text: word, kind });
            continue;
        }
        let start = i;
        while i < chars.len()
            && !is_word(chars[i])
            && !is_quote(chars[i])
            && !(chars[i] == '/' && chars.get(i + 1) == Some(&'/'))
        {
            i += 1;
        }
        push(&mut tokens, &chars[start..i], TokenKind::Plain);
    }
    tokens
}

/// An editor-style code window with line numbers and syntax colouring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeBlockObject {
    #[serde(flatten)]
    pub base: ObjectBase,
    pub code: String,
    pub language: String,
    pub font_size: f64,
    pub font_family: String,
    pub theme: CodeTheme,
    pub show_line_numbers: bool,
    pub syntax_highlighting: bool,
    pub start_line_number: u32,
    pub highlighted_lines: Vec<u32>,
    pub highlight_color: Color,
    pub padding: f64,
    pub line_number_margin: f64,
}

impl Default for CodeBlockObject {
    fn default() -> Self {
        Self {
            base: ObjectBase::default().with_size(400.0, 200.0),
            code: "console.log('Hello Kinetix');".to_string(),
            language: "javascript".to_string(),
            font_size: 16.0,
            font_family: "Fira Code".to_string(),
            theme: CodeTheme::VscodeDark,
            show_line_numbers: true,
            syntax_highlighting: true,
            start_line_number: 1,
            highlighted_lines: Vec::new(),
            highlight_color: Color::rgba(1.0, 1.0, 1.0, 0.1),
            padding: 20.0,
            line_number_margin: 15.0,
        }
    }
}

impl CodeBlockObject {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            base: ObjectBase::new(ObjectKind::CodeBlock, name).with_size(400.0, 200.0),
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_theme(mut self, theme: CodeTheme) -> Self {
        self.theme = theme;
        self
    }

    fn token_color(palette: &ThemePalette, kind: TokenKind) -> Color {
        match kind {
            TokenKind::Plain => palette.text,
            TokenKind::Comment => palette.comment,
            TokenKind::String => palette.string,
            TokenKind::Keyword => palette.keyword,
            TokenKind::Function => palette.function,
            TokenKind::Number => palette.number,
        }
    }
}

impl Drawable for CodeBlockObject {
    drawable_common!(ObjectKind::CodeBlock);

    fn draw(&mut self, canvas: &mut Canvas, time: f64) -> KinetixResult<()> {
        let state = self.base.visual_state(time);
        if state.is_hidden() {
            return Ok(());
        }
        let palette = self.theme.palette();
        let (w, h) = (self.base.width, self.base.height);
        let font_size = finite_or(self.font_size, 0.0);
        let padding = finite_or(self.padding, 0.0);
        let margin = finite_or(self.line_number_margin, 0.0);

        canvas.save();
        self.base.apply_transform(canvas, &state);

        canvas.fill_round_rect(0.0, 0.0, w, h, CORNER_RADIUS, palette.background);
        for (i, color) in palette.traffic.iter().enumerate() {
            canvas.fill_circle(15.0 + i as f64 * 20.0, 15.0, 6.0, *color);
        }
        if !self.language.is_empty() {
            let label = TextStyle::new(self.font_family.clone(), 12.0, palette.line_numbers)
                .with_align(TextAlign::Right);
            canvas.fill_text(&self.language, w - 15.0, 9.0, &label)?;
        }

        if font_size > 0.0 {
            canvas.clip_rect(0.0, 0.0, w, h);
            let visible: String = self
                .code
                .chars()
                .take(state.reveal_count(self.code.chars().count()))
                .collect();
            let lines: Vec<&str> = visible.split('\n').collect();
            let number_width = canvas
                .measure_text(
                    &(self.start_line_number as usize + lines.len()).to_string(),
                    &self.font_family,
                    font_size,
                )
                .width
                + margin;

            let mut line_y = HEADER_HEIGHT + padding;
            for (i, line) in lines.iter().enumerate() {
                if line_y > h - padding {
                    break;
                }
                let number = self.start_line_number + i as u32;
                if self.highlighted_lines.contains(&number) {
                    canvas.fill_rect(
                        0.0,
                        line_y - 2.0,
                        w,
                        font_size * LINE_SPACING,
                        self.highlight_color,
                    );
                }

                let mut text_x = padding;
                if self.show_line_numbers {
                    let style =
                        TextStyle::new(self.font_family.clone(), font_size, palette.line_numbers);
                    canvas.fill_text(&number.to_string(), padding, line_y, &style)?;
                    text_x += number_width;
                }

                if self.syntax_highlighting {
                    for token in tokenize(line) {
                        let style = TextStyle::new(
                            self.font_family.clone(),
                            font_size,
                            Self::token_color(&palette, token.kind),
                        );
                        text_x += canvas.fill_text(&token.text, text_x, line_y, &style)?.width;
                    }
                } else {
                    let style = TextStyle::new(self.font_family.clone(), font_size, palette.text);
                    canvas.fill_text(line, text_x, line_y, &style)?;
                }

                line_y += font_size * LINE_SPACING;
            }
        }

        canvas.restore();
        Ok(())
    }

    fn rescale(&mut self, r: &Rescale) {
        let u = r.uniform();
        self.base.rescale(r);
        self.font_size *= u;
        self.padding *= u;
        self.line_number_margin *= u;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{EnterAnimation, EnterKind};
    use kinetix_render::TextRenderer;
    use std::sync::Arc;

    fn kinds(line: &str) -> Vec<(String, TokenKind)> {
        tokenize(line).into_iter().map(|t| (t.text, t.kind)).collect()
    }

    #[test]
    fn test_tokenize_reassembles_line() {
        let line = "const x = foo(\"a\", 'b') // done";
        let joined: String = tokenize(line).into_iter().map(|t| t.text).collect();
        assert_eq!(joined, line);
    }

    #[test]
    fn test_tokenize_classifies() {
        let toks = kinds("const total = sum(42, \"x\"); // note");
        assert_eq!(toks[0], ("const".to_string(), TokenKind::Keyword));
        assert!(toks.contains(&("sum".to_string(), TokenKind::Function)));
        assert!(toks.contains(&("42".to_string(), TokenKind::Number)));
        assert!(toks.contains(&("\"x\"".to_string(), TokenKind::String)));
        assert_eq!(
            toks.last().cloned(),
            Some(("// note".to_string(), TokenKind::Comment))
        );
    }

    #[test]
    fn test_tokenize_console_and_unterminated_string() {
        let toks = kinds("console.log(`open");
        assert_eq!(toks[0].1, TokenKind::Function);
        assert_eq!(toks.last().map(|t| t.1), Some(TokenKind::String));
    }

    #[test]
    fn test_theme_palettes_differ() {
        let dark = CodeTheme::VscodeDark.palette();
        let light = CodeTheme::Light.palette();
        assert_ne!(dark.background, light.background);
        assert_eq!(dark.background.to_rgba8(), [0x1e, 0x1e, 0x1e, 255]);
    }

    #[test]
    fn test_theme_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&CodeTheme::GithubDark).unwrap(),
            "\"github-dark\""
        );
    }

    #[test]
    fn test_typewriter_hides_code_before_delay() {
        let mut code = CodeBlockObject::new("c", "let a = 1;\nlet b = 2;");
        code.base.enter_animation = EnterAnimation::new(EnterKind::Typewriter, 1000.0, 500.0);
        let mut canvas = Canvas::with_text_renderer(400, 200, Arc::new(TextRenderer::new()));
        code.draw(&mut canvas, 100.0).unwrap();
        assert!(canvas.frame().data.chunks(4).all(|p| p[3] == 0));
    }

    #[test]
    fn test_draw_is_repeatable() {
        let mut code = CodeBlockObject::new("c", "function f() {\n  return 1;\n}");
        code.highlighted_lines = vec![2];
        let renderer = Arc::new(TextRenderer::new());
        let mut a = Canvas::with_text_renderer(400, 200, renderer.clone());
        let mut b = Canvas::with_text_renderer(400, 200, renderer);
        code.draw(&mut a, 300.0).unwrap();
        code.draw(&mut b, 300.0).unwrap();
        assert_eq!(a.frame(), b.frame());
    }

    #[test]
    fn test_rescale_scales_layout_metrics() {
        let mut code = CodeBlockObject::default();
        code.rescale(&Rescale::new(2.0, 0.5));
        assert_eq!(code.font_size, 8.0);
        assert_eq!(code.padding, 10.0);
        assert_eq!(code.line_number_margin, 7.5);
    }
}
