//! Page-layout XML parsing.
//!
//! The layout document is a DjVu-style tree: one `OBJECT` per page, holding
//! `PARAM` children (the `PAGE` param names the page file, e.g.
//! `book_0004.djvu`) and nested `LINE`/`WORD` elements with the OCR text.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use bookgenome_shared::{GenomeError, Result};

/// One OCR line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub words: Vec<String>,
}

impl Line {
    /// Words joined by single spaces.
    pub fn text(&self) -> String {
        self.words.join(" ")
    }

    /// Words concatenated without separators, for digit-run scanning.
    pub fn compact(&self) -> String {
        self.words.concat()
    }
}

/// One page of the layout tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    /// Zero-padded page ordinal, e.g. `"0004"`.
    pub ordinal: String,
    pub lines: Vec<Line>,
}

impl Page {
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .flat_map(|line| line.words.iter().map(String::as_str))
    }

    /// Lower-cased text of the first `lines` lines, joined by spaces.
    pub fn heading(&self, lines: usize) -> String {
        self.lines
            .iter()
            .take(lines)
            .map(Line::text)
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_lowercase()
    }
}

/// All pages of a document in layout order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTree {
    pub pages: Vec<Page>,
}

impl PageTree {
    /// Parse the raw layout XML. Any well-formedness error is `MalformedInput`.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut pages = Vec::new();
        let mut current: Option<PageBuilder> = None;
        let mut line: Option<Line> = None;
        let mut word: Option<String> = None;
        let mut depth: usize = 0;

        loop {
            let event = reader.read_event().map_err(|e| {
                GenomeError::malformed(format!(
                    "page layout XML at byte {}: {e}",
                    reader.error_position()
                ))
            })?;
            match event {
                Event::Start(e) => {
                    depth += 1;
                    match e.name().as_ref() {
                        b"OBJECT" => current = Some(PageBuilder::from_object(&e)?),
                        b"PARAM" => {
                            if let Some(page) = current.as_mut() {
                                page.param(&e)?;
                            }
                        }
                        b"LINE" => line = Some(Line::default()),
                        b"WORD" => word = Some(String::new()),
                        _ => {}
                    }
                }
                Event::Empty(e) => match e.name().as_ref() {
                    b"PARAM" => {
                        if let Some(page) = current.as_mut() {
                            page.param(&e)?;
                        }
                    }
                    b"OBJECT" => {
                        let page = PageBuilder::from_object(&e)?;
                        pages.push(page.finish(pages.len()));
                    }
                    _ => {}
                },
                Event::Text(t) => {
                    if let Some(word) = word.as_mut() {
                        let text = t.unescape().map_err(|e| {
                            GenomeError::malformed(format!("page layout XML text: {e}"))
                        })?;
                        word.push_str(&text);
                    }
                }
                Event::CData(t) => {
                    if let Some(word) = word.as_mut() {
                        word.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    match e.name().as_ref() {
                        b"WORD" => {
                            if let (Some(text), Some(line)) = (word.take(), line.as_mut()) {
                                let text = text.trim();
                                if !text.is_empty() {
                                    line.words.push(text.to_string());
                                }
                            }
                        }
                        b"LINE" => {
                            if let (Some(done), Some(page)) = (line.take(), current.as_mut()) {
                                page.lines.push(done);
                            }
                        }
                        b"OBJECT" => {
                            if let Some(page) = current.take() {
                                pages.push(page.finish(pages.len()));
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if depth != 0 {
            return Err(GenomeError::malformed(
                "page layout XML ended with unclosed elements",
            ));
        }

        Ok(Self { pages })
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn last(&self) -> Option<&Page> {
        self.pages.last()
    }
}

#[derive(Debug, Default)]
struct PageBuilder {
    page_param: Option<String>,
    first_param: Option<String>,
    usemap: Option<String>,
    lines: Vec<Line>,
}

impl PageBuilder {
    fn from_object(e: &BytesStart<'_>) -> Result<Self> {
        Ok(Self {
            usemap: attribute(e, "usemap")?,
            ..Self::default()
        })
    }

    fn param(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let Some(value) = attribute(e, "value")? else {
            return Ok(());
        };
        if self.first_param.is_none() {
            self.first_param = Some(value.clone());
        }
        if attribute(e, "name")?.is_some_and(|name| name.eq_ignore_ascii_case("page")) {
            self.page_param = Some(value);
        }
        Ok(())
    }

    /// `position` is the zero-based index of the page, used when no page
    /// file name is present.
    fn finish(self, position: usize) -> Page {
        let ordinal = self
            .page_param
            .or(self.first_param)
            .or(self.usemap)
            .map(|file| ordinal_from_file(&file))
            .unwrap_or_else(|| format!("{:04}", position + 1));
        Page {
            ordinal,
            lines: self.lines,
        }
    }
}

/// `book_0004.djvu` -> `0004`: the last four characters of the stem before
/// the first dot, left-padded with zeros when shorter.
pub fn ordinal_from_file(file: &str) -> String {
    let stem = file.split('.').next().unwrap_or_default();
    let chars: Vec<char> = stem.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("{tail:0>4}")
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    let attr = e
        .try_get_attribute(name)
        .map_err(|err| GenomeError::malformed(format!("page layout XML attribute: {err}")))?;
    attr.map(|a| {
        a.unescape_value()
            .map(|v| v.into_owned())
            .map_err(|err| GenomeError::malformed(format!("page layout XML attribute: {err}")))
    })
    .transpose()
}
