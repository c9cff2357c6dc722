//! Decompose a document into addressable content units.

use std::sync::LazyLock;

use base64::{engine::general_purpose::STANDARD, Engine};
use regex::Regex;

use super::{Document, Paragraph};
use crate::models::{Anchor, ContentUnit, UnitKind};

static CAPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(figure|fig|photo|image|figura|foto|imagem)[\s-]?\d+.*")
        .expect("caption regex")
});

/// Walks a document in reading order and emits units with stable ids.
#[derive(Debug, Default)]
pub struct ContentMapper {
    units: Vec<ContentUnit>,
    /// Also emit caption paragraphs as text units.
    keep_captions: bool,
}

impl ContentMapper {
    /// Map a whole document: body, then tables, then section headers/footers.
    ///
    /// A caption paragraph under an image labels the image and is not
    /// emitted on its own.
    pub fn map(document: &Document) -> Vec<ContentUnit> {
        Self::default().run(document)
    }

    /// Like [`ContentMapper::map`], but caption paragraphs are also emitted
    /// as numbered text units so language revision covers them.
    pub fn map_all_paragraphs(document: &Document) -> Vec<ContentUnit> {
        Self {
            keep_captions: true,
            ..Self::default()
        }
        .run(document)
    }

    fn run(mut self, document: &Document) -> Vec<ContentUnit> {
        self.map_body(&document.paragraphs);
        self.map_tables(document);
        self.map_sections(document);
        self.units
    }

    fn next_id(&self) -> usize {
        self.units.len()
    }

    fn push_text(&mut self, kind: UnitKind, origin: String, text: &str, anchor: Anchor) {
        let id = self.next_id();
        self.units
            .push(ContentUnit::text(id, kind, origin, text.trim().to_string(), anchor));
    }

    fn map_body(&mut self, paragraphs: &[Paragraph]) {
        let mut cursor = 0;
        let mut counter = 0;

        while cursor < paragraphs.len() {
            counter += 1;
            let paragraph = &paragraphs[cursor];

            if !paragraph.images.is_empty() {
                let caption = paragraphs
                    .get(cursor + 1)
                    .map(|next| next.text.trim())
                    .filter(|text| CAPTION.is_match(text))
                    .map(str::to_string);
                let origin = caption
                    .clone()
                    .unwrap_or_else(|| format!("Image near Paragraph {}", counter));
                let anchor = Anchor::Body { paragraph: cursor };

                if caption.is_some() && !self.keep_captions {
                    cursor += 1;
                }

                for image in &paragraph.images {
                    let blob = match STANDARD.decode(image.data.trim()) {
                        Ok(blob) => blob,
                        Err(e) => {
                            tracing::warn!(
                                "Skipping undecodable image '{}' at {}: {}",
                                image.id,
                                origin,
                                e
                            );
                            continue;
                        }
                    };
                    let id = self.next_id();
                    self.units.push(ContentUnit::image(
                        id,
                        origin.clone(),
                        blob,
                        image.mime_type.clone(),
                        caption.clone(),
                        anchor.clone(),
                    ));
                }
            } else if !paragraph.text.trim().is_empty() {
                self.push_text(
                    UnitKind::Text,
                    format!("Paragraph {}", counter),
                    &paragraph.text,
                    Anchor::Body { paragraph: cursor },
                );
            }

            cursor += 1;
        }
    }

    fn map_tables(&mut self, document: &Document) {
        for (t, table) in document.tables.iter().enumerate() {
            let rendered = document
                .table_grid(t)
                .unwrap_or_default()
                .iter()
                .map(|row| row.join(" | "))
                .collect::<Vec<_>>()
                .join("\n");
            let id = self.next_id();
            self.units.push(ContentUnit::text(
                id,
                UnitKind::TableObject,
                format!("Table {}", t + 1),
                rendered,
                Anchor::Table { table: t },
            ));

            for (r, row) in table.rows.iter().enumerate() {
                for (c, cell) in row.cells.iter().enumerate() {
                    for (p, paragraph) in cell.paragraphs.iter().enumerate() {
                        if paragraph.text.trim().is_empty() {
                            continue;
                        }
                        self.push_text(
                            UnitKind::TableCell,
                            format!("Table {}, Row {}, Column {}", t + 1, r + 1, c + 1),
                            &paragraph.text,
                            Anchor::Cell {
                                table: t,
                                row: r,
                                column: c,
                                paragraph: p,
                            },
                        );
                    }
                }
            }
        }
    }

    fn map_sections(&mut self, document: &Document) {
        for (s, section) in document.sections.iter().enumerate() {
            for (p, paragraph) in section.header.iter().enumerate() {
                if !paragraph.text.trim().is_empty() {
                    self.push_text(
                        UnitKind::Text,
                        format!("Section {} Header", s + 1),
                        &paragraph.text,
                        Anchor::Header {
                            section: s,
                            paragraph: p,
                        },
                    );
                }
            }
            for (p, paragraph) in section.footer.iter().enumerate() {
                if !paragraph.text.trim().is_empty() {
                    self.push_text(
                        UnitKind::Text,
                        format!("Section {} Footer", s + 1),
                        &paragraph.text,
                        Anchor::Footer {
                            section: s,
                            paragraph: p,
                        },
                    );
                }
            }
        }
    }
}
