use crate::error::IngestError;
use lopdf::Document;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Returns the text of each page in page order. Pages without text are omitted.
    fn extract_pages(&self, bytes: &[u8], document_name: &str) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8], document_name: &str) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load_mem(bytes)
            .map_err(|error| IngestError::PdfParse(format!("{document_name}: {error}")))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    tracing::debug!(document = document_name, page = page_no, %error, "page has no decodable text");
                    continue;
                }
            };

            if !text.trim().is_empty() {
                pages.push(PageText {
                    number: page_no,
                    text,
                });
            }
        }

        if pages.is_empty() {
            return Err(IngestError::NoExtractableText(document_name.to_string()));
        }

        Ok(pages)
    }
}

/// Reads pre-extracted text (e.g. `pdftotext` output) where pages are separated by form feeds.
#[derive(Debug, Default, Clone, Copy)]
pub struct FormFeedTextExtractor;

impl PdfExtractor for FormFeedTextExtractor {
    fn extract_pages(&self, bytes: &[u8], document_name: &str) -> Result<Vec<PageText>, IngestError> {
        let raw_text = std::str::from_utf8(bytes)
            .map_err(|error| IngestError::PdfParse(format!("{document_name}: {error}")))?;
        let pages = split_form_feed_pages(raw_text);
        if pages.is_empty() {
            return Err(IngestError::NoExtractableText(document_name.to_string()));
        }
        Ok(pages)
    }
}

/// Splits a plain-text dump into pages on form feeds, numbering from 1.
pub fn split_form_feed_pages(raw_text: &str) -> Vec<PageText> {
    raw_text
        .split('\u{000c}')
        .enumerate()
        .filter_map(|(index, chunk)| {
            let trimmed = chunk.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(PageText {
                    number: (index + 1) as u32,
                    text: trimmed.to_string(),
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{split_form_feed_pages, FormFeedTextExtractor, LopdfExtractor, PdfExtractor};
    use crate::chunking::PdfChunker;
    use crate::error::IngestError;
    use crate::models::IngestionOptions;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = document.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let encoded = content.encode().expect("content stream encodes");
            let content_id = document.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).expect("pdf serializes");
        bytes
    }

    #[test]
    fn lopdf_reads_each_page_with_its_number() -> Result<(), IngestError> {
        let bytes = pdf_with_pages(&["VFR minimum visibility is 3 statute miles", "cargo weight limits"]);

        let pages = LopdfExtractor.extract_pages(&bytes, "manual.pdf")?;

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert!(pages[0].text.contains("VFR minimum visibility"));
        assert_eq!(pages[1].number, 2);
        assert!(pages[1].text.contains("cargo weight limits"));
        Ok(())
    }

    #[test]
    fn default_chunker_ingests_a_real_pdf() -> Result<(), IngestError> {
        let bytes = pdf_with_pages(&["Carburetor heat on before power reduction", "Mixture rich"]);
        let chunker = PdfChunker::new(&IngestionOptions::default())?;

        let chunks = chunker.process(&bytes, "poh.pdf")?;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].text, "Carburetor heat on before power reduction");
        assert_eq!(chunks[1].page, 2);
        assert_eq!(chunks[1].text, "Mixture rich");
        Ok(())
    }

    #[test]
    fn whitespace_only_text_has_nothing_to_extract() {
        let result = FormFeedTextExtractor.extract_pages(b"  \x0c \n", "scan.pdf");
        assert!(matches!(result, Err(IngestError::NoExtractableText(name)) if name == "scan.pdf"));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let result = LopdfExtractor.extract_pages(b"%PDF-1.4\n%broken", "broken.pdf");
        assert!(matches!(result, Err(IngestError::PdfParse(_))));
    }

    #[test]
    fn form_feed_split_keeps_page_numbers_of_blank_pages() {
        let pages = split_form_feed_pages("First\u{000C}  \u{000C}Third\n");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "First");
        assert_eq!(pages[1].number, 3);
        assert_eq!(pages[1].text, "Third");
    }
}
