use anyhow::{Context, Result};
use lopdf::Document as PdfDocument;
use tracing::debug;

/// Text of a single PDF page; `number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfPage {
    pub number: u32,
    pub text: String,
}

pub struct PdfLoader;

impl PdfLoader {
    /// Returns `true` when the bytes carry the PDF magic number.
    pub fn is_pdf(data: &[u8]) -> bool {
        infer::get(data).is_some_and(|kind| kind.mime_type() == "application/pdf")
    }

    /// Extracts the text of every page in page order.
    ///
    /// A page whose text cannot be extracted fails the whole document.
    pub fn load_pages(data: &[u8]) -> Result<Vec<PdfPage>> {
        let doc = PdfDocument::load_mem(data).context("Failed to load PDF file")?;
        let pages = doc.get_pages();

        let mut extracted = Vec::with_capacity(pages.len());
        for page_number in pages.keys() {
            let text = doc
                .extract_text(&[*page_number])
                .with_context(|| format!("Failed to extract text from page {}", page_number))?;
            extracted.push(PdfPage {
                number: *page_number,
                text,
            });
        }

        debug!("Extracted {} pages from PDF", extracted.len());
        Ok(extracted)
    }
}

/// Builds an uncompressed PDF with one line of Courier text per page.
#[cfg(test)]
pub(crate) fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = PdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let kids: Vec<Object> = pages
        .iter()
        .map(|text| {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            })
            .into()
        })
        .collect();

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
